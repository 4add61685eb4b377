//! Annotation persistence: the sink trait and its implementations.

pub mod image_dir;
pub mod sink;
