//! Semantic classes, instance IDs and the per-frame annotation encoder.

pub mod encoder;
pub mod frame;
pub mod instances;
pub mod modality;
pub mod registry;
