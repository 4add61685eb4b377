//! Camera intrinsics and lens distortion.

pub mod distortion;
pub mod intrinsics;
