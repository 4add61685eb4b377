//! Interfaces to the host application, plus an in-memory reference host.
//!
//! The host is single-threaded and frame-synchronous. [`SceneHost`] is the mutation surface the
//! command dispatcher drives during a tick, [`AnnotationSource`] is the renderer surface the
//! encoder reads from, and [`SceneQuery`] is the only surface the server thread may touch.

use std::path::PathBuf;

use crate::camera::intrinsics::CameraIntrinsics;
use crate::foundation::core::{ObjectHandle, Pose, Resolution};
use crate::foundation::error::BatResult;

pub mod memory;

/// What a `render` sub-payload asks for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderRequest {
    /// Render the regular image.
    pub image: bool,
    /// Run the annotation pass.
    pub annotation: bool,
}

impl RenderRequest {
    /// Whether anything was requested.
    pub fn is_noop(self) -> bool {
        !self.image && !self.annotation
    }
}

/// Result of a render call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderOutcome {
    /// Frame that was rendered.
    pub frame: i64,
    /// Where the host put the image, when one was rendered.
    pub image: Option<PathBuf>,
    /// Whether an annotation frame was produced.
    pub annotated: bool,
}

/// Mutation surface of the host scene, used on the host tick only.
pub trait SceneHost {
    /// Current camera intrinsics.
    fn camera(&self) -> CameraIntrinsics;
    /// Replace the camera intrinsics.
    fn set_camera(&mut self, camera: CameraIntrinsics) -> BatResult<()>;
    /// Pose of the named object.
    fn object_pose(&self, name: &str) -> Option<Pose>;
    /// Move the named object. Fails with `NotFound` for unknown names.
    fn set_object_pose(&mut self, name: &str, pose: Pose) -> BatResult<()>;
    /// Current frame number.
    fn current_frame(&self) -> i64;
    /// Jump to a frame.
    fn set_frame(&mut self, frame: i64) -> BatResult<()>;
    /// Render the current frame. Blocks the tick until done.
    fn render(&mut self, request: RenderRequest) -> BatResult<RenderOutcome>;
}

/// Visibility mask of one object, row-major, one flag per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectMask {
    /// Mask resolution (equals the render resolution).
    pub resolution: Resolution,
    /// `true` where the object is visible.
    pub coverage: Vec<bool>,
}

/// Float render pass, row-major, `components` interleaved values per pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct PassBuffer {
    /// Pass resolution (equals the render resolution).
    pub resolution: Resolution,
    /// Values per pixel.
    pub components: usize,
    /// Pixel values.
    pub data: Vec<f32>,
}

/// Renderer/compositor surface read by the annotation encoder.
pub trait AnnotationSource {
    /// Render resolution.
    fn resolution(&self) -> Resolution;
    /// Whether the handle still names a live object.
    fn is_alive(&self, object: ObjectHandle) -> bool;
    /// Objects in the named collection; `None` when the collection does not exist.
    fn collection_members(&self, collection: &str) -> Option<Vec<ObjectHandle>>;
    /// Occlusion-resolved visibility mask of one object.
    fn object_mask(&self, object: ObjectHandle) -> Option<ObjectMask>;
    /// Camera distance, 1 component.
    fn depth_pass(&self) -> Option<PassBuffer>;
    /// Surface normal, 3 components.
    fn normal_pass(&self) -> Option<PassBuffer>;
    /// Motion vectors `(bwd_x, bwd_y, fwd_x, fwd_y)` with Y up, 4 components.
    fn vector_pass(&self) -> Option<PassBuffer>;
}

/// Read-only view of host state, safe to share with the server thread.
///
/// Reads are best-effort: they may interleave with a command being applied on the tick.
pub trait SceneQuery: Send + Sync {
    /// Current frame number.
    fn frame(&self) -> i64;
    /// Pose of the named object.
    fn pose(&self, name: &str) -> Option<Pose>;
}
