//! Bat adds ground-truth annotation channels and a remote control plane to a 3D scene host.
//!
//! Two subsystems make up the crate:
//!
//! 1. **Annotation encoding**: a [`ClassRegistry`] of user-defined semantic classes and an
//!    [`InstanceAllocator`] turn host-rendered object masks into fixed-width `class_id` and
//!    `instance_id` channels, plus optional depth, normal and optical-flow layers, through the
//!    [`AnnotationEncoder`]. Frames go to an [`AnnotationSink`].
//! 2. **Remote commands**: a [`RemoteServer`] accepts JSON commands over HTTP and pushes them onto
//!    a [`PendingCommandQueue`]. The host drains that queue once per tick through
//!    [`AnnotationSession::tick`], applying each command's sub-payloads in the fixed order
//!    camera, pose, frame, render.
//!
//! The host itself is reached only through the traits in [`SceneHost`], [`AnnotationSource`] and
//! [`SceneQuery`]; [`MemoryScene`] is an in-memory reference implementation.
//!
//! Design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic IDs**: an unchanged scene encodes to bit-identical ID channels.
//! - **One shared mutable resource**: the server thread touches nothing but the command queue.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod annotation;
mod camera;
mod command;
mod config;
mod encode;
mod foundation;
mod host;
mod remote;
mod session;

pub use annotation::encoder::{AnnotationEncoder, FrameState};
pub use annotation::frame::{
    AnnotationFrame, Channel, ChannelBuffer, ChannelData, instance_palette,
};
pub use annotation::instances::{INSTANCE_ID_LIMIT, InstanceAllocator, InstanceId, InstanceRecord};
pub use annotation::modality::ModalityFlags;
pub use annotation::registry::{
    BACKGROUND_CLASS_NAME, CLASS_ID_LIMIT, ClassId, ClassManifest, ClassRegistry, ClassUpdate,
    SemanticClass,
};
pub use camera::distortion::{InverseDistortionMap, distort};
pub use camera::intrinsics::{CameraIntrinsics, CameraPatch};
pub use command::dispatch::{ApplyReport, Dispatcher, StepOutcome, StepStatus, SubPayload};
pub use command::schema::{Command, PosePayload, RenderPayload};
pub use config::{BatConfig, DEFAULT_PORT, OutputConfig, ServerConfig};
pub use encode::image_dir::{CLASS_INFO_FILE, ImageDirSink};
pub use encode::sink::{AnnotationSink, InMemorySink};
pub use foundation::core::{ObjectHandle, Pose, Resolution, Rgb, Vec3};
pub use foundation::error::{BatError, BatResult};
pub use host::memory::{FAR_DEPTH, Footprint, MemoryScene, MemorySceneQuery};
pub use host::{
    AnnotationSource, ObjectMask, PassBuffer, RenderOutcome, RenderRequest, SceneHost, SceneQuery,
};
pub use remote::queue::{PendingCommandQueue, QueuedCommand};
pub use remote::server::{RemoteServer, ServerState};
pub use remote::wire::{Ack, ErrorReply, FrameReply, ObjectReply, STATUS_ERROR, STATUS_SUCCESS};
pub use session::annotation_session::{AnnotationSession, CommandReport, TickReport};

/// Write a float layer (1, 3 or 4 components per pixel) as an OpenEXR file.
pub fn write_float_layer(path: &std::path::Path, buffer: &ChannelBuffer) -> BatResult<()> {
    let values = buffer
        .as_f32()
        .ok_or_else(|| BatError::validation(buffer.channel.name(), "not a float layer"))?;
    encode::image_dir::write_rgba32f(
        path,
        buffer.resolution.width,
        buffer.resolution.height,
        &encode::image_dir::expand_rgba(values, buffer.components),
    )
}
