use std::fmt;

use crate::command::schema::Command;
use crate::foundation::error::{BatError, BatResult};
use crate::host::{RenderOutcome, SceneHost};

/// One of the four top-level command fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubPayload {
    /// Camera intrinsics.
    Camera,
    /// Object pose.
    Pose,
    /// Current frame.
    Frame,
    /// Render trigger.
    Render,
}

impl SubPayload {
    /// Application order, independent of key order in the request.
    pub const ORDER: [Self; 4] = [Self::Camera, Self::Pose, Self::Frame, Self::Render];

    /// Wire name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Pose => "pose",
            Self::Frame => "frame",
            Self::Render => "render",
        }
    }
}

impl fmt::Display for SubPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What happened to one sub-payload.
#[derive(Debug)]
pub enum StepStatus {
    /// Applied; carries a short description.
    Applied(String),
    /// Absent (or an explicit no-op) in the command.
    Skipped,
    /// Application failed; later sub-payloads still ran.
    Failed(BatError),
}

/// Outcome of one sub-payload.
#[derive(Debug)]
pub struct StepOutcome {
    /// Which sub-payload.
    pub step: SubPayload,
    /// What happened.
    pub status: StepStatus,
}

/// Per-step outcomes of one command, in application order.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Always four entries, in [`SubPayload::ORDER`].
    pub steps: Vec<StepOutcome>,
    /// Result of the render step, when it ran.
    pub render: Option<RenderOutcome>,
}

impl ApplyReport {
    /// Whether no step failed.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Failed steps with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (SubPayload, &BatError)> {
        self.steps.iter().filter_map(|s| match &s.status {
            StepStatus::Failed(e) => Some((s.step, e)),
            _ => None,
        })
    }

    /// Steps that were applied, in order.
    pub fn applied(&self) -> Vec<SubPayload> {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Applied(_)))
            .map(|s| s.step)
            .collect()
    }
}

/// Applies validated commands to the host in the fixed order camera, pose, frame, render.
#[derive(Clone, Copy, Debug)]
pub struct Dispatcher {
    /// Whether a bare `"render": true` also requests annotations.
    pub save_annotation: bool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            save_annotation: true,
        }
    }
}

impl Dispatcher {
    /// Dispatcher with an explicit annotation policy for bare render triggers.
    pub fn new(save_annotation: bool) -> Self {
        Self { save_annotation }
    }

    /// Apply every present sub-payload. A failing step is recorded and does not stop the rest.
    pub fn apply<H: SceneHost + ?Sized>(&self, cmd: &Command, host: &mut H) -> ApplyReport {
        let mut report = ApplyReport::default();
        for step in SubPayload::ORDER {
            let result = match step {
                SubPayload::Camera => self.apply_camera(cmd, host),
                SubPayload::Pose => self.apply_pose(cmd, host),
                SubPayload::Frame => self.apply_frame(cmd, host),
                SubPayload::Render => self.apply_render(cmd, host, &mut report.render),
            };
            let status = match result {
                Ok(Some(msg)) => {
                    tracing::debug!(%step, %msg, "sub-payload applied");
                    StepStatus::Applied(msg)
                }
                Ok(None) => StepStatus::Skipped,
                Err(e) => {
                    tracing::warn!(%step, error = %e, "sub-payload failed");
                    StepStatus::Failed(e)
                }
            };
            report.steps.push(StepOutcome { step, status });
        }
        report
    }

    fn apply_camera<H: SceneHost + ?Sized>(
        &self,
        cmd: &Command,
        host: &mut H,
    ) -> BatResult<Option<String>> {
        let Some(patch) = &cmd.camera else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(None);
        }
        let mut camera = host.camera();
        let changed = patch.apply_to(&mut camera);
        host.set_camera(camera)?;
        Ok(Some(format!("camera fields {}", changed.join(", "))))
    }

    fn apply_pose<H: SceneHost + ?Sized>(
        &self,
        cmd: &Command,
        host: &mut H,
    ) -> BatResult<Option<String>> {
        let Some(p) = &cmd.pose else {
            return Ok(None);
        };
        let mut pose = host
            .object_pose(&p.name)
            .ok_or_else(|| BatError::not_found("object", p.name.clone()))?;
        if let Some(location) = p.location {
            pose.location = location;
        }
        if let Some(rotation) = p.rotation {
            pose.rotation = rotation;
        }
        host.set_object_pose(&p.name, pose)?;
        Ok(Some(format!("pose of '{}'", p.name)))
    }

    fn apply_frame<H: SceneHost + ?Sized>(
        &self,
        cmd: &Command,
        host: &mut H,
    ) -> BatResult<Option<String>> {
        let Some(frame) = cmd.frame else {
            return Ok(None);
        };
        host.set_frame(frame)?;
        Ok(Some(format!("frame {frame}")))
    }

    fn apply_render<H: SceneHost + ?Sized>(
        &self,
        cmd: &Command,
        host: &mut H,
        outcome: &mut Option<RenderOutcome>,
    ) -> BatResult<Option<String>> {
        let Some(payload) = cmd.render else {
            return Ok(None);
        };
        let request = payload.resolve(self.save_annotation);
        if request.is_noop() {
            return Ok(None);
        }
        let out = host.render(request)?;
        let msg = format!(
            "rendered frame {} (image: {}, annotation: {})",
            out.frame, request.image, out.annotated
        );
        *outcome = Some(out);
        Ok(Some(msg))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/command/dispatch.rs"]
mod tests;
