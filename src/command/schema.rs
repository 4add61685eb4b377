use serde_json::{Map, Value};

use crate::camera::intrinsics::{CameraIntrinsics, CameraPatch};
use crate::foundation::core::Vec3;
use crate::foundation::error::{BatError, BatResult};
use crate::host::RenderRequest;

/// `pose` sub-payload.
#[derive(Clone, Debug, PartialEq)]
pub struct PosePayload {
    /// Object to move.
    pub name: String,
    /// New location; `None` keeps the current one.
    pub location: Option<Vec3>,
    /// New Euler XYZ rotation in radians; `None` keeps the current one.
    pub rotation: Option<Vec3>,
}

/// `render` sub-payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderPayload {
    /// `"render": true|false`; annotations follow the session's `save_annotation` setting.
    Trigger(bool),
    /// `"render": {"render": bool, "annotation": bool}`.
    Explicit(RenderRequest),
}

impl RenderPayload {
    /// Concrete request, given what a bare trigger implies for annotations.
    pub fn resolve(self, save_annotation: bool) -> RenderRequest {
        match self {
            Self::Trigger(on) => RenderRequest {
                image: on,
                annotation: on && save_annotation,
            },
            Self::Explicit(req) => req,
        }
    }
}

/// A validated remote command.
///
/// Absent sub-payloads are no-ops, never defaults.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Command {
    /// Camera fields to change.
    pub camera: Option<CameraPatch>,
    /// Object pose change.
    pub pose: Option<PosePayload>,
    /// Frame to jump to.
    pub frame: Option<i64>,
    /// Render trigger.
    pub render: Option<RenderPayload>,
    /// `$`-rooted paths of keys that were not recognized and were skipped.
    pub ignored: Vec<String>,
}

impl Command {
    /// Parse a request body.
    ///
    /// Bodies that are not a JSON object fail with a schema error. A known field with the wrong
    /// shape rejects the whole command with a validation error naming the field. Unknown keys at
    /// any level are skipped and listed in [`Command::ignored`]. `null` counts as absent.
    pub fn parse(raw: &[u8]) -> BatResult<Self> {
        let value: Value =
            serde_json::from_slice(raw).map_err(|e| BatError::schema(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Parse an already decoded JSON value.
    pub fn from_value(value: &Value) -> BatResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| BatError::schema("command must be a JSON object"))?;

        let mut cmd = Self::default();
        for (key, v) in obj {
            if v.is_null() {
                continue;
            }
            match key.as_str() {
                "camera" => cmd.camera = Some(parse_camera(v, &mut cmd.ignored)?),
                "pose" => cmd.pose = Some(parse_pose(v, &mut cmd.ignored)?),
                "frame" => cmd.frame = Some(parse_frame(v)?),
                "render" => cmd.render = Some(parse_render(v, &mut cmd.ignored)?),
                _ => cmd.ignored.push(format!("$.{key}")),
            }
        }
        if !cmd.ignored.is_empty() {
            tracing::debug!(ignored = ?cmd.ignored, "command keys ignored");
        }
        Ok(cmd)
    }

    /// Whether no sub-payload is present.
    pub fn is_empty(&self) -> bool {
        self.camera.is_none() && self.pose.is_none() && self.frame.is_none() && self.render.is_none()
    }
}

fn object<'a>(v: &'a Value, path: &str) -> BatResult<&'a Map<String, Value>> {
    v.as_object()
        .ok_or_else(|| BatError::validation(path, "must be an object"))
}

fn parse_camera(v: &Value, ignored: &mut Vec<String>) -> BatResult<CameraPatch> {
    let obj = object(v, "$.camera")?;
    let mut patch = CameraPatch::default();
    for (key, raw) in obj {
        let path = format!("$.camera.{key}");
        let Some(name) = CameraIntrinsics::canonical_field(key) else {
            ignored.push(path);
            continue;
        };
        if raw.is_null() {
            continue;
        }
        let value = raw
            .as_f64()
            .ok_or_else(|| BatError::validation(&path, "must be a number"))?;
        CameraIntrinsics::check_field(name, value)
            .map_err(|msg| BatError::validation(&path, msg))?;
        if patch.get(name).is_some() {
            return Err(BatError::validation(
                path,
                format!("'{name}' is given more than once"),
            ));
        }
        patch.set(name, value);
    }
    Ok(patch)
}

fn parse_pose(v: &Value, ignored: &mut Vec<String>) -> BatResult<PosePayload> {
    let obj = object(v, "$.pose")?;
    let mut name = None;
    let mut location = None;
    let mut rotation = None;
    for (key, raw) in obj {
        let path = format!("$.pose.{key}");
        if raw.is_null() {
            continue;
        }
        match key.as_str() {
            "name" | "object_name" => {
                let s = raw
                    .as_str()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| BatError::validation(&path, "must be a non-empty string"))?;
                if name.replace(s.to_string()).is_some() {
                    return Err(BatError::validation(
                        path,
                        "give either 'name' or 'object_name', not both",
                    ));
                }
            }
            "location" => location = Some(vec3(raw, &path)?),
            "rotation" => rotation = Some(vec3(raw, &path)?),
            _ => ignored.push(path),
        }
    }
    let name = name.ok_or_else(|| BatError::validation("$.pose.name", "is required"))?;
    Ok(PosePayload {
        name,
        location,
        rotation,
    })
}

fn vec3(v: &Value, path: &str) -> BatResult<Vec3> {
    let invalid = || BatError::validation(path, "must be an array of 3 finite numbers");
    let arr = v.as_array().ok_or_else(invalid)?;
    if arr.len() != 3 {
        return Err(invalid());
    }
    let mut out = [0.0; 3];
    for (slot, item) in out.iter_mut().zip(arr) {
        *slot = item.as_f64().filter(|x| x.is_finite()).ok_or_else(invalid)?;
    }
    Ok(out)
}

fn parse_frame(v: &Value) -> BatResult<i64> {
    v.as_i64()
        .ok_or_else(|| BatError::validation("$.frame", "must be an integer"))
}

fn parse_render(v: &Value, ignored: &mut Vec<String>) -> BatResult<RenderPayload> {
    if let Some(on) = v.as_bool() {
        return Ok(RenderPayload::Trigger(on));
    }
    let obj = v
        .as_object()
        .ok_or_else(|| BatError::validation("$.render", "must be a boolean or an object"))?;
    let mut req = RenderRequest::default();
    for (key, raw) in obj {
        let path = format!("$.render.{key}");
        let slot = match key.as_str() {
            "render" => &mut req.image,
            "annotation" => &mut req.annotation,
            _ => {
                ignored.push(path);
                continue;
            }
        };
        if raw.is_null() {
            continue;
        }
        *slot = raw
            .as_bool()
            .ok_or_else(|| BatError::validation(&path, "must be a boolean"))?;
    }
    Ok(RenderPayload::Explicit(req))
}

#[cfg(test)]
#[path = "../../tests/unit/command/schema.rs"]
mod tests;
