use std::path::Path;

use anyhow::Context as _;

use crate::annotation::modality::ModalityFlags;
use crate::foundation::error::{BatError, BatResult};

/// Default TCP port of the remote command server.
pub const DEFAULT_PORT: u16 = 12345;

/// Top-level configuration, loadable from a JSON file.
///
/// Every section is optional in the file; missing sections and fields take their defaults.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BatConfig {
    /// Remote command server settings.
    pub server: ServerConfig,
    /// Annotation output settings.
    pub output: OutputConfig,
    /// Auxiliary channels produced for every annotation pass.
    pub modalities: ModalityFlags,
}

/// Remote command server settings.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind. `0` picks an ephemeral port.
    pub port: u16,
    /// Largest accepted request body.
    pub body_limit_bytes: usize,
    /// Upper bound on reading a request's headers, and separately on reading its body.
    /// Connections that stall longer are closed.
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            body_limit_bytes: 64 * 1024,
            request_timeout_ms: 2_000,
        }
    }
}

/// Annotation output settings.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory name for annotation files, created next to the render output.
    pub annotation_dir: String,
    /// Whether a bare `"render": true` also produces annotations.
    pub save_annotation: bool,
    /// Attach the `{id: name}` class manifest to every annotation frame.
    pub export_class_info: bool,
    /// Write a colorized preview image next to the channels.
    pub write_preview: bool,
    /// Export the inverse lens distortion map when the camera has distortion.
    pub distortion_map: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            annotation_dir: "annotations".to_string(),
            save_annotation: true,
            export_class_info: true,
            write_preview: false,
            distortion_map: true,
        }
    }
}

impl BatConfig {
    /// Parse and validate a configuration from JSON text.
    pub fn from_json_str(text: &str) -> BatResult<Self> {
        let cfg: Self = serde_json::from_str(text).map_err(|e| BatError::serde(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> BatResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> BatResult<()> {
        if self.server.host.trim().is_empty() {
            return Err(BatError::validation("$.server.host", "must be non-empty"));
        }
        if self.server.body_limit_bytes == 0 {
            return Err(BatError::validation(
                "$.server.body_limit_bytes",
                "must be > 0",
            ));
        }
        if self.server.request_timeout_ms == 0 {
            return Err(BatError::validation(
                "$.server.request_timeout_ms",
                "must be > 0",
            ));
        }
        if self.output.annotation_dir.trim().is_empty() {
            return Err(BatError::validation(
                "$.output.annotation_dir",
                "must be non-empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
