use std::path::{Path, PathBuf};

use anyhow::Context as _;
use image::{ImageBuffer, Luma, Rgba};

use crate::annotation::frame::{AnnotationFrame, ChannelBuffer, ChannelData};
use crate::encode::sink::AnnotationSink;
use crate::foundation::error::{BatError, BatResult};

/// File name of the class manifest.
pub const CLASS_INFO_FILE: &str = "class_info.json";

/// Writes each layer of a frame as its own image file in one directory.
///
/// ID layers become 16-bit grayscale PNGs (values stored verbatim), float layers become 32-bit
/// float RGBA OpenEXR files. Files are named `<frame>_<channel>.<ext>` with the frame number
/// zero-padded to four digits.
#[derive(Clone, Debug)]
pub struct ImageDirSink {
    dir: PathBuf,
}

impl ImageDirSink {
    /// Sink writing into `dir`, created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a layer of `frame` is written to.
    pub fn layer_path(&self, frame: i64, buffer: &ChannelBuffer) -> PathBuf {
        let ext = match buffer.data {
            ChannelData::U16(_) => "png",
            ChannelData::F32(_) => "exr",
        };
        self.dir
            .join(format!("{frame:04}_{}.{ext}", buffer.channel.name()))
    }

    /// Path the preview of `frame` is written to.
    pub fn preview_path(&self, frame: i64) -> PathBuf {
        self.dir.join(format!("{frame:04}_preview.png"))
    }
}

impl AnnotationSink for ImageDirSink {
    fn write_frame(&mut self, frame: &AnnotationFrame) -> BatResult<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create annotation dir '{}'", self.dir.display()))?;
        let (w, h) = (frame.resolution.width, frame.resolution.height);

        for buffer in frame.channels.values() {
            let path = self.layer_path(frame.frame, buffer);
            match &buffer.data {
                ChannelData::U16(values) => write_luma16(&path, w, h, values.clone())?,
                ChannelData::F32(values) => {
                    write_rgba32f(&path, w, h, &expand_rgba(values, buffer.components))?
                }
            }
            tracing::debug!(path = %path.display(), "annotation layer written");
        }

        if let Some(manifest) = &frame.manifest {
            let path = self.dir.join(CLASS_INFO_FILE);
            let text = serde_json::to_string_pretty(manifest)
                .map_err(|e| BatError::serde(e.to_string()))?;
            std::fs::write(&path, text)
                .with_context(|| format!("write '{}'", path.display()))?;
        }

        if let Some(preview) = &frame.preview {
            let path = self.preview_path(frame.frame);
            let img = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(w, h, preview.clone())
                .ok_or_else(|| BatError::validation("preview", "buffer does not match resolution"))?;
            img.save(&path)
                .with_context(|| format!("write '{}'", path.display()))?;
        }
        Ok(())
    }
}

fn write_luma16(path: &Path, w: u32, h: u32, values: Vec<u16>) -> BatResult<()> {
    let img = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w, h, values)
        .ok_or_else(|| BatError::validation("layer", "buffer does not match resolution"))?;
    img.save(path)
        .with_context(|| format!("write '{}'", path.display()))?;
    Ok(())
}

/// Write any float layer through the OpenEXR encoder.
pub(crate) fn write_rgba32f(path: &Path, w: u32, h: u32, rgba: &[f32]) -> BatResult<()> {
    let img = ImageBuffer::<Rgba<f32>, Vec<f32>>::from_raw(w, h, rgba.to_vec())
        .ok_or_else(|| BatError::validation("layer", "buffer does not match resolution"))?;
    img.save_with_format(path, image::ImageFormat::OpenExr)
        .with_context(|| format!("write '{}'", path.display()))?;
    Ok(())
}

/// Pad 1, 3 or 4 component pixels to RGBA. Single values are replicated; alpha is 1.
pub(crate) fn expand_rgba(values: &[f32], components: usize) -> Vec<f32> {
    let components = components.max(1);
    values
        .chunks_exact(components)
        .flat_map(|px| match *px {
            [v] => [v, v, v, 1.0],
            [a, b] => [a, b, 0.0, 1.0],
            [a, b, c] => [a, b, c, 1.0],
            [a, b, c, d, ..] => [a, b, c, d],
            [] => [0.0, 0.0, 0.0, 1.0],
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/encode/image_dir.rs"]
mod tests;
