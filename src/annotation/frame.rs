use std::collections::BTreeMap;

use crate::annotation::registry::{ClassId, ClassManifest, ClassRegistry};
use crate::foundation::core::Resolution;
use crate::foundation::error::{BatError, BatResult};

/// Named annotation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Semantic class ID per pixel (`u16`).
    ClassId,
    /// Instance ID within the pixel's class (`u16`, `0` = not tracked).
    InstanceId,
    /// Camera distance (`f32`).
    Depth,
    /// Surface normal (`f32 x 3`).
    Normal,
    /// Optical flow `(fwd_y, -fwd_x, bwd_x, -bwd_y)` (`f32 x 4`).
    OpticalFlow,
    /// Inverse lens distortion lookup `(source_y, source_x, valid)` (`f32 x 3`).
    DistortionMap,
}

impl Channel {
    /// Layer name used on disk and in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::ClassId => "class_id",
            Self::InstanceId => "instance_id",
            Self::Depth => "depth",
            Self::Normal => "normal",
            Self::OpticalFlow => "optical_flow",
            Self::DistortionMap => "distortion_map",
        }
    }

    /// Values per pixel.
    pub fn components(self) -> usize {
        match self {
            Self::ClassId | Self::InstanceId | Self::Depth => 1,
            Self::Normal | Self::DistortionMap => 3,
            Self::OpticalFlow => 4,
        }
    }
}

/// Pixel storage of one layer.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelData {
    /// Integer ID layers.
    U16(Vec<u16>),
    /// Float layers.
    F32(Vec<f32>),
}

/// One named layer, row-major, `components` interleaved values per pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelBuffer {
    /// Which layer this is.
    pub channel: Channel,
    /// Layer resolution (equals the render resolution).
    pub resolution: Resolution,
    /// Values per pixel.
    pub components: usize,
    /// Pixel values.
    pub data: ChannelData,
}

impl ChannelBuffer {
    /// Integer layer; `data` must hold exactly one value per pixel and component.
    pub fn u16(channel: Channel, resolution: Resolution, data: Vec<u16>) -> BatResult<Self> {
        check_len(channel, resolution, data.len())?;
        Ok(Self {
            channel,
            resolution,
            components: channel.components(),
            data: ChannelData::U16(data),
        })
    }

    /// Float layer; `data` must hold exactly one value per pixel and component.
    pub fn f32(channel: Channel, resolution: Resolution, data: Vec<f32>) -> BatResult<Self> {
        check_len(channel, resolution, data.len())?;
        Ok(Self {
            channel,
            resolution,
            components: channel.components(),
            data: ChannelData::F32(data),
        })
    }

    /// Integer values, if this is an integer layer.
    pub fn as_u16(&self) -> Option<&[u16]> {
        match &self.data {
            ChannelData::U16(v) => Some(v),
            ChannelData::F32(_) => None,
        }
    }

    /// Float values, if this is a float layer.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            ChannelData::F32(v) => Some(v),
            ChannelData::U16(_) => None,
        }
    }
}

fn check_len(channel: Channel, resolution: Resolution, len: usize) -> BatResult<()> {
    let expected = resolution.pixel_count() * channel.components();
    if len != expected {
        return Err(BatError::validation(
            channel.name(),
            format!("buffer holds {len} values, expected {expected}"),
        ));
    }
    Ok(())
}

/// Everything one annotation pass produced for a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationFrame {
    /// Host frame number.
    pub frame: i64,
    /// Render resolution shared by all layers.
    pub resolution: Resolution,
    /// Layers keyed by channel, in a fixed order.
    pub channels: BTreeMap<Channel, ChannelBuffer>,
    /// Class manifest, when class-info export is enabled.
    pub manifest: Option<ClassManifest>,
    /// RGBA8 visualization, when requested. Never part of the saved channels.
    pub preview: Option<Vec<u8>>,
}

impl AnnotationFrame {
    /// Empty frame.
    pub fn new(frame: i64, resolution: Resolution) -> Self {
        Self {
            frame,
            resolution,
            channels: BTreeMap::new(),
            manifest: None,
            preview: None,
        }
    }

    /// Layer for `channel`, if produced.
    pub fn get(&self, channel: Channel) -> Option<&ChannelBuffer> {
        self.channels.get(&channel)
    }

    /// Add or replace a layer. The layer must match the frame resolution.
    pub fn insert(&mut self, buffer: ChannelBuffer) -> BatResult<()> {
        if buffer.resolution != self.resolution {
            return Err(BatError::validation(
                buffer.channel.name(),
                "layer resolution differs from frame resolution",
            ));
        }
        self.channels.insert(buffer.channel, buffer);
        Ok(())
    }

    /// Colorized RGBA8 visualization of the ID layers.
    ///
    /// Instance-segmented classes are drawn from the instance palette, other classes in their
    /// class color, background black. Returns `None` without a `class_id` layer.
    pub fn preview_rgba8(&self, registry: &ClassRegistry) -> Option<Vec<u8>> {
        let classes = self.get(Channel::ClassId)?.as_u16()?;
        let instances = self.get(Channel::InstanceId).and_then(ChannelBuffer::as_u16);
        let palette = instance_palette();

        let mut out = Vec::with_capacity(classes.len() * 4);
        for (i, &class_id) in classes.iter().enumerate() {
            let class = registry.get(ClassId(class_id));
            let instance = instances.map_or(0, |v| v[i]);
            let rgba = match class {
                Some(c) if c.instance_segmentation && instance != 0 => {
                    palette[usize::from(instance - 1) % palette.len()]
                }
                Some(c) => c.color.to_rgba8(),
                None => [0, 0, 0, 255],
            };
            out.extend_from_slice(&rgba);
        }
        Some(out)
    }
}

/// Cyan, magenta and yellow ramps from bright to dark, interleaved.
pub fn instance_palette() -> Vec<[u8; 4]> {
    (1..=23u8)
        .rev()
        .flat_map(|step| {
            let v = step * 10;
            [[0, v, v, 255], [v, 0, v, 255], [v, v, 0, 255]]
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/annotation/frame.rs"]
mod tests;
