use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::annotation::frame::{AnnotationFrame, Channel, ChannelBuffer};
use crate::annotation::instances::InstanceId;
use crate::annotation::modality::ModalityFlags;
use crate::annotation::registry::{ClassId, ClassRegistry};
use crate::foundation::core::{ObjectHandle, Resolution};
use crate::foundation::error::{BatError, BatResult};
use crate::host::{AnnotationSource, ObjectMask, PassBuffer};

/// Inputs of one encode pass.
pub struct FrameState<'a> {
    /// Host frame number.
    pub frame: i64,
    /// Renderer surface supplying masks and passes.
    pub source: &'a dyn AnnotationSource,
    /// Classes and instance records; records are reconciled during the pass.
    pub registry: &'a mut ClassRegistry,
}

/// Builds the per-frame annotation layers.
#[derive(Clone, Copy, Debug)]
pub struct AnnotationEncoder {
    /// Attach the `{id: name}` manifest to every frame.
    pub export_class_info: bool,
}

impl Default for AnnotationEncoder {
    fn default() -> Self {
        Self {
            export_class_info: true,
        }
    }
}

struct Painter {
    class_id: ClassId,
    instance_id: InstanceId,
    mask: ObjectMask,
}

impl AnnotationEncoder {
    /// Encoder with an explicit manifest policy.
    pub fn new(export_class_info: bool) -> Self {
        Self { export_class_info }
    }

    /// Run one encode pass.
    ///
    /// Always produces `class_id`; produces `instance_id` when any class is instance-segmented and
    /// the auxiliary channels iff requested. Output depends only on registry, allocator and host
    /// state, so an unchanged scene encodes bit-identically.
    #[tracing::instrument(skip(self, state), fields(frame = state.frame))]
    pub fn encode(
        &self,
        state: FrameState<'_>,
        modalities: ModalityFlags,
    ) -> BatResult<AnnotationFrame> {
        let FrameState {
            frame,
            source,
            registry,
        } = state;
        let resolution = source.resolution();

        registry.instances_mut().reconcile(|h| source.is_alive(h));

        // Resolve every membership before any assignment: a missing collection fails the pass
        // with no new or moved instance records (stale ones are already gone).
        let mut memberships: Vec<(ClassId, bool, Vec<ObjectHandle>)> = Vec::new();
        for class in registry.list_classes() {
            let Some(collection) = &class.collection else {
                continue;
            };
            let mut members = source
                .collection_members(collection)
                .ok_or_else(|| BatError::not_found("collection", collection.clone()))?;
            members.sort_unstable();
            members.dedup();
            memberships.push((class.id, class.instance_segmentation, members));
        }

        let mut claimed: BTreeMap<ObjectHandle, ClassId> = BTreeMap::new();
        let mut painters: Vec<(ClassId, ObjectHandle, bool)> = Vec::new();
        for (class_id, instanced, members) in &memberships {
            for &object in members {
                if !source.is_alive(object) {
                    continue;
                }
                if let Some(owner) = claimed.get(&object) {
                    tracing::warn!(%object, owner = owner.0, skipped = class_id.0, "object already claimed by a lower class");
                    continue;
                }
                claimed.insert(object, *class_id);
                painters.push((*class_id, object, *instanced));
            }
        }

        // Objects that left their class, or whose class stopped tracking instances, give up
        // their IDs before new ones are handed out.
        let instanced_claims: BTreeMap<ObjectHandle, ClassId> = painters
            .iter()
            .filter(|(_, _, instanced)| *instanced)
            .map(|(c, o, _)| (*o, *c))
            .collect();
        registry
            .instances_mut()
            .retain(|rec| instanced_claims.get(&rec.object) == Some(&rec.class_id));

        let mut resolved = Vec::with_capacity(painters.len());
        for (class_id, object, instanced) in painters {
            let instance_id = if instanced {
                registry.instances_mut().assign(object, class_id)?
            } else {
                InstanceId::NONE
            };
            let Some(mask) = source.object_mask(object) else {
                continue;
            };
            if mask.resolution != resolution || mask.coverage.len() != resolution.pixel_count() {
                return Err(BatError::validation(
                    "object_mask",
                    format!("mask of {object} does not match the render resolution"),
                ));
            }
            resolved.push(Painter {
                class_id,
                instance_id,
                mask,
            });
        }

        let (class_ids, instance_ids) = paint(resolution, &resolved);
        let mut out = AnnotationFrame::new(frame, resolution);
        out.insert(ChannelBuffer::u16(Channel::ClassId, resolution, class_ids)?)?;
        if registry.any_instance_segmentation() {
            out.insert(ChannelBuffer::u16(
                Channel::InstanceId,
                resolution,
                instance_ids,
            )?)?;
        }

        if modalities.depth {
            let pass = require_pass(source.depth_pass(), "depth", resolution, 1)?;
            out.insert(ChannelBuffer::f32(Channel::Depth, resolution, pass.data)?)?;
        }
        if modalities.normal {
            let pass = require_pass(source.normal_pass(), "normal", resolution, 3)?;
            out.insert(ChannelBuffer::f32(Channel::Normal, resolution, pass.data)?)?;
        }
        if modalities.optical_flow {
            let pass = require_pass(source.vector_pass(), "vector", resolution, 4)?;
            out.insert(ChannelBuffer::f32(
                Channel::OpticalFlow,
                resolution,
                remap_flow(&pass.data),
            )?)?;
        }

        if self.export_class_info {
            out.manifest = Some(registry.manifest());
        }
        tracing::debug!(
            objects = resolved.len(),
            channels = out.channels.len(),
            "annotation frame encoded"
        );
        Ok(out)
    }
}

/// Paint class and instance IDs row by row; painters later in the list win overlaps.
fn paint(resolution: Resolution, painters: &[Painter]) -> (Vec<u16>, Vec<u16>) {
    let w = resolution.width as usize;
    let n = resolution.pixel_count();
    let mut class_ids = vec![ClassId::BACKGROUND.0; n];
    let mut instance_ids = vec![InstanceId::NONE.0; n];
    class_ids
        .par_chunks_mut(w)
        .zip(instance_ids.par_chunks_mut(w))
        .enumerate()
        .for_each(|(row, (classes, instances))| {
            let base = row * w;
            for p in painters {
                let mask = &p.mask.coverage[base..base + w];
                for (x, covered) in mask.iter().enumerate() {
                    if *covered {
                        classes[x] = p.class_id.0;
                        instances[x] = p.instance_id.0;
                    }
                }
            }
        });
    (class_ids, instance_ids)
}

fn require_pass(
    pass: Option<PassBuffer>,
    name: &str,
    resolution: Resolution,
    components: usize,
) -> BatResult<PassBuffer> {
    let pass = pass.ok_or_else(|| BatError::not_found("render pass", name))?;
    if pass.resolution != resolution
        || pass.components != components
        || pass.data.len() != resolution.pixel_count() * components
    {
        return Err(BatError::validation(
            format!("{name}_pass"),
            "pass shape does not match the render resolution",
        ));
    }
    Ok(pass)
}

/// `(bwd_x, bwd_y, fwd_x, fwd_y)` with Y up into `(fwd_y, -fwd_x, bwd_x, -bwd_y)`.
fn remap_flow(data: &[f32]) -> Vec<f32> {
    data.chunks_exact(4)
        .flat_map(|v| [v[3], -v[2], v[0], -v[1]])
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/annotation/encoder.rs"]
mod tests;
