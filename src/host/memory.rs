use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::annotation::modality::ModalityFlags;
use crate::camera::intrinsics::CameraIntrinsics;
use crate::foundation::core::{ObjectHandle, Pose, Resolution};
use crate::foundation::error::{BatError, BatResult};
use crate::host::{
    AnnotationSource, ObjectMask, PassBuffer, RenderOutcome, RenderRequest, SceneHost, SceneQuery,
};

/// Depth written where no object is visible.
pub const FAR_DEPTH: f32 = 1.0e10;

/// Screen-space rectangle an object covers, in pixels (clipped to the image).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Footprint {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl Footprint {
    fn covers(&self, x: u32, y: u32) -> bool {
        x >= self.x
            && y >= self.y
            && u64::from(x) < u64::from(self.x) + u64::from(self.width)
            && u64::from(y) < u64::from(self.y) + u64::from(self.height)
    }
}

#[derive(Clone, Debug)]
struct SceneObject {
    name: String,
    pose: Pose,
    footprint: Option<Footprint>,
    velocity: [f32; 2],
}

#[derive(Clone, Debug, Default)]
struct Slot {
    generation: u32,
    object: Option<SceneObject>,
}

#[derive(Debug)]
struct SceneState {
    // Slot 0 is never handed out so that index 0 stays the nil handle.
    slots: Vec<Slot>,
    free: Vec<u32>,
    names: HashMap<String, ObjectHandle>,
    collections: BTreeMap<String, BTreeSet<ObjectHandle>>,
    camera: CameraIntrinsics,
    frame: i64,
    resolution: Resolution,
    passes: ModalityFlags,
    output_dir: PathBuf,
    renders: Vec<RenderRequest>,
}

impl SceneState {
    fn object(&self, handle: ObjectHandle) -> Option<&SceneObject> {
        let slot = self.slots.get(handle.index() as usize)?;
        if handle.is_nil() || slot.generation != handle.generation() {
            return None;
        }
        slot.object.as_ref()
    }

    fn object_mut(&mut self, handle: ObjectHandle) -> Option<&mut SceneObject> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if handle.is_nil() || slot.generation != handle.generation() {
            return None;
        }
        slot.object.as_mut()
    }

    fn pose(&self, name: &str) -> Option<Pose> {
        let handle = *self.names.get(name)?;
        self.object(handle).map(|o| o.pose)
    }

    /// Live objects with a footprint, in handle order (the painter order).
    fn visible(&self) -> Vec<(ObjectHandle, &SceneObject)> {
        let mut out: Vec<_> = self
            .names
            .values()
            .filter_map(|h| self.object(*h).map(|o| (*h, o)))
            .filter(|(_, o)| o.footprint.is_some())
            .collect();
        out.sort_by_key(|(h, _)| *h);
        out
    }

    /// Topmost object at each pixel, or `None`.
    fn coverage_map(&self) -> Vec<Option<&SceneObject>> {
        let w = self.resolution.width;
        let visible = self.visible();
        (0..self.resolution.pixel_count())
            .map(|i| {
                let x = (i % w as usize) as u32;
                let y = (i / w as usize) as u32;
                visible
                    .iter()
                    .rev()
                    .find(|(_, o)| o.footprint.is_some_and(|f| f.covers(x, y)))
                    .map(|(_, o)| *o)
            })
            .collect()
    }
}

/// In-memory reference host.
///
/// Objects are axis-aligned screen rectangles. Later handles occlude earlier ones, so masks are
/// occlusion-resolved the way a real renderer's would be. All state lives behind one lock;
/// [`MemoryScene::query`] hands out a read-only view for the server thread.
#[derive(Clone, Debug)]
pub struct MemoryScene {
    state: Arc<RwLock<SceneState>>,
}

/// Read-only, thread-safe view of a [`MemoryScene`].
#[derive(Clone, Debug)]
pub struct MemorySceneQuery {
    state: Arc<RwLock<SceneState>>,
}

impl MemoryScene {
    /// Empty scene rendered at `resolution`.
    pub fn new(resolution: Resolution) -> Self {
        let camera = CameraIntrinsics {
            cx: f64::from(resolution.width) / 2.0,
            cy: f64::from(resolution.height) / 2.0,
            ..CameraIntrinsics::default()
        };
        Self {
            state: Arc::new(RwLock::new(SceneState {
                slots: vec![Slot::default()],
                free: Vec::new(),
                names: HashMap::new(),
                collections: BTreeMap::new(),
                camera,
                frame: 0,
                resolution,
                passes: ModalityFlags::ALL,
                output_dir: PathBuf::from("render"),
                renders: Vec::new(),
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SceneState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SceneState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read-only view for synchronous GET handlers.
    pub fn query(&self) -> MemorySceneQuery {
        MemorySceneQuery {
            state: Arc::clone(&self.state),
        }
    }

    /// Add a named object. Names are unique.
    pub fn add_object(&mut self, name: &str, pose: Pose) -> BatResult<ObjectHandle> {
        let mut st = self.write();
        if st.names.contains_key(name) {
            return Err(BatError::duplicate_name(name));
        }
        let object = SceneObject {
            name: name.to_string(),
            pose,
            footprint: None,
            velocity: [0.0; 2],
        };
        let handle = match st.free.pop() {
            Some(index) => {
                let slot = &mut st.slots[index as usize];
                slot.object = Some(object);
                ObjectHandle::from_parts(index, slot.generation)
            }
            None => {
                let index = u32::try_from(st.slots.len())
                    .map_err(|_| BatError::capacity("object slot", u32::MAX))?;
                st.slots.push(Slot {
                    generation: 0,
                    object: Some(object),
                });
                ObjectHandle::from_parts(index, 0)
            }
        };
        st.names.insert(name.to_string(), handle);
        Ok(handle)
    }

    /// Delete an object. Its slot is recycled with a bumped generation.
    pub fn remove_object(&mut self, name: &str) -> BatResult<ObjectHandle> {
        let mut st = self.write();
        let handle = st
            .names
            .remove(name)
            .ok_or_else(|| BatError::not_found("object", name))?;
        let slot = &mut st.slots[handle.index() as usize];
        slot.object = None;
        slot.generation = slot.generation.wrapping_add(1);
        st.free.push(handle.index());
        for members in st.collections.values_mut() {
            members.remove(&handle);
        }
        Ok(handle)
    }

    /// Handle of a named object.
    pub fn handle(&self, name: &str) -> Option<ObjectHandle> {
        self.read().names.get(name).copied()
    }

    /// Name of a live object.
    pub fn name_of(&self, handle: ObjectHandle) -> Option<String> {
        self.read().object(handle).map(|o| o.name.clone())
    }

    /// Set the screen rectangle an object covers.
    pub fn set_footprint(&mut self, handle: ObjectHandle, footprint: Footprint) -> BatResult<()> {
        let mut st = self.write();
        let obj = st
            .object_mut(handle)
            .ok_or_else(|| BatError::not_found("object", handle.to_string()))?;
        obj.footprint = Some(footprint);
        Ok(())
    }

    /// Set an object's forward screen-space motion in pixels per frame (Y up).
    pub fn set_velocity(&mut self, handle: ObjectHandle, velocity: [f32; 2]) -> BatResult<()> {
        let mut st = self.write();
        let obj = st
            .object_mut(handle)
            .ok_or_else(|| BatError::not_found("object", handle.to_string()))?;
        obj.velocity = velocity;
        Ok(())
    }

    /// Create an empty collection (no-op when it exists).
    pub fn create_collection(&mut self, name: &str) {
        self.write().collections.entry(name.to_string()).or_default();
    }

    /// Link an object into a collection, creating the collection if needed.
    pub fn link(&mut self, collection: &str, handle: ObjectHandle) -> BatResult<()> {
        let mut st = self.write();
        if st.object(handle).is_none() {
            return Err(BatError::not_found("object", handle.to_string()));
        }
        st.collections
            .entry(collection.to_string())
            .or_default()
            .insert(handle);
        Ok(())
    }

    /// Render passes the host can supply.
    pub fn set_available_passes(&mut self, passes: ModalityFlags) {
        self.write().passes = passes;
    }

    /// Directory rendered images are reported in.
    pub fn set_output_dir(&mut self, dir: impl Into<PathBuf>) {
        self.write().output_dir = dir.into();
    }

    /// Directory rendered images are reported in.
    pub fn output_dir(&self) -> PathBuf {
        self.read().output_dir.clone()
    }

    /// Every render request received so far, oldest first.
    pub fn renders(&self) -> Vec<RenderRequest> {
        self.read().renders.clone()
    }
}

impl SceneHost for MemoryScene {
    fn camera(&self) -> CameraIntrinsics {
        self.read().camera
    }

    fn set_camera(&mut self, camera: CameraIntrinsics) -> BatResult<()> {
        self.write().camera = camera;
        Ok(())
    }

    fn object_pose(&self, name: &str) -> Option<Pose> {
        self.read().pose(name)
    }

    fn set_object_pose(&mut self, name: &str, pose: Pose) -> BatResult<()> {
        let mut st = self.write();
        let handle = *st
            .names
            .get(name)
            .ok_or_else(|| BatError::not_found("object", name))?;
        let obj = st
            .object_mut(handle)
            .ok_or_else(|| BatError::not_found("object", name))?;
        obj.pose = pose;
        Ok(())
    }

    fn current_frame(&self) -> i64 {
        self.read().frame
    }

    fn set_frame(&mut self, frame: i64) -> BatResult<()> {
        self.write().frame = frame;
        Ok(())
    }

    fn render(&mut self, request: RenderRequest) -> BatResult<RenderOutcome> {
        let mut st = self.write();
        st.renders.push(request);
        let frame = st.frame;
        let image = request
            .image
            .then(|| st.output_dir.join(format!("{frame:04}.png")));
        tracing::debug!(frame, image = request.image, "memory scene rendered");
        Ok(RenderOutcome {
            frame,
            image,
            annotated: false,
        })
    }
}

impl AnnotationSource for MemoryScene {
    fn resolution(&self) -> Resolution {
        self.read().resolution
    }

    fn is_alive(&self, object: ObjectHandle) -> bool {
        self.read().object(object).is_some()
    }

    fn collection_members(&self, collection: &str) -> Option<Vec<ObjectHandle>> {
        self.read()
            .collections
            .get(collection)
            .map(|m| m.iter().copied().collect())
    }

    fn object_mask(&self, object: ObjectHandle) -> Option<ObjectMask> {
        let st = self.read();
        let target = st.object(object)?;
        let coverage = st
            .coverage_map()
            .into_iter()
            .map(|top| top.is_some_and(|o| std::ptr::eq(o, target)))
            .collect();
        Some(ObjectMask {
            resolution: st.resolution,
            coverage,
        })
    }

    fn depth_pass(&self) -> Option<PassBuffer> {
        let st = self.read();
        if !st.passes.depth {
            return None;
        }
        let data = st
            .coverage_map()
            .into_iter()
            .map(|top| match top {
                Some(o) => {
                    let [x, y, z] = o.pose.location;
                    (x * x + y * y + z * z).sqrt() as f32
                }
                None => FAR_DEPTH,
            })
            .collect();
        Some(PassBuffer {
            resolution: st.resolution,
            components: 1,
            data,
        })
    }

    fn normal_pass(&self) -> Option<PassBuffer> {
        let st = self.read();
        if !st.passes.normal {
            return None;
        }
        let data = st
            .coverage_map()
            .into_iter()
            .flat_map(|top| match top {
                Some(_) => [0.0, 0.0, 1.0],
                None => [0.0; 3],
            })
            .collect();
        Some(PassBuffer {
            resolution: st.resolution,
            components: 3,
            data,
        })
    }

    fn vector_pass(&self) -> Option<PassBuffer> {
        let st = self.read();
        if !st.passes.optical_flow {
            return None;
        }
        let data = st
            .coverage_map()
            .into_iter()
            .flat_map(|top| match top {
                Some(o) => {
                    let [vx, vy] = o.velocity;
                    [-vx, -vy, vx, vy]
                }
                None => [0.0; 4],
            })
            .collect();
        Some(PassBuffer {
            resolution: st.resolution,
            components: 4,
            data,
        })
    }
}

impl SceneQuery for MemorySceneQuery {
    fn frame(&self) -> i64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .frame
    }

    fn pose(&self, name: &str) -> Option<Pose> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .pose(name)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/host/memory.rs"]
mod tests;
