use std::collections::{BTreeMap, BTreeSet};

use crate::annotation::registry::ClassId;
use crate::foundation::core::ObjectHandle;
use crate::foundation::error::{BatError, BatResult};

/// Largest instance ID a class scope can hold (the `instance_id` channel is 16-bit).
pub const INSTANCE_ID_LIMIT: u16 = u16::MAX;

/// Per-class instance identifier. `0` means "no instance / not tracked".
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct InstanceId(pub u16);

impl InstanceId {
    /// Reserved "not tracked" value; never allocated to an object.
    pub const NONE: Self = Self(0);

    /// Whether this is the reserved "not tracked" value.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Association of one host object with a class and its instance ID in that class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstanceRecord {
    /// Weak reference to the host object.
    pub object: ObjectHandle,
    /// Class scope the ID belongs to.
    pub class_id: ClassId,
    /// Instance ID, unique within `class_id`.
    pub instance_id: InstanceId,
}

/// Assigns stable, collision-free instance IDs per class.
///
/// Invariant: no two live records share `(class_id, instance_id)`. An object keeps its ID for as
/// long as it stays associated with the same class; released IDs become the first candidates for
/// the next allocation in that class (smallest unused ID wins).
#[derive(Clone, Debug)]
pub struct InstanceAllocator {
    records: BTreeMap<ObjectHandle, InstanceRecord>,
    used: BTreeMap<ClassId, BTreeSet<u16>>,
    limit: u16,
}

impl Default for InstanceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceAllocator {
    /// Allocator covering the full 16-bit instance channel.
    pub fn new() -> Self {
        Self::with_limit(INSTANCE_ID_LIMIT)
    }

    /// Allocator with a narrower ID space (`1..=limit`).
    pub fn with_limit(limit: u16) -> Self {
        Self {
            records: BTreeMap::new(),
            used: BTreeMap::new(),
            limit: limit.max(1),
        }
    }

    /// Return the object's ID in `class_id`, allocating the smallest unused ID if needed.
    ///
    /// An object tracked under a different class is moved: its old ID is released first.
    pub fn assign(&mut self, object: ObjectHandle, class_id: ClassId) -> BatResult<InstanceId> {
        if object.is_nil() {
            return Err(BatError::validation("object", "nil handle cannot be tracked"));
        }
        if let Some(rec) = self.records.get(&object) {
            if rec.class_id == class_id {
                return Ok(rec.instance_id);
            }
            self.release(object);
        }

        let used = self.used.entry(class_id).or_default();
        let Some(id) = smallest_free(used, self.limit) else {
            return Err(BatError::capacity("instance id", u32::from(self.limit)));
        };
        used.insert(id);
        let rec = InstanceRecord {
            object,
            class_id,
            instance_id: InstanceId(id),
        };
        self.records.insert(object, rec);
        tracing::debug!(%object, class = class_id.0, instance = id, "instance assigned");
        Ok(rec.instance_id)
    }

    /// Stop tracking `object`, freeing its ID for reuse.
    pub fn release(&mut self, object: ObjectHandle) -> Option<InstanceRecord> {
        let rec = self.records.remove(&object)?;
        if let Some(used) = self.used.get_mut(&rec.class_id) {
            used.remove(&rec.instance_id.0);
            if used.is_empty() {
                self.used.remove(&rec.class_id);
            }
        }
        Some(rec)
    }

    /// Release every record of a class. Returns how many were released.
    pub fn release_class(&mut self, class_id: ClassId) -> usize {
        self.used.remove(&class_id);
        let before = self.records.len();
        self.records.retain(|_, rec| rec.class_id != class_id);
        before - self.records.len()
    }

    /// Release records for which `keep` returns false; returns the released records.
    pub fn retain(&mut self, mut keep: impl FnMut(&InstanceRecord) -> bool) -> Vec<InstanceRecord> {
        let stale: Vec<ObjectHandle> = self
            .records
            .values()
            .filter(|rec| !keep(rec))
            .map(|rec| rec.object)
            .collect();
        stale
            .into_iter()
            .filter_map(|object| self.release(object))
            .collect()
    }

    /// Release records whose host object is gone.
    ///
    /// Objects deleted directly in the host are detected lazily here, at the start of each
    /// encode pass.
    pub fn reconcile(&mut self, is_alive: impl Fn(ObjectHandle) -> bool) -> Vec<InstanceRecord> {
        let released = self.retain(|rec| is_alive(rec.object));
        if !released.is_empty() {
            tracing::debug!(count = released.len(), "released stale instance records");
        }
        released
    }

    /// Record for `object`, if tracked.
    pub fn get(&self, object: ObjectHandle) -> Option<&InstanceRecord> {
        self.records.get(&object)
    }

    /// All records, ordered by object handle.
    pub fn records(&self) -> impl Iterator<Item = &InstanceRecord> {
        self.records.values()
    }

    /// Records of one class, ordered by object handle.
    pub fn class_records(&self, class_id: ClassId) -> impl Iterator<Item = &InstanceRecord> {
        self.records.values().filter(move |r| r.class_id == class_id)
    }

    /// Number of tracked objects.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn smallest_free(used: &BTreeSet<u16>, limit: u16) -> Option<u16> {
    let mut candidate: u16 = 1;
    for &id in used {
        if id > candidate {
            break;
        }
        if id == candidate {
            if candidate == limit {
                return None;
            }
            candidate += 1;
        }
    }
    (candidate <= limit).then_some(candidate)
}

#[cfg(test)]
#[path = "../../tests/unit/annotation/instances.rs"]
mod tests;
