use std::collections::{BTreeMap, HashMap};

use crate::annotation::instances::InstanceAllocator;
use crate::foundation::core::Rgb;
use crate::foundation::error::{BatError, BatResult};

/// Largest class ID the `class_id` channel can hold (16-bit channel).
pub const CLASS_ID_LIMIT: u16 = u16::MAX;

/// Name of the always-present class with ID 0.
pub const BACKGROUND_CLASS_NAME: &str = "Background";

/// Semantic class identifier, written verbatim into the `class_id` channel.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ClassId(pub u16);

impl ClassId {
    /// The Background class.
    pub const BACKGROUND: Self = Self(0);
}

/// One user-defined semantic class.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SemanticClass {
    /// Stable ID, never reused within a session.
    pub id: ClassId,
    /// Unique display name.
    pub name: String,
    /// Visualization color (never written to saved channels).
    pub color: Rgb,
    /// Whether objects of this class get individual instance IDs.
    pub instance_segmentation: bool,
    /// Host collection whose objects belong to this class.
    pub collection: Option<String>,
}

/// Partial update for [`ClassRegistry::update_class`]; `None` fields are left unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassUpdate {
    /// New unique name.
    pub name: Option<String>,
    /// New visualization color.
    pub color: Option<Rgb>,
    /// Toggle instance segmentation.
    pub instance_segmentation: Option<bool>,
    /// Re-point the class at another collection (`Some(None)` detaches it).
    pub collection: Option<Option<String>>,
}

/// `{class id: class name}` mapping exported next to annotation buffers.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ClassManifest(pub BTreeMap<u16, String>);

/// Ordered collection of semantic classes, plus the instance records that belong to them.
///
/// IDs are assigned monotonically and never recycled, so a removed class can never be confused
/// with a class created later. Background (ID 0) is created on construction and cannot be removed.
#[derive(Clone, Debug)]
pub struct ClassRegistry {
    classes: BTreeMap<ClassId, SemanticClass>,
    names: HashMap<String, ClassId>,
    next_id: u32,
    limit: u16,
    instances: InstanceAllocator,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    /// Registry covering the full 16-bit class channel.
    pub fn new() -> Self {
        Self::with_id_limit(CLASS_ID_LIMIT)
    }

    /// Registry whose class IDs stop at `limit` (a narrower channel).
    pub fn with_id_limit(limit: u16) -> Self {
        let background = SemanticClass {
            id: ClassId::BACKGROUND,
            name: BACKGROUND_CLASS_NAME.to_string(),
            color: Rgb::BLACK,
            instance_segmentation: false,
            collection: None,
        };
        let mut classes = BTreeMap::new();
        let mut names = HashMap::new();
        names.insert(background.name.clone(), background.id);
        classes.insert(background.id, background);
        Self {
            classes,
            names,
            next_id: 1,
            limit,
            instances: InstanceAllocator::new(),
        }
    }

    /// Register a new class and return its ID.
    pub fn add_class(&mut self, name: &str, color: Rgb) -> BatResult<ClassId> {
        let name = validate_name(name)?;
        if self.names.contains_key(name) {
            return Err(BatError::duplicate_name(name));
        }
        if self.next_id > u32::from(self.limit) {
            return Err(BatError::capacity("class id", u32::from(self.limit)));
        }
        let id = ClassId(self.next_id as u16);
        self.next_id += 1;
        self.names.insert(name.to_string(), id);
        self.classes.insert(
            id,
            SemanticClass {
                id,
                name: name.to_string(),
                color,
                instance_segmentation: false,
                collection: None,
            },
        );
        tracing::debug!(id = id.0, name, "class added");
        Ok(id)
    }

    /// Remove a class and release the instance records that belonged to it.
    pub fn remove_class(&mut self, id: ClassId) -> BatResult<SemanticClass> {
        if id == ClassId::BACKGROUND {
            return Err(BatError::validation(
                "class",
                "the Background class cannot be removed",
            ));
        }
        let class = self
            .classes
            .remove(&id)
            .ok_or_else(|| BatError::not_found("class", id.0.to_string()))?;
        self.names.remove(&class.name);
        let released = self.instances.release_class(id);
        tracing::debug!(id = id.0, name = %class.name, released, "class removed");
        Ok(class)
    }

    /// Apply a partial update to a class.
    ///
    /// Turning instance segmentation off or re-pointing the collection ends the current
    /// object-to-class associations, so the class's instance records are released.
    pub fn update_class(&mut self, id: ClassId, update: ClassUpdate) -> BatResult<&SemanticClass> {
        let Some(current) = self.classes.get(&id) else {
            return Err(BatError::not_found("class", id.0.to_string()));
        };
        if id == ClassId::BACKGROUND
            && (update.name.is_some()
                || update.collection.is_some()
                || update.instance_segmentation == Some(true))
        {
            return Err(BatError::validation(
                "class",
                "only the color of the Background class can change",
            ));
        }

        let new_name = match &update.name {
            Some(name) => {
                let name = validate_name(name)?;
                match self.names.get(name) {
                    Some(owner) if *owner != id => return Err(BatError::duplicate_name(name)),
                    _ => Some(name.to_string()),
                }
            }
            None => None,
        };
        let release = update
            .instance_segmentation
            .is_some_and(|on| !on && current.instance_segmentation)
            || update
                .collection
                .as_ref()
                .is_some_and(|c| *c != current.collection);

        if release {
            self.instances.release_class(id);
        }
        let Some(class) = self.classes.get_mut(&id) else {
            return Err(BatError::not_found("class", id.0.to_string()));
        };
        if let Some(name) = new_name {
            self.names.remove(&class.name);
            self.names.insert(name.clone(), id);
            class.name = name;
        }
        if let Some(color) = update.color {
            class.color = color;
        }
        if let Some(on) = update.instance_segmentation {
            class.instance_segmentation = on;
        }
        if let Some(collection) = update.collection {
            class.collection = collection;
        }
        Ok(&*class)
    }

    /// Classes in ID order (Background first).
    pub fn list_classes(&self) -> impl Iterator<Item = &SemanticClass> {
        self.classes.values()
    }

    /// Look up a class by ID.
    pub fn get(&self, id: ClassId) -> Option<&SemanticClass> {
        self.classes.get(&id)
    }

    /// Look up a class by name.
    pub fn find_by_name(&self, name: &str) -> Option<&SemanticClass> {
        self.names.get(name).and_then(|id| self.classes.get(id))
    }

    /// Number of classes, Background included.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Always false: Background is always present.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Whether any class requests instance segmentation.
    pub fn any_instance_segmentation(&self) -> bool {
        self.classes.values().any(|c| c.instance_segmentation)
    }

    /// `{id: name}` manifest of every class.
    pub fn manifest(&self) -> ClassManifest {
        ClassManifest(
            self.classes
                .values()
                .map(|c| (c.id.0, c.name.clone()))
                .collect(),
        )
    }

    /// Instance records owned by this registry.
    pub fn instances(&self) -> &InstanceAllocator {
        &self.instances
    }

    /// Mutable access to the instance records.
    pub fn instances_mut(&mut self) -> &mut InstanceAllocator {
        &mut self.instances
    }
}

fn validate_name(name: &str) -> BatResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BatError::validation("name", "class name must not be empty"));
    }
    Ok(name)
}

#[cfg(test)]
#[path = "../../tests/unit/annotation/registry.rs"]
mod tests;
