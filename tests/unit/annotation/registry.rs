use super::*;
use crate::foundation::core::ObjectHandle;
use std::collections::HashSet;

fn red() -> Rgb {
    Rgb::new(1.0, 0.0, 0.0).unwrap()
}

#[test]
fn background_is_present_from_the_start() {
    let reg = ClassRegistry::new();
    let bg = reg.get(ClassId::BACKGROUND).unwrap();
    assert_eq!(bg.name, BACKGROUND_CLASS_NAME);
    assert_eq!(bg.color, Rgb::BLACK);
    assert_eq!(reg.len(), 1);
}

#[test]
fn background_cannot_be_removed() {
    let mut reg = ClassRegistry::new();
    let err = reg.remove_class(ClassId::BACKGROUND).unwrap_err();
    assert!(matches!(err, BatError::Validation { .. }));
    assert!(reg.get(ClassId::BACKGROUND).is_some());
}

#[test]
fn ids_are_monotonic_and_never_reused() {
    let mut reg = ClassRegistry::new();
    let car = reg.add_class("Car", red()).unwrap();
    let person = reg.add_class("Person", red()).unwrap();
    assert_eq!(car, ClassId(1));
    assert_eq!(person, ClassId(2));
    reg.remove_class(car).unwrap();
    let tree = reg.add_class("Tree", red()).unwrap();
    assert_eq!(tree, ClassId(3));
    // The name of a removed class is free again, the ID is not.
    let car_again = reg.add_class("Car", red()).unwrap();
    assert_eq!(car_again, ClassId(4));
}

#[test]
fn distinct_names_get_distinct_ids() {
    let mut reg = ClassRegistry::new();
    for i in 0..200 {
        reg.add_class(&format!("class-{i}"), red()).unwrap();
    }
    let ids: HashSet<ClassId> = reg.list_classes().map(|c| c.id).collect();
    assert_eq!(ids.len(), 201);
    assert!(ids.contains(&ClassId::BACKGROUND));
}

#[test]
fn duplicate_name_leaves_registry_unchanged() {
    let mut reg = ClassRegistry::new();
    reg.add_class("Car", red()).unwrap();
    let err = reg.add_class("Car", Rgb::WHITE).unwrap_err();
    assert!(matches!(err, BatError::DuplicateName(ref n) if n == "Car"));
    let err = reg.add_class(BACKGROUND_CLASS_NAME, Rgb::WHITE).unwrap_err();
    assert!(matches!(err, BatError::DuplicateName(_)));
    assert_eq!(reg.len(), 2);
    assert_eq!(reg.find_by_name("Car").unwrap().color, red());
}

#[test]
fn empty_name_is_rejected() {
    let mut reg = ClassRegistry::new();
    assert!(matches!(
        reg.add_class("   ", red()).unwrap_err(),
        BatError::Validation { .. }
    ));
}

#[test]
fn capacity_is_enforced_without_side_effects() {
    let mut reg = ClassRegistry::with_id_limit(3);
    for name in ["a", "b", "c"] {
        reg.add_class(name, red()).unwrap();
    }
    let err = reg.add_class("d", red()).unwrap_err();
    assert!(matches!(err, BatError::CapacityExceeded { limit: 3, .. }));
    assert_eq!(reg.len(), 4);
    assert!(reg.find_by_name("d").is_none());
    // Removing does not recycle IDs, so the space stays exhausted.
    reg.remove_class(ClassId(2)).unwrap();
    assert!(reg.add_class("d", red()).is_err());
}

#[test]
fn remove_missing_class_is_not_found() {
    let mut reg = ClassRegistry::new();
    assert!(matches!(
        reg.remove_class(ClassId(42)).unwrap_err(),
        BatError::NotFound { kind: "class", .. }
    ));
}

#[test]
fn removing_a_class_releases_its_instances() {
    let mut reg = ClassRegistry::new();
    let car = reg.add_class("Car", red()).unwrap();
    let person = reg.add_class("Person", red()).unwrap();
    let a = ObjectHandle::from_parts(1, 0);
    let b = ObjectHandle::from_parts(2, 0);
    reg.instances_mut().assign(a, car).unwrap();
    reg.instances_mut().assign(b, person).unwrap();
    reg.remove_class(car).unwrap();
    assert!(reg.instances().get(a).is_none());
    assert!(reg.instances().get(b).is_some());
}

#[test]
fn update_renames_and_checks_duplicates() {
    let mut reg = ClassRegistry::new();
    let car = reg.add_class("Car", red()).unwrap();
    reg.add_class("Truck", red()).unwrap();
    let err = reg
        .update_class(
            car,
            ClassUpdate {
                name: Some("Truck".into()),
                ..ClassUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, BatError::DuplicateName(_)));

    let updated = reg
        .update_class(
            car,
            ClassUpdate {
                name: Some("Vehicle".into()),
                color: Some(Rgb::WHITE),
                instance_segmentation: Some(true),
                collection: Some(Some("Vehicles".into())),
            },
        )
        .unwrap();
    assert_eq!(updated.name, "Vehicle");
    assert!(updated.instance_segmentation);
    assert!(reg.find_by_name("Car").is_none());
    assert_eq!(reg.find_by_name("Vehicle").unwrap().id, car);
    assert!(reg.any_instance_segmentation());
}

#[test]
fn disabling_instances_releases_records() {
    let mut reg = ClassRegistry::new();
    let car = reg.add_class("Car", red()).unwrap();
    reg.update_class(
        car,
        ClassUpdate {
            instance_segmentation: Some(true),
            ..ClassUpdate::default()
        },
    )
    .unwrap();
    reg.instances_mut()
        .assign(ObjectHandle::from_parts(1, 0), car)
        .unwrap();
    reg.update_class(
        car,
        ClassUpdate {
            instance_segmentation: Some(false),
            ..ClassUpdate::default()
        },
    )
    .unwrap();
    assert!(reg.instances().is_empty());
}

#[test]
fn background_only_accepts_color_updates() {
    let mut reg = ClassRegistry::new();
    assert!(
        reg.update_class(
            ClassId::BACKGROUND,
            ClassUpdate {
                name: Some("Sky".into()),
                ..ClassUpdate::default()
            },
        )
        .is_err()
    );
    let bg = reg
        .update_class(
            ClassId::BACKGROUND,
            ClassUpdate {
                color: Some(Rgb::WHITE),
                ..ClassUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(bg.color, Rgb::WHITE);
}

#[test]
fn manifest_maps_ids_to_names() {
    let mut reg = ClassRegistry::new();
    reg.add_class("Car", red()).unwrap();
    let json = serde_json::to_string(&reg.manifest()).unwrap();
    assert_eq!(json, r#"{"0":"Background","1":"Car"}"#);
}
