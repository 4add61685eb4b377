use super::*;
use crate::annotation::registry::ClassUpdate;
use crate::foundation::core::{Pose, Rgb};
use crate::host::memory::{Footprint, MemoryScene};

fn scene() -> MemoryScene {
    MemoryScene::new(Resolution::new(4, 2).unwrap())
}

fn place(scene: &mut MemoryScene, name: &str, collection: &str, x: u32, width: u32) -> ObjectHandle {
    let h = scene.add_object(name, Pose::default()).unwrap();
    scene
        .set_footprint(
            h,
            Footprint {
                x,
                y: 0,
                width,
                height: 1,
            },
        )
        .unwrap();
    scene.link(collection, h).unwrap();
    h
}

fn class(reg: &mut ClassRegistry, name: &str, collection: &str, instanced: bool) -> ClassId {
    let id = reg.add_class(name, Rgb::WHITE).unwrap();
    reg.update_class(
        id,
        ClassUpdate {
            instance_segmentation: Some(instanced),
            collection: Some(Some(collection.to_string())),
            ..ClassUpdate::default()
        },
    )
    .unwrap();
    id
}

fn encode(
    scene: &MemoryScene,
    reg: &mut ClassRegistry,
    modalities: ModalityFlags,
) -> BatResult<AnnotationFrame> {
    AnnotationEncoder::default().encode(
        FrameState {
            frame: 1,
            source: scene,
            registry: reg,
        },
        modalities,
    )
}

fn ids(frame: &AnnotationFrame, channel: Channel) -> Vec<u16> {
    frame.get(channel).unwrap().as_u16().unwrap().to_vec()
}

#[test]
fn single_car_instance_round_trip() {
    let mut s = scene();
    let mut reg = ClassRegistry::new();
    let car = class(&mut reg, "Car", "Cars", true);
    place(&mut s, "car.001", "Cars", 1, 2);

    let frame = encode(&s, &mut reg, ModalityFlags::NONE).unwrap();
    let classes = ids(&frame, Channel::ClassId);
    let instances = ids(&frame, Channel::InstanceId);
    assert_eq!(classes, vec![0, car.0, car.0, 0, 0, 0, 0, 0]);
    let k = instances[1];
    assert!(k > 0);
    for (c, i) in classes.iter().zip(&instances) {
        if *c == car.0 {
            assert_eq!(*i, k);
        } else {
            assert_eq!(*i, 0);
        }
    }
    assert_eq!(frame.manifest.as_ref().unwrap().0.get(&1).map(String::as_str), Some("Car"));
}

#[test]
fn instance_layer_only_when_requested_by_a_class() {
    let mut s = scene();
    let mut reg = ClassRegistry::new();
    class(&mut reg, "Tree", "Trees", false);
    place(&mut s, "tree", "Trees", 0, 1);
    let frame = encode(&s, &mut reg, ModalityFlags::NONE).unwrap();
    assert!(frame.get(Channel::ClassId).is_some());
    assert!(frame.get(Channel::InstanceId).is_none());
    assert!(frame.get(Channel::Depth).is_none());
}

#[test]
fn unchanged_scene_encodes_identically() {
    let mut s = scene();
    let mut reg = ClassRegistry::new();
    class(&mut reg, "Car", "Cars", true);
    place(&mut s, "a", "Cars", 0, 2);
    place(&mut s, "b", "Cars", 2, 2);
    let first = encode(&s, &mut reg, ModalityFlags::ALL).unwrap();
    let second = encode(&s, &mut reg, ModalityFlags::ALL).unwrap();
    assert_eq!(first, second);
    let instances = ids(&first, Channel::InstanceId);
    assert_eq!(&instances[0..4], &[1, 1, 2, 2]);
}

#[test]
fn deleted_objects_release_their_ids() {
    let mut s = scene();
    let mut reg = ClassRegistry::new();
    let car = class(&mut reg, "Car", "Cars", true);
    place(&mut s, "a", "Cars", 0, 1);
    let b = place(&mut s, "b", "Cars", 1, 1);
    encode(&s, &mut reg, ModalityFlags::NONE).unwrap();
    assert_eq!(reg.instances().get(b).unwrap().instance_id, InstanceId(2));

    s.remove_object("a").unwrap();
    let c = place(&mut s, "c", "Cars", 2, 1);
    encode(&s, &mut reg, ModalityFlags::NONE).unwrap();
    // b keeps its ID; the freed ID 1 goes to the newcomer.
    assert_eq!(reg.instances().get(b).unwrap().instance_id, InstanceId(2));
    assert_eq!(reg.instances().get(c).unwrap().instance_id, InstanceId(1));
    assert_eq!(reg.instances().class_records(car).count(), 2);
}

#[test]
fn lowest_class_claims_shared_objects() {
    let mut s = scene();
    let mut reg = ClassRegistry::new();
    let vehicle = class(&mut reg, "Vehicle", "Vehicles", false);
    class(&mut reg, "Car", "Cars", true);
    let h = place(&mut s, "car", "Cars", 0, 1);
    s.link("Vehicles", h).unwrap();

    let frame = encode(&s, &mut reg, ModalityFlags::NONE).unwrap();
    assert_eq!(ids(&frame, Channel::ClassId)[0], vehicle.0);
    assert_eq!(ids(&frame, Channel::InstanceId)[0], 0);
    assert!(reg.instances().is_empty());
}

#[test]
fn missing_collection_makes_no_new_assignments() {
    let mut s = scene();
    let mut reg = ClassRegistry::new();
    class(&mut reg, "Car", "Cars", true);
    let a = place(&mut s, "a", "Cars", 0, 1);
    let gone = place(&mut s, "gone", "Cars", 1, 1);
    encode(&s, &mut reg, ModalityFlags::NONE).unwrap();
    let a_id = reg.instances().get(a).unwrap().instance_id;

    class(&mut reg, "Ghost", "Nowhere", true);
    s.remove_object("gone").unwrap();
    let fresh = place(&mut s, "fresh", "Cars", 2, 1);

    let err = encode(&s, &mut reg, ModalityFlags::NONE).unwrap_err();
    assert!(matches!(err, BatError::NotFound { kind: "collection", .. }));
    assert_eq!(reg.instances().get(a).map(|r| r.instance_id), Some(a_id));
    assert!(reg.instances().get(fresh).is_none());
    // Stale records are reconciled even when the pass fails.
    assert!(reg.instances().get(gone).is_none());
}

#[test]
fn missing_pass_is_reported() {
    let mut s = scene();
    s.set_available_passes(ModalityFlags::NONE);
    let mut reg = ClassRegistry::new();
    let err = encode(
        &s,
        &mut reg,
        ModalityFlags {
            depth: true,
            ..ModalityFlags::NONE
        },
    )
    .unwrap_err();
    assert!(matches!(err, BatError::NotFound { kind: "render pass", .. }));
}

#[test]
fn optical_flow_is_remapped() {
    let mut s = scene();
    let mut reg = ClassRegistry::new();
    class(&mut reg, "Car", "Cars", false);
    let h = place(&mut s, "a", "Cars", 0, 1);
    s.set_velocity(h, [3.0, 5.0]).unwrap();
    let frame = encode(
        &s,
        &mut reg,
        ModalityFlags {
            optical_flow: true,
            ..ModalityFlags::NONE
        },
    )
    .unwrap();
    let flow = frame.get(Channel::OpticalFlow).unwrap().as_f32().unwrap();
    // Host order (bwd_x, bwd_y, fwd_x, fwd_y) = (-3, -5, 3, 5).
    assert_eq!(&flow[0..4], &[5.0, -3.0, -3.0, 5.0]);
}

#[test]
fn manifest_can_be_disabled() {
    let s = scene();
    let mut reg = ClassRegistry::new();
    let frame = AnnotationEncoder::new(false)
        .encode(
            FrameState {
                frame: 0,
                source: &s,
                registry: &mut reg,
            },
            ModalityFlags::NONE,
        )
        .unwrap();
    assert!(frame.manifest.is_none());
    assert!(ids(&frame, Channel::ClassId).iter().all(|c| *c == 0));
}
