use super::*;

#[test]
fn handle_packs_index_and_generation() {
    let h = ObjectHandle::from_parts(7, 3);
    assert_eq!(h.index(), 7);
    assert_eq!(h.generation(), 3);
    assert!(!h.is_nil());
    assert_eq!(format!("{h}"), "7:3");
    assert_eq!(format!("{h:?}"), "ObjectHandle(7:3)");
}

#[test]
fn recycled_slot_does_not_alias() {
    let old = ObjectHandle::from_parts(4, 0);
    let new = ObjectHandle::from_parts(4, 1);
    assert_ne!(old, new);
    assert!(old < new);
}

#[test]
fn nil_handle_is_default() {
    assert!(ObjectHandle::default().is_nil());
    assert_eq!(ObjectHandle::nil().as_u64(), 0);
}

#[test]
fn rgb_rejects_out_of_range() {
    assert!(Rgb::new(0.0, 0.5, 1.0).is_ok());
    assert!(Rgb::new(1.5, 0.0, 0.0).is_err());
    assert!(Rgb::new(0.0, f32::NAN, 0.0).is_err());
}

#[test]
fn rgb_quantizes_to_opaque_rgba8() {
    assert_eq!(Rgb::WHITE.to_rgba8(), [255, 255, 255, 255]);
    assert_eq!(Rgb::BLACK.to_rgba8(), [0, 0, 0, 255]);
    assert_eq!(Rgb::new(0.5, 0.0, 1.0).unwrap().to_rgba8(), [128, 0, 255, 255]);
}

#[test]
fn resolution_validates_and_counts() {
    assert!(Resolution::new(0, 4).is_err());
    let r = Resolution::new(4, 3).unwrap();
    assert_eq!(r.pixel_count(), 12);
}
