use super::*;

#[test]
fn patch_changes_only_present_fields() {
    let mut cam = CameraIntrinsics::default();
    let mut patch = CameraPatch::default();
    assert!(patch.set("p1", 0.5));
    assert!(patch.set("fx", 800.0));
    assert_eq!(
        patch.present().collect::<Vec<_>>(),
        vec![("fx", 800.0), ("p1", 0.5)]
    );
    let changed = patch.apply_to(&mut cam);
    assert_eq!(changed, vec!["fx", "p1"]);
    assert_eq!(cam.p1, 0.5);
    assert_eq!(cam.fx, 800.0);
    assert_eq!(cam.fy, CameraIntrinsics::default().fy);
}

#[test]
fn patch_rejects_unknown_names() {
    let mut patch = CameraPatch::default();
    assert!(!patch.set("bogus", 1.0));
    assert!(patch.is_empty());
}

#[test]
fn aliases_map_to_principal_point() {
    assert_eq!(CameraIntrinsics::canonical_field("px"), Some("cx"));
    assert_eq!(CameraIntrinsics::canonical_field("py"), Some("cy"));
    assert_eq!(CameraIntrinsics::canonical_field("k4"), Some("k4"));
    assert_eq!(CameraIntrinsics::canonical_field("zoom"), None);
}

#[test]
fn field_checks() {
    assert!(CameraIntrinsics::check_field("fx", 0.0).is_err());
    assert!(CameraIntrinsics::check_field("fx", f64::NAN).is_err());
    assert!(CameraIntrinsics::check_field("k1", -0.3).is_ok());
    assert!(CameraIntrinsics::check_field("cx", 0.0).is_ok());
}

#[test]
fn distortion_detection() {
    let mut cam = CameraIntrinsics::default();
    assert!(!cam.has_distortion());
    cam.k2 = 0.01;
    assert!(cam.has_distortion());
}

#[test]
fn focal_length_from_pixels() {
    let cam = CameraIntrinsics {
        fx: 1920.0,
        sensor_width: 36.0,
        ..CameraIntrinsics::default()
    };
    assert!((cam.focal_length_mm(1920) - 36.0).abs() < 1e-12);
}

#[test]
fn calibration_import_reads_matrix_and_dist() {
    let mut cam = CameraIntrinsics::default();
    cam.apply_calibration_json(
        r#"{
            "cam_mtx": [[1200, 0, 640], [0, 1100, 360], [0, 0, 1]],
            "dist": [0.1, 0.2, 0.01, 0.02, 0.3, 0.4]
        }"#,
    )
    .unwrap();
    assert_eq!((cam.fx, cam.fy, cam.cx, cam.cy), (1200.0, 1100.0, 640.0, 360.0));
    assert_eq!((cam.k1, cam.k2, cam.p1, cam.p2), (0.1, 0.2, 0.01, 0.02));
    assert_eq!((cam.k3, cam.k4), (0.3, 0.4));
}

#[test]
fn calibration_errors_leave_camera_untouched() {
    let mut cam = CameraIntrinsics::default();
    let err = cam
        .apply_calibration_json(r#"{ "cam_mtx": [[1, 0, 0], [0, 1, 0]], "dist": [1, 2, 3, 4, 5, 6] }"#)
        .unwrap_err();
    assert!(err.to_string().contains("$.cam_mtx"));

    let err = cam
        .apply_calibration_json(r#"{ "dist": [1, 2, 3] }"#)
        .unwrap_err();
    assert!(err.to_string().contains("$.dist"));

    assert!(matches!(
        cam.apply_calibration_json("[1, 2]").unwrap_err(),
        BatError::Schema(_)
    ));
    assert_eq!(cam, CameraIntrinsics::default());
}
