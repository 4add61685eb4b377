use super::*;

fn small_camera() -> CameraIntrinsics {
    CameraIntrinsics {
        fx: 30.0,
        fy: 30.0,
        cx: 16.0,
        cy: 12.0,
        ..CameraIntrinsics::default()
    }
}

#[test]
fn zero_distortion_is_identity_projection() {
    let cam = small_camera();
    let (x, y) = distort(3.0, 7.0, &cam);
    assert!((x - 3.0).abs() < 1e-9);
    assert!((y - 7.0).abs() < 1e-9);
}

#[test]
fn barrel_distortion_pulls_corners_inward() {
    let cam = CameraIntrinsics {
        k1: -0.2,
        ..small_camera()
    };
    let (x, y) = distort(0.0, 0.0, &cam);
    assert!(x > 0.0 && y > 0.0);
    // The principal point is a fixed point.
    let (x, y) = distort(16.0, 12.0, &cam);
    assert!((x - 16.0).abs() < 1e-9 && (y - 12.0).abs() < 1e-9);
}

#[test]
fn identity_map_without_distortion() {
    let res = Resolution::new(32, 24).unwrap();
    let map = InverseDistortionMap::generate(res, &small_camera()).unwrap();
    assert_eq!(map.data.len(), 32 * 24 * 3);
    for (x, y) in [(0, 0), (31, 23), (10, 5)] {
        let (sy, sx, valid) = map.get(x, y).unwrap();
        assert!(valid);
        assert_eq!((sy, sx), (y as f32, x as f32));
    }
    assert!((map.coverage() - 1.0).abs() < 1e-12);
}

#[test]
fn holes_are_filled_within_image_bounds() {
    let cam = CameraIntrinsics {
        k1: -0.25,
        ..small_camera()
    };
    let res = Resolution::new(32, 24).unwrap();
    let map = InverseDistortionMap::generate(res, &cam).unwrap();
    assert!(map.coverage() < 1.0);
    for px in map.data.chunks_exact(3) {
        assert!(px[0].is_finite() && px[1].is_finite());
        assert!((0.0..24.0).contains(&px[0]));
        assert!((0.0..32.0).contains(&px[1]));
    }
}

#[test]
fn map_generation_is_deterministic() {
    let cam = CameraIntrinsics {
        k1: 0.1,
        p1: 0.01,
        ..small_camera()
    };
    let res = Resolution::new(20, 16).unwrap();
    let a = InverseDistortionMap::generate(res, &cam).unwrap();
    let b = InverseDistortionMap::generate(res, &cam).unwrap();
    assert_eq!(a, b);
}

#[test]
fn invalid_focal_length_is_rejected() {
    let cam = CameraIntrinsics {
        fx: 0.0,
        ..small_camera()
    };
    let res = Resolution::new(4, 4).unwrap();
    assert!(InverseDistortionMap::generate(res, &cam).is_err());
}

#[test]
fn fill_interpolates_linearly_along_a_row() {
    let values = [0.0, 0.0, 0.0, 3.0];
    let valid = [true, false, false, true];
    let filled = fill_missing(&values, &valid, 1, 4);
    assert!((filled[1] - 1.0).abs() < 1e-9);
    assert!((filled[2] - 2.0).abs() < 1e-9);
    assert_eq!(filled[0], 0.0);
    assert_eq!(filled[3], 3.0);
}

#[test]
fn meander_walks_alternate_rows_backwards() {
    // 2x2 grid; with flip = 1 the walk is (0,0) (0,1) (1,1) (1,0).
    let values = [0.0, 1.0, 0.0, 2.0];
    let valid = [true, true, false, true];
    let (inter, weights) = meander_pass(&values, &valid, 2, 2, 1);
    // (1,0) is after the last valid sample of the walk: undefined.
    assert!(inter[2].is_nan());
    assert!((weights[2] - 0.5).abs() < 1e-12);
    assert_eq!(inter[3], 2.0);
}

#[test]
fn channel_conversion_keeps_three_components() {
    let res = Resolution::new(4, 2).unwrap();
    let map = InverseDistortionMap::generate(
        res,
        &CameraIntrinsics {
            fx: 4.0,
            fy: 4.0,
            cx: 2.0,
            cy: 1.0,
            ..CameraIntrinsics::default()
        },
    )
    .unwrap();
    let buf = map.into_channel().unwrap();
    assert_eq!(buf.channel, Channel::DistortionMap);
    assert_eq!(buf.components, 3);
}

#[test]
fn direct_hits_come_from_projections_inside_the_image() {
    let res = Resolution::new(64, 48).unwrap();
    for k1 in [0.005, 0.01, 0.02, 0.05] {
        let cam = CameraIntrinsics {
            fx: 60.0,
            fy: 60.0,
            cx: 32.0,
            cy: 24.0,
            k1,
            ..CameraIntrinsics::default()
        };
        let map = InverseDistortionMap::generate(res, &cam).unwrap();
        for y in 0..48u32 {
            for x in 0..64u32 {
                let (sy, sx, valid) = map.get(x, y).unwrap();
                if !valid {
                    continue;
                }
                let (dx, dy) = distort(f64::from(sx), f64::from(sy), &cam);
                assert!(
                    (0.0..64.0).contains(&dx) && (0.0..48.0).contains(&dy),
                    "k1={k1}: ({x},{y}) hit from ({sx},{sy}) projecting to ({dx},{dy})"
                );
            }
        }
    }
}

#[test]
fn left_edge_overshoot_is_not_a_direct_hit() {
    // Source (0, 1) projects to x = -0.14, just outside the left edge.
    let cam = CameraIntrinsics {
        fx: 60.0,
        fy: 60.0,
        cx: 32.0,
        cy: 24.0,
        k1: 0.01,
        ..CameraIntrinsics::default()
    };
    let (dx, _) = distort(0.0, 1.0, &cam);
    assert!(dx < 0.0 && dx > -0.5);

    let map = InverseDistortionMap::generate(Resolution::new(64, 48).unwrap(), &cam).unwrap();
    for y in 0..48u32 {
        let (sy, sx, valid) = map.get(0, y).unwrap();
        assert!(!(valid && sx == 0.0 && sy == 1.0));
    }
}
