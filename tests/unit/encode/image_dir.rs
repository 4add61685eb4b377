use super::*;
use crate::annotation::frame::Channel;
use crate::annotation::registry::ClassManifest;
use crate::foundation::core::Resolution;

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "bat_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn frame() -> AnnotationFrame {
    let res = Resolution::new(3, 2).unwrap();
    let mut f = AnnotationFrame::new(7, res);
    f.insert(ChannelBuffer::u16(Channel::ClassId, res, vec![0, 1, 1, 0, 300, 65535]).unwrap())
        .unwrap();
    f.insert(
        ChannelBuffer::f32(Channel::Depth, res, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.5]).unwrap(),
    )
    .unwrap();
    f
}

#[test]
fn id_layers_round_trip_exactly() {
    let dir = temp_dir("id_layers");
    let mut sink = ImageDirSink::new(&dir);
    assert_eq!(sink.dir(), dir.as_path());
    let f = frame();
    sink.write_frame(&f).unwrap();

    let path = dir.join("0007_class_id.png");
    let img = image::open(&path).unwrap().into_luma16();
    assert_eq!(img.dimensions(), (3, 2));
    assert_eq!(img.into_raw(), vec![0, 1, 1, 0, 300, 65535]);
    assert!(!dir.join(CLASS_INFO_FILE).exists());
    assert!(!sink.preview_path(7).exists());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn float_layers_are_written_as_exr() {
    let dir = temp_dir("float_layers");
    let mut sink = ImageDirSink::new(&dir);
    sink.write_frame(&frame()).unwrap();

    let img = image::open(dir.join("0007_depth.exr")).unwrap().into_rgba32f();
    let px = img.get_pixel(2, 1).0;
    assert_eq!(px, [6.5, 6.5, 6.5, 1.0]);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn manifest_and_preview_are_optional_extras() {
    let dir = temp_dir("extras");
    let mut sink = ImageDirSink::new(&dir);
    let mut f = frame();
    f.manifest = Some(ClassManifest(
        [(0, "Background".to_string()), (1, "Car".to_string())].into(),
    ));
    f.preview = Some(vec![255; 3 * 2 * 4]);
    sink.write_frame(&f).unwrap();

    let text = std::fs::read_to_string(dir.join(CLASS_INFO_FILE)).unwrap();
    let parsed: ClassManifest = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, f.manifest.unwrap());
    assert!(sink.preview_path(7).exists());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn components_are_padded_to_rgba() {
    assert_eq!(expand_rgba(&[2.0], 1), vec![2.0, 2.0, 2.0, 1.0]);
    assert_eq!(expand_rgba(&[1.0, 2.0, 3.0], 3), vec![1.0, 2.0, 3.0, 1.0]);
    assert_eq!(
        expand_rgba(&[1.0, 2.0, 3.0, 4.0], 4),
        vec![1.0, 2.0, 3.0, 4.0]
    );
}
