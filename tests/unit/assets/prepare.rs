use std::io::Cursor;

use super::*;

fn temp_root(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "montage_assets_{tag}_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_png(path: &Path, w: u32, h: u32) {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(path, buf).unwrap();
}

#[test]
fn normalize_rel_path_rules() {
    assert_eq!(normalize_rel_path("a/./b.png").unwrap(), "a/b.png");
    assert_eq!(normalize_rel_path("a\\b.png").unwrap(), "a/b.png");
    assert_eq!(normalize_rel_path("a//b.png").unwrap(), "a/b.png");
    assert!(normalize_rel_path("").is_err());
    assert!(normalize_rel_path("/abs.png").is_err());
    assert!(normalize_rel_path("../up.png").is_err());
    assert!(normalize_rel_path("./.").is_err());
}

#[test]
fn prepares_images_and_audio_from_root() {
    let root = temp_root("ok");
    std::fs::create_dir_all(root.join("img")).unwrap();
    write_png(&root.join("img/a.png"), 3, 2);
    std::fs::write(root.join("music.mp3"), b"id3").unwrap();

    let mut prep = LocalAssetPreparer::new(&root);
    let assets = prep
        .prepare(&[
            AssetRef::Image("img/a.png".to_owned()),
            AssetRef::Image("img/a.png".to_owned()),
            AssetRef::Audio(PathBuf::from("music.mp3")),
        ])
        .unwrap();

    let img = assets.image("img/a.png").unwrap();
    assert_eq!((img.width, img.height), (3, 2));
    assert_eq!(img.rgba8_premul.len(), 3 * 2 * 4);
    assert_eq!(assets.image_count(), 1);
    assert_eq!(
        assets.audio_path(Path::new("music.mp3")),
        Some(root.join("music.mp3").as_path())
    );

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn missing_files_are_preprocessing_errors() {
    let root = temp_root("missing");
    let mut prep = LocalAssetPreparer::new(&root);

    let err = prep
        .prepare(&[AssetRef::Image("nope.png".to_owned())])
        .unwrap_err();
    assert!(matches!(err, MontageError::Preprocessing(_)));

    let err = prep
        .prepare(&[AssetRef::Audio(PathBuf::from("nope.wav"))])
        .unwrap_err();
    assert!(matches!(err, MontageError::Preprocessing(_)));

    let err = prep
        .prepare(&[AssetRef::Image("../escape.png".to_owned())])
        .unwrap_err();
    assert!(matches!(err, MontageError::Preprocessing(_)));

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn unprepared_image_lookup_fails() {
    let assets = PreparedAssets::new();
    assert!(assets.image("x.png").is_err());
}
