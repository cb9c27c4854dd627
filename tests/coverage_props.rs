use std::io::Cursor;

use vesture::{
    Coverage, CoverageResult, DetectorConfig, EdgeActivityDetector, GarmentTopology,
    GenerationMode, ImageCoverageAnalyzer, constraint,
};

fn person(busy: impl Fn(u32) -> bool) -> Vec<u8> {
    let img = image::GrayImage::from_fn(64, 128, |x, y| {
        if busy(y) && (16..48).contains(&x) {
            image::Luma([if x % 2 == 0 { 25 } else { 230 }])
        } else {
            image::Luma([140])
        }
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn detect(bytes: &[u8]) -> CoverageResult {
    EdgeActivityDetector::new(DetectorConfig::default())
        .analyze(bytes)
        .result
}

#[test]
fn only_face_band_is_face_only() {
    let r = detect(&person(|y| y < 26));
    assert_eq!(r.coverage, Coverage::FaceOnly);
    assert_eq!(r.allowed_mode, GenerationMode::UpperBodyPreviewOnly);
    assert!((r.confidence - 0.9).abs() < 1e-6);
    assert!(r.detected_landmarks.contains("face"));
    assert!(!r.allows_full_garment);
}

#[test]
fn head_to_shoulders_is_upper_body() {
    let r = detect(&person(|y| y < 48));
    assert_eq!(r.coverage, Coverage::UpperBody);
    assert_eq!(r.allowed_mode, GenerationMode::UpperBodyWithFade);
    assert!(!r.allows_dress);
}

#[test]
fn tall_figure_is_full_body_with_high_confidence() {
    let r = detect(&person(|y| y < 90));
    assert_eq!(r.coverage, Coverage::FullBody);
    assert!(r.visible_ratio > 0.6);
    assert!(r.confidence >= 0.9);
    assert!(r.allows_dress && r.allows_full_garment);
}

#[test]
fn medium_figure_is_full_body_from_second_rule() {
    let r = detect(&person(|y| y < 64));
    assert_eq!(r.coverage, Coverage::FullBody);
    assert!((r.confidence - 0.7).abs() < 1e-6);
}

#[test]
fn flat_image_is_safest_default() {
    let r = detect(&person(|_| false));
    assert_eq!(r.coverage, Coverage::FaceOnly);
    assert!((r.confidence - 0.5).abs() < 1e-6);
    assert!(r.detected_landmarks.is_empty());
}

#[test]
fn detection_is_deterministic() {
    let bytes = person(|y| y < 70 || (95..100).contains(&y));
    let a = serde_json::to_string(&detect(&bytes)).unwrap();
    let b = serde_json::to_string(&detect(&bytes)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn validator_and_detector_agree_end_to_end() {
    let upper = detect(&person(|y| y < 48));
    let err = constraint::validate(&upper, GarmentTopology::Dress).unwrap_err();
    assert_eq!(err.required_coverage, Coverage::FullBody);

    let full = detect(&person(|y| y < 90));
    constraint::validate(&full, GarmentTopology::Dress).unwrap();
    constraint::validate(&full, GarmentTopology::TwoPiece).unwrap();
}
