use std::io::Cursor;

use vesture::{
    ConstraintPolicy, Coverage, GarmentTopology, GenerationMode, PipelineConfig, SceneChoice,
    TryOnPipeline, TryOnRequest, VestureError, compile::blocks::SectionKind,
};

fn encode(img: image::DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

/// Person stand-in: textured center columns down to `busy_rows`, flat gray below.
fn person(busy_rows: u32) -> Vec<u8> {
    encode(image::DynamicImage::ImageLuma8(image::GrayImage::from_fn(
        64,
        128,
        |x, y| {
            if y < busy_rows && (16..48).contains(&x) {
                image::Luma([if x % 2 == 0 { 40 } else { 210 }])
            } else {
                image::Luma([120])
            }
        },
    )))
}

fn garment(fg: impl Fn(u32, u32) -> bool) -> Vec<u8> {
    encode(image::DynamicImage::ImageRgba8(image::RgbaImage::from_fn(
        64,
        128,
        |x, y| {
            if fg(x, y) {
                image::Rgba([20, 40, 160, 255])
            } else {
                image::Rgba([250, 250, 250, 255])
            }
        },
    )))
}

fn dress() -> Vec<u8> {
    garment(|x, y| {
        let half = if y < 60 { 10 } else { 10 + (y - 60) / 4 };
        (4..124).contains(&y) && x + half >= 32 && x < 32 + half
    })
}

fn two_piece() -> Vec<u8> {
    garment(|x, y| {
        let pieces = (6..50).contains(&y) || (64..122).contains(&y);
        pieces && (12..52).contains(&x)
    })
}

fn pipeline() -> TryOnPipeline {
    TryOnPipeline::new(PipelineConfig::default()).unwrap()
}

#[test]
fn full_body_dress_compiles_full_try_on() {
    let req = TryOnRequest {
        person: person(90),
        garment: dress(),
        scene: SceneChoice::Preset("garden-daylight".to_string()),
        ..TryOnRequest::default()
    };
    let out = pipeline().prepare(&req).unwrap();

    assert_eq!(out.person.coverage.coverage, Coverage::FullBody);
    assert!(out.person.coverage.confidence >= 0.9);
    assert!(out.person.coverage.allows_dress);
    assert_eq!(out.garment.topology, GarmentTopology::Dress);
    assert!(!out.downgrade.degraded);

    let ins = &out.instruction;
    assert_eq!(ins.mode, GenerationMode::FullTryOn);
    for kind in [
        SectionKind::SceneIntegration,
        SectionKind::FaceLock,
        SectionKind::BodyLock,
    ] {
        assert!(!ins.section(kind).unwrap().is_empty(), "{kind:?}");
    }
    let control: serde_json::Value = serde_json::from_str(&ins.control_json).unwrap();
    assert_eq!(control["mode"], "FULL_TRY_ON");
    assert_eq!(control["task"]["topology"], "DRESS");
    assert_eq!(control["task"]["scene"], "garden-daylight@v1");
    assert!(ins.text().contains("### CONTROL"));
    assert!(out.report.passed());
}

#[test]
fn face_crop_with_two_piece_is_rejected() {
    let req = TryOnRequest {
        person: person(26),
        garment: two_piece(),
        ..TryOnRequest::default()
    };
    let err = pipeline().prepare(&req).unwrap_err();
    let VestureError::Constraint(e) = &err else {
        panic!("expected constraint error, got {err}");
    };
    assert_eq!(e.input_coverage, Coverage::FaceOnly);
    assert_eq!(e.required_coverage, Coverage::UpperBody);
    assert_eq!(e.garment_topology, Some(GarmentTopology::TwoPiece));
    assert_eq!(err.user_message(), e.message);
}

#[test]
fn face_crop_with_dress_downgrades_when_asked() {
    let p = TryOnPipeline::new(PipelineConfig {
        constraint_policy: ConstraintPolicy::Downgrade,
        ..PipelineConfig::default()
    })
    .unwrap();
    let req = TryOnRequest {
        person: person(26),
        garment: dress(),
        ..TryOnRequest::default()
    };
    let out = p.prepare(&req).unwrap();
    assert_eq!(out.instruction.mode, GenerationMode::UpperBodyPreviewOnly);
    assert!(out.downgrade.degraded);
    let note = out
        .instruction
        .section(SectionKind::CoverageConstraint)
        .unwrap()
        .rules
        .iter()
        .find(|r| r.id == "coverage_note")
        .unwrap();
    assert!(note.text.contains("full-body image required"));
}

#[test]
fn upper_body_face_region_feeds_spatial_lock() {
    let req = TryOnRequest {
        person: person(48),
        garment_hint: Some(GarmentTopology::Top),
        ..TryOnRequest::default()
    };
    let out = pipeline().prepare(&req).unwrap();
    assert_eq!(out.person.coverage.coverage, Coverage::UpperBody);
    let region = out.person.face_region.unwrap();
    let spatial = out.instruction.control.identity_lock.spatial.unwrap();
    let (cx, _) = region.center();
    assert!((spatial.center_x - cx).abs() < 1e-6);
    assert!((spatial.center_tolerance - 0.03).abs() < 1e-6);
}

#[test]
fn identical_requests_give_identical_instructions() {
    let req = TryOnRequest {
        person: person(90),
        garment: dress(),
        scene: SceneChoice::from_user_input(Some("a quiet museum hall")),
        ..TryOnRequest::default()
    };
    let p = pipeline();
    let a = p.prepare(&req).unwrap();
    let b = p.prepare(&req).unwrap();
    assert_eq!(a.instruction.text(), b.instruction.text());
    assert_eq!(a.instruction.fingerprint(), b.instruction.fingerprint());
}
