//! Coverage/topology compatibility. The only properties in the pipeline that are
//! mechanically checked rather than described to the engine.

use crate::analysis::coverage::CoverageResult;
use crate::analysis::garment::GarmentTopology;
use crate::foundation::core::{Coverage, GenerationMode};

/// The garment needs more of the body than the photo shows and no safe downgrade was
/// requested.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[error("{message} (detected {input_coverage}, requires {required_coverage})")]
pub struct GenerationConstraintError {
    pub message: String,
    pub input_coverage: Coverage,
    pub required_coverage: Coverage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub garment_topology: Option<GarmentTopology>,
}

/// Reject garments whose topology cannot be rendered on the detected coverage.
pub fn validate(
    coverage: &CoverageResult,
    topology: GarmentTopology,
) -> Result<(), GenerationConstraintError> {
    let required = topology.minimum_coverage();
    if coverage.coverage >= required {
        return Ok(());
    }
    Err(GenerationConstraintError {
        message: format!(
            "A {} try-on needs a {} photo; the uploaded photo only shows {}. Please upload a {} \
             image.",
            topology.human(),
            required.human(),
            coverage.coverage.human(),
            required.human(),
        ),
        input_coverage: coverage.coverage,
        required_coverage: required,
        garment_topology: Some(topology),
    })
}

/// Safe mode chosen instead of failing, with the explanation shown to the user.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Downgrade {
    pub mode: GenerationMode,
    pub message: String,
    /// `true` when `mode` is lower than what the garment would need for a full render.
    pub degraded: bool,
}

/// Best safe generation mode for `topology` on `coverage`. Never fails.
pub fn downgrade(coverage: &CoverageResult, topology: GarmentTopology) -> Downgrade {
    let have = coverage.coverage;
    let mode = have.allowed_mode();

    if have < topology.minimum_coverage() {
        let required = topology.minimum_coverage();
        return Downgrade {
            mode: GenerationMode::UpperBodyPreviewOnly,
            message: format!(
                "{} preview only - {} image required",
                capitalize(topology.human()),
                required.human()
            ),
            degraded: true,
        };
    }

    let full = topology.full_render_coverage();
    if have < full {
        let message = match (topology, mode) {
            (_, GenerationMode::UpperBodyPreviewOnly) => format!(
                "{} preview only - {} image recommended",
                capitalize(topology.human()),
                full.human()
            ),
            (GarmentTopology::Bottom, _) => format!(
                "Bottom shown down to the photo edge only - {} image recommended",
                full.human()
            ),
            _ => format!(
                "{} fades out at the photo edge - {} image recommended",
                capitalize(topology.human()),
                full.human()
            ),
        };
        return Downgrade {
            mode,
            message,
            degraded: true,
        };
    }

    Downgrade {
        mode,
        message: match mode {
            GenerationMode::FullTryOn => "Full try-on".to_string(),
            GenerationMode::UpperBodyWithFade => "Upper-body try-on".to_string(),
            GenerationMode::UpperBodyPreviewOnly => "Upper-body preview".to_string(),
        },
        degraded: false,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn cov(c: Coverage) -> CoverageResult {
        CoverageResult::new(c, 0.8, 0.5, BTreeSet::new())
    }

    #[test]
    fn dress_needs_full_body() {
        let err = validate(&cov(Coverage::UpperBody), GarmentTopology::Dress).unwrap_err();
        assert_eq!(err.required_coverage, Coverage::FullBody);
        assert_eq!(err.input_coverage, Coverage::UpperBody);
        assert_eq!(err.garment_topology, Some(GarmentTopology::Dress));

        let err = validate(&cov(Coverage::FaceOnly), GarmentTopology::Dress).unwrap_err();
        assert_eq!(err.required_coverage, Coverage::FullBody);

        validate(&cov(Coverage::FullBody), GarmentTopology::Dress).unwrap();
    }

    #[test]
    fn two_piece_needs_upper_body() {
        let err = validate(&cov(Coverage::FaceOnly), GarmentTopology::TwoPiece).unwrap_err();
        assert_eq!(err.required_coverage, Coverage::UpperBody);
        validate(&cov(Coverage::UpperBody), GarmentTopology::TwoPiece).unwrap();
        validate(&cov(Coverage::FullBody), GarmentTopology::TwoPiece).unwrap();
    }

    #[test]
    fn tops_and_bottoms_never_raise() {
        for c in [Coverage::FaceOnly, Coverage::UpperBody, Coverage::FullBody] {
            validate(&cov(c), GarmentTopology::Top).unwrap();
            validate(&cov(c), GarmentTopology::Bottom).unwrap();
        }
    }

    #[test]
    fn downgrade_face_only_dress_is_preview_with_reason() {
        let d = downgrade(&cov(Coverage::FaceOnly), GarmentTopology::Dress);
        assert_eq!(d.mode, GenerationMode::UpperBodyPreviewOnly);
        assert!(
            d.message.contains("full-body image required"),
            "{}",
            d.message
        );
        assert!(d.degraded);
    }

    #[test]
    fn downgrade_is_total() {
        for c in [Coverage::FaceOnly, Coverage::UpperBody, Coverage::FullBody] {
            for t in GarmentTopology::ALL {
                let d = downgrade(&cov(c), t);
                assert!(!d.message.is_empty());
                assert!(d.mode <= c.allowed_mode());
                if validate(&cov(c), t).is_err() {
                    assert_eq!(d.mode, GenerationMode::UpperBodyPreviewOnly);
                }
            }
        }
    }

    #[test]
    fn downgrade_full_body_dress_is_full_try_on() {
        let d = downgrade(&cov(Coverage::FullBody), GarmentTopology::Dress);
        assert_eq!(d.mode, GenerationMode::FullTryOn);
        assert!(!d.degraded);
    }

    #[test]
    fn upper_body_bottom_is_cropped_not_rejected() {
        let d = downgrade(&cov(Coverage::UpperBody), GarmentTopology::Bottom);
        assert_eq!(d.mode, GenerationMode::UpperBodyWithFade);
        assert!(d.degraded);
        assert!(d.message.contains("full-body image recommended"));
    }

    #[test]
    fn error_display_names_both_coverages() {
        let err = validate(&cov(Coverage::FaceOnly), GarmentTopology::TwoPiece).unwrap_err();
        let s = err.to_string();
        assert!(s.contains("FACE_ONLY"));
        assert!(s.contains("UPPER_BODY"));
    }
}
