use std::collections::BTreeSet;

use crate::analysis::signal::{ActivityProfile, Band, decode_luma_grid};
use crate::analysis::{CoverageAnalysis, ImageCoverageAnalyzer};
use crate::config::DetectorConfig;
use crate::foundation::core::{Coverage, GenerationMode};

/// Coverage classification handed to every downstream stage.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CoverageResult {
    pub coverage: Coverage,
    pub allowed_mode: GenerationMode,
    /// Fraction of image height covered by visible content, `0..=1`.
    pub visible_ratio: f32,
    pub detected_landmarks: BTreeSet<String>,
    pub confidence: f32,
    pub allows_full_garment: bool,
    pub allows_dress: bool,
    /// Set when the image could not be analyzed and conservative defaults were substituted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

impl CoverageResult {
    pub fn new(
        coverage: Coverage,
        confidence: f32,
        visible_ratio: f32,
        detected_landmarks: BTreeSet<String>,
    ) -> Self {
        Self {
            coverage,
            allowed_mode: coverage.allowed_mode(),
            visible_ratio: visible_ratio.clamp(0.0, 1.0),
            detected_landmarks,
            confidence: confidence.clamp(0.0, 1.0),
            allows_full_garment: coverage == Coverage::FullBody,
            allows_dress: coverage == Coverage::FullBody,
            degraded: false,
        }
    }

    /// Safest possible answer, used when the image cannot be read.
    pub fn conservative() -> Self {
        Self {
            degraded: true,
            ..Self::new(Coverage::FaceOnly, 0.5, 0.0, BTreeSet::new())
        }
    }
}

/// Which fixed bands showed activity, plus the measured body height.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct BandReading {
    pub face: bool,
    pub shoulders: bool,
    pub hips: bool,
    pub knees: bool,
    pub body_height: f32,
}

impl BandReading {
    pub fn from_profile(profile: &ActivityProfile) -> Self {
        Self {
            face: profile.band_active(Band::Face),
            shoulders: profile.band_active(Band::Shoulders),
            hips: profile.band_active(Band::Hips),
            knees: profile.band_active(Band::Knees),
            body_height: profile.body_height(),
        }
    }

    pub fn landmarks(&self) -> BTreeSet<String> {
        [
            (self.face, Band::Face),
            (self.shoulders, Band::Shoulders),
            (self.hips, Band::Hips),
            (self.knees, Band::Knees),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .map(|(_, b)| b.landmark().to_string())
        .collect()
    }
}

/// Ordered decision table. First matching row wins.
pub fn classify(r: &BandReading) -> (Coverage, f32) {
    let torso = r.face && r.shoulders && r.hips;
    if torso && r.body_height > 0.6 {
        (Coverage::FullBody, (r.body_height + 0.3).min(1.0))
    } else if torso && r.body_height > 0.45 {
        (Coverage::FullBody, 0.7)
    } else if r.face && r.shoulders {
        (Coverage::UpperBody, 0.8)
    } else if r.face {
        (Coverage::FaceOnly, 0.9)
    } else {
        (Coverage::FaceOnly, 0.5)
    }
}

/// Row-wise edge-energy heuristic. Cheap, deterministic, and not a pose model.
#[derive(Clone, Debug, Default)]
pub struct EdgeActivityDetector {
    cfg: DetectorConfig,
}

impl EdgeActivityDetector {
    pub fn new(cfg: DetectorConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }

    pub fn analyze_profile(&self, profile: ActivityProfile) -> CoverageAnalysis {
        let reading = BandReading::from_profile(&profile);
        let (coverage, confidence) = classify(&reading);
        tracing::debug!(
            face = reading.face,
            shoulders = reading.shoulders,
            hips = reading.hips,
            knees = reading.knees,
            body_height = reading.body_height,
            %coverage,
            confidence,
            "coverage classified"
        );
        let result =
            CoverageResult::new(coverage, confidence, reading.body_height, reading.landmarks());
        let face_region = if reading.face {
            profile.face_region()
        } else {
            None
        };
        CoverageAnalysis {
            result,
            reading: Some(reading),
            face_region,
            profile: Some(profile),
        }
    }
}

impl ImageCoverageAnalyzer for EdgeActivityDetector {
    #[tracing::instrument(skip(self, image), fields(bytes = image.len()))]
    fn analyze(&self, image: &[u8]) -> CoverageAnalysis {
        match decode_luma_grid(image, self.cfg.grid_width, self.cfg.grid_height) {
            Ok(grid) => self.analyze_profile(ActivityProfile::measure(grid, &self.cfg)),
            Err(err) => {
                tracing::warn!(error = %err, "person image unreadable, using fail-safe coverage");
                CoverageAnalysis::conservative()
            }
        }
    }
}
