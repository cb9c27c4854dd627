use std::path::Path;

use anyhow::Context as _;

use crate::foundation::core::AspectRatio;
use crate::foundation::error::{VestureError, VestureResult};

/// Tunables for the edge-activity coverage heuristic.
///
/// Thresholds are expressed on the normalized activity scale: mean absolute intensity
/// difference between horizontal neighbors divided by 255.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    pub grid_width: u32,
    pub grid_height: u32,
    /// Fraction of the grid width (centered) scanned for activity.
    pub center_band: f32,
    /// A row counts as "busy" above this activity.
    pub row_threshold: f32,
    /// The bottom edge is the lowest row above this activity.
    pub background_threshold: f32,
    /// A vertical band is active when at least this fraction of its rows is busy.
    pub band_fill: f32,
    /// Per-pixel neighbor difference (0..=255) that marks a column as busy when
    /// measuring spans and segments.
    pub pixel_edge: u8,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            grid_width: 64,
            grid_height: 128,
            center_band: 0.5,
            row_threshold: 0.08,
            background_threshold: 0.02,
            band_fill: 0.5,
            pixel_edge: 24,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> VestureResult<()> {
        if self.grid_width < 8 || self.grid_height < 16 {
            return Err(VestureError::validation(
                "detector grid must be at least 8x16",
            ));
        }
        if !(self.center_band > 0.0 && self.center_band <= 1.0) {
            return Err(VestureError::validation(
                "detector center_band must be in (0, 1]",
            ));
        }
        for (name, v) in [
            ("row_threshold", self.row_threshold),
            ("background_threshold", self.background_threshold),
            ("band_fill", self.band_fill),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(VestureError::validation(format!(
                    "detector {name} must be in [0, 1], got {v}"
                )));
            }
        }
        if self.background_threshold > self.row_threshold {
            return Err(VestureError::validation(
                "detector background_threshold must not exceed row_threshold",
            ));
        }
        Ok(())
    }
}

/// What the pipeline does when the garment needs more body than the photo shows.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintPolicy {
    /// Fail the request with a `GenerationConstraintError`.
    #[default]
    Reject,
    /// Continue in the safest mode the photo supports.
    Downgrade,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub detector: DetectorConfig,
    pub constraint_policy: ConstraintPolicy,
    pub default_aspect_ratio: AspectRatio,
    pub generation_timeout_ms: u64,
    pub identity_references_max: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            constraint_policy: ConstraintPolicy::Reject,
            default_aspect_ratio: AspectRatio::default(),
            generation_timeout_ms: 60_000,
            identity_references_max: 3,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(s: &str) -> VestureResult<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> VestureResult<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read pipeline config '{}'", path.display()))?;
        Self::from_json_str(&s)
    }

    pub fn validate(&self) -> VestureResult<()> {
        self.detector.validate()?;
        if self.generation_timeout_ms == 0 {
            return Err(VestureError::validation(
                "generation_timeout_ms must be > 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = PipelineConfig::from_json_str(
            r#"{ "constraint_policy": "downgrade", "detector": { "row_threshold": 0.1 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.constraint_policy, ConstraintPolicy::Downgrade);
        assert_eq!(cfg.detector.row_threshold, 0.1);
        assert_eq!(cfg.detector.grid_width, 64);
        assert_eq!(cfg.generation_timeout_ms, 60_000);
    }

    #[test]
    fn policy_names_match_between_cli_and_json() {
        use clap::ValueEnum as _;

        for policy in [ConstraintPolicy::Reject, ConstraintPolicy::Downgrade] {
            let name = policy.to_possible_value().unwrap().get_name().to_string();
            assert_eq!(ConstraintPolicy::from_str(&name, false).unwrap(), policy);
            assert_eq!(
                serde_json::to_string(&policy).unwrap(),
                format!("\"{name}\"")
            );
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = PipelineConfig::from_json_str(r#"{ "nope": 1 }"#).unwrap_err();
        assert!(err.to_string().contains("serialization error:"));
    }

    #[test]
    fn out_of_range_thresholds_are_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.detector.band_fill = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.detector.background_threshold = 0.5;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.generation_timeout_ms = 0;
        assert!(cfg.validate().is_err());
    }
}
