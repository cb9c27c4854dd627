//! Heuristic image analysis: person coverage, body profile, source lighting and garment
//! topology.
//!
//! Nothing here runs a trained model. The coverage stage sits behind
//! [`ImageCoverageAnalyzer`] so a segmentation or pose model can replace it without touching
//! validation or compilation.

pub mod body;
pub mod coverage;
pub mod garment;
pub mod lighting;
pub mod signal;

use crate::analysis::coverage::{BandReading, CoverageResult};
use crate::analysis::signal::ActivityProfile;
use crate::foundation::core::NormRect;

/// Output of one coverage analysis call.
#[derive(Clone, Debug)]
pub struct CoverageAnalysis {
    pub result: CoverageResult,
    /// Band flags behind the classification, when the analyzer exposes them.
    pub reading: Option<BandReading>,
    /// Normalized face box, when a face band was detected.
    pub face_region: Option<NormRect>,
    /// Visible-region signal shared with the body profile stage.
    pub profile: Option<ActivityProfile>,
}

impl CoverageAnalysis {
    pub fn conservative() -> Self {
        Self {
            result: CoverageResult::conservative(),
            reading: None,
            face_region: None,
            profile: None,
        }
    }
}

/// Classifies how much of a person is visible in an encoded image.
///
/// Implementations must be total: unreadable or ambiguous input yields
/// [`CoverageAnalysis::conservative`], never an error, because every later stage needs a
/// valid [`CoverageResult`].
pub trait ImageCoverageAnalyzer: Send + Sync {
    fn analyze(&self, image: &[u8]) -> CoverageAnalysis;
}
