#![forbid(unsafe_code)]
//! Visual constraint compilation for virtual garment try-on.
//!
//! A person photo and a garment photo go in; a single instruction for an external generative
//! image engine comes out. Along the way the crate:
//!
//! 1. classifies how much of the person is visible ([`EdgeActivityDetector`]),
//! 2. describes the visible body and face ([`BodyProfileAnalyzer`]),
//! 3. classifies the garment ([`GarmentTopologyClassifier`]),
//! 4. checks the garment against the coverage ([`constraint::validate`] /
//!    [`constraint::downgrade`]),
//! 5. picks a scene from the catalog ([`scene::library`]),
//! 6. compiles everything into one instruction ([`compile()`]).
//!
//! [`TryOnPipeline`] runs these stages for one request; [`GenerationInvoker`] hands the result
//! to an engine under a timeout.

pub mod analysis;
pub mod compile;
pub mod config;
pub mod constraint;
mod foundation;
pub mod invoke;
pub mod pipeline;
pub mod scene;
pub mod storage;

pub use analysis::body::{BodyProfile, BodyProfileAnalyzer};
pub use analysis::coverage::{CoverageResult, EdgeActivityDetector};
pub use analysis::garment::{GarmentTopology, GarmentTopologyClassifier, TopologyClassification};
pub use analysis::lighting::LightingBlueprint;
pub use analysis::{CoverageAnalysis, ImageCoverageAnalyzer};
pub use compile::{
    CompileInputs, CompiledInstruction, CoverageConstraint, FaceAnchor, InstructionFingerprint,
    compile,
};
pub use config::{ConstraintPolicy, DetectorConfig, PipelineConfig};
pub use constraint::{Downgrade, GenerationConstraintError};
pub use foundation::core::{AspectRatio, Coverage, GenerationMode, NormRect, Resolution};
pub use foundation::error::{VestureError, VestureResult};
pub use invoke::{
    CancelToken, EchoEngine, EngineFailure, GeneratedImage, GenerationEngine, GenerationInvoker,
    GenerationRequest,
};
pub use pipeline::{PreparedTryOn, StageReport, StageStatus, TryOnPipeline, TryOnRequest};
pub use scene::SceneChoice;
pub use scene::graph::{SceneGraph, build_scene_prompt};
pub use storage::{ArtifactStorage, BucketBackend, BucketCache, FsBucketBackend};
