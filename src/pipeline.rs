//! One try-on request end to end: analyze, validate, compile, and optionally generate.

use std::time::Instant;

use rayon::prelude::*;

use crate::analysis::body::{BodyProfile, BodyProfileAnalyzer};
use crate::analysis::coverage::{BandReading, CoverageResult, EdgeActivityDetector};
use crate::analysis::garment::{GarmentTopology, GarmentTopologyClassifier, TopologyClassification};
use crate::analysis::lighting::{LightingBlueprint, LightingSource, estimate_lighting};
use crate::analysis::{CoverageAnalysis, ImageCoverageAnalyzer};
use crate::compile::{CompileInputs, CompiledInstruction, CoverageConstraint, FaceAnchor, compile};
use crate::config::{ConstraintPolicy, PipelineConfig};
use crate::constraint::{self, Downgrade};
use crate::foundation::core::{AspectRatio, NormRect, Resolution};
use crate::foundation::error::{VestureError, VestureResult};
use crate::invoke::{
    CancelToken, GeneratedImage, GenerationEngine, GenerationInvoker, GenerationRequest,
};
use crate::scene::SceneChoice;

/// Raw inputs of one try-on.
#[derive(Clone, Debug, Default)]
pub struct TryOnRequest {
    pub person: Vec<u8>,
    /// Extra photos of the same person, used only for facial identity.
    pub identity_images: Vec<Vec<u8>>,
    pub garment: Vec<u8>,
    /// Seller-declared category; skips topology classification.
    pub garment_hint: Option<GarmentTopology>,
    pub garment_description: Option<String>,
    pub scene: SceneChoice,
    /// Caller lighting; always wins over scene and estimated lighting.
    pub lighting: Option<LightingBlueprint>,
    pub face_anchor: Option<String>,
    pub pose_summary: Option<String>,
    pub appearance_summary: Option<String>,
    pub aspect_ratio: Option<AspectRatio>,
    pub resolution: Resolution,
    pub retry_mode: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StageStatus {
    Pass,
    /// The stage stopped the run, or its output is a fail-safe default.
    Fail,
    Skip,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct StageRecord {
    pub index: usize,
    pub name: &'static str,
    pub status: StageStatus,
    pub elapsed_ms: f64,
    pub data: serde_json::Value,
}

/// Numbered log of what each stage did for one request.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct StageReport {
    pub stages: Vec<StageRecord>,
}

impl StageReport {
    fn record(
        &mut self,
        name: &'static str,
        status: StageStatus,
        elapsed_ms: f64,
        data: serde_json::Value,
    ) {
        tracing::debug!(stage = name, ?status, elapsed_ms, "stage finished");
        self.stages.push(StageRecord {
            index: self.stages.len() + 1,
            name,
            status,
            elapsed_ms,
            data,
        });
    }

    pub fn stage(&self, name: &str) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn passed(&self) -> bool {
        self.stages.iter().all(|s| s.status != StageStatus::Fail)
    }
}

/// Everything learned from the person photo.
#[derive(Clone, Debug, serde::Serialize)]
pub struct PersonAnalysis {
    pub coverage: CoverageResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bands: Option<BandReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_region: Option<NormRect>,
    pub body: BodyProfile,
    pub lighting: LightingBlueprint,
    #[serde(skip)]
    timings: PersonTimings,
}

#[derive(Clone, Copy, Debug, Default)]
struct PersonTimings {
    coverage_ms: f64,
    body_ms: f64,
    lighting_ms: f64,
}

/// Result of [`TryOnPipeline::prepare`]: the compiled instruction plus the analysis behind it.
#[derive(Clone, Debug, serde::Serialize)]
pub struct PreparedTryOn {
    pub person: PersonAnalysis,
    pub garment: TopologyClassification,
    pub downgrade: Downgrade,
    pub instruction: CompiledInstruction,
    pub report: StageReport,
}

pub struct TryOnPipeline {
    config: PipelineConfig,
    analyzer: Box<dyn ImageCoverageAnalyzer>,
    body: BodyProfileAnalyzer,
    garment: GarmentTopologyClassifier,
}

impl TryOnPipeline {
    pub fn new(config: PipelineConfig) -> VestureResult<Self> {
        let analyzer = Box::new(EdgeActivityDetector::new(config.detector.clone()));
        Self::with_analyzer(config, analyzer)
    }

    /// Use a different coverage analyzer, e.g. a model-backed one.
    pub fn with_analyzer(
        config: PipelineConfig,
        analyzer: Box<dyn ImageCoverageAnalyzer>,
    ) -> VestureResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            analyzer,
            body: BodyProfileAnalyzer,
            garment: GarmentTopologyClassifier,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Coverage, body profile and source lighting of a person photo. Never fails.
    pub fn analyze_person(&self, image: &[u8]) -> PersonAnalysis {
        let t0 = Instant::now();
        let CoverageAnalysis {
            result,
            reading,
            face_region,
            profile,
        } = self.analyzer.analyze(image);
        let coverage_ms = elapsed_ms(t0);

        let t1 = Instant::now();
        let body = self.body.analyze(
            profile.as_ref(),
            reading.as_ref(),
            face_region,
            result.coverage,
        );
        let body_ms = elapsed_ms(t1);

        let t2 = Instant::now();
        let lighting = profile
            .as_ref()
            .map(|p| estimate_lighting(&p.grid))
            .unwrap_or_default();
        let lighting_ms = elapsed_ms(t2);

        PersonAnalysis {
            coverage: result,
            bands: reading,
            face_region,
            body,
            lighting,
            timings: PersonTimings {
                coverage_ms,
                body_ms,
                lighting_ms,
            },
        }
    }

    pub fn classify_garment(
        &self,
        image: &[u8],
        hint: Option<GarmentTopology>,
    ) -> TopologyClassification {
        match hint {
            Some(t) => TopologyClassification::hinted(t),
            None => self.garment.classify(image),
        }
    }

    /// Analyze both photos, check coverage against topology, and compile the instruction.
    ///
    /// Fails only with [`VestureError::Constraint`], and only under
    /// [`ConstraintPolicy::Reject`].
    #[tracing::instrument(skip(self, req), fields(retry = req.retry_mode))]
    pub fn prepare(&self, req: &TryOnRequest) -> VestureResult<PreparedTryOn> {
        let mut report = StageReport::default();

        let t_garment = Instant::now();
        let (person, (garment, garment_ms)) = rayon::join(
            || self.analyze_person(&req.person),
            || {
                let g = self.classify_garment(&req.garment, req.garment_hint);
                (g, elapsed_ms(t_garment))
            },
        );
        record_person_stages(&mut report, &person, req.lighting.is_some());
        report.record(
            "garment_topology",
            if garment.hinted {
                StageStatus::Skip
            } else if garment.degraded {
                StageStatus::Fail
            } else {
                StageStatus::Pass
            },
            garment_ms,
            serde_json::json!({
                "topology": garment.topology,
                "confidence": garment.confidence,
                "hinted": garment.hinted,
            }),
        );

        let t = Instant::now();
        if self.config.constraint_policy == ConstraintPolicy::Reject
            && let Err(err) = constraint::validate(&person.coverage, garment.topology)
        {
            report.record(
                "constraint",
                StageStatus::Fail,
                elapsed_ms(t),
                serde_json::json!({
                    "input_coverage": err.input_coverage,
                    "required_coverage": err.required_coverage,
                }),
            );
            tracing::warn!(error = %err, "request rejected by coverage constraint");
            return Err(err.into());
        }
        let downgrade = constraint::downgrade(&person.coverage, garment.topology);
        if downgrade.degraded {
            tracing::info!(
                mode = %downgrade.mode,
                message = %downgrade.message,
                "generation downgraded"
            );
        }
        report.record(
            "constraint",
            StageStatus::Pass,
            elapsed_ms(t),
            serde_json::json!({
                "mode": downgrade.mode,
                "degraded": downgrade.degraded,
                "message": downgrade.message,
            }),
        );

        let given = req.identity_images.len();
        let identity_references = given.min(self.config.identity_references_max);
        if identity_references < given {
            tracing::warn!(
                given,
                used = identity_references,
                "extra identity images dropped"
            );
        }

        let t = Instant::now();
        let inputs = CompileInputs {
            garment_description: req.garment_description.clone(),
            garment_topology: Some(garment.topology),
            scene: req.scene.clone(),
            lighting: Some(match &req.lighting {
                Some(l) => LightingBlueprint {
                    source: LightingSource::Caller,
                    ..l.clone()
                },
                None => person.lighting.clone(),
            }),
            body_anchor: Some(person.body.clone()),
            face_anchor: Some(FaceAnchor {
                description: req.face_anchor.clone(),
                region: person.face_region,
            }),
            pose_summary: req.pose_summary.clone(),
            appearance_summary: req.appearance_summary.clone(),
            coverage_constraint: Some(CoverageConstraint::downgraded(&person.coverage, &downgrade)),
            aspect_ratio: req.aspect_ratio.unwrap_or(self.config.default_aspect_ratio),
            resolution: req.resolution,
            identity_references,
            retry_mode: req.retry_mode,
        };
        let instruction = compile(&inputs);
        report.record(
            "compile",
            StageStatus::Pass,
            elapsed_ms(t),
            serde_json::json!({
                "fingerprint": instruction.fingerprint().to_string(),
                "scene": instruction.control.task.scene,
                "sections": instruction.sections.len(),
            }),
        );

        Ok(PreparedTryOn {
            person,
            garment,
            downgrade,
            instruction,
            report,
        })
    }

    /// Prepare independent requests on a rayon pool. Results keep input order.
    pub fn prepare_many(
        &self,
        requests: &[TryOnRequest],
        threads: Option<usize>,
    ) -> VestureResult<Vec<VestureResult<PreparedTryOn>>> {
        let pool = build_thread_pool(threads)?;
        let results = pool.install(|| requests.par_iter().map(|r| self.prepare(r)).collect());
        Ok(results)
    }

    pub fn invoker(&self, engine: std::sync::Arc<dyn GenerationEngine>) -> GenerationInvoker {
        GenerationInvoker::new(
            engine,
            std::time::Duration::from_millis(self.config.generation_timeout_ms),
        )
    }

    /// Send a prepared instruction and the request's images to the engine.
    pub fn generate(
        &self,
        req: &TryOnRequest,
        prepared: &PreparedTryOn,
        invoker: &GenerationInvoker,
        cancel: &CancelToken,
    ) -> VestureResult<GeneratedImage> {
        let instruction = &prepared.instruction;
        let used = instruction.control.identity_lock.reference_images.len();
        let identity = &req.identity_images[..used.min(req.identity_images.len())];
        let request = GenerationRequest::new(instruction, &req.person, identity, &req.garment);
        Ok(invoker.invoke(request, cancel)?)
    }
}

fn record_person_stages(report: &mut StageReport, person: &PersonAnalysis, caller_lighting: bool) {
    report.record(
        "coverage",
        if person.coverage.degraded {
            StageStatus::Fail
        } else {
            StageStatus::Pass
        },
        person.timings.coverage_ms,
        serde_json::json!({
            "coverage": person.coverage.coverage,
            "confidence": person.coverage.confidence,
            "visible_ratio": person.coverage.visible_ratio,
            "landmarks": person.coverage.detected_landmarks,
        }),
    );
    report.record(
        "body_profile",
        if person.bands.is_some() {
            StageStatus::Pass
        } else {
            StageStatus::Skip
        },
        person.timings.body_ms,
        serde_json::json!({
            "measured": person.body.body_descriptors().len(),
        }),
    );
    let source = if caller_lighting {
        LightingSource::Caller
    } else {
        person.lighting.source
    };
    report.record(
        "lighting",
        if caller_lighting {
            StageStatus::Skip
        } else {
            StageStatus::Pass
        },
        person.timings.lighting_ms,
        serde_json::json!({
            "source": source,
        }),
    );
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

fn build_thread_pool(threads: Option<usize>) -> VestureResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(VestureError::validation("'threads' must be >= 1 when set"));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| VestureError::validation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use super::*;
    use crate::foundation::core::{Coverage, GenerationMode};
    use crate::invoke::{EchoEngine, EngineFailure};

    fn png(img: image::GrayImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    /// Alternating stripes in the center columns for rows `0..busy_rows`, flat elsewhere.
    fn person(busy_rows: u32) -> Vec<u8> {
        png(image::GrayImage::from_fn(64, 128, |x, y| {
            if y < busy_rows && (16..48).contains(&x) {
                image::Luma([if x % 2 == 0 { 30 } else { 220 }])
            } else {
                image::Luma([128])
            }
        }))
    }

    fn pipeline(policy: ConstraintPolicy) -> TryOnPipeline {
        TryOnPipeline::new(PipelineConfig {
            constraint_policy: policy,
            ..PipelineConfig::default()
        })
        .unwrap()
    }

    fn status(out: &PreparedTryOn, stage: &str) -> StageStatus {
        out.report.stage(stage).unwrap().status
    }

    struct FixedCoverage(Coverage);

    impl ImageCoverageAnalyzer for FixedCoverage {
        fn analyze(&self, _image: &[u8]) -> CoverageAnalysis {
            CoverageAnalysis {
                result: CoverageResult::new(self.0, 0.95, 0.8, Default::default()),
                ..CoverageAnalysis::conservative()
            }
        }
    }

    #[test]
    fn injected_analyzer_drives_validation_and_compile() {
        let p = TryOnPipeline::with_analyzer(
            PipelineConfig::default(),
            Box::new(FixedCoverage(Coverage::FullBody)),
        )
        .unwrap();
        let req = TryOnRequest {
            person: person(26),
            garment_hint: Some(GarmentTopology::Dress),
            ..TryOnRequest::default()
        };
        let out = p.prepare(&req).unwrap();
        assert_eq!(out.person.coverage.coverage, Coverage::FullBody);
        assert!(!out.downgrade.degraded);
        assert_eq!(out.instruction.mode, GenerationMode::FullTryOn);
        assert_eq!(status(&out, "coverage"), StageStatus::Pass);
    }

    #[test]
    fn reject_policy_surfaces_constraint_error() {
        let req = TryOnRequest {
            person: person(26),
            garment_hint: Some(GarmentTopology::Dress),
            ..TryOnRequest::default()
        };
        let p = pipeline(ConstraintPolicy::Reject);
        let err = p.prepare(&req).unwrap_err();
        let VestureError::Constraint(e) = err else {
            panic!("expected constraint error, got {err}");
        };
        assert_eq!(e.input_coverage, Coverage::FaceOnly);
        assert_eq!(e.required_coverage, Coverage::FullBody);
    }

    #[test]
    fn downgrade_policy_compiles_preview() {
        let req = TryOnRequest {
            person: person(26),
            garment_hint: Some(GarmentTopology::Dress),
            ..TryOnRequest::default()
        };
        let out = pipeline(ConstraintPolicy::Downgrade).prepare(&req).unwrap();
        assert_eq!(out.instruction.mode, GenerationMode::UpperBodyPreviewOnly);
        assert!(out.downgrade.message.contains("full-body image required"));
        let names = out.report.stages.iter().map(|s| s.name).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "coverage",
                "body_profile",
                "lighting",
                "garment_topology",
                "constraint",
                "compile",
            ]
        );
        assert_eq!(status(&out, "garment_topology"), StageStatus::Skip);
        assert!(out.report.passed());
        assert_eq!(out.report.stages[5].index, 6);
    }

    #[test]
    fn unreadable_person_is_conservative_not_fatal() {
        let req = TryOnRequest {
            person: b"not an image".to_vec(),
            garment_hint: Some(GarmentTopology::Top),
            ..TryOnRequest::default()
        };
        let out = pipeline(ConstraintPolicy::Reject).prepare(&req).unwrap();
        assert_eq!(out.person.coverage.coverage, Coverage::FaceOnly);
        assert!(out.person.coverage.degraded);
        assert_eq!(status(&out, "coverage"), StageStatus::Fail);
        assert_eq!(status(&out, "body_profile"), StageStatus::Skip);
    }

    #[test]
    fn caller_lighting_is_marked_and_used() {
        let req = TryOnRequest {
            person: person(48),
            garment_hint: Some(GarmentTopology::Top),
            scene: SceneChoice::Preset("studio-seamless".to_string()),
            lighting: Some(LightingBlueprint {
                color_temperature_k: 3000,
                ..LightingBlueprint::default()
            }),
            ..TryOnRequest::default()
        };
        let out = pipeline(ConstraintPolicy::Reject).prepare(&req).unwrap();
        let l = &out.instruction.control.task.lighting;
        assert_eq!(l.source, LightingSource::Caller);
        assert_eq!(l.color_temperature_k, 3000);
        assert_eq!(status(&out, "lighting"), StageStatus::Skip);
    }

    #[test]
    fn identity_images_are_capped() {
        let req = TryOnRequest {
            person: person(48),
            identity_images: vec![person(20); 5],
            garment_hint: Some(GarmentTopology::Top),
            ..TryOnRequest::default()
        };
        let p = pipeline(ConstraintPolicy::Reject);
        let out = p.prepare(&req).unwrap();
        let lock = &out.instruction.control.identity_lock;
        assert_eq!(lock.reference_images, vec![2, 3, 4]);
        assert_eq!(out.instruction.control.task.garment_image, 5);
    }

    #[test]
    fn prepare_many_keeps_order() {
        let reqs = vec![
            TryOnRequest {
                person: person(26),
                garment_hint: Some(GarmentTopology::TwoPiece),
                ..TryOnRequest::default()
            },
            TryOnRequest {
                person: person(48),
                garment_hint: Some(GarmentTopology::Top),
                ..TryOnRequest::default()
            },
        ];
        let out = pipeline(ConstraintPolicy::Reject)
            .prepare_many(&reqs, Some(2))
            .unwrap();
        assert!(matches!(out[0], Err(VestureError::Constraint(_))));
        assert_eq!(
            out[1].as_ref().unwrap().person.coverage.coverage,
            Coverage::UpperBody
        );
        assert!(
            pipeline(ConstraintPolicy::Reject)
                .prepare_many(&reqs, Some(0))
                .is_err()
        );
    }

    #[test]
    fn generate_round_trips_through_engine() {
        let p = pipeline(ConstraintPolicy::Reject);
        let req = TryOnRequest {
            person: person(48),
            garment: person(10),
            garment_hint: Some(GarmentTopology::Top),
            ..TryOnRequest::default()
        };
        let prepared = p.prepare(&req).unwrap();
        let inv = p.invoker(Arc::new(EchoEngine::default()));
        let cancel = CancelToken::new();
        let img = p.generate(&req, &prepared, &inv, &cancel).unwrap();
        assert_eq!((img.width, img.height), (64, 128));

        cancel.cancel();
        let err = p.generate(&req, &prepared, &inv, &cancel).unwrap_err();
        assert!(matches!(
            err,
            VestureError::Generation(EngineFailure::Cancelled)
        ));
    }
}
