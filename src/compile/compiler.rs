use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use crate::analysis::body::BodyProfile;
use crate::analysis::coverage::CoverageResult;
use crate::analysis::garment::GarmentTopology;
use crate::analysis::lighting::{LightingBlueprint, LightingSource};
use crate::compile::blocks::{
    self, BodyBlockArgs, CoverageBlockArgs, FaceBlockArgs, GarmentBlockArgs, SceneBlockArgs,
    Section, SectionKind,
};
use crate::compile::control::{
    BASE_AVOID, BodyControl, ControlObject, FaceControl, IdentityLock, LockLevel, RenderParams,
    RetryControl, SpatialLock, TaskControl, merge_avoid,
};
use crate::compile::fingerprint::{InstructionFingerprint, fingerprint_instruction};
use crate::constraint::Downgrade;
use crate::foundation::core::{AspectRatio, Coverage, GenerationMode, NormRect, Resolution};
use crate::scene::{ResolvedScene, SceneChoice};

/// Forensic identity anchor for the face-lock block.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FaceAnchor {
    /// Free text describing the face; the built-in anchor is used when absent or blank.
    #[serde(default)]
    pub description: Option<String>,
    /// Normalized face box in the person photo; enables the spatial lock.
    #[serde(default)]
    pub region: Option<NormRect>,
}

/// Coverage-derived block and the mode it grants.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CoverageConstraint {
    pub coverage: Coverage,
    pub mode: GenerationMode,
    pub visible_ratio: f32,
    #[serde(default)]
    pub message: Option<String>,
}

impl CoverageConstraint {
    pub fn from_result(result: &CoverageResult) -> Self {
        Self {
            coverage: result.coverage,
            mode: result.allowed_mode,
            visible_ratio: result.visible_ratio,
            message: None,
        }
    }

    /// Same coverage, but the mode and note chosen by the downgrader.
    pub fn downgraded(result: &CoverageResult, d: &Downgrade) -> Self {
        Self {
            coverage: result.coverage,
            mode: d.mode,
            visible_ratio: result.visible_ratio,
            message: Some(d.message.clone()),
        }
    }

    /// Mode capped at what the coverage allows; ratio clamped to `[0, 1]`, non-finite to 0.
    pub fn clamped(&self) -> Self {
        Self {
            coverage: self.coverage,
            mode: self.mode.min(self.coverage.allowed_mode()),
            visible_ratio: if self.visible_ratio.is_finite() {
                self.visible_ratio.clamp(0.0, 1.0)
            } else {
                0.0
            },
            message: self.message.clone(),
        }
    }
}

/// Everything the compiler reads. Every field is optional in effect; blank or missing
/// values fall back to built-in phrasing.
#[derive(Clone, Debug, Default)]
pub struct CompileInputs {
    pub garment_description: Option<String>,
    pub garment_topology: Option<GarmentTopology>,
    pub scene: SceneChoice,
    pub lighting: Option<LightingBlueprint>,
    pub body_anchor: Option<BodyProfile>,
    pub face_anchor: Option<FaceAnchor>,
    pub pose_summary: Option<String>,
    pub appearance_summary: Option<String>,
    pub coverage_constraint: Option<CoverageConstraint>,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    /// Number of extra identity photos sent after the person photo.
    pub identity_references: usize,
    pub retry_mode: bool,
}

/// Final payload for the generation engine.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct CompiledInstruction {
    pub mode: GenerationMode,
    /// Prose blocks in precedence order. A retry block, when present, is last.
    pub sections: Vec<Section>,
    pub control: ControlObject,
    pub control_json: String,
    pub closing: String,
}

impl CompiledInstruction {
    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// Full instruction text: prose blocks, control object, closing directive, then the retry
    /// block if any.
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(8 * 1024);
        let is_retry = |s: &&Section| s.kind == SectionKind::Retry;
        for s in self.sections.iter().filter(|s| !is_retry(s)) {
            s.render_into(&mut out);
        }
        let _ = writeln!(out, "### CONTROL\n```json\n{}\n```\n", self.control_json);
        out.push_str(&self.closing);
        out.push('\n');
        for s in self.sections.iter().filter(is_retry) {
            out.push('\n');
            s.render_into(&mut out);
        }
        out
    }

    pub fn fingerprint(&self) -> InstructionFingerprint {
        fingerprint_instruction(self)
    }
}

/// Compile inputs into one instruction. Infallible and free of I/O.
#[tracing::instrument(skip(inputs), fields(retry = inputs.retry_mode))]
pub fn compile(inputs: &CompileInputs) -> CompiledInstruction {
    let scene = inputs.scene.resolve();
    let lighting = effective_lighting(inputs.lighting.as_ref(), &scene);
    let coverage = inputs
        .coverage_constraint
        .as_ref()
        .map(CoverageConstraint::clamped);
    let mode = coverage
        .as_ref()
        .map(|c| c.mode)
        .unwrap_or(GenerationMode::UpperBodyPreviewOnly);
    let visible_ratio = coverage.as_ref().map(|c| c.visible_ratio);
    let face = inputs.face_anchor.as_ref();
    let region = face.and_then(|f| f.region).filter(is_plausible_region);
    let garment_image = 2 + inputs.identity_references;

    let mut sections = vec![
        blocks::scene_integration(SceneBlockArgs {
            scene: &scene,
            lighting: &lighting,
        }),
        blocks::face_lock(FaceBlockArgs {
            anchor: face.and_then(|f| f.description.as_deref()),
            region,
            profile: inputs.body_anchor.as_ref(),
            appearance: inputs.appearance_summary.as_deref(),
            identity_references: inputs.identity_references,
            strict: inputs.retry_mode,
        }),
        blocks::body_lock(BodyBlockArgs {
            profile: inputs.body_anchor.as_ref(),
            pose: inputs.pose_summary.as_deref(),
            mode,
            visible_ratio,
        }),
        blocks::garment_fit(GarmentBlockArgs {
            description: inputs.garment_description.as_deref(),
            topology: inputs.garment_topology,
            image_index: garment_image,
            mode,
        }),
    ];
    if let Some(c) = &coverage {
        sections.push(blocks::coverage_constraint(CoverageBlockArgs {
            coverage: c.coverage.as_str(),
            mode: c.mode,
            visible_ratio: c.visible_ratio,
            message: c.message.as_deref(),
        }));
    }
    sections.push(blocks::anti_artifact());
    sections.push(blocks::advisory_checklist());
    if inputs.retry_mode {
        sections.push(blocks::retry_block());
    }

    let control = ControlObject {
        mode,
        identity_lock: IdentityLock {
            enabled: true,
            level: if inputs.retry_mode {
                LockLevel::Maximum
            } else {
                LockLevel::Strict
            },
            source_image: 1,
            reference_images: (2..garment_image).collect(),
            spatial: region.map(|r| spatial_lock(r, inputs.retry_mode)),
        },
        face: FaceControl {
            anchor: face
                .and_then(|f| f.description.as_deref())
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .unwrap_or(blocks::DEFAULT_FACE_ANCHOR)
                .to_string(),
            eyes: "read_only",
            beautify: false,
            measured: descriptor_map(
                inputs
                    .body_anchor
                    .as_ref()
                    .map(BodyProfile::face_descriptors)
                    .unwrap_or_default(),
            ),
        },
        body: BodyControl {
            reshape: false,
            slimming: false,
            infer_from_face: false,
            measured: descriptor_map(
                inputs
                    .body_anchor
                    .as_ref()
                    .map(BodyProfile::body_descriptors)
                    .unwrap_or_default(),
            ),
            pose: non_blank(inputs.pose_summary.as_deref()),
            visible_ratio,
        },
        task: TaskControl {
            kind: "virtual_try_on",
            garment: non_blank(inputs.garment_description.as_deref())
                .unwrap_or_else(|| "garment reference".to_string()),
            garment_image,
            topology: inputs.garment_topology,
            scene: scene.label(),
            lighting: lighting.clone(),
        },
        rules: rule_ids(&sections),
        avoid: merge_avoid([BASE_AVOID, scene_avoid(&scene)]),
        render: RenderParams::new(inputs.aspect_ratio, inputs.resolution),
        retry: inputs.retry_mode.then(RetryControl::identity_drift),
    };
    let control_json = serde_json::to_string_pretty(&control).unwrap_or_else(|_| "{}".to_string());
    let closing = blocks::closing_directive(mode, inputs.aspect_ratio);

    tracing::debug!(
        %mode,
        scene = %control.task.scene,
        sections = sections.len(),
        "compiled instruction"
    );

    CompiledInstruction {
        mode,
        sections,
        control,
        control_json,
        closing,
    }
}

/// Caller-supplied lighting wins; otherwise a preset scene fixes the light; otherwise the
/// given blueprint (usually estimated from the photo) or daylight defaults.
fn effective_lighting(
    given: Option<&LightingBlueprint>,
    scene: &ResolvedScene,
) -> LightingBlueprint {
    match (given, scene) {
        (Some(l), _) if l.source == LightingSource::Caller => l.clone(),
        (_, ResolvedScene::Preset(s)) => s.lighting.blueprint(),
        (Some(l), _) => l.clone(),
        (None, _) => LightingBlueprint::default(),
    }
}

fn is_plausible_region(r: &NormRect) -> bool {
    let finite = [r.x, r.y, r.width, r.height].iter().all(|v| v.is_finite());
    finite
        && r.width > 0.0
        && r.height > 0.0
        && r.x >= 0.0
        && r.y >= 0.0
        && r.x + r.width <= 1.0 + f32::EPSILON
        && r.y + r.height <= 1.0 + f32::EPSILON
}

fn spatial_lock(r: NormRect, strict: bool) -> SpatialLock {
    let (cx, cy) = r.center();
    let (center_tolerance, scale_tolerance) = blocks::spatial_tolerances(strict);
    SpatialLock {
        center_x: cx,
        center_y: cy,
        width: r.width,
        height: r.height,
        center_tolerance,
        scale_tolerance,
    }
}

fn scene_avoid(scene: &ResolvedScene) -> &'static [&'static str] {
    match scene {
        ResolvedScene::Preset(s) => s.avoid,
        ResolvedScene::Original | ResolvedScene::Freeform(_) => &[],
    }
}

fn rule_ids(sections: &[Section]) -> Vec<&'static str> {
    let mut seen = BTreeSet::new();
    sections
        .iter()
        .flat_map(|s| s.rules.iter().map(|r| r.id))
        .filter(|id| seen.insert(*id))
        .collect()
}

fn descriptor_map(pairs: Vec<(&'static str, String)>) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.replace([' ', '-'], "_"), v))
        .collect()
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
