//! Typed, parameterized rule templates. Each builder returns one [`Section`]; the compiler
//! decides order and presence.

use std::fmt::Write as _;

use crate::analysis::body::BodyProfile;
use crate::analysis::garment::GarmentTopology;
use crate::analysis::lighting::LightingBlueprint;
use crate::foundation::core::{AspectRatio, GenerationMode, NormRect};
use crate::scene::ResolvedScene;
use crate::scene::graph::build_scene_prompt;

/// Spatial face lock tolerances, as fractions of frame size.
pub const FACE_CENTER_TOLERANCE: f32 = 0.03;
pub const FACE_SCALE_TOLERANCE: f32 = 0.05;

pub const DEFAULT_FACE_ANCHOR: &str = "the exact face of the person in Image 1: identical bone \
                                       structure, \
eye shape and spacing, iris color, brow line, nose, lips, ears, skin tone and texture, moles, \
freckles, scars and hairline";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    SceneIntegration,
    FaceLock,
    BodyLock,
    GarmentFit,
    CoverageConstraint,
    AntiArtifact,
    Advisory,
    Retry,
}

/// One rule: a stable id for the control object plus its prose.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Rule {
    pub id: &'static str,
    pub text: String,
}

impl Rule {
    fn new(id: &'static str, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Section {
    pub kind: SectionKind,
    pub title: &'static str,
    /// Verbatim text placed before the rule list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preamble: Option<String>,
    pub rules: Vec<Rule>,
    /// Prose for the engine only; nothing in this crate checks it.
    pub advisory: bool,
}

impl Section {
    fn new(kind: SectionKind, title: &'static str) -> Self {
        Self {
            kind,
            title,
            preamble: None,
            rules: Vec::new(),
            advisory: false,
        }
    }

    fn rule(mut self, id: &'static str, text: impl Into<String>) -> Self {
        self.rules.push(Rule::new(id, text));
        self
    }

    fn rule_if(self, cond: bool, id: &'static str, text: impl FnOnce() -> String) -> Self {
        if cond { self.rule(id, text()) } else { self }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.preamble.as_deref().is_none_or(str::is_empty)
    }

    pub fn render_into(&self, out: &mut String) {
        let _ = writeln!(out, "### {}", self.title);
        if let Some(p) = &self.preamble {
            out.push_str(p.trim_end());
            out.push('\n');
        }
        for r in &self.rules {
            let _ = writeln!(out, "- {}", r.text);
        }
        out.push('\n');
    }
}

pub struct SceneBlockArgs<'a> {
    pub scene: &'a ResolvedScene,
    pub lighting: &'a LightingBlueprint,
}

pub fn scene_integration(args: SceneBlockArgs<'_>) -> Section {
    let mut s = Section::new(SectionKind::SceneIntegration, "SCENE INTEGRATION");
    let light = args.lighting.describe();
    match args.scene {
        ResolvedScene::Original => {
            s = s
                .rule(
                    "keep_original_environment",
                    "Keep the environment of Image 1 exactly as photographed; only the clothing \
                     changes.",
                )
                .rule(
                    "light_garment_with_source_light",
                    format!("Light the new garment with the photo's existing lighting: {light}."),
                );
        }
        ResolvedScene::Preset(scene) => {
            s.preamble = Some(build_scene_prompt(scene));
            s = relight_rules(s, &light);
        }
        ResolvedScene::Freeform(text) => {
            s.preamble = Some(format!("Environment: {text}"));
            s = relight_rules(s, &light);
        }
    }
    s.rule(
        "match_grain_and_focus",
        "Match sensor grain, noise, sharpness and depth of field between the person and the \
         environment; the result must read as a single photograph.",
    )
}

fn relight_rules(s: Section, light: &str) -> Section {
    s.rule(
        "place_subject_in_scene",
        "Photograph the person inside this environment; do not paste a cut-out onto a backdrop.",
    )
    .rule(
        "relight_subject",
        format!(
            "Relight skin, hair and garment to the scene: {light}. Shadows fall in the scene's \
             direction."
        ),
    )
    .rule(
        "contact_shadows",
        "Add contact shadows and ambient occlusion where the person touches the ground or props.",
    )
}

pub struct FaceBlockArgs<'a> {
    pub anchor: Option<&'a str>,
    pub region: Option<NormRect>,
    pub profile: Option<&'a BodyProfile>,
    pub appearance: Option<&'a str>,
    pub identity_references: usize,
    pub strict: bool,
}

pub fn face_lock(args: FaceBlockArgs<'_>) -> Section {
    let anchor = args
        .anchor
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(DEFAULT_FACE_ANCHOR);
    let measured = args
        .profile
        .map(BodyProfile::face_descriptors)
        .unwrap_or_default();
    let appearance = args
        .appearance
        .map(|a| a.trim().trim_end_matches('.'))
        .filter(|a| !a.is_empty());

    let mut s = Section::new(SectionKind::FaceLock, "IDENTITY LOCK (FACE)")
        .rule("identity_anchor", format!("Preserve {anchor}."))
        .rule(
            "eyes_read_only",
            "Eyes are read-only biometric pixels copied from Image 1.",
        )
        .rule(
            "no_beautification",
            "Do not beautify, slim the face, smooth skin, change age, makeup, expression or \
             hairstyle.",
        )
        .rule_if(!measured.is_empty(), "face_measurements", || {
            format!("Face as measured in Image 1: {}.", join_pairs(&measured))
        })
        .rule_if(appearance.is_some(), "appearance", || {
            format!("Appearance to keep: {}.", appearance.unwrap_or_default())
        })
        .rule_if(args.identity_references > 0, "identity_references", || {
            format!(
                "Images 2-{} show the same person; use them only to confirm facial identity, \
                 never for body or clothing.",
                args.identity_references + 1
            )
        });

    if let Some(r) = args.region {
        let (cx, cy) = r.center();
        let (ct, st) = spatial_tolerances(args.strict);
        s = s.rule(
            "face_spatial_lock",
            format!(
                "Keep the face where it is: box centered at ({cx:.3}, {cy:.3}) of the frame, size \
                 {:.3} x {:.3}; \
                 the center may move at most {:.1}% and the size change at most {:.1}%.",
                r.width,
                r.height,
                ct * 100.0,
                st * 100.0
            ),
        );
    }
    s
}

/// `(center, scale)` tolerances; strict mode halves both.
pub fn spatial_tolerances(strict: bool) -> (f32, f32) {
    if strict {
        (FACE_CENTER_TOLERANCE / 2.0, FACE_SCALE_TOLERANCE / 2.0)
    } else {
        (FACE_CENTER_TOLERANCE, FACE_SCALE_TOLERANCE)
    }
}

pub struct BodyBlockArgs<'a> {
    pub profile: Option<&'a BodyProfile>,
    pub pose: Option<&'a str>,
    pub mode: GenerationMode,
    pub visible_ratio: Option<f32>,
}

pub fn body_lock(args: BodyBlockArgs<'_>) -> Section {
    let measured = args
        .profile
        .map(BodyProfile::body_descriptors)
        .unwrap_or_default();
    let measurements = if measured.is_empty() {
        "No body measurements were possible; copy the visible body exactly as \
         photographed.".to_string()
    } else {
        format!("Body as measured from visible pixels: {}.", join_pairs(&measured))
    };
    let pose = match args.pose.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => format!("Keep the pose exactly: {}.", p.trim_end_matches('.')),
        None => "Keep the pose, posture and limb positions from Image 1 unchanged.".to_string(),
    };

    Section::new(SectionKind::BodyLock, "BODY LOCK")
        .rule(
            "no_reshaping",
            "Do not reshape, slim, enlarge, lengthen or re-proportion any part of the body.",
        )
        .rule(
            "copy_not_infer",
            "Copy body proportions from the visible pixels of Image 1; never infer them from the \
             face or from the garment photo.",
        )
        .rule("body_measurements", measurements)
        .rule("keep_pose", pose)
        .rule(
            "garment_conforms_to_body",
            "The garment conforms to the body, never the body to the garment.",
        )
        .rule("no_unseen_regions", unseen_region_rule(args.mode, args.visible_ratio))
}

fn unseen_region_rule(mode: GenerationMode, visible_ratio: Option<f32>) -> String {
    match mode {
        GenerationMode::FullTryOn => {
            "Render only body regions that are visible in Image 1.".to_string()
        }
        GenerationMode::UpperBodyWithFade => {
            let edge = visible_ratio
                .map(|r| format!(" (visible content ends about {:.0}% down the frame)", r * 100.0))
                .unwrap_or_default();
            format!(
                "Image 1 shows the upper body only{edge}; do not extend the body past the \
                 original frame \
                 edge, let the garment fade out where the photo ends."
            )
        }
        GenerationMode::UpperBodyPreviewOnly => {
            "Image 1 shows only the head and shoulders; show the garment's neckline and shoulders \
             only and \
             do not invent a torso, arms or legs."
                .to_string()
        }
    }
}

pub struct GarmentBlockArgs<'a> {
    pub description: Option<&'a str>,
    pub topology: Option<GarmentTopology>,
    pub image_index: usize,
    pub mode: GenerationMode,
}

pub fn garment_fit(args: GarmentBlockArgs<'_>) -> Section {
    let garment = args
        .description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| d.trim_end_matches('.').to_string())
        .unwrap_or_else(|| "the garment shown in the garment reference".to_string());

    let mut s = Section::new(SectionKind::GarmentFit, "GARMENT FIT")
        .rule(
            "garment_source",
            format!("Dress the person in {garment} from Image {}.", args.image_index),
        )
        .rule(
            "garment_fidelity",
            "Reproduce fabric, color, print, pattern scale, trims and closures exactly; do not \
             redesign the garment.",
        )
        .rule(
            "natural_drape",
            "Show natural drape, folds and tension where fabric meets the body.",
        )
        .rule(
            "replace_only_covered",
            "Replace the original clothing only where the new garment covers it.",
        );

    if let Some(t) = args.topology {
        s = s.rule("topology", topology_rule(t, args.mode));
    }
    s
}

fn topology_rule(t: GarmentTopology, mode: GenerationMode) -> String {
    let cropped = mode != GenerationMode::FullTryOn;
    match t {
        GarmentTopology::Dress if cropped => {
            "This is a dress; show only the part of it that falls inside the visible \
             body.".to_string()
        }
        GarmentTopology::Dress => {
            "This is a dress: one continuous piece from neckline to hem, hem length as in the \
             reference."
                .to_string()
        }
        GarmentTopology::TwoPiece if cropped => {
            "This is a two-piece set; render only the upper piece down to the visible edge of the \
             photo and leave the lower piece out."
                .to_string()
        }
        GarmentTopology::TwoPiece => {
            "This is a two-piece set: render both pieces as a coordinated outfit with the \
             waistline as in the reference."
                .to_string()
        }
        GarmentTopology::Top => {
            "This is a top: keep the person's existing lower-body clothing unchanged.".to_string()
        }
        GarmentTopology::Bottom if cropped => {
            "This is a bottom garment; show only the waistband area that is inside the \
             frame.".to_string()
        }
        GarmentTopology::Bottom => {
            "This is a bottom garment: keep the person's existing top unchanged.".to_string()
        }
    }
}

pub struct CoverageBlockArgs<'a> {
    pub coverage: &'a str,
    pub mode: GenerationMode,
    pub visible_ratio: f32,
    pub message: Option<&'a str>,
}

pub fn coverage_constraint(args: CoverageBlockArgs<'_>) -> Section {
    Section::new(SectionKind::CoverageConstraint, "COVERAGE CONSTRAINT")
        .rule(
            "detected_coverage",
            format!(
                "Detected coverage: {} ({:.0}% of the frame height shows the person).",
                args.coverage,
                args.visible_ratio * 100.0
            ),
        )
        .rule(
            "allowed_mode",
            format!("Allowed generation mode: {}.", args.mode),
        )
        .rule_if(args.message.is_some(), "coverage_note", || {
            format!("{}.", args.message.unwrap_or_default().trim_end_matches('.'))
        })
}

pub fn anti_artifact() -> Section {
    Section::new(SectionKind::AntiArtifact, "ANTI-ARTIFACT")
        .rule(
            "hands",
            "Hands keep five fingers each, natural joints, no fusion with fabric.",
        )
        .rule("limbs", "No duplicated, missing or disconnected limbs.")
        .rule(
            "edges",
            "No halos, cut-out edges or seams between the person and the background.",
        )
        .rule(
            "garment_physics",
            "The garment touches the body; nothing floats or clips through skin.",
        )
        .rule(
            "text",
            "No text, logos or watermarks that are not on the garment reference.",
        )
}

pub fn advisory_checklist() -> Section {
    let mut s = Section::new(
        SectionKind::Advisory,
        "SELF-CHECK (advisory; not verified by this pipeline)",
    )
    .rule(
        "check_face",
        "Compare the face with Image 1; if it drifted, redo the face.",
    )
    .rule(
        "check_body",
        "Compare shoulder, waist and hip widths with Image 1; they must match.",
    )
    .rule(
        "check_garment",
        "Compare color and pattern with the garment reference.",
    )
    .rule(
        "check_light",
        "Check that shadow direction on the person matches the environment.",
    );
    s.advisory = true;
    s
}

pub fn retry_block() -> Section {
    Section::new(SectionKind::Retry, "RETRY: IDENTITY IS NON-NEGOTIABLE")
        .rule(
            "retry_reason",
            "A previous attempt altered the person's identity; that result was rejected.",
        )
        .rule(
            "identity_first",
            "Identity outranks every other instruction: if garment detail or scene realism \
             conflicts with the face, keep the face.",
        )
        .rule(
            "face_pixels",
            "Reproduce the face from Image 1 pixel-faithfully, including asymmetries and \
             imperfections.",
        )
}

pub fn closing_directive(mode: GenerationMode, aspect: AspectRatio) -> String {
    let framing = match mode {
        GenerationMode::FullTryOn => "full-length",
        GenerationMode::UpperBodyWithFade => "upper-body, fading at the original frame edge",
        GenerationMode::UpperBodyPreviewOnly => "head-and-shoulders preview",
    };
    format!(
        "Output one photorealistic {framing} photograph of the same person from Image 1 wearing \
         the garment, aspect ratio {aspect}."
    )
}

fn join_pairs(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{k} {v}"))
        .collect::<Vec<_>>()
        .join("; ")
}
