//! Machine-readable mirror of the prose constraints.

use std::collections::BTreeMap;

use crate::analysis::garment::GarmentTopology;
use crate::analysis::lighting::LightingBlueprint;
use crate::foundation::core::{AspectRatio, GenerationMode, Resolution};

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ControlObject {
    pub mode: GenerationMode,
    pub identity_lock: IdentityLock,
    pub face: FaceControl,
    pub body: BodyControl,
    pub task: TaskControl,
    pub rules: Vec<&'static str>,
    pub avoid: Vec<String>,
    pub render: RenderParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryControl>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockLevel {
    Strict,
    Maximum,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct IdentityLock {
    pub enabled: bool,
    pub level: LockLevel,
    pub source_image: usize,
    pub reference_images: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spatial: Option<SpatialLock>,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct SpatialLock {
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
    pub center_tolerance: f32,
    pub scale_tolerance: f32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct FaceControl {
    pub anchor: String,
    pub eyes: &'static str,
    pub beautify: bool,
    pub measured: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct BodyControl {
    pub reshape: bool,
    pub slimming: bool,
    pub infer_from_face: bool,
    pub measured: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_ratio: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct TaskControl {
    pub kind: &'static str,
    pub garment: String,
    pub garment_image: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology: Option<GarmentTopology>,
    pub scene: String,
    pub lighting: LightingBlueprint,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RenderParams {
    pub aspect_ratio: AspectRatio,
    pub resolution: &'static str,
    pub photorealistic: bool,
    pub grain_match: bool,
}

impl RenderParams {
    pub fn new(aspect_ratio: AspectRatio, resolution: Resolution) -> Self {
        Self {
            aspect_ratio,
            resolution: resolution.as_str(),
            photorealistic: true,
            grain_match: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RetryControl {
    pub reason: &'static str,
    pub identity_priority: &'static str,
}

impl RetryControl {
    pub fn identity_drift() -> Self {
        Self {
            reason: "identity_drift",
            identity_priority: "absolute",
        }
    }
}

/// Terms every request avoids, before any scene-specific additions.
pub const BASE_AVOID: &[&str] = &[
    "face morphing",
    "beautification or skin smoothing",
    "body slimming or reshaping",
    "invented body parts beyond the photo edge",
    "extra or missing fingers",
    "duplicated limbs",
    "garment floating off the body",
    "cut-out halo around the person",
    "mismatched lighting direction",
    "watermarks or text",
];

/// Concatenate avoid lists, dropping case-insensitive duplicates and keeping first
/// occurrence order.
pub fn merge_avoid<'a>(lists: impl IntoIterator<Item = &'a [&'a str]>) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::new();
    for list in lists {
        for term in list {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            if seen.insert(term.to_ascii_lowercase()) {
                out.push(term.to_string());
            }
        }
    }
    out
}
