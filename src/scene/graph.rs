use std::fmt::Write as _;

use crate::analysis::lighting::{Contrast, Exposure, KeySide, LightingBlueprint, LightingSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Midday,
    GoldenHour,
    BlueHour,
    Night,
    /// Artificial light only; the hour does not show.
    Interior,
}

impl TimeOfDay {
    pub fn label(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Midday => "midday",
            Self::GoldenHour => "golden hour",
            Self::BlueHour => "blue hour",
            Self::Night => "night",
            Self::Interior => "interior",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    Clear,
    PartlyCloudy,
    Overcast,
    AfterRain,
    Indoor,
}

impl Weather {
    pub fn label(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::PartlyCloudy => "partly cloudy",
            Self::Overcast => "overcast",
            Self::AfterRain => "just after rain, wet surfaces",
            Self::Indoor => "indoor",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct DepthLayers {
    pub foreground: &'static str,
    pub midground: &'static str,
    pub background: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct LightingContext {
    pub key: &'static str,
    pub fill: &'static str,
    pub ambient: &'static str,
    pub key_side: KeySide,
    pub contrast: Contrast,
    pub exposure: Exposure,
    pub color_temperature_k: u32,
}

impl LightingContext {
    pub fn blueprint(&self) -> LightingBlueprint {
        LightingBlueprint {
            key_side: self.key_side,
            exposure: self.exposure,
            contrast: self.contrast,
            color_temperature_k: self.color_temperature_k,
            source: LightingSource::Scene,
        }
    }
}

/// Structured description of an environment. Catalog entries are static and versioned by
/// `(id, version)`; they are never mutated at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct SceneGraph {
    pub id: &'static str,
    pub version: u32,
    pub name: &'static str,
    pub architecture: &'static [&'static str],
    pub materials: &'static [&'static str],
    pub props: &'static [&'static str],
    pub depth: DepthLayers,
    pub ambient_life: &'static str,
    pub lighting: LightingContext,
    pub time_of_day: TimeOfDay,
    pub weather: Weather,
    pub avoid: &'static [&'static str],
}

/// Render a scene as a deterministic text block. Same scene, same bytes.
pub fn build_scene_prompt(scene: &SceneGraph) -> String {
    let mut out = String::with_capacity(1024);
    // Writing into a String cannot fail.
    let (name, id, version) = (scene.name, scene.id, scene.version);
    let _ = writeln!(out, "SCENE: {name} [{id} v{version}]");
    write_list(&mut out, "Architecture", scene.architecture);
    write_list(&mut out, "Materials", scene.materials);
    write_list(&mut out, "Props", scene.props);
    let _ = writeln!(out, "Depth layers:");
    let _ = writeln!(out, "- Foreground: {}", scene.depth.foreground);
    let _ = writeln!(out, "- Midground: {}", scene.depth.midground);
    let _ = writeln!(out, "- Background: {}", scene.depth.background);
    let _ = writeln!(out, "Ambient life: {}", scene.ambient_life);
    let _ = writeln!(
        out,
        "Lighting: key {}; fill {}; ambient {}; ~{}K",
        scene.lighting.key,
        scene.lighting.fill,
        scene.lighting.ambient,
        scene.lighting.color_temperature_k
    );
    let _ = writeln!(
        out,
        "Time of day: {}. Weather: {}.",
        scene.time_of_day.label(),
        scene.weather.label()
    );
    write_list(&mut out, "Avoid", scene.avoid);
    out
}

fn write_list(out: &mut String, label: &str, items: &[&str]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{label}: {}", items.join("; "));
}
