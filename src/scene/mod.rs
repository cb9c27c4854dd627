//! Scene graphs: the catalog of preset environments and how a request picks one.

pub mod graph;
pub mod library;

use crate::scene::graph::SceneGraph;

/// Background requested for the try-on.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum SceneChoice {
    /// Keep the environment of the person photo.
    #[default]
    Original,
    /// Catalog scene id.
    Preset(String),
    /// Caller-written description of the environment.
    Freeform(String),
}

impl SceneChoice {
    /// Interpret a raw CLI/API value: a known catalog id becomes a preset, anything else
    /// non-empty is a freeform description.
    pub fn from_user_input(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::Original,
            Some(s) if library::lookup(s).is_some() => Self::Preset(s.to_string()),
            Some(s) => Self::Freeform(s.to_string()),
        }
    }

    pub fn resolve(&self) -> ResolvedScene {
        match self {
            Self::Original => ResolvedScene::Original,
            Self::Preset(id) => match library::lookup(id) {
                Some(scene) => ResolvedScene::Preset(scene),
                None => {
                    tracing::warn!(scene = %id, "unknown scene preset, keeping original scene");
                    ResolvedScene::Original
                }
            },
            Self::Freeform(text) if text.trim().is_empty() => ResolvedScene::Original,
            Self::Freeform(text) => ResolvedScene::Freeform(text.trim().to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedScene {
    Original,
    Preset(&'static SceneGraph),
    Freeform(String),
}

impl ResolvedScene {
    pub fn label(&self) -> String {
        match self {
            Self::Original => "original".to_string(),
            Self::Preset(s) => format!("{}@v{}", s.id, s.version),
            Self::Freeform(_) => "freeform".to_string(),
        }
    }
}
