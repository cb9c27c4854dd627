use std::fmt;
use std::str::FromStr;

use crate::foundation::error::{VestureError, VestureResult};

/// How much of the body is visible in a person photo.
///
/// Variants are ordered by increasing visibility, so `a < b` reads as "`a` shows less body".
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Coverage {
    /// Only the head (and maybe the neck) is in frame.
    FaceOnly,
    /// Head and shoulders down to roughly the waist.
    UpperBody,
    /// Head through hips and beyond.
    FullBody,
}

impl Coverage {
    /// Generation mode permitted for this coverage. Total and fixed.
    pub fn allowed_mode(self) -> GenerationMode {
        match self {
            Self::FaceOnly => GenerationMode::UpperBodyPreviewOnly,
            Self::UpperBody => GenerationMode::UpperBodyWithFade,
            Self::FullBody => GenerationMode::FullTryOn,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FaceOnly => "FACE_ONLY",
            Self::UpperBody => "UPPER_BODY",
            Self::FullBody => "FULL_BODY",
        }
    }

    /// Phrase used in user-facing messages.
    pub fn human(self) -> &'static str {
        match self {
            Self::FaceOnly => "face-only",
            Self::UpperBody => "upper-body",
            Self::FullBody => "full-body",
        }
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the downstream engine is allowed to render.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationMode {
    /// Head-and-shoulders preview; nothing below the visible edge is drawn.
    UpperBodyPreviewOnly,
    /// Upper body rendered, garment fades out at the photo's bottom edge.
    UpperBodyWithFade,
    /// Whole garment on a whole body.
    FullTryOn,
}

impl GenerationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UpperBodyPreviewOnly => "UPPER_BODY_PREVIEW_ONLY",
            Self::UpperBodyWithFade => "UPPER_BODY_WITH_FADE",
            Self::FullTryOn => "FULL_TRY_ON",
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output aspect ratios accepted at the boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[default]
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[serde(rename = "16:9")]
    Landscape16x9,
    #[serde(rename = "2:3")]
    Portrait2x3,
    #[serde(rename = "3:2")]
    Landscape3x2,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 7] = [
        Self::Square,
        Self::Portrait3x4,
        Self::Landscape4x3,
        Self::Portrait9x16,
        Self::Landscape16x9,
        Self::Portrait2x3,
        Self::Landscape3x2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Portrait3x4 => "3:4",
            Self::Landscape4x3 => "4:3",
            Self::Portrait9x16 => "9:16",
            Self::Landscape16x9 => "16:9",
            Self::Portrait2x3 => "2:3",
            Self::Landscape3x2 => "3:2",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = VestureError;

    fn from_str(s: &str) -> VestureResult<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| VestureError::validation(format!("unsupported aspect ratio '{s}'")))
    }
}

/// Resolution hint forwarded to the engine. The engine may ignore it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    #[default]
    Standard,
    High,
    Ultra,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "1k",
            Self::High => "2k",
            Self::Ultra => "4k",
        }
    }
}

impl FromStr for Resolution {
    type Err = VestureError;

    fn from_str(s: &str) -> VestureResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "1k" => Ok(Self::Standard),
            "high" | "2k" => Ok(Self::High),
            "ultra" | "4k" => Ok(Self::Ultra),
            other => Err(VestureError::validation(format!(
                "unsupported resolution '{other}'"
            ))),
        }
    }
}

/// Axis-aligned rectangle in normalized image coordinates (`0..=1` on both axes, y down).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NormRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormRect {
    pub fn center(self) -> (f32, f32) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn aspect(self) -> f32 {
        self.width / self.height.max(f32::EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_mode_is_total_and_fixed() {
        assert_eq!(
            Coverage::FaceOnly.allowed_mode(),
            GenerationMode::UpperBodyPreviewOnly
        );
        assert_eq!(
            Coverage::UpperBody.allowed_mode(),
            GenerationMode::UpperBodyWithFade
        );
        assert_eq!(Coverage::FullBody.allowed_mode(), GenerationMode::FullTryOn);
    }

    #[test]
    fn coverage_orders_by_visibility() {
        assert!(Coverage::FaceOnly < Coverage::UpperBody);
        assert!(Coverage::UpperBody < Coverage::FullBody);
    }

    #[test]
    fn enums_serialize_as_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&Coverage::FullBody).unwrap(),
            "\"FULL_BODY\""
        );
        assert_eq!(
            serde_json::to_string(&GenerationMode::UpperBodyWithFade).unwrap(),
            "\"UPPER_BODY_WITH_FADE\""
        );
    }

    #[test]
    fn aspect_ratio_parses_known_values_only() {
        assert_eq!(
            "9:16".parse::<AspectRatio>().unwrap(),
            AspectRatio::Portrait9x16
        );
        assert!("5:4".parse::<AspectRatio>().is_err());
        assert_eq!(
            serde_json::to_string(&AspectRatio::Square).unwrap(),
            "\"1:1\""
        );
    }

    #[test]
    fn norm_rect_center() {
        let r = NormRect {
            x: 0.25,
            y: 0.0,
            width: 0.5,
            height: 0.2,
        };
        assert_eq!(r.center(), (0.5, 0.1));
        assert!((r.aspect() - 2.5).abs() < 1e-6);
    }
}
