use crate::analysis::signal::LumaGrid;

/// Side the dominant light falls from, as seen by the camera.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySide {
    Left,
    Right,
    #[default]
    Front,
    Overhead,
    Back,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exposure {
    Low,
    #[default]
    Balanced,
    Bright,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contrast {
    Soft,
    #[default]
    Medium,
    Hard,
}

/// Where a blueprint came from; the compiler words the lighting block differently for each.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightingSource {
    #[default]
    Default,
    Estimated,
    Scene,
    Caller,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LightingBlueprint {
    pub key_side: KeySide,
    pub exposure: Exposure,
    pub contrast: Contrast,
    pub color_temperature_k: u32,
    #[serde(default)]
    pub source: LightingSource,
}

impl Default for LightingBlueprint {
    fn default() -> Self {
        Self {
            key_side: KeySide::Front,
            exposure: Exposure::Balanced,
            contrast: Contrast::Medium,
            color_temperature_k: 5500,
            source: LightingSource::Default,
        }
    }
}

impl LightingBlueprint {
    pub fn describe(&self) -> String {
        let side = match self.key_side {
            KeySide::Left => "key light from camera left",
            KeySide::Right => "key light from camera right",
            KeySide::Front => "frontal key light",
            KeySide::Overhead => "overhead key light",
            KeySide::Back => "back light with rim highlights",
        };
        let exposure = match self.exposure {
            Exposure::Low => "low-key exposure",
            Exposure::Balanced => "balanced exposure",
            Exposure::Bright => "high-key exposure",
        };
        let contrast = match self.contrast {
            Contrast::Soft => "soft shadows",
            Contrast::Medium => "moderate shadow contrast",
            Contrast::Hard => "hard, defined shadows",
        };
        format!(
            "{side}, {exposure}, {contrast}, ~{}K color temperature",
            self.color_temperature_k
        )
    }
}

/// Brightness difference between image halves (0..=255 scale) that names a key side.
const SIDE_DELTA: f32 = 12.0;

/// Rough lighting read of the source photo from its intensity grid.
///
/// Color temperature is not recoverable from a single channel and stays at daylight.
pub fn estimate_lighting(grid: &LumaGrid) -> LightingBlueprint {
    if grid.data.is_empty() {
        return LightingBlueprint::default();
    }

    let mean = grid.mean();
    let half = grid.width / 2;
    let (mut left, mut right) = (0u64, 0u64);
    let mut var = 0f64;
    for y in 0..grid.height {
        for x in 0..grid.width {
            let v = grid.at(x, y);
            if x < half {
                left += u64::from(v);
            } else {
                right += u64::from(v);
            }
            let d = f64::from(v) - f64::from(mean);
            var += d * d;
        }
    }
    let left_n = u64::from(half * grid.height).max(1);
    let right_n = u64::from((grid.width - half) * grid.height).max(1);
    let delta = left as f32 / left_n as f32 - right as f32 / right_n as f32;
    let stddev = (var / grid.data.len() as f64).sqrt() as f32;

    LightingBlueprint {
        key_side: if delta > SIDE_DELTA {
            KeySide::Left
        } else if delta < -SIDE_DELTA {
            KeySide::Right
        } else {
            KeySide::Front
        },
        exposure: if mean < 80.0 {
            Exposure::Low
        } else if mean > 175.0 {
            Exposure::Bright
        } else {
            Exposure::Balanced
        },
        contrast: if stddev < 30.0 {
            Contrast::Soft
        } else if stddev > 60.0 {
            Contrast::Hard
        } else {
            Contrast::Medium
        },
        color_temperature_k: 5500,
        source: LightingSource::Estimated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(f: impl Fn(u32, u32) -> u8) -> LumaGrid {
        let (w, h) = (16, 8);
        let mut data = Vec::new();
        for y in 0..h {
            for x in 0..w {
                data.push(f(x, y));
            }
        }
        LumaGrid {
            width: w,
            height: h,
            data,
        }
    }

    #[test]
    fn flat_mid_gray_is_front_balanced_soft() {
        let b = estimate_lighting(&grid(|_, _| 128));
        assert_eq!(b.key_side, KeySide::Front);
        assert_eq!(b.exposure, Exposure::Balanced);
        assert_eq!(b.contrast, Contrast::Soft);
        assert_eq!(b.source, LightingSource::Estimated);
    }

    #[test]
    fn brighter_left_half_names_left_key() {
        let b = estimate_lighting(&grid(|x, _| if x < 8 { 200 } else { 60 }));
        assert_eq!(b.key_side, KeySide::Left);
        assert_eq!(b.contrast, Contrast::Hard);

        let b = estimate_lighting(&grid(|x, _| if x < 8 { 60 } else { 200 }));
        assert_eq!(b.key_side, KeySide::Right);
    }

    #[test]
    fn dark_and_bright_exposure() {
        assert_eq!(estimate_lighting(&grid(|_, _| 30)).exposure, Exposure::Low);
        assert_eq!(
            estimate_lighting(&grid(|_, _| 230)).exposure,
            Exposure::Bright
        );
    }

    #[test]
    fn describe_mentions_every_axis() {
        let text = LightingBlueprint::default().describe();
        assert!(text.contains("frontal key light"));
        assert!(text.contains("balanced exposure"));
        assert!(text.contains("5500K"));
    }
}
