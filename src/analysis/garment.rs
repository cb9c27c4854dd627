use std::fmt;
use std::str::FromStr;

use anyhow::Context as _;

use crate::foundation::core::Coverage;
use crate::foundation::error::{VestureError, VestureResult};

/// Longest side of the grid the garment is resampled onto.
const GRID_MAX: u32 = 96;
/// Per-channel distance from the border color that marks a foreground pixel.
const BG_DELTA: u8 = 40;
/// Alpha below this is background regardless of color.
const ALPHA_MIN: u8 = 32;
/// Below this share of foreground pixels the cue extraction gives up.
const MIN_FOREGROUND: f32 = 0.02;

/// Structural category of a garment reference image. Closed set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GarmentTopology {
    Top,
    Bottom,
    Dress,
    TwoPiece,
}

impl GarmentTopology {
    pub const ALL: [GarmentTopology; 4] = [Self::Top, Self::Bottom, Self::Dress, Self::TwoPiece];

    /// Least coverage the photo must show before this garment may be generated at all.
    pub fn minimum_coverage(self) -> Coverage {
        match self {
            Self::Dress => Coverage::FullBody,
            Self::TwoPiece => Coverage::UpperBody,
            Self::Top | Self::Bottom => Coverage::FaceOnly,
        }
    }

    /// Coverage needed to render the whole garment rather than a cropped preview.
    pub fn full_render_coverage(self) -> Coverage {
        match self {
            Self::Top => Coverage::UpperBody,
            Self::Bottom | Self::Dress | Self::TwoPiece => Coverage::FullBody,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Top => "TOP",
            Self::Bottom => "BOTTOM",
            Self::Dress => "DRESS",
            Self::TwoPiece => "TWO_PIECE",
        }
    }

    pub fn human(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Dress => "dress",
            Self::TwoPiece => "two-piece",
        }
    }
}

impl fmt::Display for GarmentTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GarmentTopology {
    type Err = VestureError;

    fn from_str(s: &str) -> VestureResult<Self> {
        let norm = s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        match norm.as_str() {
            "top" | "shirt" | "blouse" => Ok(Self::Top),
            "bottom" | "pants" | "trousers" | "skirt" => Ok(Self::Bottom),
            "dress" | "gown" => Ok(Self::Dress),
            "twopiece" | "set" | "suit" => Ok(Self::TwoPiece),
            _ => Err(VestureError::validation(format!(
                "unknown garment topology '{s}'"
            ))),
        }
    }
}

/// Structural measurements taken from the garment silhouette.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct TopologyCues {
    /// Bounding box height over width, in pixels.
    pub aspect: f32,
    /// Empty rows split the silhouette into an upper and a lower piece.
    pub vertical_gap: bool,
    /// Empty columns split the silhouette into pieces laid side by side.
    pub column_gap: bool,
    /// Share of rows in the lower 40% with two or more separate runs.
    pub leg_split: f32,
    /// Widest lower row over the narrowest middle row.
    pub flare: f32,
    /// Mean width of the top 15% of rows over the mean width of the bottom 15%.
    pub top_to_bottom: f32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct TopologyClassification {
    pub topology: GarmentTopology,
    pub confidence: f32,
    pub cues: Option<TopologyCues>,
    /// Caller-declared category, classification skipped.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub hinted: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

impl TopologyClassification {
    pub fn hinted(topology: GarmentTopology) -> Self {
        Self {
            topology,
            confidence: 1.0,
            cues: None,
            hinted: true,
            degraded: false,
        }
    }

    /// Default when the garment image cannot be read or is empty.
    pub fn fallback() -> Self {
        Self {
            topology: GarmentTopology::Top,
            confidence: 0.3,
            cues: None,
            hinted: false,
            degraded: true,
        }
    }
}

/// Ordered rules over silhouette cues. First match wins.
pub fn classify_cues(c: &TopologyCues) -> (GarmentTopology, f32) {
    if c.vertical_gap || c.column_gap {
        (GarmentTopology::TwoPiece, 0.85)
    } else if c.leg_split > 0.6 {
        (GarmentTopology::Bottom, 0.8)
    } else if c.aspect > 1.3 && c.flare > 1.25 {
        (GarmentTopology::Dress, 0.8)
    } else if c.aspect > 1.6 {
        (GarmentTopology::Dress, 0.6)
    } else if c.top_to_bottom < 0.8 {
        (GarmentTopology::Bottom, 0.6)
    } else {
        (GarmentTopology::Top, 0.7)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct GarmentTopologyClassifier;

impl GarmentTopologyClassifier {
    #[tracing::instrument(skip(self, image), fields(bytes = image.len()))]
    pub fn classify(&self, image: &[u8]) -> TopologyClassification {
        let cues = match extract_cues(image) {
            Ok(Some(cues)) => cues,
            Ok(None) => {
                tracing::warn!("garment silhouette too small, defaulting topology");
                return TopologyClassification::fallback();
            }
            Err(err) => {
                tracing::warn!(error = %err, "garment image unreadable, defaulting topology");
                return TopologyClassification::fallback();
            }
        };
        let (topology, confidence) = classify_cues(&cues);
        tracing::debug!(?cues, %topology, confidence, "garment topology classified");
        TopologyClassification {
            topology,
            confidence,
            cues: Some(cues),
            hinted: false,
            degraded: false,
        }
    }
}

struct Mask {
    width: u32,
    height: u32,
    on: Vec<bool>,
}

impl Mask {
    fn get(&self, x: u32, y: u32) -> bool {
        self.on[(y * self.width + x) as usize]
    }
}

fn foreground_mask(image: &[u8]) -> VestureResult<Mask> {
    let img = image::load_from_memory(image)
        .context("decode garment image from memory")?;
    let rgba = img
        .resize(GRID_MAX, GRID_MAX, image::imageops::FilterType::Triangle)
        .to_rgba8();
    let (width, height) = rgba.dimensions();
    if width < 4 || height < 4 {
        return Err(VestureError::analysis("garment image too small"));
    }

    let mut border = [0u64; 3];
    let mut n = 0u64;
    for (x, y, px) in rgba.enumerate_pixels() {
        if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
            for (acc, c) in border.iter_mut().zip(px.0) {
                *acc += u64::from(c);
            }
            n += 1;
        }
    }
    let bg = border.map(|c| (c / n.max(1)) as u8);

    let on = rgba
        .pixels()
        .map(|px| {
            let [r, g, b, a] = px.0;
            a >= ALPHA_MIN
                && (r.abs_diff(bg[0]) > BG_DELTA
                    || g.abs_diff(bg[1]) > BG_DELTA
                    || b.abs_diff(bg[2]) > BG_DELTA)
        })
        .collect();
    Ok(Mask { width, height, on })
}

fn extract_cues(image: &[u8]) -> VestureResult<Option<TopologyCues>> {
    let mask = foreground_mask(image)?;
    let total = mask.on.iter().filter(|&&v| v).count();
    if (total as f32) < MIN_FOREGROUND * mask.on.len() as f32 {
        return Ok(None);
    }

    let row_count = |y: u32| (0..mask.width).filter(|&x| mask.get(x, y)).count();
    let col_count = |x: u32| (0..mask.height).filter(|&y| mask.get(x, y)).count();

    let rows_on = (0..mask.height)
        .filter(|&y| row_count(y) > 0)
        .collect::<Vec<_>>();
    let cols_on = (0..mask.width)
        .filter(|&x| col_count(x) > 0)
        .collect::<Vec<_>>();
    let (Some(&top), Some(&bottom)) = (rows_on.first(), rows_on.last()) else {
        return Ok(None);
    };
    let (Some(&left), Some(&right)) = (cols_on.first(), cols_on.last()) else {
        return Ok(None);
    };
    let bw = right - left + 1;
    let bh = bottom - top + 1;

    let min_gap_rows = ((bh as f32 * 0.04).ceil() as u32).max(2);
    let min_gap_cols = ((bw as f32 * 0.04).ceil() as u32).max(2);
    let vertical_gap = longest_empty_run(top..=bottom, |y| row_count(y) == 0) >= min_gap_rows;
    let column_gap = longest_empty_run(left..=right, |x| col_count(x) == 0) >= min_gap_cols;

    let widths = (top..=bottom)
        .map(|y| row_count(y) as f32)
        .collect::<Vec<_>>();
    let at = |frac: f32| ((bh as f32 * frac) as usize).min(widths.len());

    let lower = (top + (bh as f32 * 0.6) as u32)..=bottom;
    let lower_len = lower.clone().count().max(1);
    let split_rows = lower.filter(|&y| runs_in_row(&mask, y) >= 2).count();
    let leg_split = split_rows as f32 / lower_len as f32;

    let waist = widths[at(0.35)..at(0.65)]
        .iter()
        .copied()
        .filter(|&w| w > 0.0)
        .fold(f32::MAX, f32::min);
    let hem = widths[at(0.75)..]
        .iter()
        .copied()
        .fold(0.0f32, f32::max);
    let flare = if waist == f32::MAX || waist <= 0.0 {
        1.0
    } else {
        hem / waist
    };

    let top_mean = mean(&widths[..at(0.15).max(1)]);
    let bottom_mean = mean(&widths[at(0.85).min(widths.len() - 1)..]);
    let top_to_bottom = top_mean / bottom_mean.max(1.0);

    Ok(Some(TopologyCues {
        aspect: bh as f32 / bw as f32,
        vertical_gap,
        column_gap,
        leg_split,
        flare,
        top_to_bottom,
    }))
}

fn longest_empty_run(range: std::ops::RangeInclusive<u32>, empty: impl Fn(u32) -> bool) -> u32 {
    let (mut best, mut cur) = (0u32, 0u32);
    for i in range {
        if empty(i) {
            cur += 1;
            best = best.max(cur);
        } else {
            cur = 0;
        }
    }
    best
}

/// Foreground runs in a row, ignoring holes narrower than two pixels.
fn runs_in_row(mask: &Mask, y: u32) -> usize {
    let mut runs = 0usize;
    let mut gap = u32::MAX;
    for x in 0..mask.width {
        if mask.get(x, y) {
            if gap >= 2 {
                runs += 1;
            }
            gap = 0;
        } else {
            gap = gap.saturating_add(1);
        }
    }
    runs
}

fn mean(v: &[f32]) -> f32 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f32>() / v.len() as f32
}
