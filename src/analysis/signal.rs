use std::ops::Range;

use anyhow::Context as _;

use crate::config::DetectorConfig;
use crate::foundation::core::NormRect;
use crate::foundation::error::VestureResult;

/// Columns closer than this are merged into one busy segment.
const SEGMENT_GAP: u32 = 2;

/// Single-channel intensity image at the fixed analysis grid size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LumaGrid {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl LumaGrid {
    #[inline]
    pub fn at(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.width + x) as usize]
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let start = (y * self.width) as usize;
        &self.data[start..start + self.width as usize]
    }

    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.data.iter().map(|&v| u64::from(v)).sum();
        sum as f32 / self.data.len() as f32
    }
}

/// Decode an encoded image and resample it onto the analysis grid.
///
/// Nearest sampling keeps fine texture contrast intact; a smoothing filter would flatten the
/// edge energy the detector relies on.
pub fn decode_luma_grid(bytes: &[u8], width: u32, height: u32) -> VestureResult<LumaGrid> {
    let img = image::load_from_memory(bytes)
        .context("decode person image from memory")?;
    let luma = img
        .resize_exact(width, height, image::imageops::FilterType::Nearest)
        .to_luma8();
    Ok(LumaGrid {
        width,
        height,
        data: luma.into_raw(),
    })
}

/// Fixed vertical bands, as fractions of image height.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Band {
    Face,
    Shoulders,
    Hips,
    Knees,
}

impl Band {
    pub const ALL: [Band; 4] = [Band::Face, Band::Shoulders, Band::Hips, Band::Knees];

    pub fn fractions(self) -> (f32, f32) {
        match self {
            Band::Face => (0.0, 0.25),
            Band::Shoulders => (0.15, 0.35),
            Band::Hips => (0.40, 0.55),
            Band::Knees => (0.65, 0.80),
        }
    }

    pub fn landmark(self) -> &'static str {
        match self {
            Band::Face => "face",
            Band::Shoulders => "shoulders",
            Band::Hips => "hips",
            Band::Knees => "knees",
        }
    }
}

/// Row range for a `(start, end)` fraction pair on a grid of `height` rows.
pub fn fraction_rows(height: u32, (start, end): (f32, f32)) -> Range<usize> {
    let h = height as f32;
    let a = (start * h).floor() as usize;
    let b = ((end * h).floor() as usize).min(height as usize);
    a..b.max(a)
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowSignal {
    /// Mean neighbor difference inside the centered column band, normalized to `0..=1`.
    pub activity: f32,
    /// Busy column runs across the full width, as half-open `[start, end)`.
    pub segments: Vec<(u32, u32)>,
}

impl RowSignal {
    pub fn span(&self) -> Option<(u32, u32)> {
        let first = self.segments.first()?;
        let last = self.segments.last()?;
        Some((first.0, last.1))
    }

    pub fn span_width(&self) -> u32 {
        self.span().map_or(0, |(a, b)| b - a)
    }
}

/// Per-row activity signal for one person image; lives for a single analysis call.
#[derive(Clone, Debug, PartialEq)]
pub struct ActivityProfile {
    pub grid: LumaGrid,
    pub rows: Vec<RowSignal>,
    pub row_threshold: f32,
    pub background_threshold: f32,
    pub band_fill: f32,
}

impl ActivityProfile {
    pub fn measure(grid: LumaGrid, cfg: &DetectorConfig) -> Self {
        let w = grid.width;
        let band_w = ((w as f32 * cfg.center_band).round() as u32).clamp(2, w);
        let x0 = (w - band_w) / 2;
        let x1 = x0 + band_w;

        let rows = (0..grid.height)
            .map(|y| {
                let row = grid.row(y);
                let mut sum = 0u32;
                for x in x0..x1 - 1 {
                    sum += u32::from(row[x as usize].abs_diff(row[x as usize + 1]));
                }
                let activity = sum as f32 / ((x1 - x0 - 1) as f32 * 255.0);
                RowSignal {
                    activity,
                    segments: busy_segments(row, cfg.pixel_edge),
                }
            })
            .collect();

        Self {
            grid,
            rows,
            row_threshold: cfg.row_threshold,
            background_threshold: cfg.background_threshold,
            band_fill: cfg.band_fill,
        }
    }

    pub fn height(&self) -> u32 {
        self.grid.height
    }

    pub fn width(&self) -> u32 {
        self.grid.width
    }

    pub fn band_rows(&self, band: Band) -> Range<usize> {
        fraction_rows(self.height(), band.fractions())
    }

    pub fn is_busy(&self, y: usize) -> bool {
        self.rows[y].activity > self.row_threshold
    }

    /// Fraction of rows in `rows` that are busy.
    pub fn fill(&self, rows: Range<usize>) -> f32 {
        let n = rows.len();
        if n == 0 {
            return 0.0;
        }
        let busy = rows.filter(|&y| self.is_busy(y)).count();
        busy as f32 / n as f32
    }

    pub fn band_active(&self, band: Band) -> bool {
        self.fill(self.band_rows(band)) >= self.band_fill
    }

    /// Lowest row whose activity rises above the background threshold.
    pub fn bottom_edge(&self) -> Option<usize> {
        self.rows
            .iter()
            .rposition(|r| r.activity > self.background_threshold)
    }

    /// Fraction of image height from the top down to the bottom edge.
    pub fn body_height(&self) -> f32 {
        match self.bottom_edge() {
            Some(y) => (y + 1) as f32 / self.height() as f32,
            None => 0.0,
        }
    }

    /// Mean span width (normalized by grid width) over busy rows in `rows`.
    pub fn mean_span(&self, rows: Range<usize>) -> Option<f32> {
        let widths = rows
            .filter(|&y| self.is_busy(y))
            .map(|y| self.rows[y].span_width())
            .filter(|&w| w > 0)
            .collect::<Vec<_>>();
        if widths.is_empty() {
            return None;
        }
        let sum: u32 = widths.iter().sum();
        Some(sum as f32 / widths.len() as f32 / self.width() as f32)
    }

    /// Bounding box of busy content inside the face band.
    ///
    /// Horizontal edges are medians over busy rows so a shoulder line entering the bottom of
    /// the band does not stretch the box.
    pub fn face_region(&self) -> Option<NormRect> {
        let rows = self.band_rows(Band::Face);
        let busy = rows
            .filter(|&y| self.is_busy(y))
            .filter_map(|y| self.rows[y].span().map(|s| (y, s)))
            .collect::<Vec<_>>();
        let (top, _) = *busy.first()?;
        let (bottom, _) = *busy.last()?;

        let mut lefts = busy.iter().map(|(_, s)| s.0).collect::<Vec<_>>();
        let mut rights = busy.iter().map(|(_, s)| s.1).collect::<Vec<_>>();
        lefts.sort_unstable();
        rights.sort_unstable();
        let left = lefts[lefts.len() / 2];
        let right = rights[rights.len() / 2];
        if right <= left {
            return None;
        }

        let w = self.width() as f32;
        let h = self.height() as f32;
        Some(NormRect {
            x: left as f32 / w,
            y: top as f32 / h,
            width: (right - left) as f32 / w,
            height: (bottom + 1 - top) as f32 / h,
        })
    }
}

fn busy_segments(row: &[u8], pixel_edge: u8) -> Vec<(u32, u32)> {
    let mut out: Vec<(u32, u32)> = Vec::new();
    for x in 0..row.len().saturating_sub(1) {
        if row[x].abs_diff(row[x + 1]) < pixel_edge {
            continue;
        }
        let x = x as u32;
        match out.last_mut() {
            Some(last) if x <= last.1 + SEGMENT_GAP => last.1 = x + 1,
            _ => out.push((x, x + 1)),
        }
    }
    out
}
