//! Qualitative body and face descriptors.
//!
//! Body fields are measured only on rows below the face band and only when the band that
//! backs them was detected. Face geometry never feeds a body field.

use crate::analysis::coverage::BandReading;
use crate::analysis::signal::{ActivityProfile, fraction_rows};
use crate::foundation::core::{Coverage, NormRect};

const SHOULDER_ROWS: (f32, f32) = (0.25, 0.35);
const TORSO_ROWS: (f32, f32) = (0.35, 0.45);
const HIP_ROWS: (f32, f32) = (0.45, 0.55);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceShape {
    #[default]
    Unknown,
    Oval,
    Round,
    Long,
    Square,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Volume {
    #[default]
    Unknown,
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Width {
    #[default]
    Unknown,
    Narrow,
    Average,
    Broad,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Thickness {
    #[default]
    Unknown,
    Slim,
    Average,
    Thick,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorsoVolume {
    #[default]
    Unknown,
    Slim,
    Average,
    Full,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyBuild {
    #[default]
    Unknown,
    Slim,
    Average,
    Athletic,
    Curvy,
    PlusSize,
}

macro_rules! impl_label {
    ($ty:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $ty {
            pub fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }

            pub fn is_known(self) -> bool {
                !matches!(self, Self::Unknown)
            }
        }
    };
}

impl_label!(FaceShape {
    Unknown => "unknown",
    Oval => "oval",
    Round => "round",
    Long => "long",
    Square => "square",
});
impl_label!(Volume { Unknown => "unknown", Low => "low", Medium => "medium", High => "high" });
impl_label!(Width {
    Unknown => "unknown",
    Narrow => "narrow",
    Average => "average",
    Broad => "broad",
});
impl_label!(Thickness {
    Unknown => "unknown",
    Slim => "slim",
    Average => "average",
    Thick => "thick",
});
impl_label!(TorsoVolume {
    Unknown => "unknown",
    Slim => "slim",
    Average => "average",
    Full => "full",
});
impl_label!(BodyBuild {
    Unknown => "unknown",
    Slim => "slim",
    Average => "average",
    Athletic => "athletic",
    Curvy => "curvy",
    PlusSize => "plus-size",
});

/// Advisory description of the person in the source photo.
///
/// `Unknown` and `None` mean "not visible"; the compiler then tells the engine to copy the
/// region from the photo rather than describing it.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BodyProfile {
    pub face_shape: FaceShape,
    pub cheek_volume: Volume,
    pub jaw_width: Width,
    pub shoulder_width: Width,
    pub arm_thickness: Thickness,
    pub torso_volume: TorsoVolume,
    pub body_build: BodyBuild,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_to_body: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shoulder_to_hip: Option<f32>,
}

impl BodyProfile {
    /// `(label, value)` pairs for every body field backed by visible pixels.
    pub fn body_descriptors(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if self.shoulder_width.is_known() {
            out.push(("shoulder width", self.shoulder_width.label().to_string()));
        }
        if self.arm_thickness.is_known() {
            out.push(("arm thickness", self.arm_thickness.label().to_string()));
        }
        if self.torso_volume.is_known() {
            out.push(("torso volume", self.torso_volume.label().to_string()));
        }
        if self.body_build.is_known() {
            out.push(("body build", self.body_build.label().to_string()));
        }
        if let Some(r) = self.shoulder_to_hip {
            out.push(("shoulder-to-hip ratio", format!("{r:.2}")));
        }
        if let Some(r) = self.head_to_body {
            out.push(("head-to-body ratio", format!("{r:.2}")));
        }
        out
    }

    pub fn face_descriptors(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if self.face_shape.is_known() {
            out.push(("face shape", self.face_shape.label().to_string()));
        }
        if self.cheek_volume.is_known() {
            out.push(("cheek volume", self.cheek_volume.label().to_string()));
        }
        if self.jaw_width.is_known() {
            out.push(("jaw width", self.jaw_width.label().to_string()));
        }
        out
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BodyProfileAnalyzer;

impl BodyProfileAnalyzer {
    pub fn analyze(
        &self,
        profile: Option<&ActivityProfile>,
        reading: Option<&BandReading>,
        face: Option<NormRect>,
        coverage: Coverage,
    ) -> BodyProfile {
        let (Some(profile), Some(reading)) = (profile, reading) else {
            return BodyProfile::default();
        };

        let mut out = BodyProfile::default();
        if let Some(face) = face {
            apply_face_fields(&mut out, profile, face);
        }
        apply_body_fields(&mut out, profile, reading);

        if coverage == Coverage::FullBody && reading.body_height > 0.0 {
            if let Some(face) = face {
                out.head_to_body = Some(face.height / reading.body_height);
            }
        }
        out
    }
}

fn apply_face_fields(out: &mut BodyProfile, profile: &ActivityProfile, face: NormRect) {
    let h = profile.height() as f32;
    let w = profile.width() as f32;
    let top = (face.y * h).round() as usize;
    let bottom = ((face.y + face.height) * h).round() as usize;
    let widths = (top..bottom.min(profile.rows.len()))
        .filter(|&y| profile.is_busy(y))
        .map(|y| profile.rows[y].span_width() as f32 / w)
        .collect::<Vec<_>>();
    if widths.len() < 4 {
        return;
    }

    let n = widths.len();
    let upper = mean(&widths[..n / 4]);
    let cheeks = mean(&widths[n * 2 / 4..n * 3 / 4]);
    let jaw = mean(&widths[n * 3 / 4..]);

    out.cheek_volume = match cheeks / upper.max(f32::EPSILON) {
        r if r > 1.05 => Volume::High,
        r if r < 0.9 => Volume::Low,
        _ => Volume::Medium,
    };
    out.jaw_width = match jaw / face.width.max(f32::EPSILON) {
        r if r > 0.9 => Width::Broad,
        r if r < 0.7 => Width::Narrow,
        _ => Width::Average,
    };

    let pixel_aspect = (face.width * w) / (face.height * h).max(f32::EPSILON);
    out.face_shape = if pixel_aspect > 0.95 {
        FaceShape::Round
    } else if pixel_aspect < 0.7 {
        FaceShape::Long
    } else if out.jaw_width == Width::Broad {
        FaceShape::Square
    } else {
        FaceShape::Oval
    };
}

fn apply_body_fields(out: &mut BodyProfile, profile: &ActivityProfile, reading: &BandReading) {
    let h = profile.height();
    let shoulder_rows = fraction_rows(h, SHOULDER_ROWS);
    let torso_rows = fraction_rows(h, TORSO_ROWS);
    let hip_rows = fraction_rows(h, HIP_ROWS);

    let shoulders = if reading.shoulders {
        profile.mean_span(shoulder_rows)
    } else {
        None
    };
    let torso = if reading.shoulders && reading.body_height >= TORSO_ROWS.1 {
        profile.mean_span(torso_rows.clone())
    } else {
        None
    };
    let hips = if reading.hips {
        profile.mean_span(hip_rows)
    } else {
        None
    };

    if let Some(s) = shoulders {
        out.shoulder_width = match s {
            s if s < 0.35 => Width::Narrow,
            s if s > 0.55 => Width::Broad,
            _ => Width::Average,
        };
    }

    if let (Some(s), Some(t)) = (shoulders, torso) {
        out.torso_volume = match t / s.max(f32::EPSILON) {
            r if r >= 0.95 => TorsoVolume::Full,
            r if r < 0.75 => TorsoVolume::Slim,
            _ => TorsoVolume::Average,
        };
    }

    if torso.is_some() {
        out.arm_thickness = arm_thickness(profile, torso_rows);
    }

    if let (Some(s), Some(hp)) = (shoulders, hips) {
        out.shoulder_to_hip = Some(s / hp.max(f32::EPSILON));
    }

    out.body_build = match (out.torso_volume, out.shoulder_width, out.shoulder_to_hip) {
        (TorsoVolume::Unknown, _, _) => BodyBuild::Unknown,
        (TorsoVolume::Full, _, _) => BodyBuild::PlusSize,
        (TorsoVolume::Slim, _, _) => BodyBuild::Slim,
        (TorsoVolume::Average, Width::Broad, Some(r)) if r > 1.2 => BodyBuild::Athletic,
        (TorsoVolume::Average, _, Some(r)) if r < 0.9 => BodyBuild::Curvy,
        (TorsoVolume::Average, _, _) => BodyBuild::Average,
    };
}

/// Rows with three or more busy segments read as arm, torso, arm.
fn arm_thickness(profile: &ActivityProfile, rows: std::ops::Range<usize>) -> Thickness {
    let w = profile.width() as f32;
    let arms = rows
        .filter(|&y| profile.is_busy(y))
        .filter_map(|y| {
            let segs = &profile.rows[y].segments;
            if segs.len() < 3 {
                return None;
            }
            let (first, last) = (segs[0], segs[segs.len() - 1]);
            Some(((first.1 - first.0) + (last.1 - last.0)) as f32 / 2.0 / w)
        })
        .collect::<Vec<_>>();
    if arms.is_empty() {
        return Thickness::Unknown;
    }
    match mean(&arms) {
        a if a < 0.06 => Thickness::Slim,
        a if a > 0.11 => Thickness::Thick,
        _ => Thickness::Average,
    }
}

fn mean(v: &[f32]) -> f32 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f32>() / v.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::signal::LumaGrid;
    use crate::config::DetectorConfig;

    /// Paint a striped block `[x0, x1)` on rows `[y0, y1)` of a flat 64x128 grid.
    fn paint(data: &mut [u8], (x0, x1): (u32, u32), (y0, y1): (u32, u32)) {
        for y in y0..y1 {
            for x in x0..x1 {
                data[(y * 64 + x) as usize] = if x % 2 == 0 { 30 } else { 225 };
            }
        }
    }

    fn profile_of(data: Vec<u8>) -> ActivityProfile {
        ActivityProfile::measure(
            LumaGrid {
                width: 64,
                height: 128,
                data,
            },
            &DetectorConfig::default(),
        )
    }

    fn person(face_half_width: u32) -> ActivityProfile {
        let mut data = vec![128u8; 64 * 128];
        paint(
            &mut data,
            (32 - face_half_width, 32 + face_half_width),
            (4, 28),
        );
        paint(&mut data, (18, 46), (28, 45));
        paint(&mut data, (20, 44), (45, 58));
        paint(&mut data, (22, 42), (58, 90));
        profile_of(data)
    }

    fn analyze(p: &ActivityProfile) -> BodyProfile {
        let reading = BandReading::from_profile(p);
        let (coverage, _) = crate::analysis::coverage::classify(&reading);
        BodyProfileAnalyzer.analyze(Some(p), Some(&reading), p.face_region(), coverage)
    }

    #[test]
    fn missing_signal_yields_all_unknown() {
        let out = BodyProfileAnalyzer.analyze(None, None, None, Coverage::FullBody);
        assert_eq!(out, BodyProfile::default());
        assert!(out.body_descriptors().is_empty());
    }

    #[test]
    fn body_fields_do_not_depend_on_face_width() {
        let narrow = analyze(&person(6));
        let wide = analyze(&person(14));

        assert_eq!(narrow.shoulder_width, wide.shoulder_width);
        assert_eq!(narrow.torso_volume, wide.torso_volume);
        assert_eq!(narrow.arm_thickness, wide.arm_thickness);
        assert_eq!(narrow.body_build, wide.body_build);
        assert_eq!(narrow.shoulder_to_hip, wide.shoulder_to_hip);
        assert!(narrow.shoulder_width.is_known());
    }

    #[test]
    fn face_only_photo_leaves_body_unknown() {
        let mut data = vec![128u8; 64 * 128];
        paint(&mut data, (20, 44), (2, 26));
        let p = profile_of(data);
        let out = analyze(&p);
        assert_eq!(out.shoulder_width, Width::Unknown);
        assert_eq!(out.torso_volume, TorsoVolume::Unknown);
        assert_eq!(out.body_build, BodyBuild::Unknown);
        assert_eq!(out.head_to_body, None);
        assert!(out.face_shape.is_known());
    }

    #[test]
    fn three_segment_rows_measure_arms() {
        let mut data = vec![128u8; 64 * 128];
        paint(&mut data, (24, 40), (2, 30));
        paint(&mut data, (14, 50), (30, 45));
        // Arms either side of the torso with a flat gap between.
        paint(&mut data, (10, 15), (45, 58));
        paint(&mut data, (22, 42), (45, 58));
        paint(&mut data, (49, 54), (45, 58));
        paint(&mut data, (22, 42), (58, 90));
        let out = analyze(&profile_of(data));
        assert_eq!(out.arm_thickness, Thickness::Average);
    }
}
