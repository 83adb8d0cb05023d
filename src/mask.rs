use std::{fmt, str::FromStr};

use image::{DynamicImage, GrayImage, Luma};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CloudError;

/// Luma values strictly below this are fillable; pure white is excluded.
pub const DEFAULT_MASK_THRESHOLD: u8 = 255;

const FILLABLE: Luma<u8> = Luma([0]);
const EXCLUDED: Luma<u8> = Luma([255]);

/// The silhouettes a cloud can be drawn into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MaskPreset {
    #[default]
    None,
    Ellipse,
    SpeechBubble,
    Heart,
}

impl MaskPreset {
    pub const ALL: [MaskPreset; 4] = [
        MaskPreset::None,
        MaskPreset::Ellipse,
        MaskPreset::SpeechBubble,
        MaskPreset::Heart,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MaskPreset::None => "none",
            MaskPreset::Ellipse => "ellipse",
            MaskPreset::SpeechBubble => "speech-bubble",
            MaskPreset::Heart => "heart",
        }
    }

    /// Fixed asset file backing this preset.
    pub fn file_name(self) -> &'static str {
        match self {
            MaskPreset::None => "background_0.png",
            MaskPreset::Ellipse => "background_1.png",
            MaskPreset::SpeechBubble => "background_2.png",
            MaskPreset::Heart => "background_3.png",
        }
    }

    /// Lenient lookup: anything unrecognised falls back to [`MaskPreset::None`].
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!(mask = name, "unknown mask name, falling back to 'none'");
            MaskPreset::None
        })
    }

    /// Draws the preset procedurally. Fillable pixels are black, the rest white.
    pub fn synthesize(self, width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let u = (x as f64 + 0.5) / width as f64;
            let v = (y as f64 + 0.5) / height as f64;
            if self.contains(u, v) {
                FILLABLE
            } else {
                EXCLUDED
            }
        })
    }

    fn contains(self, u: f64, v: f64) -> bool {
        match self {
            MaskPreset::None => true,
            MaskPreset::Ellipse => inside_ellipse(u, v, (0.5, 0.5), (0.46, 0.34)),
            MaskPreset::SpeechBubble => {
                inside_ellipse(u, v, (0.5, 0.42), (0.45, 0.32))
                    || inside_triangle((u, v), (0.30, 0.66), (0.22, 0.92), (0.48, 0.70))
            }
            MaskPreset::Heart => {
                let x = (u - 0.5) * 2.7;
                let y = (0.47 - v) * 2.7;
                let a = x * x + y * y - 1.0;
                a * a * a - x * x * y * y * y <= 0.0
            }
        }
    }
}

fn inside_ellipse(u: f64, v: f64, center: (f64, f64), radius: (f64, f64)) -> bool {
    let dx = (u - center.0) / radius.0;
    let dy = (v - center.1) / radius.1;
    dx * dx + dy * dy <= 1.0
}

fn inside_triangle(p: (f64, f64), a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> bool {
    let cross = |o: (f64, f64), s: (f64, f64)| (s.0 - o.0) * (p.1 - o.1) - (s.1 - o.1) * (p.0 - o.0);
    let (d1, d2, d3) = (cross(a, b), cross(b, c), cross(c, a));
    let negative = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let positive = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(negative && positive)
}

impl FromStr for MaskPreset {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "없음" => Ok(MaskPreset::None),
            "ellipse" | "타원" => Ok(MaskPreset::Ellipse),
            "speech-bubble" | "speech_bubble" | "말풍선" => Ok(MaskPreset::SpeechBubble),
            "heart" | "하트" => Ok(MaskPreset::Heart),
            other => Err(CloudError::MalformedInput(format!(
                "unknown mask preset '{other}'"
            ))),
        }
    }
}

impl fmt::Display for MaskPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for MaskPreset {
    fn from(value: String) -> Self {
        MaskPreset::from_name(&value)
    }
}

impl From<MaskPreset> for String {
    fn from(value: MaskPreset) -> Self {
        value.name().to_owned()
    }
}

/// A binarized silhouette: where words may go and where they may not.
#[derive(Clone, Debug)]
pub struct Mask {
    image: GrayImage,
    threshold: u8,
}

impl Mask {
    pub fn new(image: GrayImage, threshold: u8) -> Self {
        Mask { image, threshold }
    }

    pub fn from_image(image: &DynamicImage, threshold: u8) -> Self {
        Mask::new(image.to_luma8(), threshold)
    }

    pub fn from_preset(preset: MaskPreset, width: u32, height: u32) -> Self {
        Mask::new(preset.synthesize(width, height), DEFAULT_MASK_THRESHOLD)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn is_fillable(&self, x: u32, y: u32) -> bool {
        x < self.width() && y < self.height() && self.image.get_pixel(x, y).0[0] < self.threshold
    }

    pub fn fillable_pixels(&self) -> usize {
        self.image
            .pixels()
            .filter(|px| px.0[0] < self.threshold)
            .count()
    }

    /// Row-major grid with 1 where placement is forbidden.
    pub fn blocked_cells(&self) -> Vec<u32> {
        self.image
            .pixels()
            .map(|px| u32::from(px.0[0] >= self.threshold))
            .collect()
    }

    /// Excluded pixels that touch the fillable area.
    pub fn outer_edge(&self) -> Vec<(u32, u32)> {
        let (width, height) = (self.width(), self.height());
        let mut edge = vec![];
        for y in 0..height {
            for x in 0..width {
                if self.is_fillable(x, y) {
                    continue;
                }
                let touches = [(0i64, -1i64), (0, 1), (-1, 0), (1, 0)].iter().any(|(dx, dy)| {
                    let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                    nx >= 0 && ny >= 0 && self.is_fillable(nx as u32, ny as u32)
                });
                if touches {
                    edge.push((x, y));
                }
            }
        }
        edge
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{Mask, MaskPreset};

    #[test]
    fn unknown_name_falls_back_to_none() {
        assert_eq!(MaskPreset::from_name("star"), MaskPreset::None);
        assert_eq!(MaskPreset::from_name(""), MaskPreset::None);
        assert!("star".parse::<MaskPreset>().is_err());
    }

    #[test]
    fn parses_english_and_korean_labels() {
        assert_eq!(MaskPreset::from_name("ellipse"), MaskPreset::Ellipse);
        assert_eq!(MaskPreset::from_name("타원"), MaskPreset::Ellipse);
        assert_eq!(MaskPreset::from_name("Speech-Bubble"), MaskPreset::SpeechBubble);
        assert_eq!(MaskPreset::from_name("말풍선"), MaskPreset::SpeechBubble);
        assert_eq!(MaskPreset::from_name("하트"), MaskPreset::Heart);
        assert_eq!(MaskPreset::from_name("없음"), MaskPreset::None);
        for preset in MaskPreset::ALL {
            assert_eq!(preset.name().parse::<MaskPreset>().unwrap(), preset);
        }
    }

    #[test]
    fn presets_map_to_distinct_files() {
        let files: HashSet<_> = MaskPreset::ALL.iter().map(|p| p.file_name()).collect();
        assert_eq!(files.len(), 4);
    }

    #[test]
    fn synthesized_shapes_are_centered() {
        for preset in MaskPreset::ALL {
            let mask = Mask::from_preset(preset, 100, 100);
            assert!(mask.is_fillable(50, 45), "{preset} center should be fillable");
        }
        let none = Mask::from_preset(MaskPreset::None, 40, 30);
        assert_eq!(none.fillable_pixels(), 40 * 30);
        assert!(none.outer_edge().is_empty());

        let heart = Mask::from_preset(MaskPreset::Heart, 100, 100);
        assert!(!heart.is_fillable(0, 0));
        assert!(!heart.is_fillable(99, 99));
        assert!(heart.fillable_pixels() < 100 * 100);
        assert!(!heart.outer_edge().is_empty());
    }

    #[test]
    fn blocked_cells_mark_excluded_area() {
        let mask = Mask::from_preset(MaskPreset::Ellipse, 50, 50);
        let blocked = mask.blocked_cells();
        assert_eq!(blocked.len(), 2500);
        assert_eq!(blocked[0], 1);
        assert_eq!(blocked[25 * 50 + 25], 0);
    }

    #[test]
    fn out_of_bounds_is_not_fillable() {
        let mask = Mask::from_preset(MaskPreset::None, 10, 10);
        assert!(!mask.is_fillable(10, 0));
        assert!(!mask.is_fillable(0, 10));
    }

    #[test]
    fn serde_uses_lenient_names() {
        let preset: MaskPreset = serde_json::from_str("\"heart\"").unwrap();
        assert_eq!(preset, MaskPreset::Heart);
        let preset: MaskPreset = serde_json::from_str("\"triangle\"").unwrap();
        assert_eq!(preset, MaskPreset::None);
        assert_eq!(
            serde_json::to_string(&MaskPreset::SpeechBubble).unwrap(),
            "\"speech-bubble\""
        );
    }
}
