use ab_glyph::PxScale;
use image::{Rgba, RgbaImage};
use nanorand::{Rng, WyRand};
use palette::{Hsl, IntoColor, Pixel, Srgb};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    assets::{AssetStore, FontHandle},
    error::{CloudError, Result},
    frequency::FrequencyTable,
    mask::{Mask, MaskPreset, DEFAULT_MASK_THRESHOLD},
    sat::{Occupancy, Rect},
    text::{self, WordSprite},
};

/// A word that made it onto the canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedWord {
    pub text: String,
    pub count: usize,
    pub font_size: f32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub rotated: bool,
    pub index: usize,
}

/// The rendered raster plus the layout that produced it.
#[derive(Clone, Debug)]
pub struct CloudImage {
    pub image: RgbaImage,
    pub words: Vec<PlacedWord>,
}

impl CloudImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

pub type ColorFunc = fn(&PlacedWord, &mut WyRand) -> Rgba<u8>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub mask: MaskPreset,
    pub max_words: usize,
    pub background_color: String,
    pub contour_color: String,
    pub contour_width: u32,
    pub min_font_size: f32,
    pub max_font_size: Option<f32>,
    pub font_step: f32,
    pub margin: u32,
    pub prefer_horizontal: f64,
    pub relative_scaling: f32,
    pub random_seed: Option<u64>,
    pub mask_threshold: u8,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            mask: MaskPreset::None,
            max_words: 70,
            background_color: "white".to_owned(),
            contour_color: "grey".to_owned(),
            contour_width: 3,
            min_font_size: 4.0,
            max_font_size: None,
            font_step: 1.0,
            margin: 2,
            prefer_horizontal: 0.9,
            relative_scaling: 0.5,
            random_seed: None,
            mask_threshold: DEFAULT_MASK_THRESHOLD,
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_font_size > 0.0) {
            return Err(CloudError::Config("min_font_size must be positive".into()));
        }
        if let Some(max) = self.max_font_size {
            if max < self.min_font_size {
                return Err(CloudError::Config(format!(
                    "max_font_size {max} is below min_font_size {}",
                    self.min_font_size
                )));
            }
        }
        if !(self.font_step > 0.0) {
            return Err(CloudError::Config("font_step must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.prefer_horizontal) {
            return Err(CloudError::Config(
                "prefer_horizontal must be within [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.relative_scaling) {
            return Err(CloudError::Config(
                "relative_scaling must be within [0, 1]".into(),
            ));
        }
        parse_color(&self.background_color)?;
        parse_color(&self.contour_color)?;
        Ok(())
    }
}

fn parse_color(value: &str) -> Result<Rgba<u8>> {
    csscolorparser::parse(value)
        .map(|color| Rgba(color.to_rgba8()))
        .map_err(|err| CloudError::Config(format!("invalid color '{value}': {err}")))
}

/// Lays ranked words out inside a mask and rasterizes them.
pub struct WordCloud {
    options: RenderOptions,
    background_color: Rgba<u8>,
    contour_color: Rgba<u8>,
    color_func: ColorFunc,
}

impl WordCloud {
    pub fn new(options: RenderOptions) -> Result<Self> {
        options.validate()?;

        Ok(WordCloud {
            background_color: parse_color(&options.background_color)?,
            contour_color: parse_color(&options.contour_color)?,
            options,
            color_func: random_color_rgba,
        })
    }

    pub fn with_color_func(mut self, value: ColorFunc) -> Self {
        self.color_func = value;
        self
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Renders into one of the preset masks found in `assets`.
    pub fn render(
        &self,
        frequencies: &FrequencyTable,
        mask: MaskPreset,
        max_words: usize,
        font: &FontHandle,
        assets: &AssetStore,
    ) -> Result<CloudImage> {
        let mask = assets.load_mask(mask)?;
        Ok(self.render_with_mask(frequencies, &mask, max_words, font))
    }

    pub fn render_with_mask(
        &self,
        frequencies: &FrequencyTable,
        mask: &Mask,
        max_words: usize,
        font: &FontHandle,
    ) -> CloudImage {
        let mut rng = match self.options.random_seed {
            Some(seed) => WyRand::new_seed(seed),
            None => WyRand::new(),
        };

        let words = frequencies.top(max_words);
        let layout = if words.is_empty() {
            vec![]
        } else {
            let max_font_size = self
                .options
                .max_font_size
                .unwrap_or_else(|| self.fitted_font_size(words, mask, font, &rng));
            self.layout(words, mask, font, max_font_size, &mut rng)
        };

        info!(
            requested = words.len(),
            placed = layout.len(),
            width = mask.width(),
            height = mask.height(),
            "word cloud rendered"
        );

        self.paint(mask, layout, &mut rng)
    }

    /// Starting size when none is configured: lay out the top two words at
    /// full mask height and take the harmonic mean of the sizes they got.
    fn fitted_font_size(
        &self,
        words: &[(String, usize)],
        mask: &Mask,
        font: &FontHandle,
        rng: &WyRand,
    ) -> f32 {
        let mut probe_rng = rng.clone();
        let probe = self.layout(
            &words[..words.len().min(2)],
            mask,
            font,
            mask.height() as f32,
            &mut probe_rng,
        );

        match probe.as_slice() {
            [] => self.options.min_font_size,
            [(only, _)] => only.font_size,
            [(first, _), (second, _), ..] => {
                let (a, b) = (first.font_size, second.font_size);
                (2.0 * a * b / (a + b)).floor()
            }
        }
    }

    fn layout(
        &self,
        words: &[(String, usize)],
        mask: &Mask,
        font: &FontHandle,
        max_font_size: f32,
        rng: &mut WyRand,
    ) -> Vec<(PlacedWord, WordSprite)> {
        let options = &self.options;
        let mut occupancy = Occupancy::new(mask.width(), mask.height(), mask.blocked_cells());
        let mut placed = Vec::with_capacity(words.len());

        let max_count = words.first().map_or(1, |(_, count)| *count).max(1) as f32;
        let mut font_size = max_font_size.floor();
        let mut last_freq = 1.0;

        for (index, (word, count)) in words.iter().enumerate() {
            if *count == 0 {
                continue;
            }
            let freq = *count as f32 / max_count;

            if options.relative_scaling != 0.0 {
                let rs = options.relative_scaling;
                font_size = ((rs * (freq / last_freq) + (1.0 - rs)) * font_size)
                    .round()
                    .min(font_size);
            }

            let mut rotated = rng.generate::<f64>() >= options.prefer_horizontal;
            let mut tried_other_orientation = false;
            let mut size = font_size;

            let found = loop {
                if size < options.min_font_size {
                    break None;
                }

                let scale = PxScale::from(size);
                if self.fits_canvas(word, font, scale, rotated, mask) {
                    let sprite = WordSprite::render(word, font.font(), scale, rotated);
                    let rect = Rect {
                        width: sprite.width() + options.margin,
                        height: sprite.height() + options.margin,
                    };
                    if let Some(point) = occupancy.find_space_for_rect(&rect, rng) {
                        break Some((point, sprite));
                    }
                }

                if !tried_other_orientation && options.prefer_horizontal < 1.0 {
                    rotated = !rotated;
                    tried_other_orientation = true;
                } else {
                    size -= options.font_step;
                    rotated = false;
                }
            };

            let Some((point, sprite)) = found else {
                debug!(word = word.as_str(), "no room left for word, skipping");
                continue;
            };

            let (x, y) = (point.x + options.margin / 2, point.y + options.margin / 2);
            occupancy.mark(&sprite.coverage, x, y);

            placed.push((
                PlacedWord {
                    text: word.clone(),
                    count: *count,
                    font_size: size,
                    x,
                    y,
                    width: sprite.width(),
                    height: sprite.height(),
                    rotated,
                    index,
                },
                sprite,
            ));
            font_size = size;
            last_freq = freq;
        }

        placed
    }

    /// Cheap check on the glyph box before rasterizing anything.
    fn fits_canvas(
        &self,
        word: &str,
        font: &FontHandle,
        scale: PxScale,
        rotated: bool,
        mask: &Mask,
    ) -> bool {
        let glyphs = text::text_to_glyphs(word, font.font(), scale);
        let (width, height) = if rotated {
            (glyphs.height, glyphs.width)
        } else {
            (glyphs.width, glyphs.height)
        };
        width + self.options.margin <= mask.width() && height + self.options.margin <= mask.height()
    }

    fn paint(
        &self,
        mask: &Mask,
        layout: Vec<(PlacedWord, WordSprite)>,
        rng: &mut WyRand,
    ) -> CloudImage {
        let mut image = RgbaImage::from_pixel(mask.width(), mask.height(), self.background_color);

        if self.options.contour_width > 0 {
            self.draw_contour(&mut image, mask);
        }

        let mut words = Vec::with_capacity(layout.len());
        for (word, sprite) in layout {
            let col = (self.color_func)(&word, rng);
            text::draw_sprite_to_rgba_buffer(&mut image, &sprite, word.x, word.y, col);
            words.push(word);
        }

        CloudImage { image, words }
    }

    /// Outlines the silhouette on its excluded side so it never touches words.
    fn draw_contour(&self, image: &mut RgbaImage, mask: &Mask) {
        let reach = self.options.contour_width.saturating_sub(1) as i64;
        let (width, height) = (mask.width() as i64, mask.height() as i64);

        for (ex, ey) in mask.outer_edge() {
            for dy in -reach..=reach {
                for dx in -reach..=reach {
                    let (x, y) = (ex as i64 + dx, ey as i64 + dy);
                    if x < 0 || y < 0 || x >= width || y >= height {
                        continue;
                    }
                    if !mask.is_fillable(x as u32, y as u32) {
                        image.put_pixel(x as u32, y as u32, self.contour_color);
                    }
                }
            }
        }
    }
}

fn random_color_rgba(_: &PlacedWord, rng: &mut WyRand) -> Rgba<u8> {
    let hue: u16 = rng.generate_range(0..360);

    let col = Hsl::new(hue as f32, 0.8, 0.5);
    let rgb: Srgb = col.into_color();

    let raw: [u8; 3] = rgb.into_format().into_raw();

    Rgba([raw[0], raw[1], raw[2], 255])
}
