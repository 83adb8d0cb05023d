use ab_glyph::{point, Font, FontVec, Glyph, GlyphId, Point, PxScale, ScaleFont};
use image::{imageops, GrayImage, Luma, Pixel, Rgba, RgbaImage};

#[derive(Clone, Debug)]
pub struct GlyphData {
    pub glyphs: Vec<Glyph>,
    pub width: u32,
    pub height: u32,
}

//把文本转换为字体，方便画图
pub fn text_to_glyphs(text: &str, font: &FontVec, scale: PxScale) -> GlyphData {
    let scaled_font = font.as_scaled(scale);

    let mut glyphs: Vec<Glyph> = vec![];
    layout_paragraph(scaled_font, point(0.0, 0.0), text, &mut glyphs);

    let glyphs_height = scaled_font.height().ceil() as u32;
    let glyphs_width = match (glyphs.first(), glyphs.last()) {
        (Some(first), Some(last)) => {
            let max_x = last.position.x + scaled_font.h_advance(last.id);
            (max_x - first.position.x).ceil() as u32
        }
        _ => 0,
    };

    GlyphData {
        glyphs,
        width: glyphs_width,
        height: glyphs_height,
    }
}

/// Coverage bitmap of one word at one size, optionally turned a quarter
/// counter-clockwise.
#[derive(Clone, Debug)]
pub struct WordSprite {
    pub coverage: GrayImage,
}

impl WordSprite {
    pub fn render(text: &str, font: &FontVec, scale: PxScale, rotated: bool) -> Self {
        let glyph_data = text_to_glyphs(text, font, scale);
        let mut coverage = GrayImage::new(glyph_data.width.max(1), glyph_data.height.max(1));
        draw_glyphs_to_gray_buffer(&mut coverage, glyph_data, font, point(0.0, 0.0));

        if rotated {
            coverage = imageops::rotate270(&coverage);
        }

        WordSprite { coverage }
    }

    pub fn width(&self) -> u32 {
        self.coverage.width()
    }

    pub fn height(&self) -> u32 {
        self.coverage.height()
    }

    /// Inked pixels relative to the sprite origin.
    pub fn ink(&self) -> impl Iterator<Item = (u32, u32, u8)> + '_ {
        self.coverage
            .enumerate_pixels()
            .filter(|(_, _, px)| px.0[0] > 0)
            .map(|(x, y, px)| (x, y, px.0[0]))
    }
}

pub fn draw_glyphs_to_gray_buffer(
    buffer: &mut GrayImage,
    glyph_data: GlyphData,
    font: &FontVec,
    point: Point,
) {
    for glyph in glyph_data.glyphs {
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();

            outlined.draw(|x, y, v| {
                let final_x = (point.x + bounds.min.x) as i64 + x as i64;
                let final_y = (point.y + bounds.min.y) as i64 + y as i64;
                if final_x < 0
                    || final_y < 0
                    || final_x >= buffer.width() as i64
                    || final_y >= buffer.height() as i64
                {
                    return;
                }

                let px = buffer.get_pixel_mut(final_x as u32, final_y as u32);
                let value = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
                *px = Luma([px.0[0].max(value)]);
            })
        }
    }
}

pub fn draw_sprite_to_rgba_buffer(
    buffer: &mut RgbaImage,
    sprite: &WordSprite,
    x: u32,
    y: u32,
    pixel: Rgba<u8>,
) {
    for (dx, dy, coverage) in sprite.ink() {
        let (final_x, final_y) = (x + dx, y + dy);
        if final_x >= buffer.width() || final_y >= buffer.height() {
            continue;
        }

        let v = coverage as f32 / 255.0;
        let px = buffer.get_pixel_mut(final_x, final_y);
        px.apply2(&pixel, |old, new| {
            ((v * new as f32) + (1.0 - v) * old as f32).round() as u8
        });
        px.0[3] = 0xFF;
    }
}

pub fn layout_paragraph<F, SF>(font: SF, position: Point, text: &str, target: &mut Vec<Glyph>)
where
    F: Font,
    SF: ScaleFont<F>,
{
    let v_advance = font.height() + font.line_gap();
    let mut caret = position + point(0.0, font.ascent());
    let mut last_glyph: Option<GlyphId> = None;
    for c in text.chars() {
        if c.is_control() {
            if c == '\n' {
                //进行换行
                caret = point(position.x, caret.y + v_advance);
            }
            continue;
        }

        let mut glyph = font.scaled_glyph(c);
        if let Some(previous) = last_glyph.take() {
            caret.x += font.kern(previous, glyph.id);
        }
        glyph.position = caret;
        last_glyph = Some(glyph.id);
        caret.x += font.h_advance(glyph.id);

        target.push(glyph);
    }
}
