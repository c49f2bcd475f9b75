use fontdue::{Font, FontSettings};
use tiny_skia::{Color, Pixmap, PremultipliedColorU8};

use crate::error::{EngineError, Result};

const FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Rasterizes scale labels and the FPS counter straight into a pixmap.
pub struct TextRenderer {
    font: Font,
}

impl TextRenderer {
    pub fn new() -> Result<Self> {
        let font = Font::from_bytes(FONT_DATA, FontSettings::default())
            .map_err(|e| EngineError::Font(e.to_string()))?;
        Ok(Self { font })
    }

    /// Measure the advance width of `text` in pixels.
    pub fn measure_width(&self, text: &str, size: f32) -> f32 {
        text.chars()
            .map(|ch| self.font.metrics(ch, size).advance_width)
            .sum()
    }

    /// Composite `text` with its baseline at `baseline_y`.
    ///
    /// `x` is the left edge, the center or the right edge of the text,
    /// depending on `align`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &self,
        pixmap: &mut Pixmap,
        text: &str,
        size: f32,
        x: f32,
        baseline_y: f32,
        align: Align,
        color: Color,
    ) {
        if size < 1.0 {
            return;
        }
        let start = match align {
            Align::Left => x,
            Align::Center => x - self.measure_width(text, size) / 2.0,
            Align::Right => x - self.measure_width(text, size),
        };

        let width = pixmap.width() as i32;
        let height = pixmap.height() as i32;
        let pixels = pixmap.pixels_mut();

        let mut cursor_x = start;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, size);
            let glyph_x = (cursor_x + metrics.xmin as f32).round() as i32;
            let glyph_y = baseline_y.round() as i32 - metrics.height as i32 - metrics.ymin;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let coverage = bitmap[gy * metrics.width + gx];
                    if coverage == 0 {
                        continue;
                    }

                    let px = glyph_x + gx as i32;
                    let py = glyph_y + gy as i32;
                    if px < 0 || py < 0 || px >= width || py >= height {
                        continue;
                    }

                    let idx = (py * width + px) as usize;
                    let a = coverage as f32 / 255.0 * color.alpha();
                    pixels[idx] = blend(pixels[idx], color, a);
                }
            }

            cursor_x += metrics.advance_width;
        }
    }

    /// Render `text` into its own tightly sized pixmap, for labels that get
    /// rotated before being composited. Returns the pixmap and the baseline
    /// offset from its top edge.
    pub fn render_label(&self, text: &str, size: f32, color: Color) -> Option<(Pixmap, f32)> {
        let line = self.font.horizontal_line_metrics(size)?;
        let width = self.measure_width(text, size).ceil().max(1.0) as u32;
        let height = (line.ascent - line.descent).ceil().max(1.0) as u32;
        let mut pixmap = Pixmap::new(width, height)?;
        self.draw(&mut pixmap, text, size, 0.0, line.ascent, Align::Left, color);
        Some((pixmap, line.ascent))
    }
}

/// Source-over of a straight-alpha color with opacity `a` onto a
/// premultiplied pixel.
fn blend(dst: PremultipliedColorU8, color: Color, a: f32) -> PremultipliedColorU8 {
    let inv_a = 1.0 - a;
    let channel = |src: f32, dst: u8| src * a * 255.0 + dst as f32 * inv_a;
    let alpha = (a * 255.0 + dst.alpha() as f32 * inv_a).round().clamp(0.0, 255.0) as u8;
    let clamp = |v: f32| (v.round().clamp(0.0, 255.0) as u8).min(alpha);

    PremultipliedColorU8::from_rgba(
        clamp(channel(color.red(), dst.red())),
        clamp(channel(color.green(), dst.green())),
        clamp(channel(color.blue(), dst.blue())),
        alpha,
    )
    .unwrap_or(dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wider_text_measures_wider() {
        let text = TextRenderer::new().unwrap();
        let one = text.measure_width("1", 12.0);
        let four = text.measure_width("16k", 12.0);
        assert!(one > 0.0);
        assert!(four > one);
        assert!((text.measure_width("16k", 24.0) - 2.0 * four).abs() < 1.0);
    }

    #[test]
    fn draws_inside_the_requested_box() {
        let text = TextRenderer::new().unwrap();
        let mut pixmap = Pixmap::new(80, 40).unwrap();
        text.draw(&mut pixmap, "125", 20.0, 40.0, 30.0, Align::Center, Color::WHITE);

        let lit: Vec<(u32, u32)> = (0..40)
            .flat_map(|y| (0..80).map(move |x| (x, y)))
            .filter(|&(x, y)| pixmap.pixel(x, y).unwrap().alpha() > 0)
            .collect();
        assert!(!lit.is_empty());
        assert!(lit.iter().all(|&(_, y)| y <= 30));
        let min_x = lit.iter().map(|p| p.0).min().unwrap();
        let max_x = lit.iter().map(|p| p.0).max().unwrap();
        // roughly centered on x = 40
        assert!((min_x as i32 + max_x as i32 - 80).abs() <= 4);
    }

    #[test]
    fn right_aligned_text_ends_at_anchor() {
        let text = TextRenderer::new().unwrap();
        let mut pixmap = Pixmap::new(100, 40).unwrap();
        text.draw(&mut pixmap, "60", 20.0, 60.0, 30.0, Align::Right, Color::WHITE);
        for y in 0..40 {
            for x in 62..100 {
                assert_eq!(pixmap.pixel(x, y).unwrap().alpha(), 0);
            }
        }
    }

    #[test]
    fn label_pixmap_holds_the_glyphs() {
        let text = TextRenderer::new().unwrap();
        let (label, baseline) = text.render_label("1k", 16.0, Color::WHITE).unwrap();
        assert!(baseline > 0.0 && baseline <= label.height() as f32);
        assert!(label.pixels().iter().any(|p| p.alpha() > 0));
    }
}
