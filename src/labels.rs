//! Pre-rendered frequency scales and decibel grid.
//!
//! The frequency strip and the circular scale only change with the canvas
//! size or the frequency window, and the decibel grid only with the channel
//! height or the decibel range, so each is rasterized once into its own
//! pixmap and blitted every frame.

use std::f32::consts::{FRAC_PI_2, TAU};

use tiny_skia::{
    Color, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, StrokeDash, Transform,
};

use crate::color::parse_color;
use crate::error::{EngineError, Result};
use crate::freq::LogAxis;
use crate::text::{Align, TextRenderer};

/// Octave centers labelled on the X axis.
pub const FREQ_LABELS: [f64; 11] = [
    16.0, 31.0, 63.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

const SCALE_BG: &str = "#000c";

pub fn label_text(freq: f64) -> String {
    if freq >= 1000.0 {
        format!("{}k", freq / 1000.0)
    } else {
        format!("{freq}")
    }
}

/// Height of the frequency strip for a canvas height and pixel ratio.
pub fn strip_height(canvas_height: u32, pixel_ratio: f64) -> u32 {
    (20.0 * pixel_ratio).max((canvas_height / 27) as f64) as u32
}

/// Thickness of the circular scale ring. In stereo the ring sits between the
/// two channels, so its image grows by one thickness.
pub fn ring_thickness(canvas_height: u32) -> u32 {
    (canvas_height as f64 * 0.03) as u32
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleParams {
    pub width: u32,
    pub height: u32,
    pub strip_height: u32,
    pub analyzer_radius: u32,
    pub stereo: bool,
}

pub struct ScaleImages {
    pub strip: Pixmap,
    /// `None` when the canvas is too small for a ring.
    pub circular: Option<Pixmap>,
}

pub fn render_scales(text: &TextRenderer, axis: &LogAxis, params: &ScaleParams) -> Result<ScaleImages> {
    let background = parse_color(SCALE_BG)?;
    let strip = render_strip(text, axis, params, background)?;
    let circular = render_ring(text, axis, params, background);
    Ok(ScaleImages { strip, circular })
}

fn render_strip(
    text: &TextRenderer,
    axis: &LogAxis,
    params: &ScaleParams,
    background: Color,
) -> Result<Pixmap> {
    let (width, height) = (params.width.max(1), params.strip_height.max(1));
    let mut strip = Pixmap::new(width, height).ok_or(EngineError::Pixmap { width, height })?;
    strip.fill(background);

    let size = (height >> 1) as f32;
    let baseline = height as f32 * 0.75;
    for freq in FREQ_LABELS {
        let x = axis.x(freq) as f32;
        text.draw(&mut strip, &label_text(freq), size, x, baseline, Align::Center, Color::WHITE);
    }
    Ok(strip)
}

fn render_ring(
    text: &TextRenderer,
    axis: &LogAxis,
    params: &ScaleParams,
    background: Color,
) -> Option<Pixmap> {
    let thickness = ring_thickness(params.height);
    let size = (params.analyzer_radius << 1) + if params.stereo { thickness } else { 0 };
    if thickness == 0 || size == 0 {
        return None;
    }
    let mut ring = Pixmap::new(size, size)?;

    let radius = (size >> 1) as f32;
    let label_radius = radius - thickness as f32 * 0.7;

    let circle = PathBuilder::from_circle(radius, radius, radius - thickness as f32 / 2.0)?;
    let mut paint = Paint::default();
    paint.set_color(background);
    paint.anti_alias = true;
    let stroke = Stroke {
        width: thickness as f32,
        ..Stroke::default()
    };
    ring.stroke_path(&circle, &paint, &stroke, Transform::identity(), None);

    let font_size = (thickness >> 1) as f32;
    let width = params.width as f64;
    for freq in FREQ_LABELS {
        let x = axis.x(freq);
        // wrap-around labels would overlap the low end
        if x <= 0.0 || x >= width {
            continue;
        }
        let Some((label, ascent)) = text.render_label(&label_text(freq), font_size, Color::WHITE)
        else {
            continue;
        };
        let angle = TAU * (x / width) as f32;
        let adjusted = angle - FRAC_PI_2;
        let transform = Transform::from_translate(
            radius + label_radius * adjusted.cos(),
            radius + label_radius * adjusted.sin(),
        )
        .pre_rotate(angle.to_degrees())
        .pre_translate(-(label.width() as f32) / 2.0, -ascent);
        ring.draw_pixmap(0, 0, label.as_ref(), &PixmapPaint::default(), transform, None);
    }
    Some(ring)
}

/// Horizontal decibel grid for one channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DbScale {
    pub channel_top: f32,
    pub analyzer_height: f32,
    /// Width reserved for labels at each edge.
    pub scale_width: f32,
    pub min_decibels: f64,
    pub max_decibels: f64,
}

/// Draw a line every 5 dB from the top; even values are labelled on both
/// edges.
pub fn draw_db_scale(pixmap: &mut Pixmap, text: &TextRenderer, scale: &DbScale) {
    let range = scale.max_decibels - scale.min_decibels;
    if range <= 0.0 {
        return;
    }
    let width = pixmap.width() as f32;
    let font_size = ((scale.scale_width as u32) >> 1) as f32;
    let interval = scale.analyzer_height / range as f32;
    let label_color = Color::from_rgba8(0x88, 0x88, 0x88, 0xff);
    let odd_color = Color::from_rgba8(0x55, 0x55, 0x55, 0xff);

    let mut paint = Paint::default();
    paint.anti_alias = false;
    let even_stroke = Stroke {
        width: 1.0,
        dash: StrokeDash::new(vec![2.0, 4.0], 0.0),
        ..Stroke::default()
    };
    let odd_stroke = Stroke {
        width: 1.0,
        dash: StrokeDash::new(vec![2.0, 8.0], 1.0),
        ..Stroke::default()
    };
    let mut pb = PathBuilder::new();

    let mut db = scale.max_decibels;
    while db > scale.min_decibels {
        let pos_y = scale.channel_top + (scale.max_decibels - db) as f32 * interval;
        let even = db % 2.0 == 0.0;

        let (color, stroke) = if even {
            let nudge = if pos_y == scale.channel_top { 0.8 } else { 0.35 };
            let label_y = pos_y + font_size * nudge;
            let label = format!("{db}");
            text.draw(pixmap, &label, font_size, scale.scale_width * 0.85, label_y, Align::Right, label_color);
            text.draw(pixmap, &label, font_size, width - scale.scale_width * 0.1, label_y, Align::Right, label_color);
            (label_color, &even_stroke)
        } else {
            (odd_color, &odd_stroke)
        };

        let inset = if even { scale.scale_width } else { 0.0 };
        let y = pos_y.trunc() + 0.5;
        pb.move_to(inset, y);
        pb.line_to(width - inset, y);
        match pb.finish() {
            Some(line) => {
                paint.set_color(color);
                pixmap.stroke_path(&line, &paint, stroke, Transform::identity(), None);
                pb = line.clear();
            }
            None => pb = PathBuilder::new(),
        }

        db -= 5.0;
    }
}

/// A decibel grid rendered for one channel, blitted at its channel's top.
pub struct DbScaleImage {
    scale: DbScale,
    width: u32,
    offset_y: i32,
    pub pixmap: Pixmap,
}

impl DbScaleImage {
    /// Rasterize the grid for a canvas `width` pixels wide. Only the
    /// fractional part of the channel top goes into the image so the lines
    /// land on the same rows as when drawn straight onto the canvas.
    pub fn render(text: &TextRenderer, width: u32, scale: &DbScale) -> Result<Self> {
        let offset_y = scale.channel_top.trunc();
        let local = DbScale {
            channel_top: scale.channel_top - offset_y,
            ..*scale
        };
        // room below the last line for its label
        let height = (local.channel_top + scale.analyzer_height + scale.scale_width).ceil().max(1.0) as u32;
        let mut pixmap = Pixmap::new(width, height).ok_or(EngineError::Pixmap { width, height })?;
        draw_db_scale(&mut pixmap, text, &local);
        Ok(Self {
            scale: *scale,
            width,
            offset_y: offset_y as i32,
            pixmap,
        })
    }

    pub fn matches(&self, width: u32, scale: &DbScale) -> bool {
        self.width == width && self.scale == *scale
    }

    pub fn draw(&self, canvas: &mut Pixmap) {
        canvas.draw_pixmap(0, self.offset_y, self.pixmap.as_ref(), &PixmapPaint::default(), Transform::identity(), None);
    }
}

/// Blit the circular scale centered on the canvas, rotated with the spin.
pub fn draw_ring(canvas: &mut Pixmap, ring: &Pixmap, center_x: f32, center_y: f32, rotation: Option<f32>) {
    let half = (ring.width() >> 1) as f32;
    let mut transform = Transform::from_translate(center_x, center_y);
    if let Some(angle) = rotation {
        transform = transform.pre_rotate(angle.to_degrees());
    }
    let transform = transform.pre_translate(-half, -half);
    canvas.draw_pixmap(0, 0, ring.as_ref(), &PixmapPaint::default(), transform, None);
}

/// Blit the frequency strip along the bottom edge.
pub fn draw_strip(canvas: &mut Pixmap, strip: &Pixmap) {
    let y = canvas.height() as i32 - strip.height() as i32;
    canvas.draw_pixmap(0, y, strip.as_ref(), &PixmapPaint::default(), Transform::identity(), None);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alpha_at(pixmap: &Pixmap, x: u32, y: u32) -> u8 {
        pixmap.pixel(x, y).unwrap().alpha()
    }

    #[test]
    fn label_text_uses_k_suffix() {
        assert_eq!(label_text(63.0), "63");
        assert_eq!(label_text(1000.0), "1k");
        assert_eq!(label_text(16000.0), "16k");
    }

    #[test]
    fn strip_height_has_a_floor() {
        assert_eq!(strip_height(270, 1.0), 20);
        assert_eq!(strip_height(1080, 1.0), 40);
        assert_eq!(strip_height(270, 2.0), 40);
    }

    #[test]
    fn strip_is_translucent_black_with_white_labels() {
        let text = TextRenderer::new().unwrap();
        let axis = LogAxis::new(20.0, 22000.0, 640.0).unwrap();
        let params = ScaleParams {
            width: 640,
            height: 270,
            strip_height: 20,
            analyzer_radius: 33,
            stereo: false,
        };
        let scales = render_scales(&text, &axis, &params).unwrap();
        assert_eq!(scales.strip.width(), 640);
        assert_eq!(scales.strip.height(), 20);
        assert_eq!(alpha_at(&scales.strip, 2, 1), 0xcc);

        let label_x = axis.x(1000.0).round() as u32;
        let bright = (0..20)
            .flat_map(|y| (label_x.saturating_sub(6)..label_x + 6).map(move |x| (x, y)))
            .any(|(x, y)| scales.strip.pixel(x, y).unwrap().red() > 0x80);
        assert!(bright);
    }

    #[test]
    fn ring_grows_by_one_thickness_in_stereo() {
        let text = TextRenderer::new().unwrap();
        let axis = LogAxis::new(20.0, 22000.0, 640.0).unwrap();
        let mono = ScaleParams {
            width: 640,
            height: 400,
            strip_height: 20,
            analyzer_radius: 50,
            stereo: false,
        };
        let ring = render_scales(&text, &axis, &mono).unwrap().circular.unwrap();
        assert_eq!(ring.width(), 100);

        let stereo = ScaleParams { analyzer_radius: 150, stereo: true, ..mono };
        let ring = render_scales(&text, &axis, &stereo).unwrap().circular.unwrap();
        assert_eq!(ring.width(), 300 + ring_thickness(400));
        // the ring band is painted, the center is not
        assert!(alpha_at(&ring, ring.width() / 2, 1) > 0);
        assert_eq!(alpha_at(&ring, ring.width() / 2, ring.height() / 2), 0);
    }

    #[test]
    fn tiny_canvas_has_no_ring() {
        let text = TextRenderer::new().unwrap();
        let axis = LogAxis::new(20.0, 22000.0, 10.0).unwrap();
        let params = ScaleParams {
            width: 10,
            height: 20,
            strip_height: 20,
            analyzer_radius: 2,
            stereo: false,
        };
        assert!(render_scales(&text, &axis, &params).unwrap().circular.is_none());
    }

    #[test]
    fn db_grid_draws_dashed_lines() {
        let text = TextRenderer::new().unwrap();
        let mut pixmap = Pixmap::new(200, 120).unwrap();
        draw_db_scale(
            &mut pixmap,
            &text,
            &DbScale {
                channel_top: 0.0,
                analyzer_height: 120.0,
                scale_width: 20.0,
                min_decibels: -85.0,
                max_decibels: -25.0,
            },
        );
        // -30 dB is an even line: 5 dB * 2 px/dB below the top
        let y = 10;
        let lit = (20..180).filter(|&x| alpha_at(&pixmap, x, y) > 0).count();
        assert!(lit > 20 && lit < 160, "{lit} pixels lit");
    }

    #[test]
    fn cached_db_grid_matches_direct_drawing() {
        let text = TextRenderer::new().unwrap();
        let scale = DbScale {
            channel_top: 41.5,
            analyzer_height: 90.0,
            scale_width: 20.0,
            min_decibels: -85.0,
            max_decibels: -25.0,
        };
        let mut direct = Pixmap::new(200, 160).unwrap();
        draw_db_scale(&mut direct, &text, &scale);

        let image = DbScaleImage::render(&text, 200, &scale).unwrap();
        assert!(image.matches(200, &scale));
        assert!(!image.matches(201, &scale));
        assert!(!image.matches(200, &DbScale { max_decibels: -30.0, ..scale }));

        let mut blitted = Pixmap::new(200, 160).unwrap();
        image.draw(&mut blitted);
        for (a, b) in direct.pixels().iter().zip(blitted.pixels()) {
            assert!(a.alpha().abs_diff(b.alpha()) <= 1, "{a:?} vs {b:?}");
        }
        assert!(direct.pixels().iter().any(|p| p.alpha() > 0));
    }
}
