use std::f64::consts::{FRAC_PI_2, TAU};

use tiny_skia::{
    BlendMode, Color, FillRule, FilterQuality, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint,
    Rect, Shader, Stroke, Transform,
};

use super::Analyzer;
use crate::labels::{self, DbScale, DbScaleImage};
use crate::layout::LINE_MODE;
use crate::leds::LedLayout;
use crate::text::Align;

/// Polar mapping for the radial layout: X wraps around the circle, Y grows
/// outward from `radius`.
#[derive(Clone, Copy)]
struct Polar {
    center_x: f64,
    center_y: f64,
    radius: f64,
    width: f64,
    spin: f64,
}

impl Polar {
    fn point(&self, x: f64, y: f64) -> (f32, f32) {
        let height = self.radius + y;
        let angle = TAU * (x / self.width) + self.spin;
        (
            (self.center_x + height * angle.cos()) as f32,
            (self.center_y + height * angle.sin()) as f32,
        )
    }

    fn push_poly(&self, pb: &mut PathBuilder, x: f64, y: f64, w: f64, h: f64) {
        let (x0, y0) = self.point(x, y);
        let (x1, y1) = self.point(x, y + h);
        let (x2, y2) = self.point(x + w, y + h);
        let (x3, y3) = self.point(x + w, y);
        pb.move_to(x0, y0);
        pb.line_to(x1, y1);
        pb.line_to(x2, y2);
        pb.line_to(x3, y3);
        pb.close();
    }
}

/// Replay a polyline into `pb`.
fn trace(pb: &mut PathBuilder, points: &[(f32, f32)], close: bool) {
    if let Some((&(x, y), rest)) = points.split_first() {
        pb.move_to(x, y);
        for &(x, y) in rest {
            pb.line_to(x, y);
        }
        if close {
            pb.close();
        }
    }
}

fn fill_rect(canvas: &mut Pixmap, x: f64, y: f64, w: f64, h: f64, paint: &Paint) {
    let (y, h) = if h < 0.0 { (y + h, -h) } else { (y, h) };
    if w <= 0.0 || h <= 0.0 {
        return;
    }
    if let Some(rect) = Rect::from_xywh(x as f32, y as f32, w as f32, h as f32) {
        canvas.fill_rect(rect, paint, Transform::identity(), None);
    }
}

fn paint_with(shader: Shader<'_>) -> Paint<'_> {
    Paint {
        shader,
        anti_alias: true,
        ..Paint::default()
    }
}

/// Paint `count` segments of one LED column, starting at `from_y` and
/// stacking upward (`dir` = -1) or downward (`dir` = 1).
#[allow(clippy::too_many_arguments)]
fn fill_leds(
    canvas: &mut Pixmap,
    leds: &LedLayout,
    x: f64,
    width: f64,
    from_y: f64,
    dir: f64,
    count: usize,
    paint: &Paint,
) {
    for k in 0..count {
        let edge = from_y + dir * k as f64 * leds.step();
        let top = if dir < 0.0 { edge - leds.height } else { edge };
        fill_rect(canvas, x, top, width, leds.height, paint);
    }
}

/// Multiply the color channels of a premultiplied buffer, keeping them
/// within alpha.
fn brighten(pixmap: &mut Pixmap, factor: f64) {
    let factor = factor.max(0.0) as f32;
    for px in pixmap.data_mut().chunks_exact_mut(4) {
        let alpha = px[3] as f32;
        for c in &mut px[..3] {
            *c = (*c as f32 * factor).round().min(alpha) as u8;
        }
    }
}

impl Analyzer {
    /// Paint one frame into the canvas.
    pub fn render_frame(&mut self, timestamp: f64) {
        let canvas_width = self.canvas.width() as f64;
        let canvas_height = self.canvas.height() as f64;
        let internals = self.internals;
        let is_octave_bands = internals.is_octave_bands;
        let is_led_display = internals.is_led_display;
        let is_lumi_bars = internals.is_lumi_bars;
        let channel_height = internals.channel_height as f64;
        let mode = self.options.mode;
        let radial = self.options.radial;
        let stereo = self.options.stereo;
        let overlay = self.options.overlay;
        let show_bg_color = self.options.show_bg_color;
        let reflex_ratio = self.options.reflex_ratio;
        let analyzer_height = (channel_height
            * if is_lumi_bars || radial { 1.0 } else { 1.0 - reflex_ratio })
            .trunc();

        let polar_radius = internals.analyzer_radius;
        let center_x = (self.canvas.width() >> 1) as f64;
        let center_y = (self.canvas.height() >> 1) as f64;

        if self.energy.instant > 0.0 {
            self.spin_angle += self.options.spin_speed * TAU / 3600.0;
        }
        let polar = Polar {
            center_x,
            center_y,
            radius: polar_radius,
            width: canvas_width,
            spin: self.spin_angle,
        };

        if overlay {
            self.canvas.fill(Color::TRANSPARENT);
        }

        let bg_color = match self.gradients.get(&self.options.gradient) {
            Some(gradient) if show_bg_color && !(is_led_display && !overlay) => gradient.bg_color,
            _ => Color::BLACK,
        };

        let leds = if is_led_display { self.leds } else { None };
        let mut width = self.bar_width
            - if is_octave_bands {
                let led_space = leds.map_or(0.0, |l| l.space_h);
                led_space.max(internals.bar_space_px)
            } else {
                0.0
            };
        if self.options.bar_space == 0.0 && !is_led_display {
            width = width.trunc();
        }

        let unlit_color = Color::from_rgba8(0x7f, 0x7f, 0x7f, 0x22);
        let mut energy = 0.0;
        let bar_count = self.bars.len();
        let channels = if stereo { 2 } else { 1 };

        for channel in 0..channels {
            let channel_top = channel_height * channel as f64;
            let channel_bottom = channel_height * (1 << channel) as f64;
            let analyzer_bottom = channel_top + analyzer_height;

            if !overlay || show_bg_color {
                let mut color = bg_color;
                if overlay {
                    color.apply_opacity(self.options.bg_alpha.clamp(0.0, 1.0) as f32);
                }
                if !radial || channel == 0 {
                    let height = if overlay && self.options.reflex_alpha == 1.0 {
                        analyzer_height
                    } else {
                        channel_height
                    };
                    let mut paint = Paint::default();
                    paint.set_color(color);
                    fill_rect(&mut self.canvas, 0.0, channel_top, canvas_width, height, &paint);
                }
            }

            if self.options.show_scale_y && !is_lumi_bars && !radial {
                let scale = DbScale {
                    channel_top: channel_top as f32,
                    analyzer_height: analyzer_height as f32,
                    scale_width: self.strip_height as f32,
                    min_decibels: self.options.min_decibels,
                    max_decibels: self.options.max_decibels,
                };
                let width = self.canvas.width();
                let cached = &mut self.db_scales[channel];
                if !cached.as_ref().is_some_and(|image| image.matches(width, &scale)) {
                    *cached = DbScaleImage::render(&self.text, width, &scale)
                        .map_err(|e| log::warn!("decibel scale not drawn: {e}"))
                        .ok();
                }
                if let Some(image) = cached {
                    image.draw(&mut self.canvas);
                }
            }

            self.sources[channel].byte_frequency_data(&mut self.data);

            let gradient_paint = paint_with(
                self.gradients
                    .pattern(1.0)
                    .unwrap_or(Shader::SolidColor(Color::WHITE)),
            );
            let mut unlit_paint = Paint::default();
            unlit_paint.set_color(unlit_color);

            let mut pb = self.path_scratch.take().unwrap_or_else(PathBuilder::new);
            let mut points = std::mem::take(&mut self.line_points);
            points.clear();
            if mode == LINE_MODE && !radial {
                points.push((-self.options.line_width as f32, analyzer_bottom as f32));
            }

            for i in 0..bar_count {
                let bar = &self.bars[i];
                let mut bar_height = bar.magnitude(&self.data) / 255.0;
                energy += bar_height;

                let lumi_alpha = bar_height;

                let mut lit = 0;
                bar_height = match leds {
                    Some(leds) => {
                        lit = leds.lit(bar_height);
                        leds.lit_height(lit)
                    }
                    None => {
                        let full = if radial { center_y - polar_radius } else { analyzer_height };
                        (bar_height * full).trunc()
                    }
                };

                let bar_pos_x = bar.pos_x;
                let prev_pos_x = if i > 0 { Some(self.bars[i - 1].pos_x) } else { None };
                self.bars[i].peaks[channel].observe(bar_height);

                if radial && channel == 1 {
                    bar_height = -bar_height;
                }

                let mut pos_x = bar_pos_x;
                let mut adj_width = width;

                if mode == LINE_MODE {
                    if !radial {
                        points.push((bar_pos_x as f32, (analyzer_bottom - bar_height) as f32));
                    } else if bar_pos_x >= 0.0 {
                        points.push(polar.point(bar_pos_x, bar_height));
                    }
                } else {
                    if mode > 0 {
                        if let Some(leds) = leds {
                            pos_x += (leds.space_h / 2.0).max(internals.bar_space_px / 2.0);
                        } else if self.options.bar_space == 0.0 {
                            pos_x = pos_x.trunc();
                            if prev_pos_x.is_some_and(|prev| pos_x > prev + width) {
                                pos_x -= 1.0;
                                adj_width += 1.0;
                            }
                        } else {
                            pos_x += internals.bar_space_px / 2.0;
                        }
                    }

                    if let Some(leds) = leds {
                        if show_bg_color && !overlay {
                            fill_leds(&mut self.canvas, &leds, pos_x, width, channel_top, 1.0, leds.count, &unlit_paint);
                        }
                        if is_lumi_bars {
                            let paint = paint_with(
                                self.gradients
                                    .pattern(lumi_alpha as f32)
                                    .unwrap_or(Shader::SolidColor(Color::WHITE)),
                            );
                            let count = ((channel_bottom - channel_top) / leds.step()).ceil() as usize;
                            fill_leds(&mut self.canvas, &leds, pos_x, width, channel_top, 1.0, count, &paint);
                        } else {
                            fill_leds(&mut self.canvas, &leds, pos_x, width, analyzer_bottom, -1.0, lit, &gradient_paint);
                        }
                    } else if !radial {
                        if is_lumi_bars {
                            let paint = paint_with(
                                self.gradients
                                    .pattern(lumi_alpha as f32)
                                    .unwrap_or(Shader::SolidColor(Color::WHITE)),
                            );
                            fill_rect(&mut self.canvas, pos_x, channel_top, adj_width, channel_bottom - channel_top, &paint);
                        } else {
                            fill_rect(&mut self.canvas, pos_x, analyzer_bottom, adj_width, -bar_height, &gradient_paint);
                        }
                    } else if bar_pos_x >= 0.0 {
                        polar.push_poly(&mut pb, pos_x, 0.0, adj_width, bar_height);
                    }
                }

                let peak = self.bars[i].peaks[channel];
                if peak.is_visible() {
                    if self.options.show_peaks && !is_lumi_bars {
                        if let Some(leds) = leds {
                            let full_leds = (peak.value / (analyzer_height + leds.space_v) * leds.count as f64).trunc();
                            let pos_y = (leds.count as f64 - full_leds - 1.0) * leds.step();
                            fill_rect(&mut self.canvas, pos_x, channel_top + pos_y, width, leds.height, &gradient_paint);
                        } else if !radial {
                            fill_rect(&mut self.canvas, pos_x, analyzer_bottom - peak.value, adj_width, 2.0, &gradient_paint);
                        } else if mode != LINE_MODE && bar_pos_x >= 0.0 {
                            let y = if channel == 1 { -peak.value } else { peak.value };
                            polar.push_poly(&mut pb, pos_x, y, adj_width, -2.0);
                        }
                    }
                    self.bars[i].peaks[channel].advance();
                }
            }

            if mode == LINE_MODE {
                if !radial {
                    let end_x = canvas_width + self.options.line_width;
                    points.push((end_x as f32, analyzer_bottom as f32));
                }
                trace(&mut pb, &points, radial);

                let fill_alpha = self.options.fill_alpha;
                if let Some(path) = pb.finish() {
                    if self.options.line_width > 0.0 {
                        let stroke = Stroke {
                            width: self.options.line_width as f32,
                            line_join: LineJoin::Bevel,
                            ..Stroke::default()
                        };
                        self.canvas.stroke_path(&path, &gradient_paint, &stroke, Transform::identity(), None);
                    }
                    self.path_scratch = Some(path.clear());
                }
                if fill_alpha > 0.0 {
                    let mut fill = self.fill_scratch.take().unwrap_or_else(PathBuilder::new);
                    trace(&mut fill, &points, radial);
                    let rule = if radial {
                        // leave the center circle empty
                        fill.push_circle(center_x as f32, center_y as f32, polar_radius as f32);
                        FillRule::EvenOdd
                    } else {
                        FillRule::Winding
                    };
                    if let Some(path) = fill.finish() {
                        let paint = paint_with(
                            self.gradients
                                .pattern(fill_alpha.min(1.0) as f32)
                                .unwrap_or(Shader::SolidColor(Color::WHITE)),
                        );
                        self.canvas.fill_path(&path, &paint, rule, Transform::identity(), None);
                        self.fill_scratch = Some(path.clear());
                    }
                }
            } else if radial {
                if let Some(path) = pb.finish() {
                    self.canvas.fill_path(&path, &gradient_paint, FillRule::Winding, Transform::identity(), None);
                    self.path_scratch = Some(path.clear());
                }
            } else {
                self.path_scratch = Some(pb);
            }
            self.line_points = points;

            if reflex_ratio > 0.0 && !is_lumi_bars {
                let (pos_y, height) = if self.options.reflex_fit || stereo {
                    let pos_y = if stereo { channel_height * (1 - channel) as f64 } else { 0.0 };
                    (pos_y, channel_height - analyzer_height)
                } else {
                    (canvas_height - analyzer_height * 2.0, analyzer_height)
                };
                self.draw_reflection(channel_top, analyzer_height, pos_y, height);
            }
        }

        self.energy.update(if bar_count > 0 {
            energy / (bar_count * channels) as f64
        } else {
            0.0
        });

        if self.options.show_scale {
            if let Some(scales) = &self.scales {
                if radial {
                    if let Some(ring) = &scales.circular {
                        let rotation = (self.options.spin_speed != 0.0)
                            .then(|| (self.spin_angle + FRAC_PI_2) as f32);
                        labels::draw_ring(&mut self.canvas, ring, center_x as f32, center_y as f32, rotation);
                    }
                } else {
                    labels::draw_strip(&mut self.canvas, &scales.strip);
                }
            }
        }

        // frame rate is only recomputed once per elapsed second
        self.frame += 1;
        let start = *self.time.get_or_insert(timestamp);
        let elapsed = timestamp - start;
        if elapsed >= 1000.0 {
            self.set_fps(self.frame as f64 / (elapsed / 1000.0));
            self.frame = 0;
            self.time = Some(timestamp);
        }
        if self.options.show_fps {
            let size = (20.0 * self.pixel_ratio) as f32;
            let x = canvas_width as f32 - size;
            self.text.draw(&mut self.canvas, &self.fps_label, size, x, size * 2.0, Align::Right, Color::from_rgba8(0, 255, 0, 255));
        }

        if let Some(mut callback) = self.on_canvas_draw.take() {
            callback(self);
            if self.on_canvas_draw.is_none() {
                self.on_canvas_draw = Some(callback);
            }
        }
    }

    /// Copy the analyzer area of one channel, flip it vertically and blend
    /// it into `height` pixels whose bottom edge sits `pos_y` pixels above
    /// the canvas bottom.
    fn draw_reflection(&mut self, channel_top: f64, analyzer_height: f64, pos_y: f64, height: f64) {
        let width = self.canvas.width();
        let rows = analyzer_height as u32;
        if rows == 0 || height <= 0.0 {
            return;
        }

        let mut buffer = match self.reflex_buffer.take() {
            Some(buffer) if buffer.width() == width && buffer.height() == rows => buffer,
            _ => match Pixmap::new(width, rows) {
                Some(buffer) => buffer,
                None => return,
            },
        };

        let stride = width as usize * 4;
        let start = channel_top as usize * stride;
        let end = start + rows as usize * stride;
        let Some(source) = self.canvas.data().get(start..end) else {
            self.reflex_buffer = Some(buffer);
            return;
        };
        buffer.data_mut().copy_from_slice(source);

        if self.options.reflex_bright != 1.0 {
            brighten(&mut buffer, self.options.reflex_bright);
        }

        let scale = (height / analyzer_height) as f32;
        let canvas_height = self.canvas.height() as f32;
        let transform = Transform::from_row(1.0, 0.0, 0.0, -scale, 0.0, canvas_height - pos_y as f32);
        let paint = PixmapPaint {
            opacity: self.options.reflex_alpha.clamp(0.0, 1.0) as f32,
            blend_mode: BlendMode::SourceOver,
            quality: FilterQuality::Bilinear,
        };
        self.canvas.draw_pixmap(0, 0, buffer.as_ref(), &paint, transform, None);
        self.reflex_buffer = Some(buffer);
    }
}
