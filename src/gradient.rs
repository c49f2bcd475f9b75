//! Named gradient definitions and their compiled, layout-aware shaders.
//!
//! A definition only lists colors. Where those colors land depends on the
//! canvas: stereo and split layouts fold the stops into two halves, a reserved
//! reflection band shrinks the usable range and radial layouts run from the
//! outer edge inward. Compiled shaders are therefore rebuilt whenever the
//! canvas size or any of those flags change, and the active one is
//! pre-rendered into a canvas-sized fill image that bars are painted from.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tiny_skia::{
    Color, FilterQuality, GradientStop, LinearGradient, Paint, Pattern, Pixmap, Point,
    RadialGradient, Rect, Shader, SpreadMode, Transform,
};

use crate::color::parse_color;
use crate::error::{EngineError, Result};

pub const DEFAULT_BG_COLOR: &str = "#111";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Vertical,
    Horizontal,
}

/// A color stop as written by the user: a bare color or `{ pos, color }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorStopOptions {
    Color(String),
    Positioned {
        #[serde(default, alias = "offset")]
        pos: Option<f32>,
        color: String,
    },
}

/// User-facing gradient registration payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradientOptions {
    #[serde(default)]
    pub bg_color: Option<String>,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub color_stops: Vec<ColorStopOptions>,
}

impl GradientOptions {
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(EngineError::GradientNotAnObject);
        }
        serde_json::from_value(value.clone())
            .map_err(|e| EngineError::InvalidGradientOptions(e.to_string()))
    }

    fn stops(colors: &[&str]) -> Vec<ColorStopOptions> {
        colors.iter().map(|c| ColorStopOptions::Color(c.to_string())).collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColorStop {
    /// Even spacing by index when unset.
    pub offset: Option<f32>,
    pub color: Color,
}

/// Everything about the canvas that moves color stops around.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientGeometry {
    pub width: f32,
    pub height: f32,
    pub stereo: bool,
    pub radial: bool,
    /// Effective lumi-bars flag (octave bands, not radial).
    pub lumi_bars: bool,
    pub split_gradient: bool,
    pub reflex_ratio: f32,
    pub analyzer_radius: f32,
}

#[derive(Clone, Debug)]
pub struct Gradient {
    pub bg_color: Color,
    pub direction: Direction,
    pub stops: Vec<ColorStop>,
    shader: Option<Shader<'static>>,
}

impl Gradient {
    pub fn from_options(options: &GradientOptions) -> Result<Self> {
        if options.color_stops.len() < 2 {
            return Err(EngineError::MissingColor);
        }

        let bg_color = parse_color(options.bg_color.as_deref().unwrap_or(DEFAULT_BG_COLOR))?;
        let direction = match options.dir.as_deref() {
            Some("h") | Some("horizontal") => Direction::Horizontal,
            _ => Direction::Vertical,
        };

        let stops = options
            .color_stops
            .iter()
            .map(|stop| match stop {
                ColorStopOptions::Color(color) => Ok(ColorStop {
                    offset: None,
                    color: parse_color(color)?,
                }),
                ColorStopOptions::Positioned { pos, color } => Ok(ColorStop {
                    offset: pos.map(|p| p.clamp(0.0, 1.0)),
                    color: parse_color(color)?,
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            bg_color,
            direction,
            stops,
            shader: None,
        })
    }

    pub fn shader(&self) -> Option<&Shader<'static>> {
        self.shader.as_ref()
    }

    fn nominal_offset(&self, index: usize) -> f32 {
        let max_index = (self.stops.len() - 1).max(1) as f32;
        self.stops[index].offset.unwrap_or(index as f32 / max_index)
    }

    /// Color stops in insertion order, remapped for the given canvas geometry.
    ///
    /// Offsets run along the gradient's own axis: top to analyzer bottom for
    /// vertical gradients, outer edge to inner radius for radial ones.
    pub fn stop_offsets(&self, geometry: &GradientGeometry) -> Vec<(f32, Color)> {
        let last = self.stops.len() - 1;
        let is_split =
            self.direction != Direction::Horizontal && geometry.stereo && geometry.split_gradient;
        let ratio = 1.0 - geometry.reflex_ratio;

        let mut out = Vec::with_capacity(self.stops.len() * 2 + 2);
        for channel in 0..=(is_split as usize) {
            for index in 0..=last {
                let mut color = self.stops[index].color;
                let mut offset = self.nominal_offset(index);

                if is_split {
                    offset /= 2.0;
                }

                // keep colors out of the reflection bands
                if geometry.stereo && !geometry.lumi_bars && !geometry.radial {
                    offset *= ratio;
                    if !is_split && offset > 0.5 * ratio {
                        offset += 0.5 * geometry.reflex_ratio;
                    }
                }

                if channel == 1 {
                    if geometry.radial {
                        // inner channel grows toward the center
                        let rev = last - index;
                        color = self.stops[rev].color;
                        offset = 1.0 - self.nominal_offset(rev) / 2.0;
                    } else {
                        if index == 0 && offset > 0.0 {
                            out.push((0.5, color));
                        }
                        offset += 0.5;
                    }
                }

                out.push((offset, color));

                // hard stop at the channel boundary
                if geometry.stereo && index == last && offset < 0.5 {
                    out.push((0.5, color));
                }
            }
        }
        out
    }

    fn build_shader(&self, geometry: &GradientGeometry) -> Shader<'static> {
        let mut offsets = self.stop_offsets(geometry);
        // stable: stops sharing an offset keep their order
        offsets.sort_by(|a, b| a.0.total_cmp(&b.0));

        let fallback = Shader::SolidColor(self.stops[0].color);
        let to_stops = |offsets: &[(f32, Color)]| -> Vec<GradientStop> {
            offsets
                .iter()
                .map(|&(offset, color)| GradientStop::new(offset.clamp(0.0, 1.0), color))
                .collect()
        };

        let shader = if geometry.radial {
            let cx = (geometry.width / 2.0).floor();
            let cy = (geometry.height / 2.0).floor();
            let r0 = cy;
            let r1 = geometry.analyzer_radius
                - if geometry.stereo { cy - geometry.analyzer_radius } else { 0.0 };
            let r_max = r0.max(r1).max(1.0);

            // re-express "offset between r0 and r1" as "distance from center / r_max"
            for stop in offsets.iter_mut() {
                stop.0 = (r0 + stop.0 * (r1 - r0)) / r_max;
            }
            if r1 < r0 {
                offsets.reverse();
            }
            let center = Point::from_xy(cx, cy);
            RadialGradient::new(
                center,
                center,
                r_max,
                to_stops(&offsets),
                SpreadMode::Pad,
                Transform::identity(),
            )
        } else if self.direction == Direction::Horizontal {
            LinearGradient::new(
                Point::from_xy(0.0, 0.0),
                Point::from_xy(geometry.width, 0.0),
                to_stops(&offsets),
                SpreadMode::Pad,
                Transform::identity(),
            )
        } else {
            // stereo keeps the full height; the reflex bands are handled in the offsets
            let analyzer_height = if geometry.lumi_bars {
                geometry.height
            } else {
                let reserved = if geometry.stereo { 0.0 } else { geometry.reflex_ratio };
                (geometry.height * (1.0 - reserved)).trunc()
            };
            LinearGradient::new(
                Point::from_xy(0.0, 0.0),
                Point::from_xy(0.0, analyzer_height),
                to_stops(&offsets),
                SpreadMode::Pad,
                Transform::identity(),
            )
        };

        shader.unwrap_or(fallback)
    }
}

struct GradientFill {
    name: String,
    pixmap: Pixmap,
}

/// All registered gradients plus the pre-rendered fill of the active one.
pub struct GradientTable {
    entries: HashMap<String, Gradient>,
    geometry: Option<GradientGeometry>,
    fill: Option<GradientFill>,
}

impl GradientTable {
    /// Table holding the stock `classic`, `prism` and `rainbow` gradients.
    pub fn with_builtins() -> Result<Self> {
        let mut entries = HashMap::new();
        for (name, options) in builtin_gradients() {
            entries.insert(name.to_string(), Gradient::from_options(&options)?);
        }
        Ok(Self {
            entries,
            geometry: None,
            fill: None,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Gradient> {
        self.entries.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate and add (or replace) a gradient. Nothing changes on error.
    pub fn register(&mut self, name: &str, options: &GradientOptions) -> Result<()> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidGradientName);
        }
        let mut gradient = Gradient::from_options(options)?;
        if let Some(geometry) = self.geometry {
            gradient.shader = Some(gradient.build_shader(&geometry));
        }
        if self.fill.as_ref().is_some_and(|fill| fill.name == name) {
            self.fill = None;
        }
        self.entries.insert(name.to_string(), gradient);
        Ok(())
    }

    pub fn geometry(&self) -> Option<GradientGeometry> {
        self.geometry
    }

    /// Rebuild every shader for a new canvas geometry.
    pub fn compile(&mut self, geometry: GradientGeometry) {
        for gradient in self.entries.values_mut() {
            gradient.shader = Some(gradient.build_shader(&geometry));
        }
        self.geometry = Some(geometry);
        self.fill = None;
        log::debug!(
            "compiled {} gradients for {}x{} (stereo={}, radial={}, reflex={})",
            self.entries.len(),
            geometry.width,
            geometry.height,
            geometry.stereo,
            geometry.radial,
            geometry.reflex_ratio
        );
    }

    /// Make sure the fill image for `name` exists at the current geometry.
    pub fn prepare_fill(&mut self, name: &str) -> Result<()> {
        if self.fill.as_ref().is_some_and(|fill| fill.name == name) {
            return Ok(());
        }
        let Some(geometry) = self.geometry else {
            return Ok(());
        };
        let gradient = self
            .entries
            .get(name)
            .ok_or_else(|| EngineError::UnknownGradient(name.to_string()))?;

        let (width, height) = (geometry.width.max(1.0) as u32, geometry.height.max(1.0) as u32);
        let mut pixmap = Pixmap::new(width, height).ok_or(EngineError::Pixmap { width, height })?;
        let shader = match gradient.shader.clone() {
            Some(shader) => shader,
            None => gradient.build_shader(&geometry),
        };
        let paint = Paint {
            shader,
            anti_alias: false,
            ..Paint::default()
        };
        if let Some(rect) = Rect::from_xywh(0.0, 0.0, width as f32, height as f32) {
            pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        }
        self.fill = Some(GradientFill {
            name: name.to_string(),
            pixmap,
        });
        Ok(())
    }

    pub fn fill(&self) -> Option<&Pixmap> {
        self.fill.as_ref().map(|fill| &fill.pixmap)
    }

    /// Shader that paints with the active gradient at the given opacity.
    pub fn pattern(&self, opacity: f32) -> Option<Shader<'_>> {
        self.fill().map(|pixmap| {
            Pattern::new(
                pixmap.as_ref(),
                SpreadMode::Pad,
                FilterQuality::Nearest,
                opacity.clamp(0.0, 1.0),
                Transform::identity(),
            )
        })
    }
}

fn builtin_gradients() -> Vec<(&'static str, GradientOptions)> {
    vec![
        (
            "classic",
            GradientOptions {
                bg_color: Some(DEFAULT_BG_COLOR.into()),
                dir: None,
                color_stops: vec![
                    ColorStopOptions::Color("hsl( 0, 100%, 50% )".into()),
                    ColorStopOptions::Positioned {
                        pos: Some(0.6),
                        color: "hsl( 60, 100%, 50% )".into(),
                    },
                    ColorStopOptions::Color("hsl( 120, 100%, 50% )".into()),
                ],
            },
        ),
        (
            "prism",
            GradientOptions {
                bg_color: Some(DEFAULT_BG_COLOR.into()),
                dir: None,
                color_stops: GradientOptions::stops(&[
                    "hsl( 0, 100%, 50% )",
                    "hsl( 60, 100%, 50% )",
                    "hsl( 120, 100%, 50% )",
                    "hsl( 180, 100%, 50% )",
                    "hsl( 240, 100%, 50% )",
                ]),
            },
        ),
        (
            "rainbow",
            GradientOptions {
                bg_color: Some(DEFAULT_BG_COLOR.into()),
                dir: Some("h".into()),
                color_stops: GradientOptions::stops(&[
                    "hsl( 0, 100%, 50% )",
                    "hsl( 60, 100%, 50% )",
                    "hsl( 120, 100%, 50% )",
                    "hsl( 180, 100%, 47% )",
                    "hsl( 240, 100%, 58% )",
                    "hsl( 300, 100%, 50% )",
                    "hsl( 360, 100%, 50% )",
                ]),
            },
        ),
    ]
}
