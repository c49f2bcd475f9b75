//! CSS-style color strings used by gradient definitions.

use tiny_skia::Color;

use crate::error::{EngineError, Result};

/// Parse `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()/rgba()`,
/// `hsl()/hsla()` or a basic color keyword.
pub fn parse_color(input: &str) -> Result<Color> {
    let invalid = || EngineError::InvalidColor(input.to_string());
    let s = input.trim().to_ascii_lowercase();

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(invalid);
    }
    if let Some(args) = function_args(&s, "rgba").or_else(|| function_args(&s, "rgb")) {
        return parse_rgb(args).ok_or_else(invalid);
    }
    if let Some(args) = function_args(&s, "hsla").or_else(|| function_args(&s, "hsl")) {
        return parse_hsl(args).ok_or_else(invalid);
    }
    named(&s).ok_or_else(invalid)
}

fn function_args<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    s.strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn split_args(args: &str) -> Vec<&str> {
    args.split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect()
}

fn parse_hex(hex: &str) -> Option<Color> {
    let digit = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
    let pair = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();

    match hex.len() {
        3 | 4 => {
            let a = if hex.len() == 4 { digit(3)? * 17 } else { 255 };
            Some(Color::from_rgba8(digit(0)? * 17, digit(1)? * 17, digit(2)? * 17, a))
        }
        6 | 8 => {
            let a = if hex.len() == 8 { pair(6)? } else { 255 };
            Some(Color::from_rgba8(pair(0)?, pair(2)?, pair(4)?, a))
        }
        _ => None,
    }
}

fn parse_alpha(part: Option<&&str>) -> Option<f32> {
    match part {
        None => Some(1.0),
        Some(p) => match p.strip_suffix('%') {
            Some(pct) => pct.parse::<f32>().ok().map(|v| v / 100.0),
            None => p.parse::<f32>().ok(),
        },
    }
    .map(|a| a.clamp(0.0, 1.0))
}

fn parse_rgb(args: &str) -> Option<Color> {
    let parts = split_args(args);
    if parts.len() < 3 || parts.len() > 4 {
        return None;
    }
    let channel = |p: &str| -> Option<f32> {
        let v = match p.strip_suffix('%') {
            Some(pct) => pct.parse::<f32>().ok()? / 100.0,
            None => p.parse::<f32>().ok()? / 255.0,
        };
        Some(v.clamp(0.0, 1.0))
    };
    Color::from_rgba(
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        parse_alpha(parts.get(3))?,
    )
}

fn parse_hsl(args: &str) -> Option<Color> {
    let parts = split_args(args);
    if parts.len() < 3 || parts.len() > 4 {
        return None;
    }
    let hue = parts[0].trim_end_matches("deg").parse::<f32>().ok()?;
    let pct = |p: &str| -> Option<f32> {
        Some((p.strip_suffix('%')?.parse::<f32>().ok()? / 100.0).clamp(0.0, 1.0))
    };
    let (r, g, b) = hsl_to_rgb(hue, pct(parts[1])?, pct(parts[2])?);
    Color::from_rgba(r, g, b, parse_alpha(parts.get(3))?)
}

/// `h` in degrees, `s` and `l` in 0..=1.
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    let h = h.rem_euclid(360.0) / 360.0;
    if s == 0.0 {
        return (l, l, l);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let channel = |t: f32| {
        let t = t.rem_euclid(1.0);
        let v = if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        };
        // rounding can land a hair outside the unit range
        v.clamp(0.0, 1.0)
    };
    (channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0))
}

fn named(name: &str) -> Option<Color> {
    let (r, g, b) = match name {
        "transparent" => return Some(Color::TRANSPARENT),
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "lime" => (0, 255, 0),
        "green" => (0, 128, 0),
        "blue" => (0, 0, 255),
        "yellow" => (255, 255, 0),
        "cyan" | "aqua" => (0, 255, 255),
        "magenta" | "fuchsia" => (255, 0, 255),
        "orange" => (255, 165, 0),
        "purple" => (128, 0, 128),
        "gray" | "grey" => (128, 128, 128),
        "silver" => (192, 192, 192),
        "navy" => (0, 0, 128),
        "teal" => (0, 128, 128),
        "maroon" => (128, 0, 0),
        "olive" => (128, 128, 0),
        _ => return None,
    };
    Some(Color::from_rgba8(r, g, b, 255))
}
