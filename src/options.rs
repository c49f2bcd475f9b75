//! Every user-settable engine option, with defaults and validation.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::freq::check_frequency;
use crate::gradient::GradientTable;
use crate::layout::check_mode;
use crate::source::check_fft_size;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Options {
    #[serde(default)]
    pub mode: u8,
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_min_freq")]
    pub min_freq: f64,
    #[serde(default = "default_max_freq")]
    pub max_freq: f64,
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
    #[serde(default = "default_gradient")]
    pub gradient: String,
    #[serde(default = "default_min_decibels")]
    pub min_decibels: f64,
    #[serde(default = "default_max_decibels")]
    pub max_decibels: f64,
    #[serde(default = "yes")]
    pub show_bg_color: bool,
    #[serde(default)]
    pub show_leds: bool,
    #[serde(default = "yes")]
    pub show_scale: bool,
    #[serde(default)]
    pub show_scale_y: bool,
    #[serde(default = "yes")]
    pub show_peaks: bool,
    #[serde(default)]
    pub show_fps: bool,
    #[serde(default)]
    pub lumi_bars: bool,
    #[serde(default)]
    pub lo_res: bool,
    #[serde(default)]
    pub reflex_ratio: f64,
    #[serde(default = "default_reflex_alpha")]
    pub reflex_alpha: f64,
    #[serde(default = "one")]
    pub reflex_bright: f64,
    #[serde(default = "yes")]
    pub reflex_fit: bool,
    #[serde(default)]
    pub line_width: f64,
    #[serde(default = "one")]
    pub fill_alpha: f64,
    #[serde(default = "default_bar_space")]
    pub bar_space: f64,
    #[serde(default)]
    pub overlay: bool,
    #[serde(default = "default_bg_alpha")]
    pub bg_alpha: f64,
    #[serde(default)]
    pub radial: bool,
    #[serde(default)]
    pub spin_speed: f64,
    #[serde(default)]
    pub stereo: bool,
    #[serde(default = "yes")]
    pub split_gradient: bool,
    /// Start the draw loop on construction.
    #[serde(default = "yes")]
    pub start: bool,
    /// Canvas size in CSS pixels; the container size is used when unset.
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            mode: 0,
            fft_size: default_fft_size(),
            min_freq: default_min_freq(),
            max_freq: default_max_freq(),
            smoothing: default_smoothing(),
            gradient: default_gradient(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
            show_bg_color: true,
            show_leds: false,
            show_scale: true,
            show_scale_y: false,
            show_peaks: true,
            show_fps: false,
            lumi_bars: false,
            lo_res: false,
            reflex_ratio: 0.0,
            reflex_alpha: default_reflex_alpha(),
            reflex_bright: 1.0,
            reflex_fit: true,
            line_width: 0.0,
            fill_alpha: 1.0,
            bar_space: default_bar_space(),
            overlay: false,
            bg_alpha: default_bg_alpha(),
            radial: false,
            spin_speed: 0.0,
            stereo: false,
            split_gradient: true,
            start: true,
            width: None,
            height: None,
        }
    }
}

fn default_fft_size() -> usize { 8192 }
fn default_min_freq() -> f64 { 20.0 }
fn default_max_freq() -> f64 { 22000.0 }
fn default_smoothing() -> f64 { 0.5 }
fn default_gradient() -> String { "classic".into() }
fn default_min_decibels() -> f64 { -85.0 }
fn default_max_decibels() -> f64 { -25.0 }
fn default_reflex_alpha() -> f64 { 0.15 }
fn default_bar_space() -> f64 { 0.1 }
fn default_bg_alpha() -> f64 { 0.7 }
fn one() -> f64 { 1.0 }
fn yes() -> bool { true }

/// A partial change; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsUpdate {
    pub mode: Option<u8>,
    pub fft_size: Option<usize>,
    pub min_freq: Option<f64>,
    pub max_freq: Option<f64>,
    pub smoothing: Option<f64>,
    pub gradient: Option<String>,
    pub min_decibels: Option<f64>,
    pub max_decibels: Option<f64>,
    pub show_bg_color: Option<bool>,
    pub show_leds: Option<bool>,
    pub show_scale: Option<bool>,
    pub show_scale_y: Option<bool>,
    pub show_peaks: Option<bool>,
    pub show_fps: Option<bool>,
    pub lumi_bars: Option<bool>,
    pub lo_res: Option<bool>,
    pub reflex_ratio: Option<f64>,
    pub reflex_alpha: Option<f64>,
    pub reflex_bright: Option<f64>,
    pub reflex_fit: Option<bool>,
    pub line_width: Option<f64>,
    pub fill_alpha: Option<f64>,
    pub bar_space: Option<f64>,
    pub overlay: Option<bool>,
    pub bg_alpha: Option<f64>,
    pub radial: Option<bool>,
    pub spin_speed: Option<f64>,
    pub stereo: Option<bool>,
    pub split_gradient: Option<bool>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Continuous tunables accept any number; anything non-finite becomes 0.
fn coerce(name: &str, value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        log::warn!("{name} = {value} is not a finite number, using 0");
        0.0
    }
}

impl Options {
    /// Produce the options that would result from `update`, without
    /// validating them.
    pub fn merged(&self, update: &OptionsUpdate) -> Options {
        let mut next = self.clone();

        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = update.$field.clone() {
                    next.$field = value;
                })*
            };
        }
        macro_rules! take_coerced {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = update.$field {
                    next.$field = coerce(stringify!($field), value);
                })*
            };
        }

        take!(
            mode, fft_size, min_freq, max_freq, smoothing, gradient, min_decibels, max_decibels,
            show_bg_color, show_leds, show_scale, show_scale_y, show_peaks, show_fps, lumi_bars,
            lo_res, reflex_ratio, reflex_fit, overlay, radial, stereo, split_gradient,
        );
        take_coerced!(reflex_alpha, reflex_bright, line_width, fill_alpha, bar_space, bg_alpha, spin_speed);

        if update.width.is_some() {
            next.width = update.width;
        }
        if update.height.is_some() {
            next.height = update.height;
        }
        next
    }

    /// Check every enumerated or bounded option. Continuous tunables are
    /// coerced by [`Options::merged`] and never rejected.
    pub fn validate(&self, gradients: &GradientTable) -> Result<()> {
        check_mode(self.mode)?;
        check_frequency(self.min_freq)?;
        check_frequency(self.max_freq)?;
        if self.min_freq >= self.max_freq {
            return Err(EngineError::EmptyFrequencyRange {
                min: self.min_freq,
                max: self.max_freq,
            });
        }
        if !gradients.contains(&self.gradient) {
            return Err(EngineError::UnknownGradient(self.gradient.clone()));
        }
        if !(0.0..1.0).contains(&self.reflex_ratio) {
            return Err(EngineError::ReflexOutOfRange(self.reflex_ratio));
        }
        check_fft_size(self.fft_size)?;
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(EngineError::InvalidSmoothing(self.smoothing));
        }
        if !(self.min_decibels < self.max_decibels) {
            return Err(EngineError::InvalidSensitivity {
                min: self.min_decibels,
                max: self.max_decibels,
            });
        }
        Ok(())
    }

    /// Fill continuous tunables that arrived non-finite (e.g. from a config
    /// file) with 0.
    pub fn sanitized(mut self) -> Self {
        self.reflex_alpha = coerce("reflex_alpha", self.reflex_alpha);
        self.reflex_bright = coerce("reflex_bright", self.reflex_bright);
        self.line_width = coerce("line_width", self.line_width);
        self.fill_alpha = coerce("fill_alpha", self.fill_alpha);
        self.bar_space = coerce("bar_space", self.bar_space);
        self.bg_alpha = coerce("bg_alpha", self.bg_alpha);
        self.spin_speed = coerce("spin_speed", self.spin_speed);
        self
    }
}
