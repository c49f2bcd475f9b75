//! The engine instance: option handling, canvas sizing, cached layouts and
//! the draw-loop lifecycle. Frame painting lives in [`draw`].

mod draw;

use std::f64::consts::FRAC_PI_2;
use std::fmt::Write;

use tiny_skia::{Color, Pixmap, Shader};

use crate::error::{EngineError, Result};
use crate::freq::{check_frequency, LogAxis};
use crate::gradient::{GradientGeometry, GradientOptions, GradientTable};
use crate::labels::{self, DbScaleImage, ScaleImages, ScaleParams};
use crate::layout::{self, BarDescriptor, BarLayout, LayoutParams};
use crate::leds::LedLayout;
use crate::options::{Options, OptionsUpdate};
use crate::peaks::EnergyState;
use crate::schedule::{FrameHandle, FrameScheduler};
use crate::source::SpectralSource;
use crate::text::TextRenderer;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CSS size used when neither the user nor the container provide one.
pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 270;
/// Largest canvas side in device pixels.
pub const MAX_CANVAS_DIMENSION: u32 = 16384;

/// What the host knows about where the canvas lives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HostSurface {
    /// Container size in CSS pixels; 0 means "no size".
    pub container_width: u32,
    pub container_height: u32,
    pub device_pixel_ratio: f64,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl Default for HostSurface {
    fn default() -> Self {
        Self {
            container_width: 0,
            container_height: 0,
            device_pixel_ratio: 1.0,
            screen_width: 1920,
            screen_height: 1080,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeReason {
    Create,
    User,
    ContainerResize,
    FullscreenEnter,
    FullscreenExit,
    LoRes,
}

/// Values derived from the options and canvas size, refreshed on every
/// change and read by the draw loop.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Internals {
    pub analyzer_radius: f64,
    pub bar_space_px: f64,
    pub channel_height: u32,
    pub is_octave_bands: bool,
    pub is_led_display: bool,
    pub is_lumi_bars: bool,
}

impl Internals {
    fn compute(options: &Options, canvas_height: u32, bar_width: f64) -> Self {
        let is_octave_bands = layout::is_octave_bands(options.mode);
        let bar_space = options.bar_space;
        let bar_space_px = (bar_width - 1.0).min(if bar_space > 0.0 && bar_space < 1.0 {
            bar_width * bar_space
        } else {
            bar_space
        });
        Self {
            analyzer_radius: (canvas_height as f64 * if options.stereo { 0.375 } else { 0.125 }).trunc(),
            bar_space_px,
            channel_height: canvas_height >> (options.stereo && !options.radial) as u32,
            is_octave_bands,
            is_led_display: options.show_leds && is_octave_bands && !options.radial,
            is_lumi_bars: options.lumi_bars && is_octave_bands && !options.radial,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct CanvasGeometry {
    pixel_ratio: f64,
    fs_width: u32,
    fs_height: u32,
    width: u32,
    height: u32,
}

pub type DrawCallback = Box<dyn FnMut(&mut Analyzer)>;
pub type ResizeCallback = Box<dyn FnMut(ResizeReason, &Analyzer)>;

pub struct Analyzer {
    sources: [Box<dyn SpectralSource>; 2],
    scheduler: Box<dyn FrameScheduler>,
    surface: HostSurface,
    options: Options,
    gradients: GradientTable,
    text: TextRenderer,

    canvas: Pixmap,
    reflex_buffer: Option<Pixmap>,
    path_scratch: Option<tiny_skia::PathBuilder>,
    fill_scratch: Option<tiny_skia::PathBuilder>,
    line_points: Vec<(f32, f32)>,
    data: Vec<u8>,

    bars: Vec<BarDescriptor>,
    bar_width: f64,
    axis: LogAxis,
    leds: Option<LedLayout>,
    scales: Option<ScaleImages>,
    scale_key: Option<(ScaleParams, LogAxis)>,
    db_scales: [Option<DbScaleImage>; 2],
    strip_height: u32,
    internals: Internals,
    layout_generation: u64,

    energy: EnergyState,
    spin_angle: f64,
    pixel_ratio: f64,
    fs_width: u32,
    fs_height: u32,
    fullscreen: bool,

    fps: f64,
    fps_label: String,
    frame: u32,
    /// Start of the current FPS sample; the next frame sets it when empty.
    time: Option<f64>,
    animation: Option<FrameHandle>,

    on_canvas_draw: Option<DrawCallback>,
    on_canvas_resize: Option<ResizeCallback>,
}

fn layout_changed(old: &Options, new: &Options) -> bool {
    old.mode != new.mode
        || old.min_freq != new.min_freq
        || old.max_freq != new.max_freq
        || old.fft_size != new.fft_size
}

fn new_canvas(width: u32, height: u32, overlay: bool) -> Result<Pixmap> {
    if width > MAX_CANVAS_DIMENSION || height > MAX_CANVAS_DIMENSION {
        return Err(EngineError::Pixmap { width, height });
    }
    let mut canvas = Pixmap::new(width, height).ok_or(EngineError::Pixmap { width, height })?;
    if !overlay {
        canvas.fill(Color::BLACK);
    }
    Ok(canvas)
}

impl Analyzer {
    /// Build an engine reading from `left` and `right` (the right source is
    /// only pulled in stereo). Fails if the sources are unusable or any
    /// option is invalid.
    pub fn new(
        left: Box<dyn SpectralSource>,
        right: Box<dyn SpectralSource>,
        scheduler: Box<dyn FrameScheduler>,
        surface: HostSurface,
        options: Options,
    ) -> Result<Self> {
        let sample_rate = left.sample_rate();
        if sample_rate == 0 {
            return Err(EngineError::SourceUnavailable("sample rate is zero".into()));
        }
        if right.sample_rate() != sample_rate {
            return Err(EngineError::SourceUnavailable(format!(
                "channel sample rates differ ({} Hz vs {} Hz)",
                sample_rate,
                right.sample_rate()
            )));
        }

        let gradients = GradientTable::with_builtins()?;
        let options = options.sanitized();
        options.validate(&gradients)?;

        let text = TextRenderer::new()?;
        let geometry = canvas_geometry(&surface, false, &options);
        let planned = plan_layout(&options, sample_rate, geometry.width)?;
        let canvas = new_canvas(geometry.width, geometry.height, options.overlay)?;

        let start = options.start;
        let mut analyzer = Self {
            sources: [left, right],
            scheduler,
            surface,
            options,
            gradients,
            text,
            canvas,
            reflex_buffer: None,
            path_scratch: None,
            fill_scratch: None,
            line_points: Vec::new(),
            data: Vec::new(),
            bars: Vec::new(),
            bar_width: 1.0,
            axis: planned.axis,
            leds: None,
            scales: None,
            scale_key: None,
            db_scales: [None, None],
            strip_height: 0,
            internals: Internals::default(),
            layout_generation: 0,
            energy: EnergyState::default(),
            spin_angle: -FRAC_PI_2,
            pixel_ratio: geometry.pixel_ratio,
            fs_width: geometry.fs_width,
            fs_height: geometry.fs_height,
            fullscreen: false,
            fps: 0.0,
            fps_label: String::from("0"),
            frame: 0,
            time: None,
            animation: None,
            on_canvas_draw: None,
            on_canvas_resize: None,
        };

        analyzer.sync_sources(None);
        analyzer.strip_height = labels::strip_height(geometry.height, geometry.pixel_ratio);
        analyzer.install_layout(planned);
        analyzer.refresh_derived(true)?;
        log::info!(
            "analyzer v{} created: {}x{} canvas, mode {}, {} bars",
            VERSION,
            geometry.width,
            geometry.height,
            analyzer.options.mode,
            analyzer.bars.len()
        );

        if start {
            analyzer.toggle_analyzer(Some(true));
        }
        Ok(analyzer)
    }

    // ---- configuration ------------------------------------------------

    /// Apply a partial option change atomically: everything is validated
    /// (including the resulting bar layout) before anything is touched, then
    /// only the affected caches are rebuilt.
    pub fn set_options(&mut self, update: &OptionsUpdate) -> Result<()> {
        let next = self.options.merged(update);
        next.validate(&self.gradients)?;

        let reason = if update.lo_res.is_some_and(|lo_res| lo_res != self.options.lo_res) {
            ResizeReason::LoRes
        } else {
            ResizeReason::User
        };
        self.commit(next, self.surface, self.fullscreen, reason)
    }

    /// Install `next` on `surface`. Nothing is touched unless the whole
    /// change succeeds.
    fn commit(&mut self, next: Options, surface: HostSurface, fullscreen: bool, reason: ResizeReason) -> Result<()> {
        let geometry = canvas_geometry(&surface, fullscreen, &next);
        let resized = (geometry.width, geometry.height) != (self.canvas.width(), self.canvas.height());
        let relayout = resized || layout_changed(&self.options, &next);

        let planned = if relayout {
            Some(plan_layout(&next, self.sources[0].sample_rate(), geometry.width)?)
        } else {
            None
        };
        let canvas = if resized {
            Some(new_canvas(geometry.width, geometry.height, next.overlay)?)
        } else {
            None
        };

        self.surface = surface;
        self.fullscreen = fullscreen;
        let previous = std::mem::replace(&mut self.options, next);
        self.sync_sources(Some(&previous));
        if self.options.spin_speed == 0.0 && previous.spin_speed != 0.0 {
            self.spin_angle = -FRAC_PI_2;
        }

        self.pixel_ratio = geometry.pixel_ratio;
        self.fs_width = geometry.fs_width;
        self.fs_height = geometry.fs_height;

        if let Some(canvas) = canvas {
            self.canvas = canvas;
            self.reflex_buffer = None;
            self.strip_height = labels::strip_height(geometry.height, geometry.pixel_ratio);
        }
        if let Some(planned) = planned {
            self.install_layout(planned);
        }
        self.refresh_derived(previous.gradient != self.options.gradient)?;

        if resized {
            self.fire_resize(reason);
        }
        Ok(())
    }

    /// Change the canvas size to follow the host surface, fullscreen state
    /// or pixel ratio. Does nothing when the pixel size is unchanged.
    fn set_canvas(&mut self, surface: HostSurface, fullscreen: bool, reason: ResizeReason) -> Result<()> {
        self.commit(self.options.clone(), surface, fullscreen, reason)
    }

    fn sync_sources(&mut self, previous: Option<&Options>) {
        let options = &self.options;
        for source in self.sources.iter_mut() {
            if previous.map_or(true, |p| p.fft_size != options.fft_size) || source.fft_size() != options.fft_size {
                source.set_fft_size(options.fft_size);
            }
            if previous.map_or(true, |p| {
                p.min_decibels != options.min_decibels || p.max_decibels != options.max_decibels
            }) {
                source.set_decibel_range(options.min_decibels, options.max_decibels);
            }
            if previous.map_or(true, |p| p.smoothing != options.smoothing) {
                source.set_smoothing(options.smoothing);
            }
        }
        let bins = self.sources[0].frequency_bin_count();
        if self.data.len() != bins {
            self.data = vec![0; bins];
        }
    }

    fn install_layout(&mut self, planned: BarLayout) {
        self.bars = planned.bars;
        self.bar_width = planned.bar_width;
        self.axis = planned.axis;
        self.layout_generation += 1;
        log::debug!(
            "bar layout #{}: {} bars, bar width {:.2}px",
            self.layout_generation,
            self.bars.len(),
            self.bar_width
        );
    }

    /// Rebuild internals, gradients, scales and LEDs from the current
    /// options, canvas and bar layout. Each cache is only rebuilt when its
    /// inputs changed.
    fn refresh_derived(&mut self, gradient_changed: bool) -> Result<()> {
        let (width, height) = (self.canvas.width(), self.canvas.height());
        self.internals = Internals::compute(&self.options, height, self.bar_width);

        let geometry = GradientGeometry {
            width: width as f32,
            height: height as f32,
            stereo: self.options.stereo,
            radial: self.options.radial,
            lumi_bars: self.internals.is_lumi_bars,
            split_gradient: self.options.split_gradient,
            reflex_ratio: self.options.reflex_ratio as f32,
            analyzer_radius: self.internals.analyzer_radius as f32,
        };
        if self.gradients.geometry() != Some(geometry) {
            self.gradients.compile(geometry);
        }
        if gradient_changed || self.gradients.fill().is_none() {
            self.gradients.prepare_fill(&self.options.gradient)?;
        }

        let params = ScaleParams {
            width,
            height,
            strip_height: self.strip_height,
            analyzer_radius: self.internals.analyzer_radius as u32,
            stereo: self.options.stereo,
        };
        let key = (params, self.axis);
        if self.scale_key != Some(key) {
            self.scales = Some(labels::render_scales(&self.text, &self.axis, &params)?);
            self.scale_key = Some(key);
            log::debug!("scales regenerated ({}px strip)", self.strip_height);
        }

        self.leds = if self.internals.is_octave_bands {
            let ratio = if self.options.lumi_bars { 1.0 } else { 1.0 - self.options.reflex_ratio };
            let analyzer_height = (self.internals.channel_height as f64 * ratio).trunc();
            let leds = LedLayout::compute(self.options.mode, analyzer_height, self.pixel_ratio, self.bar_width);
            log::debug!("led layout: {} segments of {:.2}px", leds.count, leds.height);
            Some(leds)
        } else {
            None
        };
        Ok(())
    }

    fn set_fps(&mut self, fps: f64) {
        self.fps = fps;
        self.fps_label.clear();
        let _ = write!(self.fps_label, "{}", fps.round());
    }

    fn fire_resize(&mut self, reason: ResizeReason) {
        log::debug!(
            "canvas resized to {}x{} ({:?})",
            self.canvas.width(),
            self.canvas.height(),
            reason
        );
        if let Some(mut callback) = self.on_canvas_resize.take() {
            callback(reason, self);
            if self.on_canvas_resize.is_none() {
                self.on_canvas_resize = Some(callback);
            }
        }
    }

    pub fn set_mode(&mut self, mode: u8) -> Result<()> {
        self.set_options(&OptionsUpdate { mode: Some(mode), ..Default::default() })
    }

    pub fn set_gradient(&mut self, name: &str) -> Result<()> {
        self.set_options(&OptionsUpdate { gradient: Some(name.to_string()), ..Default::default() })
    }

    pub fn set_reflex_ratio(&mut self, ratio: f64) -> Result<()> {
        self.set_options(&OptionsUpdate { reflex_ratio: Some(ratio), ..Default::default() })
    }

    pub fn set_fft_size(&mut self, fft_size: usize) -> Result<()> {
        self.set_options(&OptionsUpdate { fft_size: Some(fft_size), ..Default::default() })
    }

    pub fn set_smoothing(&mut self, smoothing: f64) -> Result<()> {
        self.set_options(&OptionsUpdate { smoothing: Some(smoothing), ..Default::default() })
    }

    /// Set both ends of the frequency window; arguments may come in any order.
    pub fn set_freq_range(&mut self, a: f64, b: f64) -> Result<()> {
        check_frequency(a)?;
        check_frequency(b)?;
        self.set_options(&OptionsUpdate {
            min_freq: Some(a.min(b)),
            max_freq: Some(a.max(b)),
            ..Default::default()
        })
    }

    /// Set the decibel window; arguments may come in any order.
    pub fn set_sensitivity(&mut self, a: f64, b: f64) -> Result<()> {
        self.set_options(&OptionsUpdate {
            min_decibels: Some(a.min(b)),
            max_decibels: Some(a.max(b)),
            ..Default::default()
        })
    }

    /// Register (or replace) a named gradient.
    pub fn register_gradient(&mut self, name: &str, options: &GradientOptions) -> Result<()> {
        self.gradients.register(name, options)?;
        if name == self.options.gradient {
            self.gradients.prepare_fill(name)?;
        }
        log::debug!("gradient '{}' registered", name);
        Ok(())
    }

    /// Register a gradient from a JSON value such as `{"colorStops": [...]}`.
    pub fn register_gradient_json(&mut self, name: &str, value: &serde_json::Value) -> Result<()> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidGradientName);
        }
        let options = GradientOptions::from_json(value)?;
        self.register_gradient(name, &options)
    }

    pub fn set_canvas_size(&mut self, width: u32, height: u32) -> Result<()> {
        self.set_options(&OptionsUpdate {
            width: Some(width),
            height: Some(height),
            ..Default::default()
        })
    }

    pub fn notify_container_resize(&mut self, width: u32, height: u32) -> Result<()> {
        let surface = HostSurface {
            container_width: width,
            container_height: height,
            ..self.surface
        };
        self.set_canvas(surface, self.fullscreen, ResizeReason::ContainerResize)
    }

    pub fn set_screen_size(&mut self, width: u32, height: u32) -> Result<()> {
        let surface = HostSurface {
            screen_width: width,
            screen_height: height,
            ..self.surface
        };
        self.set_canvas(surface, self.fullscreen, ResizeReason::ContainerResize)
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f64) -> Result<()> {
        if !(ratio.is_finite() && ratio > 0.0) {
            log::warn!("ignoring device pixel ratio {ratio}");
            return Ok(());
        }
        let surface = HostSurface {
            device_pixel_ratio: ratio,
            ..self.surface
        };
        self.set_canvas(surface, self.fullscreen, ResizeReason::ContainerResize)
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) -> Result<()> {
        if fullscreen == self.fullscreen {
            return Ok(());
        }
        let reason = if fullscreen {
            ResizeReason::FullscreenEnter
        } else {
            ResizeReason::FullscreenExit
        };
        self.set_canvas(self.surface, fullscreen, reason)
    }

    pub fn toggle_fullscreen(&mut self) -> Result<()> {
        self.set_fullscreen(!self.fullscreen)
    }

    pub fn set_on_canvas_draw(&mut self, callback: Option<DrawCallback>) {
        self.on_canvas_draw = callback;
    }

    pub fn set_on_canvas_resize(&mut self, callback: Option<ResizeCallback>) {
        self.on_canvas_resize = callback;
    }

    // ---- draw loop lifecycle -------------------------------------------

    /// Start (`Some(true)`), stop (`Some(false)`) or flip (`None`) the draw
    /// loop. Returns whether the loop is running afterwards.
    pub fn toggle_analyzer(&mut self, value: Option<bool>) -> bool {
        let started = self.is_on();
        let value = value.unwrap_or(!started);

        if started && !value {
            if let Some(handle) = self.animation.take() {
                self.scheduler.cancel_frame(handle);
            }
            log::info!("draw loop stopped");
        } else if !started && value {
            self.frame = 0;
            self.set_fps(0.0);
            self.time = None;
            self.animation = Some(self.scheduler.request_frame());
            log::info!("draw loop started");
        }
        self.is_on()
    }

    /// Host entry point for a scheduled frame. Renders and schedules the next
    /// frame when the loop is running; returns false when it is stopped.
    pub fn on_animation_frame(&mut self, timestamp: f64) -> bool {
        if self.animation.is_none() {
            return false;
        }
        self.render_frame(timestamp);
        // the draw callback may have stopped the loop
        if self.animation.is_some() {
            self.animation = Some(self.scheduler.request_frame());
        }
        true
    }

    // ---- queries -----------------------------------------------------------

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn is_on(&self) -> bool {
        self.animation.is_some()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn energy(&self) -> f64 {
        self.energy.instant
    }

    pub fn peak_energy(&self) -> f64 {
        self.energy.peak
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    pub fn fs_width(&self) -> u32 {
        self.fs_width
    }

    pub fn fs_height(&self) -> u32 {
        self.fs_height
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut Pixmap {
        &mut self.canvas
    }

    /// The canvas together with a shader painting the active gradient, for
    /// overlays drawn from the per-frame callback.
    pub fn canvas_with_gradient(&mut self) -> (&mut Pixmap, Shader<'_>) {
        let shader = self
            .gradients
            .pattern(1.0)
            .unwrap_or(Shader::SolidColor(Color::WHITE));
        (&mut self.canvas, shader)
    }

    pub fn gradient_shader(&self) -> Option<Shader<'_>> {
        self.gradients.pattern(1.0)
    }

    pub fn gradient_names(&self) -> Vec<&str> {
        self.gradients.names()
    }

    pub fn bars(&self) -> &[BarDescriptor] {
        &self.bars
    }

    pub fn bar_width(&self) -> f64 {
        self.bar_width
    }

    pub fn led_layout(&self) -> Option<LedLayout> {
        self.leds
    }

    pub fn internals(&self) -> Internals {
        self.internals
    }

    pub fn is_octave_bands(&self) -> bool {
        self.internals.is_octave_bands
    }

    pub fn is_led_display(&self) -> bool {
        self.internals.is_led_display
    }

    pub fn is_lumi_bars(&self) -> bool {
        self.internals.is_lumi_bars
    }

    pub fn sample_rate(&self) -> u32 {
        self.sources[0].sample_rate()
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.sources[0].frequency_bin_count()
    }

    /// Bumped every time the bar list is rebuilt.
    pub fn layout_generation(&self) -> u64 {
        self.layout_generation
    }

    pub fn version() -> &'static str {
        VERSION
    }
}

fn canvas_geometry(surface: &HostSurface, fullscreen: bool, options: &Options) -> CanvasGeometry {
    let mut pixel_ratio = surface.device_pixel_ratio;
    if options.lo_res {
        pixel_ratio /= 2.0;
    }
    let long_side = surface.screen_width.max(surface.screen_height) as f64;
    let short_side = surface.screen_width.min(surface.screen_height) as f64;
    let fs_width = (long_side * pixel_ratio) as u32;
    let fs_height = (short_side * pixel_ratio) as u32;

    let pick = |user: Option<u32>, container: u32, default: u32| {
        let css = user
            .filter(|&v| v > 0)
            .unwrap_or(if container > 0 { container } else { default });
        ((css as f64 * pixel_ratio) as u32).max(1)
    };
    let (width, height) = if fullscreen {
        (fs_width.max(1), fs_height.max(1))
    } else {
        (
            pick(options.width, surface.container_width, DEFAULT_WIDTH),
            pick(options.height, surface.container_height, DEFAULT_HEIGHT),
        )
    };

    CanvasGeometry {
        pixel_ratio,
        fs_width,
        fs_height,
        width,
        height,
    }
}

fn plan_layout(options: &Options, sample_rate: u32, width: u32) -> Result<BarLayout> {
    layout::plan(&LayoutParams {
        mode: options.mode,
        min_freq: options.min_freq,
        max_freq: options.max_freq,
        sample_rate,
        fft_size: options.fft_size,
        width: width as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ManualScheduler;
    use crate::source::StaticSource;

    fn analyzer(options: Options) -> Analyzer {
        Analyzer::new(
            Box::new(StaticSource::flat(44100, 128)),
            Box::new(StaticSource::flat(44100, 64)),
            Box::new(ManualScheduler::new()),
            HostSurface::default(),
            options,
        )
        .unwrap()
    }

    #[test]
    fn default_canvas_size_and_internals() {
        let a = analyzer(Options::default());
        assert_eq!((a.canvas().width(), a.canvas().height()), (640, 270));
        let internals = a.internals();
        assert_eq!(internals.analyzer_radius, 33.0);
        assert_eq!(internals.channel_height, 270);
        assert!(!internals.is_octave_bands);
        assert_eq!(internals.bar_space_px, 0.0);
        assert!(a.led_layout().is_none());
    }

    #[test]
    fn stereo_halves_the_channel_unless_radial() {
        let a = analyzer(Options { stereo: true, ..Options::default() });
        assert_eq!(a.internals().channel_height, 135);
        assert_eq!(a.internals().analyzer_radius, 101.0);

        let a = analyzer(Options { stereo: true, radial: true, ..Options::default() });
        assert_eq!(a.internals().channel_height, 270);
    }

    #[test]
    fn lo_res_halves_pixel_ratio() {
        let a = analyzer(Options { lo_res: true, ..Options::default() });
        assert_eq!(a.pixel_ratio(), 0.5);
        assert_eq!((a.canvas().width(), a.canvas().height()), (320, 135));
        assert_eq!((a.fs_width(), a.fs_height()), (960, 540));
    }

    #[test]
    fn octave_flags_follow_mode_and_radial() {
        let mut a = analyzer(Options { show_leds: true, lumi_bars: true, ..Options::default() });
        assert!(!a.is_led_display());
        a.set_mode(3).unwrap();
        assert!(a.is_octave_bands() && a.is_led_display() && a.is_lumi_bars());
        assert!(a.led_layout().is_some());
        a.set_options(&OptionsUpdate { radial: Some(true), ..Default::default() }).unwrap();
        assert!(!a.is_led_display() && !a.is_lumi_bars());
    }

    #[test]
    fn bar_space_in_pixels() {
        let mut a = analyzer(Options { mode: 8, ..Options::default() });
        let w = a.bar_width();
        assert!((a.internals().bar_space_px - w * 0.1).abs() < 1e-9);
        a.set_options(&OptionsUpdate { bar_space: Some(3.0), ..Default::default() }).unwrap();
        assert_eq!(a.internals().bar_space_px, 3.0);
        a.set_options(&OptionsUpdate { bar_space: Some(1e6), ..Default::default() }).unwrap();
        assert_eq!(a.internals().bar_space_px, w - 1.0);
    }

    #[test]
    fn rejected_update_changes_nothing() {
        let mut a = analyzer(Options::default());
        let before = a.options().clone();
        let generation = a.layout_generation();
        let err = a
            .set_options(&OptionsUpdate {
                mode: Some(4),
                reflex_ratio: Some(1.5),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.code(), "ERR_REFLEX_OUT_OF_RANGE");
        assert_eq!(a.options(), &before);
        assert_eq!(a.layout_generation(), generation);
    }

    #[test]
    fn spin_angle_resets_when_spin_stops() {
        let mut a = analyzer(Options { spin_speed: 10.0, radial: true, ..Options::default() });
        a.spin_angle = 1.0;
        a.set_options(&OptionsUpdate { spin_speed: Some(0.0), ..Default::default() }).unwrap();
        assert_eq!(a.spin_angle, -FRAC_PI_2);
    }

    #[test]
    fn sources_follow_sensitivity_and_fft() {
        let mut a = analyzer(Options::default());
        a.set_sensitivity(-30.0, -90.0).unwrap();
        assert_eq!(a.sources[0].min_decibels(), -90.0);
        assert_eq!(a.sources[1].max_decibels(), -30.0);
        assert_eq!(
            a.set_sensitivity(-40.0, -40.0).unwrap_err().code(),
            "ERR_INVALID_SENSITIVITY"
        );

        a.set_fft_size(2048).unwrap();
        assert_eq!(a.frequency_bin_count(), 1024);
        assert_eq!(a.data.len(), 1024);
        assert_eq!(a.sources[1].fft_size(), 2048);
    }
}
