use std::cell::{Cell, RefCell};
use std::rc::Rc;

use barscope::{
    Analyzer, FrameHandle, FrameScheduler, HostSurface, ManualScheduler, Options, OptionsUpdate,
    ResizeReason, StaticSource,
};
use serde_json::json;
use tiny_skia::{Paint, Rect, Transform};

fn engine_with(level: u8, options: Options) -> Analyzer {
    Analyzer::new(
        Box::new(StaticSource::flat(44100, level)),
        Box::new(StaticSource::flat(44100, level)),
        Box::new(ManualScheduler::new()),
        HostSurface::default(),
        options,
    )
    .unwrap()
}

fn engine(options: Options) -> Analyzer {
    engine_with(200, options)
}

fn has_detail(analyzer: &Analyzer) -> bool {
    let pixels = analyzer.canvas().pixels();
    pixels.iter().any(|p| *p != pixels[0])
}

/// Scheduler whose counters stay visible after it is boxed into the engine.
#[derive(Clone, Default)]
struct SharedScheduler {
    requested: Rc<Cell<u64>>,
    cancelled: Rc<Cell<u64>>,
}

impl FrameScheduler for SharedScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.requested.set(self.requested.get() + 1);
        FrameHandle(self.requested.get())
    }

    fn cancel_frame(&mut self, _handle: FrameHandle) {
        self.cancelled.set(self.cancelled.get() + 1);
    }
}

#[test]
fn negative_frequency_is_rejected_before_mutation() {
    let mut a = engine(Options::default());
    let err = a.set_freq_range(-5.0, 1000.0).unwrap_err();
    assert_eq!(err.code(), "ERR_FREQUENCY_TOO_LOW");
    assert_eq!(a.options().min_freq, 20.0);
    assert_eq!(a.options().max_freq, 22000.0);

    // arguments are ordered
    a.set_freq_range(8000.0, 100.0).unwrap();
    assert_eq!((a.options().min_freq, a.options().max_freq), (100.0, 8000.0));
    assert_eq!(a.set_freq_range(500.0, 500.0).unwrap_err().code(), "ERR_FREQUENCY_RANGE_EMPTY");
}

#[test]
fn resizing_to_the_same_size_is_a_no_op() {
    let mut a = engine(Options::default());
    let reasons = Rc::new(RefCell::new(Vec::new()));
    let sink = reasons.clone();
    a.set_on_canvas_resize(Some(Box::new(move |reason: ResizeReason, _: &Analyzer| sink.borrow_mut().push(reason))));

    a.notify_container_resize(800, 300).unwrap();
    let generation = a.layout_generation();
    assert_eq!((a.canvas().width(), a.canvas().height()), (800, 300));

    a.notify_container_resize(800, 300).unwrap();
    assert_eq!(a.layout_generation(), generation);
    assert_eq!(*reasons.borrow(), vec![ResizeReason::ContainerResize]);
}

#[test]
fn invalid_mode_is_rejected() {
    let mut a = engine(Options::default());
    for mode in [9, 11, 255] {
        assert_eq!(a.set_mode(mode).unwrap_err().code(), "ERR_INVALID_MODE");
    }
    assert_eq!(a.options().mode, 0);

    let err = Analyzer::new(
        Box::new(StaticSource::flat(44100, 0)),
        Box::new(StaticSource::flat(44100, 0)),
        Box::new(ManualScheduler::new()),
        HostSurface::default(),
        Options { mode: 12, ..Options::default() },
    )
    .err()
    .unwrap();
    assert_eq!(err.code(), "ERR_INVALID_MODE");
}

#[test]
fn single_color_gradient_is_not_registered() {
    let mut a = engine(Options::default());
    let err = a.register_gradient_json("mono", &json!({ "colorStops": ["red"] })).unwrap_err();
    assert_eq!(err.code(), "ERR_GRADIENT_MISSING_COLOR");
    assert!(!a.gradient_names().contains(&"mono"));
    assert_eq!(a.set_gradient("mono").unwrap_err().code(), "ERR_UNKNOWN_GRADIENT");

    assert_eq!(
        a.register_gradient_json("list", &json!(["red", "blue"])).unwrap_err().code(),
        "ERR_GRADIENT_NOT_AN_OBJECT"
    );
    assert_eq!(
        a.register_gradient_json("", &json!({ "colorStops": ["red", "blue"] })).unwrap_err().code(),
        "ERR_GRADIENT_INVALID_NAME"
    );

    a.register_gradient_json("duo", &json!({ "colorStops": ["red", { "pos": 0.8, "color": "blue" }] }))
        .unwrap();
    a.set_gradient("duo").unwrap();
    assert_eq!(a.options().gradient, "duo");
}

#[test]
fn start_and_stop_are_idempotent() {
    let scheduler = SharedScheduler::default();
    let mut a = Analyzer::new(
        Box::new(StaticSource::flat(44100, 100)),
        Box::new(StaticSource::flat(44100, 100)),
        Box::new(scheduler.clone()),
        HostSurface::default(),
        Options { start: false, ..Options::default() },
    )
    .unwrap();
    assert!(!a.is_on());
    assert!(!a.on_animation_frame(0.0));

    assert!(a.toggle_analyzer(Some(true)));
    assert!(a.toggle_analyzer(Some(true)));
    assert_eq!(scheduler.requested.get(), 1);

    assert!(a.on_animation_frame(16.0));
    assert_eq!(scheduler.requested.get(), 2);

    assert!(!a.toggle_analyzer(Some(false)));
    assert!(!a.toggle_analyzer(Some(false)));
    assert_eq!(scheduler.cancelled.get(), 1);

    // flip
    assert!(a.toggle_analyzer(None));
    assert!(!a.toggle_analyzer(None));
}

#[test]
fn draw_callback_runs_every_frame_and_may_stop_the_loop() {
    let mut a = engine(Options::default());
    let frames = Rc::new(Cell::new(0u32));
    let counter = frames.clone();
    a.set_on_canvas_draw(Some(Box::new(move |analyzer: &mut Analyzer| {
        counter.set(counter.get() + 1);
        if counter.get() == 3 {
            analyzer.toggle_analyzer(Some(false));
        }
    })));

    for i in 0..5 {
        a.on_animation_frame(i as f64 * 16.0);
    }
    assert_eq!(frames.get(), 3);
    assert!(!a.is_on());
}

#[test]
fn draw_callback_can_paint_with_the_gradient() {
    let mut a = engine_with(0, Options { show_scale: false, ..Options::default() });
    a.set_on_canvas_draw(Some(Box::new(|analyzer: &mut Analyzer| {
        let (canvas, shader) = analyzer.canvas_with_gradient();
        let paint = Paint { shader, ..Paint::default() };
        if let Some(rect) = Rect::from_xywh(0.0, 0.0, 20.0, 20.0) {
            canvas.fill_rect(rect, &paint, Transform::identity(), None);
        }
    })));
    a.on_animation_frame(0.0);

    let corner = a.canvas().pixel(5, 5).unwrap();
    let background = a.canvas().pixel(300, 100).unwrap();
    assert_ne!(corner, background);
    assert_eq!(corner.alpha(), 255);
}

#[test]
fn resize_callback_reports_each_reason() {
    let mut a = engine(Options::default());
    let reasons = Rc::new(RefCell::new(Vec::new()));
    let sink = reasons.clone();
    a.set_on_canvas_resize(Some(Box::new(move |reason, analyzer: &Analyzer| {
        assert!(analyzer.canvas().width() > 0);
        sink.borrow_mut().push(reason);
    })));

    a.set_canvas_size(800, 400).unwrap();
    a.set_fullscreen(true).unwrap();
    assert_eq!((a.canvas().width(), a.canvas().height()), (1920, 1080));
    a.toggle_fullscreen().unwrap();
    assert!(!a.is_fullscreen());
    a.set_options(&OptionsUpdate { lo_res: Some(true), ..Default::default() }).unwrap();
    assert_eq!((a.canvas().width(), a.canvas().height()), (400, 200));
    // a user size wins over the container
    a.notify_container_resize(1000, 500).unwrap();

    assert_eq!(
        *reasons.borrow(),
        vec![
            ResizeReason::User,
            ResizeReason::FullscreenEnter,
            ResizeReason::FullscreenExit,
            ResizeReason::LoRes,
        ]
    );
}

#[test]
fn every_layout_renders() {
    let layouts = [
        Options::default(),
        Options { stereo: true, ..Options::default() },
        Options { radial: true, spin_speed: 5.0, ..Options::default() },
        Options { mode: 3, show_leds: true, ..Options::default() },
        Options { mode: 6, lumi_bars: true, ..Options::default() },
        Options { mode: 10, line_width: 2.0, fill_alpha: 0.3, ..Options::default() },
        Options { mode: 10, radial: true, stereo: true, ..Options::default() },
        Options { mode: 8, reflex_ratio: 0.4, reflex_fit: false, ..Options::default() },
        Options { mode: 4, overlay: true, show_bg_color: true, show_scale_y: true, ..Options::default() },
    ];
    for options in layouts {
        let label = format!("{options:?}");
        let mut a = engine(options);
        for i in 0..3 {
            assert!(a.on_animation_frame(i as f64 * 16.0));
        }
        assert!(has_detail(&a), "{label}");
        assert!(a.energy() > 0.0, "{label}");
    }
}

#[test]
fn discrete_bars_span_the_requested_bins() {
    let a = engine(Options::default());
    assert_eq!(a.frequency_bin_count(), 4096);

    let bars = a.bars();
    // floor(20 * 8192 / 44100) = 3, round(22000 * 8192 / 44100) = 4087
    assert_eq!(bars[0].data_start, 3);
    assert_eq!(bars[bars.len() - 1].data_end, 4087);
    for pair in bars.windows(2) {
        assert!(pair[0].pos_x < pair[1].pos_x);
        assert_eq!(pair[1].data_start, pair[0].data_end + 1);
    }

    // the top of the range clamps to the last bin
    let mut a = a;
    a.set_freq_range(20.0, 23000.0).unwrap();
    assert_eq!(a.bars()[a.bars().len() - 1].data_end, 4095);
}

#[test]
fn semitone_mode_has_one_bar_per_semitone() {
    let mut a = engine(Options::default());
    a.set_mode(2).unwrap();
    assert_eq!(a.bars().len(), 121);
    assert!((a.bar_width() - 640.0 / 121.0).abs() < 1e-9);

    a.set_mode(8).unwrap();
    assert_eq!(a.bars().len(), 10);
}

#[test]
fn energy_follows_the_spectrum() {
    let mut silent = engine_with(0, Options::default());
    silent.on_animation_frame(0.0);
    assert_eq!(silent.energy(), 0.0);
    assert_eq!(silent.peak_energy(), 0.0);

    let mut loud = engine_with(255, Options { mode: 5, ..Options::default() });
    loud.on_animation_frame(0.0);
    assert!((loud.energy() - 1.0).abs() < 1e-9);
    assert!((loud.peak_energy() - 1.0).abs() < 1e-9);
}

#[test]
fn sources_with_mismatched_rates_are_refused() {
    let err = Analyzer::new(
        Box::new(StaticSource::flat(44100, 0)),
        Box::new(StaticSource::flat(48000, 0)),
        Box::new(ManualScheduler::new()),
        HostSurface::default(),
        Options::default(),
    )
    .err()
    .unwrap();
    assert_eq!(err.code(), "ERR_AUDIO_SOURCE_FAIL");
}

#[test]
fn oversized_container_leaves_the_surface_untouched() {
    let mut a = engine(Options::default());
    let err = a.notify_container_resize(u32::MAX, u32::MAX).unwrap_err();
    assert_eq!(err.code(), "ERR_PIXMAP");
    assert_eq!((a.canvas().width(), a.canvas().height()), (640, 270));

    // later changes still see the old container size
    a.set_gradient("prism").unwrap();
    a.set_device_pixel_ratio(2.0).unwrap();
    assert_eq!((a.canvas().width(), a.canvas().height()), (1280, 540));
}

#[test]
fn huge_pixel_ratio_is_refused() {
    let mut a = engine(Options::default());
    let err = a.set_device_pixel_ratio(100000.0).unwrap_err();
    assert_eq!(err.code(), "ERR_PIXMAP");
    assert_eq!(a.pixel_ratio(), 1.0);
    assert_eq!((a.canvas().width(), a.canvas().height()), (640, 270));
    assert!(a.on_animation_frame(0.0));

    assert!(a.set_screen_size(u32::MAX, u32::MAX).is_ok());
    assert_eq!(a.set_fullscreen(true).unwrap_err().code(), "ERR_PIXMAP");
    assert!(!a.is_fullscreen());
}
