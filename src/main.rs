mod audio;
mod cli;
mod config;
mod encode;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use audio::analyser::{FftSource, Playhead};
use barscope::gradient::GradientTable;
use barscope::text::{Align, TextRenderer};
use barscope::{Analyzer, GradientOptions, HostSurface, ManualScheduler};
use cli::Cli;
use config::Config;
use encode::ffmpeg::{EncoderSettings, FfmpegEncoder};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect barscope.toml / user config
    let mut cfg = Config::default();
    if let Some(path) = cli.config.clone().or_else(config::discover) {
        if let Some(loaded) = config::load_config(&path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.width == 1280 { cli.width = loaded.output.width; }
            if cli.height == 540 { cli.height = loaded.output.height; }
            if cli.fps == 30 { cli.fps = loaded.output.fps; }
            if cli.crf == 18 { cli.crf = loaded.output.crf; }
            if cli.codec == "libx264" { cli.codec = loaded.output.codec.clone(); }
            cfg = loaded;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    // Config gradients first, then --gradients so the file wins on name clashes
    let mut gradients: Vec<(String, GradientOptions)> = std::mem::take(&mut cfg.gradients).into_iter().collect();
    if let Some(ref path) = cli.gradients {
        gradients.extend(load_gradient_file(path)?);
    }

    if cli.list_gradients {
        let mut table = GradientTable::with_builtins()?;
        for (name, options) in &gradients {
            table
                .register(name, options)
                .with_context(|| format!("Invalid gradient '{}'", name))?;
        }
        println!("Available gradients:");
        for name in table.names() {
            println!("  {}", name);
        }
        return Ok(());
    }

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    if cli.fps == 0 {
        anyhow::bail!("--fps must be at least 1");
    }

    log::info!("barscope v{} - spectrum analyzer renderer", barscope::VERSION);
    log::info!("Input: {}", input.display());
    log::info!("Output: {}", cli.output.display());
    log::info!("Resolution: {}x{} @ {}fps", cli.width, cli.height, cli.fps);

    // 1. Decode audio
    log::info!("Decoding audio...");
    let audio_data = audio::decode::decode_audio(input)?;
    let sample_rate = audio_data.sample_rate;
    let duration = audio_data.duration();
    let (left, right) = audio_data.stereo_pair();
    let total_samples = left.len();

    // 2. One analyser per channel, both reading at the same playhead
    let playhead: Playhead = Rc::new(Cell::new(0));
    let left = FftSource::new(left.into(), playhead.clone(), sample_rate);
    let right = FftSource::new(right.into(), playhead.clone(), sample_rate);

    // 3. Build the engine; custom gradients must exist before they are selected
    let mut options = cfg.analyzer.merged(&cli.options_update());
    options.width = Some(cli.width);
    options.height = Some(cli.height);
    options.start = false;
    let gradient = std::mem::replace(&mut options.gradient, "classic".into());

    let surface = HostSurface {
        container_width: cli.width,
        container_height: cli.height,
        ..Default::default()
    };
    let mut analyzer = Analyzer::new(
        Box::new(left),
        Box::new(right),
        Box::new(ManualScheduler::new()),
        surface,
        options,
    )
    .context("Failed to create analyzer")?;

    for (name, options) in &gradients {
        analyzer
            .register_gradient(name, options)
            .with_context(|| format!("Invalid gradient '{}'", name))?;
    }
    analyzer
        .set_gradient(&gradient)
        .with_context(|| format!("Cannot use gradient '{}'", gradient))?;

    if let Some(title) = cli.title.clone() {
        let text = TextRenderer::new()?;
        analyzer.set_on_canvas_draw(Some(Box::new(move |analyzer: &mut Analyzer| {
            let canvas = analyzer.canvas_mut();
            let size = (canvas.height() as f32 * 0.06).max(16.0);
            text.draw(canvas, &title, size, size * 0.5, size * 1.2, Align::Left, tiny_skia::Color::WHITE);
        })));
    }

    let (width, height) = (analyzer.canvas().width(), analyzer.canvas().height());
    log::info!(
        "Analyzer ready: mode {}, {} bars, gradient '{}'",
        analyzer.options().mode,
        analyzer.bars().len(),
        analyzer.options().gradient
    );

    // 4. Start FFmpeg encoder
    log::info!("Starting FFmpeg encoder...");
    let mut encoder = FfmpegEncoder::new(
        &cli.output,
        input,
        &EncoderSettings {
            width,
            height,
            fps: cli.fps,
            codec: &cli.codec,
            pix_fmt: &cli.pix_fmt,
            crf: cli.crf,
            bitrate: cli.bitrate.as_deref(),
        },
    )?;

    // 5. Render loop
    let total_frames = (duration * cli.fps as f64).ceil() as usize;
    log::info!("Total frames: {}, Duration: {:.1}s", total_frames, duration);

    let pb = ProgressBar::new(total_frames as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    analyzer.toggle_analyzer(Some(true));
    let mut peak_energy: f64 = 0.0;
    for frame_idx in 0..total_frames {
        let end = ((frame_idx + 1) as f64 * sample_rate as f64 / cli.fps as f64) as usize;
        playhead.set(end.min(total_samples));

        let timestamp = frame_idx as f64 * 1000.0 / cli.fps as f64;
        if !analyzer.on_animation_frame(timestamp) {
            anyhow::bail!("Draw loop stopped at frame {}", frame_idx);
        }
        peak_energy = peak_energy.max(analyzer.peak_energy());

        encoder.write_pixmap(analyzer.canvas())?;
        pb.set_position(frame_idx as u64 + 1);
    }
    analyzer.toggle_analyzer(Some(false));

    pb.finish_with_message("Rendering complete");
    log::info!("Peak energy: {:.3}", peak_energy);

    // 6. Finish encoding
    log::info!("Finishing encoding...");
    encoder.finish()?;

    log::info!("Done! Output: {}", cli.output.display());
    Ok(())
}

/// Read a JSON object mapping gradient names to gradient definitions.
fn load_gradient_file(path: &Path) -> Result<Vec<(String, GradientOptions)>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read gradients: {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    let entries = value
        .as_object()
        .with_context(|| format!("{} must contain a JSON object", path.display()))?;

    let mut gradients = Vec::with_capacity(entries.len());
    for (name, definition) in entries {
        let options = GradientOptions::from_json(definition)
            .with_context(|| format!("Invalid gradient '{}' in {}", name, path.display()))?;
        gradients.push((name.clone(), options));
    }
    log::info!("Loaded {} gradients from {}", gradients.len(), path.display());
    Ok(gradients)
}
