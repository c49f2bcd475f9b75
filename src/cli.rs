use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "barscope", about = "Render a spectrum analyzer video from an audio file")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Output video file
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    /// Config file (defaults to barscope.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Video width in pixels
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Video height in pixels
    #[arg(long, default_value_t = 540)]
    pub height: u32,

    /// Frames per second
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// H.264 CRF quality (0-51, lower = better). Ignored when --bitrate is set.
    #[arg(long, default_value_t = 18)]
    pub crf: u32,

    /// Video bitrate (e.g. 2400k, 5M). When set, uses -b:v instead of -crf.
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// Visualization mode: 0 discrete, 1-8 octave bands, 10 area graph
    #[arg(short, long)]
    pub mode: Option<u8>,

    /// Gradient name
    #[arg(short, long)]
    pub gradient: Option<String>,

    /// Extra gradients as a JSON object of name -> { bgColor, dir, colorStops }
    #[arg(long)]
    pub gradients: Option<PathBuf>,

    /// Separate left and right channel graphs
    #[arg(long)]
    pub stereo: bool,

    /// Circular layout
    #[arg(long)]
    pub radial: bool,

    /// LED-style bars (octave band modes only)
    #[arg(long)]
    pub leds: bool,

    /// Reflection height as a fraction of the canvas (0 to <1)
    #[arg(long)]
    pub reflex: Option<f64>,

    /// Title text drawn over the top-left corner
    #[arg(long)]
    pub title: Option<String>,

    /// Show the FPS counter
    #[arg(long)]
    pub show_fps: bool,

    /// List available gradients and exit
    #[arg(long)]
    pub list_gradients: bool,

    /// FFmpeg video codec
    #[arg(long, default_value = "libx264")]
    pub codec: String,

    /// FFmpeg pixel format
    #[arg(long, default_value = "yuv420p")]
    pub pix_fmt: String,
}

impl Cli {
    /// Analyzer options given on the command line.
    pub fn options_update(&self) -> barscope::OptionsUpdate {
        barscope::OptionsUpdate {
            mode: self.mode,
            gradient: self.gradient.clone(),
            stereo: self.stereo.then_some(true),
            radial: self.radial.then_some(true),
            show_leds: self.leds.then_some(true),
            reflex_ratio: self.reflex,
            show_fps: self.show_fps.then_some(true),
            ..Default::default()
        }
    }
}
