//! Bar-geometry and rendering engine for a real-time audio spectrum analyzer.
//!
//! The engine pulls byte magnitudes from one or two [`SpectralSource`]s,
//! maps them onto a log-frequency layout of bars, LEDs or a filled line and
//! paints the result onto a `tiny_skia::Pixmap`. Frames are paced by the host
//! through a [`FrameScheduler`].

pub mod analyzer;
pub mod color;
pub mod error;
pub mod freq;
pub mod gradient;
pub mod labels;
pub mod layout;
pub mod leds;
pub mod options;
pub mod peaks;
pub mod schedule;
pub mod source;
pub mod text;

pub use analyzer::{Analyzer, HostSurface, Internals, ResizeReason, VERSION};
pub use error::{EngineError, Result};
pub use gradient::{ColorStopOptions, GradientOptions};
pub use layout::BarDescriptor;
pub use leds::LedLayout;
pub use options::{Options, OptionsUpdate};
pub use schedule::{FrameHandle, FrameScheduler, ManualScheduler};
pub use source::{SpectralSource, StaticSource};
