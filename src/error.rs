use thiserror::Error;

/// Errors raised synchronously by configuration changes on the engine.
///
/// Every rejection leaves the engine exactly as it was before the call.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid mode: {0}")]
    InvalidMode(u8),

    #[error("frequency values must be >= 1 (got {0})")]
    FrequencyTooLow(f64),

    #[error("frequency range is empty: {min} Hz to {max} Hz")]
    EmptyFrequencyRange { min: f64, max: f64 },

    #[error("no octave bands between {min} Hz and {max} Hz")]
    NoBandsInRange { min: f64, max: f64 },

    #[error("unknown gradient: '{0}'")]
    UnknownGradient(String),

    #[error("gradient name must be a non-empty string")]
    InvalidGradientName,

    #[error("gradient options must be an object")]
    GradientNotAnObject,

    #[error("gradient must define at least two colors")]
    MissingColor,

    #[error("invalid color: '{0}'")]
    InvalidColor(String),

    #[error("invalid gradient options: {0}")]
    InvalidGradientOptions(String),

    #[error("reflex ratio must be >= 0 and < 1 (got {0})")]
    ReflexOutOfRange(f64),

    #[error("FFT size must be a power of two between 32 and 32768 (got {0})")]
    InvalidFftSize(usize),

    #[error("smoothing must be between 0 and 1 (got {0})")]
    InvalidSmoothing(f64),

    #[error("minimum decibels must be lower than maximum decibels ({min} >= {max})")]
    InvalidSensitivity { min: f64, max: f64 },

    #[error("audio source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("font error: {0}")]
    Font(String),

    #[error("failed to allocate a {width}x{height} pixmap")]
    Pixmap { width: u32, height: u32 },
}

impl EngineError {
    /// Stable error code, suitable for matching across versions.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidMode(_) => "ERR_INVALID_MODE",
            EngineError::FrequencyTooLow(_) => "ERR_FREQUENCY_TOO_LOW",
            EngineError::EmptyFrequencyRange { .. } => "ERR_FREQUENCY_RANGE_EMPTY",
            EngineError::NoBandsInRange { .. } => "ERR_NO_BANDS_IN_RANGE",
            EngineError::UnknownGradient(_) => "ERR_UNKNOWN_GRADIENT",
            EngineError::InvalidGradientName => "ERR_GRADIENT_INVALID_NAME",
            EngineError::GradientNotAnObject => "ERR_GRADIENT_NOT_AN_OBJECT",
            EngineError::MissingColor => "ERR_GRADIENT_MISSING_COLOR",
            EngineError::InvalidColor(_) => "ERR_GRADIENT_INVALID_COLOR",
            EngineError::InvalidGradientOptions(_) => "ERR_GRADIENT_INVALID_OPTIONS",
            EngineError::ReflexOutOfRange(_) => "ERR_REFLEX_OUT_OF_RANGE",
            EngineError::InvalidFftSize(_) => "ERR_INVALID_FFT_SIZE",
            EngineError::InvalidSmoothing(_) => "ERR_INVALID_SMOOTHING",
            EngineError::InvalidSensitivity { .. } => "ERR_INVALID_SENSITIVITY",
            EngineError::SourceUnavailable(_) => "ERR_AUDIO_SOURCE_FAIL",
            EngineError::Font(_) => "ERR_FONT",
            EngineError::Pixmap { .. } => "ERR_PIXMAP",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
