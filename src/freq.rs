//! Frequency axis math shared by the bar planner and the scale labels.
//!
//! The X axis is logarithmic: a frequency's pixel column is proportional to
//! `log10(freq)` between the low and high ends of the visible window.

use crate::error::{EngineError, Result};

/// Lowest frequency accepted anywhere on the axis.
pub const MIN_FREQUENCY: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rounding {
    Floor,
    Round,
    Ceil,
}

/// Frequency in hertz represented by an FFT bin.
pub fn bin_to_freq(bin: usize, sample_rate: u32, fft_size: usize) -> f64 {
    bin as f64 * sample_rate as f64 / fft_size as f64
}

/// FFT bin that best represents `freq`, clamped to `[0, fft_size / 2 - 1]`.
pub fn freq_to_bin(freq: f64, sample_rate: u32, fft_size: usize, rounding: Rounding) -> usize {
    let bin_count = (fft_size / 2).max(1);
    let exact = freq * fft_size as f64 / sample_rate as f64;
    let bin = match rounding {
        Rounding::Floor => exact.floor(),
        Rounding::Round => exact.round(),
        Rounding::Ceil => exact.ceil(),
    };
    if bin <= 0.0 {
        0
    } else {
        (bin as usize).min(bin_count - 1)
    }
}

/// Raw log mapping, `width * (log10(f) - log10(min)) / (log10(max) - log10(min))`.
pub fn freq_to_x(freq: f64, min_freq: f64, max_freq: f64, width: f64) -> f64 {
    width * (freq.log10() - min_freq.log10()) / (max_freq.log10() - min_freq.log10())
}

pub fn check_frequency(freq: f64) -> Result<()> {
    // NaN fails the comparison and is rejected along with values below 1 Hz
    if freq >= MIN_FREQUENCY {
        Ok(())
    } else {
        Err(EngineError::FrequencyTooLow(freq))
    }
}

/// A validated log-frequency window mapped onto `width` pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LogAxis {
    min_log: f64,
    band_width: f64,
}

impl LogAxis {
    pub fn new(min_freq: f64, max_freq: f64, width: f64) -> Result<Self> {
        check_frequency(min_freq)?;
        check_frequency(max_freq)?;
        if min_freq >= max_freq {
            return Err(EngineError::EmptyFrequencyRange { min: min_freq, max: max_freq });
        }
        let min_log = min_freq.log10();
        Ok(Self {
            min_log,
            band_width: width / (max_freq.log10() - min_log),
        })
    }

    /// Pixels per decade.
    pub fn band_width(&self) -> f64 {
        self.band_width
    }

    pub fn min_log(&self) -> f64 {
        self.min_log
    }

    pub fn x(&self, freq: f64) -> f64 {
        self.band_width * (freq.log10() - self.min_log)
    }

    pub fn freq(&self, x: f64) -> f64 {
        10f64.powf(x / self.band_width + self.min_log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_mapping_is_monotonic() {
        let axis = LogAxis::new(20.0, 22000.0, 1920.0).unwrap();
        let mut last = f64::NEG_INFINITY;
        let mut f = 20.0;
        while f <= 22000.0 {
            let x = axis.x(f);
            assert!(x > last, "x({f}) = {x} not above {last}");
            last = x;
            f *= 1.01;
        }
    }

    #[test]
    fn axis_ends_map_to_canvas_edges() {
        let axis = LogAxis::new(20.0, 22000.0, 1000.0).unwrap();
        assert!(axis.x(20.0).abs() < 1e-9);
        assert!((axis.x(22000.0) - 1000.0).abs() < 1e-9);
        assert!((axis.freq(axis.x(440.0)) - 440.0).abs() < 1e-6);
        assert!((freq_to_x(440.0, 20.0, 22000.0, 1000.0) - axis.x(440.0)).abs() < 1e-9);
    }

    #[test]
    fn bin_round_trip() {
        for &(sr, fft) in &[(44100u32, 8192usize), (48000, 2048), (22050, 32)] {
            for b in 0..fft / 2 {
                let f = bin_to_freq(b, sr, fft);
                assert_eq!(freq_to_bin(f, sr, fft, Rounding::Round), b);
            }
        }
    }

    #[test]
    fn bins_clamp_to_last_index() {
        assert_eq!(freq_to_bin(20.0, 44100, 8192, Rounding::Floor), 3);
        assert_eq!(freq_to_bin(22000.0, 44100, 8192, Rounding::Round), 4087);
        assert_eq!(freq_to_bin(30000.0, 44100, 8192, Rounding::Round), 4095);
        assert_eq!(freq_to_bin(0.0, 44100, 8192, Rounding::Ceil), 0);
    }

    #[test]
    fn rejects_sub_hertz_and_empty_windows() {
        assert!(matches!(LogAxis::new(0.5, 1000.0, 100.0), Err(EngineError::FrequencyTooLow(_))));
        assert!(matches!(LogAxis::new(-5.0, 1000.0, 100.0), Err(EngineError::FrequencyTooLow(_))));
        assert!(matches!(
            LogAxis::new(1000.0, 1000.0, 100.0),
            Err(EngineError::EmptyFrequencyRange { .. })
        ));
        assert!(check_frequency(f64::NAN).is_err());
    }
}
