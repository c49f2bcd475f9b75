//! The engine's view of whatever produces per-bin magnitudes.

use crate::error::{EngineError, Result};

pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32768;

pub fn check_fft_size(fft_size: usize) -> Result<()> {
    if fft_size.is_power_of_two() && (MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
        Ok(())
    } else {
        Err(EngineError::InvalidFftSize(fft_size))
    }
}

/// A spectral analyser for one channel.
///
/// `byte_frequency_data` fills `out` with magnitudes mapped linearly from
/// `[min_decibels, max_decibels]` onto `0..=255`. It never fails: a source
/// with nothing new to report repeats its last spectrum.
pub trait SpectralSource {
    fn sample_rate(&self) -> u32;

    fn fft_size(&self) -> usize;

    fn set_fft_size(&mut self, fft_size: usize);

    fn frequency_bin_count(&self) -> usize {
        self.fft_size() / 2
    }

    fn min_decibels(&self) -> f64;

    fn max_decibels(&self) -> f64;

    fn set_decibel_range(&mut self, min: f64, max: f64);

    fn smoothing(&self) -> f64;

    fn set_smoothing(&mut self, smoothing: f64);

    fn byte_frequency_data(&mut self, out: &mut [u8]);
}

/// Source that always reports the same spectrum.
///
/// Useful for hosts that compute spectra elsewhere and push them in with
/// [`StaticSource::set_spectrum`].
#[derive(Clone, Debug)]
pub struct StaticSource {
    sample_rate: u32,
    fft_size: usize,
    min_decibels: f64,
    max_decibels: f64,
    smoothing: f64,
    spectrum: Vec<u8>,
}

impl StaticSource {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            fft_size: 8192,
            min_decibels: -100.0,
            max_decibels: -30.0,
            smoothing: 0.8,
            spectrum: Vec::new(),
        }
    }

    /// Every bin at the same level.
    pub fn flat(sample_rate: u32, level: u8) -> Self {
        let mut source = Self::new(sample_rate);
        source.spectrum = vec![level; source.frequency_bin_count()];
        source
    }

    /// Replace the reported spectrum; shorter input reads as silence above it.
    pub fn set_spectrum(&mut self, spectrum: Vec<u8>) {
        self.spectrum = spectrum;
    }

    pub fn spectrum(&self) -> &[u8] {
        &self.spectrum
    }
}

impl SpectralSource for StaticSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn fft_size(&self) -> usize {
        self.fft_size
    }

    fn set_fft_size(&mut self, fft_size: usize) {
        // a flat spectrum stays flat at the new resolution
        let level = match self.spectrum.first() {
            Some(&first) if self.spectrum.iter().all(|&v| v == first) => Some(first),
            _ => None,
        };
        self.fft_size = fft_size;
        if let Some(level) = level {
            self.spectrum = vec![level; fft_size / 2];
        }
    }

    fn min_decibels(&self) -> f64 {
        self.min_decibels
    }

    fn max_decibels(&self) -> f64 {
        self.max_decibels
    }

    fn set_decibel_range(&mut self, min: f64, max: f64) {
        self.min_decibels = min;
        self.max_decibels = max;
    }

    fn smoothing(&self) -> f64 {
        self.smoothing
    }

    fn set_smoothing(&mut self, smoothing: f64) {
        self.smoothing = smoothing;
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        let n = out.len().min(self.spectrum.len());
        out[..n].copy_from_slice(&self.spectrum[..n]);
        out[n..].fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fft_size_must_be_a_power_of_two_in_range() {
        for ok in [32, 1024, 8192, 32768] {
            assert!(check_fft_size(ok).is_ok());
        }
        for bad in [0, 16, 1000, 65536] {
            assert!(matches!(check_fft_size(bad), Err(EngineError::InvalidFftSize(_))));
        }
    }

    #[test]
    fn static_source_pads_with_silence() {
        let mut source = StaticSource::new(48000);
        source.set_spectrum(vec![9, 8, 7]);
        let mut out = [1u8; 5];
        source.byte_frequency_data(&mut out);
        assert_eq!(out, [9, 8, 7, 0, 0]);
        assert_eq!(source.frequency_bin_count(), 4096);
    }

    #[test]
    fn flat_spectrum_follows_fft_size() {
        let mut source = StaticSource::flat(44100, 200);
        source.set_fft_size(1024);
        assert_eq!(source.spectrum().len(), 512);
        assert!(source.spectrum().iter().all(|&v| v == 200));
    }
}
