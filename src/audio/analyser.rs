use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::cell::Cell;
use std::f32::consts::PI;
use std::rc::Rc;
use std::sync::Arc;

use barscope::SpectralSource;

/// Sample position shared by every channel source; the render loop moves it
/// forward once per video frame.
pub type Playhead = Rc<Cell<usize>>;

/// FFT analyser over decoded PCM, behaving like a browser `AnalyserNode`:
/// Blackman window over the `fft_size` samples before the playhead,
/// magnitude `|X| / N`, exponential smoothing over time, then decibels mapped
/// linearly onto `0..=255`.
pub struct FftSource {
    samples: Rc<[f32]>,
    playhead: Playhead,
    sample_rate: u32,
    fft_size: usize,
    min_decibels: f64,
    max_decibels: f64,
    smoothing: f64,
    planner: FftPlanner<f32>,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl FftSource {
    pub fn new(samples: Rc<[f32]>, playhead: Playhead, sample_rate: u32) -> Self {
        let fft_size = 2048;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        Self {
            samples,
            playhead,
            sample_rate,
            fft_size,
            min_decibels: -100.0,
            max_decibels: -30.0,
            smoothing: 0.8,
            planner,
            fft,
            window: blackman_window(fft_size),
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; fft_size / 2],
        }
    }

    fn analyse(&mut self) {
        let n = self.fft_size;
        let end = self.playhead.get().min(self.samples.len());
        let start = end as isize - n as isize;

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let idx = start + i as isize;
            let sample = if idx >= 0 { self.samples[idx as usize] } else { 0.0 };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let tau = self.smoothing as f32;
        let scale = 1.0 / n as f32;
        for (k, value) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.buffer[k].norm() * scale;
            *value = tau * *value + (1.0 - tau) * magnitude;
        }
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    (0..size)
        .map(|i| {
            let x = i as f32 / size as f32;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}

/// Map a linear magnitude to a byte over the `[min_db, max_db]` window.
fn to_byte(magnitude: f32, min_db: f64, max_db: f64) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * (magnitude as f64).log10();
    let scaled = 255.0 / (max_db - min_db) * (db - min_db);
    scaled.clamp(0.0, 255.0) as u8
}

impl SpectralSource for FftSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn fft_size(&self) -> usize {
        self.fft_size
    }

    fn set_fft_size(&mut self, fft_size: usize) {
        if fft_size == self.fft_size {
            return;
        }
        self.fft_size = fft_size;
        self.fft = self.planner.plan_fft_forward(fft_size);
        self.window = blackman_window(fft_size);
        self.buffer = vec![Complex::new(0.0, 0.0); fft_size];
        self.smoothed = vec![0.0; fft_size / 2];
        log::debug!("FFT source resized to {} points", fft_size);
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
        self.analyse();
        let (min_db, max_db) = (self.min_decibels, self.max_decibels);
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self
                .smoothed
                .get(i)
                .map_or(0, |&magnitude| to_byte(magnitude, min_db, max_db));
        }
    }
}
