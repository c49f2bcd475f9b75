//! Bar layout planning.
//!
//! Turns the visualization mode, frequency window, FFT resolution and canvas
//! width into an ordered list of [`BarDescriptor`]s, one per visual column.
//! The list is rebuilt from scratch (peaks reset) whenever any of those inputs
//! change, and is read-only while a frame renders.

use crate::error::{EngineError, Result};
use crate::freq::{bin_to_freq, check_frequency, freq_to_bin, LogAxis, Rounding};
use crate::peaks::PeakState;

/// Modes 0 (discrete bins) and 10 (line / area) plot raw bins; 1..=8 are octave bands.
pub const LINE_MODE: u8 = 10;

/// C0 in the 24-tone equal tempered scale tuned to A4 = 440 Hz (~16.35 Hz).
fn c0() -> f64 {
    440.0 * 2f64.powf(-114.0 / 24.0)
}

pub fn check_mode(mode: u8) -> Result<()> {
    if mode <= 8 || mode == LINE_MODE {
        Ok(())
    } else {
        Err(EngineError::InvalidMode(mode))
    }
}

pub fn is_octave_bands(mode: u8) -> bool {
    mode % 10 != 0
}

/// Quarter-tones grouped into each band for an octave-band mode.
pub fn group_notes(mode: u8) -> usize {
    match mode {
        8 => 24,
        7 => 12,
        6 => 8,
        5 => 6,
        m => m.max(1) as usize,
    }
}

/// Frequencies of the tempered scale kept for a mode, ascending, within `[min, max]`.
pub fn tempered_scale(group_notes: usize, min_freq: f64, max_freq: f64) -> Vec<f64> {
    let root24 = 2f64.powf(1.0 / 24.0);
    let c0 = c0();
    let mut table = Vec::new();
    let mut i: i32 = 0;
    loop {
        let freq = c0 * root24.powi(i);
        if freq > max_freq {
            break;
        }
        if freq >= min_freq && i as usize % group_notes == 0 {
            table.push(freq);
        }
        i += 1;
    }
    table
}

#[derive(Clone, Debug, PartialEq)]
pub struct BarDescriptor {
    /// Left edge in pixels; may be fractional or negative (below the window).
    pub pos_x: f64,
    pub data_start: usize,
    /// Inclusive; equal to `data_start` for a single-bin bar.
    pub data_end: usize,
    /// Interpolation weight toward `data_start + 1` for bars sharing one bin.
    pub blend: f64,
    pub peaks: [PeakState; 2],
}

impl BarDescriptor {
    fn new(pos_x: f64, data_start: usize, data_end: usize) -> Self {
        Self {
            pos_x,
            data_start,
            data_end,
            blend: 0.0,
            peaks: [PeakState::default(); 2],
        }
    }

    pub fn is_single_bin(&self) -> bool {
        self.data_end <= self.data_start
    }

    /// Raw magnitude (0..=255) this bar shows for one channel's byte spectrum.
    pub fn magnitude(&self, data: &[u8]) -> f64 {
        if self.is_single_bin() {
            let value = data.get(self.data_start).copied().unwrap_or(0) as f64;
            if self.blend > 0.0 {
                let next = data.get(self.data_start + 1).map_or(value, |&v| v as f64);
                value + (next - value) * self.blend
            } else {
                value
            }
        } else {
            let end = self.data_end.min(data.len().saturating_sub(1));
            data.get(self.data_start..=end)
                .and_then(|range| range.iter().max())
                .copied()
                .unwrap_or(0) as f64
        }
    }
}

/// Inputs to the planner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutParams {
    pub mode: u8,
    pub min_freq: f64,
    pub max_freq: f64,
    pub sample_rate: u32,
    pub fft_size: usize,
    pub width: f64,
}

#[derive(Clone, Debug)]
pub struct BarLayout {
    pub bars: Vec<BarDescriptor>,
    /// 1 in discrete modes, canvas width / band count in octave modes.
    pub bar_width: f64,
    /// Axis used by the scale labels so they line up with the bars.
    pub axis: LogAxis,
}

pub fn plan(params: &LayoutParams) -> Result<BarLayout> {
    check_mode(params.mode)?;
    check_frequency(params.min_freq)?;
    check_frequency(params.max_freq)?;
    if params.min_freq >= params.max_freq {
        return Err(EngineError::EmptyFrequencyRange {
            min: params.min_freq,
            max: params.max_freq,
        });
    }

    let layout = if is_octave_bands(params.mode) {
        plan_octave_bands(params)?
    } else {
        plan_discrete(params)?
    };

    if layout.bars.is_empty() {
        return Err(EngineError::NoBandsInRange {
            min: params.min_freq,
            max: params.max_freq,
        });
    }
    Ok(layout)
}

/// One bar per distinct (rounded) pixel column; bins landing on an occupied
/// column widen that bar's range instead.
fn plan_discrete(params: &LayoutParams) -> Result<BarLayout> {
    let axis = LogAxis::new(params.min_freq, params.max_freq, params.width)?;
    let (sr, fft) = (params.sample_rate, params.fft_size);

    // bin 0 (DC) has no place on a log axis
    let min_index = freq_to_bin(params.min_freq, sr, fft, Rounding::Floor).max(1);
    let max_index = freq_to_bin(params.max_freq, sr, fft, Rounding::Round);

    let mut bars: Vec<BarDescriptor> = Vec::new();
    for i in min_index..=max_index {
        let pos = axis.x(bin_to_freq(i, sr, fft)).round();
        match bars.last_mut() {
            Some(bar) if bar.pos_x == pos => bar.data_end = i,
            _ => bars.push(BarDescriptor::new(pos, i, i)),
        }
    }

    Ok(BarLayout {
        bars,
        bar_width: 1.0,
        axis,
    })
}

fn plan_octave_bands(params: &LayoutParams) -> Result<BarLayout> {
    let (sr, fft) = (params.sample_rate, params.fft_size);
    let table = tempered_scale(group_notes(params.mode), params.min_freq, params.max_freq);
    if table.is_empty() {
        return Err(EngineError::NoBandsInRange {
            min: params.min_freq,
            max: params.max_freq,
        });
    }

    let axis = match (table.first(), table.last()) {
        (Some(&first), Some(&last)) if last > first => LogAxis::new(first, last, params.width)?,
        _ => LogAxis::new(params.min_freq, params.max_freq, params.width)?,
    };
    let bar_width = params.width / table.len() as f64;

    let mut bars: Vec<BarDescriptor> = Vec::with_capacity(table.len());
    let mut prev_bin = 0usize; // last bin taken by the previous band
    let mut prev_idx: Option<usize> = None;
    let mut sharing = 0usize; // bars reading the same bin

    for (index, &freq) in table.iter().enumerate() {
        let bin = freq_to_bin(freq, sr, fft, Rounding::Round);

        let idx = if prev_bin > 0 && prev_bin < bin { prev_bin + 1 } else { bin };

        if prev_idx == Some(idx) {
            sharing += 1;
        } else {
            blend_shared(&mut bars, sharing);
            prev_idx = Some(idx);
            sharing = 1;
        }

        prev_bin = bin;
        if let Some(&next_freq) = table.get(index + 1) {
            let next_bin = freq_to_bin(next_freq, sr, fft, Rounding::Round);
            // half the bins up to the next band belong to this one
            if next_bin > bin + 1 {
                prev_bin += ((next_bin - bin) as f64 / 2.0).round() as usize;
            }
        }

        let end = prev_bin.max(idx);
        bars.push(BarDescriptor::new(index as f64 * bar_width, idx, end));
    }
    blend_shared(&mut bars, sharing);

    Ok(BarLayout {
        bars,
        bar_width,
        axis,
    })
}

/// Spread the last `count` bars, which all read one bin, across that bin and the next.
fn blend_shared(bars: &mut [BarDescriptor], count: usize) {
    if count < 2 {
        return;
    }
    let len = bars.len();
    for i in 1..=count {
        bars[len - i].blend = (count - i) as f64 / count as f64;
    }
}
