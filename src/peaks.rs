//! Per-bar peak indicators and the global energy meter.

/// Frames a peak is held before it starts to fall (0.5 s at 60 fps).
pub const PEAK_HOLD_FRAMES: u32 = 30;

/// Peak indicator for one bar on one channel.
///
/// Rising: a height at or above the peak moves the peak up and re-arms the
/// hold. Holding: `hold` counts down once per frame. Falling: `accel` grows by
/// one every frame and is subtracted from the peak, so it drops 1, 2, 3 ...
/// pixels per frame until it reaches zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PeakState {
    pub value: f64,
    pub hold: u32,
    pub accel: u32,
}

impl PeakState {
    /// Feed this frame's bar height. Returns true when the peak was raised.
    pub fn observe(&mut self, height: f64) -> bool {
        if height >= self.value {
            self.value = height;
            self.hold = PEAK_HOLD_FRAMES;
            self.accel = 0;
            true
        } else {
            false
        }
    }

    /// Step hold/decay once; called after the peak was drawn for this frame.
    pub fn advance(&mut self) {
        if self.value <= 0.0 {
            return;
        }
        if self.hold > 0 {
            self.hold -= 1;
        } else {
            self.accel += 1;
            self.value = (self.value - self.accel as f64).max(0.0);
        }
    }

    pub fn is_visible(&self) -> bool {
        self.value > 0.0
    }
}

/// Global loudness proxy, averaged over every bar of every active channel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EnergyState {
    pub instant: f64,
    pub peak: f64,
    // goes negative while the peak decays; -30 means fully decayed
    pub hold: i32,
}

impl EnergyState {
    pub fn update(&mut self, instant: f64) {
        self.instant = instant;
        if instant >= self.peak {
            self.peak = instant;
            self.hold = PEAK_HOLD_FRAMES as i32;
        } else if self.hold > 0 {
            self.hold -= 1;
        } else if self.peak > 0.0 {
            self.peak *= (PEAK_HOLD_FRAMES as i32 + self.hold).max(0) as f64 / PEAK_HOLD_FRAMES as f64;
            self.hold -= 1;
        }
    }
}
