//! Segment geometry for the "vintage LED" look of the octave-band modes.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LedLayout {
    pub count: usize,
    pub height: f64,
    /// Vertical gap between segments.
    pub space_v: f64,
    /// Horizontal gap between LED columns.
    pub space_h: f64,
}

impl LedLayout {
    /// Derive the segment layout for an octave-band `mode`.
    ///
    /// `analyzer_height` is the drawable height of one channel in pixels,
    /// excluding any reflection band.
    pub fn compute(mode: u8, analyzer_height: f64, pixel_ratio: f64, bar_width: f64) -> Self {
        let spacing = |max: f64, per: f64| max.min((analyzer_height / (per * pixel_ratio)).trunc());

        let (base_count, space_v) = match mode {
            8 => (24, spacing(16.0, 33.0)),
            7 => (48, spacing(8.0, 67.0)),
            6 => (64, spacing(6.0, 90.0)),
            4 | 5 => (80, spacing(6.0, 90.0)),
            3 => (96, spacing(6.0, 90.0)),
            2 => (128, spacing(4.0, 135.0)),
            _ => (128, spacing(3.0, 180.0).max(2.0)),
        };

        // at least one pixel between segments, scaled for HiDPI
        let space_v = space_v.max(1.0) * pixel_ratio;

        let fits = ((analyzer_height + space_v) / (space_v * 2.0)).trunc().max(1.0) as usize;
        let count = base_count.min(fits);

        let space_h = bar_width
            * match mode {
                1 => 0.45,
                2..=4 => 0.225,
                _ => 0.125,
            };

        Self {
            count,
            height: (analyzer_height + space_v) / count as f64 - space_v,
            space_v,
            space_h,
        }
    }

    /// Pitch of one segment plus its gap.
    pub fn step(&self) -> f64 {
        self.height + self.space_v
    }

    /// Number of lit segments for a normalized (0..=1) magnitude.
    pub fn lit(&self, normalized: f64) -> usize {
        ((normalized * self.count as f64).trunc().max(0.0) as usize).min(self.count)
    }

    /// Pixel height covered by `lit` segments.
    pub fn lit_height(&self, lit: usize) -> f64 {
        (lit as f64 * self.step() - self.space_v).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_fill_the_analyzer_height() {
        for mode in 1..=8 {
            let leds = LedLayout::compute(mode, 720.0, 1.0, 20.0);
            let total = leds.count as f64 * leds.step() - leds.space_v;
            assert!((total - 720.0).abs() < 1e-9, "mode {mode}");
            assert!(leds.height > 0.0);
        }
    }

    #[test]
    fn base_counts_per_mode() {
        let counts: Vec<usize> = (1..=8)
            .map(|mode| LedLayout::compute(mode, 2000.0, 1.0, 10.0).count)
            .collect();
        assert_eq!(counts, vec![128, 128, 96, 80, 80, 64, 48, 24]);
    }

    #[test]
    fn count_is_clamped_on_short_canvases() {
        let leds = LedLayout::compute(1, 100.0, 1.0, 10.0);
        // space_v floors at 2px for mode 1 -> (100 + 2) / 4 = 25 segments
        assert_eq!(leds.space_v, 2.0);
        assert_eq!(leds.count, 25);
    }

    #[test]
    fn spacing_scales_with_pixel_ratio() {
        let one = LedLayout::compute(8, 600.0, 1.0, 100.0);
        let two = LedLayout::compute(8, 1200.0, 2.0, 100.0);
        assert_eq!(two.space_v, one.space_v * 2.0);
        assert_eq!(one.space_h, 12.5);
        assert_eq!(LedLayout::compute(1, 600.0, 1.0, 100.0).space_h, 45.0);
        assert_eq!(LedLayout::compute(3, 600.0, 1.0, 100.0).space_h, 22.5);
    }

    #[test]
    fn quantizes_magnitudes_to_segments() {
        let leds = LedLayout::compute(8, 480.0, 1.0, 50.0);
        assert_eq!(leds.lit(0.0), 0);
        assert_eq!(leds.lit(1.0), leds.count);
        assert_eq!(leds.lit(0.5), leds.count / 2);
        assert_eq!(leds.lit_height(0), 0.0);
        assert!((leds.lit_height(leds.count) - 480.0).abs() < 1e-9);
    }
}
