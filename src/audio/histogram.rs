use super::pitch::PitchClass;
use crate::config::HistogramConfig;

/// Recency-weighted pitch-class evidence. Every accepted detection decays
/// the whole profile before adding its own weight, so classes that stop
/// sounding fade toward zero.
#[derive(Clone, Debug)]
pub struct PitchClassAccumulator {
    cfg: HistogramConfig,
    histogram: [f32; 12],
    weights: [f32; 12],
    update_count: u32,
}

impl Default for PitchClassAccumulator {
    fn default() -> Self {
        Self::new(HistogramConfig::default())
    }
}

impl PitchClassAccumulator {
    pub fn new(cfg: HistogramConfig) -> Self {
        Self {
            cfg,
            histogram: [0.0; 12],
            weights: [0.0; 12],
            update_count: 0,
        }
    }

    pub fn reset(&mut self) {
        self.histogram = [0.0; 12];
        self.weights = [0.0; 12];
        self.update_count = 0;
    }

    pub fn histogram(&self) -> &[f32; 12] {
        &self.histogram
    }

    pub fn weights(&self) -> &[f32; 12] {
        &self.weights
    }

    pub fn update_count(&self) -> u32 {
        self.update_count
    }

    pub fn total(&self) -> f32 {
        self.histogram.iter().sum()
    }

    /// Louder and brighter frames carry more evidence.
    pub fn evidence_weight(&self, loudness_db: f32, spectral_centroid: f32) -> f32 {
        let loudness_weight =
            ((loudness_db - self.cfg.loudness_floor_db) / self.cfg.loudness_span_db).clamp(0.0, 1.0);
        let spectral_weight = (spectral_centroid / self.cfg.centroid_reference_hz)
            .clamp(self.cfg.min_spectral_weight, 1.0);
        loudness_weight * spectral_weight
    }

    pub fn add(&mut self, pitch_class: PitchClass, weight: f32) {
        let weight = weight.max(0.0);
        for (h, w) in self.histogram.iter_mut().zip(self.weights.iter_mut()) {
            *h *= self.cfg.decay;
            *w *= self.cfg.decay;
        }

        let idx = pitch_class.index();
        self.histogram[idx] += weight;
        self.weights[idx] += weight;
        self.update_count += 1;

        if self.update_count > self.cfg.window.saturating_mul(3) {
            self.rescale();
        }
    }

    /// Keeps the profile shape but bounds its magnitude.
    fn rescale(&mut self) {
        let max = self.histogram.iter().copied().fold(0.0f32, f32::max);
        if max <= self.cfg.rescale_ceiling {
            return;
        }
        for (h, w) in self.histogram.iter_mut().zip(self.weights.iter_mut()) {
            *h /= max;
            *w /= max;
        }
        log::debug!(
            "Rescaled pitch-class histogram by {:.2} after {} updates",
            max,
            self.update_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pc(i: usize) -> PitchClass {
        PitchClass::new(i).unwrap()
    }

    #[test]
    fn weight_follows_loudness_and_brightness() {
        let acc = PitchClassAccumulator::default();
        assert_eq!(acc.evidence_weight(0.0, 3000.0), 1.0);
        assert_eq!(acc.evidence_weight(-40.0, 3000.0), 0.0);
        assert_eq!(acc.evidence_weight(-100.0, 3000.0), 0.0);
        // dull spectra still count half
        assert_eq!(acc.evidence_weight(0.0, 0.0), 0.5);
        assert!((acc.evidence_weight(-20.0, 2250.0) - 0.375).abs() < 1e-6);
        assert_eq!(acc.evidence_weight(10.0, 9000.0), 1.0);
    }

    #[test]
    fn add_decays_then_accumulates() {
        let mut acc = PitchClassAccumulator::default();
        acc.add(pc(0), 1.0);
        acc.add(pc(7), 0.5);
        let h = acc.histogram();
        assert!((h[0] - 0.98).abs() < 1e-6);
        assert!((h[7] - 0.5).abs() < 1e-6);
        assert_eq!(acc.update_count(), 2);
        assert_eq!(acc.histogram(), acc.weights());
    }

    #[test]
    fn entries_never_go_negative() {
        let mut acc = PitchClassAccumulator::default();
        for i in 0..500 {
            acc.add(pc(i % 12), if i % 5 == 0 { -1.0 } else { 0.7 });
            assert!(acc.histogram().iter().all(|&v| v >= 0.0));
            assert!(acc.weights().iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn steady_evidence_stays_bounded() {
        let mut acc = PitchClassAccumulator::default();
        for _ in 0..1000 {
            acc.add(pc(9), 1.0);
        }
        // geometric series limit 1 / (1 - 0.98)
        assert!(acc.histogram()[9] <= 50.0 + 1e-3);
        assert_eq!(acc.update_count(), 1000);
    }

    fn eager_config() -> HistogramConfig {
        HistogramConfig {
            decay: 1.0,
            window: 1,
            rescale_ceiling: 2.0,
            ..HistogramConfig::default()
        }
    }

    #[test]
    fn rescale_waits_out_the_first_three_windows() {
        let mut acc = PitchClassAccumulator::new(eager_config());
        acc.add(pc(0), 5.0);
        acc.add(pc(0), 5.0);
        acc.add(pc(0), 5.0);
        assert!((acc.histogram()[0] - 15.0).abs() < 1e-6);
    }

    #[test]
    fn rescale_preserves_shape() {
        let mut acc = PitchClassAccumulator::new(eager_config());
        acc.add(pc(0), 2.0);
        acc.add(pc(4), 1.0);
        acc.add(pc(0), 2.0);
        // fourth update is past 3 * window with max 4 > 2: [4, 2] becomes [1, 0.5]
        acc.add(pc(4), 1.0);
        let h = acc.histogram();
        assert!((h[0] - 1.0).abs() < 1e-6);
        assert!((h[4] - 0.5).abs() < 1e-6);
        assert!(h.iter().all(|&v| v >= 0.0));
        assert_eq!(acc.histogram(), acc.weights());
    }

    #[test]
    fn rescale_checks_every_update_after_the_window() {
        let mut acc = PitchClassAccumulator::new(eager_config());
        for _ in 0..4 {
            acc.add(pc(0), 1.0);
        }
        // [4] was rescaled to [1] on the fourth update
        assert!((acc.histogram()[0] - 1.0).abs() < 1e-6);
        acc.add(pc(7), 4.0);
        let h = acc.histogram();
        assert!((h[7] - 1.0).abs() < 1e-6);
        assert!((h[0] - 0.25).abs() < 1e-6);
        // below the ceiling nothing changes
        acc.add(pc(0), 0.5);
        assert!((acc.histogram()[0] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn reset_clears_everything() {
        let mut acc = PitchClassAccumulator::default();
        acc.add(pc(3), 1.0);
        acc.reset();
        assert_eq!(acc.total(), 0.0);
        assert_eq!(acc.update_count(), 0);
        assert!(acc.weights().iter().all(|&w| w == 0.0));
    }
}
