use anyhow::{bail, Result};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::frame::OwnedFrame;
use crate::config::AnalyserConfig;

/// Produces byte spectra the way a browser `AnalyserNode` does: Blackman
/// window, `|X| / N`, smoothing over time, then dB mapped onto 0..=255.
#[derive(Clone)]
pub struct SpectrumAnalyser {
    cfg: AnalyserConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
}

impl std::fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl SpectrumAnalyser {
    pub fn new(cfg: &AnalyserConfig) -> Result<Self> {
        if cfg.fft_size < 32 || !cfg.fft_size.is_power_of_two() {
            bail!("fft_size must be a power of two >= 32, got {}", cfg.fft_size);
        }
        if !(0.0..=1.0).contains(&cfg.smoothing) {
            bail!("smoothing must be within [0, 1], got {}", cfg.smoothing);
        }
        if cfg.min_decibels >= cfg.max_decibels {
            bail!(
                "min_decibels ({}) must be below max_decibels ({})",
                cfg.min_decibels,
                cfg.max_decibels
            );
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(cfg.fft_size);

        Ok(Self {
            cfg: cfg.clone(),
            fft,
            window: blackman_window(cfg.fft_size),
            smoothed: vec![0.0; cfg.fft_size / 2],
        })
    }

    pub fn fft_size(&self) -> usize {
        self.cfg.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.cfg.fft_size / 2
    }

    /// Forget the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Unsmoothed linear magnitudes of the most recent `fft_size` samples.
    /// Shorter input is zero-padded at the front.
    pub fn magnitudes(&self, samples: &[f32]) -> Vec<f32> {
        let n = self.cfg.fft_size;
        let recent = &samples[samples.len().saturating_sub(n)..];
        let offset = n - recent.len();

        let mut buffer = vec![Complex::new(0.0f32, 0.0); n];
        for (i, &s) in recent.iter().enumerate() {
            buffer[offset + i] = Complex::new(s * self.window[offset + i], 0.0);
        }
        self.fft.process(&mut buffer);

        let scale = 1.0 / n as f32;
        buffer[..n / 2].iter().map(|c| c.norm() * scale).collect()
    }

    /// Blend raw magnitudes into the running spectrum and return it as bytes.
    pub fn smooth(&mut self, raw: &[f32]) -> Vec<u8> {
        let tau = self.cfg.smoothing;
        for (prev, &m) in self.smoothed.iter_mut().zip(raw) {
            let value = tau * *prev + (1.0 - tau) * m;
            *prev = if value.is_finite() { value } else { 0.0 };
        }
        self.smoothed
            .iter()
            .map(|&m| to_byte(m, self.cfg.min_decibels, self.cfg.max_decibels))
            .collect()
    }

    /// One full analyser tick over the tail of `samples`.
    pub fn analyse(&mut self, samples: &[f32], sample_rate: f32) -> OwnedFrame {
        let raw = self.magnitudes(samples);
        let magnitudes = self.smooth(&raw);
        OwnedFrame {
            magnitudes,
            samples: time_domain(samples, self.cfg.fft_size, self.bin_count()),
            sample_rate,
        }
    }
}

/// Time-domain read into a `len`-sample buffer, as an analyser node does
/// it: take the most recent `window` samples (zero-padded at the front when
/// the input is short) and keep the first `len` of them.
pub fn time_domain(samples: &[f32], window: usize, len: usize) -> Vec<f32> {
    let recent = &samples[samples.len().saturating_sub(window)..];
    let mut out = vec![0.0f32; window - recent.len()];
    out.extend_from_slice(recent);
    out.truncate(len);
    out
}

fn to_byte(magnitude: f32, min_db: f32, max_db: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 / (max_db - min_db) * (db - min_db);
    scaled.clamp(0.0, 255.0) as u8
}

pub fn blackman_window(size: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    (0..size)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            A0 - A1 * x.cos() + A2 * (2.0 * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    fn analyser() -> SpectrumAnalyser {
        SpectrumAnalyser::new(&AnalyserConfig::default()).unwrap()
    }

    #[test]
    fn window_shape() {
        let w = blackman_window(4096);
        assert!(w[0].abs() < 1e-6);
        assert!((w[2048] - 1.0).abs() < 1e-5);
        assert!(w.iter().all(|&v| v > -1e-6 && v <= 1.0 + 1e-6));
    }

    #[test]
    fn peak_bin_matches_tone() {
        let a = analyser();
        let mags = a.magnitudes(&sine(440.0, 44100.0, 4096));
        assert_eq!(mags.len(), 2048);
        let peak = (0..mags.len())
            .max_by(|&x, &y| mags[x].partial_cmp(&mags[y]).unwrap())
            .unwrap();
        // 440 * 4096 / 44100 = 40.9
        assert_eq!(peak, 41);
    }

    #[test]
    fn silence_maps_to_zero_bytes() {
        let mut a = analyser();
        let frame = a.analyse(&vec![0.0; 4096], 44100.0);
        assert_eq!(frame.magnitudes.len(), 2048);
        assert!(frame.magnitudes.iter().all(|&b| b == 0));
        assert_eq!(frame.samples.len(), 2048);
    }

    #[test]
    fn smoothing_approaches_steady_state() {
        let mut a = analyser();
        let raw = vec![0.01f32; 2048];
        let first = a.smooth(&raw);
        for _ in 0..50 {
            a.smooth(&raw);
        }
        let settled = a.smooth(&raw);
        assert!(first[0] < settled[0]);
        // 0.01 is -40 dB: 255 / 70 * 60 = 218.6
        assert_eq!(settled[0], 218);

        a.reset();
        assert_eq!(a.smooth(&raw), first);
    }

    #[test]
    fn short_input_is_front_padded() {
        assert_eq!(time_domain(&[1.0, 2.0], 4, 4), vec![0.0, 0.0, 1.0, 2.0]);
        assert_eq!(time_domain(&[1.0, 2.0], 4, 2), vec![0.0, 0.0]);
        assert_eq!(analyser().magnitudes(&[0.5; 10]).len(), 2048);
    }

    #[test]
    fn time_domain_keeps_oldest_half_of_window() {
        let samples: Vec<f32> = (1..=6).map(|i| i as f32).collect();
        // window is [3, 4, 5, 6]; a 2-sample read drops the newest two
        assert_eq!(time_domain(&samples, 4, 2), vec![3.0, 4.0]);

        let mut a = analyser();
        let ramp: Vec<f32> = (0..5000).map(|i| i as f32 / 5000.0).collect();
        let frame = a.analyse(&ramp, 44100.0);
        assert_eq!(frame.samples.len(), 2048);
        assert_eq!(frame.samples[0], ramp[5000 - 4096]);
        assert_eq!(frame.samples[2047], ramp[5000 - 4096 + 2047]);
    }

    #[test]
    fn rejects_bad_config() {
        let bad_size = AnalyserConfig {
            fft_size: 1000,
            ..AnalyserConfig::default()
        };
        assert!(SpectrumAnalyser::new(&bad_size).is_err());
        let bad_smoothing = AnalyserConfig {
            smoothing: 1.5,
            ..AnalyserConfig::default()
        };
        assert!(SpectrumAnalyser::new(&bad_smoothing).is_err());
        let bad_range = AnalyserConfig {
            min_decibels: -20.0,
            max_decibels: -30.0,
            ..AnalyserConfig::default()
        };
        assert!(SpectrumAnalyser::new(&bad_range).is_err());
    }
}
