use serde::{Serialize, Serializer};
use std::fmt;

use super::features::rms;
use crate::config::PitchConfig;

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

const A4_HZ: f32 = 440.0;
/// Pitch class of A, the reference for semitone distances
const A_INDEX: i32 = 9;

/// One of the 12 equal-tempered note identities, 0 = C ... 11 = B.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PitchClass(u8);

impl PitchClass {
    pub const C: PitchClass = PitchClass(0);
    pub const A: PitchClass = PitchClass(9);

    pub fn new(index: usize) -> Option<Self> {
        (index < 12).then_some(PitchClass(index as u8))
    }

    /// Wraps any semitone offset into the octave.
    pub fn from_semitone(semitone: i32) -> Self {
        PitchClass(semitone.rem_euclid(12) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = PitchClass> {
        (0..12u8).map(PitchClass)
    }

    pub fn sharp_name(self) -> &'static str {
        SHARP_NAMES[self.index()]
    }

    pub fn flat_name(self) -> &'static str {
        FLAT_NAMES[self.index()]
    }

    pub fn is_black_key(self) -> bool {
        matches!(self.0, 1 | 3 | 6 | 8 | 10)
    }

    /// Accepts either spelling, e.g. `C#` or `Db`.
    pub fn from_name(name: &str) -> Option<Self> {
        SHARP_NAMES
            .iter()
            .position(|&n| n == name)
            .or_else(|| FLAT_NAMES.iter().position(|&n| n == name))
            .map(|i| PitchClass(i as u8))
    }

    /// Nearest pitch class for a frequency, A4 = 440 Hz.
    pub fn from_frequency(frequency: f32) -> Option<Self> {
        if !frequency.is_finite() || frequency <= 0.0 {
            return None;
        }
        let half_steps = (12.0 * (frequency / A4_HZ).log2()).round() as i32;
        Some(Self::from_semitone(half_steps + A_INDEX))
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sharp_name())
    }
}

/// Detected note of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Note {
    NoPitch,
    Pitch(PitchClass),
}

impl Note {
    pub fn pitch_class(self) -> Option<PitchClass> {
        match self {
            Note::NoPitch => None,
            Note::Pitch(pc) => Some(pc),
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Note::NoPitch => f.write_str("N/A"),
            Note::Pitch(pc) => f.write_str(pc.sharp_name()),
        }
    }
}

impl Serialize for Note {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Frequency 0 means "no pitch".
pub fn frequency_to_note(frequency: f32) -> Note {
    if frequency == 0.0 {
        return Note::NoPitch;
    }
    PitchClass::from_frequency(frequency).map_or(Note::NoPitch, Note::Pitch)
}

/// Time-domain lag search for the fundamental. Stateless apart from its
/// tuning.
#[derive(Clone, Debug, Default)]
pub struct PitchDetector {
    cfg: PitchConfig,
}

impl PitchDetector {
    pub fn new(cfg: PitchConfig) -> Self {
        Self { cfg }
    }

    /// Fundamental in Hz, or 0 when the frame is too quiet, too noisy or the
    /// best lag falls outside the accepted range.
    pub fn detect(&self, samples: &[f32], sample_rate: f32) -> f32 {
        let size = samples.len();
        if size == 0 || !sample_rate.is_finite() || sample_rate <= 0.0 {
            return 0.0;
        }

        let level = rms(samples);
        if level < self.cfg.rms_gate {
            return 0.0;
        }

        let scale = level + self.cfg.normalize_epsilon;
        let normalized: Vec<f32> = samples.iter().map(|s| s / scale).collect();

        // Lags and comparison window stay inside the first half of the frame.
        // Below max_frequency Hz of sample rate the search starts at lag 0,
        // which always wins and maps to an infinite, rejected frequency.
        let half = (size + 1) / 2;
        let min_offset = (sample_rate / self.cfg.max_frequency).floor() as usize;
        let max_offset = ((sample_rate / self.cfg.min_frequency).floor() as usize).min(half);

        let mut best: Option<(usize, f32)> = None;
        for offset in min_offset..max_offset {
            let sum_sq: f32 = normalized[..half]
                .iter()
                .zip(&normalized[offset..offset + half])
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            let correlation = 1.0 - (sum_sq / half as f32).sqrt();

            if correlation > best.map_or(0.0, |(_, c)| c) {
                best = Some((offset, correlation));
            }
        }

        let Some((offset, correlation)) = best else {
            return 0.0;
        };
        if correlation <= self.cfg.clarity_threshold {
            return 0.0;
        }

        let frequency = sample_rate / offset as f32;
        if frequency >= self.cfg.min_frequency && frequency <= self.cfg.max_frequency {
            log::trace!("pitch {:.1} Hz (lag {}, score {:.3})", frequency, offset, correlation);
            frequency
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, amplitude: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn names_round_trip_both_spellings() {
        for pc in PitchClass::all() {
            assert_eq!(PitchClass::from_name(pc.sharp_name()), Some(pc));
            assert_eq!(PitchClass::from_name(pc.flat_name()), Some(pc));
        }
        assert_eq!(PitchClass::from_name("H"), None);
        assert_eq!(PitchClass::from_name("c"), None);
    }

    #[test]
    fn a440_is_a() {
        assert_eq!(frequency_to_note(440.0), Note::Pitch(PitchClass::A));
        assert_eq!(frequency_to_note(440.0).to_string(), "A");
    }

    #[test]
    fn octaves_share_pitch_class() {
        assert_eq!(frequency_to_note(220.0), frequency_to_note(880.0));
        assert_eq!(frequency_to_note(110.0).to_string(), "A");
    }

    #[test]
    fn notes_below_a4_wrap_correctly() {
        assert_eq!(frequency_to_note(261.63).to_string(), "C");
        assert_eq!(frequency_to_note(277.18).to_string(), "C#");
        assert_eq!(frequency_to_note(392.0).to_string(), "G");
        assert_eq!(frequency_to_note(493.88).to_string(), "B");
        // slightly sharp still rounds to A
        assert_eq!(frequency_to_note(446.0).to_string(), "A");
    }

    #[test]
    fn zero_frequency_is_no_pitch() {
        assert_eq!(frequency_to_note(0.0), Note::NoPitch);
        assert_eq!(Note::NoPitch.to_string(), "N/A");
    }

    #[test]
    fn detects_a440_sine() {
        let detector = PitchDetector::default();
        let samples = sine(440.0, 0.5, 48000.0, 2048);
        let freq = detector.detect(&samples, 48000.0);
        assert!(freq > 0.0);
        assert_eq!(frequency_to_note(freq).to_string(), "A");
        assert!((freq - 440.0).abs() < 5.0, "got {}", freq);
    }

    #[test]
    fn detects_low_e_sine() {
        let detector = PitchDetector::default();
        let samples = sine(82.41, 0.5, 44100.0, 4096);
        let freq = detector.detect(&samples, 44100.0);
        assert_eq!(frequency_to_note(freq).to_string(), "E");
    }

    #[test]
    fn lag_search_can_settle_on_subharmonic() {
        // 9 periods of 440 Hz land within 0.04 samples of lag 902, closer
        // than any shorter multiple, so the strict maximum picks it
        let detector = PitchDetector::default();
        let samples = sine(440.0, 0.5, 44100.0, 2048);
        let freq = detector.detect(&samples, 44100.0);
        assert!((freq - 44100.0 / 902.0).abs() < 0.01, "got {}", freq);
    }

    #[test]
    fn quiet_frame_has_no_pitch() {
        let detector = PitchDetector::default();
        let samples = sine(440.0, 0.01, 44100.0, 2048);
        assert_eq!(detector.detect(&samples, 44100.0), 0.0);
        assert_eq!(detector.detect(&vec![0.0; 2048], 44100.0), 0.0);
    }

    #[test]
    fn high_pitch_never_reports_out_of_range() {
        let detector = PitchDetector::default();
        // 3 kHz: lags that fit its period are shorter than the minimum lag
        let samples = sine(3000.0, 0.5, 44100.0, 2048);
        let freq = detector.detect(&samples, 44100.0);
        assert!(freq == 0.0 || (freq <= 1200.0 && freq >= 40.0));
    }

    #[test]
    fn very_low_sample_rate_has_no_pitch() {
        let detector = PitchDetector::default();
        let samples = sine(100.0, 0.5, 800.0, 256);
        assert_eq!(detector.detect(&samples, 800.0), 0.0);
        assert_eq!(frequency_to_note(detector.detect(&samples, 800.0)), Note::NoPitch);
    }

    #[test]
    fn empty_or_tiny_frames_are_safe() {
        let detector = PitchDetector::default();
        assert_eq!(detector.detect(&[], 44100.0), 0.0);
        assert_eq!(detector.detect(&[0.5, -0.5], 44100.0), 0.0);
    }
}
