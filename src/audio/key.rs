use serde::{Serialize, Serializer};
use std::fmt;

use super::histogram::PitchClassAccumulator;
use super::pitch::PitchClass;
use crate::config::KeyConfig;

// Krumhansl-Kessler probe-tone ratings, tonic first
const MAJOR_PROFILE: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
const MINOR_PROFILE: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    fn profile(self) -> &'static [f32; 12] {
        match self {
            Mode::Major => &MAJOR_PROFILE,
            Mode::Minor => &MINOR_PROFILE,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Key {
    pub tonic: PitchClass,
    pub mode: Mode,
}

impl Key {
    pub fn new(tonic: PitchClass, mode: Mode) -> Self {
        Self { tonic, mode }
    }

    /// Major keys use sharps, minor keys on black keys use flats.
    pub fn tonic_name(&self) -> &'static str {
        match self.mode {
            Mode::Minor if self.tonic.is_black_key() => self.tonic.flat_name(),
            _ => self.tonic.sharp_name(),
        }
    }

    /// Parses `"<note> major"` / `"<note> minor"`, either spelling.
    pub fn parse(label: &str) -> Option<Self> {
        let mut parts = label.split(' ');
        let tonic = PitchClass::from_name(parts.next()?)?;
        let mode = match parts.next()? {
            "major" => Mode::Major,
            "minor" => Mode::Minor,
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self { tonic, mode })
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic_name(), self.mode.as_str())
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Key as shown to the listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyLabel {
    /// Evidence exists but carries no tonal mass ("N/A")
    Undetermined,
    /// Still gathering evidence or waiting on stability ("Detecting...")
    Detecting,
    Key(Key),
}

impl KeyLabel {
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "N/A" => Some(KeyLabel::Undetermined),
            "Detecting..." => Some(KeyLabel::Detecting),
            other => Key::parse(other).map(KeyLabel::Key),
        }
    }

    pub fn key(&self) -> Option<Key> {
        match self {
            KeyLabel::Key(key) => Some(*key),
            _ => None,
        }
    }
}

impl fmt::Display for KeyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyLabel::Undetermined => f.write_str("N/A"),
            KeyLabel::Detecting => f.write_str("Detecting..."),
            KeyLabel::Key(key) => write!(f, "{}", key),
        }
    }
}

impl Serialize for KeyLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Profile correlation of one histogram against all 24 keys.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyScores {
    pub best: Key,
    pub correlation: f32,
    /// Best correlation among every other candidate
    pub second_best: f32,
}

impl KeyScores {
    pub fn confidence(&self) -> f32 {
        self.correlation.clamp(0.0, 1.0)
    }

    pub fn separation(&self) -> f32 {
        self.correlation - self.second_best
    }
}

/// Pearson correlation; 0 when either side has no variance.
pub fn pearson(a: &[f32; 12], b: &[f32; 12]) -> f32 {
    let mean_a = a.iter().sum::<f32>() / 12.0;
    let mean_b = b.iter().sum::<f32>() / 12.0;

    let mut numerator = 0.0f32;
    let mut var_a = 0.0f32;
    let mut var_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        numerator += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denominator = (var_a * var_b).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

/// Profile for `key`, rotated so its tonic weight sits on the tonic's pitch
/// class and normalized to sum 1.
pub fn key_profile(key: Key) -> [f32; 12] {
    let profile = key.mode.profile();
    let sum: f32 = profile.iter().sum();
    let tonic = key.tonic.index();
    let mut rotated = [0.0f32; 12];
    for (i, slot) in rotated.iter_mut().enumerate() {
        *slot = profile[(i + 12 - tonic) % 12] / sum;
    }
    rotated
}

/// Correlates a histogram against every key. Scan order is tonic C..B with
/// major before minor; the first maximum wins ties. `None` for an empty
/// histogram.
pub fn score_keys(histogram: &[f32; 12]) -> Option<KeyScores> {
    let total: f32 = histogram.iter().sum();
    if total.is_nan() || total <= 0.0 {
        return None;
    }
    let mut normalized = [0.0f32; 12];
    for (n, h) in normalized.iter_mut().zip(histogram.iter()) {
        *n = h / total;
    }

    let mut best = Key::new(PitchClass::C, Mode::Major);
    let mut best_correlation = f32::NEG_INFINITY;
    let mut second_best = f32::NEG_INFINITY;

    for tonic in PitchClass::all() {
        for mode in [Mode::Major, Mode::Minor] {
            let key = Key::new(tonic, mode);
            let correlation = pearson(&normalized, &key_profile(key));
            if correlation > best_correlation {
                second_best = best_correlation;
                best_correlation = correlation;
                best = key;
            } else if correlation > second_best {
                second_best = correlation;
            }
        }
    }

    Some(KeyScores {
        best,
        correlation: best_correlation,
        second_best,
    })
}

/// Where the stability gate currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum KeyStability {
    NoEvidence,
    Tentative { candidate: Key, count: u32 },
    Committed { key: Key, confidence: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct CommittedKey {
    key: Key,
    confidence: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct PendingKey {
    key: Key,
    count: u32,
}

/// Hysteresis between raw per-frame key scores and the reported key.
///
/// The count only grows while the best key repeats the committed one. A
/// differing candidate restarts it at 1 and is committed in that same step
/// only when the threshold is 1; at any higher threshold nothing is ever
/// committed and the label stays `Detecting...`.
#[derive(Clone, Debug, Default)]
pub struct KeyTracker {
    cfg: KeyConfig,
    committed: Option<CommittedKey>,
    pending: Option<PendingKey>,
}

impl KeyTracker {
    pub fn new(cfg: KeyConfig) -> Self {
        Self {
            cfg,
            committed: None,
            pending: None,
        }
    }

    pub fn reset(&mut self) {
        self.committed = None;
        self.pending = None;
    }

    pub fn stability_count(&self) -> u32 {
        self.pending.map_or(0, |p| p.count)
    }

    /// Last committed key, whether or not it is currently shown.
    pub fn committed_key(&self) -> Option<Key> {
        self.committed.map(|c| c.key)
    }

    pub fn state(&self) -> KeyStability {
        match (self.pending, self.committed) {
            (Some(p), Some(c)) if p.count >= self.cfg.stability_threshold => {
                KeyStability::Committed {
                    key: c.key,
                    confidence: c.confidence,
                }
            }
            (Some(p), _) => KeyStability::Tentative {
                candidate: p.key,
                count: p.count,
            },
            (None, _) => KeyStability::NoEvidence,
        }
    }

    /// Feed one frame's scores; returns the label and confidence to report.
    pub fn update(&mut self, scores: &KeyScores) -> (KeyLabel, f32) {
        let best = scores.best;
        let confidence = scores.confidence();

        if scores.correlation <= self.cfg.min_confidence {
            self.pending = None;
        } else if self.committed_key() == Some(best) {
            let count = self.stability_count() + 1;
            self.pending = Some(PendingKey { key: best, count });
        } else if scores.separation() > self.cfg.min_separation
            && confidence > self.cfg.switch_confidence
        {
            self.pending = Some(PendingKey { key: best, count: 1 });
            if 1 >= self.cfg.stability_threshold {
                self.commit(best, confidence);
            }
        } else {
            self.pending = None;
        }

        match self.state() {
            KeyStability::Committed { key, confidence } => (KeyLabel::Key(key), confidence),
            _ => (KeyLabel::Detecting, confidence),
        }
    }

    fn commit(&mut self, key: Key, confidence: f32) {
        log::debug!("Key committed: {} (confidence {:.2})", key, confidence);
        self.committed = Some(CommittedKey { key, confidence });
    }
}

/// One frame's key outcome.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyReading {
    pub label: KeyLabel,
    pub confidence: f32,
    /// Raw best key of this frame before stability gating
    pub candidate: Option<Key>,
}

#[derive(Clone, Debug, Default)]
pub struct KeyEstimator {
    cfg: KeyConfig,
    tracker: KeyTracker,
}

impl KeyEstimator {
    pub fn new(cfg: KeyConfig) -> Self {
        Self {
            tracker: KeyTracker::new(cfg.clone()),
            cfg,
        }
    }

    pub fn reset(&mut self) {
        self.tracker.reset();
    }

    pub fn tracker(&self) -> &KeyTracker {
        &self.tracker
    }

    /// Gated frames (too few detections, no tonal mass) leave the tracker
    /// untouched.
    pub fn estimate(&mut self, accumulator: &PitchClassAccumulator) -> KeyReading {
        if accumulator.update_count() < self.cfg.min_updates {
            return KeyReading {
                label: KeyLabel::Detecting,
                confidence: 0.0,
                candidate: None,
            };
        }

        let scores = match score_keys(accumulator.histogram()) {
            Some(scores) if accumulator.total() >= self.cfg.min_histogram_mass => scores,
            _ => {
                return KeyReading {
                    label: KeyLabel::Undetermined,
                    confidence: 0.0,
                    candidate: None,
                }
            }
        };

        let (label, confidence) = self.tracker.update(&scores);
        log::trace!(
            "key candidate {} r={:.3} sep={:.3} -> {}",
            scores.best,
            scores.correlation,
            scores.separation(),
            label
        );
        KeyReading {
            label,
            confidence,
            candidate: Some(scores.best),
        }
    }
}
