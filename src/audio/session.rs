use serde::Serialize;

use super::color::{dynamic_note_color, Color};
use super::features::FeatureExtractor;
use super::frame::AnalysisFrame;
use super::histogram::PitchClassAccumulator;
use super::key::{Key, KeyEstimator, KeyLabel, KeyStability};
use super::pitch::{frequency_to_note, Note, PitchDetector};
use crate::config::EngineConfig;
use crate::error::FrameError;

/// Output of one processed frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// dB change against the previous frame
    pub loudness_delta: f32,
    /// Hz change against the previous frame
    pub spectral_centroid_delta: f32,
    pub spectral_flux: f32,
    pub key: KeyLabel,
    pub key_confidence: f32,
    pub color: Color,
    pub note: Note,
    pub loudness_db: f32,
    pub spectral_centroid_hz: f32,
    /// Detected fundamental, 0 when there is none
    pub pitch_hz: f32,
    /// Best-scoring key of this frame before stability gating
    pub key_candidate: Option<Key>,
}

impl AnalysisResult {
    /// Whether the frame moved enough to be worth drawing.
    pub fn is_significant(&self) -> bool {
        self.loudness_delta.abs() > 0.5
            || self.spectral_centroid_delta.abs() > 10.0
            || self.spectral_flux.abs() > 1.0
    }
}

/// All state carried between frames of one recording. Not shared: every
/// call takes `&mut self`.
#[derive(Clone, Debug)]
pub struct AnalysisSession {
    configured_bins: Option<usize>,
    expected_bins: Option<usize>,
    features: FeatureExtractor,
    pitch: PitchDetector,
    accumulator: PitchClassAccumulator,
    key: KeyEstimator,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl AnalysisSession {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            configured_bins: config.expected_bins,
            expected_bins: config.expected_bins,
            features: FeatureExtractor::new(),
            pitch: PitchDetector::new(config.pitch.clone()),
            accumulator: PitchClassAccumulator::new(config.histogram.clone()),
            key: KeyEstimator::new(config.key.clone()),
        }
    }

    /// Back to the freshly-created state. Safe to call at any time, any
    /// number of times.
    pub fn reset(&mut self) {
        self.expected_bins = self.configured_bins;
        self.features.reset();
        self.accumulator.reset();
        self.key.reset();
    }

    pub fn expected_bins(&self) -> Option<usize> {
        self.expected_bins
    }

    pub fn pitch_class_histogram(&self) -> &[f32; 12] {
        self.accumulator.histogram()
    }

    pub fn pitch_class_weights(&self) -> &[f32; 12] {
        self.accumulator.weights()
    }

    pub fn histogram_update_count(&self) -> u32 {
        self.accumulator.update_count()
    }

    pub fn previous_loudness(&self) -> Option<f32> {
        self.features.previous_loudness()
    }

    pub fn previous_spectral_centroid(&self) -> Option<f32> {
        self.features.previous_spectral_centroid()
    }

    pub fn previous_magnitude_spectrum(&self) -> Option<&[u8]> {
        self.features.previous_magnitudes()
    }

    pub fn key_stability(&self) -> KeyStability {
        self.key.tracker().state()
    }

    pub fn key_stability_count(&self) -> u32 {
        self.key.tracker().stability_count()
    }

    /// Runs one frame through the pipeline. A malformed frame is rejected
    /// before any state changes.
    pub fn process(&mut self, frame: &AnalysisFrame<'_>) -> Result<AnalysisResult, FrameError> {
        if let Err(e) = frame.validate(self.expected_bins) {
            log::warn!("Rejected frame: {}", e);
            return Err(e);
        }
        if self.expected_bins.is_none() {
            log::debug!("Session locked to {} magnitude bins", frame.bin_count());
            self.expected_bins = Some(frame.bin_count());
        }

        let features = self
            .features
            .extract(frame.samples, frame.magnitudes, frame.sample_rate);

        let pitch_hz = self.pitch.detect(frame.samples, frame.sample_rate);
        let note = frequency_to_note(pitch_hz);

        if let Some(pitch_class) = note.pitch_class() {
            let weight = self
                .accumulator
                .evidence_weight(features.loudness_db, features.spectral_centroid);
            self.accumulator.add(pitch_class, weight);
        }

        let reading = self.key.estimate(&self.accumulator);

        let color = dynamic_note_color(
            note,
            features.loudness_delta,
            features.spectral_centroid_delta,
            features.spectral_flux,
        );

        Ok(AnalysisResult {
            loudness_delta: features.loudness_delta,
            spectral_centroid_delta: features.spectral_centroid_delta,
            spectral_flux: features.spectral_flux,
            key: reading.label,
            key_confidence: reading.confidence,
            color,
            note,
            loudness_db: features.loudness_db,
            spectral_centroid_hz: features.spectral_centroid,
            pitch_hz,
            key_candidate: reading.candidate,
        })
    }
}

/// Free-function form of [`AnalysisSession::process`].
pub fn process(
    frame: &AnalysisFrame<'_>,
    session: &mut AnalysisSession,
) -> Result<AnalysisResult, FrameError> {
    session.process(frame)
}

/// Free-function form of [`AnalysisSession::reset`].
pub fn reset(session: &mut AnalysisSession) {
    session.reset();
}
