use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tuning for one analysis session. Every field has a default, so an empty
/// TOML document yields the stock engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub pitch: PitchConfig,
    #[serde(default)]
    pub histogram: HistogramConfig,
    #[serde(default)]
    pub key: KeyConfig,
    #[serde(default)]
    pub analyser: AnalyserConfig,
    /// Lock sessions to this magnitude-bin count up front instead of
    /// adopting the first frame's.
    #[serde(default)]
    pub expected_bins: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchConfig {
    /// Frames quieter than this RMS never yield a pitch
    #[serde(default = "default_rms_gate")]
    pub rms_gate: f32,
    #[serde(default = "default_normalize_epsilon")]
    pub normalize_epsilon: f32,
    #[serde(default = "default_min_frequency")]
    pub min_frequency: f32,
    #[serde(default = "default_max_frequency")]
    pub max_frequency: f32,
    /// Best lag score must exceed this to count as a pitch
    #[serde(default = "default_clarity_threshold")]
    pub clarity_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramConfig {
    #[serde(default = "default_decay")]
    pub decay: f32,
    /// Rescale is checked on every update after the first `3 * window`
    #[serde(default = "default_window")]
    pub window: u32,
    #[serde(default = "default_rescale_ceiling")]
    pub rescale_ceiling: f32,
    #[serde(default = "default_loudness_floor_db")]
    pub loudness_floor_db: f32,
    #[serde(default = "default_loudness_span_db")]
    pub loudness_span_db: f32,
    #[serde(default = "default_centroid_reference_hz")]
    pub centroid_reference_hz: f32,
    #[serde(default = "default_min_spectral_weight")]
    pub min_spectral_weight: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyConfig {
    #[serde(default = "default_min_updates")]
    pub min_updates: u32,
    #[serde(default = "default_min_histogram_mass")]
    pub min_histogram_mass: f32,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    #[serde(default = "default_stability_threshold")]
    pub stability_threshold: u32,
    #[serde(default = "default_min_separation")]
    pub min_separation: f32,
    #[serde(default = "default_switch_confidence")]
    pub switch_confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyserConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    #[serde(default = "default_min_decibels")]
    pub min_decibels: f32,
    #[serde(default = "default_max_decibels")]
    pub max_decibels: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            rms_gate: default_rms_gate(),
            normalize_epsilon: default_normalize_epsilon(),
            min_frequency: default_min_frequency(),
            max_frequency: default_max_frequency(),
            clarity_threshold: default_clarity_threshold(),
        }
    }
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            decay: default_decay(),
            window: default_window(),
            rescale_ceiling: default_rescale_ceiling(),
            loudness_floor_db: default_loudness_floor_db(),
            loudness_span_db: default_loudness_span_db(),
            centroid_reference_hz: default_centroid_reference_hz(),
            min_spectral_weight: default_min_spectral_weight(),
        }
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            min_updates: default_min_updates(),
            min_histogram_mass: default_min_histogram_mass(),
            min_confidence: default_min_confidence(),
            stability_threshold: default_stability_threshold(),
            min_separation: default_min_separation(),
            switch_confidence: default_switch_confidence(),
        }
    }
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
        }
    }
}

fn default_rms_gate() -> f32 { 0.015 }
fn default_normalize_epsilon() -> f32 { 0.001 }
fn default_min_frequency() -> f32 { 40.0 }
fn default_max_frequency() -> f32 { 1200.0 }
fn default_clarity_threshold() -> f32 { 0.5 }
fn default_decay() -> f32 { 0.98 }
fn default_window() -> u32 { 30 }
fn default_rescale_ceiling() -> f32 { 100.0 }
fn default_loudness_floor_db() -> f32 { -40.0 }
fn default_loudness_span_db() -> f32 { 40.0 }
fn default_centroid_reference_hz() -> f32 { 3000.0 }
fn default_min_spectral_weight() -> f32 { 0.5 }
fn default_min_updates() -> u32 { 5 }
fn default_min_histogram_mass() -> f32 { 0.1 }
fn default_min_confidence() -> f32 { 0.15 }
fn default_stability_threshold() -> u32 { 3 }
fn default_min_separation() -> f32 { 0.1 }
fn default_switch_confidence() -> f32 { 0.3 }
fn default_fft_size() -> usize { 4096 }
fn default_smoothing() -> f32 { 0.75 }
fn default_min_decibels() -> f32 { -100.0 }
fn default_max_decibels() -> f32 { -30.0 }

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse engine config")
    }
}

pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = EngineConfig::from_toml_str(&content)
        .with_context(|| format!("Invalid config in {}", path.display()))?;
    log::debug!("Loaded engine config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.key.stability_threshold, 3);
        assert_eq!(cfg.histogram.window, 30);
        assert_eq!(cfg.analyser.fft_size, 4096);
        assert!(cfg.expected_bins.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            expected_bins = 1024

            [key]
            stability_threshold = 5

            [pitch]
            rms_gate = 0.02
            "#,
        )
        .unwrap();
        assert_eq!(cfg.expected_bins, Some(1024));
        assert_eq!(cfg.key.stability_threshold, 5);
        assert_eq!(cfg.key.min_updates, 5);
        assert_eq!(cfg.pitch.rms_gate, 0.02);
        assert_eq!(cfg.pitch.max_frequency, 1200.0);
        assert_eq!(cfg.histogram, HistogramConfig::default());
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(EngineConfig::from_toml_str("[key]\nmin_updates = \"five\"").is_err());
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/tonalis.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
