//! Frame-by-frame audio analysis for live visualizers: loudness, spectral
//! centroid and flux, fundamental pitch, a decaying pitch-class profile and
//! the musical key it implies, plus OKLCH colors for notes and keys.
//!
//! Feed an [`AnalysisSession`] one [`AnalysisFrame`] per tick; each call
//! returns an [`AnalysisResult`].

pub mod audio;
pub mod config;
pub mod error;

pub use audio::analysis::{analyze_clip, ClipAnalysis, ClipSummary, TimedResult};
pub use audio::color::{key_color, key_color_for_label, note_color, note_color_for_label, Color};
pub use audio::frame::{AnalysisFrame, OwnedFrame};
pub use audio::key::{Key, KeyLabel, KeyStability, Mode};
pub use audio::pitch::{Note, PitchClass};
pub use audio::session::{process, reset, AnalysisResult, AnalysisSession};
pub use audio::spectrum::SpectrumAnalyser;
pub use config::EngineConfig;
pub use error::FrameError;
