use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use serde::Serialize;

use super::frame::AnalysisFrame;
use super::key::KeyLabel;
use super::pitch::{Note, PitchClass};
use super::session::{AnalysisResult, AnalysisSession};
use super::spectrum::{time_domain, SpectrumAnalyser};
use crate::config::EngineConfig;

/// One session result stamped with the end time of its window.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimedResult {
    /// Seconds from the start of the clip
    pub time: f32,
    #[serde(flatten)]
    pub result: AnalysisResult,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipSummary {
    pub frames: usize,
    pub pitched_frames: usize,
    pub final_key: KeyLabel,
    pub final_key_confidence: f32,
    /// Most frequent detected note, lowest pitch class on ties
    pub dominant_note: Note,
}

#[derive(Clone, Debug, Serialize)]
pub struct ClipAnalysis {
    pub summary: ClipSummary,
    pub frames: Vec<TimedResult>,
}

/// Runs a whole mono clip through one session, one analyser tick every
/// `hop` samples.
pub fn analyze_clip(
    samples: &[f32],
    sample_rate: u32,
    hop: usize,
    config: &EngineConfig,
) -> Result<ClipAnalysis> {
    if hop == 0 {
        bail!("hop size must be positive");
    }
    if sample_rate == 0 {
        bail!("sample rate must be positive");
    }
    let mut analyser = SpectrumAnalyser::new(&config.analyser).context("Invalid analyser config")?;
    let window = analyser.fft_size();
    if samples.len() < window {
        bail!(
            "Clip has {} samples, need at least one {}-sample window",
            samples.len(),
            window
        );
    }

    let starts: Vec<usize> = (0..=samples.len() - window).step_by(hop).collect();
    let sr = sample_rate as f32;

    log::info!("Pass 1: Per-window FFT ({} windows)...", starts.len());
    let raw: Vec<Vec<f32>> = starts
        .par_iter()
        .map(|&start| analyser.magnitudes(&samples[start..start + window]))
        .collect();

    log::info!("Pass 2: Smoothing & session ({} frames)...", raw.len());
    let mut session = AnalysisSession::new(config);
    let mut frames = Vec::with_capacity(raw.len());
    for (i, (&start, magnitudes)) in starts.iter().zip(&raw).enumerate() {
        let bytes = analyser.smooth(magnitudes);
        let waveform = time_domain(&samples[start..start + window], window, analyser.bin_count());
        let result = session
            .process(&AnalysisFrame::new(&bytes, &waveform, sr))
            .with_context(|| format!("Frame {} rejected", i))?;
        frames.push(TimedResult {
            time: (start + window) as f32 / sr,
            result,
        });
    }

    let summary = summarize(&frames);
    log::info!(
        "Clip: {} frames, {} pitched, key={}, dominant note={}",
        summary.frames,
        summary.pitched_frames,
        summary.final_key,
        summary.dominant_note
    );

    Ok(ClipAnalysis { summary, frames })
}

fn summarize(frames: &[TimedResult]) -> ClipSummary {
    let mut counts = [0usize; 12];
    for frame in frames {
        if let Some(pc) = frame.result.note.pitch_class() {
            counts[pc.index()] += 1;
        }
    }
    let pitched_frames = counts.iter().sum();

    let dominant_note = (0..12)
        .filter(|&i| counts[i] > 0)
        .max_by(|&a, &b| counts[a].cmp(&counts[b]).then(b.cmp(&a)))
        .and_then(PitchClass::new)
        .map_or(Note::NoPitch, Note::Pitch);

    let (final_key, final_key_confidence) = frames
        .last()
        .map_or((KeyLabel::Detecting, 0.0), |f| (f.result.key, f.result.key_confidence));

    ClipSummary {
        frames: frames.len(),
        pitched_frames,
        final_key,
        final_key_confidence,
        dominant_note,
    }
}
