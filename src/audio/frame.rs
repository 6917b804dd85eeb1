use crate::error::FrameError;

/// One analysis tick: a byte magnitude spectrum plus the matching
/// time-domain window.
#[derive(Clone, Copy, Debug)]
pub struct AnalysisFrame<'a> {
    /// Byte-scaled magnitudes, index -> frequency bin
    pub magnitudes: &'a [u8],
    /// Time-domain samples in [-1.0, 1.0]
    pub samples: &'a [f32],
    /// Sample rate in Hz
    pub sample_rate: f32,
}

impl<'a> AnalysisFrame<'a> {
    pub fn new(magnitudes: &'a [u8], samples: &'a [f32], sample_rate: f32) -> Self {
        Self {
            magnitudes,
            samples,
            sample_rate,
        }
    }

    pub fn bin_count(&self) -> usize {
        self.magnitudes.len()
    }

    /// Check the frame's shape. `expected_bins` is the count the session is
    /// locked to, if any.
    pub fn validate(&self, expected_bins: Option<usize>) -> Result<(), FrameError> {
        if self.magnitudes.is_empty() {
            return Err(FrameError::EmptyMagnitudes);
        }
        if self.samples.is_empty() {
            return Err(FrameError::EmptySamples);
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(FrameError::InvalidSampleRate(self.sample_rate));
        }
        if let Some(expected) = expected_bins {
            if expected != self.magnitudes.len() {
                return Err(FrameError::BinCountMismatch {
                    expected,
                    actual: self.magnitudes.len(),
                });
            }
        }
        Ok(())
    }
}

/// Owned counterpart of [`AnalysisFrame`], produced by the spectrum analyser.
#[derive(Clone, Debug, Default)]
pub struct OwnedFrame {
    pub magnitudes: Vec<u8>,
    pub samples: Vec<f32>,
    pub sample_rate: f32,
}

impl OwnedFrame {
    pub fn as_frame(&self) -> AnalysisFrame<'_> {
        AnalysisFrame::new(&self.magnitudes, &self.samples, self.sample_rate)
    }
}
