/// Loudness reported for digital silence, and the floor for everything else
pub const SILENCE_DB: f32 = -100.0;

/// Per-frame spectral and level features, with deltas against the previous
/// frame of the same session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameFeatures {
    /// RMS level in dBFS, floored at -100
    pub loudness_db: f32,
    /// Magnitude-weighted mean frequency (Hz)
    pub spectral_centroid: f32,
    /// Mean signed bin-wise change from the previous spectrum
    pub spectral_flux: f32,
    pub loudness_delta: f32,
    pub spectral_centroid_delta: f32,
}

/// Holds the one-frame memory needed for deltas and flux.
#[derive(Clone, Debug, Default)]
pub struct FeatureExtractor {
    previous_loudness: Option<f32>,
    previous_spectral_centroid: Option<f32>,
    previous_magnitudes: Option<Vec<u8>>,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.previous_loudness = None;
        self.previous_spectral_centroid = None;
        self.previous_magnitudes = None;
    }

    pub fn previous_loudness(&self) -> Option<f32> {
        self.previous_loudness
    }

    pub fn previous_spectral_centroid(&self) -> Option<f32> {
        self.previous_spectral_centroid
    }

    pub fn previous_magnitudes(&self) -> Option<&[u8]> {
        self.previous_magnitudes.as_deref()
    }

    pub fn extract(&mut self, samples: &[f32], magnitudes: &[u8], sample_rate: f32) -> FrameFeatures {
        let loudness_db = loudness(samples);
        let spectral_centroid = spectral_centroid(magnitudes, sample_rate);
        let spectral_flux = self.spectral_flux(magnitudes);

        let loudness_delta = self
            .previous_loudness
            .map_or(0.0, |prev| loudness_db - prev);
        let spectral_centroid_delta = self
            .previous_spectral_centroid
            .map_or(0.0, |prev| spectral_centroid - prev);

        self.previous_loudness = Some(loudness_db);
        self.previous_spectral_centroid = Some(spectral_centroid);

        FrameFeatures {
            loudness_db,
            spectral_centroid,
            spectral_flux,
            loudness_delta,
            spectral_centroid_delta,
        }
    }

    /// Signed flux: a decaying spectrum gives a negative value. The first
    /// call only primes the memory and returns 0.
    fn spectral_flux(&mut self, magnitudes: &[u8]) -> f32 {
        let flux = match self.previous_magnitudes.as_deref() {
            None => 0.0,
            Some(prev) => signed_flux(magnitudes, prev),
        };
        match self.previous_magnitudes.as_mut() {
            Some(prev) => {
                prev.clear();
                prev.extend_from_slice(magnitudes);
            }
            None => self.previous_magnitudes = Some(magnitudes.to_vec()),
        }
        flux
    }
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

pub fn loudness(samples: &[f32]) -> f32 {
    let rms = rms(samples);
    if rms == 0.0 {
        return SILENCE_DB;
    }
    (20.0 * rms.log10()).max(SILENCE_DB)
}

/// Bin `i` sits at `i * sample_rate / (2 * bins)`.
pub fn spectral_centroid(magnitudes: &[u8], sample_rate: f32) -> f32 {
    let bins = magnitudes.len() as f32;
    let mut weighted_sum = 0.0f32;
    let mut magnitude_sum = 0.0f32;
    for (i, &mag) in magnitudes.iter().enumerate() {
        let frequency = i as f32 * sample_rate / (2.0 * bins);
        weighted_sum += frequency * mag as f32;
        magnitude_sum += mag as f32;
    }
    if magnitude_sum == 0.0 {
        return 0.0;
    }
    weighted_sum / magnitude_sum
}

pub fn signed_flux(current: &[u8], previous: &[u8]) -> f32 {
    if current.is_empty() {
        return 0.0;
    }
    let total: f32 = current
        .iter()
        .zip(previous.iter())
        .map(|(&cur, &prev)| cur as f32 - prev as f32)
        .sum();
    total / current.len() as f32
}
