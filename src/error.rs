use thiserror::Error;

/// Reasons a frame is refused before it touches session state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("frame has no magnitude bins")]
    EmptyMagnitudes,

    #[error("frame has no time-domain samples")]
    EmptySamples,

    #[error("sample rate must be a positive finite number of Hz, got {0}")]
    InvalidSampleRate(f32),

    #[error("frame has {actual} magnitude bins but the session expects {expected}")]
    BinCountMismatch { expected: usize, actual: usize },
}
