use csave_core::CsaveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Invalid records file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Core(#[from] CsaveError),

    #[error("Invalid record #{index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Unsupported sample depth: {0} bits (expected 16 or 32)")]
    UnsupportedDepth(u16),

    #[error("Audio device error: {0}")]
    Audio(String),

    #[error("Recorder thread panicked")]
    RecorderPanicked,
}

pub type Result<T> = std::result::Result<T, CliError>;
