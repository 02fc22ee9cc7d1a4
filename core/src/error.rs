use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CsaveError {
    #[error("Invalid output sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    #[error("Invalid symbol rate: {0}")]
    InvalidSymbolRate(f64),

    #[error("Invalid amplitude: {0} (must be in (0, 1])")]
    InvalidAmplitude(f64),

    #[error("Invalid preamble duration: {0} s")]
    InvalidPreamble(f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, CsaveError>;
