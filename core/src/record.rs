use crate::error::{CsaveError, Result};
use crate::DEFAULT_PREAMBLE_SECS;

/// A single saved block: a mark-tone preamble followed by framed payload bytes
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    preamble_secs: f64,
    payload: Vec<u8>,
}

impl Record {
    /// Record with the default 1 second preamble
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            preamble_secs: DEFAULT_PREAMBLE_SECS,
            payload: payload.into(),
        }
    }

    /// Record with an explicit preamble duration in seconds (finite, >= 0)
    pub fn with_preamble(preamble_secs: f64, payload: impl Into<Vec<u8>>) -> Result<Self> {
        if !preamble_secs.is_finite() || preamble_secs < 0.0 {
            return Err(CsaveError::InvalidPreamble(preamble_secs));
        }
        Ok(Self {
            preamble_secs,
            payload: payload.into(),
        })
    }

    /// Preamble-only record, used as a leading header
    pub fn header() -> Self {
        Self::new(Vec::new())
    }

    pub fn preamble_secs(&self) -> f64 {
        self.preamble_secs
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl From<&str> for Record {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes())
    }
}
