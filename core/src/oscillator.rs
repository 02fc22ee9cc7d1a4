use crate::framing::Tone;
use crate::{MARK_FREQUENCY, SPACE_FREQUENCY};
use std::f64::consts::PI;

/// Phase increments (frequency / sample rate) for the two tones
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneTable {
    space: f64,
    mark: f64,
}

impl ToneTable {
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f64;
        Self {
            space: SPACE_FREQUENCY / sample_rate,
            mark: MARK_FREQUENCY / sample_rate,
        }
    }

    pub fn increment(&self, tone: Tone) -> f64 {
        match tone {
            Tone::Space => self.space,
            Tone::Mark => self.mark,
        }
    }
}

/// Continuous-phase sine oscillator
///
/// Phase is kept in cycles within [0, 1) and is never reset, so changing the
/// increment between calls changes frequency without a waveform discontinuity.
#[derive(Debug, Clone)]
pub struct PhaseAccumulator {
    phase: f64,
    amplitude: f64,
}

impl PhaseAccumulator {
    pub fn new(amplitude: f64) -> Self {
        Self {
            phase: 0.0,
            amplitude,
        }
    }

    /// Emit the sample at the current phase, then step the phase by `increment`
    #[inline]
    pub fn advance(&mut self, increment: f64) -> f32 {
        let sample = self.amplitude * (2.0 * PI * self.phase).sin();
        self.phase += increment;
        self.phase -= self.phase.floor();
        sample as f32
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }
}
