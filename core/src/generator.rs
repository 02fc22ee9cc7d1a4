use crate::error::{CsaveError, Result};
use crate::expander::SymbolCursor;
use crate::oscillator::{PhaseAccumulator, ToneTable};
use crate::record::Record;
use crate::scheduler::DurationScheduler;
use crate::{DEFAULT_AMPLITUDE, DEFAULT_SYMBOL_RATE, MAX_SYMBOL_SAMPLES};
use std::iter::FusedIterator;

/// Parameters fixed for the lifetime of one generator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorConfig {
    /// Output sample rate in Hz, supplied by the host
    pub sample_rate: u32,
    /// Symbols per second; 0 means "use the default"
    pub symbol_rate: f64,
    /// Peak amplitude in (0, 1]
    pub amplitude: f64,
}

impl GeneratorConfig {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            symbol_rate: DEFAULT_SYMBOL_RATE,
            amplitude: DEFAULT_AMPLITUDE,
        }
    }

    pub fn with_symbol_rate(mut self, symbol_rate: f64) -> Self {
        self.symbol_rate = symbol_rate;
        self
    }

    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Check the parameters and substitute defaults for unspecified values
    pub fn validate(&self) -> Result<Self> {
        if self.sample_rate == 0 {
            return Err(CsaveError::InvalidSampleRate(self.sample_rate));
        }

        let symbol_rate = if self.symbol_rate == 0.0 {
            DEFAULT_SYMBOL_RATE
        } else {
            self.symbol_rate
        };
        if !symbol_rate.is_finite() || symbol_rate < 0.0 {
            return Err(CsaveError::InvalidSymbolRate(self.symbol_rate));
        }
        if self.sample_rate as f64 / symbol_rate >= MAX_SYMBOL_SAMPLES {
            return Err(CsaveError::InvalidSymbolRate(self.symbol_rate));
        }

        if !(self.amplitude > 0.0 && self.amplitude <= 1.0) {
            return Err(CsaveError::InvalidAmplitude(self.amplitude));
        }

        Ok(Self {
            symbol_rate,
            ..*self
        })
    }

    /// Check that `record`'s preamble fits the scheduler at this sample rate
    pub fn check_record(&self, record: &Record) -> Result<()> {
        let preamble = record.preamble_secs();
        if preamble * self.sample_rate as f64 >= MAX_SYMBOL_SAMPLES {
            return Err(CsaveError::InvalidPreamble(preamble));
        }
        Ok(())
    }

    /// Nominal samples per data symbol (may be fractional)
    pub fn samples_per_bit(&self) -> f64 {
        self.sample_rate as f64 / self.symbol_rate
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::new(crate::DEFAULT_SAMPLE_RATE)
    }
}

/// Pull-driven producer of the FSK waveform
///
/// All state lives in plain fields, so pulling a sample never allocates.
/// Invariant between pulls: either the stream is exhausted or the scheduler
/// owes at least one sample for the current symbol.
pub struct StreamingGenerator {
    records: Vec<Record>,
    cursor: SymbolCursor,
    oscillator: PhaseAccumulator,
    scheduler: DurationScheduler,
    tones: ToneTable,
    sample_rate: f64,
    samples_per_bit: f64,
    increment: f64,
    emitted: u64,
    exhausted: bool,
}

impl StreamingGenerator {
    pub fn new(config: GeneratorConfig, records: Vec<Record>) -> Result<Self> {
        let config = config.validate()?;
        for record in &records {
            config.check_record(record)?;
        }
        log::debug!(
            "generator: {} record(s), {} Hz, {} symbols/s ({} samples/symbol)",
            records.len(),
            config.sample_rate,
            config.symbol_rate,
            config.samples_per_bit()
        );

        let mut generator = Self {
            records,
            cursor: SymbolCursor::new(),
            oscillator: PhaseAccumulator::new(config.amplitude),
            scheduler: DurationScheduler::new(),
            tones: ToneTable::new(config.sample_rate),
            sample_rate: config.sample_rate as f64,
            samples_per_bit: config.samples_per_bit(),
            increment: 0.0,
            emitted: 0,
            exhausted: false,
        };
        generator.refill();
        Ok(generator)
    }

    /// Pull the next sample, or `None` once the stream has ended
    #[inline]
    pub fn next_sample(&mut self) -> Option<f32> {
        if self.exhausted {
            return None;
        }
        self.scheduler.tick();
        let sample = self.oscillator.advance(self.increment);
        self.emitted += 1;
        self.refill();
        Some(sample)
    }

    /// Move to the next symbol that owes samples, or mark the stream exhausted
    fn refill(&mut self) {
        while !self.scheduler.pending() {
            match self.cursor.next(&self.records) {
                Some(symbol) => {
                    self.increment = self.tones.increment(symbol.tone);
                    self.scheduler
                        .begin(symbol.nominal_samples(self.sample_rate, self.samples_per_bit));
                }
                None => {
                    self.exhausted = true;
                    return;
                }
            }
        }
    }

    /// True once the last sample of the last record has been pulled
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Samples emitted so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Oscillator phase (cycles, in [0, 1)) for the next sample
    pub fn phase(&self) -> f64 {
        self.oscillator.phase()
    }

    /// Phase increment the next sample will be stepped by
    pub fn increment(&self) -> f64 {
        self.increment
    }

    /// Carried fractional sample count of the current symbol
    pub fn remainder(&self) -> f64 {
        self.scheduler.remainder()
    }
}

impl Iterator for StreamingGenerator {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        self.next_sample()
    }
}

impl FusedIterator for StreamingGenerator {}
