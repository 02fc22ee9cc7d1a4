/// Fractional sample-count accounting across symbols
///
/// Each symbol adds its nominal length in samples to `remainder`; one sample
/// is emitted per unit while `remainder > 0`. The leftover fraction carries
/// into the next symbol, so the average symbol length matches the nominal
/// value exactly even when it is not an integer.
#[derive(Debug, Clone, Default)]
pub struct DurationScheduler {
    remainder: f64,
}

impl DurationScheduler {
    pub fn new() -> Self {
        Self { remainder: 0.0 }
    }

    /// Start a symbol of `nominal_samples` (possibly fractional) length
    pub fn begin(&mut self, nominal_samples: f64) {
        self.remainder += nominal_samples;
    }

    /// Whether the current symbol still owes a sample
    #[inline]
    pub fn pending(&self) -> bool {
        self.remainder > 0.0
    }

    /// Consume one sample slot; returns false when the symbol is complete
    #[inline]
    pub fn tick(&mut self) -> bool {
        if self.remainder > 0.0 {
            self.remainder -= 1.0;
            true
        } else {
            false
        }
    }

    /// Consume the rest of the current symbol, returning the samples it took
    pub fn drain(&mut self) -> u64 {
        let mut count = 0;
        while self.tick() {
            count += 1;
        }
        count
    }

    pub fn remainder(&self) -> f64 {
        self.remainder
    }
}
