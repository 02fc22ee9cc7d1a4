use crate::error::Result;
use crate::framing::{framed_bits, Tone};
use crate::generator::GeneratorConfig;
use crate::record::Record;
use crate::scheduler::DurationScheduler;
use crate::SYMBOLS_PER_BYTE;

/// How long a symbol lasts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SymbolDuration {
    /// Record preamble, in seconds
    Preamble(f64),
    /// One bit period (1 / symbol rate)
    Bit,
}

/// A tone held for a nominal duration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Symbol {
    pub tone: Tone,
    pub duration: SymbolDuration,
}

impl Symbol {
    pub fn preamble(secs: f64) -> Self {
        Self {
            tone: Tone::Mark,
            duration: SymbolDuration::Preamble(secs),
        }
    }

    pub fn bit(tone: Tone) -> Self {
        Self {
            tone,
            duration: SymbolDuration::Bit,
        }
    }

    /// Nominal (possibly fractional) length in samples
    pub fn nominal_samples(&self, sample_rate: f64, samples_per_bit: f64) -> f64 {
        match self.duration {
            SymbolDuration::Preamble(secs) => secs * sample_rate,
            SymbolDuration::Bit => samples_per_bit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Preamble,
    /// `next` is the index of the next payload byte to load, `bits` the
    /// unsent part of the current frame
    Frame { next: usize, bits: u16, left: usize },
}

/// Walks a record list symbol by symbol without allocating
///
/// The cursor stores only indices, so the records are passed to every call.
/// This lets the owner of the records hold the cursor in a plain field.
#[derive(Debug, Clone)]
pub struct SymbolCursor {
    record: usize,
    position: Position,
}

impl SymbolCursor {
    pub fn new() -> Self {
        Self {
            record: 0,
            position: Position::Preamble,
        }
    }

    /// Next symbol of the timeline, `None` once every record is consumed
    pub fn next(&mut self, records: &[Record]) -> Option<Symbol> {
        loop {
            let record = records.get(self.record)?;
            match self.position {
                Position::Preamble => {
                    self.position = Position::Frame {
                        next: 0,
                        bits: 0,
                        left: 0,
                    };
                    return Some(Symbol::preamble(record.preamble_secs()));
                }
                Position::Frame { next, bits, left } if left > 0 => {
                    self.position = Position::Frame {
                        next,
                        bits: bits >> 1,
                        left: left - 1,
                    };
                    return Some(Symbol::bit(Tone::from_bit(bits & 1 != 0)));
                }
                Position::Frame { next, .. } => match record.payload().get(next) {
                    Some(&byte) => {
                        self.position = Position::Frame {
                            next: next + 1,
                            bits: framed_bits(byte),
                            left: SYMBOLS_PER_BYTE,
                        };
                    }
                    None => {
                        self.record += 1;
                        self.position = Position::Preamble;
                    }
                },
            }
        }
    }

    /// Index of the record the cursor is currently in
    pub fn record_index(&self) -> usize {
        self.record
    }
}

impl Default for SymbolCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten records into one symbol timeline: per record a mark preamble, then
/// every payload byte framed, back to back
pub fn expand(records: &[Record]) -> Vec<Symbol> {
    let mut cursor = SymbolCursor::new();
    let mut symbols = Vec::new();
    while let Some(symbol) = cursor.next(records) {
        symbols.push(symbol);
    }
    symbols
}

/// Exact number of samples a generator emits for `records`, without synthesis
///
/// Applies the same validation as [`StreamingGenerator::new`](crate::StreamingGenerator::new).
pub fn count_samples(records: &[Record], config: &GeneratorConfig) -> Result<u64> {
    let config = config.validate()?;
    for record in records {
        config.check_record(record)?;
    }
    let sample_rate = config.sample_rate as f64;
    let samples_per_bit = config.samples_per_bit();

    let mut cursor = SymbolCursor::new();
    let mut scheduler = DurationScheduler::new();
    let mut total = 0u64;
    while let Some(symbol) = cursor.next(records) {
        scheduler.begin(symbol.nominal_samples(sample_rate, samples_per_bit));
        total += scheduler.drain();
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::frame_byte;

    #[test]
    fn test_expand_empty_record_list() {
        assert!(expand(&[]).is_empty());
    }

    #[test]
    fn test_expand_preamble_only_record() {
        let records = [Record::with_preamble(0.5, Vec::new()).unwrap()];
        assert_eq!(expand(&records), vec![Symbol::preamble(0.5)]);
    }

    #[test]
    fn test_expand_single_byte() {
        let records = [Record::new(vec![0x41])];
        let symbols = expand(&records);
        assert_eq!(symbols.len(), 1 + SYMBOLS_PER_BYTE);
        assert_eq!(symbols[0], Symbol::preamble(1.0));

        let tones: Vec<Tone> = symbols[1..].iter().map(|s| s.tone).collect();
        assert_eq!(tones, frame_byte(0x41).to_vec());
        assert!(symbols[1..]
            .iter()
            .all(|s| s.duration == SymbolDuration::Bit));
    }

    #[test]
    fn test_expand_multiple_records_in_order() {
        let records = [
            Record::with_preamble(2.0, vec![0x00]).unwrap(),
            Record::header(),
            Record::with_preamble(0.25, vec![0xFF, 0x55]).unwrap(),
        ];
        let symbols = expand(&records);
        assert_eq!(symbols.len(), (1 + 11) + 1 + (1 + 22));

        assert_eq!(symbols[0], Symbol::preamble(2.0));
        assert_eq!(symbols[12], Symbol::preamble(1.0));
        assert_eq!(symbols[13], Symbol::preamble(0.25));

        let expected: Vec<Tone> = frame_byte(0xFF)
            .iter()
            .chain(frame_byte(0x55).iter())
            .copied()
            .collect();
        let actual: Vec<Tone> = symbols[14..].iter().map(|s| s.tone).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_cursor_stays_exhausted() {
        let records = [Record::new(vec![1])];
        let mut cursor = SymbolCursor::new();
        while cursor.next(&records).is_some() {}
        assert!(cursor.next(&records).is_none());
        assert!(cursor.next(&records).is_none());
        assert_eq!(cursor.record_index(), 1);
    }

    #[test]
    fn test_count_samples_integer_ratio() {
        let records = [Record::new(b"AB".to_vec())];
        // 1 s preamble + 2 bytes * 11 symbols * 40 samples
        let total = count_samples(&records, &GeneratorConfig::new(48000)).unwrap();
        assert_eq!(total, 48000 + 2 * 440);
    }

    #[test]
    fn test_count_samples_fractional_ratio() {
        let records = [Record::with_preamble(0.0, vec![0u8; 40]).unwrap()];
        // 440 symbols at 36.75 samples each add up to exactly 16170
        let total = count_samples(&records, &GeneratorConfig::new(44100)).unwrap();
        assert_eq!(total, 16170);
    }

    #[test]
    fn test_count_samples_uses_validated_config() {
        let records = [Record::with_preamble(0.0, vec![0x41]).unwrap()];
        // A zero symbol rate means the default 1200, not infinitely long bits
        let config = GeneratorConfig::new(48000).with_symbol_rate(0.0);
        assert_eq!(count_samples(&records, &config).unwrap(), 440);

        let config = GeneratorConfig::new(48000).with_symbol_rate(1e-13);
        assert!(count_samples(&records, &config).is_err());

        let records = [Record::with_preamble(1e13, Vec::new()).unwrap()];
        assert!(count_samples(&records, &GeneratorConfig::new(48000)).is_err());
    }
}
