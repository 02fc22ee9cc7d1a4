//! Synthesis core for *CSAVE sounds*
//!
//! Encodes bytes as a continuous-phase two-tone FSK waveform in the style of
//! the cassette data-save format: a mark-tone preamble per record followed by
//! asynchronous serial frames (1 start bit, 8 data bits LSB first, 2 stop bits).
//! Samples are pulled one at a time from a [`StreamingGenerator`], usually via a
//! [`RenderDriver`] sitting inside a host's real-time audio callback.

pub mod error;
pub mod framing;
pub mod record;
pub mod expander;
pub mod oscillator;
pub mod scheduler;
pub mod generator;
pub mod render;

pub use error::{CsaveError, Result};
pub use expander::{count_samples, expand, Symbol, SymbolCursor, SymbolDuration};
pub use framing::{frame_byte, framed_bits, Tone};
pub use generator::{GeneratorConfig, StreamingGenerator};
pub use oscillator::{PhaseAccumulator, ToneTable};
pub use record::Record;
pub use render::{
    finish_channel, Channels, FinishListener, FinishNotify, FinishSignal, Interleaved, Planar,
    RenderDriver, RenderTarget, StreamFinished, Tee,
};
pub use scheduler::DurationScheduler;

// Signal configuration
pub const DEFAULT_SYMBOL_RATE: f64 = 1200.0; // symbols per second
pub const DEFAULT_AMPLITUDE: f64 = 0.125; // -18 dBFS
pub const SPACE_FREQUENCY: f64 = 1200.0; // Hz, logical 0
pub const MARK_FREQUENCY: f64 = 2400.0; // Hz, logical 1

// Record framing
pub const DEFAULT_PREAMBLE_SECS: f64 = 1.0;
pub const DATA_BITS: usize = 8;
pub const STOP_BITS: usize = 2;
pub const SYMBOLS_PER_BYTE: usize = 1 + DATA_BITS + STOP_BITS; // 11

// Upper bound on one symbol's nominal length in samples (2^32). The scheduler
// counts down by 1.0 in f64, which needs the count far below 2^53.
pub const MAX_SYMBOL_SAMPLES: f64 = 4_294_967_296.0;

// Host defaults
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;
pub const DEFAULT_QUANTUM: usize = 128; // frames per render call
