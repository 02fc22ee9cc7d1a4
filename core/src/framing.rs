use crate::{DATA_BITS, SYMBOLS_PER_BYTE};

/// One of the two FSK tones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    /// Logical 0 (1200 Hz)
    Space,
    /// Logical 1 (2400 Hz)
    Mark,
}

impl Tone {
    pub fn from_bit(bit: bool) -> Self {
        if bit {
            Tone::Mark
        } else {
            Tone::Space
        }
    }

    pub fn is_mark(self) -> bool {
        self == Tone::Mark
    }
}

/// Stop bits sit above the start bit and the 8 data bits
const STOP_MASK: u16 = 0b11 << (1 + DATA_BITS);

/// Pack one byte into its 11-bit wire frame
///
/// Bit 0 is the start bit (0), bits 1-8 carry the data LSB first and bits 9-10
/// are the stop bits (1). Shifting right one bit per symbol yields the wire order.
pub fn framed_bits(byte: u8) -> u16 {
    ((byte as u16) << 1) | STOP_MASK
}

/// Tone sequence for one byte: start (space), 8 data bits LSB first, 2 stop (mark)
pub fn frame_byte(byte: u8) -> [Tone; SYMBOLS_PER_BYTE] {
    let bits = framed_bits(byte);
    let mut tones = [Tone::Space; SYMBOLS_PER_BYTE];
    for (i, tone) in tones.iter_mut().enumerate() {
        *tone = Tone::from_bit((bits >> i) & 1 != 0);
    }
    tones
}
