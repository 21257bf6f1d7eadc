//! Utilities for soft bits and for packing/unpacking bits into/out of bytes.

/// Soft-decision bit: positive values lean towards 1, negative towards 0, and 0 is an
/// erasure carrying no information.
pub type SoftBit = i8;

/// Most confident soft decision for a logical 1.
pub const SOFT_ONE: SoftBit = 127;
/// Most confident soft decision for a logical 0.
pub const SOFT_ZERO: SoftBit = -127;
/// Soft decision carrying no information.
pub const ERASURE: SoftBit = 0;

/// Convert the given hard bit to its most confident soft decision.
pub fn soft(bit: u8) -> SoftBit {
    if bit & 1 == 1 { SOFT_ONE } else { SOFT_ZERO }
}

/// Convert the given soft decision to a hard bit, taking erasures as 0.
pub fn hard(soft: SoftBit) -> u8 {
    (soft > 0) as u8
}

/// Iterates over the bits of a byte source, MSB to LSB.
pub struct Bits<T: Iterator<Item = u8>> {
    src: T,
    /// Current byte being split.
    byte: u8,
    /// Bits left in the current byte.
    left: usize,
}

impl<T: Iterator<Item = u8>> Bits<T> {
    /// Construct a new `Bits` over the given byte source.
    pub fn new(src: T) -> Self {
        Bits {
            src: src,
            byte: 0,
            left: 0,
        }
    }
}

impl<T: Iterator<Item = u8>> Iterator for Bits<T> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.left == 0 {
            self.byte = self.src.next()?;
            self.left = 8;
        }

        self.left -= 1;
        Some(self.byte >> self.left & 1)
    }
}

/// Groups bits into full bytes, MSB first. Trailing bits that don't fill a byte are
/// dropped.
pub struct BitBytes<T: Iterator<Item = u8>> {
    src: T,
}

impl<T: Iterator<Item = u8>> BitBytes<T> {
    /// Construct a new `BitBytes` over the given bit source.
    pub fn new(src: T) -> Self {
        BitBytes { src: src }
    }
}

impl<T: Iterator<Item = u8>> Iterator for BitBytes<T> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let mut byte = 0;

        for _ in 0..8 {
            byte = byte << 1 | self.src.next()? & 1;
        }

        Some(byte)
    }
}

/// Reads MSB-first bit fields out of a byte buffer.
pub struct BitReader<'a> {
    buf: &'a [u8],
    /// Current bit position.
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// Construct a new `BitReader` positioned at the first bit of the given buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        BitReader {
            buf: buf,
            pos: 0,
        }
    }

    /// Number of bits that haven't been read yet.
    pub fn remaining(&self) -> usize { self.buf.len() * 8 - self.pos }

    /// Read the next `num` bits (at most 32) as an unsigned value. Return `None` if
    /// fewer than `num` bits remain, in which case the reader isn't advanced.
    pub fn read(&mut self, num: usize) -> Option<u32> {
        assert!(num <= 32);

        if num > self.remaining() {
            return None;
        }

        let mut val = 0u32;

        for _ in 0..num {
            let bit = self.buf[self.pos / 8] >> (7 - self.pos % 8) & 1;
            val = val << 1 | bit as u32;
            self.pos += 1;
        }

        Some(val)
    }

    /// Read a single bit as a flag.
    pub fn flag(&mut self) -> Option<bool> {
        self.read(1).map(|b| b == 1)
    }

    /// Skip over the next `num` bits.
    pub fn skip(&mut self, num: usize) -> Option<()> {
        if num > self.remaining() {
            return None;
        }

        self.pos += num;
        Some(())
    }
}

/// Split a 16-bit big-endian word from the first two bytes of the given slice.
pub fn slice_u16(bytes: &[u8]) -> u16 {
    (bytes[0] as u16) << 8 | bytes[1] as u16
}
