//! Energy dispersal scrambling with the PRBS generated by x<sup>9</sup>+x<sup>5</sup>+1.
//!
//! Scrambling and descrambling are the same operation: each bit is XORed with the
//! sequence, which restarts from the all-ones state at every FIC block and every
//! logical frame.

/// Pseudo-random binary sequence generator.
pub struct Prbs {
    reg: u16,
}

impl Prbs {
    /// Construct a new `Prbs` at the all-ones starting state.
    pub fn new() -> Prbs {
        Prbs { reg: 0x1FF }
    }
}

impl Iterator for Prbs {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let bit = (self.reg >> 8 ^ self.reg >> 4) & 1;
        self.reg = (self.reg << 1 | bit) & 0x1FF;

        Some(bit as u8)
    }
}

/// Scramble or descramble the given hard bits in place.
pub fn scramble(bits: &mut [u8]) {
    for (b, p) in bits.iter_mut().zip(Prbs::new()) {
        *b ^= p;
    }
}
