//! Puncturing of the rate-1/4 mother code to the rates used by the FIC and the EEP
//! sub-channel profiles.
//!
//! The mother code output is split into blocks of 128 bits, and each block is
//! punctured by repeating one of the 32-bit vectors PI<sub>1</sub> through
//! PI<sub>24</sub> four times. The 24 bits coded from the tail are always punctured by
//! PI<sub>X</sub>.

use crate::bits::{SoftBit, ERASURE};
use crate::coding::trellis::{RATE, TAIL_BITS};

/// Mother code bits in each puncturing block.
pub const BLOCK_BITS: usize = 128;
/// Information bits in each puncturing block.
pub const BLOCK_INFO_BITS: usize = BLOCK_BITS / RATE;

/// Puncturing vectors PI<sub>1</sub> through PI<sub>24</sub>, first bit in the MSB.
/// Vector i keeps 8 + i bits out of 32.
const VECTORS: [u32; 24] = [
    0xC8888888, 0xC888C888, 0xC8C8C888, 0xC8C8C8C8,
    0xCCC8C8C8, 0xCCC8CCC8, 0xCCCCCCC8, 0xCCCCCCCC,
    0xECCCCCCC, 0xECCCECCC, 0xECECECCC, 0xECECECEC,
    0xEEECECEC, 0xEEECEEEC, 0xEEEEEEEC, 0xEEEEEEEE,
    0xFEEEEEEE, 0xFEEEFEEE, 0xFEFEFEEE, 0xFEFEFEFE,
    0xFFFEFEFE, 0xFFFEFFFE, 0xFFFFFFFE, 0xFFFFFFFF,
];

/// Tail puncturing vector PI<sub>X</sub>, 24 bits with the first bit in bit 23.
const TAIL_VECTOR: u32 = 0xCCCCCC;
/// Mother code bits coded from the tail.
const TAIL_MOTHER_BITS: usize = TAIL_BITS * RATE;

/// Check whether bit `idx` of the 32-bit vector PI<sub>vector</sub> is kept.
fn kept(vector: usize, idx: usize) -> bool {
    VECTORS[vector - 1] >> (31 - idx % 32) & 1 == 1
}

fn tail_kept(idx: usize) -> bool {
    TAIL_VECTOR >> (TAIL_MOTHER_BITS - 1 - idx) & 1 == 1
}

/// Run of puncturing blocks sharing the same vector.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Segment {
    /// Number of 128-bit mother code blocks.
    pub blocks: usize,
    /// Index i of the vector PI<sub>i</sub>, 1 through 24.
    pub vector: usize,
}

impl Segment {
    pub fn new(blocks: usize, vector: usize) -> Segment {
        assert!(vector >= 1 && vector <= VECTORS.len());

        Segment {
            blocks: blocks,
            vector: vector,
        }
    }

    /// Bits kept from this segment after puncturing.
    pub fn output_bits(&self) -> usize { self.blocks * 4 * (8 + self.vector) }
}

/// Puncturing profile of a whole convolutionally coded block: a sequence of segments
/// followed by the tail.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Puncturing {
    segments: Vec<Segment>,
}

impl Puncturing {
    /// Construct a new `Puncturing` from the given segments in transmission order.
    pub fn new(segments: Vec<Segment>) -> Puncturing {
        Puncturing { segments: segments }
    }

    /// Puncturing of one FIC block in modes I, II, and IV.
    pub fn fic() -> Puncturing {
        Puncturing::new(vec![Segment::new(21, 16), Segment::new(3, 15)])
    }

    /// Puncturing of the single FIC block in mode III.
    pub fn fic_mode_iii() -> Puncturing {
        Puncturing::new(vec![Segment::new(29, 16), Segment::new(3, 15)])
    }

    /// Number of information bits carried, excluding the tail.
    pub fn info_bits(&self) -> usize {
        self.segments.iter().map(|s| s.blocks).sum::<usize>() * BLOCK_INFO_BITS
    }

    /// Number of mother code bits, including the tail.
    pub fn mother_bits(&self) -> usize { (self.info_bits() + TAIL_BITS) * RATE }

    /// Number of transmitted bits after puncturing, including the tail.
    pub fn output_bits(&self) -> usize {
        self.segments.iter().map(Segment::output_bits).sum::<usize>() +
            TAIL_MOTHER_BITS / 2
    }

    /// Iterate over whether each mother code bit is transmitted.
    fn pattern(&self) -> impl Iterator<Item = bool> + '_ {
        self.segments.iter()
            .flat_map(|s| (0..s.blocks * BLOCK_BITS).map(move |i| kept(s.vector, i)))
            .chain((0..TAIL_MOTHER_BITS).map(tail_kept))
    }

    /// Expand the given punctured soft bits to mother code soft bits, inserting erasures
    /// where bits were removed. Return the number of input bits consumed.
    pub fn depuncture(&self, input: &[SoftBit], out: &mut Vec<SoftBit>) -> usize {
        let mut src = input.iter();
        let mut used = 0;

        out.clear();
        out.reserve(self.mother_bits());

        for keep in self.pattern() {
            out.push(if keep {
                match src.next() {
                    Some(&s) => {
                        used += 1;
                        s
                    },
                    None => ERASURE,
                }
            } else {
                ERASURE
            });
        }

        used
    }

    /// Remove the unsent bits from the given mother code bits.
    pub fn puncture(&self, mother: &[u8]) -> Vec<u8> {
        assert_eq!(mother.len(), self.mother_bits());

        mother.iter().zip(self.pattern())
            .filter(|&(_, keep)| keep)
            .map(|(&b, _)| b)
            .collect()
    }
}
