//! Implements encoding and decoding of the rate-1/4, constraint-length 7 mother
//! convolutional code shared by the FIC and MSC. Encoding is done with a shift register
//! state machine and decoding is done with the soft-decision Viterbi algorithm.

use crate::bits::SoftBit;

/// Generator polynomials in octal, with the tap on the newest bit in the MSB.
const POLYS: [u8; 4] = [0o133, 0o171, 0o145, 0o133];

/// Number of registers in the encoder, including the input.
pub const CONSTRAINT: usize = 7;
/// Number of encoder states.
pub const STATES: usize = 1 << (CONSTRAINT - 1);
/// Number of zero bits appended to flush the encoder.
pub const TAIL_BITS: usize = CONSTRAINT - 1;
/// Output bits per input bit.
pub const RATE: usize = POLYS.len();

/// Compute the four output bits for the given 7-bit register contents, packed MSB first
/// into a nibble.
const fn outputs(reg: usize) -> u8 {
    let mut out = 0;
    let mut i = 0;

    while i < RATE {
        out = out << 1 | ((reg as u8 & POLYS[i]).count_ones() & 1) as u8;
        i += 1;
    }

    out
}

const fn build_outputs() -> [u8; 1 << CONSTRAINT] {
    let mut table = [0; 1 << CONSTRAINT];
    let mut reg = 0;

    while reg < table.len() {
        table[reg] = outputs(reg);
        reg += 1;
    }

    table
}

/// Maps register contents to the output nibble.
const OUTPUTS: [u8; 1 << CONSTRAINT] = build_outputs();

/// Convolutional code finite state machine. The state holds the previous 6 input bits
/// with the newest in the MSB.
pub struct ConvEncoder {
    state: usize,
}

impl ConvEncoder {
    /// Construct a new `ConvEncoder` at the all-zero state.
    pub fn new() -> ConvEncoder {
        ConvEncoder { state: 0 }
    }

    /// Apply the given bit to the state machine and return the 4 output bits.
    pub fn feed(&mut self, bit: u8) -> [u8; RATE] {
        let reg = (bit as usize & 1) << (CONSTRAINT - 1) | self.state;
        self.state = reg >> 1;

        let out = OUTPUTS[reg];
        [out >> 3 & 1, out >> 2 & 1, out >> 1 & 1, out & 1]
    }

    /// Encode the given bits and flush the state machine, producing
    /// 4 × (bits + 6) output bits.
    pub fn encode(mut self, bits: &[u8]) -> Vec<u8> {
        bits.iter()
            .cloned()
            .chain(std::iter::repeat(0).take(TAIL_BITS))
            .flat_map(|b| self.feed(b).to_vec())
            .collect()
    }
}

/// Decodes a terminated block of soft mother-code bits with the Viterbi algorithm.
///
/// Both the starting and ending states are known to be zero, so the survivor path is
/// traced back from the zero state after the whole block has been received.
pub struct ViterbiDecoder {
    /// Path metric of each state, where higher is better.
    metrics: [i32; STATES],
    next: [i32; STATES],
    /// Surviving predecessor bit of each state at each step.
    decisions: Vec<u64>,
}

/// Metric given to unreachable states.
const UNREACHABLE: i32 = i32::MIN / 2;

impl ViterbiDecoder {
    pub fn new() -> ViterbiDecoder {
        ViterbiDecoder {
            metrics: [UNREACHABLE; STATES],
            next: [UNREACHABLE; STATES],
            decisions: Vec::new(),
        }
    }

    /// Decode the given soft mother-code bits, which must hold a multiple of 4 bits and
    /// include the tail, into `out`, which receives 1 bit per 4 input bits less the tail.
    ///
    /// On success, return the number of hard channel bits that disagree with the
    /// re-encoded decision, which estimates the corrected channel errors.
    pub fn decode(&mut self, soft: &[SoftBit], out: &mut [u8]) -> Option<usize> {
        assert!(soft.len() % RATE == 0);

        let steps = soft.len() / RATE;

        if steps < TAIL_BITS || out.len() != steps - TAIL_BITS {
            return None;
        }

        self.metrics = [UNREACHABLE; STATES];
        self.metrics[0] = 0;
        self.decisions.clear();

        for sym in soft.chunks(RATE) {
            let branch = branch_metrics(sym);
            let mut decision = 0u64;

            for ns in 0..STATES {
                // Registers of the two transitions into `ns`, differing in the oldest bit.
                let reg = ns << 1;
                let prev = (ns << 1) & (STATES - 1);

                let m0 = self.metrics[prev] + branch[OUTPUTS[reg] as usize];
                let m1 = self.metrics[prev | 1] + branch[OUTPUTS[reg | 1] as usize];

                if m1 > m0 {
                    self.next[ns] = m1;
                    decision |= 1 << ns;
                } else {
                    self.next[ns] = m0;
                }
            }

            std::mem::swap(&mut self.metrics, &mut self.next);
            self.decisions.push(decision);
        }

        if self.metrics[0] <= UNREACHABLE / 2 {
            return None;
        }

        let mut state = 0;

        for (step, &decision) in self.decisions.iter().enumerate().rev() {
            if let Some(bit) = out.get_mut(step) {
                *bit = (state >> (CONSTRAINT - 2)) as u8;
            }

            state = (state << 1 & (STATES - 1)) | (decision >> state & 1) as usize;
        }

        Some(channel_errors(soft, out))
    }
}

/// Compute the correlation of the given 4 soft bits with every possible output nibble.
fn branch_metrics(sym: &[SoftBit]) -> [i32; 1 << RATE] {
    let mut metrics = [0; 1 << RATE];

    for (out, metric) in metrics.iter_mut().enumerate() {
        *metric = sym.iter().enumerate().map(|(i, &s)| {
            if out >> (RATE - 1 - i) & 1 == 1 { s as i32 } else { -(s as i32) }
        }).sum();
    }

    metrics
}

/// Count the non-erased soft bits whose sign disagrees with the re-encoded bits.
fn channel_errors(soft: &[SoftBit], bits: &[u8]) -> usize {
    ConvEncoder::new().encode(bits).into_iter()
        .zip(soft.iter())
        .filter(|&(b, &s)| s != 0 && (s > 0) != (b == 1))
        .count()
}
