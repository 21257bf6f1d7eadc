//! OFDM demodulation: FFT of each symbol, differential QPSK detection against the
//! previous symbol, and frequency de-interleaving into soft bits.

use std::sync::Arc;

use num::complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::bits::{SoftBit, ERASURE};
use crate::consts::{ModeParams, TransmissionMode};
use crate::error::{DabError, Result};

pub mod prs;

/// Compute the frequency interleaving table: entry n is the index, into the carriers
/// ordered from -K/2 to K/2 without DC, of the carrier holding QPSK symbol n.
pub fn carrier_map(params: &ModeParams) -> Vec<usize> {
    let size = params.fft_len;
    let half = params.carriers / 2;
    let (lo, hi) = (size / 2 - half, size / 2 + half);

    let mut map = Vec::with_capacity(params.carriers);
    let mut pi = 0;

    for _ in 0..size {
        if pi >= lo && pi <= hi && pi != size / 2 {
            // Carrier k = pi - size/2, shifted past the missing DC carrier.
            map.push(if pi < size / 2 { pi - lo } else { pi - lo - 1 });
        }

        pi = (13 * pi + size / 4 - 1) % size;
    }

    map
}

/// Map the given bit pair to a unit-energy QPSK point.
pub fn qpsk(re: u8, im: u8) -> Complex32 {
    let level = std::f32::consts::FRAC_1_SQRT_2;

    Complex32::new(
        if re & 1 == 0 { level } else { -level },
        if im & 1 == 0 { level } else { -level },
    )
}

/// Convert a differential phasor to the soft decisions of its two bits.
fn soft_bits(diff: Complex32) -> (SoftBit, SoftBit) {
    let norm = diff.norm();

    if !(norm > 0.0) {
        return (ERASURE, ERASURE);
    }

    // Ideal points lie at ±1/√2 after normalization.
    let scale = 127.0 * std::f32::consts::SQRT_2 / norm;
    let quantize = |x: f32| (-x * scale).max(-127.0).min(127.0).round() as SoftBit;

    (quantize(diff.re), quantize(diff.im))
}

/// Demodulates the symbols of a frame, strictly in order.
pub struct Demodulator {
    params: ModeParams,
    fft: Arc<dyn Fft<f32>>,
    /// FFT input/output buffer.
    bins: Vec<Complex32>,
    map: Vec<usize>,
    /// Carriers of the previous symbol, from -K/2 to K/2 without DC.
    prev: Vec<Complex32>,
    /// Carriers of the current symbol.
    cur: Vec<Complex32>,
    /// Index of the next symbol expected, with 0 as the phase reference.
    expected: usize,
}

impl Demodulator {
    pub fn new(mode: TransmissionMode) -> Demodulator {
        let params = mode.params();

        Demodulator {
            params: params,
            fft: FftPlanner::<f32>::new().plan_fft_forward(params.fft_len),
            bins: vec![Complex32::default(); params.fft_len],
            map: carrier_map(&params),
            prev: vec![Complex32::default(); params.carriers],
            cur: vec![Complex32::default(); params.carriers],
            expected: 0,
        }
    }

    /// Forget the differential reference and wait for the next phase reference symbol.
    pub fn reset(&mut self) {
        self.expected = 0;

        for c in self.prev.iter_mut() {
            *c = Complex32::default();
        }
    }

    /// Index of the next symbol expected.
    pub fn expected(&self) -> usize { self.expected }

    /// Carriers of the most recently demodulated symbol, from -K/2 to K/2 without DC.
    pub fn carriers(&self) -> &[Complex32] { &self.cur[..] }

    /// Demodulate the symbol with the given index in its frame, where `samples` holds
    /// the whole symbol including its cyclic prefix. The phase reference (index 0) only
    /// loads the differential reference. Data symbols write 2K soft bits into `bits`,
    /// bit n from the real part and bit n + K from the imaginary part of QPSK symbol n.
    ///
    /// A symbol out of sequence is rejected with `DabError::SymbolOrder` and resets the
    /// demodulator.
    pub fn feed(&mut self, index: usize, samples: &[Complex32], bits: &mut [SoftBit])
        -> Result<()>
    {
        if index != self.expected {
            let expected = self.expected;
            self.reset();

            return Err(DabError::SymbolOrder {
                expected: expected,
                got: index,
            });
        }

        assert!(samples.len() >= self.params.symbol_len);

        self.transform(samples);

        if index > 0 {
            self.differentiate(bits);
        }

        self.prev.copy_from_slice(&self.cur);

        self.expected = if index + 1 == self.params.symbols { 0 } else { index + 1 };

        Ok(())
    }

    /// FFT the useful part of the given symbol into `cur`.
    fn transform(&mut self, samples: &[Complex32]) {
        let prefix = self.params.prefix_len();
        let size = self.params.fft_len;
        let half = self.params.carriers / 2;

        self.bins.copy_from_slice(&samples[prefix..prefix + size]);
        self.fft.process(&mut self.bins);

        for (i, c) in self.cur.iter_mut().enumerate() {
            *c = if i < half {
                self.bins[size - half + i]
            } else {
                self.bins[i - half + 1]
            };
        }
    }

    /// Detect the phase differences between `cur` and `prev` and de-interleave them
    /// into soft bits.
    fn differentiate(&self, bits: &mut [SoftBit]) {
        let k = self.params.carriers;
        assert!(bits.len() >= 2 * k);

        for (n, &idx) in self.map.iter().enumerate() {
            let (re, im) = soft_bits(self.cur[idx] * self.prev[idx].conj());

            bits[n] = re;
            bits[n + k] = im;
        }
    }
}
