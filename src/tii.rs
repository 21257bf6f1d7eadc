//! Transmitter identification from the carrier pattern of the null symbol.
//!
//! A transmitter identifies itself by sending pairs of adjacent carriers k, k + 1 in the
//! null symbol, where k = b<sub>0</sub> + 2c + 48b for each base b<sub>0</sub>, the
//! sub-identifier c, and each of the four set bits b of the 8-bit pattern of the main
//! identifier.

use std::sync::Arc;

use num::complex::Complex32;
use rustfft::{Fft, FftPlanner};

#[cfg(feature = "ser")]
use serde::{Deserialize, Serialize};

use crate::consts::{ModeParams, TransmissionMode};
use crate::ofdm::prs;

/// Base carriers of each group in mode I.
const BASES: [i32; 4] = [-768, -384, 1, 385];

/// Number of sub-identifiers.
pub const SUB_IDS: usize = 24;

/// Number of main identifiers.
pub const MAIN_IDS: usize = 70;

/// Minimum ratio of a carrier pair's power to the average carrier power for the pair
/// to be taken as present.
const PAIR_THRESHOLD: f32 = 8.0;

/// Compute the 8-bit carrier pattern of the given main identifier: the words with four
/// set bits in increasing order.
pub fn pattern(main: usize) -> Option<u8> {
    (0..=255u8).filter(|w| w.count_ones() == 4).nth(main)
}

/// Find the main identifier of the given carrier pattern.
pub fn main_id(pattern: u8) -> Option<usize> {
    (0..=255u8).filter(|w| w.count_ones() == 4).position(|w| w == pattern)
}

/// Carriers, as the lower carrier k of each pair, sent by the given transmitter.
pub fn carriers(main: usize, sub: usize) -> Vec<i32> {
    let pat = match pattern(main) {
        Some(p) if sub < SUB_IDS => p,
        _ => return vec![],
    };

    BASES.iter()
        .flat_map(|&base| {
            (0..8).filter(move |b| pat >> b & 1 == 1)
                .map(move |b| base + 2 * sub as i32 + 48 * b)
        })
        .collect()
}

/// A transmitter identified in a null symbol.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub struct TiiMatch {
    /// Main identifier (0 through 69).
    pub main: u8,
    /// Sub-identifier (0 through 23).
    pub sub: u8,
    /// Power of the weakest identifying pair over the average carrier power, in dB.
    pub strength: f32,
}

/// Decodes transmitter identifiers from null symbols.
pub struct TiiDecoder {
    params: ModeParams,
    fft: Arc<dyn Fft<f32>>,
    bins: Vec<Complex32>,
}

impl TiiDecoder {
    pub fn new(mode: TransmissionMode) -> TiiDecoder {
        let params = mode.params();

        TiiDecoder {
            params: params,
            fft: FftPlanner::<f32>::new().plan_fft_forward(params.fft_len),
            bins: vec![Complex32::default(); params.fft_len],
        }
    }

    /// Find the transmitters in the given null symbol, strongest first. Only mode I
    /// identification is supported, and other modes yield no matches.
    pub fn decode(&mut self, null: &[Complex32]) -> Vec<TiiMatch> {
        let size = self.params.fft_len;

        if self.params.mode != TransmissionMode::I || null.len() < size {
            return vec![];
        }

        // The end of the null is clear of the previous frame.
        self.bins.copy_from_slice(&null[null.len() - size..]);
        self.fft.process(&mut self.bins);

        let params = self.params;
        let bins = &self.bins;
        let power = |k: i32| bins[prs::bin(&params, k)].norm_sqr();

        let avg = prs::carriers(&params).map(&power).sum::<f32>() /
            params.carriers as f32;

        if !(avg > 0.0) {
            return vec![];
        }

        let mut matches = (0..SUB_IDS)
            .filter_map(|c| {
                // Mean pair power of each pattern bit across the groups.
                let mut levels = (0..8)
                    .map(|b| {
                        let sum = BASES.iter()
                            .map(|&base| base + 2 * c as i32 + 48 * b)
                            .map(|k| power(k) + power(k + 1))
                            .sum::<f32>();

                        (b, sum / (2 * BASES.len()) as f32 / avg)
                    })
                    .collect::<Vec<_>>();

                levels.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

                let weakest = levels[3].1;

                if weakest < PAIR_THRESHOLD || levels[4].1 >= PAIR_THRESHOLD {
                    return None;
                }

                let pat = levels[..4].iter().fold(0u8, |p, &(b, _)| p | 1 << b);

                main_id(pat).map(|main| TiiMatch {
                    main: main as u8,
                    sub: c as u8,
                    strength: 10.0 * weakest.log10(),
                })
            })
            .collect::<Vec<_>>();

        matches.sort_by(|a, b| {
            b.strength.partial_cmp(&a.strength).unwrap_or(std::cmp::Ordering::Equal)
        });

        matches
    }
}
