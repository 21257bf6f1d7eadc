//! Coarse frequency correction: estimating the carrier offset in whole multiples of the
//! carrier spacing from the spectrum of the phase reference symbol.

use num::complex::Complex32;

#[cfg(feature = "ser")]
use serde::{Deserialize, Serialize};

use crate::consts::ModeParams;
use crate::ofdm::prs;

/// Guard carriers on each side of the band checked for silence by `PatternOfZeros`.
const GUARD_CARRIERS: i32 = 8;

/// Algorithm for estimating the integer carrier offset.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub enum CoarseCorrector {
    /// Find the shift of the K-carrier window holding the most energy.
    GetMiddle,
    /// Correlate the phase differences of adjacent carriers against the known phase
    /// reference.
    CorrelatePrs,
    /// Find the shift that puts the least energy on the carriers that must be empty:
    /// the DC carrier and the guard bands.
    PatternOfZeros,
}

impl Default for CoarseCorrector {
    fn default() -> Self { CoarseCorrector::CorrelatePrs }
}

impl CoarseCorrector {
    /// Estimate the offset, in carriers within ±`range`, of the given phase reference
    /// spectrum `bins` from the ideal `reference` spectrum, both in FFT bin order. A
    /// positive offset means the received carriers sit above their nominal bins.
    pub fn estimate(&self, params: &ModeParams, bins: &[Complex32],
                    reference: &[Complex32], range: i32) -> i32
    {
        use self::CoarseCorrector::*;

        let shifts = -range..=range;

        match *self {
            GetMiddle => best(shifts, |b| band_energy(params, bins, b)),
            CorrelatePrs => best(shifts, |b| prs_correlation(params, bins, reference, b)),
            PatternOfZeros => best(shifts, |b| -empty_energy(params, bins, b)),
        }
    }
}

/// Pick the shift with the highest score, preferring the smallest shift on ties.
fn best<I, F>(shifts: I, score: F) -> i32
    where I: Iterator<Item = i32>, F: Fn(i32) -> f32
{
    shifts.map(|b| (b, score(b)))
        .fold((0i32, std::f32::MIN), |(bb, bs), (b, s)| {
            if s > bs || (s == bs && b.abs() < bb.abs()) { (b, s) } else { (bb, bs) }
        }).0
}

fn power(params: &ModeParams, bins: &[Complex32], k: i32) -> f32 {
    bins[prs::bin(params, k)].norm_sqr()
}

/// Energy of the band -K/2..K/2 shifted by the given carriers.
fn band_energy(params: &ModeParams, bins: &[Complex32], shift: i32) -> f32 {
    let half = params.carriers as i32 / 2;
    (-half..=half).map(|k| power(params, bins, k + shift)).sum()
}

/// Energy on the DC carrier and the inner guard carriers, shifted by the given carriers.
fn empty_energy(params: &ModeParams, bins: &[Complex32], shift: i32) -> f32 {
    let half = params.carriers as i32 / 2;

    power(params, bins, shift) + (1..=GUARD_CARRIERS).map(|g| {
        power(params, bins, half + g + shift) + power(params, bins, -half - g + shift)
    }).sum::<f32>()
}

/// Magnitude of the correlation between the adjacent-carrier phase differences of the
/// received spectrum, shifted by the given carriers, and of the reference.
fn prs_correlation(params: &ModeParams, bins: &[Complex32], reference: &[Complex32],
                   shift: i32) -> f32
{
    let half = params.carriers as i32 / 2;

    (-half..half)
        .filter(|&k| k != 0 && k != -1)
        .map(|k| {
            let rx = bins[prs::bin(params, k + shift)].conj() *
                bins[prs::bin(params, k + 1 + shift)];
            let tx = reference[prs::bin(params, k)].conj() *
                reference[prs::bin(params, k + 1)];

            rx * tx.conj()
        })
        .fold(Complex32::default(), |s, x| s + x)
        .norm()
}
