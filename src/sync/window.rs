//! Fine time synchronization: choosing the FFT window start from the channel impulse
//! response estimated with the phase reference symbol.

#[cfg(feature = "ser")]
use serde::{Deserialize, Serialize};

/// Width, in samples, of the bins used by `EarliestPeakWithBinning`.
const BIN_WIDTH: usize = 8;

/// Fraction of the strongest bin's energy a bin must reach to be taken as the first path.
const BIN_THRESHOLD: f32 = 0.1;

/// Level, relative to the strongest peak, a sample must reach to be taken as the first
/// path by `ThresholdBeforePeak`.
const PEAK_THRESHOLD_DB: f32 = 10.0;

/// Penalty applied by `StrongestPeak` to peaks far from the expected position, as a
/// fraction of the peak at the greatest distance.
const DISTANCE_WEIGHT: f32 = 0.15;

/// Policy for placing the FFT window.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "ser", derive(Serialize, Deserialize))]
pub enum WindowPlacement {
    /// Align to the strongest path, weighted slightly towards no change.
    StrongestPeak,
    /// Align to the earliest group of samples holding a significant share of the energy.
    EarliestPeakWithBinning,
    /// Align to the earliest sample within one guard interval before the strongest peak
    /// that comes within a fixed level of it.
    ThresholdBeforePeak,
}

impl Default for WindowPlacement {
    fn default() -> Self { WindowPlacement::StrongestPeak }
}

/// Convert a circular impulse response index to a signed offset.
fn signed(idx: usize, len: usize) -> isize {
    if idx < len / 2 { idx as isize } else { idx as isize - len as isize }
}

/// Convert a signed offset back to a circular index.
fn circular(offset: isize, len: usize) -> usize {
    offset.rem_euclid(len as isize) as usize
}

impl WindowPlacement {
    /// Choose the offset, in samples relative to the expected window start, of the first
    /// useful sample given the squared magnitude of the circular impulse response. The
    /// `guard` is the cyclic prefix length.
    pub fn place(&self, impulse: &[f32], guard: usize) -> isize {
        use self::WindowPlacement::*;

        match *self {
            StrongestPeak => strongest(impulse),
            EarliestPeakWithBinning => earliest_bin(impulse),
            ThresholdBeforePeak => before_peak(impulse, guard),
        }
    }
}

fn peak(impulse: &[f32]) -> usize {
    impulse.iter().enumerate()
        .fold((0, std::f32::MIN), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
        .0
}

fn strongest(impulse: &[f32]) -> isize {
    let len = impulse.len();
    let half = (len / 2) as f32;

    let best = impulse.iter().enumerate()
        .map(|(i, &v)| {
            let dist = signed(i, len).abs() as f32 / half;
            (i, v * (1.0 - DISTANCE_WEIGHT * dist))
        })
        .fold((0, std::f32::MIN), |(bi, bv), (i, v)| if v > bv { (i, v) } else { (bi, bv) })
        .0;

    signed(best, len)
}

fn earliest_bin(impulse: &[f32]) -> isize {
    let len = impulse.len();
    let half = (len / 2) as isize;

    // Bins in order of increasing signed offset.
    let bins = (0..len / BIN_WIDTH)
        .map(|b| {
            let start = -half + (b * BIN_WIDTH) as isize;
            let energy = (0..BIN_WIDTH as isize)
                .map(|i| impulse[circular(start + i, len)])
                .sum::<f32>();

            (start, energy)
        })
        .collect::<Vec<_>>();

    let max = bins.iter().map(|&(_, e)| e).fold(0.0, f32::max);

    let start = match bins.iter().find(|&&(_, e)| e >= max * BIN_THRESHOLD) {
        Some(&(s, _)) => s,
        None => return 0,
    };

    (start..start + BIN_WIDTH as isize)
        .fold((start, std::f32::MIN), |(bo, bv), o| {
            let v = impulse[circular(o, len)];
            if v > bv { (o, v) } else { (bo, bv) }
        })
        .0
}

fn before_peak(impulse: &[f32], guard: usize) -> isize {
    let len = impulse.len();
    let p = peak(impulse);
    let level = impulse[p] * 10f32.powf(-PEAK_THRESHOLD_DB / 10.0);
    let offset = signed(p, len);

    (offset - guard as isize..offset)
        .find(|&o| impulse[circular(o, len)] >= level)
        .unwrap_or(offset)
}
