//! Phase reference symbol generation.
//!
//! Each carrier k of the phase reference has phase φ<sub>k</sub> = π/2 ⋅
//! (h<sub>i,k-k'</sub> + n), where the row (k', i, n) covering k is taken from the
//! mode's table and h<sub>i</sub> is one of four fixed 32-element sequences.

use num::complex::Complex32;

use crate::consts::{ModeParams, TransmissionMode};

/// Sequences h<sub>0</sub> through h<sub>3</sub>.
const H: [[u8; 32]; 4] = [
    [0, 2, 0, 0, 0, 0, 1, 1, 2, 0, 0, 0, 2, 2, 1, 1,
     0, 2, 0, 0, 0, 0, 1, 1, 2, 0, 0, 0, 2, 2, 1, 1],
    [0, 3, 2, 3, 0, 1, 3, 0, 2, 1, 2, 3, 2, 3, 3, 0,
     0, 3, 2, 3, 0, 1, 3, 0, 2, 1, 2, 3, 2, 3, 3, 0],
    [0, 0, 0, 2, 0, 2, 1, 3, 2, 2, 0, 2, 2, 0, 1, 3,
     0, 0, 0, 2, 0, 2, 1, 3, 2, 2, 0, 2, 2, 0, 1, 3],
    [0, 1, 2, 1, 0, 3, 3, 2, 2, 3, 2, 1, 2, 1, 3, 2,
     0, 1, 2, 1, 0, 3, 3, 2, 2, 3, 2, 1, 2, 1, 3, 2],
];

/// Rows (k', i, n), each covering carriers k' through k' + 31.
const MODE_I: [(i16, u8, u8); 48] = [
    (-768, 0, 1), (-736, 1, 2), (-704, 2, 0), (-672, 3, 1),
    (-640, 0, 3), (-608, 1, 2), (-576, 2, 2), (-544, 3, 3),
    (-512, 0, 2), (-480, 1, 1), (-448, 2, 2), (-416, 3, 3),
    (-384, 0, 1), (-352, 1, 2), (-320, 2, 3), (-288, 3, 3),
    (-256, 0, 2), (-224, 1, 2), (-192, 2, 2), (-160, 3, 1),
    (-128, 0, 1), (-96, 1, 3), (-64, 2, 1), (-32, 3, 2),
    (1, 0, 3), (33, 3, 1), (65, 2, 1), (97, 1, 1),
    (129, 0, 2), (161, 3, 2), (193, 2, 1), (225, 1, 0),
    (257, 0, 2), (289, 3, 2), (321, 2, 3), (353, 1, 3),
    (385, 0, 0), (417, 3, 2), (449, 2, 1), (481, 1, 3),
    (513, 0, 3), (545, 3, 3), (577, 2, 3), (609, 1, 0),
    (641, 0, 3), (673, 3, 0), (705, 2, 1), (737, 1, 1),
];

const MODE_II: [(i16, u8, u8); 12] = [
    (-192, 0, 2), (-160, 1, 3), (-128, 2, 2), (-96, 3, 2),
    (-64, 0, 1), (-32, 1, 2), (1, 2, 0), (33, 1, 2),
    (65, 0, 2), (97, 3, 1), (129, 2, 0), (161, 1, 3),
];

const MODE_III: [(i16, u8, u8); 6] = [
    (-96, 0, 2), (-64, 1, 3), (-32, 2, 0),
    (1, 3, 2), (33, 2, 2), (65, 1, 2),
];

const MODE_IV: [(i16, u8, u8); 24] = [
    (-384, 0, 0), (-352, 1, 1), (-320, 2, 1), (-288, 3, 2),
    (-256, 0, 2), (-224, 1, 2), (-192, 2, 0), (-160, 3, 3),
    (-128, 0, 3), (-96, 1, 1), (-64, 2, 3), (-32, 3, 2),
    (1, 0, 0), (33, 3, 1), (65, 2, 0), (97, 1, 2),
    (129, 0, 0), (161, 3, 1), (193, 2, 2), (225, 1, 2),
    (257, 0, 2), (289, 3, 1), (321, 2, 3), (353, 1, 0),
];

fn rows(mode: TransmissionMode) -> &'static [(i16, u8, u8)] {
    use crate::consts::TransmissionMode::*;

    match mode {
        I => &MODE_I[..],
        II => &MODE_II[..],
        III => &MODE_III[..],
        IV => &MODE_IV[..],
    }
}

/// Compute the phase of carrier k as a multiple of π/2, or `None` if the carrier isn't
/// active in the mode.
pub fn phase(mode: TransmissionMode, k: i32) -> Option<u8> {
    rows(mode).iter()
        .find(|&&(start, _, _)| k >= start as i32 && k < start as i32 + 32)
        .map(|&(start, i, n)| (H[i as usize][(k - start as i32) as usize] + n) % 4)
}

/// Map a multiple of π/2 to the unit phasor.
fn phasor(quarter: u8) -> Complex32 {
    match quarter % 4 {
        0 => Complex32::new(1.0, 0.0),
        1 => Complex32::new(0.0, 1.0),
        2 => Complex32::new(-1.0, 0.0),
        _ => Complex32::new(0.0, -1.0),
    }
}

/// Map carrier k to its FFT bin.
pub fn bin(params: &ModeParams, k: i32) -> usize {
    k.rem_euclid(params.fft_len as i32) as usize
}

/// Iterate over the active carriers of the mode in increasing frequency, skipping DC.
pub fn carriers(params: &ModeParams) -> impl Iterator<Item = i32> {
    let half = params.carriers as i32 / 2;
    (-half..=half).filter(|&k| k != 0)
}

/// Generate the phase reference in FFT bin order, with zeros on inactive bins.
pub fn reference(params: &ModeParams) -> Vec<Complex32> {
    let mut bins = vec![Complex32::new(0.0, 0.0); params.fft_len];

    for k in carriers(params) {
        if let Some(quarter) = phase(params.mode, k) {
            bins[bin(params, k)] = phasor(quarter);
        }
    }

    bins
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::consts::TransmissionMode::*;

    #[test]
    fn test_coverage() {
        for &mode in &[I, II, III, IV] {
            let params = mode.params();

            assert_eq!(rows(mode).len() * 32, params.carriers);
            assert_eq!(carriers(&params).count(), params.carriers);
            assert!(carriers(&params).all(|k| phase(mode, k).is_some()));
            assert_eq!(phase(mode, 0), None);
            assert_eq!(phase(mode, params.carriers as i32 / 2 + 1), None);

            let r = reference(&params);
            assert_eq!(r.iter().filter(|z| z.norm() > 0.5).count(), params.carriers);
            assert_eq!(r[0], Complex32::new(0.0, 0.0));
        }
    }

    #[test]
    fn test_phases() {
        // First row of mode I: h_0 offset by 1.
        assert_eq!(phase(I, -768), Some(1));
        assert_eq!(phase(I, -767), Some(3));
        // Carrier 1 of mode I uses h_0 offset by 3.
        assert_eq!(phase(I, 1), Some(3));
        assert_eq!(phase(I, 768), Some((H[1][31] + 1) % 4));
        assert_eq!(phase(III, 96), Some((H[1][31] + 2) % 4));

        let params = I.params();
        assert_eq!(bin(&params, -1), 2047);
        assert_eq!(bin(&params, 5), 5);
    }
}
