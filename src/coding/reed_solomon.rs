//! Encoding and decoding of the (120, 110, 11) Reed-Solomon code protecting DAB+
//! superframes.
//!
//! The code is shortened from RS(255, 245) over GF(2<sup>8</sup>), with generator
//! g(x) = (x + α<sup>0</sup>)(x + α<sup>1</sup>) ··· (x + α<sup>9</sup>). In a
//! codeword, the first byte maps to the highest degree.

use crate::coding::bmcf;
use crate::coding::galois::{DabCodeword, Polynomial, PolynomialCoefs};

/// Bytes per codeword.
pub const WORD_BYTES: usize = 120;
/// Data bytes per codeword.
pub const DATA_BYTES: usize = 110;
/// Parity bytes per codeword.
pub const PARITY_BYTES: usize = WORD_BYTES - DATA_BYTES;

impl_polynomial_coefs!(WordCoefs, 11, WORD_BYTES);
impl_polynomial_coefs!(DecodeCoefs, 11);

/// Construct the generator polynomial g(x).
fn generator() -> Polynomial<DecodeCoefs> {
    (0..PARITY_BYTES).fold(Polynomial::unit_power(0), |g, pow| {
        g * Polynomial::new([
            DabCodeword::for_power(pow),
            DabCodeword::for_power(0),
        ].iter().cloned())
    })
}

/// Calculate the parity bytes for the first 110 data bytes in the given buffer, placing
/// them at the end of the buffer.
pub fn encode(buf: &mut [u8; WORD_BYTES]) {
    let gen = generator();
    // Remainder of the division by g(x), highest degree first.
    let mut rem = [DabCodeword::default(); PARITY_BYTES];

    for &byte in &buf[..DATA_BYTES] {
        let feedback = DabCodeword::new(byte) + rem[0];

        for i in 0..PARITY_BYTES - 1 {
            rem[i] = rem[i + 1] + feedback * gen.coef(PARITY_BYTES - 1 - i);
        }

        rem[PARITY_BYTES - 1] = feedback * gen.coef(0);
    }

    for (dest, r) in buf[DATA_BYTES..].iter_mut().zip(rem.iter()) {
        *dest = r.bits();
    }
}

/// Try to correct the given 120-byte word in place, fixing up to 5 byte errors.
///
/// If decoding was successful, return `Some(err)`, where `err` is the number of
/// corrected bytes. Otherwise, return `None` to indicate an unrecoverable error, in which
/// case the buffer is left untouched.
pub fn decode(buf: &mut [u8; WORD_BYTES]) -> Option<usize> {
    let word = Polynomial::<WordCoefs>::new(buf.iter().rev().map(|&b| DabCodeword::new(b)));
    let syn = syndromes(&word);

    if syn.degree().is_none() {
        return Some(0);
    }

    let (nerr, errs) = bmcf::Errors::new(syn)?;
    let mut fixed = *buf;

    for err in errs {
        let (loc, pattern) = err?;

        // Locations past the shortened length can't be corrected.
        if loc >= WORD_BYTES {
            return None;
        }

        let idx = WORD_BYTES - 1 - loc;
        fixed[idx] ^= pattern.bits();
    }

    if !check(&fixed) {
        return None;
    }

    *buf = fixed;

    Some(nerr)
}

/// Check if the given word is a valid codeword.
pub fn check(buf: &[u8; WORD_BYTES]) -> bool {
    let word = Polynomial::<WordCoefs>::new(buf.iter().rev().map(|&b| DabCodeword::new(b)));
    syndromes(&word).degree().is_none()
}

/// Calculate the syndrome polynomial s(x) = r(α<sup>0</sup>) + r(α<sup>1</sup>)x + ···
/// for the given word r(x).
fn syndromes(word: &Polynomial<WordCoefs>) -> Polynomial<DecodeCoefs> {
    Polynomial::new((0..DecodeCoefs::syndromes()).map(|pow| {
        word.eval(DabCodeword::for_power(pow))
    }))
}

#[cfg(test)]
mod test {
    use super::*;

    fn codeword(seed: u8) -> [u8; WORD_BYTES] {
        let mut buf = [0; WORD_BYTES];

        for (i, b) in buf[..DATA_BYTES].iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37).wrapping_add(seed);
        }

        encode(&mut buf);
        buf
    }

    #[test]
    fn verify_gen() {
        let g = generator();

        assert_eq!(g.degree(), Some(PARITY_BYTES));
        assert_eq!(g.coef(PARITY_BYTES), DabCodeword::for_power(0));

        for pow in 0..PARITY_BYTES {
            assert!(g.eval(DabCodeword::for_power(pow)).zero());
        }

        assert!(!g.eval(DabCodeword::for_power(PARITY_BYTES)).zero());
    }

    #[test]
    fn test_encode() {
        let buf = codeword(7);
        assert!(check(&buf));

        let mut zeros = [0; WORD_BYTES];
        encode(&mut zeros);
        assert_eq!(&zeros[..], &[0; WORD_BYTES][..]);

        let mut bad = buf;
        bad[50] ^= 1;
        assert!(!check(&bad));
    }

    #[test]
    fn test_decode() {
        let orig = codeword(99);

        let mut buf = orig;
        assert_eq!(decode(&mut buf), Some(0));

        buf[0] ^= 0xFF;
        assert_eq!(decode(&mut buf), Some(1));
        assert_eq!(&buf[..], &orig[..]);

        for &pos in &[0, 17, 60, 109, 119] {
            buf[pos] ^= (pos as u8) | 0x40;
        }

        assert_eq!(decode(&mut buf), Some(5));
        assert_eq!(&buf[..], &orig[..]);

        // Parity-only errors are corrected too.
        buf[110] = !buf[110];
        buf[115] ^= 0x10;
        assert_eq!(decode(&mut buf), Some(2));
        assert_eq!(&buf[..], &orig[..]);
    }

    #[test]
    fn test_unrecoverable() {
        let orig = codeword(3);
        let mut buf = orig;

        for pos in 0..6 {
            buf[pos * 20] ^= 0xA5;
        }

        let corrupt = buf;

        assert_eq!(decode(&mut buf), None);
        assert_eq!(&buf[..], &corrupt[..]);
    }
}
