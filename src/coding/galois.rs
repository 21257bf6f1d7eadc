//! Galois field arithmetic for codewords and polynomials.

use collect_slice::CollectSlice;

/// GF(2<sup>8</sup>) field characterized by α<sup>8</sup>+α<sup>4</sup>+α<sup>3</sup>+
/// α<sup>2</sup>+1, as used by the DAB+ outer code.
#[derive(Copy, Clone, Debug)]
pub struct DabField;

/// Maps power i to the bit pattern of α<sup>i</sup>.
const CODEWORDS: [u8; 255] = build_codewords();
/// Maps the bit pattern of α<sup>i</sup>, less one, to the power i.
const POWERS: [u8; 255] = build_powers();

const fn build_codewords() -> [u8; 255] {
    let mut table = [0; 255];
    let mut word: u16 = 1;
    let mut i = 0;

    while i < 255 {
        table[i] = word as u8;

        word <<= 1;

        if word & 0x100 != 0 {
            word ^= 0x11D;
        }

        i += 1;
    }

    table
}

const fn build_powers() -> [u8; 255] {
    let codewords = build_codewords();
    let mut table = [0; 255];
    let mut i = 0;

    while i < 255 {
        table[codewords[i] as usize - 1] = i as u8;
        i += 1;
    }

    table
}

impl GaloisField for DabField {
    fn size() -> usize { 255 }
    fn codeword(pow: usize) -> u8 { CODEWORDS[pow] }
    fn power(codeword: usize) -> usize { POWERS[codeword] as usize }
}

/// Codeword in the DAB+ Galois field.
pub type DabCodeword = Codeword<DabField>;

/// A GF(2<sup>r</sup>) Galois field with r ≤ 8.
pub trait GaloisField {
    /// Number of unique nonzero codewords in the field: 2<sup>r</sup> - 1.
    fn size() -> usize;
    /// Map the given power i to codeword α<sup>i</sup>.
    fn codeword(pow: usize) -> u8;
    /// Map the given codeword α<sup>i</sup>, as a zero-based index, to its power i.
    fn power(codeword: usize) -> usize;

    /// Map the given power i to codeword α<sup>m</sup> ≡ α<sup>i</sup> (modulo the size
    /// of the field.)
    fn codeword_modded(pow: usize) -> u8 {
        Self::codeword(pow % Self::size())
    }
}

/// Codeword in a Galois field.
#[derive(Copy, Clone)]
pub struct Codeword<F: GaloisField> {
    field: std::marker::PhantomData<F>,
    bits: u8,
}

impl<F: GaloisField> Codeword<F> {
    /// Construct a new `Codeword` from the given bit pattern.
    pub fn new(bits: u8) -> Codeword<F> {
        Codeword {
            field: std::marker::PhantomData,
            bits: bits,
        }
    }

    /// Construct the codeword α<sup>i</sup> for the given power i, modulo the field.
    pub fn for_power(power: usize) -> Codeword<F> {
        Codeword::new(F::codeword_modded(power))
    }

    /// Retrieve the bit pattern of the codeword.
    pub fn bits(&self) -> u8 { self.bits }

    /// Check if the codeword is zero.
    pub fn zero(&self) -> bool { self.bits == 0 }

    /// Retrieve the power i of the codeword α<sup>i</sup>, or `None` for the zero
    /// codeword.
    pub fn power(&self) -> Option<usize> {
        if self.zero() {
            None
        } else {
            Some(F::power(self.bits as usize - 1))
        }
    }

    /// Find 1/α<sup>i</sup> for the current codeword α<sup>i</sup>. Panic if the codeword
    /// is zero.
    pub fn invert(self) -> Codeword<F> {
        match self.power() {
            Some(p) => Codeword::for_power(F::size() - p),
            None => panic!("invert zero"),
        }
    }

    /// Compute (α<sup>i</sup>)<sup>p</sup> for the given power p.
    pub fn pow(&self, pow: usize) -> Codeword<F> {
        match self.power() {
            Some(p) => Codeword::for_power(p * pow),
            None => Codeword::default(),
        }
    }
}

impl<F: GaloisField> Default for Codeword<F> {
    /// Construct the zero codeword.
    fn default() -> Self {
        Codeword::new(0)
    }
}

impl<F: GaloisField> std::ops::Add for Codeword<F> {
    type Output = Codeword<F>;

    fn add(self, rhs: Codeword<F>) -> Self::Output {
        Codeword::new(self.bits ^ rhs.bits)
    }
}

/// Subtraction is the same as addition in characteristic 2.
impl<F: GaloisField> std::ops::Sub for Codeword<F> {
    type Output = Codeword<F>;

    fn sub(self, rhs: Codeword<F>) -> Self::Output {
        self + rhs
    }
}

impl<F: GaloisField> std::ops::Mul for Codeword<F> {
    type Output = Codeword<F>;

    fn mul(self, rhs: Codeword<F>) -> Self::Output {
        match (self.power(), rhs.power()) {
            (Some(p), Some(q)) => Codeword::for_power(p + q),
            _ => Codeword::default(),
        }
    }
}

/// Divide codewords. Panic if the divisor is zero.
impl<F: GaloisField> std::ops::Div for Codeword<F> {
    type Output = Codeword<F>;

    fn div(self, rhs: Codeword<F>) -> Self::Output {
        match (self.power(), rhs.power()) {
            (Some(p), Some(q)) => Codeword::for_power(F::size() + p - q),
            (None, Some(_)) => Codeword::default(),
            (_, None) => panic!("divide by zero"),
        }
    }
}

impl<F: GaloisField> PartialEq for Codeword<F> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<F: GaloisField> Eq for Codeword<F> {}

impl<F: GaloisField> PartialEq<u8> for Codeword<F> {
    fn eq(&self, other: &u8) -> bool {
        self.bits == *other
    }
}

impl<F: GaloisField> std::fmt::Debug for Codeword<F> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.power() {
            Some(p) => write!(fmt, "α^{}", p),
            None => write!(fmt, "0"),
        }
    }
}

/// Coefficient storage for a bounded-degree polynomial of a particular code.
pub trait PolynomialCoefs: Default + Copy + Clone +
    std::ops::Deref<Target = [DabCodeword]> + std::ops::DerefMut
{
    /// The minimum Hamming distance, d, in (n,k,d).
    fn distance() -> usize;

    /// Maximum number of correctable errors: t.
    fn errors() -> usize { Self::distance() / 2 }

    /// Number of syndromes: 2t.
    fn syndromes() -> usize { 2 * Self::errors() }
}

/// Create a coefficient storage buffer for the code of the given distance. In the first
/// form the buffer holds the decoding polynomials, and in the second it has the given
/// size.
macro_rules! impl_polynomial_coefs {
    ($name:ident, $dist:expr) => {
        impl_polynomial_coefs!($name, $dist, $dist + 1);
    };
    ($name:ident, $dist:expr, $len:expr) => {
        #[derive(Copy, Clone)]
        struct $name([DabCodeword; $len]);

        impl PolynomialCoefs for $name {
            fn distance() -> usize { $dist }
        }

        impl Default for $name {
            fn default() -> Self {
                $name([DabCodeword::default(); $len])
            }
        }

        impl std::ops::Deref for $name {
            type Target = [DabCodeword];
            fn deref(&self) -> &Self::Target { &self.0[..] }
        }

        impl std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target { &mut self.0[..] }
        }
    };
}

/// Polynomial with GF(2<sup>8</sup>) coefficients, stored lowest degree first.
#[derive(Copy, Clone)]
pub struct Polynomial<P: PolynomialCoefs> {
    coefs: P,
}

impl<P: PolynomialCoefs> Polynomial<P> {
    /// Construct a new `Polynomial` c<sub>0</sub> + c<sub>1</sub>x + ··· +
    /// c<sub>k</sub>x<sup>k</sup> from the given coefficients. Coefficients beyond the
    /// storage are dropped.
    pub fn new<T: Iterator<Item = DabCodeword>>(mut init: T) -> Self {
        let mut coefs = P::default();
        init.collect_slice(&mut coefs[..]);

        Polynomial { coefs: coefs }
    }

    /// Construct the single term x<sup>n</sup>.
    pub fn unit_power(n: usize) -> Self {
        let mut coefs = P::default();
        coefs[n] = Codeword::for_power(0);

        Polynomial { coefs: coefs }
    }

    /// Retrieve the degree-0 coefficient.
    pub fn constant(&self) -> DabCodeword { self.coefs[0] }

    /// Compute deg(p(x)), or `None` if p(x) = 0.
    pub fn degree(&self) -> Option<usize> {
        self.coefs.iter().rposition(|c| !c.zero())
    }

    /// Retrieve the coefficient of the x<sup>i</sup> term, which is 0 past the storage.
    pub fn coef(&self, i: usize) -> DabCodeword {
        self.coefs.get(i).cloned().unwrap_or_default()
    }

    /// Evaluate p(x) at the given point with Horner's method.
    pub fn eval(&self, x: DabCodeword) -> DabCodeword {
        self.coefs.iter().rev().fold(DabCodeword::default(), |s, &coef| s * x + coef)
    }

    /// Drop all terms of degree greater than the given degree.
    pub fn truncate(mut self, deg: usize) -> Polynomial<P> {
        for c in self.coefs.iter_mut().skip(deg + 1) {
            *c = DabCodeword::default();
        }

        self
    }

    /// Compute the formal derivative p'(x). Even powers vanish in characteristic 2.
    pub fn deriv(mut self) -> Polynomial<P> {
        for i in 0..self.coefs.len() {
            self.coefs[i] = if i % 2 == 0 { self.coef(i + 1) } else { DabCodeword::default() };
        }

        self
    }
}

impl<P: PolynomialCoefs> Default for Polynomial<P> {
    /// Construct p(x) = 0.
    fn default() -> Self {
        Polynomial::new(std::iter::empty())
    }
}

impl<P: PolynomialCoefs> std::ops::Deref for Polynomial<P> {
    type Target = [DabCodeword];
    fn deref(&self) -> &Self::Target { &self.coefs[..] }
}

impl<P: PolynomialCoefs> std::ops::DerefMut for Polynomial<P> {
    fn deref_mut(&mut self) -> &mut Self::Target { &mut self.coefs[..] }
}

impl<P: PolynomialCoefs> std::ops::Add for Polynomial<P> {
    type Output = Polynomial<P>;

    fn add(mut self, rhs: Polynomial<P>) -> Self::Output {
        for (c, &r) in self.coefs.iter_mut().zip(rhs.coefs.iter()) {
            *c = *c + r;
        }

        self
    }
}

/// Scale every coefficient by a codeword.
impl<P: PolynomialCoefs> std::ops::Mul<DabCodeword> for Polynomial<P> {
    type Output = Polynomial<P>;

    fn mul(mut self, rhs: DabCodeword) -> Self::Output {
        for coef in self.coefs.iter_mut() {
            *coef = *coef * rhs;
        }

        self
    }
}

/// Multiply polynomials. Terms past the storage are discarded, so this computes
/// p(x)q(x) mod x<sup>n+1</sup> for storage of n+1 coefficients.
impl<P: PolynomialCoefs> std::ops::Mul<Polynomial<P>> for Polynomial<P> {
    type Output = Polynomial<P>;

    fn mul(self, rhs: Polynomial<P>) -> Self::Output {
        let mut out = Polynomial::<P>::default();

        for (i, &coef) in self.iter().enumerate().filter(|&(_, c)| !c.zero()) {
            for (j, &mult) in rhs.iter().enumerate() {
                if let Some(c) = out.coefs.get_mut(i + j) {
                    *c = *c + coef * mult;
                }
            }
        }

        out
    }
}

impl<P: PolynomialCoefs> std::fmt::Debug for Polynomial<P> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "Polynomial({:?})", &self.coefs[..])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    impl_polynomial_coefs!(TestCoefs, 11);
    type TestPolynomial = Polynomial<TestCoefs>;

    #[test]
    fn test_tables() {
        assert_eq!(DabCodeword::for_power(0), 1);
        assert_eq!(DabCodeword::for_power(1), 0b10);
        assert_eq!(DabCodeword::for_power(8), 0x1D);
        assert_eq!(DabCodeword::for_power(255), 1);

        for i in 0..255 {
            assert_eq!(DabCodeword::for_power(i).power(), Some(i));
        }

        assert_eq!(DabCodeword::default().power(), None);
    }

    #[test]
    fn test_ops() {
        let a = DabCodeword::for_power(200);
        let b = DabCodeword::for_power(100);

        assert_eq!(a * b, DabCodeword::for_power(45));
        assert_eq!(a / b, DabCodeword::for_power(100));
        assert_eq!(b / a, DabCodeword::for_power(155));
        assert_eq!(a * a.invert(), DabCodeword::for_power(0));
        assert_eq!(a + a, DabCodeword::default());
        assert_eq!(a - b, a + b);
        assert_eq!(b.pow(3), DabCodeword::for_power(45));
        assert_eq!(DabCodeword::default() * a, DabCodeword::default());
        // x^7 * x reduces by the field polynomial.
        assert_eq!(DabCodeword::new(0x80) * DabCodeword::new(0x02), DabCodeword::new(0x1D));
    }

    #[test]
    fn test_polynomial() {
        // (1 + α^3 x)(1 + α^7 x) = 1 + (α^3 + α^7)x + α^10 x^2
        let p = TestPolynomial::new([
            DabCodeword::for_power(0),
            DabCodeword::for_power(3),
        ].iter().cloned()) * TestPolynomial::new([
            DabCodeword::for_power(0),
            DabCodeword::for_power(7),
        ].iter().cloned());

        assert_eq!(p.degree(), Some(2));
        assert_eq!(p.constant(), DabCodeword::for_power(0));
        assert_eq!(p.coef(1), DabCodeword::for_power(3) + DabCodeword::for_power(7));
        assert_eq!(p.coef(2), DabCodeword::for_power(10));
        assert_eq!(p.coef(40), DabCodeword::default());

        // Roots at α^-3 and α^-7.
        assert!(p.eval(DabCodeword::for_power(3).invert()).zero());
        assert!(p.eval(DabCodeword::for_power(7).invert()).zero());
        assert!(!p.eval(DabCodeword::for_power(5)).zero());

        let d = p.deriv();
        assert_eq!(d.degree(), Some(0));
        assert_eq!(d.constant(), p.coef(1));

        assert_eq!(p.truncate(1).degree(), Some(1));
        assert_eq!((p + p).degree(), None);
        assert_eq!(TestPolynomial::unit_power(4).degree(), Some(4));
        assert_eq!(TestPolynomial::default().degree(), None);
    }
}
