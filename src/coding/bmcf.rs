//! Decodes Reed-Solomon codes using the Berlekamp-Massey, Chien Search, and Forney
//! algorithms.
//!
//! # Decoding Procedure
//!
//! For a code whose generator has the roots α<sup>0</sup>, ..., α<sup>2t-1</sup>:
//!
//! 1. Generate the syndromes s<sub>j</sub> = r(α<sup>j</sup>), 0 ≤ j < 2t, from the
//!    received word polynomial r(x), and collect them into s(x) = s<sub>0</sub> +
//!    s<sub>1</sub>x + ··· + s<sub>2t-1</sub>x<sup>2t-1</sup>.
//! 2. Synthesize the error locator Λ(x) = (1 + X<sub>1</sub>x) ··· (1 +
//!    X<sub>e</sub>x) as the connection polynomial of the shortest LFSR generating the
//!    syndrome sequence (Berlekamp-Massey).
//! 3. Find the roots X<sub>i</sub><sup>-1</sup> of Λ(x) by evaluating every nonzero
//!    field element (Chien Search). The error location is the power of X<sub>i</sub>.
//! 4. Verify the number of roots equals the LFSR length.
//! 5. With Ω(x) = s(x)Λ(x) mod x<sup>2t</sup>, compute each error pattern as
//!    X<sub>i</sub>Ω(X<sub>i</sub><sup>-1</sup>) / Λ'(X<sub>i</sub><sup>-1</sup>)
//!    (Forney). The leading X<sub>i</sub> factor comes from the first generator root
//!    being α<sup>0</sup>.
//!
//! This module implements steps 2 through 5.
//!
//! # Chien Search
//!
//! With Λ(x) = Λ<sub>0</sub> + ··· + Λ<sub>e</sub>x<sup>e</sup>, the terms
//! Λ<sub>k</sub>α<sup>ik</sup> for power i are each multiplied by α<sup>k</sup> to
//! step to power i + 1, so Λ(α<sup>i</sup>) is just the sum of the current terms.

use collect_slice::CollectSlice;

use crate::coding::galois::{DabCodeword, DabField, GaloisField, Polynomial, PolynomialCoefs};

/// Finds the error locator polynomial Λ(x) from the syndrome polynomial s(x).
pub struct ErrorLocator<P: PolynomialCoefs> {
    syn: Polynomial<P>,
}

impl<P: PolynomialCoefs> ErrorLocator<P> {
    /// Construct a new `ErrorLocator` from the given syndrome polynomial s(x).
    pub fn new(syn: Polynomial<P>) -> ErrorLocator<P> {
        ErrorLocator { syn: syn }
    }

    /// Construct the error locator polynomial Λ(x) along with the length of the
    /// synthesized LFSR.
    pub fn build(self) -> (Polynomial<P>, usize) {
        // Current connection polynomial.
        let mut conn = Polynomial::<P>::unit_power(0);
        // Connection polynomial before the last length change.
        let mut prev = Polynomial::<P>::unit_power(0);
        // Discrepancy at the last length change.
        let mut prev_disc = DabCodeword::for_power(0);
        let mut len = 0;
        // Iterations since the last length change.
        let mut shift = 1;

        for n in 0..P::syndromes() {
            let disc = (1..=len).fold(self.syn.coef(n), |d, i| {
                d + conn.coef(i) * self.syn.coef(n - i)
            });

            if disc.zero() {
                shift += 1;
                continue;
            }

            let next = conn + prev * Polynomial::unit_power(shift) * (disc / prev_disc);

            if 2 * len <= n {
                prev = conn;
                prev_disc = disc;
                len = n + 1 - len;
                shift = 1;
            } else {
                shift += 1;
            }

            conn = next;
        }

        (conn, len)
    }
}

/// Finds the roots of the given error locator polynomial Λ(x).
///
/// This evaluates each Λ(α<sup>i</sup>) for 0 ≤ i < 2<sup>r</sup> - 1 with the Chien
/// Search optimization.
pub struct PolynomialRoots<P: PolynomialCoefs> {
    /// Terms Λ<sub>k</sub>α<sup>ik</sup> for the current power i.
    terms: Polynomial<P>,
    /// Current codeword power the polynomial is being evaluated with.
    pow: std::ops::Range<usize>,
}

impl<P: PolynomialCoefs> PolynomialRoots<P> {
    /// Construct a new `PolynomialRoots` from the given error locator polynomial Λ(x).
    pub fn new(loc: Polynomial<P>) -> Self {
        PolynomialRoots {
            terms: loc,
            pow: 0..DabField::size(),
        }
    }

    fn update_terms(&mut self) {
        for (pow, term) in self.terms.iter_mut().enumerate() {
            *term = *term * DabCodeword::for_power(pow);
        }
    }

    fn eval(&self) -> DabCodeword {
        self.terms.iter().fold(DabCodeword::default(), |sum, &x| sum + x)
    }
}

/// Iterate over all roots α<sup>i</sup> of Λ(x).
impl<P: PolynomialCoefs> Iterator for PolynomialRoots<P> {
    type Item = DabCodeword;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let pow = self.pow.next()?;

            let eval = self.eval();
            self.update_terms();

            if eval.zero() {
                return Some(DabCodeword::for_power(pow));
            }
        }
    }
}

/// Computes error locations and patterns from the roots of Λ(x).
pub struct ErrorDescriptions<P: PolynomialCoefs> {
    /// Derivative of error locator polynomial: Λ'(x).
    deriv: Polynomial<P>,
    /// Error evaluator polynomial: Ω(x) = Λ(x)s(x) mod x<sup>2t</sup>.
    vals: Polynomial<P>,
}

impl<P: PolynomialCoefs> ErrorDescriptions<P> {
    /// Create a new `ErrorDescriptions` from the given syndrome polynomial s(x) and error
    /// locator polynomial Λ(x).
    pub fn new(syn: Polynomial<P>, loc: Polynomial<P>) -> Self {
        ErrorDescriptions {
            deriv: loc.deriv(),
            vals: (loc * syn).truncate(P::syndromes() - 1),
        }
    }

    /// Compute the error location and pattern for the given root X<sup>-1</sup> of
    /// Λ(x), or `None` if the pattern is undefined.
    pub fn for_root(&self, root: DabCodeword) -> Option<(usize, DabCodeword)> {
        let denom = self.deriv.eval(root);

        if denom.zero() {
            return None;
        }

        let loc = root.invert();

        Some((loc.power()?, loc * self.vals.eval(root) / denom))
    }
}

/// Decodes and iterates over codeword errors.
pub struct Errors<P: PolynomialCoefs> {
    /// Roots of the error locator polynomial, buffered in polynomial storage.
    roots: Polynomial<P>,
    /// Computes location and pattern for each error.
    descs: ErrorDescriptions<P>,
    /// Current error being evaluated in iteration.
    pos: std::ops::Range<usize>,
}

impl<P: PolynomialCoefs> Errors<P> {
    /// Create a new `Errors` decoder from the given syndrome polynomial s(x).
    ///
    /// If decoding was sucessful, return `Some((nerr, errs))`, where `nerr` is the number
    /// of detected errors and `errs` is the error iterator. Otherwise, return `None` to
    /// indicate an unrecoverable error.
    pub fn new(syn: Polynomial<P>) -> Option<(usize, Self)> {
        let (loc, errors) = ErrorLocator::new(syn).build();

        if errors > P::errors() || loc.degree() != Some(errors) {
            return None;
        }

        // Roots are buffered first since they're only valid if there are exactly
        // deg(Λ(x)) of them.
        let mut roots = Polynomial::<P>::default();
        let nroots = PolynomialRoots::new(loc).collect_slice(&mut roots[..]);

        if nroots != errors {
            return None;
        }

        Some((errors, Errors {
            roots: roots,
            descs: ErrorDescriptions::new(syn, loc),
            pos: 0..errors,
        }))
    }
}

/// Iterate over detected errors, yielding the location and pattern of each error, or
/// `None` as an item when a pattern can't be computed.
impl<P: PolynomialCoefs> Iterator for Errors<P> {
    type Item = Option<(usize, DabCodeword)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pos.next().map(|i| self.descs.for_root(self.roots[i]))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::coding::galois::{DabCodeword, Polynomial, PolynomialCoefs};

    impl_polynomial_coefs!(TestCoefs, 11);
    type TestPolynomial = Polynomial<TestCoefs>;

    /// Compute syndromes s_j = e(α^j) of an error pattern directly.
    fn syndromes(errs: &[(usize, DabCodeword)]) -> TestPolynomial {
        TestPolynomial::new((0..10).map(|j| {
            errs.iter().fold(DabCodeword::default(), |s, &(loc, val)| {
                s + val * DabCodeword::for_power(loc * j)
            })
        }))
    }

    #[test]
    fn test_roots() {
        // p(x) = (1+α^42x)(1+α^13x)(1+α^157x)
        let p = TestPolynomial::new([
            DabCodeword::for_power(0),
            DabCodeword::for_power(42),
        ].iter().cloned()) * TestPolynomial::new([
            DabCodeword::for_power(0),
            DabCodeword::for_power(13),
        ].iter().cloned()) * TestPolynomial::new([
            DabCodeword::for_power(0),
            DabCodeword::for_power(157),
        ].iter().cloned());

        let roots = PolynomialRoots::new(p).collect::<Vec<_>>();

        assert_eq!(roots.len(), 3);
        assert!(roots.contains(&DabCodeword::for_power(42).invert()));
        assert!(roots.contains(&DabCodeword::for_power(13).invert()));
        assert!(roots.contains(&DabCodeword::for_power(157).invert()));

        let mut r = PolynomialRoots::new(TestPolynomial::unit_power(0));
        assert!(r.next().is_none());
    }

    #[test]
    fn test_locator() {
        let errs = [
            (3, DabCodeword::new(0x55)),
            (77, DabCodeword::new(0x01)),
            (119, DabCodeword::new(0xF0)),
        ];

        let (loc, len) = ErrorLocator::new(syndromes(&errs)).build();
        assert_eq!(len, 3);
        assert_eq!(loc.degree(), Some(3));
        assert_eq!(loc.constant(), DabCodeword::for_power(0));

        for &(pos, _) in &errs {
            assert!(loc.eval(DabCodeword::for_power(pos).invert()).zero());
        }
    }

    #[test]
    fn test_errors() {
        let errs = [
            (0, DabCodeword::new(0x12)),
            (10, DabCodeword::new(0x80)),
            (64, DabCodeword::new(0xFF)),
            (100, DabCodeword::new(0x3C)),
            (118, DabCodeword::new(0x07)),
        ];

        let (nerr, found) = Errors::new(syndromes(&errs)).unwrap();
        assert_eq!(nerr, 5);

        let mut found = found.map(|e| e.unwrap()).collect::<Vec<_>>();
        found.sort_by_key(|&(loc, _)| loc);

        assert_eq!(found, errs.to_vec());

        let (nerr, mut found) = Errors::new(TestPolynomial::default()).unwrap();
        assert_eq!(nerr, 0);
        assert!(found.next().is_none());
    }
}
