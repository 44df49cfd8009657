//! Element types supported by the batched engine.
//!
//! One generic engine serves every precision; the [`Scalar`] trait is the
//! small capability surface it needs on top of nalgebra's `ComplexField`
//! (which brings the field arithmetic and lets the reference path reuse
//! nalgebra's LU).

use nalgebra::ComplexField;
use num_complex::Complex;
use std::fmt;

/// Numeric precision of a batch, following the LAPACK s/d/c/z naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    /// Single precision real (`f32`).
    Single,
    /// Double precision real (`f64`).
    Double,
    /// Single precision complex (`Complex<f32>`).
    ComplexSingle,
    /// Double precision complex (`Complex<f64>`).
    ComplexDouble,
}

impl Precision {
    /// All precisions, in s/d/c/z order.
    pub const ALL: [Precision; 4] = [
        Precision::Single,
        Precision::Double,
        Precision::ComplexSingle,
        Precision::ComplexDouble,
    ];

    /// LAPACK routine prefix (`s`, `d`, `c` or `z`).
    pub fn prefix(self) -> char {
        match self {
            Precision::Single => 's',
            Precision::Double => 'd',
            Precision::ComplexSingle => 'c',
            Precision::ComplexDouble => 'z',
        }
    }

    /// Whether elements have an imaginary part.
    pub fn is_complex(self) -> bool {
        matches!(self, Precision::ComplexSingle | Precision::ComplexDouble)
    }

    /// Relative machine epsilon (LAPACK `lamch('E')`) of the underlying real type.
    pub fn epsilon(self) -> f64 {
        match self {
            Precision::Single | Precision::ComplexSingle => f32::EPSILON as f64 * 0.5,
            Precision::Double | Precision::ComplexDouble => f64::EPSILON * 0.5,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// Matrix element capability required by the batched LU engine.
pub trait Scalar: ComplexField + Copy {
    /// Precision tag used by the block-size advisor and reports.
    const PRECISION: Precision;

    /// Pivot magnitude: `|re| + |im|` (LAPACK `cabs1`), `|x|` for reals.
    fn abs1(self) -> f64;

    /// Squared modulus, accumulated in `f64` for residual norms.
    fn abs_sqr(self) -> f64;

    /// Build a value from real and imaginary parts; reals drop `im`.
    fn from_parts(re: f64, im: f64) -> Self;

    /// Real and imaginary parts widened to `f64`.
    fn parts(self) -> (f64, f64);

    /// Relative machine epsilon of this element type.
    fn epsilon() -> f64 {
        Self::PRECISION.epsilon()
    }
}

impl Scalar for f32 {
    const PRECISION: Precision = Precision::Single;

    #[inline]
    fn abs1(self) -> f64 {
        self.abs() as f64
    }

    #[inline]
    fn abs_sqr(self) -> f64 {
        let v = self as f64;
        v * v
    }

    #[inline]
    fn from_parts(re: f64, _im: f64) -> Self {
        re as f32
    }

    #[inline]
    fn parts(self) -> (f64, f64) {
        (self as f64, 0.0)
    }
}

impl Scalar for f64 {
    const PRECISION: Precision = Precision::Double;

    #[inline]
    fn abs1(self) -> f64 {
        self.abs()
    }

    #[inline]
    fn abs_sqr(self) -> f64 {
        self * self
    }

    #[inline]
    fn from_parts(re: f64, _im: f64) -> Self {
        re
    }

    #[inline]
    fn parts(self) -> (f64, f64) {
        (self, 0.0)
    }
}

impl Scalar for Complex<f32> {
    const PRECISION: Precision = Precision::ComplexSingle;

    #[inline]
    fn abs1(self) -> f64 {
        (self.re.abs() + self.im.abs()) as f64
    }

    #[inline]
    fn abs_sqr(self) -> f64 {
        let (re, im) = (self.re as f64, self.im as f64);
        re * re + im * im
    }

    #[inline]
    fn from_parts(re: f64, im: f64) -> Self {
        Complex::new(re as f32, im as f32)
    }

    #[inline]
    fn parts(self) -> (f64, f64) {
        (self.re as f64, self.im as f64)
    }
}

impl Scalar for Complex<f64> {
    const PRECISION: Precision = Precision::ComplexDouble;

    #[inline]
    fn abs1(self) -> f64 {
        self.re.abs() + self.im.abs()
    }

    #[inline]
    fn abs_sqr(self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    #[inline]
    fn from_parts(re: f64, im: f64) -> Self {
        Complex::new(re, im)
    }

    #[inline]
    fn parts(self) -> (f64, f64) {
        (self.re, self.im)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abs1_is_cabs1() {
        let z = Complex::new(3.0_f64, -4.0);
        assert_eq!(z.abs1(), 7.0);
        assert_eq!(z.abs_sqr(), 25.0);
        assert_eq!((-2.5_f32).abs1(), 2.5);
    }

    #[test]
    fn test_from_parts_and_parts() {
        let z = <Complex<f32> as Scalar>::from_parts(1.0, 2.0);
        assert_eq!(z, Complex::new(1.0, 2.0));
        assert_eq!(<f64 as Scalar>::from_parts(1.5, 9.0), 1.5);
        assert_eq!(z.parts(), (1.0, 2.0));
        assert_eq!(2.0_f32.parts(), (2.0, 0.0));
    }

    #[test]
    fn test_precision_tags() {
        assert_eq!(<f32 as Scalar>::PRECISION.prefix(), 's');
        assert_eq!(<Complex<f64> as Scalar>::PRECISION.prefix(), 'z');
        assert!(Precision::ComplexSingle.is_complex());
        assert!(!Precision::Double.is_complex());
        assert_eq!(<f64 as Scalar>::epsilon(), f64::EPSILON / 2.0);
    }
}
