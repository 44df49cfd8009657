//! Correctness checks for LU factors.
//!
//! Everything here works on caller-owned copies: the factored output is read,
//! never modified.

use crate::error::{Error, Result};
use crate::layout::MatRef;
use crate::scalar::Scalar;
use nalgebra::DMatrix;
use num_traits::{One, Zero};

/// Apply LAPACK-style row interchanges in forward order.
///
/// Row `i` is swapped with row `ipiv[i] - 1` for `i = 0, 1, ...`.
pub fn apply_row_swaps<T: Scalar>(a: &mut DMatrix<T>, ipiv: &[i32]) {
    for (i, &p) in ipiv.iter().enumerate() {
        let p = (p - 1) as usize;
        if p != i {
            a.swap_rows(i, p);
        }
    }
}

/// Verify every pivot of matrix `matrix` lies in `1..=rows`.
pub fn check_pivots(matrix: usize, ipiv: &[i32], rows: usize) -> Result<()> {
    for (index, &value) in ipiv.iter().enumerate() {
        if value < 1 || value as usize > rows {
            return Err(Error::PivotOutOfRange {
                matrix,
                index,
                value,
                rows,
            });
        }
    }
    Ok(())
}

/// Relative factorization residual `||P·A - L·U||_F / (||A||_F · N)`.
///
/// `original` is A before factorization, `factored` holds L (unit lower,
/// below the diagonal) and U (on and above the diagonal) as produced by
/// `getrf`, and `ipiv` the interchanges. Pivots must already be in range
/// (see [`check_pivots`]).
pub fn lu_residual<T: Scalar>(original: MatRef<'_, T>, factored: MatRef<'_, T>, ipiv: &[i32]) -> Result<f64> {
    let (m, n) = (original.rows, original.cols);
    if factored.rows != m {
        return Err(Error::DimensionMismatch {
            expected: m,
            actual: factored.rows,
        });
    }
    if factored.cols != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            actual: factored.cols,
        });
    }
    let k = m.min(n);
    if ipiv.len() < k {
        return Err(Error::DimensionMismatch {
            expected: k,
            actual: ipiv.len(),
        });
    }

    let mut a = DMatrix::from_fn(m, n, |i, j| original.get(i, j));
    apply_row_swaps(&mut a, &ipiv[..k]);

    let l = DMatrix::from_fn(m, k, |i, j| {
        if i == j {
            T::one()
        } else if i > j {
            factored.get(i, j)
        } else {
            T::zero()
        }
    });
    let u = DMatrix::from_fn(k, n, |i, j| if i <= j { factored.get(i, j) } else { T::zero() });

    let lu = &l * &u;
    let residual = frobenius(&(a.clone() - lu));
    let norm = frobenius(&a);

    if norm == 0.0 {
        return Ok(residual);
    }
    Ok(residual / (norm * n as f64))
}

fn frobenius<T: Scalar>(a: &DMatrix<T>) -> f64 {
    a.iter().map(|&x| x.abs_sqr()).sum::<f64>().sqrt()
}

/// Maximum that propagates NaN from either argument.
pub fn max_nan(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}
