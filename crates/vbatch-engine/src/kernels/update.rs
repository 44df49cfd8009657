//! Schur-complement update.
//!
//! Each trailing column is independent: it is first solved against the unit
//! lower triangle of the panel (`trsm`) and then has the outer product of the
//! panel's L block with its new U entries subtracted (`gemm`). Columns of a
//! wide matrix are spread across the queue's workers.

use super::{Job, panel_width};
use num_traits::Zero;
use rayon::prelude::*;
use vbatch_core::Scalar;

/// `x[r0..r0+kb] := L11^-1 x[r0..r0+kb]` with L11 unit lower at (r0, c0).
///
/// `l` is the column-major storage holding L11 with stride `ld`.
#[inline]
pub(crate) fn trsm_unit_lower_column<T: Scalar>(
    l: &[T],
    ld: usize,
    r0: usize,
    c0: usize,
    kb: usize,
    x: &mut [T],
) {
    for k in 0..kb {
        let xk = x[r0 + k];
        if xk.is_zero() {
            continue;
        }
        let lk = &l[(c0 + k) * ld..];
        for i in k + 1..kb {
            x[r0 + i] -= lk[r0 + i] * xk;
        }
    }
}

/// `x[r0+kb..r0+m] -= L21 * x[r0..r0+kb]` with L21 at (r0 + kb, c0).
#[inline]
pub(crate) fn gemm_column<T: Scalar>(
    l: &[T],
    ld: usize,
    r0: usize,
    c0: usize,
    kb: usize,
    m: usize,
    x: &mut [T],
) {
    for k in 0..kb {
        let xk = x[r0 + k];
        if xk.is_zero() {
            continue;
        }
        let lk = &l[(c0 + k) * ld..];
        for i in kb..m {
            x[r0 + i] -= lk[r0 + i] * xk;
        }
    }
}

/// Update every column right of the panel at `j`.
pub(crate) fn schur_update<T: Scalar>(job: &mut Job<'_, T>, j: usize, nb: usize, grain: usize) {
    let a = &mut job.a;
    let Some(jb) = panel_width(a.min_dim(), j, nb) else {
        return;
    };
    let (ld, m, cols) = (a.ld, a.rows - j, a.cols);
    let first = j + jb;
    if first >= cols {
        return;
    }

    let (l, trailing) = a.data.split_at_mut(first * ld);
    let l: &[T] = l;

    let update = |x: &mut [T]| {
        trsm_unit_lower_column(l, ld, j, j, jb, x);
        gemm_column(l, ld, j, j, jb, m, x);
    };

    if cols - first >= grain {
        trailing.par_chunks_mut(ld).for_each(update);
    } else {
        trailing.chunks_mut(ld).for_each(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trsm_then_gemm_matches_block_solve() {
        // 3x3 column-major; L11 = [[1,0],[2,1]] in columns 0..2, L21 = [4, 5].
        let l = [1.0, 2.0, 4.0, 0.0, 1.0, 5.0];
        let mut x = [3.0, 8.0, 20.0];

        trsm_unit_lower_column(&l, 3, 0, 0, 2, &mut x);
        // y0 = 3, y1 = 8 - 2*3 = 2
        assert_eq!(&x[..2], &[3.0, 2.0]);

        gemm_column(&l, 3, 0, 0, 2, 3, &mut x);
        // 20 - (4*3 + 5*2) = -2
        assert_eq!(x[2], -2.0);
    }

    #[test]
    fn test_offsets_inside_larger_matrix() {
        // 4x4 with a one-column panel at (1, 1) and L21 = [0.5, -1].
        let mut l = vec![0.0; 16];
        l[1 + 4] = 1.0;
        l[2 + 4] = 0.5;
        l[3 + 4] = -1.0;
        let mut x = [9.0, 2.0, 1.0, 1.0];

        gemm_column(&l, 4, 1, 1, 1, 3, &mut x);
        assert_eq!(x, [9.0, 2.0, 0.0, 3.0]);
    }
}
