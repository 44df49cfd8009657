//! Panel factorization with partial pivoting.
//!
//! A panel is split in half by columns until it is at most `recnb` wide;
//! narrow panels go through the unblocked kernel. Pivots are produced
//! relative to the panel's first row and only applied to the panel's own
//! columns: everything outside the panel is left for the swap phase.

use super::swap::swap_column;
use super::update::{gemm_column, trsm_unit_lower_column};
use super::{Job, panel_width};
use num_traits::{One, Zero};
use vbatch_core::{MatrixMut, Scalar};

/// Factor the panel of `job` starting at column `j`.
///
/// Local pivots land in the workspace at `j..j + jb`, global 1-based pivots
/// in the matrix's pivot slice.
pub(crate) fn factor_panel<T: Scalar>(job: &mut Job<'_, T>, j: usize, nb: usize, recnb: usize) {
    let Some(jb) = panel_width(job.a.min_dim(), j, nb) else {
        return;
    };
    let local = &mut job.local[j..j + jb];
    let m = job.a.rows - j;

    getrf_recursive(&mut job.a, j, j, m, jb, recnb.max(1), local, &mut *job.info);

    let base = j as i32 + 1;
    for (global, &p) in job.a.ipiv[j..j + jb].iter_mut().zip(local.iter()) {
        *global = p + base;
    }
}

/// Factor the `m x n` block at (r0, c0), `m >= n`.
#[allow(clippy::too_many_arguments)]
fn getrf_recursive<T: Scalar>(
    a: &mut MatrixMut<'_, T>,
    r0: usize,
    c0: usize,
    m: usize,
    n: usize,
    recnb: usize,
    piv: &mut [i32],
    info: &mut i32,
) {
    if n <= recnb {
        getf2(a, r0, c0, m, n, piv, info);
        return;
    }

    let n1 = n / 2;
    let n2 = n - n1;
    let (piv1, piv2) = piv.split_at_mut(n1);
    let ld = a.ld;

    getrf_recursive(a, r0, c0, m, n1, recnb, piv1, info);

    // [A12; A22] := swap, solve against L11, then subtract L21 * A12.
    {
        let (l, right) = a.data.split_at_mut((c0 + n1) * ld);
        let l: &[T] = l;
        for x in right.chunks_mut(ld).take(n2) {
            swap_column(x, r0, piv1);
            trsm_unit_lower_column(l, ld, r0, c0, n1, x);
            gemm_column(l, ld, r0, c0, n1, m, x);
        }
    }

    getrf_recursive(a, r0 + n1, c0 + n1, m - n1, n2, recnb, piv2, info);

    for x in a.data.chunks_mut(ld).skip(c0).take(n1) {
        swap_column(x, r0 + n1, piv2);
    }
    for p in piv2.iter_mut() {
        *p += n1 as i32;
    }
}

/// Unblocked right-looking factorization of the `m x n` block at (r0, c0).
fn getf2<T: Scalar>(
    a: &mut MatrixMut<'_, T>,
    r0: usize,
    c0: usize,
    m: usize,
    n: usize,
    piv: &mut [i32],
    info: &mut i32,
) {
    let ld = a.ld;
    let data = &mut *a.data;
    let at = |i: usize, c: usize| c * ld + r0 + i;

    for k in 0..n {
        let c = c0 + k;

        // First entry of largest |re| + |im| wins ties.
        let mut p = k;
        let mut best = data[at(k, c)].abs1();
        for i in k + 1..m {
            let v = data[at(i, c)].abs1();
            if v > best {
                best = v;
                p = i;
            }
        }
        piv[k] = p as i32;

        let pivot = data[at(p, c)];
        if pivot.is_zero() {
            if *info == 0 {
                *info = (c + 1) as i32;
            }
        } else {
            if p != k {
                for cc in c0..c0 + n {
                    data.swap(at(k, cc), at(p, cc));
                }
            }
            let inv = T::one() / pivot;
            for i in k + 1..m {
                data[at(i, c)] *= inv;
            }
        }

        for cc in c + 1..c0 + n {
            let u = data[at(k, cc)];
            if u.is_zero() {
                continue;
            }
            for i in k + 1..m {
                let l = data[at(i, c)];
                data[at(i, cc)] -= l * u;
            }
        }
    }
}
