//! CPU reference factorization.
//!
//! Every matrix is factored independently with nalgebra's partial-pivoting
//! LU and written back in the same packed `getrf` format the engine uses,
//! so results can be compared entry for entry.

use crate::config::ReferenceConfig;
use crate::error::{BatchedLuError, Result};
use crate::validate::check_batch;
use nalgebra::{DMatrix, DVector};
use num_traits::Zero;
use rayon::prelude::*;
use vbatch_core::{BatchMut, MatrixMut, Scalar};

/// Factor every matrix of `batch` on a private thread pool.
///
/// Status entries follow the engine's convention. The pool lives only for
/// this call; its size comes from `config`.
pub fn getrf_batch<T: Scalar>(batch: BatchMut<'_, T>, info: &mut [i32], config: &ReferenceConfig) -> Result<()> {
    check_batch(batch.descs(), batch.data_len(), batch.pivots_len(), info)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .thread_name(|i| format!("vbatch-reference-{}", i))
        .build()
        .map_err(|e| BatchedLuError::QueueInit(e.to_string()))?;

    log::debug!(
        "Reference getrf on {} matrices with {} threads",
        batch.len(),
        pool.current_num_threads()
    );

    let matrices = batch.split();
    pool.install(|| {
        matrices
            .into_par_iter()
            .zip(info.par_iter_mut())
            .for_each(|(a, status)| *status = factor_matrix(a));
    });

    Ok(())
}

/// Factor one matrix in place and return its status (0 or the 1-based
/// column of the first zero pivot).
pub fn factor_matrix<T: Scalar>(a: MatrixMut<'_, T>) -> i32 {
    let (m, n, ld) = (a.rows, a.cols, a.ld);
    let k = m.min(n);
    let matrix = DMatrix::from_fn(m, n, |i, j| a.data[i + j * ld]);
    let lu = matrix.lu();

    let l = lu.l();
    let u = lu.u();
    for j in 0..n {
        for i in 0..m {
            a.data[i + j * ld] = if i > j { l[(i, j)] } else { u[(i, j)] };
        }
    }

    lu_pivots(lu.p(), m, k, a.ipiv);

    (0..k)
        .find(|&i| u[(i, i)].is_zero())
        .map_or(0, |i| (i + 1) as i32)
}

/// Convert a nalgebra permutation into LAPACK sequential interchanges.
///
/// nalgebra records only the transpositions it performed; replaying them on
/// the identity yields the final row order, from which the interchange
/// sequence is rebuilt greedily. Each rebuilt interchange `i <-> ipiv[i]`
/// satisfies `ipiv[i] >= i`, matching `getrf`.
fn lu_pivots(p: &nalgebra::linalg::PermutationSequence<nalgebra::Dyn>, m: usize, k: usize, ipiv: &mut [i32]) {
    let mut order = DVector::from_iterator(m, 0..m);
    p.permute_rows(&mut order);

    let mut current: Vec<usize> = (0..m).collect();
    let mut position: Vec<usize> = (0..m).collect();
    for i in 0..k {
        let target = order[i];
        let at = position[target];
        ipiv[i] = (at + 1) as i32;
        if at != i {
            let displaced = current[i];
            current.swap(i, at);
            position[displaced] = at;
            position[target] = i;
        }
    }
}
