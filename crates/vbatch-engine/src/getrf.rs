//! Variable-size batched LU factorization (`getrf_vbatched`).
//!
//! The batch is factored panel by panel, left to right. For each panel
//! offset `j` three launches run on the queue, each covering every matrix of
//! the batch:
//!
//! 1. `getrf_panel`: recursive panel factorization with partial pivoting,
//!    recording local pivots in the workspace and global 1-based pivots in
//!    the pivot buffer.
//! 2. `laswp`: the panel's interchanges applied to all columns outside it.
//! 3. `trsm_gemm`: the Schur-complement update of the trailing columns.
//!
//! The loop ends once `j` reaches the largest `min(M, N)` in the batch.
//! Matrices that finish earlier are skipped by every later launch.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::kernels::{self, Job};
use crate::queue::Queue;
use crate::validate::check_batch;
use crate::workspace::Workspace;
use rayon::prelude::*;
use vbatch_core::{BatchAggregates, BatchMut, Scalar};

/// Batch-wide maxima passed to the unchecked entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxHints {
    /// Largest row count.
    pub max_m: usize,
    /// Largest column count.
    pub max_n: usize,
    /// Largest `min(M, N)`; the panel loop runs up to this column.
    pub max_min_mn: usize,
    /// Largest `M * N`.
    pub max_mxn: usize,
}

impl From<&BatchAggregates> for MaxHints {
    fn from(agg: &BatchAggregates) -> Self {
        Self {
            max_m: agg.max_rows,
            max_n: agg.max_cols,
            max_min_mn: agg.max_min_dim,
            max_mxn: agg.max_mxn,
        }
    }
}

/// Factor every matrix of `batch` in place: `P * A = L * U`.
///
/// Validates the batch, derives block sizes from the advisor, allocates the
/// pivot workspace and then runs [`getrf_vbatched_max_nocheck`].
///
/// `info[i]` receives 0 on success, `k > 0` if `U(k, k)` is exactly zero
/// (the factorization is still completed), or the negated parameter
/// position if matrix `i` failed validation. An invalid argument fails the
/// whole call before anything is queued.
pub fn getrf_vbatched<T: Scalar>(batch: BatchMut<'_, T>, info: &mut [i32], queue: &Queue) -> Result<()> {
    getrf_vbatched_with_config(batch, info, queue, &EngineConfig::default())
}

/// [`getrf_vbatched`] with explicit blocking parameters.
pub fn getrf_vbatched_with_config<T: Scalar>(
    batch: BatchMut<'_, T>,
    info: &mut [i32],
    queue: &Queue,
    config: &EngineConfig,
) -> Result<()> {
    check_batch(batch.descs(), batch.data_len(), batch.pivots_len(), info)?;

    let hints = MaxHints::from(&BatchAggregates::from_descs(batch.descs()));
    let (nb, recnb) = config.block_sizes(hints.max_m, hints.max_n, T::PRECISION);
    let mut workspace = Workspace::new(batch.len(), hints.max_m)?;

    getrf_vbatched_max_nocheck(batch, &hints, nb, recnb, &mut workspace, info, queue)
}

/// Factor a batch without validation or allocation.
///
/// The caller guarantees that the batch is well formed, that `hints` are
/// the true maxima, that `workspace` holds at least `batch.len() x
/// hints.max_m` entries and that `info` has one entry per matrix. Violations
/// surface as a [`DeviceFault`](crate::BatchedLuError::DeviceFault) on the
/// queue rather than as argument errors.
pub fn getrf_vbatched_max_nocheck<T: Scalar>(
    batch: BatchMut<'_, T>,
    hints: &MaxHints,
    nb: usize,
    recnb: usize,
    workspace: &mut Workspace,
    info: &mut [i32],
    queue: &Queue,
) -> Result<()> {
    let nb = nb.max(1);
    let recnb = recnb.max(1);
    let grain = queue.column_grain();
    let count = batch.len();
    let stride = workspace.stride();
    let pivot_info = workspace.pivot_info_mut();

    log::debug!(
        "{}getrf_vbatched: {} matrices, max {}x{} (min {}), nb={} recnb={} on '{}'",
        T::PRECISION,
        count,
        hints.max_m,
        hints.max_n,
        hints.max_min_mn,
        nb,
        recnb,
        queue.name()
    );

    let mut jobs: Vec<Job<'_, T>> =
        queue.launch("bind", move || kernels::bind(batch, pivot_info, stride, info))?;

    let mut j = 0;
    while j < hints.max_min_mn {
        queue.launch("getrf_panel", || {
            jobs.par_iter_mut()
                .for_each(|job| kernels::factor_panel(job, j, nb, recnb))
        })?;
        queue.launch("laswp", || {
            jobs.par_iter_mut()
                .for_each(|job| kernels::apply_panel_swaps(job, j, nb, grain))
        })?;
        queue.launch("trsm_gemm", || {
            jobs.par_iter_mut()
                .for_each(|job| kernels::schur_update(job, j, nb, grain))
        })?;
        j += nb;
    }
    queue.synchronize()?;

    let singular = jobs.iter().filter(|job| *job.info > 0).count();
    if singular > 0 {
        log::warn!("{} of {} matrices have an exactly zero pivot", singular, count);
    }

    Ok(())
}
