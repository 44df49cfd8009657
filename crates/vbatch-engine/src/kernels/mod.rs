//! Per-phase batched kernels.
//!
//! Every kernel processes one matrix of the batch and bounds-checks itself
//! against that matrix's own shape, so a single launch can cover matrices of
//! any size: a matrix whose factorization is already complete at panel
//! offset `j` simply does nothing.

mod panel;
mod swap;
mod update;

pub(crate) use panel::factor_panel;
pub(crate) use swap::apply_panel_swaps;
pub(crate) use update::schur_update;

use vbatch_core::{BatchMut, MatrixMut};

/// One matrix of a batch bound to its scratch and status entry.
#[derive(Debug)]
pub(crate) struct Job<'a, T> {
    pub a: MatrixMut<'a, T>,
    /// Local panel pivots, 0-based relative to the panel's first row.
    pub local: &'a mut [i32],
    pub info: &'a mut i32,
}

/// Split a batch into per-matrix jobs and clear their status entries.
///
/// # Panics
/// Panics if the workspace or status array is too small for the batch, or
/// if descriptors overlap.
pub(crate) fn bind<'a, T: Copy>(
    batch: BatchMut<'a, T>,
    pivot_info: &'a mut [i32],
    stride: usize,
    info: &'a mut [i32],
) -> Vec<Job<'a, T>> {
    let count = batch.len();
    assert!(
        info.len() >= count,
        "status array holds {} entries for {} matrices",
        info.len(),
        count
    );
    assert!(
        stride > 0 && pivot_info.len() >= count * stride,
        "pivot workspace holds {} entries, need {} x {}",
        pivot_info.len(),
        count,
        stride
    );

    batch
        .split()
        .into_iter()
        .zip(pivot_info.chunks_mut(stride))
        .zip(info.iter_mut())
        .map(|((a, local), info)| {
            assert!(
                a.min_dim() <= stride,
                "matrix with {} pivots exceeds workspace stride {}",
                a.min_dim(),
                stride
            );
            *info = 0;
            Job { a, local, info }
        })
        .collect()
}

/// Width of the panel starting at column `j`, or `None` once the matrix is
/// fully factored.
#[inline]
pub(crate) fn panel_width(min_dim: usize, j: usize, nb: usize) -> Option<usize> {
    (j < min_dim).then(|| nb.min(min_dim - j))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbatch_core::BatchLayout;
    use vbatch_core::BatchBuffers;

    #[test]
    fn test_panel_width() {
        assert_eq!(panel_width(10, 0, 4), Some(4));
        assert_eq!(panel_width(10, 8, 4), Some(2));
        assert_eq!(panel_width(10, 12, 4), None);
        assert_eq!(panel_width(3, 3, 64), None);
    }

    #[test]
    fn test_bind_clears_status() {
        let layout = BatchLayout::new(&[3, 2], &[2, 4]).unwrap();
        let mut buffers = BatchBuffers::<f64>::new(layout);
        let mut ws = vec![0; 6];
        let mut info = vec![7, 7];
        let jobs = bind(buffers.view_mut(), &mut ws, 3, &mut info);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].local.len(), 3);
        assert!(jobs.iter().all(|job| *job.info == 0));
    }

    #[test]
    #[should_panic(expected = "pivot workspace")]
    fn test_bind_rejects_short_workspace() {
        let layout = BatchLayout::new(&[3, 2], &[2, 4]).unwrap();
        let mut buffers = BatchBuffers::<f64>::new(layout);
        let mut ws = vec![0; 4];
        let mut info = vec![0, 0];
        let _ = bind(buffers.view_mut(), &mut ws, 3, &mut info);
    }

    #[test]
    #[should_panic(expected = "exceeds workspace stride")]
    fn test_bind_rejects_matrix_wider_than_stride() {
        let layout = BatchLayout::new(&[3, 2], &[2, 4]).unwrap();
        let mut buffers = BatchBuffers::<f64>::new(layout);
        let mut ws = vec![0; 2];
        let mut info = vec![0, 0];
        let _ = bind(buffers.view_mut(), &mut ws, 1, &mut info);
    }
}
