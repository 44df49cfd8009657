//! Pivot-info workspace.
//!
//! Panel factorization records pivots relative to the panel's first row
//! before they are composed into global row indices. Those local pivots live
//! in a `batch x max_m` scratch buffer owned by the caller of the unchecked
//! entry (or allocated per call by the checked entry).

use crate::error::{BatchedLuError, Result};

/// Scratch space for local panel pivots.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pivot_info: Vec<i32>,
    stride: usize,
}

impl Workspace {
    /// Reserve room for `batch` matrices of at most `max_m` rows.
    ///
    /// The reservation is fallible so that running out of memory reports
    /// [`BatchedLuError::Allocation`] instead of aborting the process.
    pub fn new(batch: usize, max_m: usize) -> Result<Self> {
        let mut workspace = Self::default();
        workspace.ensure(batch, max_m)?;
        Ok(workspace)
    }

    /// Grow the workspace to hold `batch` matrices of `max_m` rows.
    ///
    /// Existing capacity is reused; contents are not preserved.
    pub fn ensure(&mut self, batch: usize, max_m: usize) -> Result<()> {
        let len = batch.checked_mul(max_m).ok_or_else(|| {
            BatchedLuError::Allocation(format!(
                "pivot workspace of {} x {} entries overflows",
                batch, max_m
            ))
        })?;

        self.pivot_info.clear();
        self.pivot_info.try_reserve_exact(len).map_err(|e| {
            BatchedLuError::Allocation(format!(
                "pivot workspace of {} entries: {}",
                len, e
            ))
        })?;
        self.pivot_info.resize(len, 0);
        self.stride = max_m;

        log::debug!("Pivot workspace sized {} x {}", batch, max_m);
        Ok(())
    }

    /// Entries reserved per matrix.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Total entries.
    pub fn len(&self) -> usize {
        self.pivot_info.len()
    }

    /// Whether the workspace holds no entries.
    pub fn is_empty(&self) -> bool {
        self.pivot_info.is_empty()
    }

    pub(crate) fn pivot_info_mut(&mut self) -> &mut [i32] {
        &mut self.pivot_info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_batch_by_rows() {
        let ws = Workspace::new(10, 7).unwrap();
        assert_eq!(ws.len(), 70);
        assert_eq!(ws.stride(), 7);
    }

    #[test]
    fn test_ensure_reuses_and_resizes() {
        let mut ws = Workspace::new(4, 4).unwrap();
        ws.ensure(2, 3).unwrap();
        assert_eq!(ws.len(), 6);
        assert_eq!(ws.stride(), 3);
    }

    #[test]
    fn test_impossible_size_reports_allocation() {
        let err = Workspace::new(usize::MAX / 2, 4).unwrap_err();
        assert_eq!(err.status_code(), crate::error::ALLOCATION_CODE);

        let err = Workspace::new(usize::MAX / 8, 2).unwrap_err();
        assert!(matches!(err, BatchedLuError::Allocation(_)));
    }
}
