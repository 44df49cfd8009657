//! Argument checks shared by every checked entry point.

use crate::error::{BatchedLuError, Result};
use vbatch_core::{MatrixDesc, Param};

/// Validate a batch before any work is queued.
///
/// Checks, in order: batch count, status array length, then per matrix row
/// count, column count, leading dimension, data footprint and pivot slice.
/// Every offending matrix gets the negated parameter position in its status
/// entry and valid matrices get 0. The returned error names the first
/// offending matrix in batch order.
pub fn check_batch(
    descs: &[MatrixDesc],
    data_len: usize,
    pivots_len: usize,
    info: &mut [i32],
) -> Result<()> {
    if descs.is_empty() {
        return Err(BatchedLuError::invalid(
            Param::BatchCount,
            "batch must hold at least one matrix",
        ));
    }
    if info.len() < descs.len() {
        return Err(BatchedLuError::invalid(
            Param::Info,
            format!(
                "status array holds {} entries for {} matrices",
                info.len(),
                descs.len()
            ),
        ));
    }

    let mut first: Option<(Param, String)> = None;
    let mut invalid = 0usize;
    let mut data_end = 0usize;
    let mut pivot_end = 0usize;

    for (i, d) in descs.iter().enumerate() {
        match check_matrix(d, data_end, pivot_end, data_len, pivots_len) {
            Ok(()) => info[i] = 0,
            Err((param, message)) => {
                info[i] = param.code();
                invalid += 1;
                if first.is_none() {
                    first = Some((param, format!("matrix {}: {}", i, message)));
                }
            }
        }
        data_end = d.offset.saturating_add(d.extent());
        pivot_end = d.pivot_offset.saturating_add(d.min_dim());
    }

    match first {
        None => Ok(()),
        Some((param, message)) => {
            log::warn!(
                "Rejected batch: {} of {} matrices invalid, first {}",
                invalid,
                descs.len(),
                message
            );
            Err(BatchedLuError::InvalidArgument { param, message })
        }
    }
}

fn check_matrix(
    d: &MatrixDesc,
    data_start: usize,
    pivot_start: usize,
    data_len: usize,
    pivots_len: usize,
) -> std::result::Result<(), (Param, String)> {
    if d.rows == 0 {
        return Err((Param::Rows, "rows must be at least 1".into()));
    }
    if d.cols == 0 {
        return Err((Param::Cols, "cols must be at least 1".into()));
    }
    if d.ld < d.rows {
        return Err((
            Param::LeadingDim,
            format!("ld {} is smaller than rows {}", d.ld, d.rows),
        ));
    }

    let data_fits = d
        .ld
        .checked_mul(d.cols - 1)
        .and_then(|v| v.checked_add(d.rows))
        .and_then(|extent| d.offset.checked_add(extent))
        .is_some_and(|end| end <= data_len);
    if d.offset < data_start || !data_fits {
        return Err((
            Param::Data,
            format!(
                "storage at offset {} overlaps its predecessor or exceeds the {}-element buffer",
                d.offset, data_len
            ),
        ));
    }

    let pivots_fit = d
        .pivot_offset
        .checked_add(d.min_dim())
        .is_some_and(|end| end <= pivots_len);
    if d.pivot_offset < pivot_start || !pivots_fit {
        return Err((
            Param::Pivots,
            format!(
                "pivots at offset {} overlap their predecessor or exceed the {}-entry buffer",
                d.pivot_offset, pivots_len
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbatch_core::BatchLayout;

    fn desc(rows: usize, cols: usize, ld: usize, offset: usize, pivot_offset: usize) -> MatrixDesc {
        MatrixDesc {
            rows,
            cols,
            ld,
            offset,
            pivot_offset,
        }
    }

    #[test]
    fn test_packed_layout_is_valid() {
        let layout = BatchLayout::new(&[3, 1, 4], &[2, 5, 4]).unwrap();
        let agg = layout.aggregates();
        let mut info = vec![9; 3];
        check_batch(layout.descs(), agg.total_elements, agg.total_pivots, &mut info).unwrap();
        assert_eq!(info, vec![0, 0, 0]);
    }

    #[test]
    fn test_empty_batch_and_short_info() {
        let err = check_batch(&[], 0, 0, &mut []).unwrap_err();
        assert_eq!(err.status_code(), -7);

        let descs = [desc(2, 2, 2, 0, 0)];
        let err = check_batch(&descs, 4, 2, &mut []).unwrap_err();
        assert_eq!(err.status_code(), -6);
    }

    #[test]
    fn test_offending_matrices_get_codes() {
        let descs = [
            desc(2, 2, 2, 0, 0),
            desc(3, 2, 2, 4, 2),
            desc(0, 2, 2, 10, 4),
            desc(2, 2, 2, 10, 4),
        ];
        let mut info = vec![0; 4];
        let err = check_batch(&descs, 14, 6, &mut info).unwrap_err();
        assert_eq!(info, vec![0, -4, -1, 0]);
        // First offender in batch order wins.
        assert_eq!(err.status_code(), -4);
    }

    #[test]
    fn test_overlap_and_bounds() {
        // Second matrix starts inside the first.
        let descs = [desc(2, 2, 2, 0, 0), desc(2, 2, 2, 3, 2)];
        let mut info = vec![0; 2];
        assert_eq!(check_batch(&descs, 16, 4, &mut info).unwrap_err().status_code(), -3);
        assert_eq!(info, vec![0, -3]);

        // Data buffer too short for the last column.
        let descs = [desc(2, 3, 4, 0, 0)];
        let mut info = vec![0];
        assert!(check_batch(&descs, 10, 2, &mut info).is_ok());
        assert_eq!(check_batch(&descs, 9, 2, &mut info).unwrap_err().status_code(), -3);

        // Pivot buffer too short.
        let descs = [desc(3, 3, 3, 0, 0)];
        assert_eq!(check_batch(&descs, 9, 2, &mut info).unwrap_err().status_code(), -5);
    }
}
