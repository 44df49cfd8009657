//! Row interchanges outside the panel (`laswp`).

use super::{Job, panel_width};
use rayon::prelude::*;

/// Swap `col[r0 + k]` with `col[r0 + piv[k]]` for each k in order.
#[inline]
pub(crate) fn swap_column<T>(col: &mut [T], r0: usize, piv: &[i32]) {
    for (k, &p) in piv.iter().enumerate() {
        let p = p as usize;
        if p != k {
            col.swap(r0 + k, r0 + p);
        }
    }
}

/// Apply the interchanges of the panel at `j` to every column outside it.
///
/// Trailing columns need them before the Schur update; the factored columns
/// on the left get them so L ends up in LAPACK order.
pub(crate) fn apply_panel_swaps<T: Send>(job: &mut Job<'_, T>, j: usize, nb: usize, grain: usize) {
    let a = &mut job.a;
    let Some(jb) = panel_width(a.rows.min(a.cols), j, nb) else {
        return;
    };
    let piv = &job.local[j..j + jb];
    if piv.iter().enumerate().all(|(k, &p)| p as usize == k) {
        return;
    }

    let outside = |c: usize| c < j || c >= j + jb;
    let swap = |(_, col): (usize, &mut [T])| swap_column(col, j, piv);

    if a.cols - jb >= grain {
        a.data
            .par_chunks_mut(a.ld)
            .enumerate()
            .filter(|(c, _)| outside(*c))
            .for_each(swap);
    } else {
        a.data
            .chunks_mut(a.ld)
            .enumerate()
            .filter(|(c, _)| outside(*c))
            .for_each(swap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swaps_apply_in_sequence() {
        // Rows 0<->2 then 1<->2 turns [a, b, c] into [c, a, b].
        let mut col = ['a', 'b', 'c'];
        swap_column(&mut col, 0, &[2, 2]);
        assert_eq!(col, ['c', 'a', 'b']);
    }

    #[test]
    fn test_row_offset() {
        let mut col = [0, 1, 2, 3];
        swap_column(&mut col, 2, &[1]);
        assert_eq!(col, [0, 1, 3, 2]);
    }
}
