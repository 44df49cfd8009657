//! Packed storage layout for variable-size batches.
//!
//! All matrices of a batch live back-to-back in one column-major arena, and
//! all pivot sequences in one `i32` buffer. A [`BatchLayout`] holds the
//! per-matrix descriptors (the offsets that would otherwise be arrays of
//! device pointers) plus the batch-wide aggregates the engine needs to size
//! its workspace. [`BatchMut`] is the borrowed view handed to the engine; it
//! splits safely into one [`MatrixMut`] per matrix.

use crate::error::{Error, Param, Result};
use crate::scalar::Scalar;

/// Location and shape of one matrix inside the packed buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixDesc {
    /// Number of rows (M).
    pub rows: usize,
    /// Number of columns (N).
    pub cols: usize,
    /// Stride between consecutive columns, `ld >= rows`.
    pub ld: usize,
    /// Offset of element (0, 0) in the data arena.
    pub offset: usize,
    /// Offset of the first pivot in the pivot buffer.
    pub pivot_offset: usize,
}

impl MatrixDesc {
    /// `min(rows, cols)`: number of pivots and factored columns.
    #[inline]
    pub fn min_dim(&self) -> usize {
        self.rows.min(self.cols)
    }

    /// Elements reserved for this matrix in a packed layout (`ld * cols`).
    #[inline]
    pub fn footprint(&self) -> usize {
        self.ld.saturating_mul(self.cols)
    }

    /// Elements actually addressed by the matrix, from (0,0) to (M-1,N-1).
    #[inline]
    pub fn extent(&self) -> usize {
        if self.rows == 0 || self.cols == 0 {
            0
        } else {
            self.ld.saturating_mul(self.cols - 1).saturating_add(self.rows)
        }
    }

    /// Arena index of element (i, j).
    #[inline]
    pub fn index(&self, i: usize, j: usize) -> usize {
        self.offset + i + j * self.ld
    }
}

/// Batch-wide maxima and totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchAggregates {
    /// Largest row count.
    pub max_rows: usize,
    /// Largest column count.
    pub max_cols: usize,
    /// Largest `min(rows, cols)`.
    pub max_min_dim: usize,
    /// Largest `rows * cols`.
    pub max_mxn: usize,
    /// Elements needed by the data arena.
    pub total_elements: usize,
    /// Entries needed by the pivot buffer.
    pub total_pivots: usize,
}

impl BatchAggregates {
    /// Compute aggregates from descriptors.
    ///
    /// Totals cover the furthest extent of any descriptor, so they stay
    /// correct for hand-built layouts with gaps. Sizes saturate at
    /// `usize::MAX` for descriptors that have not been validated.
    pub fn from_descs(descs: &[MatrixDesc]) -> Self {
        descs.iter().fold(Self::default(), |acc, d| Self {
            max_rows: acc.max_rows.max(d.rows),
            max_cols: acc.max_cols.max(d.cols),
            max_min_dim: acc.max_min_dim.max(d.min_dim()),
            max_mxn: acc.max_mxn.max(d.rows.saturating_mul(d.cols)),
            total_elements: acc.total_elements.max(d.offset.saturating_add(d.footprint())),
            total_pivots: acc.total_pivots.max(d.pivot_offset.saturating_add(d.min_dim())),
        })
    }
}

/// Descriptors and aggregates for a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLayout {
    descs: Vec<MatrixDesc>,
    aggregates: BatchAggregates,
}

impl BatchLayout {
    /// Packed layout with `ld == rows` for every matrix.
    pub fn new(rows: &[usize], cols: &[usize]) -> Result<Self> {
        Self::builder().build(rows, cols)
    }

    /// Start configuring a layout.
    pub fn builder() -> BatchLayoutBuilder {
        BatchLayoutBuilder::default()
    }

    /// Wrap caller-built descriptors without validation.
    ///
    /// Used to hand deliberately malformed batches to the checked entry.
    pub fn from_descs(descs: Vec<MatrixDesc>) -> Self {
        let aggregates = BatchAggregates::from_descs(&descs);
        Self { descs, aggregates }
    }

    /// Number of matrices.
    pub fn len(&self) -> usize {
        self.descs.len()
    }

    /// Whether the layout describes no matrices.
    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }

    /// Per-matrix descriptors in batch order.
    pub fn descs(&self) -> &[MatrixDesc] {
        &self.descs
    }

    /// Descriptor of matrix `index`.
    pub fn desc(&self, index: usize) -> Option<&MatrixDesc> {
        self.descs.get(index)
    }

    /// Batch-wide aggregates.
    pub fn aggregates(&self) -> &BatchAggregates {
        &self.aggregates
    }
}

/// Builder for [`BatchLayout`].
#[derive(Debug, Clone)]
pub struct BatchLayoutBuilder {
    ld_alignment: usize,
}

impl Default for BatchLayoutBuilder {
    fn default() -> Self {
        Self { ld_alignment: 1 }
    }
}

impl BatchLayoutBuilder {
    /// Round every leading dimension up to a multiple of `alignment`.
    ///
    /// An alignment of 0 is treated as 1 (no padding).
    pub fn ld_alignment(mut self, alignment: usize) -> Self {
        self.ld_alignment = alignment.max(1);
        self
    }

    /// Compute descriptors and aggregates for the given shapes.
    pub fn build(&self, rows: &[usize], cols: &[usize]) -> Result<BatchLayout> {
        if rows.is_empty() {
            return Err(Error::invalid(Param::BatchCount, "batch must hold at least one matrix"));
        }
        if rows.len() != cols.len() {
            return Err(Error::invalid(
                Param::Cols,
                format!("{} column counts for {} matrices", cols.len(), rows.len()),
            ));
        }

        let mut descs = Vec::with_capacity(rows.len());
        let mut offset = 0usize;
        let mut pivot_offset = 0usize;

        for (index, (&m, &n)) in rows.iter().zip(cols).enumerate() {
            if m == 0 {
                return Err(Error::invalid(Param::Rows, format!("matrix {} has no rows", index)));
            }
            if n == 0 {
                return Err(Error::invalid(Param::Cols, format!("matrix {} has no columns", index)));
            }

            let ld = round_up(m, self.ld_alignment)
                .ok_or_else(|| Error::invalid(Param::LeadingDim, "leading dimension overflows"))?;
            let desc = MatrixDesc {
                rows: m,
                cols: n,
                ld,
                offset,
                pivot_offset,
            };
            offset = ld
                .checked_mul(n)
                .and_then(|footprint| offset.checked_add(footprint))
                .ok_or_else(|| Error::invalid(Param::Data, "packed buffer size overflows"))?;
            pivot_offset += desc.min_dim();
            descs.push(desc);
        }

        let aggregates = BatchAggregates::from_descs(&descs);
        log::debug!(
            "Built batch layout: {} matrices, max {}x{}, {} elements, {} pivots",
            descs.len(),
            aggregates.max_rows,
            aggregates.max_cols,
            aggregates.total_elements,
            aggregates.total_pivots
        );

        Ok(BatchLayout { descs, aggregates })
    }
}

fn round_up(value: usize, multiple: usize) -> Option<usize> {
    value
        .checked_add(multiple - 1)
        .map(|v| v / multiple * multiple)
}

/// Owned data arena and pivot buffer for one batch.
#[derive(Debug, Clone)]
pub struct BatchBuffers<T> {
    layout: BatchLayout,
    data: Vec<T>,
    pivots: Vec<i32>,
}

impl<T: Scalar> BatchBuffers<T> {
    /// Zero-initialised buffers sized from `layout`.
    pub fn new(layout: BatchLayout) -> Self {
        let aggregates = *layout.aggregates();
        Self {
            data: vec![T::zero(); aggregates.total_elements],
            pivots: vec![0; aggregates.total_pivots],
            layout,
        }
    }

    /// Layout the buffers were sized from.
    pub fn layout(&self) -> &BatchLayout {
        &self.layout
    }

    /// Number of matrices.
    pub fn len(&self) -> usize {
        self.layout.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    /// Whole data arena.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Whole data arena, mutable.
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Whole pivot buffer.
    pub fn pivots(&self) -> &[i32] {
        &self.pivots
    }

    /// Pivot sequence of matrix `index`.
    pub fn matrix_pivots(&self, index: usize) -> &[i32] {
        let d = &self.layout.descs()[index];
        &self.pivots[d.pivot_offset..d.pivot_offset + d.min_dim()]
    }

    /// Read-only view of matrix `index`.
    pub fn matrix(&self, index: usize) -> MatRef<'_, T> {
        let d = &self.layout.descs()[index];
        MatRef {
            rows: d.rows,
            cols: d.cols,
            ld: d.ld,
            data: &self.data[d.offset..d.offset + d.extent()],
        }
    }

    /// Copy a column-major matrix with stride `src_ld` into slot `index`.
    pub fn write_matrix(&mut self, index: usize, src: &[T], src_ld: usize) {
        let d = self.layout.descs()[index];
        for j in 0..d.cols {
            let dst = d.index(0, j);
            self.data[dst..dst + d.rows].copy_from_slice(&src[j * src_ld..j * src_ld + d.rows]);
        }
    }

    /// Copy matrix `index` out as a compact column-major `rows * cols` vector.
    pub fn read_matrix(&self, index: usize) -> Vec<T> {
        self.matrix(index).to_compact()
    }

    /// Mutable view handed to the engine.
    pub fn view_mut(&mut self) -> BatchMut<'_, T> {
        BatchMut {
            descs: self.layout.descs(),
            data: &mut self.data,
            pivots: &mut self.pivots,
        }
    }
}

/// Borrowed batch: descriptors plus the buffers they address.
#[derive(Debug)]
pub struct BatchMut<'a, T> {
    descs: &'a [MatrixDesc],
    data: &'a mut [T],
    pivots: &'a mut [i32],
}

impl<'a, T> BatchMut<'a, T> {
    /// Assemble a view from separately owned pieces.
    pub fn new(descs: &'a [MatrixDesc], data: &'a mut [T], pivots: &'a mut [i32]) -> Self {
        Self {
            descs,
            data,
            pivots,
        }
    }

    /// Number of matrices.
    pub fn len(&self) -> usize {
        self.descs.len()
    }

    /// Whether the view holds no matrices.
    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }

    /// Per-matrix descriptors.
    pub fn descs(&self) -> &'a [MatrixDesc] {
        self.descs
    }

    /// Length of the data arena.
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    /// Length of the pivot buffer.
    pub fn pivots_len(&self) -> usize {
        self.pivots.len()
    }

    /// Whole data arena.
    pub fn data(&self) -> &[T] {
        self.data
    }

    /// Whole pivot buffer.
    pub fn pivots(&self) -> &[i32] {
        self.pivots
    }

    /// Give back the descriptors and buffers the view was built from.
    pub fn into_parts(self) -> (&'a [MatrixDesc], &'a mut [T], &'a mut [i32]) {
        (self.descs, self.data, self.pivots)
    }

    /// Split into disjoint per-matrix views, in batch order.
    ///
    /// # Panics
    /// Panics if a descriptor starts before the end of its predecessor or
    /// reaches past the end of a buffer.
    pub fn split(self) -> Vec<MatrixMut<'a, T>> {
        let mut data = self.data;
        let mut pivots = self.pivots;
        let mut data_pos = 0usize;
        let mut pivot_pos = 0usize;
        let mut matrices = Vec::with_capacity(self.descs.len());

        for d in self.descs {
            assert!(
                d.offset >= data_pos && d.pivot_offset >= pivot_pos,
                "matrix storage overlaps its predecessor"
            );

            let (_, rest) = std::mem::take(&mut data).split_at_mut(d.offset - data_pos);
            let (a, rest) = rest.split_at_mut(d.extent());
            data = rest;
            data_pos = d.offset + d.extent();

            let (_, rest) = std::mem::take(&mut pivots).split_at_mut(d.pivot_offset - pivot_pos);
            let (ipiv, rest) = rest.split_at_mut(d.min_dim());
            pivots = rest;
            pivot_pos = d.pivot_offset + d.min_dim();

            matrices.push(MatrixMut {
                rows: d.rows,
                cols: d.cols,
                ld: d.ld,
                data: a,
                ipiv,
            });
        }

        matrices
    }
}

/// Mutable view of one matrix and its pivot slice.
#[derive(Debug)]
pub struct MatrixMut<'a, T> {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Column stride.
    pub ld: usize,
    /// Storage from element (0,0) to (rows-1, cols-1).
    pub data: &'a mut [T],
    /// Pivot slice of length `min(rows, cols)`.
    pub ipiv: &'a mut [i32],
}

impl<T: Copy> MatrixMut<'_, T> {
    /// `min(rows, cols)`.
    #[inline]
    pub fn min_dim(&self) -> usize {
        self.rows.min(self.cols)
    }

    /// Element (i, j).
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[i + j * self.ld]
    }
}

/// Read-only view of one column-major matrix.
#[derive(Debug, Clone, Copy)]
pub struct MatRef<'a, T> {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Column stride.
    pub ld: usize,
    /// Storage from element (0,0) onwards.
    pub data: &'a [T],
}

impl<'a, T: Copy> MatRef<'a, T> {
    /// View a compact column-major slice (`ld == rows`).
    pub fn compact(rows: usize, cols: usize, data: &'a [T]) -> Self {
        Self {
            rows,
            cols,
            ld: rows,
            data,
        }
    }

    /// Element (i, j).
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[i + j * self.ld]
    }

    /// Copy into a compact column-major vector.
    pub fn to_compact(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.rows * self.cols);
        for j in 0..self.cols {
            out.extend_from_slice(&self.data[j * self.ld..j * self.ld + self.rows]);
        }
        out
    }
}
