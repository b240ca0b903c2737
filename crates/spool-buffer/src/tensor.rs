//! Dense row-major tensors with a fixed shape.
//!
//! A [`Tensor`] is a zero-initialised `Vec<T>` plus its shape. Rollout
//! tensors are addressed by `(row, column)` on their first two axes; the
//! remaining axes form a contiguous *cell* (e.g. one observation).
//! Storage is allocated once and never resized.

use std::ops::Range;

use smallvec::SmallVec;

use crate::error::BufferError;

/// A fixed-shape, row-major tensor.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor<T> {
    shape: SmallVec<[usize; 6]>,
    data: Vec<T>,
}

impl<T: Copy + Default> Tensor<T> {
    /// Allocate a tensor of `shape` filled with `T::default()`.
    ///
    /// An empty shape is a scalar with one element.
    pub fn zeros(shape: &[usize]) -> Self {
        let len = shape.iter().product();
        Self {
            shape: SmallVec::from_slice(shape),
            data: vec![T::default(); len],
        }
    }

    /// The tensor's shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat view of all elements.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable flat view of all elements.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Overwrite every element with `value`.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Length of the first axis (1 for a scalar).
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(1)
    }

    /// Elements per first-axis row.
    pub fn row_len(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    /// Length of the second axis (1 for rank < 2).
    pub fn columns(&self) -> usize {
        self.shape.get(1).copied().unwrap_or(1)
    }

    /// Elements per `(row, column)` cell.
    pub fn cell_len(&self) -> usize {
        self.shape.iter().skip(2).product()
    }

    /// One first-axis row.
    ///
    /// # Panics
    ///
    /// Panics if `row >= self.rows()`.
    pub fn row(&self, row: usize) -> &[T] {
        let len = self.row_len();
        &self.data[row * len..(row + 1) * len]
    }

    /// One `(row, column)` cell.
    ///
    /// # Panics
    ///
    /// Panics if the cell is out of range.
    pub fn cell(&self, row: usize, column: usize) -> &[T] {
        let offset = self.cell_offset(row, column);
        &self.data[offset..offset + self.cell_len()]
    }

    /// Mutable `(row, column)` cell.
    ///
    /// # Panics
    ///
    /// Panics if the cell is out of range.
    pub fn cell_mut(&mut self, row: usize, column: usize) -> &mut [T] {
        let offset = self.cell_offset(row, column);
        let len = self.cell_len();
        &mut self.data[offset..offset + len]
    }

    fn cell_offset(&self, row: usize, column: usize) -> usize {
        (row * self.columns() + column) * self.cell_len()
    }

    /// Write `src` into cells `[rows, column]`, one cell per row in order.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::IndexOutOfRange`] if `rows` or `column` fall
    /// outside the tensor, or [`BufferError::LengthMismatch`] if `src` does
    /// not hold exactly `rows.len() * cell_len()` elements.
    pub fn write_column(
        &mut self,
        what: &'static str,
        rows: Range<usize>,
        column: usize,
        src: &[T],
    ) -> Result<(), BufferError> {
        self.check_rows(&rows)?;
        if column >= self.columns() {
            return Err(BufferError::IndexOutOfRange {
                axis: "column",
                index: column,
                len: self.columns(),
            });
        }
        let cell = self.cell_len();
        check_len(what, rows.len() * cell, src.len())?;
        for (row, chunk) in rows.zip(src.chunks_exact(cell.max(1))) {
            self.cell_mut(row, column).copy_from_slice(&chunk[..cell]);
        }
        Ok(())
    }

    /// Write `src` into whole first-axis rows `rows`.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::IndexOutOfRange`] if `rows` falls outside the
    /// tensor, or [`BufferError::LengthMismatch`] if `src` does not hold
    /// exactly `rows.len() * row_len()` elements.
    pub fn write_rows(
        &mut self,
        what: &'static str,
        rows: Range<usize>,
        src: &[T],
    ) -> Result<(), BufferError> {
        self.check_rows(&rows)?;
        let len = self.row_len();
        check_len(what, rows.len() * len, src.len())?;
        self.data[rows.start * len..rows.end * len].copy_from_slice(src);
        Ok(())
    }

    /// Select first-axis rows by index (repeats allowed), producing a new
    /// tensor of shape `[indices.len(), *shape[1..]]`.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::IndexOutOfRange`] for the first bad index.
    pub fn gather(&self, indices: &[usize]) -> Result<Tensor<T>, BufferError> {
        let rows = self.rows();
        let len = self.row_len();
        let mut data = Vec::with_capacity(indices.len() * len);
        for &i in indices {
            if i >= rows {
                return Err(BufferError::IndexOutOfRange {
                    axis: "row",
                    index: i,
                    len: rows,
                });
            }
            data.extend_from_slice(self.row(i));
        }
        let mut shape: SmallVec<[usize; 6]> = SmallVec::from_slice(&self.shape);
        match shape.first_mut() {
            Some(first) => *first = indices.len(),
            None => shape.push(indices.len()),
        }
        Ok(Tensor { shape, data })
    }

    fn check_rows(&self, rows: &Range<usize>) -> Result<(), BufferError> {
        if rows.end > self.rows() || rows.start > rows.end {
            return Err(BufferError::IndexOutOfRange {
                axis: "row",
                index: rows.end.saturating_sub(1).max(rows.start),
                len: self.rows(),
            });
        }
        Ok(())
    }
}

fn check_len(what: &'static str, expected: usize, got: usize) -> Result<(), BufferError> {
    if expected != got {
        return Err(BufferError::LengthMismatch {
            what,
            expected,
            got,
        });
    }
    Ok(())
}
