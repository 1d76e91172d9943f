//! Zero-copy view of a compressed matrix
//!
//! This is the hand-off to a direct solver: the lead index, trailing index and
//! value arrays are borrowed as-is from the matrix, together with its
//! dimensions and storage order.

use super::layout::StorageOrder;
use crate::error::{Result, SparseError};
use crate::traits::ComplexField;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::ops::Range;

#[cfg(feature = "native")]
use rayon::prelude::*;

/// Row count from which `matvec` goes parallel
#[cfg(feature = "native")]
const PARALLEL_MATVEC_ROWS: usize = 256;

/// First index of the exported arrays (C-style 0, Fortran-style 1)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexBase {
    /// 0-based indices
    #[default]
    Zero,
    /// 1-based indices
    One,
}

impl IndexBase {
    /// Offset added to every exported index
    #[inline]
    pub fn offset(self) -> usize {
        match self {
            IndexBase::Zero => 0,
            IndexBase::One => 1,
        }
    }
}

/// Borrowed CSR (or CSC, for column-major storage) arrays without holes.
///
/// The slices come straight from the matrix's `Vec` buffers and carry only the
/// natural alignment of their element types. Solver libraries that require
/// stronger alignment (e.g. 64-byte) must copy them into their own buffers;
/// [`to_i32_arrays`](Self::to_i32_arrays) already allocates fresh index arrays.
#[derive(Debug, Clone, Copy)]
pub struct CsrView<'a, T: ComplexField> {
    num_rows: usize,
    num_cols: usize,
    order: StorageOrder,
    lead_index: &'a [usize],
    trail_index: &'a [usize],
    values: &'a [T],
}

impl<'a, T: ComplexField> CsrView<'a, T> {
    pub(crate) fn new(
        num_rows: usize,
        num_cols: usize,
        order: StorageOrder,
        lead_index: &'a [usize],
        trail_index: &'a [usize],
        values: &'a [T],
    ) -> Self {
        debug_assert_eq!(lead_index.len(), order.leading(num_rows, num_cols) + 1);
        debug_assert_eq!(trail_index.len(), values.len());
        Self {
            num_rows,
            num_cols,
            order,
            lead_index,
            trail_index,
            values,
        }
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of columns
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Storage orientation of the arrays
    pub fn order(&self) -> StorageOrder {
        self.order
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Offsets of each leading index (length `lead_dim + 1`)
    pub fn lead_index(&self) -> &'a [usize] {
        self.lead_index
    }

    /// Trailing coordinate of each entry
    pub fn trail_index(&self) -> &'a [usize] {
        self.trail_index
    }

    /// Entry values
    pub fn values(&self) -> &'a [T] {
        self.values
    }

    /// Get the range of indices in values/trail_index for a leading index
    pub fn lead_range(&self, lead: usize) -> Range<usize> {
        self.lead_index[lead]..self.lead_index[lead + 1]
    }

    /// Get the (trailing index, value) pairs of a leading index
    pub fn lead_entries(&self, lead: usize) -> impl Iterator<Item = (usize, T)> + 'a {
        let range = self.lead_range(lead);
        let (trail_index, values) = (self.trail_index, self.values);
        trail_index[range.clone()]
            .iter()
            .copied()
            .zip(values[range].iter().copied())
    }

    /// Export the index arrays as 32-bit integers with the given base.
    ///
    /// Direct solver libraries usually take `int` indices; fails with
    /// [`SparseError::IndexOverflow`] if an index does not fit.
    pub fn to_i32_arrays(&self, base: IndexBase) -> Result<(Vec<i32>, Vec<i32>)> {
        let convert = |indices: &[usize]| -> Result<Vec<i32>> {
            indices
                .iter()
                .map(|&i| {
                    let shifted = i + base.offset();
                    i32::try_from(shifted)
                        .map_err(|_| SparseError::IndexOverflow { index: shifted })
                })
                .collect()
        };
        Ok((convert(self.lead_index)?, convert(self.trail_index)?))
    }

    /// Matrix-vector product: y = A * x
    ///
    /// Uses parallel processing when the `native` feature is enabled and a
    /// row-major matrix is large enough to benefit from it.
    pub fn matvec(&self, x: &Array1<T>) -> Array1<T> {
        assert_eq!(x.len(), self.num_cols, "Input vector size mismatch");

        #[cfg(feature = "native")]
        {
            if self.order == StorageOrder::RowMajor && self.num_rows >= PARALLEL_MATVEC_ROWS {
                return self.matvec_parallel(x);
            }
        }

        let mut y = Array1::from_elem(self.num_rows, T::zero());
        match self.order {
            StorageOrder::RowMajor => {
                for row in 0..self.num_rows {
                    let mut sum = T::zero();
                    for (col, value) in self.lead_entries(row) {
                        sum += value * x[col];
                    }
                    y[row] = sum;
                }
            }
            StorageOrder::ColumnMajor => {
                for col in 0..self.num_cols {
                    for (row, value) in self.lead_entries(col) {
                        y[row] += value * x[col];
                    }
                }
            }
        }
        y
    }

    #[cfg(feature = "native")]
    fn matvec_parallel(&self, x: &Array1<T>) -> Array1<T> {
        let results: Vec<T> = (0..self.num_rows)
            .into_par_iter()
            .map(|row| {
                let mut sum = T::zero();
                for idx in self.lead_range(row) {
                    sum += self.values[idx] * x[self.trail_index[idx]];
                }
                sum
            })
            .collect();

        Array1::from_vec(results)
    }

    /// Convert to dense matrix (for debugging/small matrices)
    pub fn to_dense(&self) -> Array2<T> {
        let mut dense = Array2::from_elem((self.num_rows, self.num_cols), T::zero());
        let lead_dim = self.order.leading(self.num_rows, self.num_cols);
        for lead in 0..lead_dim {
            for (trail, value) in self.lead_entries(lead) {
                let (row, col) = self.order.to_row_col(lead, trail);
                dense[[row, col]] = value;
            }
        }
        dense
    }
}
