//! Write-only sparsity pattern collector
//!
//! Run an assembly routine once against a [`SparsityPatternLearner`] to find
//! out which entries each leading index will hold, then size a
//! [`Csr3Matrix`](super::Csr3Matrix) exactly with
//! [`Csr3Matrix::from_learner`](super::Csr3Matrix::from_learner).

use super::layout::{NonzeroHint, StorageOrder};
use crate::error::{Result, SparseError};
use crate::traits::{ComplexField, SparseMatrix};

/// Records the (row, col) pairs written to it; values are discarded.
#[derive(Debug, Clone)]
pub struct SparsityPatternLearner {
    num_rows: usize,
    num_cols: usize,
    order: StorageOrder,
    /// trailing indices per leading index, in write order until read back
    lead_lists: Vec<Vec<usize>>,
    normalized: bool,
}

impl SparsityPatternLearner {
    /// Create an empty learner for a `num_rows` x `num_cols` matrix
    pub fn new(num_rows: usize, num_cols: usize, order: StorageOrder) -> Self {
        Self {
            num_rows,
            num_cols,
            order,
            lead_lists: vec![Vec::new(); order.leading(num_rows, num_cols)],
            normalized: true,
        }
    }

    /// Number of logical rows
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of logical columns
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Storage orientation the pattern is grouped by
    pub fn order(&self) -> StorageOrder {
        self.order
    }

    /// Record that (row, col) will hold an entry. The value is ignored.
    pub fn set_element<T: ComplexField>(
        &mut self,
        row: usize,
        col: usize,
        _value: T,
        _overwrite: bool,
    ) -> Result<()> {
        self.record(row, col)
    }

    /// Record that (row, col) will hold an entry
    pub fn record(&mut self, row: usize, col: usize) -> Result<()> {
        if row >= self.num_rows || col >= self.num_cols {
            return Err(SparseError::OutOfBounds {
                row,
                col,
                num_rows: self.num_rows,
                num_cols: self.num_cols,
            });
        }
        let (lead, trail) = self.order.to_lead_trail(row, col);
        self.lead_lists[lead].push(trail);
        self.normalized = false;
        Ok(())
    }

    /// Sort and deduplicate every leading index, then return the pattern.
    ///
    /// `pattern[lead]` lists the trailing indices of that leading index in
    /// ascending order.
    pub fn sparsity_pattern(&mut self) -> &[Vec<usize>] {
        if !self.normalized {
            for list in &mut self.lead_lists {
                list.sort_unstable();
                list.dedup();
            }
            self.normalized = true;
        }
        &self.lead_lists
    }

    /// Number of recorded writes; duplicates count until the pattern is read
    pub fn nnz(&self) -> usize {
        self.lead_lists.iter().map(Vec::len).sum()
    }

    /// Drop the pattern and take new dimensions
    pub fn reset(&mut self, num_rows: usize, num_cols: usize) {
        self.num_rows = num_rows;
        self.num_cols = num_cols;
        self.lead_lists.clear();
        self.lead_lists
            .resize(self.order.leading(num_rows, num_cols), Vec::new());
        self.normalized = true;
    }

    /// Append the pattern of `other`, e.g. one collected by another thread.
    pub fn merge(&mut self, other: &SparsityPatternLearner) -> Result<()> {
        if (other.num_rows, other.num_cols) != (self.num_rows, self.num_cols) {
            return Err(SparseError::DimensionMismatch {
                expected: (self.num_rows, self.num_cols),
                got: (other.num_rows, other.num_cols),
            });
        }
        if other.order == self.order {
            for (mine, theirs) in self.lead_lists.iter_mut().zip(&other.lead_lists) {
                mine.extend_from_slice(theirs);
            }
        } else {
            for (their_lead, trails) in other.lead_lists.iter().enumerate() {
                for &their_trail in trails {
                    let (row, col) = other.order.to_row_col(their_lead, their_trail);
                    let (lead, trail) = self.order.to_lead_trail(row, col);
                    self.lead_lists[lead].push(trail);
                }
            }
        }
        self.normalized = false;
        Ok(())
    }
}

impl<T: ComplexField> SparseMatrix<T> for SparsityPatternLearner {
    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn num_cols(&self) -> usize {
        self.num_cols
    }

    fn set_element(&mut self, row: usize, col: usize, _value: T, _overwrite: bool) -> Result<()> {
        self.record(row, col)
    }

    /// Learning runs read zeros
    fn get_element(&self, _row: usize, _col: usize) -> T {
        T::zero()
    }

    fn reset(&mut self, num_rows: usize, num_cols: usize, _nonzeros: Option<NonzeroHint>) {
        SparsityPatternLearner::reset(self, num_rows, num_cols)
    }

    fn nnz(&self) -> usize {
        SparsityPatternLearner::nnz(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upper_triangular_writes(learner: &mut SparsityPatternLearner) {
        for (row, col) in [(0, 0), (0, 1), (0, 2), (1, 1), (1, 2), (2, 2)] {
            learner.set_element(row, col, 1.0_f64, true).unwrap();
        }
    }

    #[test]
    fn test_pattern_is_sorted_and_deduplicated() {
        let mut learner = SparsityPatternLearner::new(3, 3, StorageOrder::RowMajor);
        learner.record(0, 2).unwrap();
        upper_triangular_writes(&mut learner);
        learner.record(1, 1).unwrap();
        assert_eq!(learner.nnz(), 8);

        let pattern = learner.sparsity_pattern();
        assert_eq!(pattern, &[vec![0, 1, 2], vec![1, 2], vec![2]]);
        assert_eq!(learner.nnz(), 6);
    }

    #[test]
    fn test_reads_are_zero() {
        let mut learner = SparsityPatternLearner::new(2, 2, StorageOrder::RowMajor);
        SparseMatrix::<f64>::set(&mut learner, 1, 1, 5.0).unwrap();
        assert_eq!(SparseMatrix::<f64>::get_element(&learner, 1, 1), 0.0);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut learner = SparsityPatternLearner::new(2, 3, StorageOrder::ColumnMajor);
        assert!(learner.record(1, 2).is_ok());
        assert!(learner.record(2, 0).unwrap_err().is_bounds_error());
    }

    #[test]
    fn test_column_major_groups_by_column() {
        let mut learner = SparsityPatternLearner::new(3, 2, StorageOrder::ColumnMajor);
        learner.record(2, 0).unwrap();
        learner.record(0, 0).unwrap();
        learner.record(1, 1).unwrap();
        assert_eq!(learner.sparsity_pattern(), &[vec![0, 2], vec![1]]);
    }

    #[test]
    fn test_merge() {
        let mut a = SparsityPatternLearner::new(3, 3, StorageOrder::RowMajor);
        let mut b = SparsityPatternLearner::new(3, 3, StorageOrder::ColumnMajor);
        a.record(0, 0).unwrap();
        b.record(0, 0).unwrap();
        b.record(2, 1).unwrap();
        a.merge(&b).unwrap();
        assert_eq!(a.sparsity_pattern(), &[vec![0], vec![], vec![1]]);

        let c = SparsityPatternLearner::new(2, 3, StorageOrder::RowMajor);
        assert!(a.merge(&c).is_err());
    }

    #[test]
    fn test_reset() {
        let mut learner = SparsityPatternLearner::new(2, 2, StorageOrder::RowMajor);
        learner.record(0, 1).unwrap();
        learner.reset(4, 1);
        assert_eq!(learner.nnz(), 0);
        assert_eq!(learner.sparsity_pattern().len(), 4);
        assert!(learner.record(3, 0).is_ok());
    }
}
