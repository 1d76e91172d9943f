//! Storage orientation, non-zero budgets and slot distribution

use serde::{Deserialize, Serialize};

/// Trailing index of a slot that is reserved but holds no entry.
pub const HOLE: usize = usize::MAX;

/// Which logical axis is compressed.
///
/// The leading dimension is the axis indexed by the lead index array
/// (rows for [`RowMajor`](Self::RowMajor), columns otherwise); the trailing
/// dimension is the coordinate stored per slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageOrder {
    /// Compressed sparse rows
    #[default]
    RowMajor,
    /// Compressed sparse columns
    ColumnMajor,
}

impl StorageOrder {
    /// Size of the leading dimension of a `num_rows` x `num_cols` matrix
    #[inline]
    pub fn leading(self, num_rows: usize, num_cols: usize) -> usize {
        match self {
            StorageOrder::RowMajor => num_rows,
            StorageOrder::ColumnMajor => num_cols,
        }
    }

    /// Size of the trailing dimension of a `num_rows` x `num_cols` matrix
    #[inline]
    pub fn trailing(self, num_rows: usize, num_cols: usize) -> usize {
        match self {
            StorageOrder::RowMajor => num_cols,
            StorageOrder::ColumnMajor => num_rows,
        }
    }

    /// Map a logical (row, col) to (lead, trail)
    #[inline]
    pub fn to_lead_trail(self, row: usize, col: usize) -> (usize, usize) {
        match self {
            StorageOrder::RowMajor => (row, col),
            StorageOrder::ColumnMajor => (col, row),
        }
    }

    /// Map a (lead, trail) pair back to logical (row, col)
    #[inline]
    pub fn to_row_col(self, lead: usize, trail: usize) -> (usize, usize) {
        // the mapping is its own inverse
        self.to_lead_trail(lead, trail)
    }
}

/// Initial non-zero budget of a matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NonzeroHint {
    /// Fraction of the dense size, in (0, 1]
    Density(f64),
    /// Absolute number of slots
    Count(usize),
}

impl From<f64> for NonzeroHint {
    /// `0 < x <= 1` is a density, `x > 1` an absolute count (rounded up);
    /// anything else asks for the minimum budget.
    fn from(x: f64) -> Self {
        if x > 0.0 && x <= 1.0 {
            NonzeroHint::Density(x)
        } else if x > 1.0 && x.is_finite() {
            NonzeroHint::Count(x.ceil() as usize)
        } else {
            log::warn!("non-zero hint {x} is not positive; using one slot per row");
            NonzeroHint::Count(0)
        }
    }
}

impl From<usize> for NonzeroHint {
    fn from(count: usize) -> Self {
        NonzeroHint::Count(count)
    }
}

impl NonzeroHint {
    /// Number of slots to allocate for a `num_rows` x `num_cols` matrix.
    ///
    /// Never fewer than `max(num_rows, num_cols)`, so each leading index
    /// starts with at least one slot.
    pub fn slots(self, num_rows: usize, num_cols: usize) -> usize {
        let requested = match self {
            NonzeroHint::Density(density) => {
                let dense = num_rows as f64 * num_cols as f64;
                (density.clamp(0.0, 1.0) * dense).ceil() as usize
            }
            NonzeroHint::Count(count) => count,
        };
        requested.max(num_rows.max(num_cols))
    }
}

/// Spread `total` slots over `lead_dim` leading indices as evenly as possible.
///
/// Returns the lead index array (length `lead_dim + 1`); the first
/// `total % lead_dim` indices receive one extra slot. With `lead_dim == 0`
/// no slot can be addressed and the array is `[0]`.
pub fn distribute_evenly(lead_dim: usize, total: usize) -> Vec<usize> {
    let mut lead_index = Vec::with_capacity(lead_dim + 1);
    lead_index.push(0);
    if lead_dim == 0 {
        return lead_index;
    }
    let base = total / lead_dim;
    let extra = total % lead_dim;
    let mut offset = 0;
    for i in 0..lead_dim {
        offset += base + usize::from(i < extra);
        lead_index.push(offset);
    }
    lead_index
}

/// Prefix sums of per-lead capacities
pub fn offsets_from_counts(counts: &[usize]) -> Vec<usize> {
    let mut lead_index = Vec::with_capacity(counts.len() + 1);
    let mut offset = 0;
    lead_index.push(0);
    for &count in counts {
        offset += count;
        lead_index.push(offset);
    }
    lead_index
}
