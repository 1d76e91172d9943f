//! Error types for sparse matrix assembly and export.
//!
//! Follows the same pattern as the other `math-audio` crates: a `thiserror`
//! enum for the library error, a crate-wide `Result` alias, and helper
//! methods for error categorization.

use std::collections::TryReserveError;
use thiserror::Error;

/// Errors that can occur while building, exporting or importing a matrix.
#[derive(Debug, Error)]
pub enum SparseError {
    /// A (row, col) pair lies outside the declared dimensions.
    #[error("index ({row}, {col}) out of bounds for a {num_rows}x{num_cols} matrix")]
    OutOfBounds {
        /// Requested row
        row: usize,
        /// Requested column
        col: usize,
        /// Number of rows of the matrix
        num_rows: usize,
        /// Number of columns of the matrix
        num_cols: usize,
    },

    /// Growing the storage buffers failed.
    #[error("failed to allocate {requested} slots")]
    AllocationFailed {
        /// Number of slots that were requested
        requested: usize,
        /// Underlying allocator error
        #[source]
        source: TryReserveError,
    },

    /// The operation needs a compressed matrix (no holes).
    #[error("matrix is not compressed; call compress() first")]
    NotCompressed,

    /// Two objects that must agree on their dimensions do not.
    #[error("dimension mismatch: expected {expected:?}, got {got:?}")]
    DimensionMismatch {
        /// Expected (rows, cols)
        expected: (usize, usize),
        /// Actual (rows, cols)
        got: (usize, usize),
    },

    /// An index does not fit the 32-bit integer type a solver expects.
    #[error("index {index} does not fit in a 32-bit solver index")]
    IndexOverflow {
        /// The offending index
        index: usize,
    },

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line of a `.dat` file could not be parsed.
    #[error("parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number in the input
        line: usize,
        /// What went wrong
        message: String,
    },

    /// A configuration file could not be (de)serialized.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// A specialized `Result` type for sparse matrix operations.
pub type Result<T> = std::result::Result<T, SparseError>;

impl SparseError {
    /// Returns `true` for errors caused by an invalid (row, col) from the caller.
    ///
    /// These are programming errors in the assembly code, not runtime conditions.
    pub fn is_bounds_error(&self) -> bool {
        matches!(self, SparseError::OutOfBounds { .. })
    }

    /// Returns `true` for errors raised while reading or writing files.
    ///
    /// This includes `Io`, `Parse` and `Config`.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            SparseError::Io(_) | SparseError::Parse { .. } | SparseError::Config(_)
        )
    }

    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        SparseError::Parse {
            line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SparseError::OutOfBounds {
            row: 3,
            col: 0,
            num_rows: 3,
            num_cols: 3,
        };
        assert_eq!(
            err.to_string(),
            "index (3, 0) out of bounds for a 3x3 matrix"
        );

        let err = SparseError::parse(7, "expected 3 fields");
        assert_eq!(err.to_string(), "parse error at line 7: expected 3 fields");
    }

    #[test]
    fn test_error_categories() {
        let bounds = SparseError::OutOfBounds {
            row: 0,
            col: 9,
            num_rows: 2,
            num_cols: 2,
        };
        let parse = SparseError::parse(1, "bad header");

        assert!(bounds.is_bounds_error());
        assert!(!bounds.is_io_error());
        assert!(parse.is_io_error());
        assert!(!parse.is_bounds_error());
        assert!(!SparseError::NotCompressed.is_io_error());
    }
}
