//! Direct solver boundary
//!
//! A compressed [`Csr3Matrix`] is handed to a solver as a [`CsrView`]; the
//! solver owns whatever factorization it computes. Production backends
//! (Pardiso, MUMPS, ...) implement [`DirectSolver`] outside this crate;
//! [`DenseLuSolver`] is the in-crate reference adapter.

mod lu;

pub use lu::{DenseLuSolver, LuFactorization, lu_factorize};

use crate::error::SparseError;
use crate::sparse::{Csr3Matrix, CsrView};
use crate::traits::ComplexField;
use ndarray::Array1;
use thiserror::Error;

/// Errors that can occur while factorizing or solving
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Matrix is singular or nearly singular")]
    SingularMatrix,
    #[error("Matrix is not square: {num_rows}x{num_cols}")]
    NotSquare { num_rows: usize, num_cols: usize },
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("solve called before a successful factorization")]
    NotFactorized,
    #[error(transparent)]
    Sparse(#[from] SparseError),
}

/// A solver that factorizes a compressed sparse matrix once and solves for
/// any number of right-hand sides.
pub trait DirectSolver<T: ComplexField> {
    /// Factorize the matrix, replacing any previous factorization
    fn factorize(&mut self, matrix: &CsrView<'_, T>) -> Result<(), SolverError>;

    /// Solve `A x = rhs` with the current factorization
    fn solve(&self, rhs: &Array1<T>) -> Result<Array1<T>, SolverError>;
}

/// Compress `matrix`, factorize it with `solver` and solve for `rhs`.
pub fn solve_system<T, S>(
    matrix: &mut Csr3Matrix<T>,
    rhs: &Array1<T>,
    solver: &mut S,
) -> Result<Array1<T>, SolverError>
where
    T: ComplexField,
    S: DirectSolver<T> + ?Sized,
{
    if rhs.len() != matrix.num_rows() {
        return Err(SolverError::DimensionMismatch {
            expected: matrix.num_rows(),
            got: rhs.len(),
        });
    }
    let view = matrix.compressed_view();
    solver.factorize(&view)?;
    solver.solve(rhs)
}
