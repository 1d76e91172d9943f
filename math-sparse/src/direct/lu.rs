//! Dense LU reference solver
//!
//! Densifies the view and factorizes it with partial pivoting. Meant for small
//! systems and for checking the solver boundary, not as a production path.

use super::{DirectSolver, SolverError};
use crate::sparse::CsrView;
use crate::traits::ComplexField;
use ndarray::{Array1, Array2};
use num_traits::{Float, FromPrimitive};

/// LU factors of a square matrix
///
/// L is unit lower triangular and stored below the diagonal, U on and above.
#[derive(Debug, Clone)]
pub struct LuFactorization<T: ComplexField> {
    /// Combined L and U factors
    pub lu: Array2<T>,
    /// Row swapped with row `k` at elimination step `k`
    pub pivots: Vec<usize>,
    /// Matrix dimension
    pub n: usize,
}

fn singular_threshold<T: ComplexField>() -> T::Real {
    T::Real::from_f64(1e-30).unwrap_or_else(T::Real::min_positive_value)
}

impl<T: ComplexField> LuFactorization<T> {
    /// Solve Ax = b with the stored factors
    pub fn solve(&self, b: &Array1<T>) -> Result<Array1<T>, SolverError> {
        if b.len() != self.n {
            return Err(SolverError::DimensionMismatch {
                expected: self.n,
                got: b.len(),
            });
        }

        let mut x = b.clone();
        for (i, &pivot) in self.pivots.iter().enumerate() {
            if pivot != i {
                x.swap(i, pivot);
            }
        }

        // Ly = Pb
        for i in 0..self.n {
            for j in 0..i {
                let l_ij = self.lu[[i, j]];
                let x_j = x[j];
                x[i] -= l_ij * x_j;
            }
        }

        // Ux = y
        for i in (0..self.n).rev() {
            for j in (i + 1)..self.n {
                let u_ij = self.lu[[i, j]];
                let x_j = x[j];
                x[i] -= u_ij * x_j;
            }
            let u_ii = self.lu[[i, i]];
            if u_ii.norm() < singular_threshold::<T>() {
                return Err(SolverError::SingularMatrix);
            }
            x[i] *= u_ii.inv();
        }

        Ok(x)
    }
}

/// Factorize a dense square matrix with partial pivoting
pub fn lu_factorize<T: ComplexField>(a: &Array2<T>) -> Result<LuFactorization<T>, SolverError> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(SolverError::NotSquare {
            num_rows: n,
            num_cols: a.ncols(),
        });
    }

    let mut lu = a.clone();
    let mut pivots = Vec::with_capacity(n);

    for k in 0..n {
        let mut max_val = lu[[k, k]].norm();
        let mut max_row = k;
        for i in (k + 1)..n {
            let val = lu[[i, k]].norm();
            if val > max_val {
                max_val = val;
                max_row = i;
            }
        }

        if max_val < singular_threshold::<T>() {
            return Err(SolverError::SingularMatrix);
        }

        if max_row != k {
            for j in 0..n {
                lu.swap([k, j], [max_row, j]);
            }
        }
        pivots.push(max_row);

        let pivot_inv = lu[[k, k]].inv();
        for i in (k + 1)..n {
            let mult = lu[[i, k]] * pivot_inv;
            lu[[i, k]] = mult;
            for j in (k + 1)..n {
                let update = mult * lu[[k, j]];
                lu[[i, j]] -= update;
            }
        }
    }

    Ok(LuFactorization { lu, pivots, n })
}

/// [`DirectSolver`] that densifies the matrix and runs [`lu_factorize`]
#[derive(Debug, Clone)]
pub struct DenseLuSolver<T: ComplexField> {
    factorization: Option<LuFactorization<T>>,
}

impl<T: ComplexField> DenseLuSolver<T> {
    pub fn new() -> Self {
        Self {
            factorization: None,
        }
    }

    /// Factors of the last successful `factorize` call
    pub fn factorization(&self) -> Option<&LuFactorization<T>> {
        self.factorization.as_ref()
    }
}

impl<T: ComplexField> Default for DenseLuSolver<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ComplexField> DirectSolver<T> for DenseLuSolver<T> {
    fn factorize(&mut self, matrix: &CsrView<'_, T>) -> Result<(), SolverError> {
        self.factorization = None;
        if matrix.num_rows() != matrix.num_cols() {
            return Err(SolverError::NotSquare {
                num_rows: matrix.num_rows(),
                num_cols: matrix.num_cols(),
            });
        }
        log::debug!(
            "dense LU factorization of a {n}x{n} matrix with {nnz} entries",
            n = matrix.num_rows(),
            nnz = matrix.nnz()
        );
        self.factorization = Some(lu_factorize(&matrix.to_dense())?);
        Ok(())
    }

    fn solve(&self, rhs: &Array1<T>) -> Result<Array1<T>, SolverError> {
        self.factorization
            .as_ref()
            .ok_or(SolverError::NotFactorized)?
            .solve(rhs)
    }
}
