//! Core traits shared by the storage engines
//!
//! - [`ComplexField`]: scalar types that can be stored in a matrix
//! - [`SparseMatrix`]: the write/read surface assembly code talks to, implemented
//!   by both [`Csr3Matrix`](crate::Csr3Matrix) and
//!   [`SparsityPatternLearner`](crate::SparsityPatternLearner) so the same
//!   assembly routine can run in learning mode and in real mode

use crate::error::Result;
use crate::sparse::NonzeroHint;
use num_complex::{Complex32, Complex64};
use num_traits::{Float, FromPrimitive, NumAssign, One, ToPrimitive, Zero};
use std::fmt::{Debug, Display};
use std::ops::Neg;

/// Trait for scalar types stored in sparse matrices.
///
/// Abstracts over real and complex number types: field arithmetic plus a
/// real-valued magnitude (used by pruning) and an inverse (used by LU).
///
/// # Implementations
///
/// Provided for:
/// - `f64` (default, what mechanical assembly produces)
/// - `f32`
/// - `Complex64`
/// - `Complex32`
pub trait ComplexField:
    NumAssign + Clone + Copy + Send + Sync + Debug + Zero + One + Neg<Output = Self> + 'static
{
    /// The real number type underlying this field
    type Real: Float
        + NumAssign
        + FromPrimitive
        + ToPrimitive
        + Send
        + Sync
        + Debug
        + Display
        + 'static;

    /// Squared magnitude |z|²
    fn norm_sqr(&self) -> Self::Real;

    /// Magnitude |z|
    fn norm(&self) -> Self::Real {
        self.norm_sqr().sqrt()
    }

    /// Multiplicative inverse (1/z)
    fn inv(&self) -> Self;
}

macro_rules! impl_complex_field {
    ($t:ty, $real:ty) => {
        impl ComplexField for $t {
            type Real = $real;

            #[inline]
            fn norm_sqr(&self) -> $real {
                self.re * self.re + self.im * self.im
            }

            #[inline]
            fn inv(&self) -> Self {
                let denom = ComplexField::norm_sqr(self);
                <$t>::new(self.re / denom, -self.im / denom)
            }
        }
    };
}

macro_rules! impl_real_field {
    ($t:ty) => {
        impl ComplexField for $t {
            type Real = $t;

            #[inline]
            fn norm_sqr(&self) -> $t {
                self * self
            }

            #[inline]
            fn norm(&self) -> $t {
                self.abs()
            }

            #[inline]
            fn inv(&self) -> Self {
                self.recip()
            }
        }
    };
}

impl_complex_field!(Complex64, f64);
impl_complex_field!(Complex32, f32);
impl_real_field!(f64);
impl_real_field!(f32);

/// Write/read surface of a sparse matrix under assembly.
///
/// Assembly routines are written against this trait so that a dry run into a
/// [`SparsityPatternLearner`](crate::SparsityPatternLearner) and the real run
/// into a [`Csr3Matrix`](crate::Csr3Matrix) share one code path.
pub trait SparseMatrix<T: ComplexField> {
    /// Number of logical rows
    fn num_rows(&self) -> usize;

    /// Number of logical columns
    fn num_cols(&self) -> usize;

    /// Store `value` at (row, col).
    ///
    /// When an entry already exists it is replaced if `overwrite` is true;
    /// otherwise the value already written in this assembly cycle is kept.
    fn set_element(&mut self, row: usize, col: usize, value: T, overwrite: bool) -> Result<()>;

    /// Read the value at (row, col); absent entries read as zero.
    fn get_element(&self, row: usize, col: usize) -> T;

    /// Reinitialize the logical dimensions.
    fn reset(&mut self, num_rows: usize, num_cols: usize, nonzeros: Option<NonzeroHint>);

    /// Number of stored slots
    fn nnz(&self) -> usize;

    /// Store `value` at (row, col), replacing any existing entry
    fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        self.set_element(row, col, value, true)
    }

    /// Same as [`reset`](Self::reset); always succeeds
    fn resize(
        &mut self,
        num_rows: usize,
        num_cols: usize,
        nonzeros: Option<NonzeroHint>,
    ) -> bool {
        self.reset(num_rows, num_cols, nonzeros);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_complex64_field() {
        let z = Complex64::new(3.0, 4.0);
        assert_relative_eq!(z.norm_sqr(), 25.0);
        assert_relative_eq!(z.norm(), 5.0);

        let product = z * z.inv();
        assert_relative_eq!(product.re, 1.0, epsilon = 1e-10);
        assert_relative_eq!(product.im, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_complex32_inverse() {
        let z = Complex32::new(0.0, 2.0);
        let inv = ComplexField::inv(&z);
        assert_relative_eq!(inv.re, 0.0);
        assert_relative_eq!(inv.im, -0.5);
    }

    #[test]
    fn test_f64_field() {
        let x: f64 = -3.0;
        assert_relative_eq!(x.norm_sqr(), 9.0);
        assert_relative_eq!(ComplexField::norm(&x), 3.0);
        assert_relative_eq!(ComplexField::inv(&x), -1.0 / 3.0);
    }
}
