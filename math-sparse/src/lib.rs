//! Incrementally assembled sparse matrices for direct solvers
//!
//! This crate provides a mutable CSR3 sparse matrix that finite-element style
//! assembly code can write into in any order, and that compresses into the
//! three standard CSR arrays a direct solver consumes.
//!
//! # Features
//!
//! - **CSR3 with holes**: reserved slots absorb out-of-order insertions with a
//!   local shift instead of a full rebuild
//! - **Pattern learning**: a dry run into [`SparsityPatternLearner`] sizes the
//!   real matrix exactly
//! - **Pattern lock**: repeated assembly cycles keep their layout across resets
//! - **Solver boundary**: zero-copy [`CsrView`] and the [`DirectSolver`] trait
//! - **Generic Scalar Types**: Works with f64, f32, Complex64, Complex32
//!
//! # Example
//!
//! ```ignore
//! use math_audio_sparse::{Csr3Matrix, SparseMatrix, SparsityPatternLearner, StorageOrder};
//!
//! fn assemble<M: SparseMatrix<f64>>(m: &mut M) -> math_audio_sparse::Result<()> {
//!     m.set(0, 0, 4.0)?;
//!     m.set(1, 0, -1.0)?;
//!     Ok(())
//! }
//!
//! let mut learner = SparsityPatternLearner::new(2, 2, StorageOrder::RowMajor);
//! assemble(&mut learner)?;
//!
//! let mut matrix: Csr3Matrix = Csr3Matrix::from_learner(&mut learner, Default::default());
//! assemble(&mut matrix)?;
//! let view = matrix.compressed_view();
//! ```

pub mod config;
pub mod direct;
pub mod error;
pub mod io;
pub mod observer;
pub mod sparse;
pub mod traits;

pub use config::Csr3Config;
pub use error::{Result, SparseError};
pub use observer::{CountingObserver, MatrixObserver, ObserverCounts};
pub use sparse::{
    Csr3Matrix, CsrView, HOLE, IndexBase, LayoutError, MemoryInfo, NonzeroHint,
    SparsityPatternLearner, StorageOrder,
};
pub use traits::{ComplexField, SparseMatrix};

pub use direct::{DenseLuSolver, DirectSolver, SolverError, solve_system};
pub use io::{DatOptions, DatScalar, read_dat, write_dat};
