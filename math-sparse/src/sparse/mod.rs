//! Sparse matrix storage
//!
//! - [`Csr3Matrix`]: mutable CSR3 matrix with holes, assembled entry by entry
//! - [`SparsityPatternLearner`]: dry-run target that records the pattern only
//! - [`CsrView`]: borrowed, hole-free arrays handed to a direct solver

mod csr3;
mod layout;
mod learner;
mod view;

pub use csr3::{Csr3Matrix, LayoutError, MemoryInfo};
pub use layout::{HOLE, NonzeroHint, StorageOrder, distribute_evenly};
pub use learner::SparsityPatternLearner;
pub use view::{CsrView, IndexBase};
