//! Mutable CSR3 sparse matrix
//!
//! Three parallel buffers hold the matrix, exactly as a Pardiso-style direct
//! solver consumes them once compressed:
//! - `lead_index`: start offset of each leading index (length `lead_dim + 1`)
//! - `trail_index`: trailing coordinate of each slot, or [`HOLE`]
//! - `values`: payload of each slot
//!
//! Unlike a plain CSR builder the layout may contain holes: slots reserved for
//! a leading index that hold no entry yet. Inserting out of order only moves
//! the entries between the insertion point and the nearest hole; the whole
//! matrix is rebuilt only when no hole is close enough.
//!
//! ```text
//!  | 1.1  1.2  1.3 |   values      = [1.1, 1.2, 1.3, 2.2, 2.3, --, 3.3, --, --]
//!  |  0   2.2  2.3 |   trail_index = [  0,   1,   2,   1,   2,  H,   2,  H,  H]
//!  |  0    0   3.3 |   lead_index  = [  0,             3,            6,         9]
//! ```
//!
//! Writing (2, 0) moves `3.3` one slot right into the hole and stores the new
//! entry in front of it. [`Csr3Matrix::compress`] purges the remaining holes.

use super::layout::{HOLE, NonzeroHint, StorageOrder, distribute_evenly, offsets_from_counts};
use super::learner::SparsityPatternLearner;
use super::view::CsrView;
use crate::config::Csr3Config;
use crate::error::{Result, SparseError};
use crate::observer::MatrixObserver;
use crate::traits::{ComplexField, SparseMatrix};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;

/// Inconsistencies reported by [`Csr3Matrix::verify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// The lead index array has the wrong length
    #[error("lead index has {len} entries, expected {expected}")]
    LeadIndexLength {
        /// Actual length
        len: usize,
        /// `lead_dim + 1`
        expected: usize,
    },
    /// The first offset is not zero
    #[error("lead index does not start at zero")]
    LeadIndexStart,
    /// An offset is smaller than its predecessor
    #[error("lead index decreases after lead {lead}")]
    LeadIndexNotMonotonic {
        /// Leading index whose end precedes its start
        lead: usize,
    },
    /// The last offset disagrees with the number of slots
    #[error("lead index ends at {end} but {slots} slots are stored")]
    SlotCountMismatch {
        /// Last offset
        end: usize,
        /// Length of the trailing index buffer
        slots: usize,
    },
    /// The slot buffers do not have the same length
    #[error("slot buffers have different lengths")]
    BufferLengthMismatch,
    /// A stored trailing coordinate exceeds the trailing dimension
    #[error("slot {slot} holds trailing index {trail}, beyond dimension {trailing_dim}")]
    TrailOutOfRange {
        /// Offending slot
        slot: usize,
        /// Stored coordinate
        trail: usize,
        /// Size of the trailing dimension
        trailing_dim: usize,
    },
    /// Entries of a leading index are not strictly increasing
    #[error("entries of lead {lead} are not strictly increasing at slot {slot}")]
    Unsorted {
        /// Leading index
        lead: usize,
        /// First out-of-order slot
        slot: usize,
    },
    /// A hole is flagged as holding a written value
    #[error("hole at slot {slot} is flagged as initialized")]
    InitializedHole {
        /// Offending slot
        slot: usize,
    },
    /// A matrix flagged as compressed still has a hole
    #[error("compressed matrix has a hole at slot {slot}")]
    HoleInCompressed {
        /// Offending slot
        slot: usize,
    },
}

impl LayoutError {
    /// Integer diagnostic code; 0 is reserved for a valid matrix
    pub fn code(&self) -> i32 {
        match self {
            LayoutError::LeadIndexLength { .. } => -1,
            LayoutError::LeadIndexStart => -2,
            LayoutError::LeadIndexNotMonotonic { .. } => -3,
            LayoutError::SlotCountMismatch { .. } => -4,
            LayoutError::BufferLengthMismatch => -5,
            LayoutError::TrailOutOfRange { .. } => -6,
            LayoutError::Unsorted { .. } => -7,
            LayoutError::InitializedHole { .. } => -8,
            LayoutError::HoleInCompressed { .. } => -9,
        }
    }
}

/// Buffer lengths and capacities of a matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    /// Length of the lead index array
    pub lead_len: usize,
    /// Reserved capacity of the lead index array
    pub lead_capacity: usize,
    /// Slots in use (entries plus holes)
    pub slots: usize,
    /// Reserved slot capacity
    pub slot_capacity: usize,
    /// Slots holding an entry
    pub entries: usize,
    /// Bytes reserved by all buffers
    pub allocated_bytes: usize,
}

impl fmt::Display for MemoryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lead index {}/{}, slots {}/{} ({} entries), {} bytes",
            self.lead_len,
            self.lead_capacity,
            self.slots,
            self.slot_capacity,
            self.entries,
            self.allocated_bytes
        )
    }
}

/// Where an entry is, or where it would go
enum Probe {
    /// Existing entry at this slot
    Found(usize),
    /// Not stored; entries in `[start, lo)` are smaller and entries from `hi`
    /// on are larger, so every slot of `lo..hi` is a usable hole
    Vacant { lo: usize, hi: usize },
}

/// Incrementally assembled CSR3 sparse matrix.
///
/// Single-threaded by contract: writes take `&mut self`. A compressed matrix
/// can be shared for concurrent reads.
#[derive(Clone)]
pub struct Csr3Matrix<T: ComplexField = f64> {
    num_rows: usize,
    num_cols: usize,
    order: StorageOrder,
    lead_index: Vec<usize>,
    trail_index: Vec<usize>,
    values: Vec<T>,
    /// true iff the slot value was written since the last reset
    initialized: Vec<bool>,
    compressed: bool,
    config: Csr3Config,
    pattern_lock: bool,
    /// the current layout was kept by a locked reset
    lock_established: bool,
    lock_broken: bool,
    observer: Option<Arc<dyn MatrixObserver>>,
}

impl<T: ComplexField> Csr3Matrix<T> {
    /// Create a matrix with an initial non-zero budget.
    ///
    /// A float hint in (0, 1] is a density of the dense size, a hint above 1
    /// an absolute count; see [`NonzeroHint`].
    pub fn new(
        num_rows: usize,
        num_cols: usize,
        order: StorageOrder,
        nonzeros: impl Into<NonzeroHint>,
    ) -> Self {
        Self::with_config(num_rows, num_cols, order, nonzeros, Csr3Config::default())
    }

    /// Create a matrix with an explicit insertion/growth policy
    pub fn with_config(
        num_rows: usize,
        num_cols: usize,
        order: StorageOrder,
        nonzeros: impl Into<NonzeroHint>,
        config: Csr3Config,
    ) -> Self {
        let mut matrix = Self::empty(num_rows, num_cols, order, config);
        let slots = nonzeros.into().slots(num_rows, num_cols);
        matrix.reset_arrays(slots);
        matrix
    }

    /// Create a matrix whose leading index `i` starts with `counts[i]` slots.
    ///
    /// # Panics
    ///
    /// Panics if `counts.len()` differs from the leading dimension.
    pub fn from_nonzeros_per_lead(
        num_rows: usize,
        num_cols: usize,
        order: StorageOrder,
        counts: &[usize],
    ) -> Self {
        assert_eq!(
            counts.len(),
            order.leading(num_rows, num_cols),
            "one slot count per leading index is required"
        );
        let mut matrix = Self::empty(num_rows, num_cols, order, Csr3Config::default());
        matrix.lead_index = offsets_from_counts(counts);
        let slots = matrix.lead_index[counts.len()];
        matrix.trail_index = vec![HOLE; slots];
        matrix.values = vec![T::zero(); slots];
        matrix.initialized = vec![false; slots];
        matrix
    }

    /// Build a matrix from (row, col, value) triplets with an exact allocation.
    ///
    /// Duplicate entries are summed.
    pub fn from_triplets(
        num_rows: usize,
        num_cols: usize,
        order: StorageOrder,
        triplets: &[(usize, usize, T)],
    ) -> Result<Self> {
        let mut counts = vec![0usize; order.leading(num_rows, num_cols)];
        for &(row, col, _) in triplets {
            if row >= num_rows || col >= num_cols {
                return Err(SparseError::OutOfBounds {
                    row,
                    col,
                    num_rows,
                    num_cols,
                });
            }
            counts[order.to_lead_trail(row, col).0] += 1;
        }

        let mut matrix = Self::from_nonzeros_per_lead(num_rows, num_cols, order, &counts);
        for &(row, col, value) in triplets {
            matrix.add_element(row, col, value)?;
        }
        Ok(matrix)
    }

    /// Build a matrix whose layout is exactly the pattern `learner` collected.
    ///
    /// The matrix takes the learner's dimensions and storage order.
    pub fn from_learner(learner: &mut SparsityPatternLearner, config: Csr3Config) -> Self {
        let mut matrix = Self::empty(
            learner.num_rows(),
            learner.num_cols(),
            learner.order(),
            config,
        );
        matrix.load_sparsity_pattern(learner);
        matrix
    }

    fn empty(num_rows: usize, num_cols: usize, order: StorageOrder, config: Csr3Config) -> Self {
        Self {
            num_rows,
            num_cols,
            order,
            lead_index: vec![0],
            trail_index: Vec::new(),
            values: Vec::new(),
            initialized: Vec::new(),
            compressed: false,
            config,
            pattern_lock: false,
            lock_established: false,
            lock_broken: false,
            observer: None,
        }
    }

    /// Attach an instrumentation observer
    pub fn with_observer(mut self, observer: Arc<dyn MatrixObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Replace or remove the instrumentation observer
    pub fn set_observer(&mut self, observer: Option<Arc<dyn MatrixObserver>>) {
        self.observer = observer;
    }

    /// Number of logical rows
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of logical columns
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Storage orientation chosen at construction
    pub fn order(&self) -> StorageOrder {
        self.order
    }

    /// Size of the compressed axis
    pub fn leading_dim(&self) -> usize {
        self.order.leading(self.num_rows, self.num_cols)
    }

    /// Size of the axis stored per slot
    pub fn trailing_dim(&self) -> usize {
        self.order.trailing(self.num_rows, self.num_cols)
    }

    /// Number of slots, holes included until [`compress`](Self::compress)
    pub fn nnz(&self) -> usize {
        self.trail_index.len()
    }

    /// Last offset of the lead index array
    pub fn trailing_index_length(&self) -> usize {
        self.lead_index[self.leading_dim()]
    }

    /// Reserved capacity of the slot buffers
    pub fn trailing_index_capacity(&self) -> usize {
        self.trail_index.capacity()
    }

    /// Raw lead index array
    pub fn lead_index(&self) -> &[usize] {
        &self.lead_index
    }

    /// Raw trailing index array; holes read as [`HOLE`]
    pub fn trail_index(&self) -> &[usize] {
        &self.trail_index
    }

    /// Raw value array; meaningless where the trailing index is a hole
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Slot range of a leading index
    pub fn lead_range(&self, lead: usize) -> Range<usize> {
        self.lead_index[lead]..self.lead_index[lead + 1]
    }

    /// True when no hole is left and no write happened since the last compression
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Insertion/growth policy
    pub fn config(&self) -> &Csr3Config {
        &self.config
    }

    /// Bound the hole search of future insertions
    pub fn set_max_shifts(&mut self, max_shifts: usize) {
        self.config.max_shifts = max_shifts;
    }

    /// Keep the sparsity layout across [`reset`](Self::reset) calls.
    ///
    /// While enabled, a reset with unchanged dimensions only clears the values,
    /// unless a structural change broke the lock in the meantime.
    pub fn set_sparsity_pattern_lock(&mut self, enabled: bool) {
        self.pattern_lock = enabled;
    }

    /// Whether the sparsity pattern lock is enabled
    pub fn sparsity_pattern_lock(&self) -> bool {
        self.pattern_lock
    }

    /// True if a structural change happened since the layout was locked;
    /// the next reset will then rebuild the layout
    pub fn is_lock_broken(&self) -> bool {
        self.lock_broken
    }

    fn notify(&self, event: impl FnOnce(&dyn MatrixObserver)) {
        if let Some(observer) = &self.observer {
            event(observer.as_ref());
        }
    }

    fn check_bounds(&self, row: usize, col: usize) -> Result<(usize, usize)> {
        if row >= self.num_rows || col >= self.num_cols {
            return Err(SparseError::OutOfBounds {
                row,
                col,
                num_rows: self.num_rows,
                num_cols: self.num_cols,
            });
        }
        Ok(self.order.to_lead_trail(row, col))
    }

    /// Store `value` at (row, col).
    ///
    /// An existing entry is replaced when `overwrite` is true; with `overwrite`
    /// false the first value written since the last reset wins.
    pub fn set_element(&mut self, row: usize, col: usize, value: T, overwrite: bool) -> Result<()> {
        self.notify(|o| o.on_set_element());
        let (lead, trail) = self.check_bounds(row, col)?;
        let slot = match self.probe(lead, trail) {
            Probe::Found(slot) => {
                if !overwrite && self.initialized[slot] {
                    return Ok(());
                }
                slot
            }
            Probe::Vacant { lo, hi } => self.insert(lead, trail, lo, hi)?,
        };
        self.values[slot] = value;
        self.initialized[slot] = true;
        self.compressed = false;
        Ok(())
    }

    /// Mutable access to (row, col), creating a zero entry if needed.
    ///
    /// Meant for accumulation (`*m.element(i, j)? += k`); prefer
    /// [`get_element`](Self::get_element) for reading.
    pub fn element(&mut self, row: usize, col: usize) -> Result<&mut T> {
        self.notify(|o| o.on_set_element());
        let (lead, trail) = self.check_bounds(row, col)?;
        let slot = match self.probe(lead, trail) {
            Probe::Found(slot) => slot,
            Probe::Vacant { lo, hi } => self.insert(lead, trail, lo, hi)?,
        };
        self.initialized[slot] = true;
        self.compressed = false;
        Ok(&mut self.values[slot])
    }

    /// Mutable access by linear index `row * num_cols + col`
    pub fn element_linear(&mut self, index: usize) -> Result<&mut T> {
        if self.num_cols == 0 {
            return Err(SparseError::OutOfBounds {
                row: index,
                col: 0,
                num_rows: self.num_rows,
                num_cols: self.num_cols,
            });
        }
        self.element(index / self.num_cols, index % self.num_cols)
    }

    /// Add `value` to (row, col)
    pub fn add_element(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        *self.element(row, col)? += value;
        Ok(())
    }

    /// Value at (row, col), zero if not stored. Never allocates.
    ///
    /// # Panics
    ///
    /// Panics if (row, col) is outside the matrix.
    pub fn get_element(&self, row: usize, col: usize) -> T {
        assert!(
            row < self.num_rows && col < self.num_cols,
            "index ({row}, {col}) out of bounds for a {}x{} matrix",
            self.num_rows,
            self.num_cols
        );
        let (lead, trail) = self.order.to_lead_trail(row, col);
        match self.find(lead, trail) {
            Some(slot) => self.values[slot],
            None => T::zero(),
        }
    }

    /// Binary search over the entries of `lead`, stepping over holes
    fn find(&self, lead: usize, trail: usize) -> Option<usize> {
        let Range { start: mut lo, end: mut hi } = self.lead_range(lead);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let mut probe = mid;
            while probe < hi && self.trail_index[probe] == HOLE {
                probe += 1;
            }
            if probe == hi {
                hi = mid;
                continue;
            }
            match self.trail_index[probe].cmp(&trail) {
                std::cmp::Ordering::Equal => return Some(probe),
                std::cmp::Ordering::Less => lo = probe + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        None
    }

    fn probe(&self, lead: usize, trail: usize) -> Probe {
        let range = self.lead_range(lead);
        let mut lo = range.start;
        for slot in range.clone() {
            let stored = self.trail_index[slot];
            if stored == HOLE {
                continue;
            }
            if stored == trail {
                return Probe::Found(slot);
            }
            if stored > trail {
                return Probe::Vacant { lo, hi: slot };
            }
            lo = slot + 1;
        }
        Probe::Vacant { lo, hi: range.end }
    }

    /// Create an entry for `trail` in `lead` and return its slot
    fn insert(&mut self, lead: usize, trail: usize, lo: usize, hi: usize) -> Result<usize> {
        let slot = if lo < hi {
            self.notify(|o| o.on_insert(0));
            lo
        } else {
            match self.open_gap(lead, lo) {
                Some((slot, shifts)) => {
                    log::trace!("CSR3 insert in lead {lead}: shifted {shifts} entries");
                    self.notify(|o| o.on_insert(shifts));
                    slot
                }
                None => return self.grow_and_insert(lead, trail),
            }
        };
        self.trail_index[slot] = trail;
        self.values[slot] = T::zero();
        self.initialized[slot] = false;
        self.mark_structural_change();
        Ok(slot)
    }

    /// Open a gap at insertion point `pos` of `lead` by moving entries towards
    /// the nearest hole within `max_shifts`. Returns the freed slot and the
    /// number of entries moved.
    fn open_gap(&mut self, lead: usize, pos: usize) -> Option<(usize, usize)> {
        let Range { start, end } = self.lead_range(lead);
        let max_shifts = self.config.max_shifts;
        let trail_index = &self.trail_index;

        let left = (start..pos)
            .rev()
            .take_while(|&h| pos - 1 - h <= max_shifts)
            .find(|&h| trail_index[h] == HOLE);
        let right = (pos..end)
            .take_while(|&h| h - pos <= max_shifts)
            .find(|&h| trail_index[h] == HOLE);

        match (left, right) {
            (Some(h), Some(r)) if pos - 1 - h < r - pos => Some(self.shift_left(h, pos)),
            (Some(h), None) => Some(self.shift_left(h, pos)),
            (_, Some(h)) => Some(self.shift_right(pos, h)),
            (None, None) => None,
        }
    }

    /// Move slots `hole+1..pos` one slot left; frees `pos - 1`
    fn shift_left(&mut self, hole: usize, pos: usize) -> (usize, usize) {
        self.trail_index.copy_within(hole + 1..pos, hole);
        self.values.copy_within(hole + 1..pos, hole);
        self.initialized.copy_within(hole + 1..pos, hole);
        (pos - 1, pos - 1 - hole)
    }

    /// Move slots `pos..hole` one slot right; frees `pos`
    fn shift_right(&mut self, pos: usize, hole: usize) -> (usize, usize) {
        self.trail_index.copy_within(pos..hole, pos + 1);
        self.values.copy_within(pos..hole, pos + 1);
        self.initialized.copy_within(pos..hole, pos + 1);
        (pos, hole - pos)
    }

    /// Rebuild all buffers with every leading index grown by the configured
    /// factor, placing the new entry on the way.
    ///
    /// The new buffers are fully built before they replace the old ones.
    fn grow_and_insert(&mut self, lead: usize, trail: usize) -> Result<usize> {
        let lead_dim = self.leading_dim();
        let old_slots = self.trail_index.len();
        let counts: Vec<usize> = (0..lead_dim)
            .map(|i| {
                self.config
                    .grown_capacity(self.lead_index[i + 1] - self.lead_index[i])
            })
            .collect();
        let new_lead = offsets_from_counts(&counts);
        let new_slots = new_lead[lead_dim];

        let mut new_trail = try_filled(new_slots, HOLE)?;
        let mut new_values = try_filled(new_slots, T::zero())?;
        let mut new_initialized = try_filled(new_slots, false)?;

        let mut inserted_at = new_lead[lead];
        for i in 0..lead_dim {
            let mut write = new_lead[i];
            let mut pending = i == lead;
            for slot in self.lead_range(i) {
                let stored = self.trail_index[slot];
                if stored == HOLE {
                    continue;
                }
                if pending && stored > trail {
                    new_trail[write] = trail;
                    inserted_at = write;
                    pending = false;
                    write += 1;
                }
                new_trail[write] = stored;
                new_values[write] = self.values[slot];
                new_initialized[write] = self.initialized[slot];
                write += 1;
            }
            if pending {
                new_trail[write] = trail;
                inserted_at = write;
            }
        }

        self.lead_index = new_lead;
        self.trail_index = new_trail;
        self.values = new_values;
        self.initialized = new_initialized;

        log::debug!(
            "CSR3 reallocation: {old_slots} -> {new_slots} slots, no reachable hole in lead {lead}"
        );
        self.notify(|o| {
            o.on_reallocate(old_slots, new_slots);
            o.on_insert(0);
        });
        self.mark_structural_change();
        Ok(inserted_at)
    }

    fn mark_structural_change(&mut self) {
        self.compressed = false;
        if self.lock_established {
            self.lock_broken = true;
        }
    }

    /// Purge all holes so the three arrays form standard CSR.
    ///
    /// Returns `true` if holes were removed, `false` if there were none.
    pub fn compress(&mut self) -> bool {
        let lead_dim = self.leading_dim();
        let mut write = 0;
        let mut read_start = self.lead_index[0];
        for lead in 0..lead_dim {
            let read_end = self.lead_index[lead + 1];
            self.lead_index[lead] = write;
            for slot in read_start..read_end {
                if self.trail_index[slot] == HOLE {
                    continue;
                }
                if slot != write {
                    self.trail_index[write] = self.trail_index[slot];
                    self.values[write] = self.values[slot];
                    self.initialized[write] = self.initialized[slot];
                }
                write += 1;
            }
            read_start = read_end;
        }
        self.lead_index[lead_dim] = write;

        let removed = self.trail_index.len() - write;
        self.trail_index.truncate(write);
        self.values.truncate(write);
        self.initialized.truncate(write);
        self.compressed = true;
        self.notify(|o| o.on_compress(removed));
        removed > 0
    }

    /// Release reserved capacity beyond the current length. Data does not move.
    pub fn trim(&mut self) {
        self.lead_index.shrink_to_fit();
        self.trail_index.shrink_to_fit();
        self.values.shrink_to_fit();
        self.initialized.shrink_to_fit();
    }

    /// Turn every entry with `|value| <= threshold` into a hole.
    ///
    /// Returns the number of entries removed. Holes stay until
    /// [`compress`](Self::compress).
    pub fn prune(&mut self, threshold: T::Real) -> usize {
        let mut removed = 0;
        for slot in 0..self.trail_index.len() {
            if self.trail_index[slot] != HOLE && self.values[slot].norm() <= threshold {
                self.trail_index[slot] = HOLE;
                self.values[slot] = T::zero();
                self.initialized[slot] = false;
                removed += 1;
            }
        }
        if removed > 0 {
            self.mark_structural_change();
        }
        removed
    }

    /// Reinitialize the matrix as `num_rows` x `num_cols`.
    ///
    /// With the pattern lock enabled, unchanged dimensions and no structural
    /// change since the layout was locked, only the values are cleared.
    /// Otherwise every slot becomes a hole and the budget is taken from
    /// `nonzeros`, or from the current slot count when `None`. Occupancy is
    /// never reduced; use [`trim`](Self::trim) for that.
    pub fn reset(&mut self, num_rows: usize, num_cols: usize, nonzeros: Option<NonzeroHint>) {
        let preserve = self.pattern_lock
            && !self.lock_broken
            && num_rows == self.num_rows
            && num_cols == self.num_cols;

        if preserve {
            self.values.fill(T::zero());
            self.initialized.fill(false);
            self.lock_established = true;
            log::debug!(
                "CSR3 reset keeps the locked sparsity pattern ({} slots)",
                self.trail_index.len()
            );
        } else {
            let slots = match nonzeros {
                Some(hint) => hint.slots(num_rows, num_cols),
                None => self.trail_index.len().max(num_rows.max(num_cols)),
            };
            self.num_rows = num_rows;
            self.num_cols = num_cols;
            self.reset_arrays(slots);
            self.lock_established = false;
            self.lock_broken = false;
        }
        self.notify(|o| o.on_reset(preserve));
    }

    /// Same as [`reset`](Self::reset); always succeeds
    pub fn resize(
        &mut self,
        num_rows: usize,
        num_cols: usize,
        nonzeros: Option<NonzeroHint>,
    ) -> bool {
        self.reset(num_rows, num_cols, nonzeros);
        true
    }

    fn reset_arrays(&mut self, slots: usize) {
        let lead_dim = self.leading_dim();
        let slots = if lead_dim == 0 { 0 } else { slots };
        self.lead_index = distribute_evenly(lead_dim, slots);

        self.trail_index.clear();
        self.trail_index.resize(slots, HOLE);
        self.values.clear();
        self.values.resize(slots, T::zero());
        self.initialized.clear();
        self.initialized.resize(slots, false);
        self.compressed = false;
    }

    /// Lay out the pattern collected by `learner` as zero-valued entries.
    ///
    /// The matrix takes the learner's dimensions; the allocation is exact, so
    /// assembling the same pattern afterwards never shifts nor reallocates.
    pub fn load_sparsity_pattern(&mut self, learner: &mut SparsityPatternLearner) {
        let learned_order = learner.order();
        self.num_rows = learner.num_rows();
        self.num_cols = learner.num_cols();
        let order = self.order;
        let lead_dim = self.leading_dim();
        let pattern = learner.sparsity_pattern();

        let to_own = |learned_lead: usize, learned_trail: usize| {
            let (row, col) = learned_order.to_row_col(learned_lead, learned_trail);
            order.to_lead_trail(row, col)
        };

        let mut counts = vec![0usize; lead_dim];
        for (learned_lead, trails) in pattern.iter().enumerate() {
            for &learned_trail in trails {
                counts[to_own(learned_lead, learned_trail).0] += 1;
            }
        }

        self.lead_index = offsets_from_counts(&counts);
        let slots = self.lead_index[lead_dim];
        self.trail_index.clear();
        self.trail_index.resize(slots, HOLE);

        // learned leads ascend, so transposed entries arrive sorted as well
        let mut cursor = self.lead_index[..lead_dim].to_vec();
        for (learned_lead, trails) in pattern.iter().enumerate() {
            for &learned_trail in trails {
                let (lead, trail) = to_own(learned_lead, learned_trail);
                self.trail_index[cursor[lead]] = trail;
                cursor[lead] += 1;
            }
        }

        self.values.clear();
        self.values.resize(slots, T::zero());
        self.initialized.clear();
        self.initialized.resize(slots, false);
        self.compressed = true;
        self.lock_established = false;
        self.lock_broken = false;
        log::debug!("CSR3 layout loaded from sparsity pattern: {slots} slots");
    }

    /// Number of entries (holes excluded) of each leading index
    pub fn nonzeros_distribution(&self) -> Vec<usize> {
        (0..self.leading_dim())
            .map(|lead| {
                self.trail_index[self.lead_range(lead)]
                    .iter()
                    .filter(|&&t| t != HOLE)
                    .count()
            })
            .collect()
    }

    /// Buffer lengths and capacities
    pub fn memory_info(&self) -> MemoryInfo {
        let slot_capacity = self.trail_index.capacity();
        MemoryInfo {
            lead_len: self.lead_index.len(),
            lead_capacity: self.lead_index.capacity(),
            slots: self.trail_index.len(),
            slot_capacity,
            entries: self.trail_index.iter().filter(|&&t| t != HOLE).count(),
            allocated_bytes: self.lead_index.capacity() * size_of::<usize>()
                + slot_capacity * size_of::<usize>()
                + self.values.capacity() * size_of::<T>()
                + self.initialized.capacity() * size_of::<bool>(),
        }
    }

    /// Iterate over stored entries as (row, col, value), holes skipped
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        (0..self.leading_dim()).flat_map(move |lead| {
            self.lead_range(lead).filter_map(move |slot| {
                let trail = self.trail_index[slot];
                (trail != HOLE).then(|| {
                    let (row, col) = self.order.to_row_col(lead, trail);
                    (row, col, self.values[slot])
                })
            })
        })
    }

    /// Borrow the solver-ready arrays.
    ///
    /// Fails with [`SparseError::NotCompressed`] unless the matrix was
    /// compressed after the last write.
    pub fn csr_view(&self) -> Result<CsrView<'_, T>> {
        if !self.compressed {
            return Err(SparseError::NotCompressed);
        }
        Ok(self.view_unchecked())
    }

    /// Compress, then borrow the solver-ready arrays
    pub fn compressed_view(&mut self) -> CsrView<'_, T> {
        self.compress();
        self.view_unchecked()
    }

    fn view_unchecked(&self) -> CsrView<'_, T> {
        CsrView::new(
            self.num_rows,
            self.num_cols,
            self.order,
            &self.lead_index,
            &self.trail_index,
            &self.values,
        )
    }

    /// Check the layout invariants.
    ///
    /// Lead offsets must start at zero, never decrease and end at the slot
    /// count; entries of each leading index must be strictly increasing and in
    /// range; holes must not be flagged as written, and a compressed matrix
    /// must have none.
    pub fn verify(&self) -> std::result::Result<(), LayoutError> {
        let lead_dim = self.leading_dim();
        if self.lead_index.len() != lead_dim + 1 {
            return Err(LayoutError::LeadIndexLength {
                len: self.lead_index.len(),
                expected: lead_dim + 1,
            });
        }
        if self.lead_index[0] != 0 {
            return Err(LayoutError::LeadIndexStart);
        }
        if let Some(lead) = (0..lead_dim).find(|&i| self.lead_index[i + 1] < self.lead_index[i]) {
            return Err(LayoutError::LeadIndexNotMonotonic { lead });
        }
        let slots = self.trail_index.len();
        if self.lead_index[lead_dim] != slots {
            return Err(LayoutError::SlotCountMismatch {
                end: self.lead_index[lead_dim],
                slots,
            });
        }
        if self.values.len() != slots || self.initialized.len() != slots {
            return Err(LayoutError::BufferLengthMismatch);
        }

        let trailing_dim = self.trailing_dim();
        for lead in 0..lead_dim {
            let mut previous: Option<usize> = None;
            for slot in self.lead_range(lead) {
                let trail = self.trail_index[slot];
                if trail == HOLE {
                    if self.initialized[slot] {
                        return Err(LayoutError::InitializedHole { slot });
                    }
                    if self.compressed {
                        return Err(LayoutError::HoleInCompressed { slot });
                    }
                    continue;
                }
                if trail >= trailing_dim {
                    return Err(LayoutError::TrailOutOfRange {
                        slot,
                        trail,
                        trailing_dim,
                    });
                }
                if previous.is_some_and(|p| p >= trail) {
                    return Err(LayoutError::Unsorted { lead, slot });
                }
                previous = Some(trail);
            }
        }
        Ok(())
    }
}

fn try_filled<V: Clone>(len: usize, fill: V) -> Result<Vec<V>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|source| SparseError::AllocationFailed {
            requested: len,
            source,
        })?;
    buffer.resize(len, fill);
    Ok(buffer)
}

impl<T: ComplexField> fmt::Debug for Csr3Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Csr3Matrix")
            .field("num_rows", &self.num_rows)
            .field("num_cols", &self.num_cols)
            .field("order", &self.order)
            .field("nnz", &self.nnz())
            .field("compressed", &self.compressed)
            .field("pattern_lock", &self.pattern_lock)
            .field("lock_broken", &self.lock_broken)
            .finish_non_exhaustive()
    }
}

impl<T: ComplexField> SparseMatrix<T> for Csr3Matrix<T> {
    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn num_cols(&self) -> usize {
        self.num_cols
    }

    fn set_element(&mut self, row: usize, col: usize, value: T, overwrite: bool) -> Result<()> {
        Csr3Matrix::set_element(self, row, col, value, overwrite)
    }

    fn get_element(&self, row: usize, col: usize) -> T {
        Csr3Matrix::get_element(self, row, col)
    }

    fn reset(&mut self, num_rows: usize, num_cols: usize, nonzeros: Option<NonzeroHint>) {
        Csr3Matrix::reset(self, num_rows, num_cols, nonzeros)
    }

    fn nnz(&self) -> usize {
        Csr3Matrix::nnz(self)
    }
}
