//! Instrumentation hooks for the storage engine
//!
//! A matrix carries an optional shared [`MatrixObserver`]; every hook has an
//! empty default body, so observers only implement what they care about.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Receives notifications about what a matrix does internally.
pub trait MatrixObserver: Send + Sync {
    /// A `set_element`/`element` call reached the matrix
    fn on_set_element(&self) {}

    /// A new entry was created after moving `shifts` existing entries
    fn on_insert(&self, _shifts: usize) {}

    /// The buffers were rebuilt with room for `new_slots` entries
    fn on_reallocate(&self, _old_slots: usize, _new_slots: usize) {}

    /// The matrix was reset; `preserved_layout` tells if the locked pattern was kept
    fn on_reset(&self, _preserved_layout: bool) {}

    /// `compress` ran and removed `removed` holes
    fn on_compress(&self, _removed: usize) {}
}

/// Observer that counts every notification.
#[derive(Default)]
pub struct CountingObserver {
    set_elements: AtomicUsize,
    inserts: AtomicUsize,
    shifts: AtomicUsize,
    reallocations: AtomicUsize,
    resets: AtomicUsize,
    preserved_resets: AtomicUsize,
    compressions: AtomicUsize,
}

/// Snapshot of a [`CountingObserver`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverCounts {
    /// Calls to `set_element`/`element`
    pub set_elements: usize,
    /// Entries created
    pub inserts: usize,
    /// Total entries moved to open gaps
    pub shifts: usize,
    /// Whole-matrix reallocations
    pub reallocations: usize,
    /// Calls to `reset`
    pub resets: usize,
    /// Resets that kept the locked layout
    pub preserved_resets: usize,
    /// Calls to `compress`
    pub compressions: usize,
}

impl CountingObserver {
    /// Create an observer with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all counters
    pub fn counts(&self) -> ObserverCounts {
        ObserverCounts {
            set_elements: self.set_elements.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            shifts: self.shifts.load(Ordering::Relaxed),
            reallocations: self.reallocations.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            preserved_resets: self.preserved_resets.load(Ordering::Relaxed),
            compressions: self.compressions.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for CountingObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CountingObserver")
            .field(&self.counts())
            .finish()
    }
}

impl MatrixObserver for CountingObserver {
    fn on_set_element(&self) {
        self.set_elements.fetch_add(1, Ordering::Relaxed);
    }

    fn on_insert(&self, shifts: usize) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
        self.shifts.fetch_add(shifts, Ordering::Relaxed);
    }

    fn on_reallocate(&self, _old_slots: usize, _new_slots: usize) {
        self.reallocations.fetch_add(1, Ordering::Relaxed);
    }

    fn on_reset(&self, preserved_layout: bool) {
        self.resets.fetch_add(1, Ordering::Relaxed);
        if preserved_layout {
            self.preserved_resets.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_compress(&self, _removed: usize) {
        self.compressions.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting_observer() {
        let observer = CountingObserver::new();
        observer.on_set_element();
        observer.on_set_element();
        observer.on_insert(3);
        observer.on_insert(0);
        observer.on_reset(true);
        observer.on_reset(false);

        let counts = observer.counts();
        assert_eq!(counts.set_elements, 2);
        assert_eq!(counts.inserts, 2);
        assert_eq!(counts.shifts, 3);
        assert_eq!(counts.resets, 2);
        assert_eq!(counts.preserved_resets, 1);
        assert_eq!(counts.reallocations, 0);
    }
}
