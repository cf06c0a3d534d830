//! Striped Counter - High-Concurrency Additive Accounting
//!
//! Association and dissociation notifications can arrive from an unbounded
//! number of concurrent units, so the count is kept as a distributed sum
//! rather than one contended atomic integer: each writer thread sticks to
//! its own shard and reads fold all shards.
//!
//! # Design Notes:
//! - Shard array is a power of two sized from `available_parallelism`
//! - Each shard sits on its own cache line to avoid false sharing
//! - Writes are a single Relaxed `fetch_add`; reads iterate the shards
//! - The sum is only a snapshot: concurrent writers may move it mid-read

use std::cell::Cell;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

/// Upper bound on shards; beyond this the read path cost outweighs the
/// contention win.
const MAX_SHARDS: usize = 64;

/// One accumulator, padded out to a cache line.
#[repr(align(64))]
struct Shard(AtomicI64);

/// A sharded additive counter for many concurrent writers and occasional
/// readers.
pub struct StripedCounter {
    shards: Box<[Shard]>,
    mask: usize,
}

thread_local! {
    /// Shard slot for the current thread, assigned once on first use.
    static SLOT: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Hands out monotonically increasing thread slots so threads spread evenly
/// over the shard array.
static NEXT_SLOT: AtomicUsize = AtomicUsize::new(0);

impl StripedCounter {
    /// Create a counter with one shard per hardware thread, clamped to a
    /// power of two in `[1, 64]`.
    pub fn new() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_shards(parallelism.next_power_of_two().min(MAX_SHARDS))
    }

    /// Create a counter with an explicit shard count (rounded up to a power
    /// of two).
    pub fn with_shards(shards: usize) -> Self {
        let n = shards.max(1).next_power_of_two().min(MAX_SHARDS);
        let shards: Box<[Shard]> = (0..n).map(|_| Shard(AtomicI64::new(0))).collect();
        Self {
            shards,
            mask: n - 1,
        }
    }

    /// Add `delta` to the counter. Safe to call from any number of threads
    /// concurrently; one Relaxed `fetch_add` on the caller's shard.
    pub fn add(&self, delta: i64) {
        let slot = SLOT.with(|s| match s.get() {
            Some(slot) => slot,
            None => {
                let slot = NEXT_SLOT.fetch_add(1, Ordering::Relaxed);
                s.set(Some(slot));
                slot
            }
        });
        self.shards[slot & self.mask].0.fetch_add(delta, Ordering::Relaxed);
    }

    /// Convenience for `add(1)`.
    pub fn increment(&self) {
        self.add(1);
    }

    /// Convenience for `add(-1)`.
    pub fn decrement(&self) {
        self.add(-1);
    }

    /// Fold all shards into the current sum.
    ///
    /// The result can be negative if decrements were reported without a
    /// matching increment (a misbehaving notifier); the counter records
    /// exactly what it was told rather than clamping, so a late matching
    /// increment still balances the books.
    pub fn sum(&self) -> i64 {
        self.shards
            .iter()
            .map(|s| s.0.load(Ordering::Relaxed))
            .sum()
    }

    /// Number of shards backing this counter.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

impl Default for StripedCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StripedCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripedCounter")
            .field("shards", &self.shards.len())
            .field("sum", &self.sum())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_counter_is_zero() {
        let counter = StripedCounter::new();
        assert_eq!(counter.sum(), 0);
        assert!(counter.shard_count().is_power_of_two());
    }

    #[test]
    fn test_shard_count_rounds_to_power_of_two() {
        assert_eq!(StripedCounter::with_shards(3).shard_count(), 4);
        assert_eq!(StripedCounter::with_shards(0).shard_count(), 1);
        assert_eq!(StripedCounter::with_shards(1000).shard_count(), MAX_SHARDS);
    }

    #[test]
    fn test_single_thread_accounting() {
        let counter = StripedCounter::with_shards(4);
        counter.increment();
        counter.increment();
        counter.add(5);
        counter.decrement();
        assert_eq!(counter.sum(), 6);
    }

    #[test]
    fn test_unmatched_decrement_goes_negative() {
        let counter = StripedCounter::with_shards(2);
        counter.decrement();
        counter.decrement();
        assert_eq!(counter.sum(), -2);
        // A late matching pair of increments balances the books.
        counter.increment();
        counter.increment();
        assert_eq!(counter.sum(), 0);
    }

    #[test]
    fn test_concurrent_increments_converge() {
        let counter = Arc::new(StripedCounter::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let c = counter.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..10_000 {
                    c.increment();
                }
            }));
        }
        for h in handles {
            h.join().expect("thread panicked");
        }
        assert_eq!(counter.sum(), 80_000);
    }

    #[test]
    fn test_concurrent_paired_updates_converge_to_zero() {
        let counter = Arc::new(StripedCounter::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let c = counter.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..5_000 {
                    c.increment();
                    c.decrement();
                }
            }));
        }
        for h in handles {
            h.join().expect("thread panicked");
        }
        assert_eq!(counter.sum(), 0);
    }
}
