use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::storage::padded_atomic::PaddedAtomicStorage;
use crate::storage::{LevelAccounting, LevelStorage};

/// A bounded reservoir of tokens.
///
/// The level always stays within `0..=capacity`. Tokens leave through
/// [`take`](Self::take) and come back through [`put`](Self::put), either
/// from a refill tick or from a caller returning tokens it did not use.
/// Capacity doubles as the nominal rate of the bucket in tokens per second.
///
/// # Type Parameters
///
/// - `S`: Storage strategy (default: [`PaddedAtomicStorage`] for concurrent access)
///
/// # Examples
///
/// ```rust
/// use tickbucket::Bucket;
///
/// let bucket = Bucket::new(10, 4);
/// assert_eq!(3, bucket.take(3));
/// // only one token left, so only one is granted
/// assert_eq!(1, bucket.take(5));
/// // the excess over capacity is discarded
/// assert_eq!(10, bucket.put(25));
/// assert_eq!(10, bucket.level());
/// ```
pub struct Bucket<S = PaddedAtomicStorage> {
    level: LevelAccounting<S>,
    capacity: u64,
    increment: u64,
    closed: AtomicBool,
}

impl Bucket<PaddedAtomicStorage> {
    /// Creates a bucket holding `level` tokens (clamped to `capacity`) using
    /// padded atomic storage.
    pub fn new(capacity: u64, level: u64) -> Self {
        Bucket::<PaddedAtomicStorage>::from_parts(capacity, level)
    }
}

impl<S: LevelStorage> Bucket<S> {
    /// Creates a bucket with a custom storage policy.
    pub fn from_parts(capacity: u64, level: u64) -> Self {
        Self {
            level: LevelAccounting::new(S::new(level.min(capacity))),
            capacity,
            increment: 0,
            closed: AtomicBool::new(false),
        }
    }

    /// Sets the per-tick increment before the bucket is published.
    pub(crate) fn with_increment(mut self, increment: u64) -> Self {
        self.increment = increment;
        self
    }

    /// Removes up to `n` tokens and returns how many were actually removed.
    ///
    /// Never blocks and never drives the level below zero. The result is at
    /// most `min(n, level)` at the time of the call.
    pub fn take(&self, n: u64) -> u64 {
        self.level.take(n)
    }

    /// Adds `n` tokens, capped at [`capacity`](Self::capacity). Tokens over
    /// capacity are discarded. Returns how many were actually added.
    pub fn put(&self, n: u64) -> u64 {
        self.level.put(n, self.capacity)
    }

    /// Tokens currently available.
    pub fn level(&self) -> u64 {
        self.level.level()
    }
}

impl<S> Bucket<S> {
    /// Maximum level, also the nominal rate in tokens per second.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Tokens the owning throttler adds on every tick. Zero for standalone
    /// buckets.
    pub fn increment(&self) -> u64 {
        self.increment
    }

    /// Marks the bucket as released by its owner. Idempotent.
    ///
    /// The bucket holds nothing but its in-memory level, so takes and puts
    /// keep working; the flag tells waiters that no refill is coming.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<S: LevelStorage> Debug for Bucket<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("level", &self.level())
            .field("capacity", &self.capacity)
            .field("increment", &self.increment)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::storage::atomic::AtomicStorage;
    use crate::storage::local::LocalStorage;

    use super::*;

    #[test]
    fn basics() {
        // initial level is clamped into capacity
        let bucket = Bucket::new(10, 50);
        assert_eq!(10, bucket.level());
        assert_eq!(10, bucket.capacity());
        assert_eq!(0, bucket.increment());

        assert_eq!(4, bucket.take(4));
        assert_eq!(6, bucket.level());
        assert_eq!(0, bucket.take(0));
        assert_eq!(6, bucket.take(100));
        assert_eq!(0, bucket.level());
        // empty bucket grants nothing
        assert_eq!(0, bucket.take(1));

        assert_eq!(3, bucket.put(3));
        assert_eq!(3, bucket.level());
    }

    #[test]
    fn never_exceeds_capacity() {
        let bucket = Bucket::new(5, 0);
        for n in [1, 3, 0, 7, u64::MAX] {
            bucket.put(n);
            assert!(bucket.level() <= bucket.capacity());
        }
        assert_eq!(5, bucket.level());
        assert_eq!(0, bucket.put(1));
    }

    #[test]
    fn never_below_zero() {
        let bucket = Bucket::new(8, 8);
        let mut granted = 0;
        for n in [3, 3, 3, 3, u64::MAX] {
            let before = bucket.level();
            let got = bucket.take(n);
            assert!(got <= before.min(n));
            granted += got;
        }
        assert_eq!(8, granted);
        assert_eq!(0, bucket.level());
    }

    #[test]
    fn zero_capacity() {
        let bucket = Bucket::new(0, 0);
        assert_eq!(0, bucket.put(10));
        assert_eq!(0, bucket.take(1));
    }

    #[test]
    fn close_is_idempotent() {
        let bucket = Bucket::<AtomicStorage>::from_parts(3, 3);
        assert!(!bucket.is_closed());
        bucket.close();
        bucket.close();
        assert!(bucket.is_closed());
        // state is still there
        assert_eq!(3, bucket.take(3));
    }

    #[test]
    fn local_storage() {
        let bucket = Bucket::<LocalStorage>::from_parts(2, 0);
        assert_eq!(2, bucket.put(2));
        assert_eq!(1, bucket.take(1));
        assert_eq!(1, bucket.level());
    }

    #[test]
    fn debug_format() {
        let bucket = Bucket::new(10, 2).with_increment(1);
        assert_eq!(
            "Bucket { level: 2, capacity: 10, increment: 1, closed: false }",
            format!("{bucket:?}")
        );
    }

    #[test]
    fn concurrent_take() {
        let bucket = Bucket::new(10_000, 10_000);
        std::thread::scope(|s| {
            // 4 threads, each taking 2000 tokens one at a time
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..2000 {
                        assert_eq!(1, bucket.take(1));
                    }
                });
            }
        });
        assert_eq!(2000, bucket.level());
    }

    #[test]
    fn concurrent_take_and_put() {
        // shared with arc, contended by takers and a refiller
        let bucket = Arc::new(Bucket::new(100, 0));
        let granted: u64 = std::thread::scope(|s| {
            let refiller = s.spawn({
                let bucket = Arc::clone(&bucket);
                move || {
                    let mut added = 0;
                    for _ in 0..5000 {
                        added += bucket.put(1);
                        assert!(bucket.level() <= bucket.capacity());
                    }
                    added
                }
            });
            let takers: Vec<_> = (0..3)
                .map(|_| {
                    let bucket = Arc::clone(&bucket);
                    s.spawn(move || (0..5000).map(|_| bucket.take(2)).sum::<u64>())
                })
                .collect();
            let taken: u64 = takers.into_iter().map(|t| t.join().unwrap()).sum();
            let added = refiller.join().unwrap();
            // nothing is created or lost
            assert_eq!(added, taken + bucket.level());
            taken
        });
        assert!(granted <= 5000);
    }
}
