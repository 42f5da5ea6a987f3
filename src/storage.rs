pub mod atomic;
mod cache_padded;
pub mod local;
pub mod padded_atomic;

/// Storage policy abstraction used by [`Bucket`](crate::Bucket).
///
/// Implementations can provide either atomic or non-atomic access to the
/// underlying token level depending on the desired level of concurrency.
pub trait LevelStorage {
    /// Create a new storage policy holding the provided level.
    fn new(level: u64) -> Self;
    /// Load the current level.
    fn load(&self) -> u64;
    /// Compare and exchange the level.
    fn compare_exchange_weak(&self, current: u64, new: u64) -> Result<(), u64>;
}

/// Token accounting on top of a storage policy.
///
/// Every mutation is a compare-and-swap loop over the stored level so that
/// concurrent takes and puts on the same bucket are linearizable without a
/// lock.
#[derive(Debug)]
pub(crate) struct LevelAccounting<S> {
    inner: S,
}

impl<S: LevelStorage> LevelAccounting<S> {
    pub fn new(storage: S) -> Self {
        Self { inner: storage }
    }

    pub fn level(&self) -> u64 {
        self.inner.load()
    }

    /// Removes up to `wanted` tokens. Returns the amount actually removed.
    pub fn take(&self, wanted: u64) -> u64 {
        let mut level_old = self.inner.load();
        loop {
            let taken = level_old.min(wanted);
            if taken == 0 {
                return 0;
            }
            match self.inner.compare_exchange_weak(level_old, level_old - taken) {
                Ok(()) => return taken,
                Err(actual) => level_old = actual,
            }
        }
    }

    /// Adds `tokens` without exceeding `capacity`. Returns the amount
    /// actually added; the excess is discarded.
    pub fn put(&self, tokens: u64, capacity: u64) -> u64 {
        let mut level_old = self.inner.load();
        loop {
            let level_new = level_old.saturating_add(tokens).min(capacity);
            if level_new <= level_old {
                return 0;
            }
            match self.inner.compare_exchange_weak(level_old, level_new) {
                Ok(()) => return level_new - level_old,
                Err(actual) => level_old = actual,
            }
        }
    }
}
