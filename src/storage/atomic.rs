use std::sync::atomic::{AtomicU64, Ordering};

use likely_stable::LikelyResult;

use super::LevelStorage;

/// Atomic implementation of [`LevelStorage`]
#[derive(Debug)]
pub struct AtomicStorage(AtomicU64);

impl LevelStorage for AtomicStorage {
    fn new(level: u64) -> Self {
        Self(AtomicU64::new(level))
    }

    fn load(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    fn compare_exchange_weak(&self, current: u64, new: u64) -> Result<(), u64> {
        self.0
            .compare_exchange_weak(current, new, Ordering::AcqRel, Ordering::Acquire)
            .map_likely(|_| ())
    }
}
