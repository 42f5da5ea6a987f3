use super::LevelStorage;
use super::atomic::AtomicStorage;
use super::cache_padded::CachePadded;

/// Atomic implementation of [`LevelStorage`] padded to one cache line to
/// avoid false sharing between neighbouring buckets.
#[derive(Debug)]
pub struct PaddedAtomicStorage(CachePadded<AtomicStorage>);

impl LevelStorage for PaddedAtomicStorage {
    fn new(level: u64) -> Self {
        Self(CachePadded::new(AtomicStorage::new(level)))
    }

    fn load(&self) -> u64 {
        self.0.load()
    }

    fn compare_exchange_weak(&self, current: u64, new: u64) -> Result<(), u64> {
        self.0.compare_exchange_weak(current, new)
    }
}
