use std::cell::Cell;

use super::LevelStorage;

/// Non atomic implementation of [`LevelStorage`]. This is intended for
/// standalone buckets used from a single thread and uses [`Cell`] internally.
///
/// It is not `Sync`, so it cannot back the buckets of a
/// [`Throttler`](crate::Throttler).
#[derive(Debug)]
pub struct LocalStorage(Cell<u64>);

impl LevelStorage for LocalStorage {
    fn new(level: u64) -> Self {
        Self(Cell::new(level))
    }

    fn load(&self) -> u64 {
        self.0.get()
    }

    fn compare_exchange_weak(&self, current: u64, new: u64) -> Result<(), u64> {
        let actual = self.0.get();
        if actual != current {
            return Err(actual);
        }
        self.0.set(new);
        Ok(())
    }
}
