mod stream;
#[cfg(test)]
mod testing;
mod wait;

pub use stream::ThrottledStream;

use futures::Stream;

use crate::storage::LevelStorage;
use crate::{Clock, Throttler};

/// Throttles a stream through a keyed bucket of a [`Throttler`].
pub trait ThrottleStreamExt: Stream + Sized {
    /// Delays every item until one token was taken from the bucket for
    /// `key`.
    fn throttle<ST, C>(
        self,
        throttler: &Throttler<ST, C>,
        key: &str,
        rate: u64,
    ) -> ThrottledStream<Self, ST, fn(&Self::Item) -> u64>
    where
        ST: LevelStorage + Send + Sync + 'static,
        C: Clock,
    {
        self.throttle_weighted(throttler, key, rate, one as fn(&Self::Item) -> u64)
    }

    /// Delays every item until `weight_fn(&item)` tokens were taken from the
    /// bucket for `key`.
    fn throttle_weighted<ST, C, F>(
        self,
        throttler: &Throttler<ST, C>,
        key: &str,
        rate: u64,
        weight_fn: F,
    ) -> ThrottledStream<Self, ST, F>
    where
        ST: LevelStorage + Send + Sync + 'static,
        C: Clock,
        F: Fn(&Self::Item) -> u64,
    {
        ThrottledStream::new(
            self,
            throttler.bucket(key, rate),
            throttler.tick_period(),
            weight_fn,
        )
    }
}

impl<S: Stream> ThrottleStreamExt for S {}

fn one<T>(_: &T) -> u64 {
    1
}
