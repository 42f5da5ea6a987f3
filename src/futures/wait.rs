use std::time::Duration;

use likely_stable::unlikely;
use tokio::time::sleep;
use tracing::trace;

use crate::storage::LevelStorage;
use crate::throttler::Acquisition;
use crate::{Clock, Throttler, WaitError};

impl<S, C> Throttler<S, C>
where
    S: LevelStorage + Send + Sync + 'static,
    C: Clock,
{
    /// Async counterpart of [`wait`](Self::wait), sleeping on the tokio
    /// timer between attempts.
    ///
    /// Dropping the future cancels the wait and returns every token taken so
    /// far, so it composes with `tokio::time::timeout` and `select!`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    ///
    /// use tickbucket::Throttler;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let throttler = Throttler::new(Duration::from_millis(10)).unwrap();
    /// let (_, waited) = throttler.wait_async("uploads", 3, 100).await.unwrap();
    /// assert!(waited);
    /// # }
    /// ```
    pub async fn wait_async(
        &self,
        key: &str,
        n: u64,
        rate: u64,
    ) -> Result<(Duration, bool), WaitError> {
        let began = self.clock().now();
        let bucket = self.bucket(key, rate);
        let mut acquisition = Acquisition::new(&bucket, n);
        while !acquisition.poll() {
            if unlikely(self.is_closed()) {
                return Err(WaitError::Closed);
            }
            trace!(key, wanted = n, got = acquisition.got(), "waiting for tokens");
            sleep(self.tick_period()).await;
            acquisition.mark_slept();
        }
        let slept = acquisition.commit();
        Ok((self.clock().elapsed_since(began), slept))
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::timeout;

    use crate::futures::testing::{manual, spawn_refills};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn waits_for_refills() {
        let th = manual();
        let refills = spawn_refills(&th);
        // rate 10/s at 100ms ticks: one token per tick
        let (elapsed, waited) = th.wait_async("k", 5, 10).await.unwrap();
        assert!(waited);
        assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(600), "{elapsed:?}");
        assert_eq!(0, th.bucket("k", 10).level());
        refills.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn available_tokens_do_not_sleep() {
        let th = manual();
        th.bucket("k", 10);
        th.refill();
        th.refill();
        let (elapsed, waited) = th.wait_async("k", 2, 10).await.unwrap();
        assert!(!waited);
        assert_eq!(Duration::ZERO, elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_returns_tokens() {
        let th = manual();
        let bucket = th.bucket("k", 10);
        for _ in 0..3 {
            th.refill();
        }
        // nobody refills, so this never completes
        assert!(
            timeout(Duration::from_millis(250), th.wait_async("k", 5, 10))
                .await
                .is_err()
        );
        assert_eq!(3, bucket.level());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_throttler() {
        let th = manual();
        th.close();
        assert_eq!(Err(WaitError::Closed), th.wait_async("k", 1, 10).await);
    }
}
