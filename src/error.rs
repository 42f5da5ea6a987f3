use std::time::Duration;

/// Errors raised while building a [`Throttler`](crate::Throttler).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The refill worker thread could not be spawned.
    #[error("failed to spawn the refill worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Why a bounded or cancellable wait gave up.
///
/// Tokens taken before giving up are always returned to the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// The requested tokens did not accumulate within the timeout.
    #[error("timed out after waiting {waited:?} for tokens")]
    TimedOut {
        /// How long the caller was held before giving up.
        waited: Duration,
    },
    /// The throttler was closed; its buckets no longer refill.
    #[error("throttler is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_timed_out() {
        let err = WaitError::TimedOut {
            waited: Duration::from_millis(300),
        };
        assert_eq!("timed out after waiting 300ms for tokens", err.to_string());
    }

    #[test]
    fn display_closed() {
        assert_eq!("throttler is closed", WaitError::Closed.to_string());
    }

    #[test]
    fn spawn_from_io() {
        let err: Error = std::io::Error::other("no threads left").into();
        assert_eq!(
            "failed to spawn the refill worker: no threads left",
            err.to_string()
        );
    }
}
