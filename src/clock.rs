use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// Trait for monotonic clock implementations used by a [`Throttler`](crate::Throttler)
/// to measure how long a caller was held in [`wait`](crate::Throttler::wait).
///
/// Implementations must provide monotonic time that never goes backwards.
/// The time is measured in seconds as floating-point values.
pub trait Clock {
    /// Returns the current time in seconds since an arbitrary epoch.
    fn now(&self) -> f64;

    /// Time elapsed since `began`, a value previously returned by [`now`](Self::now).
    fn elapsed_since(&self, began: f64) -> Duration {
        Duration::from_secs_f64((self.now() - began).max(0.0))
    }
}

/// Standard clock implementation using [`std::time::Instant`].
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use tickbucket::{Config, StdClock, Throttler};
///
/// let config = Config::every(Duration::from_millis(100));
/// let throttler = Throttler::<tickbucket::PaddedAtomicStorage, _>::from_parts(
///     config,
///     StdClock::default(),
/// )
/// .unwrap();
/// # throttler.close();
/// ```
#[derive(Clone)]
pub struct StdClock {
    origin: std::time::Instant,
}

impl Default for StdClock {
    fn default() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl Clock for StdClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// High-precision clock implementation using the `quanta` crate.
///
/// Requires the "quanta" feature to be enabled.
#[cfg(feature = "quanta")]
#[derive(Clone)]
pub struct QuantaClock {
    origin: quanta::Instant,
}

#[cfg(feature = "quanta")]
impl Default for QuantaClock {
    fn default() -> Self {
        Self::new(quanta::Clock::new())
    }
}

#[cfg(feature = "quanta")]
impl QuantaClock {
    /// Creates a new `QuantaClock` from a `quanta::Clock` instance.
    pub fn new(clock: quanta::Clock) -> Self {
        let origin = clock.now();
        Self { origin }
    }
}

#[cfg(feature = "quanta")]
impl Clock for QuantaClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Tokio-compatible clock implementation using [`tokio::time::Instant`].
///
/// Follows paused and advanced tokio time, which keeps the durations
/// reported by [`wait_async`](crate::Throttler::wait_async) consistent in
/// tests. Requires the "tokio" feature.
#[cfg(any(feature = "tokio", feature = "async"))]
#[derive(Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

#[cfg(any(feature = "tokio", feature = "async"))]
impl Default for TokioClock {
    fn default() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

#[cfg(any(feature = "tokio", feature = "async"))]
impl Clock for TokioClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Manual clock implementation for testing and simulation.
///
/// Pairs with [`Config::manual`](crate::Config::manual): whoever drives the
/// refills also advances the clock, so waits report exact tick multiples.
///
/// # Examples
///
/// ```rust
/// use tickbucket::{Clock, ManualClock};
///
/// let clock = ManualClock::new(0.0);
/// clock.advance(1.5);
/// assert_eq!(1.5, clock.now());
/// ```
pub struct ManualClock {
    now: Mutex<f64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl ManualClock {
    /// Creates a new manual clock starting at `now` seconds.
    pub fn new(now: f64) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Sets the current time to `now` seconds.
    pub fn set(&self, now: f64) {
        *self.now.lock() = now;
    }

    /// Advances the current time by `delta` seconds.
    pub fn advance(&self, delta: f64) {
        *self.now.lock() += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}

impl Clock for &ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}

impl Clock for Arc<ManualClock> {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}
