use std::num::NonZeroU32;
use std::time::Duration;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Who replenishes the buckets of a [`Throttler`](crate::Throttler).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refill {
    /// A dedicated worker thread refills every bucket once per tick period.
    Background,
    /// Nothing refills on its own; the owner calls
    /// [`Throttler::refill`](crate::Throttler::refill) once per tick.
    Manual,
}

/// Configuration for a [`Throttler`](crate::Throttler): the shared tick
/// period and how refills are driven.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use nonzero_ext::nonzero;
/// use tickbucket::{Config, Refill};
///
/// // ten ticks per second, refilled in the background
/// let config = Config::per_second(nonzero!(10u32));
/// assert_eq!(Duration::from_millis(100), config.tick_period());
/// assert_eq!(Refill::Background, config.refill());
///
/// // a bucket with rate 10/s gains one token per tick
/// assert_eq!(1, config.increment_for(10));
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Config {
    tick_period: Duration,
    refill: Refill,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Config(tick_period={:?}, refill={:?})",
            self.tick_period, self.refill
        )
    }
}

impl Config {
    /// Refills in the background once every `tick_period`.
    ///
    /// A zero period never starts a worker and yields a zero increment for
    /// every rate.
    pub const fn every(tick_period: Duration) -> Self {
        Self {
            tick_period,
            refill: Refill::Background,
        }
    }

    /// Refills in the background `ticks` times per second.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    ///
    /// use nonzero_ext::nonzero;
    /// use tickbucket::Config;
    ///
    /// let config = Config::per_second(nonzero!(100u32));
    /// assert_eq!(Duration::from_millis(10), config.tick_period());
    /// ```
    pub const fn per_second(ticks: NonZeroU32) -> Self {
        Self::every(Duration::from_nanos(NANOS_PER_SECOND / ticks.get() as u64))
    }

    /// Switches to manual refills: no worker thread is spawned and the owner
    /// calls [`Throttler::refill`](crate::Throttler::refill) on its own
    /// schedule.
    pub const fn manual(mut self) -> Self {
        self.refill = Refill::Manual;
        self
    }

    /// The shared refill period.
    pub const fn tick_period(&self) -> Duration {
        self.tick_period
    }

    /// How refills are driven.
    pub const fn refill(&self) -> Refill {
        self.refill
    }

    /// Whether a throttler built from this configuration spawns its refill
    /// worker.
    pub const fn spawns_worker(&self) -> bool {
        matches!(self.refill, Refill::Background) && !self.tick_period.is_zero()
    }

    /// Tokens added per tick to a bucket of the given `rate` (tokens per
    /// second): `rate * tick_period` rounded half up.
    ///
    /// Refill is proportional to the rate. At a 100ms tick, a bucket of rate
    /// 20 gains twice as many tokens per tick as a bucket of rate 10.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    ///
    /// use tickbucket::Config;
    ///
    /// let config = Config::every(Duration::from_millis(100));
    /// assert_eq!(1, config.increment_for(10));
    /// assert_eq!(2, config.increment_for(20));
    /// // 0.5 rounds up, 0.4 rounds down
    /// assert_eq!(1, config.increment_for(5));
    /// assert_eq!(0, config.increment_for(4));
    /// ```
    pub fn increment_for(&self, rate: u64) -> u64 {
        (0.5 + rate as f64 * self.tick_period.as_secs_f64()).floor() as u64
    }
}
