use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use likely_stable::unlikely;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::storage::LevelStorage;
use crate::storage::padded_atomic::PaddedAtomicStorage;
use crate::{Bucket, Clock, Config, Error, StdClock, WaitError};

/// Keyed buckets sharing one refill ticker.
///
/// Every bucket is created on first use with `capacity = rate` and an empty
/// level. Once per tick period a single worker thread adds each bucket's
/// increment (`rate * tick_period`, rounded half up) back into it, so all
/// buckets fill evenly across a second regardless of how many there are.
///
/// The tick period should be small relative to `1/rate` seconds for every
/// rate in use; otherwise the effective throughput drifts from the nominal
/// rate. Always pass the same rate for a given key: the rate of the first
/// call wins and later rates are ignored.
///
/// # Type Parameters
///
/// - `S`: Storage strategy of the buckets (default: [`PaddedAtomicStorage`])
/// - `C`: Clock used to measure waits (default: [`StdClock`])
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use tickbucket::Throttler;
///
/// let throttler = Throttler::new(Duration::from_millis(10)).unwrap();
///
/// // 100 tokens per second for this client, one token per tick
/// let (elapsed, waited) = throttler.wait("client-1", 2, 100);
/// assert!(waited);
/// assert!(elapsed > Duration::ZERO);
///
/// // admission control: all or nothing
/// if throttler.halt("client-1", 50, 100) {
///     println!("denied");
/// }
/// throttler.close();
/// ```
pub struct Throttler<S = PaddedAtomicStorage, C = StdClock> {
    registry: Arc<Registry<S>>,
    clock: C,
    worker: Mutex<Option<Worker>>,
}

struct Registry<S> {
    buckets: RwLock<HashMap<String, Arc<Bucket<S>>>>,
    config: Config,
    closed: AtomicBool,
}

impl<S: LevelStorage> Registry<S> {
    /// Adds every bucket's increment. Returns the number of buckets visited.
    fn refill(&self) -> usize {
        if self.closed.load(Ordering::Acquire) {
            return 0;
        }
        let buckets = self.buckets.read();
        for bucket in buckets.values() {
            bucket.put(bucket.increment());
        }
        buckets.len()
    }
}

struct Worker {
    closing: Sender<()>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn spawn<S>(registry: Arc<Registry<S>>) -> Result<Self, Error>
    where
        S: LevelStorage + Send + Sync + 'static,
    {
        let (closing, closed) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("tickbucket-refill".to_owned())
            .spawn(move || run_refills(&registry, &closed))?;
        Ok(Self { closing, handle })
    }

    fn stop(self) {
        // disconnecting the channel is the shutdown signal
        drop(self.closing);
        if self.handle.join().is_err() {
            warn!("refill worker panicked");
        }
    }
}

fn run_refills<S: LevelStorage>(registry: &Registry<S>, closed: &Receiver<()>) {
    let period = registry.config.tick_period();
    debug!(?period, "refill worker started");
    // None when the period is too long to be represented: only close wakes us
    let mut next_tick = Instant::now().checked_add(period);
    loop {
        let signal = match next_tick {
            Some(at) => closed.recv_timeout(at.saturating_duration_since(Instant::now())),
            None => closed.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match signal {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        let buckets = registry.refill();
        trace!(buckets, "refilled");

        let now = Instant::now();
        next_tick = match next_tick.and_then(|at| at.checked_add(period)) {
            // fell behind; drop the missed ticks instead of bursting
            Some(at) if unlikely(at <= now) => now.checked_add(period),
            at => at,
        };
    }
    debug!("refill worker stopped");
}

/// Tokens taken so far on behalf of one waiter.
///
/// Unless committed, whatever was taken goes back into the bucket on drop,
/// so a waiter that gives up (or is cancelled) never leaks tokens.
pub(crate) struct Acquisition<'a, S: LevelStorage> {
    bucket: &'a Bucket<S>,
    wanted: u64,
    got: u64,
    slept: bool,
}

impl<'a, S: LevelStorage> Acquisition<'a, S> {
    pub(crate) fn new(bucket: &'a Bucket<S>, wanted: u64) -> Self {
        Self {
            bucket,
            wanted,
            got: 0,
            slept: false,
        }
    }

    /// Takes what is missing. Returns true once everything was acquired.
    pub(crate) fn poll(&mut self) -> bool {
        if self.got < self.wanted {
            self.got += self.bucket.take(self.wanted - self.got);
        }
        self.got == self.wanted
    }

    pub(crate) fn got(&self) -> u64 {
        self.got
    }

    pub(crate) fn mark_slept(&mut self) {
        self.slept = true;
    }

    pub(crate) fn slept(&self) -> bool {
        self.slept
    }

    /// Keeps the acquired tokens. Returns whether the waiter slept.
    pub(crate) fn commit(mut self) -> bool {
        self.got = 0;
        self.slept
    }
}

impl<S: LevelStorage> Drop for Acquisition<'_, S> {
    fn drop(&mut self) {
        if self.got > 0 {
            self.bucket.put(self.got);
        }
    }
}

impl Throttler<PaddedAtomicStorage, StdClock> {
    /// Creates a throttler refilling its buckets every `tick_period` from a
    /// background worker.
    ///
    /// A zero period starts no worker and every increment is zero.
    pub fn new(tick_period: Duration) -> Result<Self, Error> {
        Self::with_config(Config::every(tick_period))
    }

    /// Creates a throttler from a [`Config`] with default storage and clock.
    pub fn with_config(config: Config) -> Result<Self, Error> {
        Throttler::from_parts(config, StdClock::default())
    }
}

impl<S, C> Throttler<S, C>
where
    S: LevelStorage + Send + Sync + 'static,
    C: Clock,
{
    /// Creates a throttler with custom storage and clock implementations.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// use tickbucket::{AtomicStorage, Config, ManualClock, Throttler};
    ///
    /// let clock = Arc::new(ManualClock::default());
    /// let config = Config::every(Duration::from_millis(100)).manual();
    /// let throttler =
    ///     Throttler::<AtomicStorage, _>::from_parts(config, Arc::clone(&clock)).unwrap();
    ///
    /// assert!(throttler.halt("key", 1, 10));
    /// throttler.refill();
    /// assert!(!throttler.halt("key", 1, 10));
    /// ```
    pub fn from_parts(config: Config, clock: C) -> Result<Self, Error> {
        let registry = Arc::new(Registry {
            buckets: RwLock::new(HashMap::new()),
            config,
            closed: AtomicBool::new(false),
        });
        let worker = if config.spawns_worker() {
            Some(Worker::spawn(Arc::clone(&registry))?)
        } else {
            None
        };
        Ok(Self {
            registry,
            clock,
            worker: Mutex::new(worker),
        })
    }

    /// Returns the bucket for `key`, creating it with `capacity = rate` and
    /// an empty level if it does not exist yet.
    ///
    /// When two callers race on an unseen key, the first bucket published
    /// stays canonical and the other candidate is discarded; the capacity of
    /// a bucket never changes after creation.
    pub fn bucket(&self, key: &str, rate: u64) -> Arc<Bucket<S>> {
        let existing = self.registry.buckets.read().get(key).cloned();
        if let Some(bucket) = existing {
            return bucket;
        }

        let config = &self.registry.config;
        let increment = config.increment_for(rate);
        if unlikely(increment == 0 && rate > 0) {
            warn!(
                key,
                rate,
                tick_period = ?config.tick_period(),
                "per-tick increment rounds to zero; bucket will never refill"
            );
        }
        let candidate = Bucket::from_parts(rate, 0).with_increment(increment);

        let mut buckets = self.registry.buckets.write();
        let bucket = buckets.entry(key.to_owned()).or_insert_with(|| {
            debug!(key, rate, increment, "bucket created");
            Arc::new(candidate)
        });
        if unlikely(self.registry.closed.load(Ordering::Acquire)) {
            bucket.close();
        }
        Arc::clone(bucket)
    }

    /// Blocks until `n` tokens were taken from the bucket for `key`,
    /// sleeping one tick period between attempts.
    ///
    /// Returns the time spent and whether the caller had to sleep at all.
    /// There is no timeout (see [`try_wait_for`](Self::try_wait_for)) and no
    /// fairness between waiters on the same key. `n` may exceed the bucket
    /// capacity; tokens accumulate across attempts.
    ///
    /// On a closed throttler nothing refills any more, so instead of
    /// blocking forever this returns right away and gives back whatever it
    /// had taken.
    pub fn wait(&self, key: &str, n: u64, rate: u64) -> (Duration, bool) {
        let began = self.clock.now();
        let bucket = self.bucket(key, rate);
        let mut acquisition = Acquisition::new(&bucket, n);
        while !acquisition.poll() {
            if unlikely(self.is_closed()) {
                warn!(key, wanted = n, "wait on a closed throttler");
                return (self.clock.elapsed_since(began), acquisition.slept());
            }
            trace!(key, wanted = n, got = acquisition.got(), "waiting for tokens");
            std::thread::sleep(self.tick_period());
            acquisition.mark_slept();
        }
        let slept = acquisition.commit();
        (self.clock.elapsed_since(began), slept)
    }

    /// Like [`wait`](Self::wait), but gives up once sleeping another tick
    /// would exceed `timeout`.
    ///
    /// On error every token taken so far is returned to the bucket.
    pub fn try_wait_for(
        &self,
        key: &str,
        n: u64,
        rate: u64,
        timeout: Duration,
    ) -> Result<(Duration, bool), WaitError> {
        let began = self.clock.now();
        let bucket = self.bucket(key, rate);
        let mut acquisition = Acquisition::new(&bucket, n);
        while !acquisition.poll() {
            if unlikely(self.is_closed()) {
                return Err(WaitError::Closed);
            }
            let waited = self.clock.elapsed_since(began);
            if waited + self.tick_period() > timeout {
                return Err(WaitError::TimedOut { waited });
            }
            std::thread::sleep(self.tick_period());
            acquisition.mark_slept();
        }
        let slept = acquisition.commit();
        Ok((self.clock.elapsed_since(began), slept))
    }

    /// Non-blocking admission check: takes `n` tokens from the bucket for
    /// `key` if all of them are available.
    ///
    /// Returns `true` when denied, in which case the bucket is left as it
    /// was. Returns `false` when the `n` tokens were consumed.
    pub fn halt(&self, key: &str, n: u64, rate: u64) -> bool {
        let bucket = self.bucket(key, rate);
        let got = bucket.take(n);
        if unlikely(got != n) {
            bucket.put(got);
            return true;
        }
        false
    }

    /// Runs one refill pass over every bucket, exactly what the background
    /// worker does on each tick. Does nothing once closed.
    ///
    /// Meant for throttlers built with [`Config::manual`].
    pub fn refill(&self) {
        let buckets = self.registry.refill();
        trace!(buckets, "manual refill");
    }

    /// Number of buckets created so far.
    pub fn len(&self) -> usize {
        self.registry.buckets.read().len()
    }

    /// Whether no bucket was created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The clock used to measure waits.
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<S, C> Throttler<S, C> {
    /// Stops the refill worker and closes every bucket.
    ///
    /// Idempotent; also called on drop. Bucket handles stay usable but their
    /// levels no longer refill.
    pub fn close(&self) {
        if self.registry.closed.swap(true, Ordering::AcqRel) {
            debug!("throttler already closed");
            return;
        }
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.stop();
        }
        let buckets = self.registry.buckets.read();
        for bucket in buckets.values() {
            bucket.close();
        }
        debug!(buckets = buckets.len(), "throttler closed");
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.registry.closed.load(Ordering::Acquire)
    }

    /// The shared refill period.
    pub fn tick_period(&self) -> Duration {
        self.registry.config.tick_period()
    }

    /// The configuration this throttler was built from.
    pub fn config(&self) -> &Config {
        &self.registry.config
    }
}

impl<S, C> Drop for Throttler<S, C> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S, C> std::fmt::Debug for Throttler<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttler")
            .field("config", &self.registry.config)
            .field("buckets", &self.registry.buckets.read().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
