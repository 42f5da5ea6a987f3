use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

use crate::{AtomicStorage, Config, Throttler, TokioClock};

pub(crate) const TICK: Duration = Duration::from_millis(100);

/// A throttler nobody refills unless a test says so.
pub(crate) fn manual() -> Arc<Throttler<AtomicStorage, TokioClock>> {
    let config = Config::every(TICK).manual();
    Arc::new(Throttler::from_parts(config, TokioClock::default()).unwrap())
}

/// Refills `throttler` once per [`TICK`] on the (paused) tokio clock.
pub(crate) fn spawn_refills(
    throttler: &Arc<Throttler<AtomicStorage, TokioClock>>,
) -> JoinHandle<()> {
    let throttler = Arc::clone(throttler);
    tokio::spawn(async move {
        let mut ticks = interval_at(Instant::now() + TICK, TICK);
        loop {
            ticks.tick().await;
            throttler.refill();
        }
    })
}
