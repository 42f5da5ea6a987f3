use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use futures::Stream;
use likely_stable::unlikely;
use pin_project_lite::pin_project;
use tokio::time::{Sleep, sleep};

use crate::Bucket;
use crate::storage::LevelStorage;

struct Pending<T> {
    item: T,
    wanted: u64,
    got: u64,
}

pin_project! {
    /// A stream wrapper that holds back each item until the tokens it costs
    /// were taken from a throttler bucket.
    ///
    /// Tokens are collected the same way [`Throttler::wait`](crate::Throttler::wait)
    /// does: take what is there, sleep one tick period, take the rest. Once
    /// the owning throttler is closed, items pass through unthrottled.
    /// Dropping the stream while an item is held returns the tokens already
    /// taken for it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    ///
    /// use futures::{StreamExt, stream};
    /// use tickbucket::Throttler;
    /// use tickbucket::futures::ThrottleStreamExt;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let throttler = Throttler::new(Duration::from_millis(10)).unwrap();
    /// let items: Vec<_> = stream::iter(0..3)
    ///     .throttle(&throttler, "feed", 100)
    ///     .collect()
    ///     .await;
    /// assert_eq!(vec![0, 1, 2], items);
    /// # }
    /// ```
    pub struct ThrottledStream<S, ST, F>
    where
        S: Stream,
        ST: LevelStorage,
        F: Fn(&S::Item) -> u64,
    {
        #[pin]
        stream: S,
        bucket: Arc<Bucket<ST>>,
        tick_period: Duration,
        weight_fn: F,
        #[pin]
        delay: Option<Sleep>,
        pending: Option<Pending<S::Item>>,
    }

    impl<S, ST, F> PinnedDrop for ThrottledStream<S, ST, F>
    where
        S: Stream,
        ST: LevelStorage,
        F: Fn(&S::Item) -> u64,
    {
        fn drop(this: Pin<&mut Self>) {
            // an item still being paid for gives its tokens back
            let this = this.project();
            if let Some(pending) = this.pending.take() {
                if pending.got > 0 {
                    this.bucket.put(pending.got);
                }
            }
        }
    }
}

impl<S, ST, F> ThrottledStream<S, ST, F>
where
    S: Stream,
    ST: LevelStorage,
    F: Fn(&S::Item) -> u64,
{
    /// Creates a throttled stream spending `weight_fn(&item)` tokens of
    /// `bucket` per item, polling once per `tick_period`.
    pub fn new(stream: S, bucket: Arc<Bucket<ST>>, tick_period: Duration, weight_fn: F) -> Self {
        Self {
            stream,
            bucket,
            tick_period,
            weight_fn,
            delay: None,
            pending: None,
        }
    }

    /// The bucket items are paid from.
    pub fn bucket(&self) -> &Arc<Bucket<ST>> {
        &self.bucket
    }
}

impl<S, ST, F> Stream for ThrottledStream<S, ST, F>
where
    S: Stream,
    ST: LevelStorage,
    F: Fn(&S::Item) -> u64,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            // are we already waiting for a tick?
            if let Some(delay) = this.delay.as_mut().as_pin_mut() {
                ready!(delay.poll(cx));
                this.delay.set(None);
            }

            let mut pending = match this.pending.take() {
                Some(pending) => pending,
                None => match ready!(this.stream.as_mut().poll_next(cx)) {
                    Some(item) => {
                        let wanted = (this.weight_fn)(&item);
                        Pending {
                            item,
                            wanted,
                            got: 0,
                        }
                    }
                    None => return Poll::Ready(None),
                },
            };

            pending.got += this.bucket.take(pending.wanted - pending.got);
            if pending.got == pending.wanted {
                return Poll::Ready(Some(pending.item));
            }
            if unlikely(this.bucket.is_closed()) {
                this.bucket.put(pending.got);
                return Poll::Ready(Some(pending.item));
            }
            *this.pending = Some(pending);
            this.delay.set(Some(sleep(*this.tick_period)));
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let queued = usize::from(self.pending.is_some());
        let (lower, upper) = self.stream.size_hint();
        (
            lower.saturating_add(queued),
            upper.and_then(|upper| upper.checked_add(queued)),
        )
    }
}
