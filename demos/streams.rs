use std::sync::Arc;

use futures::{StreamExt, stream};
use nonzero_ext::nonzero;
use tickbucket::futures::ThrottleStreamExt;
use tickbucket::{Config, Throttler};
use tokio::task::JoinSet;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let throttler = Arc::new(Throttler::with_config(Config::per_second(nonzero!(25u32)))?);

    let start = tokio::time::Instant::now();
    let mut handles = JoinSet::new();
    for i in 1..=4 {
        handles.spawn({
            let throttler = Arc::clone(&throttler);
            async move {
                // 40ms ticks at rate 25: one token per tick, 25 items/s shared by all streams
                let mut items = std::pin::pin!(stream::iter(1..=25).throttle(
                    &throttler,
                    "shared",
                    25
                ));
                while let Some(item) = items.next().await {
                    println!("[stream={i}] item: {item}, elapsed={:?}", start.elapsed());
                }
            }
        });
    }
    handles.join_all().await;
    println!("Completed in {:?}", start.elapsed());

    let (elapsed, waited) = throttler.wait_async("solo", 10, 100).await?;
    println!("solo waited={waited} for {elapsed:?}");
    throttler.close();
    Ok(())
}
