use std::time::Duration;

use tickbucket::Throttler;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), tickbucket::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    let throttler = Throttler::new(Duration::from_millis(100))?;

    // 10 tokens per second => one token per 100ms tick
    assert!(throttler.halt("alice", 1, 10));
    std::thread::sleep(Duration::from_millis(150));
    assert!(!throttler.halt("alice", 1, 10));

    let (elapsed, waited) = throttler.wait("alice", 5, 10);
    println!("alice waited={waited} for {elapsed:?}");

    // twice the rate, twice the tokens per tick
    let (elapsed, waited) = throttler.wait("bob", 10, 20);
    println!("bob waited={waited} for {elapsed:?}");

    throttler.close();
    Ok(())
}
