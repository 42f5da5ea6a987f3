#![doc = include_str!("../README.md")]
//!
//! # Core Components
//!
//! - [`Throttler`] - Keyed buckets refilled by one shared ticker, with blocking
//!   [`wait`](Throttler::wait) and non-blocking [`halt`](Throttler::halt)
//! - [`Bucket`] - A bounded token reservoir with atomic take and put
//! - [`Config`] - Tick period and refill mode
//! - [`Clock`] trait and implementations used to measure waits
//! - Storage implementations for different concurrency needs
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Duration;
//!
//! use tickbucket::Throttler;
//!
//! // refill every 10ms
//! let throttler = Throttler::new(Duration::from_millis(10)).unwrap();
//!
//! // at most 100 requests per second per client
//! if throttler.halt("10.0.0.7", 1, 100) {
//!     println!("too many requests");
//! }
//!
//! // or block until the tokens are there
//! let (elapsed, waited) = throttler.wait("10.0.0.7", 1, 100);
//! println!("waited={waited} for {elapsed:?}");
//!
//! throttler.close();
//! ```

mod bucket;
mod clock;
mod config;
mod error;
#[cfg(feature = "async")]
pub mod futures;
mod storage;
mod throttler;

pub use bucket::Bucket;
#[cfg(feature = "quanta")]
pub use clock::QuantaClock;
#[cfg(any(feature = "tokio", feature = "async"))]
pub use clock::TokioClock;
pub use clock::{Clock, ManualClock, StdClock};
pub use config::{Config, Refill};
pub use error::*;
#[cfg(feature = "async")]
pub use crate::futures::ThrottleStreamExt;
pub use throttler::Throttler;

pub use storage::{
    LevelStorage, atomic::AtomicStorage, local::LocalStorage, padded_atomic::PaddedAtomicStorage,
};
