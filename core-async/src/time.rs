//! Time-related abstractions.
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(10)).await;
//!     println!("Took {:?}", start.elapsed());
//! }
//! ```

pub use tokio::time::{
    interval, sleep, timeout, timeout_at, Interval, MissedTickBehavior, Sleep, Timeout,
};

/// Instant on the runtime clock. Honours paused time in tests, unlike
/// [`Instant`].
pub use tokio::time::Instant as RuntimeInstant;

pub use std::time::{Duration, Instant};

/// Error returned by [`timeout`] when the deadline elapses first.
pub use tokio::time::error::Elapsed;

/// Builds an interval whose first tick fires after `period` rather than
/// immediately, and which skips ticks missed while the consumer was busy.
///
/// A zero period is raised to one millisecond.
pub fn delayed_interval(period: Duration) -> Interval {
    let period = period.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
