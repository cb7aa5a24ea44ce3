//! Async abstraction layer for the track player core.
//!
//! Every `core-*` crate depends on this crate instead of reaching for Tokio
//! directly, so the executor can be swapped in one place.
//!
//! # Modules
//!
//! - `task`: Task spawning
//! - `time`: Sleep, timeouts and intervals
//! - `sync`: Channels and locks
//! - `deferred`: Single-shot deferred results handed back to callers
//!
//! # Examples
//!
//! ```rust
//! use core_async::deferred;
//!
//! # async fn example() {
//! let (resolver, pending) = deferred::channel::<u32>();
//! core_async::spawn(async move {
//!     resolver.settle(7);
//! });
//! assert_eq!(pending.await.unwrap(), 7);
//! # }
//! ```

pub mod deferred;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use deferred::{Abandoned, Deferred, Resolver};
pub use task::spawn;
pub use time::{sleep, Duration, Instant};
