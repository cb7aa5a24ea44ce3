//! Deferred results.
//!
//! A deferred result is an outcome delivered to the caller exactly once,
//! either a value or an error. The producing side holds a [`Resolver`], the
//! waiting side holds a [`Deferred`]. Dropping the `Deferred` is how a caller
//! discards a result it no longer needs; the producer still completes its work
//! and [`Resolver::settle`] simply reports that nobody was listening.
//!
//! ```rust
//! use core_async::deferred;
//!
//! # async fn example() {
//! let (resolver, pending) = deferred::channel::<Result<(), String>>();
//! resolver.settle(Err("rejected".to_string()));
//! assert_eq!(pending.await.unwrap(), Err("rejected".to_string()));
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

/// Creates a connected resolver/deferred pair.
pub fn channel<T>() -> (Resolver<T>, Deferred<T>) {
    let (tx, rx) = oneshot::channel();
    (Resolver { tx }, Deferred { rx })
}

/// Error returned when a [`Resolver`] is dropped without settling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abandoned;

impl fmt::Display for Abandoned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("deferred result was dropped before it settled")
    }
}

impl std::error::Error for Abandoned {}

/// Producing half of a deferred result.
pub struct Resolver<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Resolver<T> {
    /// Delivers the outcome. Returns `false` if the waiting side was dropped.
    pub fn settle(self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }

    /// Returns `true` once the waiting side has been dropped.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("abandoned", &self.is_abandoned())
            .finish()
    }
}

/// Waiting half of a deferred result. Resolves exactly once.
pub struct Deferred<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for Deferred<T> {
    type Output = Result<T, Abandoned>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map_err(|_| Abandoned)
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn settles_once_with_value() {
        let (resolver, pending) = channel::<u8>();
        assert!(resolver.settle(3));
        assert_eq!(pending.await, Ok(3));
    }

    #[tokio::test]
    async fn dropped_resolver_reports_abandoned() {
        let (resolver, pending) = channel::<u8>();
        drop(resolver);
        assert_eq!(pending.await, Err(Abandoned));
    }

    #[tokio::test]
    async fn settle_after_waiter_dropped_returns_false() {
        let (resolver, pending) = channel::<u8>();
        drop(pending);
        assert!(resolver.is_abandoned());
        assert!(!resolver.settle(1));
    }
}
