//! # Engine Connection Gate
//!
//! Tracks whether the engine is reachable and owns the outstanding setup
//! request until the engine reports it connected.

use crate::error::{PlaybackError, Result};
use bridge_traits::playback::EngineConfig;
use core_async::Resolver;

/// Connection lifecycle as seen by queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connection {
    #[default]
    Unbound,
    /// Setup accepted, waiting for the engine to connect.
    Pending,
    Bound,
}

/// What the worker must do after a `Connected` signal.
#[derive(Debug)]
pub struct Binding {
    /// Configuration to apply to the freshly bound engine.
    pub config: EngineConfig,
    /// Setup request to resolve, if one was waiting.
    pub reply: Option<Resolver<Result<()>>>,
}

#[derive(Debug, Default)]
pub struct Gate {
    connection: Connection,
    config: Option<EngineConfig>,
    pending: Option<Resolver<Result<()>>>,
}

impl Gate {
    pub fn connection(&self) -> Connection {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection == Connection::Bound
    }

    /// Fails with [`PlaybackError::NotInitialized`] unless bound.
    pub fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(PlaybackError::NotInitialized)
        }
    }

    /// Fails with [`PlaybackError::AlreadyInitialized`] while bound or pending.
    pub fn ensure_idle(&self) -> Result<()> {
        match self.connection {
            Connection::Unbound => Ok(()),
            Connection::Pending | Connection::Bound => Err(PlaybackError::AlreadyInitialized),
        }
    }

    /// Store an accepted setup request.
    pub fn begin(&mut self, config: EngineConfig, reply: Resolver<Result<()>>) {
        self.config = Some(config);
        self.pending = Some(reply);
        self.connection = Connection::Pending;
    }

    /// Abandon a setup whose connect call failed outright.
    pub fn abort(&mut self) -> Option<Resolver<Result<()>>> {
        self.connection = Connection::Unbound;
        self.pending.take()
    }

    /// Handle the engine's `Connected` signal.
    ///
    /// Returns `None` when already bound, or when no setup was ever accepted.
    pub fn on_connected(&mut self) -> Option<Binding> {
        if self.connection == Connection::Bound {
            return None;
        }
        let config = self.config.clone()?;
        self.connection = Connection::Bound;
        Some(Binding {
            config,
            reply: self.pending.take(),
        })
    }

    /// Handle the engine's `Disconnected` signal.
    ///
    /// A pending setup stays pending: it resolves once the engine connects.
    pub fn on_disconnected(&mut self) -> bool {
        if self.connection == Connection::Bound {
            self.connection = Connection::Unbound;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::SetupOptions;

    fn config() -> EngineConfig {
        SetupOptions::default().engine_config().unwrap()
    }

    #[tokio::test]
    async fn connect_resolves_pending_setup_once() {
        let mut gate = Gate::default();
        assert!(gate.ensure_idle().is_ok());
        assert!(matches!(
            gate.ensure_connected(),
            Err(PlaybackError::NotInitialized)
        ));

        let (reply, pending) = core_async::deferred::channel();
        gate.begin(config(), reply);
        assert_eq!(gate.connection(), Connection::Pending);
        assert!(matches!(
            gate.ensure_idle(),
            Err(PlaybackError::AlreadyInitialized)
        ));

        let binding = gate.on_connected().unwrap();
        assert_eq!(binding.config, config());
        assert!(binding.reply.unwrap().settle(Ok(())));
        assert!(pending.await.unwrap().is_ok());

        assert!(gate.is_connected());
        assert!(gate.on_connected().is_none());
    }

    #[test]
    fn disconnect_then_reconnect_reapplies_config() {
        let mut gate = Gate::default();
        let (reply, _pending) = core_async::deferred::channel();
        gate.begin(config(), reply);
        gate.on_connected().unwrap();

        assert!(gate.on_disconnected());
        assert_eq!(gate.connection(), Connection::Unbound);

        let binding = gate.on_connected().unwrap();
        assert!(binding.reply.is_none());
        assert!(gate.is_connected());
    }

    #[test]
    fn stray_connected_without_setup_is_ignored() {
        let mut gate = Gate::default();
        assert!(gate.on_connected().is_none());
        assert!(!gate.on_disconnected());
        assert_eq!(gate.connection(), Connection::Unbound);
    }
}
