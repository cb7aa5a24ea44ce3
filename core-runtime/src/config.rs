//! # Runtime Configuration
//!
//! Builder-constructed configuration for a player instance.
//!
//! ## Overview
//!
//! [`RuntimeConfig`] carries the host-provided bridges and the orchestrator's
//! tunables. It is validated fail-fast: a missing engine or a zero-sized event
//! channel is reported at build time instead of on the first command.
//!
//! ## Required Dependencies
//!
//! - `PlaybackEngine` - the native media engine
//!
//! ## Optional Dependencies
//!
//! - `LifecycleObserver` - foreground check before setup. Without one the host
//!   is always treated as foreground.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::RuntimeConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = RuntimeConfig::builder()
//!     .engine(Arc::new(ExoPlayerEngine::new(context)))
//!     .lifecycle_observer(Arc::new(ActivityLifecycle::new()))
//!     .reset_settle_delay(Duration::from_millis(500))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{LifecycleObserver, PlaybackEngine};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default capacity of the outward event channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = crate::events::DEFAULT_EVENT_BUFFER_SIZE;

/// Default upper bound on how long `reset()` waits for the engine to confirm
/// it stopped before clearing the queue.
pub const DEFAULT_RESET_SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Smallest accepted progress interval.
pub const MIN_PROGRESS_INTERVAL: Duration = Duration::from_millis(50);

/// Largest accepted progress interval.
pub const MAX_PROGRESS_INTERVAL: Duration = Duration::from_secs(3600);

/// Configuration of a player instance.
#[derive(Clone)]
pub struct RuntimeConfig {
    pub engine: Arc<dyn PlaybackEngine>,
    pub lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    /// Capacity of the outward event channel.
    pub event_buffer_size: usize,
    /// Longest wait for the stop acknowledgment during `reset()`.
    pub reset_settle_delay: Duration,
    /// Progress event interval used until the host sets one through options.
    pub default_progress_interval: Option<Duration>,
    /// Reject setup while the host app is in the background.
    pub require_foreground_setup: bool,
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("engine", &"<dyn PlaybackEngine>")
            .field("lifecycle_observer", &self.lifecycle_observer.is_some())
            .field("event_buffer_size", &self.event_buffer_size)
            .field("reset_settle_delay", &self.reset_settle_delay)
            .field("default_progress_interval", &self.default_progress_interval)
            .field("require_foreground_setup", &self.require_foreground_setup)
            .finish()
    }
}

impl RuntimeConfig {
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// This checks:
    /// - Event buffer holds at least one event
    /// - Progress interval, when set, lies within [`MIN_PROGRESS_INTERVAL`]
    ///   and [`MAX_PROGRESS_INTERVAL`]
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if let Some(interval) = self.default_progress_interval {
            if interval < MIN_PROGRESS_INTERVAL {
                return Err(Error::Config(format!(
                    "Progress interval {:?} is below the minimum of {:?}",
                    interval, MIN_PROGRESS_INTERVAL
                )));
            }
            if interval > MAX_PROGRESS_INTERVAL {
                return Err(Error::Config(format!(
                    "Progress interval {:?} is above the maximum of {:?}",
                    interval, MAX_PROGRESS_INTERVAL
                )));
            }
        }

        Ok(())
    }
}

fn engine_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "PlaybackEngine".to_string(),
        message: "A PlaybackEngine implementation is required. \
                 Android: inject the Media3 service adapter. \
                 iOS: inject the AVPlayer adapter."
            .to_string(),
    }
}

/// Builder for [`RuntimeConfig`].
#[derive(Default)]
pub struct RuntimeConfigBuilder {
    engine: Option<Arc<dyn PlaybackEngine>>,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    event_buffer_size: Option<usize>,
    reset_settle_delay: Option<Duration>,
    default_progress_interval: Option<Duration>,
    require_foreground_setup: Option<bool>,
}

impl RuntimeConfigBuilder {
    /// Sets the playback engine (required).
    pub fn engine(mut self, engine: Arc<dyn PlaybackEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn lifecycle_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle_observer = Some(observer);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn reset_settle_delay(mut self, delay: Duration) -> Self {
        self.reset_settle_delay = Some(delay);
        self
    }

    pub fn default_progress_interval(mut self, interval: Duration) -> Self {
        self.default_progress_interval = Some(interval);
        self
    }

    /// Defaults to `true`, matching Android 8+ foreground-service rules.
    pub fn require_foreground_setup(mut self, required: bool) -> Self {
        self.require_foreground_setup = Some(required);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// [`Error::CapabilityMissing`] without an engine, [`Error::Config`] when
    /// validation fails.
    pub fn build(self) -> Result<RuntimeConfig> {
        let engine = self.engine.ok_or_else(engine_missing_error)?;

        let config = RuntimeConfig {
            engine,
            lifecycle_observer: self.lifecycle_observer,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            reset_settle_delay: self
                .reset_settle_delay
                .unwrap_or(DEFAULT_RESET_SETTLE_DELAY),
            default_progress_interval: self.default_progress_interval,
            require_foreground_setup: self.require_foreground_setup.unwrap_or(true),
        };

        config.validate()?;

        Ok(config)
    }
}
