//! # Host Bridge Traits
//!
//! Contract between the playback core and the platform it runs on.
//!
//! ## Traits
//!
//! - [`PlaybackEngine`](playback::PlaybackEngine) - Native media engine that
//!   renders one item at a time and reports back through
//!   [`EngineSignalSink`](playback::EngineSignalSink)
//! - [`LifecycleObserver`](lifecycle::LifecycleObserver) - App
//!   foreground/background state, consulted before starting the engine
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Engines that
//! refuse a command with a platform error code should use
//! [`BridgeError::EngineRejected`] so the code survives up to the host.
//!
//! ## Thread Safety
//!
//! Bridge traits require `Send + Sync` on native targets (see
//! [`platform::PlatformSendSync`]). The orchestrator shares the engine between
//! its worker task and read-only queries.

pub mod error;
pub mod lifecycle;
pub mod log;
pub mod platform;
pub mod playback;

pub use error::BridgeError;

pub use lifecycle::{LifecycleObserver, LifecycleState};
pub use log::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use playback::{
    Capability, EngineConfig, EngineError, EngineSignal, EngineSignalSink, EngineState,
    MediaItem, MediaSource, MediaType, NowPlayingMetadata, PlaybackEngine, PlayerOptions,
    RatingType, RemoteCommand, RepeatMode, StreamMetadata,
};
