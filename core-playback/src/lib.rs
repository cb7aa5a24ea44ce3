//! # Playback Queue Orchestration
//!
//! Owns the ordered queue of tracks, the active-track pointer and the
//! connection to a platform [`PlaybackEngine`](bridge_traits::PlaybackEngine),
//! and turns engine signals into the outward event stream.
//!
//! ## Overview
//!
//! - [`TrackPlayer`]: the operation surface, one serialized command worker
//! - [`Queue`]: index bookkeeping for add, remove, move and advancement
//! - [`Track`]: validated track payloads that keep their original fields
//! - [`SetupOptions`]: buffer configuration and its validation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::{SetupOptions, TrackPlayer};
//! use core_runtime::RuntimeConfig;
//! use serde_json::json;
//!
//! let config = RuntimeConfig::builder().engine(engine).build()?;
//! let player = TrackPlayer::new(config);
//! player.setup(SetupOptions::default()).await?;
//! player.add(vec![json!({ "url": "https://cdn.example.com/a.mp3" })], None).await?;
//! player.skip(0, None).await?;
//! player.play().await?;
//! ```

pub mod constants;
pub mod error;
pub mod gate;
pub mod options;
pub mod player;
pub mod queue;
pub mod state;
pub mod track;

pub use error::{BufferBound, PlaybackError, Result};
pub use gate::Connection;
pub use options::{SetupOptions, UpdateOptions};
pub use player::TrackPlayer;
pub use queue::{Advance, Queue, Removal};
pub use state::{PlaybackState, Progress, State};
pub use track::Track;
