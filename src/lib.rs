//! Workspace facade crate.
//!
//! Host applications can depend on `trackplayer-workspace` and enable the
//! `player` feature instead of wiring `core-playback`, `core-runtime` and
//! `bridge-traits` individually.

#[cfg(feature = "player")]
pub use bridge_traits as bridge;
#[cfg(feature = "player")]
pub use core_playback as playback;
#[cfg(feature = "player")]
pub use core_runtime as runtime;

#[cfg(feature = "player")]
pub use core_playback::{PlaybackError, TrackPlayer};
