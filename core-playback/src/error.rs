//! # Playback Error Types
//!
//! Every rejected command resolves with one of these. Each variant has a
//! stable [`code`](PlaybackError::code) the host bridge forwards to the
//! application alongside the human-readable message.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Buffer bound that failed validation during setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferBound {
    /// `playBuffer` is negative.
    Play,
    /// `backBuffer` is negative.
    Back,
    /// `minBuffer` is below `playBuffer`, or `maxBuffer` is below `minBuffer`.
    Min,
}

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Connection Gate
    // ========================================================================
    /// The engine is not bound. Call setup first.
    #[error("The player is not initialized. Call setupPlayer first.")]
    NotInitialized,

    /// Setup was called while bound or while another setup is pending.
    #[error("The player has already been initialized via setupPlayer.")]
    AlreadyInitialized,

    /// The platform refuses to start the engine from the background.
    #[error("The player could not be setup while the app is in the background.")]
    NotForeground,

    /// Buffer configuration rejected before connecting.
    #[error("{message}")]
    InvalidBufferBounds { bound: BufferBound, message: String },

    // ========================================================================
    // Queue
    // ========================================================================
    #[error("Index {index} is out of bounds for a queue of length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    /// Malformed track descriptor.
    #[error("Invalid track: {0}")]
    InvalidTrackPayload(String),

    /// The operation needs a non-empty queue.
    #[error("There is no current item in the player")]
    NoCurrentItem,

    // ========================================================================
    // Engine
    // ========================================================================
    /// Unanticipated engine failure.
    #[error("Engine failure: {0}")]
    RuntimeFailure(#[from] BridgeError),

    /// The command worker is gone (the player was dropped mid-command).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    pub(crate) fn out_of_bounds(index: impl TryInto<i64>, len: usize) -> Self {
        PlaybackError::IndexOutOfBounds {
            index: index.try_into().unwrap_or(i64::MAX),
            len,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            PlaybackError::NotInitialized => "player_not_initialized",
            PlaybackError::AlreadyInitialized => "player_already_initialized",
            PlaybackError::NotForeground => "android_cannot_setup_player_in_background",
            PlaybackError::InvalidBufferBounds { bound, .. } => match bound {
                BufferBound::Play => "play_buffer_error",
                BufferBound::Back => "back_buffer_error",
                BufferBound::Min => "min_buffer_error",
            },
            PlaybackError::IndexOutOfBounds { .. } => "index_out_of_bounds",
            PlaybackError::InvalidTrackPayload(_) => "invalid_track_object",
            PlaybackError::NoCurrentItem => "no_current_item",
            PlaybackError::RuntimeFailure(_) | PlaybackError::Internal(_) => "runtime_exception",
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(PlaybackError::NotInitialized.code(), "player_not_initialized");
        assert_eq!(
            PlaybackError::AlreadyInitialized.code(),
            "player_already_initialized"
        );
        assert_eq!(
            PlaybackError::NotForeground.code(),
            "android_cannot_setup_player_in_background"
        );
        assert_eq!(
            PlaybackError::InvalidBufferBounds {
                bound: BufferBound::Back,
                message: String::new()
            }
            .code(),
            "back_buffer_error"
        );
        assert_eq!(
            PlaybackError::out_of_bounds(9usize, 3).code(),
            "index_out_of_bounds"
        );
        assert_eq!(
            PlaybackError::InvalidTrackPayload("x".into()).code(),
            "invalid_track_object"
        );
        assert_eq!(PlaybackError::NoCurrentItem.code(), "no_current_item");
    }

    #[test]
    fn bridge_errors_become_runtime_failures() {
        let err: PlaybackError = BridgeError::EngineRejected {
            code: "ERROR_CODE_IO".into(),
            message: "source error".into(),
        }
        .into();

        assert_eq!(err.code(), "runtime_exception");
        assert!(err.to_string().contains("source error"));
    }

    #[test]
    fn out_of_bounds_message_names_index_and_length() {
        let err = PlaybackError::out_of_bounds(-4i64, 2);
        assert_eq!(
            err.to_string(),
            "Index -4 is out of bounds for a queue of length 2"
        );
    }
}
