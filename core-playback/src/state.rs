//! # State Projector
//!
//! Maps raw engine signals onto the externally visible playback state and
//! converts engine time values into clamped seconds.

use bridge_traits::playback::{EngineError, EngineState};
use serde::Serialize;

/// Externally visible playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    None,
    Ready,
    Playing,
    Paused,
    Stopped,
    Buffering,
    Loading,
}

impl State {
    pub const ALL: [State; 7] = [
        State::None,
        State::Ready,
        State::Playing,
        State::Paused,
        State::Stopped,
        State::Buffering,
        State::Loading,
    ];

    /// Stable wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            State::None => "none",
            State::Ready => "ready",
            State::Playing => "playing",
            State::Paused => "paused",
            State::Stopped => "stopped",
            State::Buffering => "buffering",
            State::Loading => "loading",
        }
    }
}

impl From<EngineState> for State {
    fn from(state: EngineState) -> Self {
        match state {
            EngineState::Idle => State::None,
            EngineState::Loading => State::Loading,
            EngineState::Buffering => State::Buffering,
            EngineState::Ready => State::Ready,
            EngineState::Playing => State::Playing,
            EngineState::Paused => State::Paused,
            EngineState::Stopped => State::Stopped,
        }
    }
}

/// Current state plus the last engine error reported since it was entered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    pub state: State,
    pub error: Option<EngineError>,
}

impl PlaybackState {
    /// Record a state change. The stored error belongs to the previous state.
    pub fn enter(&mut self, state: EngineState) -> State {
        self.state = state.into();
        self.error = None;
        self.state
    }

    pub fn fail(&mut self, error: EngineError) {
        self.error = Some(error);
    }
}

/// Position, duration and buffered position in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Progress {
    pub position: f64,
    pub duration: f64,
    pub buffered: f64,
}

impl Progress {
    /// Build from engine milliseconds. Unknown duration reads as `0.0`; when
    /// the duration is known neither position nor buffered exceed it.
    pub fn from_millis(position_ms: u64, duration_ms: Option<u64>, buffered_ms: u64) -> Self {
        let duration = duration_ms.map(seconds).unwrap_or(0.0);
        let mut position = seconds(position_ms);
        let mut buffered = seconds(buffered_ms);
        if duration > 0.0 {
            position = position.min(duration);
            buffered = buffered.min(duration);
        }
        Self {
            position,
            duration,
            buffered,
        }
    }
}

/// Milliseconds to fractional seconds.
pub fn seconds(millis: u64) -> f64 {
    millis as f64 / 1000.0
}
