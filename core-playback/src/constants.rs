//! Constants table exposed to the application layer.
//!
//! Codes are stable across versions and must never be renumbered.

use crate::state::State;
use bridge_traits::playback::{Capability, RatingType, RepeatMode};
use serde_json::{Map, Value};

fn capability_key(capability: Capability) -> &'static str {
    match capability {
        Capability::Play => "CAPABILITY_PLAY",
        Capability::PlayFromId => "CAPABILITY_PLAY_FROM_ID",
        Capability::PlayFromSearch => "CAPABILITY_PLAY_FROM_SEARCH",
        Capability::Pause => "CAPABILITY_PAUSE",
        Capability::Stop => "CAPABILITY_STOP",
        Capability::SeekTo => "CAPABILITY_SEEK_TO",
        Capability::Skip => "CAPABILITY_SKIP",
        Capability::SkipToNext => "CAPABILITY_SKIP_TO_NEXT",
        Capability::SkipToPrevious => "CAPABILITY_SKIP_TO_PREVIOUS",
        Capability::SetRating => "CAPABILITY_SET_RATING",
        Capability::JumpForward => "CAPABILITY_JUMP_FORWARD",
        Capability::JumpBackward => "CAPABILITY_JUMP_BACKWARD",
    }
}

fn state_key(state: State) -> &'static str {
    match state {
        State::None => "STATE_NONE",
        State::Ready => "STATE_READY",
        State::Playing => "STATE_PLAYING",
        State::Paused => "STATE_PAUSED",
        State::Stopped => "STATE_STOPPED",
        State::Buffering => "STATE_BUFFERING",
        State::Loading => "STATE_LOADING",
    }
}

fn rating_key(rating: RatingType) -> &'static str {
    match rating {
        RatingType::Heart => "RATING_HEART",
        RatingType::ThumbsUpDown => "RATING_THUMBS_UP_DOWN",
        RatingType::ThreeStars => "RATING_3_STARS",
        RatingType::FourStars => "RATING_4_STARS",
        RatingType::FiveStars => "RATING_5_STARS",
        RatingType::Percentage => "RATING_PERCENTAGE",
    }
}

/// Build the constants table.
pub fn constants() -> Map<String, Value> {
    let mut table = Map::new();

    for capability in Capability::ALL {
        table.insert(capability_key(capability).into(), capability.code().into());
    }
    for state in State::ALL {
        table.insert(state_key(state).into(), state.as_str().into());
    }
    for rating in RatingType::ALL {
        table.insert(rating_key(rating).into(), rating.code().into());
    }
    for (key, mode) in [
        ("REPEAT_OFF", RepeatMode::Off),
        ("REPEAT_TRACK", RepeatMode::Track),
        ("REPEAT_QUEUE", RepeatMode::Queue),
    ] {
        table.insert(key.into(), mode.code().into());
    }

    table
}
