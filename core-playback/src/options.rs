//! Setup and runtime options.
//!
//! Hosts pass options as JSON objects with camelCase keys; durations are in
//! seconds and are converted to whole milliseconds for the engine.

use crate::error::{BufferBound, PlaybackError, Result};
use bridge_traits::playback::{EngineConfig, PlayerOptions};
use core_runtime::config::{MAX_PROGRESS_INTERVAL, MIN_PROGRESS_INTERVAL};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_MIN_BUFFER_MS: i64 = 2_500;
pub const DEFAULT_MAX_BUFFER_MS: i64 = 5_000;
pub const DEFAULT_PLAY_BUFFER_MS: i64 = 3_000;
pub const DEFAULT_BACK_BUFFER_MS: i64 = 1_000;

/// Runtime option patch accepted by `update_options`.
pub type UpdateOptions = PlayerOptions;

/// Options accepted once by `setup`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetupOptions {
    /// Seconds.
    pub min_buffer: Option<f64>,
    /// Seconds.
    pub max_buffer: Option<f64>,
    /// Seconds of media required before playback starts.
    pub play_buffer: Option<f64>,
    /// Seconds kept behind the playhead.
    pub back_buffer: Option<f64>,
    /// KiB of disk cache; absent or zero disables caching.
    pub max_cache_size: Option<u64>,
    pub auto_handle_interruptions: Option<bool>,
    pub auto_update_metadata: Option<bool>,
    pub android_audio_content_type: Option<String>,
}

impl SetupOptions {
    /// Parse a JSON options object. `null` means all defaults.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
            .map_err(|e| PlaybackError::Internal(format!("Invalid setup options: {}", e)))
    }

    /// Resolve defaults and validate the buffer bounds.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let min_buffer_ms = millis(self.min_buffer, DEFAULT_MIN_BUFFER_MS);
        let max_buffer_ms = millis(self.max_buffer, DEFAULT_MAX_BUFFER_MS);
        // An omitted play buffer never exceeds the effective minimum buffer.
        let play_buffer_ms = millis(
            self.play_buffer,
            DEFAULT_PLAY_BUFFER_MS.min(min_buffer_ms.max(0)),
        );
        let back_buffer_ms = millis(self.back_buffer, DEFAULT_BACK_BUFFER_MS);

        if play_buffer_ms < 0 {
            return Err(bounds(
                BufferBound::Play,
                "The value for playBuffer should be greater than or equal to zero.",
            ));
        }
        if back_buffer_ms < 0 {
            return Err(bounds(
                BufferBound::Back,
                "The value for backBuffer should be greater than or equal to zero.",
            ));
        }
        if min_buffer_ms < play_buffer_ms {
            return Err(bounds(
                BufferBound::Min,
                "The value for minBuffer should be greater than or equal to playBuffer.",
            ));
        }
        if max_buffer_ms < min_buffer_ms {
            return Err(bounds(
                BufferBound::Min,
                "The value for maxBuffer should be greater than or equal to minBuffer.",
            ));
        }

        Ok(EngineConfig {
            min_buffer_ms,
            max_buffer_ms,
            play_buffer_ms,
            back_buffer_ms,
            max_cache_size_kib: self.max_cache_size.filter(|size| *size > 0),
            auto_handle_interruptions: self.auto_handle_interruptions.unwrap_or(false),
            auto_update_metadata: self.auto_update_metadata.unwrap_or(true),
            audio_content_type: self.android_audio_content_type.clone(),
        })
    }
}

/// Progress interval requested by an options patch, if any.
///
/// Zero, negative and non-finite values switch periodic progress events off.
/// Anything else is clamped to the accepted interval range.
pub(crate) fn progress_interval(options: &UpdateOptions) -> Option<Option<Duration>> {
    options.progress_update_event_interval.map(|seconds| {
        (seconds.is_finite() && seconds > 0.0).then(|| {
            Duration::try_from_secs_f64(seconds)
                .unwrap_or(MAX_PROGRESS_INTERVAL)
                .clamp(MIN_PROGRESS_INTERVAL, MAX_PROGRESS_INTERVAL)
        })
    })
}

fn millis(seconds: Option<f64>, default_ms: i64) -> i64 {
    seconds.map_or(default_ms, |s| (s * 1000.0) as i64)
}

fn bounds(bound: BufferBound, message: &str) -> PlaybackError {
    PlaybackError::InvalidBufferBounds {
        bound,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::playback::{Capability, RatingType};
    use serde_json::json;

    #[test]
    fn defaults_apply_when_keys_are_missing() {
        let config = SetupOptions::default().engine_config().unwrap();
        assert_eq!(config.min_buffer_ms, 2_500);
        assert_eq!(config.max_buffer_ms, 5_000);
        assert_eq!(config.play_buffer_ms, 2_500);
        assert_eq!(config.back_buffer_ms, 1_000);
        assert!(config.max_cache_size_kib.is_none());
    }

    #[test]
    fn omitted_play_buffer_follows_raised_minimum() {
        let options = SetupOptions {
            min_buffer: Some(4.0),
            ..Default::default()
        };
        let config = options.engine_config().unwrap();
        assert_eq!(config.play_buffer_ms, 3_000);

        let options = SetupOptions {
            min_buffer: Some(1.0),
            ..Default::default()
        };
        assert_eq!(options.engine_config().unwrap().play_buffer_ms, 1_000);
    }

    #[test]
    fn seconds_convert_to_whole_millis() {
        let options = SetupOptions::from_value(json!({
            "minBuffer": 15.5,
            "maxBuffer": 50,
            "playBuffer": 2.5,
            "backBuffer": 0.0015,
            "maxCacheSize": 1024,
            "autoHandleInterruptions": true
        }))
        .unwrap();

        let config = options.engine_config().unwrap();
        assert_eq!(config.min_buffer_ms, 15_500);
        assert_eq!(config.max_buffer_ms, 50_000);
        assert_eq!(config.play_buffer_ms, 2_500);
        assert_eq!(config.back_buffer_ms, 1);
        assert_eq!(config.max_cache_size_kib, Some(1024));
        assert!(config.auto_handle_interruptions);
    }

    #[test]
    fn invalid_bounds_carry_specific_codes() {
        let cases = [
            (json!({ "playBuffer": -1 }), "play_buffer_error"),
            (json!({ "minBuffer": 5, "backBuffer": -0.5 }), "back_buffer_error"),
            (json!({ "minBuffer": 1, "playBuffer": 2 }), "min_buffer_error"),
            (json!({ "minBuffer": 10, "maxBuffer": 5, "playBuffer": 1 }), "min_buffer_error"),
        ];

        for (payload, code) in cases {
            let err = SetupOptions::from_value(payload)
                .unwrap()
                .engine_config()
                .unwrap_err();
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn progress_interval_patch() {
        let mut options = UpdateOptions::default();
        assert_eq!(progress_interval(&options), None);

        options.progress_update_event_interval = Some(0.5);
        assert_eq!(
            progress_interval(&options),
            Some(Some(Duration::from_millis(500)))
        );

        options.progress_update_event_interval = Some(0.0);
        assert_eq!(progress_interval(&options), Some(None));
    }

    #[test]
    fn progress_interval_is_clamped_to_accepted_range() {
        let mut options = UpdateOptions::default();

        options.progress_update_event_interval = Some(1e30);
        assert_eq!(progress_interval(&options), Some(Some(MAX_PROGRESS_INTERVAL)));

        options.progress_update_event_interval = Some(7200.0);
        assert_eq!(progress_interval(&options), Some(Some(MAX_PROGRESS_INTERVAL)));

        options.progress_update_event_interval = Some(1e-12);
        assert_eq!(progress_interval(&options), Some(Some(MIN_PROGRESS_INTERVAL)));

        options.progress_update_event_interval = Some(f64::INFINITY);
        assert_eq!(progress_interval(&options), Some(None));

        options.progress_update_event_interval = Some(f64::NAN);
        assert_eq!(progress_interval(&options), Some(None));
    }

    #[test]
    fn update_options_accept_constant_table_codes() {
        let table = crate::constants::constants();
        let options: UpdateOptions = serde_json::from_value(json!({
            "capabilities": [table["CAPABILITY_PLAY"], table["CAPABILITY_PAUSE"]],
            "compactCapabilities": [table["CAPABILITY_SKIP_TO_NEXT"]],
            "ratingType": table["RATING_THUMBS_UP_DOWN"],
        }))
        .unwrap();

        assert_eq!(
            options.capabilities,
            Some(vec![Capability::Play, Capability::Pause])
        );
        assert_eq!(
            options.compact_capabilities,
            Some(vec![Capability::SkipToNext])
        );
        assert_eq!(options.rating_type, Some(RatingType::ThumbsUpDown));
    }
}
