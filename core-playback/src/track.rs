//! Track descriptors.
//!
//! A track is built from the caller's JSON object. A handful of fields are
//! interpreted (media reference, display metadata, per-track request options);
//! the payload itself is kept verbatim and handed back on every query.

use crate::error::{PlaybackError, Result};
use bridge_traits::playback::{MediaItem, MediaSource, MediaType, NowPlayingMetadata};
use serde_json::{Map, Value};
use std::collections::HashMap;

const URL_KEY: &str = "url";

/// An immutable queue entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    source: MediaSource,
    media_type: MediaType,
    content_type: Option<String>,
    user_agent: Option<String>,
    headers: HashMap<String, String>,
    metadata: NowPlayingMetadata,
    original: Map<String, Value>,
}

impl Track {
    /// Parse a caller payload.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::InvalidTrackPayload`] if the payload is not an object
    /// or has no usable `url`. Optional fields that cannot be interpreted are
    /// ignored.
    pub fn from_value(payload: Value) -> Result<Self> {
        match payload {
            Value::Object(map) => Self::from_map(map),
            _ => Err(PlaybackError::InvalidTrackPayload(
                "Track was not a dictionary type".to_string(),
            )),
        }
    }

    /// Parse a list of payloads. Fails on the first invalid entry.
    pub fn from_values(payloads: Vec<Value>) -> Result<Vec<Self>> {
        payloads.into_iter().map(Self::from_value).collect()
    }

    fn from_map(original: Map<String, Value>) -> Result<Self> {
        let source = match original.get(URL_KEY) {
            Some(Value::String(uri)) if !uri.is_empty() => MediaSource::Uri(uri.clone()),
            Some(Value::Number(number)) => number
                .as_i64()
                .map(MediaSource::Resource)
                .ok_or_else(|| invalid("Track url is not an integer resource id"))?,
            Some(Value::String(_)) => return Err(invalid("Track url is empty")),
            Some(_) => return Err(invalid("Track url must be a string or a resource id")),
            None => return Err(invalid("Track is missing a url")),
        };

        let media_type = match string_field(&original, "type").as_deref() {
            Some("dash") => MediaType::Dash,
            Some("hls") => MediaType::Hls,
            Some("smoothstreaming") => MediaType::SmoothStreaming,
            _ => MediaType::Default,
        };

        let headers = original
            .get("headers")
            .and_then(Value::as_object)
            .map(|headers| {
                headers
                    .iter()
                    .filter_map(|(key, value)| {
                        value.as_str().map(|value| (key.clone(), value.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let metadata = NowPlayingMetadata {
            title: string_field(&original, "title"),
            artist: string_field(&original, "artist"),
            album: string_field(&original, "album"),
            artwork: string_field(&original, "artwork"),
            description: string_field(&original, "description"),
            genre: string_field(&original, "genre"),
            date: string_field(&original, "date"),
            duration: original
                .get("duration")
                .and_then(Value::as_f64)
                .filter(|duration| duration.is_finite() && *duration >= 0.0),
            rating: original.get("rating").filter(|r| !r.is_null()).cloned(),
            elapsed_time: None,
        };

        Ok(Self {
            source,
            media_type,
            content_type: string_field(&original, "contentType"),
            user_agent: string_field(&original, "userAgent"),
            headers,
            metadata,
            original,
        })
    }

    /// Return a new track with `patch` merged in. `url` cannot be patched.
    pub fn merged(&self, patch: &Value) -> Result<Self> {
        let Value::Object(patch) = patch else {
            return Err(invalid("Metadata patch was not a dictionary type"));
        };

        let mut original = self.original.clone();
        for (key, value) in patch {
            if key != URL_KEY {
                original.insert(key.clone(), value.clone());
            }
        }
        Self::from_map(original)
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.title.as_deref()
    }

    pub fn artist(&self) -> Option<&str> {
        self.metadata.artist.as_deref()
    }

    /// Declared duration in seconds, if the caller supplied one.
    pub fn duration(&self) -> Option<f64> {
        self.metadata.duration
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Display metadata derived from the interpreted fields.
    pub fn now_playing(&self) -> &NowPlayingMetadata {
        &self.metadata
    }

    /// The caller's payload, including fields this crate does not interpret.
    pub fn original_item(&self) -> Value {
        Value::Object(self.original.clone())
    }

    /// What the engine needs to render this track.
    pub fn to_media_item(&self) -> MediaItem {
        MediaItem {
            source: self.source.clone(),
            media_type: self.media_type,
            content_type: self.content_type.clone(),
            user_agent: self.user_agent.clone(),
            headers: self.headers.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

fn invalid(message: &str) -> PlaybackError {
    PlaybackError::InvalidTrackPayload(message.to_string())
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}
