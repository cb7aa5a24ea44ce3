//! Playback engine bridge.
//!
//! The engine is the native media component (ExoPlayer/Media3 service on
//! Android, AVPlayer on iOS, a desktop backend elsewhere). It renders one
//! media item at a time and never owns the queue: the orchestrator tells it
//! which item to render and the engine reports back through an
//! [`EngineSignalSink`] handed over at connect time.
//!
//! Connection is asynchronous. [`PlaybackEngine::connect`] only *starts* the
//! engine; the engine later reports [`EngineSignal::Connected`] (possibly more
//! than once) and [`EngineSignal::Disconnected`] on the same sink as every
//! other signal.

use crate::{error::Result, platform::PlatformSendSync};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Shared vocabulary
// ============================================================================

/// Repeat behaviour applied when the rendered item ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Playback stops when the last track in the queue has finished.
    #[default]
    Off,
    /// Repeats the current track.
    Track,
    /// Repeats the entire queue.
    Queue,
}

impl RepeatMode {
    /// Stable integer code exposed in the constants table.
    pub fn code(self) -> u8 {
        match self {
            RepeatMode::Off => 0,
            RepeatMode::Track => 1,
            RepeatMode::Queue => 2,
        }
    }

    /// Reverse of [`RepeatMode::code`]. Unknown codes map to `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(RepeatMode::Off),
            1 => Some(RepeatMode::Track),
            2 => Some(RepeatMode::Queue),
            _ => None,
        }
    }
}

/// Enum value as sent by the application: the integer code from the
/// constants table, or the camelCase name.
#[derive(Deserialize)]
#[serde(untagged)]
enum CodeOrName {
    Code(i64),
    Name(String),
}

impl CodeOrName {
    fn resolve<T>(
        self,
        kind: &str,
        from_code: fn(i64) -> Option<T>,
        from_name: fn(&str) -> Option<T>,
    ) -> std::result::Result<T, String> {
        match self {
            CodeOrName::Code(code) => {
                from_code(code).ok_or_else(|| format!("unknown {} code {}", kind, code))
            }
            CodeOrName::Name(name) => {
                from_name(&name).ok_or_else(|| format!("unknown {} `{}`", kind, name))
            }
        }
    }
}

/// Remote-control capabilities advertised to the platform media session.
///
/// The declaration order is the stable code order and must never change.
/// Deserializes from either the code or the camelCase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    Play,
    PlayFromId,
    PlayFromSearch,
    Pause,
    Stop,
    SeekTo,
    Skip,
    SkipToNext,
    SkipToPrevious,
    SetRating,
    JumpForward,
    JumpBackward,
}

impl Capability {
    /// Every capability in code order.
    pub const ALL: [Capability; 12] = [
        Capability::Play,
        Capability::PlayFromId,
        Capability::PlayFromSearch,
        Capability::Pause,
        Capability::Stop,
        Capability::SeekTo,
        Capability::Skip,
        Capability::SkipToNext,
        Capability::SkipToPrevious,
        Capability::SetRating,
        Capability::JumpForward,
        Capability::JumpBackward,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    pub fn name(self) -> &'static str {
        match self {
            Capability::Play => "play",
            Capability::PlayFromId => "playFromId",
            Capability::PlayFromSearch => "playFromSearch",
            Capability::Pause => "pause",
            Capability::Stop => "stop",
            Capability::SeekTo => "seekTo",
            Capability::Skip => "skip",
            Capability::SkipToNext => "skipToNext",
            Capability::SkipToPrevious => "skipToPrevious",
            Capability::SetRating => "setRating",
            Capability::JumpForward => "jumpForward",
            Capability::JumpBackward => "jumpBackward",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|capability| capability.name() == name)
    }
}

impl<'de> Deserialize<'de> for Capability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        CodeOrName::deserialize(deserializer)?
            .resolve("capability", Self::from_code, Self::from_name)
            .map_err(de::Error::custom)
    }
}

/// Rating style used by the media session for `set-rating` remote events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RatingType {
    #[default]
    Heart,
    ThumbsUpDown,
    ThreeStars,
    FourStars,
    FiveStars,
    Percentage,
}

impl RatingType {
    pub const ALL: [RatingType; 6] = [
        RatingType::Heart,
        RatingType::ThumbsUpDown,
        RatingType::ThreeStars,
        RatingType::FourStars,
        RatingType::FiveStars,
        RatingType::Percentage,
    ];

    /// Stable code, starting at 1.
    pub fn code(self) -> u8 {
        self as u8 + 1
    }

    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code.saturating_sub(1))
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    pub fn name(self) -> &'static str {
        match self {
            RatingType::Heart => "heart",
            RatingType::ThumbsUpDown => "thumbsUpDown",
            RatingType::ThreeStars => "threeStars",
            RatingType::FourStars => "fourStars",
            RatingType::FiveStars => "fiveStars",
            RatingType::Percentage => "percentage",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|rating| rating.name() == name)
    }
}

impl<'de> Deserialize<'de> for RatingType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        CodeOrName::deserialize(deserializer)?
            .resolve("rating type", Self::from_code, Self::from_name)
            .map_err(de::Error::custom)
    }
}

// ============================================================================
// Engine configuration
// ============================================================================

/// Configuration applied once the engine is bound. Durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub min_buffer_ms: i64,
    pub max_buffer_ms: i64,
    pub play_buffer_ms: i64,
    pub back_buffer_ms: i64,
    /// Disk cache size in KiB; `None` disables caching.
    pub max_cache_size_kib: Option<u64>,
    pub auto_handle_interruptions: bool,
    pub auto_update_metadata: bool,
    /// Android audio attribute content type (`music`, `speech`, ...).
    pub audio_content_type: Option<String>,
}

/// Behaviour when the host app process is killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppKilledPlaybackBehavior {
    ContinuePlayback,
    PausePlayback,
    StopPlaybackAndRemoveNotification,
}

/// Android-only option toggles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_killed_playback_behavior: Option<AppKilledPlaybackBehavior>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_pause_on_interruption: Option<bool>,
    /// Seconds to keep the foreground service alive after pausing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_foreground_grace_period: Option<u32>,
}

/// Runtime option patch forwarded to the engine by `updateOptions`.
///
/// Absent fields leave the engine's current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<Capability>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_capabilities: Option<Vec<Capability>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compact_capabilities: Option<Vec<Capability>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_type: Option<RatingType>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_jump_interval: Option<f64>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backward_jump_interval: Option<f64>,
    /// Seconds between `playback-progress-updated` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_update_event_interval: Option<f64>,
    /// ARGB notification accent colour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android: Option<AndroidOptions>,
}

// ============================================================================
// Media items
// ============================================================================

/// Playable reference of a media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaSource {
    /// Remote or local URI (`https://`, `file://`, `content://`, ...).
    Uri(String),
    /// Bundled raw resource identifier.
    Resource(i64),
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSource::Uri(uri) => f.write_str(uri),
            MediaSource::Resource(id) => write!(f, "resource:{}", id),
        }
    }
}

/// Streaming container hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Default,
    Dash,
    Hls,
    #[serde(rename = "smoothstreaming")]
    SmoothStreaming,
}

/// Display metadata shown on the lock screen / notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlayingMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub artwork: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub date: Option<String>,
    /// Seconds.
    pub duration: Option<f64>,
    /// Opaque rating value interpreted according to the active [`RatingType`].
    pub rating: Option<Value>,
    /// Seconds already played, when the host wants to override the engine.
    pub elapsed_time: Option<f64>,
}

/// Everything the engine needs to render one queue entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    pub source: MediaSource,
    pub media_type: MediaType,
    pub content_type: Option<String>,
    pub user_agent: Option<String>,
    pub headers: HashMap<String, String>,
    pub metadata: NowPlayingMetadata,
}

// ============================================================================
// Engine signals
// ============================================================================

/// Raw playback status reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Loading,
    Buffering,
    Ready,
    Playing,
    Paused,
    Stopped,
}

/// Asynchronous failure raised by the engine while rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineError {
    pub code: String,
    pub message: String,
}

impl EngineError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Metadata found in the rendered stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMetadata {
    /// Chapter markers.
    Chapter(Vec<Value>),
    /// Timed metadata (ICY, ID3 frames at a given position).
    Timed(Vec<Value>),
    /// Common container metadata (title, artist, ...).
    Common(Value),
}

/// Remote-control actions raised by the platform media session.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCommand {
    Play,
    PlayFromId { id: String, extras: Option<Value> },
    PlayFromSearch { query: String, extras: Option<Value> },
    Pause,
    Stop,
    Skip { index: usize },
    Next,
    Previous,
    /// Seconds.
    Seek { position: f64 },
    SetRating { rating: Value },
    /// Seconds.
    JumpForward { interval: f64 },
    /// Seconds.
    JumpBackward { interval: f64 },
    Duck { paused: bool, permanent: bool },
}

/// Everything the engine can report back.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSignal {
    Connected,
    Disconnected,
    StateChanged(EngineState),
    PlayWhenReadyChanged {
        play_when_ready: bool,
        paused_by_interruption: bool,
    },
    /// The rendered item played to its end.
    TrackEnded,
    Error(EngineError),
    Metadata(StreamMetadata),
    Remote(RemoteCommand),
}

/// Write side of the engine's signal stream.
///
/// Cloneable so the engine can hand it to whichever thread raises events.
#[derive(Clone)]
pub struct EngineSignalSink {
    deliver: Arc<dyn Fn(EngineSignal) -> bool + Send + Sync>,
}

impl EngineSignalSink {
    /// Wrap a delivery function. It returns `false` once the receiver is gone.
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(EngineSignal) -> bool + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// Report a signal. Returns `false` if the orchestrator has shut down.
    pub fn emit(&self, signal: EngineSignal) -> bool {
        (self.deliver)(signal)
    }
}

impl fmt::Debug for EngineSignalSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSignalSink").finish_non_exhaustive()
    }
}

// ============================================================================
// Engine trait
// ============================================================================

/// Platform media engine driven by the playback orchestrator.
///
/// Every call is expected to return promptly; long-running work (buffering,
/// decoding) continues inside the engine and is reported through signals.
/// Time values cross this boundary in seconds for commands and milliseconds
/// for queries, matching the native units of the engines this wraps.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait PlaybackEngine: PlatformSendSync {
    /// Start the engine process and bind to it. Completion is reported later
    /// through [`EngineSignal::Connected`] on `signals`.
    async fn connect(&self, config: EngineConfig, signals: EngineSignalSink) -> Result<()>;

    /// Unbind from the engine.
    async fn disconnect(&self) -> Result<()>;

    /// Apply buffer and session configuration once bound.
    async fn configure(&self, config: &EngineConfig) -> Result<()>;

    /// Apply a runtime option patch.
    async fn update_options(&self, options: &PlayerOptions) -> Result<()>;

    /// Switch rendering to `item`. `index` is the queue position it came
    /// from, used only for logging and notification bookkeeping.
    async fn play_item(&self, index: usize, item: &MediaItem) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Re-prepare the current item after a failure.
    async fn retry(&self) -> Result<()>;

    async fn seek_to(&self, seconds: f64) -> Result<()>;

    async fn seek_by(&self, offset_seconds: f64) -> Result<()>;

    async fn set_volume(&self, volume: f32) -> Result<()>;

    async fn volume(&self) -> Result<f32>;

    async fn set_rate(&self, rate: f32) -> Result<()>;

    async fn rate(&self) -> Result<f32>;

    async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()>;

    async fn repeat_mode(&self) -> Result<RepeatMode>;

    async fn set_play_when_ready(&self, play_when_ready: bool) -> Result<()>;

    async fn play_when_ready(&self) -> Result<bool>;

    /// Position of the rendered item in milliseconds.
    async fn position_ms(&self) -> Result<u64>;

    /// Duration of the rendered item in milliseconds, `None` while unknown.
    async fn duration_ms(&self) -> Result<Option<u64>>;

    /// Buffered position of the rendered item in milliseconds.
    async fn buffered_position_ms(&self) -> Result<u64>;

    /// Replace what the notification / lock screen displays.
    async fn update_now_playing(&self, metadata: &NowPlayingMetadata) -> Result<()>;

    /// Remove notification metadata.
    async fn clear_now_playing(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn repeat_mode_codes_are_stable() {
        assert_eq!(RepeatMode::Off.code(), 0);
        assert_eq!(RepeatMode::Track.code(), 1);
        assert_eq!(RepeatMode::Queue.code(), 2);
        assert_eq!(RepeatMode::from_code(2), Some(RepeatMode::Queue));
        assert_eq!(RepeatMode::from_code(7), None);
    }

    #[test]
    fn capability_codes_follow_declaration_order() {
        assert_eq!(Capability::Play.code(), 0);
        assert_eq!(Capability::SkipToNext.code(), 7);
        assert_eq!(Capability::JumpBackward.code(), 11);
        assert_eq!(Capability::from_code(5), Some(Capability::SeekTo));
        assert_eq!(Capability::from_code(-1), None);
        assert_eq!(Capability::from_code(12), None);
    }

    #[test]
    fn rating_codes_start_at_one() {
        assert_eq!(RatingType::Heart.code(), 1);
        assert_eq!(RatingType::Percentage.code(), 6);
        assert_eq!(RatingType::from_code(3), Some(RatingType::ThreeStars));
        assert_eq!(RatingType::from_code(0), None);
    }

    #[test]
    fn player_options_deserialize_camel_case_patch() {
        let options: PlayerOptions = serde_json::from_value(serde_json::json!({
            "capabilities": ["play", "pause", "skipToNext"],
            "progressUpdateEventInterval": 1.5,
            "android": { "appKilledPlaybackBehavior": "stop-playback-and-remove-notification" }
        }))
        .unwrap();

        assert_eq!(
            options.capabilities,
            Some(vec![
                Capability::Play,
                Capability::Pause,
                Capability::SkipToNext
            ])
        );
        assert_eq!(options.progress_update_event_interval, Some(1.5));
        assert_eq!(
            options.android.unwrap().app_killed_playback_behavior,
            Some(AppKilledPlaybackBehavior::StopPlaybackAndRemoveNotification)
        );
        assert!(options.rating_type.is_none());
    }

    #[test]
    fn player_options_accept_integer_codes() {
        let options: PlayerOptions = serde_json::from_value(serde_json::json!({
            "capabilities": [0, 3, 7],
            "compactCapabilities": ["play", 3],
            "ratingType": 5
        }))
        .unwrap();

        assert_eq!(
            options.capabilities,
            Some(vec![
                Capability::Play,
                Capability::Pause,
                Capability::SkipToNext
            ])
        );
        assert_eq!(
            options.compact_capabilities,
            Some(vec![Capability::Play, Capability::Pause])
        );
        assert_eq!(options.rating_type, Some(RatingType::FiveStars));
    }

    #[test]
    fn unknown_codes_are_rejected() {
        let unknown_capability = serde_json::from_value::<PlayerOptions>(
            serde_json::json!({ "capabilities": [12] }),
        );
        assert!(unknown_capability.is_err());

        let unknown_rating =
            serde_json::from_value::<PlayerOptions>(serde_json::json!({ "ratingType": 0 }));
        assert!(unknown_rating.is_err());

        let unknown_name = serde_json::from_value::<PlayerOptions>(
            serde_json::json!({ "ratingType": "tenStars" }),
        );
        assert!(unknown_name.is_err());
    }

    #[test]
    fn names_match_serialized_form() {
        for capability in Capability::ALL {
            assert_eq!(
                serde_json::to_value(capability).unwrap(),
                serde_json::json!(capability.name())
            );
        }
        for rating in RatingType::ALL {
            assert_eq!(
                serde_json::to_value(rating).unwrap(),
                serde_json::json!(rating.name())
            );
        }
    }

    #[test]
    fn signal_sink_reports_delivery() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        let sink = EngineSignalSink::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        assert!(sink.clone().emit(EngineSignal::Connected));
        assert!(sink.emit(EngineSignal::TrackEnded));
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn media_source_display() {
        assert_eq!(MediaSource::Resource(12).to_string(), "resource:12");
        assert_eq!(
            MediaSource::Uri("https://cdn/a.mp3".into()).to_string(),
            "https://cdn/a.mp3"
        );
    }
}
