//! # Player Event Bus
//!
//! The single outward channel of the playback orchestrator, built on
//! `tokio::sync::broadcast`. Remote-control presses and playback
//! notifications travel on the same channel so subscribers observe them in
//! the order the engine raised them.
//!
//! ## Overview
//!
//! - [`PlayerEvent`]: typed events, each with a stable wire name
//!   ([`PlayerEvent::name`]) and an optional JSON payload
//!   ([`PlayerEvent::payload`])
//! - [`EventBus`]: fan-out publisher shared by the orchestrator
//! - [`EventStream`]: receiver wrapper with name-based filtering
//!
//! ```text
//!  engine signals ──┐
//!                   ├──> worker ──emit──> EventBus ──subscribe──> host bridge
//!  app commands  ───┘                              └─subscribe──> UI model
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, EventStream, PlayerEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(64);
//! let mut stream = EventStream::new(bus.subscribe()).only(&["remote-play", "remote-pause"]);
//!
//! bus.emit(PlayerEvent::RemotePlay).ok();
//! assert_eq!(stream.recv().await.unwrap().name(), "remote-play");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events. Non-fatal.
//! - **`RecvError::Closed`**: every publisher is gone; the player was dropped.
//!
//! Publishing with no subscribers returns an error. The orchestrator ignores
//! it with `.ok()`: an event nobody listens to is not a failure.

use serde_json::{json, Map, Value};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Progress ticks arrive at most a few times per second, so this leaves room
/// for bursts of queue edits without lagging a slow bridge.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Stable event names.
pub mod names {
    pub const REMOTE_PLAY: &str = "remote-play";
    pub const REMOTE_PLAY_ID: &str = "remote-play-id";
    pub const REMOTE_PLAY_SEARCH: &str = "remote-play-search";
    pub const REMOTE_PAUSE: &str = "remote-pause";
    pub const REMOTE_STOP: &str = "remote-stop";
    pub const REMOTE_SKIP: &str = "remote-skip";
    pub const REMOTE_NEXT: &str = "remote-next";
    pub const REMOTE_PREVIOUS: &str = "remote-previous";
    pub const REMOTE_SEEK: &str = "remote-seek";
    pub const REMOTE_SET_RATING: &str = "remote-set-rating";
    pub const REMOTE_JUMP_FORWARD: &str = "remote-jump-forward";
    pub const REMOTE_JUMP_BACKWARD: &str = "remote-jump-backward";
    pub const REMOTE_DUCK: &str = "remote-duck";

    pub const PLAYBACK_PLAY_WHEN_READY_CHANGED: &str = "playback-play-when-ready-changed";
    pub const PLAYBACK_STATE: &str = "playback-state";
    pub const PLAYBACK_ACTIVE_TRACK_CHANGED: &str = "playback-active-track-changed";
    pub const PLAYBACK_QUEUE_ENDED: &str = "playback-queue-ended";
    pub const PLAYBACK_METADATA: &str = "playback-metadata-received";
    pub const PLAYBACK_PROGRESS_UPDATED: &str = "playback-progress-updated";
    pub const PLAYBACK_ERROR: &str = "playback-error";

    pub const METADATA_CHAPTER_RECEIVED: &str = "metadata-chapter-received";
    pub const METADATA_TIMED_RECEIVED: &str = "metadata-timed-received";
    pub const METADATA_COMMON_RECEIVED: &str = "metadata-common-received";
}

// ============================================================================
// Player Events
// ============================================================================

/// Track change notification.
///
/// Tracks are the caller's original payloads; indices are queue positions at
/// the moment of the change. Positions are seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTrackChange {
    pub last_index: Option<usize>,
    pub last_track: Option<Value>,
    pub last_position: f64,
    pub index: Option<usize>,
    pub track: Option<Value>,
}

/// Periodic progress snapshot, all values in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub position: f64,
    pub duration: f64,
    pub buffered: f64,
    /// Active queue index the snapshot was taken for.
    pub track: usize,
}

/// Every event the orchestrator publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    // Remote-control events
    RemotePlay,
    RemotePlayId { id: String, extras: Option<Value> },
    RemotePlaySearch { query: String, extras: Option<Value> },
    RemotePause,
    RemoteStop,
    RemoteSkip { index: usize },
    RemoteNext,
    RemotePrevious,
    RemoteSeek { position: f64 },
    RemoteSetRating { rating: Value },
    RemoteJumpForward { interval: f64 },
    RemoteJumpBackward { interval: f64 },
    RemoteDuck { paused: bool, permanent: bool },

    // Playback events
    PlayWhenReadyChanged {
        play_when_ready: bool,
        paused_by_interruption: bool,
    },
    /// Carries the wire string of the new state (`"playing"`, `"paused"`, ...).
    State { state: &'static str },
    ActiveTrackChanged(ActiveTrackChange),
    QueueEnded { track: Option<usize>, position: f64 },
    /// Legacy stream-metadata notification mirroring the first timed entry.
    PlaybackMetadata(Value),
    ProgressUpdated(Progress),
    Error { code: String, message: String },

    // Stream metadata
    ChapterMetadata(Vec<Value>),
    TimedMetadata(Vec<Value>),
    CommonMetadata(Value),
}

impl PlayerEvent {
    /// Stable event name used by subscribers to filter the channel.
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::RemotePlay => names::REMOTE_PLAY,
            PlayerEvent::RemotePlayId { .. } => names::REMOTE_PLAY_ID,
            PlayerEvent::RemotePlaySearch { .. } => names::REMOTE_PLAY_SEARCH,
            PlayerEvent::RemotePause => names::REMOTE_PAUSE,
            PlayerEvent::RemoteStop => names::REMOTE_STOP,
            PlayerEvent::RemoteSkip { .. } => names::REMOTE_SKIP,
            PlayerEvent::RemoteNext => names::REMOTE_NEXT,
            PlayerEvent::RemotePrevious => names::REMOTE_PREVIOUS,
            PlayerEvent::RemoteSeek { .. } => names::REMOTE_SEEK,
            PlayerEvent::RemoteSetRating { .. } => names::REMOTE_SET_RATING,
            PlayerEvent::RemoteJumpForward { .. } => names::REMOTE_JUMP_FORWARD,
            PlayerEvent::RemoteJumpBackward { .. } => names::REMOTE_JUMP_BACKWARD,
            PlayerEvent::RemoteDuck { .. } => names::REMOTE_DUCK,
            PlayerEvent::PlayWhenReadyChanged { .. } => names::PLAYBACK_PLAY_WHEN_READY_CHANGED,
            PlayerEvent::State { .. } => names::PLAYBACK_STATE,
            PlayerEvent::ActiveTrackChanged(_) => names::PLAYBACK_ACTIVE_TRACK_CHANGED,
            PlayerEvent::QueueEnded { .. } => names::PLAYBACK_QUEUE_ENDED,
            PlayerEvent::PlaybackMetadata(_) => names::PLAYBACK_METADATA,
            PlayerEvent::ProgressUpdated(_) => names::PLAYBACK_PROGRESS_UPDATED,
            PlayerEvent::Error { .. } => names::PLAYBACK_ERROR,
            PlayerEvent::ChapterMetadata(_) => names::METADATA_CHAPTER_RECEIVED,
            PlayerEvent::TimedMetadata(_) => names::METADATA_TIMED_RECEIVED,
            PlayerEvent::CommonMetadata(_) => names::METADATA_COMMON_RECEIVED,
        }
    }

    /// JSON payload handed to the application layer, `None` for bare events.
    pub fn payload(&self) -> Option<Value> {
        let payload = match self {
            PlayerEvent::RemotePlay
            | PlayerEvent::RemotePause
            | PlayerEvent::RemoteStop
            | PlayerEvent::RemoteNext
            | PlayerEvent::RemotePrevious => return None,
            PlayerEvent::RemotePlayId { id, extras } => with_extras(json!({ "id": id }), extras),
            PlayerEvent::RemotePlaySearch { query, extras } => {
                with_extras(json!({ "query": query }), extras)
            }
            PlayerEvent::RemoteSkip { index } => json!({ "index": index }),
            PlayerEvent::RemoteSeek { position } => json!({ "position": position }),
            PlayerEvent::RemoteSetRating { rating } => json!({ "rating": rating }),
            PlayerEvent::RemoteJumpForward { interval }
            | PlayerEvent::RemoteJumpBackward { interval } => json!({ "interval": interval }),
            PlayerEvent::RemoteDuck { paused, permanent } => {
                json!({ "paused": paused, "permanent": permanent })
            }
            PlayerEvent::PlayWhenReadyChanged {
                play_when_ready,
                paused_by_interruption,
            } => json!({
                "playWhenReady": play_when_ready,
                "pausedByInterruption": paused_by_interruption,
            }),
            PlayerEvent::State { state } => json!({ "state": state }),
            PlayerEvent::ActiveTrackChanged(change) => json!({
                "lastIndex": change.last_index,
                "lastTrack": change.last_track,
                "lastPosition": change.last_position,
                "index": change.index,
                "track": change.track,
            }),
            PlayerEvent::QueueEnded { track, position } => {
                json!({ "track": track, "position": position })
            }
            PlayerEvent::PlaybackMetadata(metadata) => metadata.clone(),
            PlayerEvent::ProgressUpdated(progress) => json!({
                "position": progress.position,
                "duration": progress.duration,
                "buffered": progress.buffered,
                "track": progress.track,
            }),
            PlayerEvent::Error { code, message } => json!({ "code": code, "message": message }),
            PlayerEvent::ChapterMetadata(entries) | PlayerEvent::TimedMetadata(entries) => {
                json!({ "metadata": entries })
            }
            PlayerEvent::CommonMetadata(metadata) => json!({ "metadata": metadata }),
        };
        Some(payload)
    }

    /// `true` for events raised by the platform media session.
    pub fn is_remote(&self) -> bool {
        self.name().starts_with("remote-")
    }
}

fn with_extras(base: Value, extras: &Option<Value>) -> Value {
    let mut object = match base {
        Value::Object(object) => object,
        _ => Map::new(),
    };
    if let Some(Value::Object(extra)) = extras {
        for (key, value) in extra {
            object.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    Value::Object(object)
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast publisher for [`PlayerEvent`]s.
///
/// Cloning shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    /// Creates an event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received it, or an error when
    /// nobody is subscribed.
    pub fn emit(&self, event: PlayerEvent) -> Result<usize, SendError<PlayerEvent>> {
        self.sender.send(event)
    }

    /// Creates a receiver for all future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&PlayerEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with optional filtering.
pub struct EventStream {
    receiver: Receiver<PlayerEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<PlayerEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only yield events matching `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PlayerEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only yield events whose [`PlayerEvent::name`] is in `names`.
    pub fn only(self, names: &[&'static str]) -> Self {
        let names = names.to_vec();
        self.filter(move |event| names.contains(&event.name()))
    }

    fn accepts(&self, event: &PlayerEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once the bus is gone.
    pub async fn recv(&mut self) -> Result<PlayerEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without waiting.
    ///
    /// Returns `None` if nothing matching is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<PlayerEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(PlayerEvent::RemotePlay).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = PlayerEvent::State { state: "playing" };
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_events_arrive_in_publish_order() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());

        bus.emit(PlayerEvent::State { state: "loading" }).ok();
        bus.emit(PlayerEvent::RemotePause).ok();
        bus.emit(PlayerEvent::State { state: "paused" }).ok();

        let received: Vec<_> = (0..3)
            .map(|_| stream.try_recv().unwrap().unwrap().name())
            .collect();
        assert_eq!(
            received,
            vec![names::PLAYBACK_STATE, names::REMOTE_PAUSE, names::PLAYBACK_STATE]
        );
    }

    #[tokio::test]
    async fn test_event_stream_only_names() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).only(&[names::PLAYBACK_QUEUE_ENDED]);

        bus.emit(PlayerEvent::RemoteNext).ok();
        bus.emit(PlayerEvent::QueueEnded {
            track: Some(2),
            position: 181.5,
        })
        .ok();

        let received = stream.recv().await.unwrap();
        assert_eq!(received.name(), names::PLAYBACK_QUEUE_ENDED);
        assert_eq!(
            received.payload(),
            Some(json!({ "track": 2, "position": 181.5 }))
        );
    }

    #[tokio::test]
    async fn test_remote_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe()).filter(PlayerEvent::is_remote);

        bus.emit(PlayerEvent::State { state: "ready" }).ok();
        bus.emit(PlayerEvent::RemoteSeek { position: 12.0 }).ok();

        assert_eq!(
            stream.recv().await.unwrap(),
            PlayerEvent::RemoteSeek { position: 12.0 }
        );
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for index in 0..5 {
            bus.emit(PlayerEvent::RemoteSkip { index }).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_active_track_changed_payload() {
        let event = PlayerEvent::ActiveTrackChanged(ActiveTrackChange {
            last_index: Some(0),
            last_track: Some(json!({ "url": "a.mp3" })),
            last_position: 12.5,
            index: Some(1),
            track: Some(json!({ "url": "b.mp3", "title": "B" })),
        });

        assert_eq!(event.name(), "playback-active-track-changed");
        assert_eq!(
            event.payload().unwrap(),
            json!({
                "lastIndex": 0,
                "lastTrack": { "url": "a.mp3" },
                "lastPosition": 12.5,
                "index": 1,
                "track": { "url": "b.mp3", "title": "B" },
            })
        );
    }

    #[test]
    fn test_play_from_id_merges_extras_without_overriding_id() {
        let event = PlayerEvent::RemotePlayId {
            id: "song-9".to_string(),
            extras: Some(json!({ "id": "ignored", "source": "assistant" })),
        };

        assert_eq!(
            event.payload().unwrap(),
            json!({ "id": "song-9", "source": "assistant" })
        );
    }

    #[test]
    fn test_bare_events_have_no_payload() {
        assert!(PlayerEvent::RemotePlay.payload().is_none());
        assert!(PlayerEvent::RemotePrevious.payload().is_none());
        assert!(PlayerEvent::RemoteStop.is_remote());
        assert!(!PlayerEvent::State { state: "none" }.is_remote());
    }

    #[test]
    fn test_progress_payload() {
        let event = PlayerEvent::ProgressUpdated(Progress {
            position: 3.0,
            duration: 200.0,
            buffered: 40.0,
            track: 4,
        });
        assert_eq!(
            event.payload().unwrap(),
            json!({ "position": 3.0, "duration": 200.0, "buffered": 40.0, "track": 4 })
        );
    }
}
