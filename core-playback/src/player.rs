//! # Command Dispatcher
//!
//! [`TrackPlayer`] is the public operation surface. It is a cheap, cloneable
//! handle: every mutating or transport command is sent to a single worker
//! task that owns the connection gate and applies commands one at a time in
//! submission order. Engine signals are delivered into the same channel, so
//! a state change is never interleaved with a half-applied queue edit.
//!
//! Read-only queries bypass the worker and read the snapshot the worker
//! publishes after each completed command.
//!
//! ```text
//!  TrackPlayer ──Command──┐
//!  EngineSignalSink ─Signal┼──> mpsc ──> Worker ──> PlaybackEngine
//!  progress ticker ──Tick──┘               │
//!                                           ├──> Snapshot (queries)
//!                                           └──> EventBus (subscribers)
//! ```

use crate::constants;
use crate::error::{PlaybackError, Result};
use crate::gate::{Connection, Gate};
use crate::options::{progress_interval, SetupOptions, UpdateOptions};
use crate::queue::{Advance, Queue};
use crate::state::{seconds, PlaybackState, Progress};
use crate::track::Track;

use bridge_traits::playback::{
    EngineSignal, EngineSignalSink, EngineState, NowPlayingMetadata, PlaybackEngine, RatingType,
    RemoteCommand, RepeatMode, StreamMetadata,
};
use bridge_traits::LifecycleObserver;
use core_async::deferred::{self, Resolver};
use core_async::sync::mpsc;
use core_async::task::JoinHandle;
use core_async::time::{self, Duration, RuntimeInstant};
use core_runtime::events::{self, ActiveTrackChange, EventBus, EventStream, PlayerEvent};
use core_runtime::logging::redact_url;
use core_runtime::RuntimeConfig;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// State published by the worker for concurrent readers.
#[derive(Debug, Default)]
struct Snapshot {
    connection: Connection,
    queue: Queue,
    playback: PlaybackState,
}

type Reply<T> = Resolver<Result<T>>;

#[derive(Debug, Clone, Copy)]
enum Transport {
    Play,
    Pause,
    Stop,
    Retry,
    SeekTo(f64),
    SeekBy(f64),
    SetVolume(f32),
    SetRate(f32),
    SetRepeatMode(RepeatMode),
    SetPlayWhenReady(bool),
}

#[derive(Debug)]
enum Command {
    Setup(SetupOptions, Reply<()>),
    UpdateOptions(UpdateOptions, Reply<()>),
    Add {
        tracks: Vec<Value>,
        insert_before: i64,
        reply: Reply<usize>,
    },
    Load(Value, Reply<()>),
    SetQueue(Vec<Value>, Reply<()>),
    Remove(Vec<i64>, Reply<()>),
    Move {
        from: i64,
        to: i64,
        reply: Reply<()>,
    },
    RemoveUpcoming(Reply<()>),
    UpdateMetadata {
        index: i64,
        patch: Value,
        reply: Reply<()>,
    },
    UpdateNowPlaying(NowPlayingMetadata, Reply<()>),
    ClearNowPlaying(Reply<()>),
    Clear(Reply<()>),
    Reset(Reply<()>),
    Skip {
        index: i64,
        initial_time: Option<f64>,
        reply: Reply<()>,
    },
    SkipToNext(Option<f64>, Reply<()>),
    SkipToPrevious(Option<f64>, Reply<()>),
    Transport(Transport, Reply<()>),
}

#[derive(Debug)]
enum Message {
    Command(Command),
    Signal(EngineSignal),
    ProgressTick,
}

// ============================================================================
// Public handle
// ============================================================================

/// Handle to a playback queue orchestrator.
///
/// Created with [`TrackPlayer::new`] inside a Tokio runtime. Clones share the
/// same worker; the worker stops once every handle is dropped.
#[derive(Clone)]
pub struct TrackPlayer {
    commands: mpsc::UnboundedSender<Message>,
    shared: Arc<RwLock<Snapshot>>,
    engine: Arc<dyn PlaybackEngine>,
    events: EventBus,
}

impl std::fmt::Debug for TrackPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.shared.read();
        f.debug_struct("TrackPlayer")
            .field("connection", &snapshot.connection)
            .field("queue_len", &snapshot.queue.len())
            .finish_non_exhaustive()
    }
}

impl TrackPlayer {
    /// Spawn the command worker. Must be called from within a Tokio runtime.
    pub fn new(config: RuntimeConfig) -> Self {
        let (commands, inbox) = mpsc::unbounded_channel();
        let shared = Arc::new(RwLock::new(Snapshot::default()));
        let events = EventBus::new(config.event_buffer_size);

        let worker = Worker {
            engine: Arc::clone(&config.engine),
            lifecycle: config.lifecycle_observer.clone(),
            require_foreground: config.require_foreground_setup,
            settle_delay: config.reset_settle_delay,
            shared: Arc::clone(&shared),
            events: events.clone(),
            gate: Gate::default(),
            inbox,
            outbox: commands.downgrade(),
            backlog: VecDeque::new(),
            resetting: false,
            progress_interval: config.default_progress_interval,
            ticker: None,
            rating_type: RatingType::default(),
        };
        core_async::spawn(worker.run());

        Self {
            commands,
            shared,
            engine: config.engine,
            events,
        }
    }

    /// Subscribe to the outward event channel.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    /// The static constants table.
    pub fn constants() -> Map<String, Value> {
        constants::constants()
    }

    /// `true` once the engine is bound. Never fails.
    pub fn is_connected(&self) -> bool {
        self.shared.read().connection == Connection::Bound
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, pending) = deferred::channel();
        self.commands
            .send(Message::Command(build(reply)))
            .map_err(|_| PlaybackError::Internal("player worker has shut down".to_string()))?;
        pending
            .await
            .map_err(|_| PlaybackError::Internal("player worker dropped the request".to_string()))?
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(PlaybackError::NotInitialized)
        }
    }

    // ------------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------------

    /// Start the engine. Resolves once the engine reports it is connected.
    #[instrument(skip(self))]
    pub async fn setup(&self, options: SetupOptions) -> Result<()> {
        self.request(|reply| Command::Setup(options, reply)).await
    }

    #[instrument(skip(self))]
    pub async fn update_options(&self, options: UpdateOptions) -> Result<()> {
        self.request(|reply| Command::UpdateOptions(options, reply))
            .await
    }

    // ------------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------------

    /// Insert tracks before `insert_before` (`None` or `-1` appends).
    /// Returns the index of the first inserted track.
    #[instrument(skip(self, tracks), fields(count = tracks.len()))]
    pub async fn add(&self, tracks: Vec<Value>, insert_before: Option<i64>) -> Result<usize> {
        self.request(|reply| Command::Add {
            tracks,
            insert_before: insert_before.unwrap_or(-1),
            reply,
        })
        .await
    }

    /// Replace the queue with `track` and start rendering it.
    #[instrument(skip(self, track))]
    pub async fn load(&self, track: Value) -> Result<()> {
        self.request(|reply| Command::Load(track, reply)).await
    }

    /// Replace the queue. The active index becomes undefined.
    #[instrument(skip(self, tracks), fields(count = tracks.len()))]
    pub async fn set_queue(&self, tracks: Vec<Value>) -> Result<()> {
        self.request(|reply| Command::SetQueue(tracks, reply)).await
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, indices: Vec<i64>) -> Result<()> {
        self.request(|reply| Command::Remove(indices, reply)).await
    }

    #[instrument(skip(self))]
    pub async fn move_track(&self, from: i64, to: i64) -> Result<()> {
        self.request(|reply| Command::Move { from, to, reply }).await
    }

    #[instrument(skip(self))]
    pub async fn remove_upcoming_tracks(&self) -> Result<()> {
        self.request(Command::RemoveUpcoming).await
    }

    /// Merge `patch` into the track at `index`.
    #[instrument(skip(self, patch))]
    pub async fn update_metadata_for_track(&self, index: i64, patch: Value) -> Result<()> {
        self.request(|reply| Command::UpdateMetadata {
            index,
            patch,
            reply,
        })
        .await
    }

    /// Show transient metadata without touching the queue entry.
    #[instrument(skip(self, metadata))]
    pub async fn update_now_playing_metadata(&self, metadata: NowPlayingMetadata) -> Result<()> {
        self.request(|reply| Command::UpdateNowPlaying(metadata, reply))
            .await
    }

    #[instrument(skip(self))]
    pub async fn clear_now_playing_metadata(&self) -> Result<()> {
        self.request(Command::ClearNowPlaying).await
    }

    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        self.request(Command::Clear).await
    }

    /// Stop playback, let the stop settle, then clear the queue.
    #[instrument(skip(self))]
    pub async fn reset(&self) -> Result<()> {
        self.request(Command::Reset).await
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn skip(&self, index: i64, initial_time: Option<f64>) -> Result<()> {
        self.request(|reply| Command::Skip {
            index,
            initial_time,
            reply,
        })
        .await
    }

    /// Move to the next track. At the end of the queue this is a no-op
    /// unless the repeat mode wraps.
    #[instrument(skip(self))]
    pub async fn skip_to_next(&self, initial_time: Option<f64>) -> Result<()> {
        self.request(|reply| Command::SkipToNext(initial_time, reply))
            .await
    }

    #[instrument(skip(self))]
    pub async fn skip_to_previous(&self, initial_time: Option<f64>) -> Result<()> {
        self.request(|reply| Command::SkipToPrevious(initial_time, reply))
            .await
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    async fn transport(&self, transport: Transport) -> Result<()> {
        self.request(|reply| Command::Transport(transport, reply))
            .await
    }

    #[instrument(skip(self))]
    pub async fn play(&self) -> Result<()> {
        self.transport(Transport::Play).await
    }

    #[instrument(skip(self))]
    pub async fn pause(&self) -> Result<()> {
        self.transport(Transport::Pause).await
    }

    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        self.transport(Transport::Stop).await
    }

    /// Re-prepare the active item after a failure.
    #[instrument(skip(self))]
    pub async fn retry(&self) -> Result<()> {
        self.transport(Transport::Retry).await
    }

    #[instrument(skip(self))]
    pub async fn seek_to(&self, seconds: f64) -> Result<()> {
        self.transport(Transport::SeekTo(seconds)).await
    }

    #[instrument(skip(self))]
    pub async fn seek_by(&self, offset: f64) -> Result<()> {
        self.transport(Transport::SeekBy(offset)).await
    }

    #[instrument(skip(self))]
    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.transport(Transport::SetVolume(volume)).await
    }

    #[instrument(skip(self))]
    pub async fn set_rate(&self, rate: f32) -> Result<()> {
        self.transport(Transport::SetRate(rate)).await
    }

    #[instrument(skip(self))]
    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.transport(Transport::SetRepeatMode(mode)).await
    }

    #[instrument(skip(self))]
    pub async fn set_play_when_ready(&self, play_when_ready: bool) -> Result<()> {
        self.transport(Transport::SetPlayWhenReady(play_when_ready))
            .await
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub async fn get_volume(&self) -> Result<f32> {
        self.ensure_connected()?;
        Ok(self.engine.volume().await?)
    }

    pub async fn get_rate(&self) -> Result<f32> {
        self.ensure_connected()?;
        Ok(self.engine.rate().await?)
    }

    pub async fn get_repeat_mode(&self) -> Result<RepeatMode> {
        self.ensure_connected()?;
        Ok(self.engine.repeat_mode().await?)
    }

    pub async fn get_play_when_ready(&self) -> Result<bool> {
        self.ensure_connected()?;
        Ok(self.engine.play_when_ready().await?)
    }

    /// Original payload of the track at `index`, `None` when out of range.
    pub fn get_track(&self, index: i64) -> Result<Option<Value>> {
        self.ensure_connected()?;
        Ok(self.shared.read().queue.get(index).map(Track::original_item))
    }

    pub fn get_queue(&self) -> Result<Vec<Value>> {
        self.ensure_connected()?;
        Ok(self
            .shared
            .read()
            .queue
            .tracks()
            .iter()
            .map(Track::original_item)
            .collect())
    }

    pub fn get_active_track_index(&self) -> Result<Option<usize>> {
        self.ensure_connected()?;
        Ok(self.shared.read().queue.active_index())
    }

    pub fn get_active_track(&self) -> Result<Option<Value>> {
        self.ensure_connected()?;
        Ok(self
            .shared
            .read()
            .queue
            .active_track()
            .map(Track::original_item))
    }

    /// Current state and the last engine error since it was entered.
    pub fn get_playback_state(&self) -> Result<PlaybackState> {
        self.ensure_connected()?;
        Ok(self.shared.read().playback.clone())
    }

    /// Position, duration and buffered position in seconds.
    pub async fn get_progress(&self) -> Result<Progress> {
        self.ensure_connected()?;
        read_progress(self.engine.as_ref()).await
    }

    pub async fn get_duration(&self) -> Result<f64> {
        Ok(self.get_progress().await?.duration)
    }

    pub async fn get_position(&self) -> Result<f64> {
        Ok(self.get_progress().await?.position)
    }

    pub async fn get_buffered_position(&self) -> Result<f64> {
        Ok(self.get_progress().await?.buffered)
    }
}

async fn read_progress(engine: &dyn PlaybackEngine) -> Result<Progress> {
    let position = engine.position_ms().await?;
    let duration = engine.duration_ms().await?;
    let buffered = engine.buffered_position_ms().await?;
    Ok(Progress::from_millis(position, duration, buffered))
}

// ============================================================================
// Worker
// ============================================================================

struct Worker {
    engine: Arc<dyn PlaybackEngine>,
    lifecycle: Option<Arc<dyn LifecycleObserver>>,
    require_foreground: bool,
    settle_delay: Duration,
    shared: Arc<RwLock<Snapshot>>,
    events: EventBus,
    gate: Gate,
    inbox: mpsc::UnboundedReceiver<Message>,
    outbox: mpsc::WeakUnboundedSender<Message>,
    /// Commands received while `reset` waits for the engine to stop.
    backlog: VecDeque<Message>,
    /// Suppresses queue advancement while a reset is settling.
    resetting: bool,
    progress_interval: Option<Duration>,
    ticker: Option<JoinHandle<()>>,
    rating_type: RatingType,
}

impl Worker {
    async fn run(mut self) {
        debug!("Player worker started");
        loop {
            let message = match self.backlog.pop_front() {
                Some(message) => message,
                None => match self.inbox.recv().await {
                    Some(message) => message,
                    None => break,
                },
            };
            self.handle(message).await;
        }

        self.stop_ticker();
        if self.gate.is_connected() {
            if let Err(err) = self.engine.disconnect().await {
                warn!(error = %err, "Engine disconnect failed during shutdown");
            }
        }
        debug!("Player worker stopped");
    }

    async fn handle(&mut self, message: Message) {
        match message {
            Message::Command(command) => self.dispatch(command).await,
            Message::Signal(signal) => self.on_signal(signal).await,
            Message::ProgressTick => self.on_progress_tick().await,
        }
    }

    fn emit(&self, event: PlayerEvent) {
        self.events.emit(event).ok();
    }

    fn publish_connection(&self) {
        self.shared.write().connection = self.gate.connection();
    }

    fn signal_sink(&self) -> EngineSignalSink {
        let outbox = self.outbox.clone();
        EngineSignalSink::new(move |signal| {
            outbox
                .upgrade()
                .map_or(false, |tx| tx.send(Message::Signal(signal)).is_ok())
        })
    }

    async fn dispatch(&mut self, command: Command) {
        match command {
            Command::Setup(options, reply) => self.setup(options, reply).await,
            Command::UpdateOptions(options, reply) => {
                reply.settle(self.update_options(options).await);
            }
            Command::Add {
                tracks,
                insert_before,
                reply,
            } => {
                reply.settle(self.add(tracks, insert_before));
            }
            Command::Load(track, reply) => {
                reply.settle(self.load(track).await);
            }
            Command::SetQueue(tracks, reply) => {
                reply.settle(self.set_queue(tracks).await);
            }
            Command::Remove(indices, reply) => {
                reply.settle(self.remove(&indices));
            }
            Command::Move { from, to, reply } => {
                reply.settle(self.move_track(from, to));
            }
            Command::RemoveUpcoming(reply) => {
                reply.settle(self.remove_upcoming());
            }
            Command::UpdateMetadata {
                index,
                patch,
                reply,
            } => {
                reply.settle(self.update_metadata(index, patch).await);
            }
            Command::UpdateNowPlaying(metadata, reply) => {
                reply.settle(self.update_now_playing(metadata).await);
            }
            Command::ClearNowPlaying(reply) => {
                reply.settle(self.clear_now_playing().await);
            }
            Command::Clear(reply) => {
                reply.settle(self.clear());
            }
            Command::Reset(reply) => {
                reply.settle(self.reset().await);
            }
            Command::Skip {
                index,
                initial_time,
                reply,
            } => {
                reply.settle(self.skip(index, initial_time).await);
            }
            Command::SkipToNext(initial_time, reply) => {
                reply.settle(self.skip_relative(true, initial_time).await);
            }
            Command::SkipToPrevious(initial_time, reply) => {
                reply.settle(self.skip_relative(false, initial_time).await);
            }
            Command::Transport(transport, reply) => {
                reply.settle(self.transport(transport).await);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------------

    async fn setup(&mut self, options: SetupOptions, reply: Reply<()>) {
        if let Err(err) = self.gate.ensure_idle() {
            reply.settle(Err(err));
            return;
        }

        if self.require_foreground && !self.is_foreground().await {
            reply.settle(Err(PlaybackError::NotForeground));
            return;
        }

        let config = match options.engine_config() {
            Ok(config) => config,
            Err(err) => {
                reply.settle(Err(err));
                return;
            }
        };

        info!(
            min_buffer_ms = config.min_buffer_ms,
            max_buffer_ms = config.max_buffer_ms,
            "Connecting to playback engine"
        );
        self.gate.begin(config.clone(), reply);
        self.publish_connection();

        if let Err(err) = self.engine.connect(config, self.signal_sink()).await {
            warn!(error = %err, "Engine refused to start");
            if let Some(reply) = self.gate.abort() {
                reply.settle(Err(err.into()));
            }
            self.publish_connection();
        }
    }

    async fn is_foreground(&self) -> bool {
        let Some(observer) = self.lifecycle.as_ref() else {
            return true;
        };
        match observer.get_state().await {
            Ok(state) => state.is_foreground(),
            Err(err) => {
                warn!(error = %err, "Lifecycle state unavailable, assuming foreground");
                true
            }
        }
    }

    async fn on_connected(&mut self) {
        let Some(binding) = self.gate.on_connected() else {
            debug!("Duplicate connection signal ignored");
            return;
        };
        self.publish_connection();
        info!("Playback engine bound");

        let outcome = self
            .engine
            .configure(&binding.config)
            .await
            .map_err(PlaybackError::from);
        if let Err(err) = &outcome {
            warn!(error = %err, "Engine rejected buffer configuration");
        }
        if let Some(reply) = binding.reply {
            reply.settle(outcome);
        }

        self.restart_ticker();
    }

    async fn update_options(&mut self, options: UpdateOptions) -> Result<()> {
        self.gate.ensure_connected()?;
        self.engine.update_options(&options).await?;

        if let Some(rating_type) = options.rating_type {
            self.rating_type = rating_type;
        }
        if let Some(interval) = progress_interval(&options) {
            self.progress_interval = interval;
            self.restart_ticker();
        }
        debug!(rating_type = ?self.rating_type, "Options updated");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------------

    fn add(&mut self, tracks: Vec<Value>, insert_before: i64) -> Result<usize> {
        self.gate.ensure_connected()?;
        let tracks = Track::from_values(tracks)?;
        let count = tracks.len();
        let at = self.shared.write().queue.add(tracks, insert_before)?;
        debug!(count, at, "Tracks added");
        Ok(at)
    }

    async fn load(&mut self, track: Value) -> Result<()> {
        self.gate.ensure_connected()?;
        let track = Track::from_value(track)?;
        let last = self.active_entry().await;
        {
            let mut snapshot = self.shared.write();
            snapshot.queue.clear();
            snapshot.queue.add(vec![track], -1)?;
        }
        self.activate(0, None, last).await
    }

    async fn set_queue(&mut self, tracks: Vec<Value>) -> Result<()> {
        self.gate.ensure_connected()?;
        let tracks = Track::from_values(tracks)?;
        let was_rendering = self.shared.read().queue.active_index().is_some();
        if was_rendering {
            self.engine.stop().await?;
        }
        let mut snapshot = self.shared.write();
        snapshot.queue.clear();
        snapshot.queue.add(tracks, -1)?;
        Ok(())
    }

    fn remove(&mut self, indices: &[i64]) -> Result<()> {
        self.gate.ensure_connected()?;
        let outcome = self.shared.write().queue.remove(indices)?;
        if outcome.active_removed {
            debug!("Active track removed, engine keeps rendering it until it ends");
        }
        Ok(())
    }

    fn move_track(&mut self, from: i64, to: i64) -> Result<()> {
        self.gate.ensure_connected()?;
        self.shared.write().queue.move_track(from, to)
    }

    fn remove_upcoming(&mut self) -> Result<()> {
        self.gate.ensure_connected()?;
        let removed = self.shared.write().queue.remove_upcoming();
        debug!(removed, "Upcoming tracks removed");
        Ok(())
    }

    async fn update_metadata(&mut self, index: i64, patch: Value) -> Result<()> {
        self.gate.ensure_connected()?;
        let (track, is_active) = {
            let mut snapshot = self.shared.write();
            let index_checked = snapshot.queue.validate_index(index)?;
            let track = snapshot.queue.tracks()[index_checked].merged(&patch)?;
            let is_active = snapshot.queue.replace(index, track.clone())?;
            (track, is_active)
        };
        if is_active {
            self.engine.update_now_playing(track.now_playing()).await?;
        }
        Ok(())
    }

    async fn update_now_playing(&mut self, metadata: NowPlayingMetadata) -> Result<()> {
        self.gate.ensure_connected()?;
        if self.shared.read().queue.is_empty() {
            return Err(PlaybackError::NoCurrentItem);
        }
        Ok(self.engine.update_now_playing(&metadata).await?)
    }

    async fn clear_now_playing(&mut self) -> Result<()> {
        self.gate.ensure_connected()?;
        if self.shared.read().queue.is_empty() {
            return Err(PlaybackError::NoCurrentItem);
        }
        Ok(self.engine.clear_now_playing().await?)
    }

    fn clear(&mut self) -> Result<()> {
        self.gate.ensure_connected()?;
        self.shared.write().queue.clear();
        Ok(())
    }

    async fn reset(&mut self) -> Result<()> {
        self.gate.ensure_connected()?;
        self.engine.stop().await?;

        self.resetting = true;
        self.await_stop().await;
        self.resetting = false;

        self.shared.write().queue.clear();
        debug!("Player reset");
        Ok(())
    }

    /// Process engine signals until the engine confirms it stopped or the
    /// settle delay elapses. Other commands wait in the backlog.
    async fn await_stop(&mut self) {
        let deadline = RuntimeInstant::now() + self.settle_delay;
        loop {
            let message = match time::timeout_at(deadline, self.inbox.recv()).await {
                Ok(Some(message)) => message,
                Ok(None) => return,
                Err(_) => {
                    debug!("No stop acknowledgment before settle delay");
                    return;
                }
            };
            match message {
                Message::Signal(signal) => {
                    let stopped = matches!(
                        signal,
                        EngineSignal::StateChanged(EngineState::Stopped | EngineState::Idle)
                    );
                    self.on_signal(signal).await;
                    if stopped {
                        return;
                    }
                }
                Message::ProgressTick => {}
                command @ Message::Command(_) => self.backlog.push_back(command),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    async fn skip(&mut self, index: i64, initial_time: Option<f64>) -> Result<()> {
        self.gate.ensure_connected()?;
        let index = self.shared.read().queue.validate_index(index)?;
        let last = self.active_entry().await;
        self.activate(index, initial_time, last).await
    }

    async fn skip_relative(&mut self, forward: bool, initial_time: Option<f64>) -> Result<()> {
        self.gate.ensure_connected()?;
        let repeat = self.engine.repeat_mode().await?;
        let target = {
            let snapshot = self.shared.read();
            if forward {
                snapshot.queue.next_index(repeat)
            } else {
                snapshot.queue.previous_index(repeat)
            }
        };
        match target {
            Some(index) => {
                let last = self.active_entry().await;
                self.activate(index, initial_time, last).await
            }
            None => {
                debug!(forward, "No track in that direction");
                Ok(())
            }
        }
    }

    /// Index, payload and position of the track being left.
    async fn active_entry(&self) -> (Option<usize>, Option<Value>, f64) {
        let (index, track) = {
            let snapshot = self.shared.read();
            (
                snapshot.queue.active_index(),
                snapshot.queue.active_track().map(Track::original_item),
            )
        };
        (index, track, self.position_seconds().await)
    }

    async fn position_seconds(&self) -> f64 {
        match self.engine.position_ms().await {
            Ok(position) => seconds(position),
            Err(err) => {
                debug!(error = %err, "Engine position unavailable");
                0.0
            }
        }
    }

    /// Render the track at `index` and publish the change.
    async fn activate(
        &mut self,
        index: usize,
        initial_time: Option<f64>,
        (last_index, last_track, last_position): (Option<usize>, Option<Value>, f64),
    ) -> Result<()> {
        let (item, track) = {
            let snapshot = self.shared.read();
            let track = snapshot
                .queue
                .tracks()
                .get(index)
                .ok_or_else(|| PlaybackError::out_of_bounds(index, snapshot.queue.len()))?;
            (track.to_media_item(), track.original_item())
        };

        debug!(index, source = %redact_url(&item.source.to_string()), "Rendering track");
        self.engine.play_item(index, &item).await?;
        self.shared.write().queue.set_active(index as i64)?;

        if let Some(position) = initial_time.filter(|time| *time >= 0.0) {
            self.engine.seek_to(position).await?;
        }

        self.emit(PlayerEvent::ActiveTrackChanged(ActiveTrackChange {
            last_index,
            last_track,
            last_position,
            index: Some(index),
            track: Some(track),
        }));
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    async fn transport(&mut self, transport: Transport) -> Result<()> {
        self.gate.ensure_connected()?;
        let engine = self.engine.as_ref();
        match transport {
            Transport::Play => engine.play().await?,
            Transport::Pause => engine.pause().await?,
            Transport::Stop => engine.stop().await?,
            Transport::Retry => engine.retry().await?,
            Transport::SeekTo(position) => engine.seek_to(position).await?,
            Transport::SeekBy(offset) => engine.seek_by(offset).await?,
            Transport::SetVolume(volume) => engine.set_volume(volume).await?,
            Transport::SetRate(rate) => engine.set_rate(rate).await?,
            Transport::SetRepeatMode(mode) => engine.set_repeat_mode(mode).await?,
            Transport::SetPlayWhenReady(value) => engine.set_play_when_ready(value).await?,
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Engine signals
    // ------------------------------------------------------------------------

    async fn on_signal(&mut self, signal: EngineSignal) {
        match signal {
            EngineSignal::Connected => self.on_connected().await,
            EngineSignal::Disconnected => {
                if self.gate.on_disconnected() {
                    self.publish_connection();
                    self.stop_ticker();
                    warn!("Playback engine disconnected");
                }
            }
            EngineSignal::StateChanged(state) => {
                let state = self.shared.write().playback.enter(state);
                self.emit(PlayerEvent::State {
                    state: state.as_str(),
                });
            }
            EngineSignal::PlayWhenReadyChanged {
                play_when_ready,
                paused_by_interruption,
            } => self.emit(PlayerEvent::PlayWhenReadyChanged {
                play_when_ready,
                paused_by_interruption,
            }),
            EngineSignal::TrackEnded => self.on_track_ended().await,
            EngineSignal::Error(error) => {
                warn!(code = %error.code, message = %error.message, "Engine reported an error");
                self.shared.write().playback.fail(error.clone());
                self.emit(PlayerEvent::Error {
                    code: error.code,
                    message: error.message,
                });
            }
            EngineSignal::Metadata(metadata) => self.on_metadata(metadata),
            EngineSignal::Remote(command) => self.emit(remote_event(command)),
        }
    }

    async fn on_track_ended(&mut self) {
        if self.resetting {
            debug!("Track end during reset ignored");
            return;
        }

        let repeat = match self.engine.repeat_mode().await {
            Ok(mode) => mode,
            Err(err) => {
                warn!(error = %err, "Repeat mode unavailable, treating as off");
                RepeatMode::Off
            }
        };

        let advance = self.shared.read().queue.after_track_end(repeat);
        match advance {
            Advance::Play(index) => {
                let last = self.active_entry().await;
                if let Err(err) = self.activate(index, None, last).await {
                    warn!(error = %err, index, "Could not advance to next track");
                    self.emit(PlayerEvent::Error {
                        code: err.code().to_string(),
                        message: err.to_string(),
                    });
                }
            }
            Advance::Ended => {
                let track = self.shared.read().queue.active_index();
                let position = self.position_seconds().await;
                info!(?track, "Queue ended");
                self.emit(PlayerEvent::QueueEnded { track, position });
            }
            Advance::Idle => debug!("Track end with nothing active ignored"),
        }
    }

    fn on_metadata(&self, metadata: StreamMetadata) {
        match metadata {
            StreamMetadata::Chapter(entries) => self.emit(PlayerEvent::ChapterMetadata(entries)),
            StreamMetadata::Timed(entries) => {
                let first = entries.first().cloned();
                self.emit(PlayerEvent::TimedMetadata(entries));
                if let Some(first) = first {
                    self.emit(PlayerEvent::PlaybackMetadata(first));
                }
            }
            StreamMetadata::Common(value) => self.emit(PlayerEvent::CommonMetadata(value)),
        }
    }

    // ------------------------------------------------------------------------
    // Progress
    // ------------------------------------------------------------------------

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    fn restart_ticker(&mut self) {
        self.stop_ticker();
        let Some(period) = self.progress_interval else {
            return;
        };
        if !self.gate.is_connected() {
            return;
        }

        let outbox = self.outbox.clone();
        self.ticker = Some(core_async::spawn(async move {
            let mut interval = time::delayed_interval(period);
            loop {
                interval.tick().await;
                let delivered = outbox
                    .upgrade()
                    .map_or(false, |tx| tx.send(Message::ProgressTick).is_ok());
                if !delivered {
                    break;
                }
            }
        }));
    }

    async fn on_progress_tick(&mut self) {
        if !self.gate.is_connected() {
            return;
        }
        let active = self.shared.read().queue.active_index();
        let Some(track) = active else {
            return;
        };
        match read_progress(self.engine.as_ref()).await {
            Ok(progress) => self.emit(PlayerEvent::ProgressUpdated(events::Progress {
                position: progress.position,
                duration: progress.duration,
                buffered: progress.buffered,
                track,
            })),
            Err(err) => debug!(error = %err, "Progress unavailable"),
        }
    }
}

fn remote_event(command: RemoteCommand) -> PlayerEvent {
    match command {
        RemoteCommand::Play => PlayerEvent::RemotePlay,
        RemoteCommand::PlayFromId { id, extras } => PlayerEvent::RemotePlayId { id, extras },
        RemoteCommand::PlayFromSearch { query, extras } => {
            PlayerEvent::RemotePlaySearch { query, extras }
        }
        RemoteCommand::Pause => PlayerEvent::RemotePause,
        RemoteCommand::Stop => PlayerEvent::RemoteStop,
        RemoteCommand::Skip { index } => PlayerEvent::RemoteSkip { index },
        RemoteCommand::Next => PlayerEvent::RemoteNext,
        RemoteCommand::Previous => PlayerEvent::RemotePrevious,
        RemoteCommand::Seek { position } => PlayerEvent::RemoteSeek { position },
        RemoteCommand::SetRating { rating } => PlayerEvent::RemoteSetRating { rating },
        RemoteCommand::JumpForward { interval } => PlayerEvent::RemoteJumpForward { interval },
        RemoteCommand::JumpBackward { interval } => PlayerEvent::RemoteJumpBackward { interval },
        RemoteCommand::Duck { paused, permanent } => PlayerEvent::RemoteDuck { paused, permanent },
    }
}
