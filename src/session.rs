//! The engine session and the worker thread that owns it.
//!
//! Only the worker ever touches the engine. The UI sends [`PlayerRequest`]s
//! and drains [`PlayerEvent`]s; requests are handled strictly in order, so a
//! poll tick always finishes before an open or close replaces the session.

use crate::{
    engine::{EngineFactory, MediaEngine, MediaSource, PlaybackState, TrackDescriptor, TrackKind},
    error::PlayerError,
    sync::PositionSample,
    tags::{self, TrackTags},
    transport::TransportCommand,
};
use std::{
    path::Path,
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tracing::{debug, error, info, warn};

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "aac", "flac", "ogg", "m4a", "opus"];

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn of(source: &MediaSource) -> Self {
        let is_audio = source
            .as_path()
            .and_then(Path::extension)
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                AUDIO_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            });
        if is_audio {
            MediaKind::Audio
        } else {
            MediaKind::Video
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MediaInfo {
    pub session_id: u64,
    pub source: MediaSource,
    pub display_name: String,
    pub kind: MediaKind,
    pub tags: TrackTags,
    pub duration: Duration,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlayerRequest {
    Open { source: MediaSource, autoplay: bool },
    Close,
    Transport(TransportCommand),
    SelectTrack { kind: TrackKind, id: i64 },
    SetPollInterval(Duration),
    Shutdown,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    Opened(MediaInfo),
    Closed,
    State(PlaybackState),
    /// The engine learned (or revised) the total duration.
    Duration(Duration),
    Position(PositionSample),
    Tracks {
        audio: Vec<TrackDescriptor>,
        subtitle: Vec<TrackDescriptor>,
    },
    EndOfMedia,
    Failed(PlayerError),
}

/// One loaded media item. Dropping it releases the engine exactly once.
struct Session {
    id: u64,
    engine: Box<dyn MediaEngine>,
    duration: Duration,
    audio_tracks: Vec<TrackDescriptor>,
    subtitle_tracks: Vec<TrackDescriptor>,
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!(session = self.id, "Releasing engine session");
        self.engine.release();
    }
}

/// The worker's state, without the thread. Everything here runs on whichever
/// thread owns the `Player`.
pub struct Player {
    factory: EngineFactory,
    session: Option<Session>,
    last_state: PlaybackState,
    next_session_id: u64,
    rate: f64,
    volume: f64,
}

impl Player {
    pub fn new(factory: EngineFactory, volume: f64) -> Self {
        Self {
            factory,
            session: None,
            last_state: PlaybackState::Unknown,
            next_session_id: 1,
            rate: 1.0,
            volume: volume.clamp(0.0, 100.0),
        }
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn handle(&mut self, request: PlayerRequest) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        match request {
            PlayerRequest::Open { source, autoplay } => self.open(source, autoplay, &mut events),
            PlayerRequest::Close => {
                if self.close() {
                    events.push(PlayerEvent::Closed);
                }
            }
            PlayerRequest::Transport(command) => self.apply(command, &mut events),
            PlayerRequest::SelectTrack { kind, id } => {
                if let Some(session) = self.session.as_mut() {
                    if let Err(err) = session.engine.select_track(kind, id) {
                        warn!("{err}");
                        events.push(PlayerEvent::Failed(err));
                    }
                }
            }
            PlayerRequest::SetPollInterval(_) | PlayerRequest::Shutdown => {}
        }
        events
    }

    /// One poll tick: state changes, end of media, duration changes, and a
    /// position sample while playing.
    pub fn tick(&mut self) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        if self.session.is_none() {
            return events;
        }
        self.refresh_state(&mut events);
        self.refresh_duration(&mut events);
        self.refresh_tracks(&mut events);

        if self.last_state == PlaybackState::Playing {
            if let Some(session) = self.session.as_ref() {
                events.push(PlayerEvent::Position(PositionSample::new(
                    session.engine.current_time(),
                    session.engine.duration(),
                )));
            }
        }
        events
    }

    /// Releases the current session. Returns whether there was one.
    pub fn close(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        info!(session = session.id, "Closing media");
        drop(session);
        self.last_state = PlaybackState::Unknown;
        true
    }

    fn open(&mut self, source: MediaSource, autoplay: bool, events: &mut Vec<PlayerEvent>) {
        // The old session must be gone before the next engine exists.
        if self.close() {
            events.push(PlayerEvent::Closed);
        }

        let mut engine = match (self.factory)() {
            Ok(engine) => engine,
            Err(err) => {
                error!("{err}");
                events.push(PlayerEvent::Failed(err));
                return;
            }
        };

        if let Err(err) = engine.load(&source) {
            error!("{err}");
            engine.release();
            events.push(PlayerEvent::Failed(err));
            return;
        }

        if let Err(err) = engine.set_volume(self.volume) {
            warn!("{err}");
        }
        if let Err(err) = engine.set_rate(self.rate) {
            warn!("{err}");
        }

        let id = self.next_session_id;
        self.next_session_id += 1;

        let kind = MediaKind::of(&source);
        let tags = match (kind, source.as_path()) {
            (MediaKind::Audio, Some(path)) => tags::read_tags_or_default(path),
            _ => TrackTags::default(),
        };

        let info = MediaInfo {
            session_id: id,
            display_name: source.display_name(),
            duration: engine.duration(),
            source,
            kind,
            tags,
        };
        info!(session = id, source = %info.source, "Opened media");

        self.session = Some(Session {
            id,
            engine,
            duration: info.duration,
            audio_tracks: Vec::new(),
            subtitle_tracks: Vec::new(),
        });
        self.last_state = PlaybackState::Stopped;
        events.push(PlayerEvent::Opened(info));
        self.refresh_tracks(events);

        if autoplay {
            self.apply(TransportCommand::Play, events);
        }
    }

    fn apply(&mut self, command: TransportCommand, events: &mut Vec<PlayerEvent>) {
        match command {
            TransportCommand::SetRate(rate) => self.rate = rate,
            TransportCommand::SetVolume(volume) => self.volume = volume.clamp(0.0, 100.0),
            _ => {}
        }

        let Some(session) = self.session.as_mut() else {
            debug!(command = command.name(), "No media loaded, ignoring");
            return;
        };
        let engine = &mut session.engine;

        let result = match command {
            TransportCommand::Play => engine.play(),
            TransportCommand::Pause => engine.pause(),
            TransportCommand::Stop => engine.stop(),
            TransportCommand::SeekTo(target) => {
                let total = engine.duration();
                let target = if total.is_zero() { target } else { target.min(total) };
                engine.seek(target)
            }
            TransportCommand::SetRate(rate) => engine.set_rate(rate),
            TransportCommand::SetVolume(volume) => engine.set_volume(volume),
        };

        if let Err(err) = result {
            warn!("{err}");
            events.push(PlayerEvent::Failed(err));
        }
        self.refresh_state(events);
    }

    fn refresh_state(&mut self, events: &mut Vec<PlayerEvent>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let state = session.engine.state();
        if state == self.last_state {
            return;
        }
        debug!(from = self.last_state.as_str(), to = state.as_str(), "Engine state changed");
        self.last_state = state;
        events.push(PlayerEvent::State(state));

        if state == PlaybackState::Ended {
            if let Err(err) = session.engine.stop() {
                warn!("Stop at end of media failed: {err}");
            }
            if let Err(err) = session.engine.seek(Duration::ZERO) {
                warn!("Rewind at end of media failed: {err}");
            }
            events.push(PlayerEvent::EndOfMedia);

            let after = session.engine.state();
            if after != self.last_state {
                self.last_state = after;
                events.push(PlayerEvent::State(after));
            }
        }
    }

    // Some engines only know the duration once loading finishes in the background.
    fn refresh_duration(&mut self, events: &mut Vec<PlayerEvent>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let duration = session.engine.duration();
        if duration == session.duration {
            return;
        }
        debug!(session = session.id, secs = duration.as_secs_f64(), "Duration changed");
        session.duration = duration;
        events.push(PlayerEvent::Duration(duration));
    }

    fn refresh_tracks(&mut self, events: &mut Vec<PlayerEvent>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let audio = session.engine.audio_tracks();
        let subtitle = session.engine.subtitle_tracks();
        if audio == session.audio_tracks && subtitle == session.subtitle_tracks {
            return;
        }
        session.audio_tracks = audio.clone();
        session.subtitle_tracks = subtitle.clone();
        events.push(PlayerEvent::Tracks { audio, subtitle });
    }
}

/// UI-side handle to the worker thread.
pub struct PlayerHandle {
    request_tx: Sender<PlayerRequest>,
    event_rx: Receiver<PlayerEvent>,
    join: Option<JoinHandle<()>>,
}

impl PlayerHandle {
    /// Starts the worker. `wake` runs after every batch of events so the UI
    /// thread can pick them up (e.g. `egui::Context::request_repaint`).
    pub fn spawn<F>(
        factory: EngineFactory,
        volume: f64,
        poll_interval: Duration,
        wake: F,
    ) -> std::io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        let join = thread::Builder::new()
            .name("flickwav-player".into())
            .spawn(move || {
                let player = Player::new(factory, volume);
                run_worker(player, request_rx, event_tx, poll_interval, wake);
            })?;

        Ok(Self {
            request_tx,
            event_rx,
            join: Some(join),
        })
    }

    /// Returns false once the worker is gone.
    pub fn send(&self, request: PlayerRequest) -> bool {
        self.request_tx.send(request).is_ok()
    }

    /// Everything the worker produced since the last call, in order.
    pub fn drain(&self) -> Vec<PlayerEvent> {
        self.event_rx.try_iter().collect()
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        let _ = self.request_tx.send(PlayerRequest::Shutdown);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!("Player worker panicked");
            }
        }
    }
}

fn run_worker<F>(
    mut player: Player,
    requests: Receiver<PlayerRequest>,
    events: Sender<PlayerEvent>,
    mut poll_interval: Duration,
    wake: F,
) where
    F: Fn(),
{
    let mut next_tick = Instant::now() + poll_interval;

    loop {
        let wait = next_tick.saturating_duration_since(Instant::now());
        let batch = match requests.recv_timeout(wait) {
            Ok(PlayerRequest::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(PlayerRequest::SetPollInterval(interval)) => {
                poll_interval = interval;
                next_tick = Instant::now() + poll_interval;
                continue;
            }
            Ok(request) => player.handle(request),
            Err(RecvTimeoutError::Timeout) => {
                next_tick = Instant::now() + poll_interval;
                player.tick()
            }
        };

        if batch.is_empty() {
            continue;
        }
        for event in batch {
            if events.send(event).is_err() {
                player.close();
                return;
            }
        }
        wake();
    }

    player.close();
    info!("Player worker stopped");
}
