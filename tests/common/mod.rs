#![allow(dead_code)]

use flickwav::{
    engine::{EngineFactory, MediaEngine, MediaSource, PlaybackState, TrackDescriptor, TrackKind},
    error::{PlayerError, Result},
    model::PlayerModel,
    session::{Player, PlayerEvent, PlayerRequest},
    sync::ScrubReleasePolicy,
};
use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

/// Shared between the test and every engine the factory builds.
#[derive(Debug, Default)]
pub struct FakeState {
    pub loaded: Option<MediaSource>,
    pub state: PlaybackState,
    pub position: Duration,
    pub duration: Duration,
    pub rate: f64,
    pub volume: f64,
    pub commands: Vec<String>,
    pub created: usize,
    pub releases: usize,
    pub fail_load: bool,
    pub audio_tracks: Vec<TrackDescriptor>,
    pub selected_audio: Option<i64>,
}

pub type Shared = Arc<Mutex<FakeState>>;

pub struct FakeEngine {
    shared: Shared,
    released: bool,
}

impl FakeEngine {
    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.shared.lock().expect("fake engine lock");
        f(&mut state)
    }
}

impl MediaEngine for FakeEngine {
    fn load(&mut self, source: &MediaSource) -> Result<()> {
        self.with(|s| {
            s.commands.push("load".into());
            if s.fail_load {
                return Err(PlayerError::load(source.display_name(), "unsupported format"));
            }
            s.loaded = Some(source.clone());
            s.state = PlaybackState::Stopped;
            s.position = Duration::ZERO;
            Ok(())
        })
    }

    fn play(&mut self) -> Result<()> {
        self.with(|s| {
            s.commands.push("play".into());
            s.state = PlaybackState::Playing;
            Ok(())
        })
    }

    fn pause(&mut self) -> Result<()> {
        self.with(|s| {
            s.commands.push("pause".into());
            s.state = PlaybackState::Paused;
            Ok(())
        })
    }

    fn stop(&mut self) -> Result<()> {
        self.with(|s| {
            s.commands.push("stop".into());
            s.state = PlaybackState::Stopped;
            s.position = Duration::ZERO;
            Ok(())
        })
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        self.with(|s| {
            s.commands.push(format!("seek {}", position.as_secs_f64()));
            s.position = position;
            Ok(())
        })
    }

    fn set_rate(&mut self, rate: f64) -> Result<()> {
        self.with(|s| {
            s.rate = rate;
            Ok(())
        })
    }

    fn set_volume(&mut self, percent: f64) -> Result<()> {
        self.with(|s| {
            s.volume = percent;
            Ok(())
        })
    }

    fn state(&self) -> PlaybackState {
        self.with(|s| s.state)
    }

    fn current_time(&self) -> Duration {
        self.with(|s| s.position)
    }

    fn duration(&self) -> Duration {
        self.with(|s| s.duration)
    }

    fn audio_tracks(&self) -> Vec<TrackDescriptor> {
        self.with(|s| s.audio_tracks.clone())
    }

    fn select_track(&mut self, kind: TrackKind, id: i64) -> Result<()> {
        self.with(|s| {
            if kind == TrackKind::Audio {
                s.selected_audio = Some(id);
            }
            Ok(())
        })
    }

    fn release(&mut self) {
        assert!(!self.released, "engine released twice");
        self.released = true;
        self.with(|s| {
            s.releases += 1;
            s.loaded = None;
            s.state = PlaybackState::Unknown;
        });
    }
}

pub fn fake_factory(shared: Shared) -> EngineFactory {
    Box::new(move || {
        shared.lock().expect("fake engine lock").created += 1;
        Ok(Box::new(FakeEngine {
            shared: shared.clone(),
            released: false,
        }) as Box<dyn MediaEngine>)
    })
}

/// Drives the worker core and the UI model in lockstep, without threads.
pub struct Harness {
    pub engine: Shared,
    pub player: Player,
    pub model: PlayerModel,
    pub events: Vec<PlayerEvent>,
}

impl Harness {
    pub fn new(policy: ScrubReleasePolicy, autoplay: bool) -> Self {
        let engine: Shared = Arc::new(Mutex::new(FakeState {
            duration: Duration::from_secs(120),
            rate: 1.0,
            ..FakeState::default()
        }));
        Self {
            player: Player::new(fake_factory(engine.clone()), 50.0),
            model: PlayerModel::new(50.0, policy, autoplay),
            engine,
            events: Vec::new(),
        }
    }

    pub fn send(&mut self, requests: Vec<PlayerRequest>) {
        for request in requests {
            let events = self.player.handle(request);
            self.deliver(events);
        }
    }

    pub fn tick(&mut self) {
        let events = self.player.tick();
        self.deliver(events);
    }

    fn deliver(&mut self, events: Vec<PlayerEvent>) {
        let now = Instant::now();
        for event in events {
            self.events.push(event.clone());
            self.model.apply(event, now);
        }
    }

    pub fn open(&mut self, path: &str) {
        let requests = self.model.open(MediaSource::parse(path));
        self.send(requests);
    }

    pub fn engine(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.engine.lock().expect("fake engine lock")
    }

    pub fn set_position(&self, secs: u64) {
        self.engine().position = Duration::from_secs(secs);
    }

    pub fn take_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.events)
    }
}
