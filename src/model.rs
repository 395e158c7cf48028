//! UI-thread player state.
//!
//! Applies worker events to the transport controller and the position
//! synchronizer, and turns user intents into worker requests. No toolkit
//! types appear here, so the whole flow is testable headless.

use crate::{
    engine::{MediaSource, PlaybackState, TrackDescriptor, TrackKind},
    error::PlayerError,
    session::{MediaInfo, PlayerEvent, PlayerRequest},
    sync::{PositionSynchronizer, ScrubReleasePolicy},
    transport::{ButtonStates, TransportCommand, TransportController, TransportPhase},
};
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Severity {
    Info,
    Error,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug)]
pub struct PlayerModel {
    transport: TransportController,
    position: PositionSynchronizer,
    media: Option<MediaInfo>,
    audio_tracks: Vec<TrackDescriptor>,
    subtitle_tracks: Vec<TrackDescriptor>,
    notification: Option<Notification>,
    scrub_policy: ScrubReleasePolicy,
    autoplay: bool,
}

impl PlayerModel {
    pub fn new(volume: f64, scrub_policy: ScrubReleasePolicy, autoplay: bool) -> Self {
        Self {
            transport: TransportController::new(volume),
            position: PositionSynchronizer::new(),
            media: None,
            audio_tracks: Vec::new(),
            subtitle_tracks: Vec::new(),
            notification: None,
            scrub_policy,
            autoplay,
        }
    }

    pub fn transport(&self) -> &TransportController {
        &self.transport
    }

    pub fn position(&self) -> &PositionSynchronizer {
        &self.position
    }

    pub fn phase(&self) -> TransportPhase {
        self.transport.phase()
    }

    pub fn buttons(&self) -> ButtonStates {
        self.transport.buttons()
    }

    pub fn media(&self) -> Option<&MediaInfo> {
        self.media.as_ref()
    }

    pub fn audio_tracks(&self) -> &[TrackDescriptor] {
        &self.audio_tracks
    }

    pub fn subtitle_tracks(&self) -> &[TrackDescriptor] {
        &self.subtitle_tracks
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn dismiss_notification(&mut self) {
        self.notification = None;
    }

    pub fn notify_error(&mut self, err: &PlayerError) {
        warn!("{err}");
        self.notification = Some(Notification {
            severity: Severity::Error,
            message: err.to_string(),
        });
    }

    pub fn notify_info(&mut self, message: impl Into<String>) {
        self.notification = Some(Notification {
            severity: Severity::Info,
            message: message.into(),
        });
    }

    pub fn set_scrub_policy(&mut self, policy: ScrubReleasePolicy) {
        self.scrub_policy = policy;
    }

    pub fn set_autoplay(&mut self, autoplay: bool) {
        self.autoplay = autoplay;
    }

    pub fn apply(&mut self, event: PlayerEvent, now: Instant) {
        match event {
            PlayerEvent::Opened(info) => {
                self.position.clear();
                self.position.set_total(info.duration);
                self.audio_tracks.clear();
                self.subtitle_tracks.clear();
                self.transport.on_opened();
                self.notification = None;
                self.media = Some(info);
            }
            PlayerEvent::Closed => {
                self.transport.on_closed();
                self.position.clear();
                self.audio_tracks.clear();
                self.subtitle_tracks.clear();
                self.media = None;
            }
            PlayerEvent::State(state) => {
                self.transport.on_engine_state_changed(state);
                if state == PlaybackState::Stopped && self.transport.phase() == TransportPhase::Stopped {
                    self.position.rewind();
                }
            }
            PlayerEvent::Duration(total) => {
                if self.transport.has_media() {
                    self.position.set_total(total);
                }
            }
            PlayerEvent::Position(sample) => {
                if self.transport.has_media() {
                    self.position.on_sample(sample, now);
                }
            }
            PlayerEvent::Tracks { audio, subtitle } => {
                debug!(audio = audio.len(), subtitle = subtitle.len(), "Tracks updated");
                self.audio_tracks = audio;
                self.subtitle_tracks = subtitle;
            }
            PlayerEvent::EndOfMedia => {
                self.transport.on_end_of_media();
                self.position.rewind();
            }
            PlayerEvent::Failed(err) => self.notify_error(&err),
        }
    }

    pub fn open(&mut self, source: MediaSource) -> Vec<PlayerRequest> {
        vec![PlayerRequest::Open {
            source,
            autoplay: self.autoplay,
        }]
    }

    pub fn close(&mut self) -> Vec<PlayerRequest> {
        if self.transport.has_media() {
            vec![PlayerRequest::Close]
        } else {
            Vec::new()
        }
    }

    pub fn command(&mut self, command: TransportCommand) -> Vec<PlayerRequest> {
        let requests: Vec<PlayerRequest> = self
            .transport
            .issue(command)
            .map(PlayerRequest::Transport)
            .into_iter()
            .collect();
        if command == TransportCommand::Stop && !requests.is_empty() {
            self.position.rewind();
        }
        requests
    }

    pub fn toggle(&mut self) -> Vec<PlayerRequest> {
        self.transport
            .toggle()
            .map(PlayerRequest::Transport)
            .into_iter()
            .collect()
    }

    /// Press or drag on the seek control.
    pub fn scrub(&mut self, pointer_offset: f32, control_width: f32) -> Vec<PlayerRequest> {
        if !self.transport.has_media() {
            return Vec::new();
        }
        self.position.begin_scrub(self.transport.is_playing());
        match self.position.scrub_to(pointer_offset, control_width) {
            Some(target) => self.command(TransportCommand::SeekTo(target)),
            None => Vec::new(),
        }
    }

    /// Pointer released over (or dragged off) the seek control.
    pub fn release_scrub(&mut self, now: Instant) -> Vec<PlayerRequest> {
        let resume = self.position.end_scrub(self.scrub_policy, now);
        if resume && !self.transport.is_playing() {
            self.command(TransportCommand::Play)
        } else {
            Vec::new()
        }
    }

    pub fn select_track(&mut self, kind: TrackKind, id: i64) -> Vec<PlayerRequest> {
        if !self.transport.has_media() {
            return Vec::new();
        }
        vec![PlayerRequest::SelectTrack { kind, id }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::MediaSource, session::MediaKind, sync::PositionSample, tags::TrackTags};
    use std::{path::PathBuf, time::Duration};

    fn opened_model(total_secs: u64) -> PlayerModel {
        let mut model = PlayerModel::new(50.0, ScrubReleasePolicy::AlwaysResume, false);
        let source = MediaSource::File(PathBuf::from("/tmp/song.mp3"));
        model.apply(
            PlayerEvent::Opened(MediaInfo {
                session_id: 1,
                display_name: source.display_name(),
                kind: MediaKind::of(&source),
                source,
                tags: TrackTags::default(),
                duration: Duration::from_secs(total_secs),
            }),
            Instant::now(),
        );
        model
    }

    #[test]
    fn idle_model_emits_nothing() {
        let mut model = PlayerModel::new(50.0, ScrubReleasePolicy::AlwaysResume, true);
        assert!(model.toggle().is_empty());
        assert!(model.scrub(10.0, 100.0).is_empty());
        assert!(model.close().is_empty());
        assert!(model.command(TransportCommand::Play).is_empty());
        assert!(model.select_track(TrackKind::Audio, 1).is_empty());
    }

    #[test]
    fn open_carries_autoplay_preference() {
        let mut model = PlayerModel::new(50.0, ScrubReleasePolicy::AlwaysResume, true);
        let source = MediaSource::parse("/tmp/clip.mp4");
        assert_eq!(
            model.open(source.clone()),
            vec![PlayerRequest::Open {
                source,
                autoplay: true
            }]
        );
    }

    #[test]
    fn samples_after_close_are_ignored() {
        let mut model = opened_model(120);
        model.apply(PlayerEvent::Closed, Instant::now());
        model.apply(
            PlayerEvent::Position(PositionSample::new(
                Duration::from_secs(10),
                Duration::from_secs(120),
            )),
            Instant::now(),
        );
        assert_eq!(model.position().percent(), 0.0);
        assert_eq!(model.phase(), TransportPhase::Idle);
    }

    #[test]
    fn failure_becomes_notification() {
        let mut model = opened_model(10);
        model.apply(
            PlayerEvent::Failed(PlayerError::engine("Seek", "boom")),
            Instant::now(),
        );
        let note = model.notification().expect("notification");
        assert_eq!(note.severity, Severity::Error);
        assert_eq!(note.message, "Seek failed: boom");
        assert_eq!(model.phase(), TransportPhase::Ready);
    }

    #[test]
    fn explicit_stop_rewinds_display() {
        let mut model = opened_model(100);
        model.apply(PlayerEvent::State(PlaybackState::Playing), Instant::now());
        model.apply(
            PlayerEvent::Position(PositionSample::new(
                Duration::from_secs(40),
                Duration::from_secs(100),
            )),
            Instant::now(),
        );
        assert_eq!(model.position().percent(), 40.0);

        let requests = model.command(TransportCommand::Stop);
        assert_eq!(requests, vec![PlayerRequest::Transport(TransportCommand::Stop)]);
        model.apply(PlayerEvent::State(PlaybackState::Stopped), Instant::now());
        assert_eq!(model.position().percent(), 0.0);
        assert_eq!(model.phase(), TransportPhase::Stopped);
        assert!(model.toggle().is_empty());
    }

    #[test]
    fn restore_policy_keeps_paused_playback_paused() {
        let mut model = opened_model(100);
        model.set_scrub_policy(ScrubReleasePolicy::RestorePrior);
        model.apply(PlayerEvent::State(PlaybackState::Paused), Instant::now());

        let requests = model.scrub(30.0, 100.0);
        assert_eq!(requests.len(), 1);
        assert!(model.release_scrub(Instant::now()).is_empty());

        model.set_scrub_policy(ScrubReleasePolicy::AlwaysResume);
        model.scrub(30.0, 100.0);
        assert_eq!(
            model.release_scrub(Instant::now()),
            vec![PlayerRequest::Transport(TransportCommand::Play)]
        );
    }
}
