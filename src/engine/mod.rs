//! Media engine abstraction.
//!
//! Everything that decodes, renders or seeks lives behind [`MediaEngine`].
//! The rest of the crate only forwards commands and reads state.

#[cfg(feature = "libmpv")]
pub mod mpv;
#[cfg(feature = "rodio")]
pub mod audio;

use crate::error::{PlayerError, Result};
use std::{fmt, path::PathBuf, time::Duration};

/// Playback state as reported by the engine.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
    Ended,
    #[default]
    Unknown,
}

impl PlaybackState {
    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
            PlaybackState::Ended => "Ended",
            PlaybackState::Unknown => "Unknown",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum TrackKind {
    Audio,
    Subtitle,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TrackDescriptor {
    pub id: i64,
    pub description: String,
}

impl TrackDescriptor {
    pub fn new(id: i64, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
        }
    }
}

/// What to hand the engine on `load`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum MediaSource {
    File(PathBuf),
    Url(String),
}

impl MediaSource {
    /// Interprets user input: anything with a URL scheme is a URL, the rest is a path.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.contains("://") {
            MediaSource::Url(trimmed.to_string())
        } else {
            MediaSource::File(PathBuf::from(trimmed))
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            MediaSource::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            MediaSource::Url(url) => url.clone(),
        }
    }

    pub fn as_path(&self) -> Option<&std::path::Path> {
        match self {
            MediaSource::File(path) => Some(path),
            MediaSource::Url(_) => None,
        }
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSource::File(path) => write!(f, "{}", path.display()),
            MediaSource::Url(url) => f.write_str(url),
        }
    }
}

/// A live playback backend.
///
/// Implementations are created and used on the worker thread only, so they
/// need not be `Send`. `release` is called exactly once per engine by the
/// owning session.
pub trait MediaEngine {
    fn load(&mut self, source: &MediaSource) -> Result<()>;
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    fn seek(&mut self, position: Duration) -> Result<()>;
    fn set_rate(&mut self, rate: f64) -> Result<()>;
    /// `percent` is in `0.0..=100.0`.
    fn set_volume(&mut self, percent: f64) -> Result<()>;
    fn state(&self) -> PlaybackState;
    fn current_time(&self) -> Duration;
    /// Zero while the duration is not yet known.
    fn duration(&self) -> Duration;
    fn audio_tracks(&self) -> Vec<TrackDescriptor> {
        Vec::new()
    }
    fn subtitle_tracks(&self) -> Vec<TrackDescriptor> {
        Vec::new()
    }
    fn select_track(&mut self, kind: TrackKind, id: i64) -> Result<()> {
        let _ = (kind, id);
        Err(PlayerError::engine(
            "Track selection",
            "not supported by this backend",
        ))
    }
    fn release(&mut self);
}

/// Builds a fresh engine for every opened media item.
pub type EngineFactory = Box<dyn FnMut() -> Result<Box<dyn MediaEngine>> + Send>;

/// The factory for whichever backend this binary was built with.
///
/// libmpv wins when both are enabled since it also handles video and URLs.
pub fn default_factory() -> EngineFactory {
    #[cfg(feature = "libmpv")]
    {
        Box::new(|| Ok(Box::new(mpv::MpvEngine::new()?) as Box<dyn MediaEngine>))
    }
    #[cfg(all(feature = "rodio", not(feature = "libmpv")))]
    {
        Box::new(|| Ok(Box::new(audio::RodioEngine::new()?) as Box<dyn MediaEngine>))
    }
    #[cfg(not(any(feature = "rodio", feature = "libmpv")))]
    {
        Box::new(|| Err(PlayerError::NoBackend))
    }
}
