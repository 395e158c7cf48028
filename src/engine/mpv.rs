//! libmpv backend: video, audio and direct network streams.
//!
//! mpv renders video into its own window; this engine only drives it through
//! properties and commands.

use super::{MediaEngine, MediaSource, PlaybackState, TrackDescriptor, TrackKind};
use crate::error::{PlayerError, Result};
use libmpv2::Mpv;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct MpvEngine {
    mpv: Mpv,
    loaded: bool,
    stopped: bool,
}

impl MpvEngine {
    pub fn new() -> Result<Self> {
        let mpv = Mpv::new().map_err(|e| {
            error!("Failed to create MPV instance: {}", e);
            PlayerError::engine("MPV init", e)
        })?;

        // Start paused; end of file must stay observable instead of unloading.
        mpv.set_property("pause", true).ok();
        mpv.set_property("keep-open", "yes").ok();
        mpv.set_property("ytdl", "no").ok();

        Ok(Self {
            mpv,
            loaded: false,
            stopped: true,
        })
    }

    fn flag(&self, name: &str) -> bool {
        self.mpv.get_property::<bool>(name).unwrap_or(false)
    }

    fn seconds(&self, name: &str) -> Duration {
        secs_to_duration(self.mpv.get_property::<f64>(name).unwrap_or(0.0))
    }

    fn tracks_of(&self, wanted: &str) -> Vec<TrackDescriptor> {
        let count = self.mpv.get_property::<i64>("track-list/count").unwrap_or(0);
        (0..count)
            .filter_map(|index| {
                let kind = self
                    .mpv
                    .get_property::<String>(&format!("track-list/{index}/type"))
                    .ok()?;
                if kind != wanted {
                    return None;
                }
                let id = self
                    .mpv
                    .get_property::<i64>(&format!("track-list/{index}/id"))
                    .ok()?;
                let title = self
                    .mpv
                    .get_property::<String>(&format!("track-list/{index}/title"))
                    .ok();
                let lang = self
                    .mpv
                    .get_property::<String>(&format!("track-list/{index}/lang"))
                    .ok();
                let description = match (title, lang) {
                    (Some(title), Some(lang)) => format!("{title} [{lang}]"),
                    (Some(title), None) => title,
                    (None, Some(lang)) => format!("Track {id} [{lang}]"),
                    (None, None) => format!("Track {id}"),
                };
                Some(TrackDescriptor { id, description })
            })
            .collect()
    }
}

impl MediaEngine for MpvEngine {
    fn load(&mut self, source: &MediaSource) -> Result<()> {
        let target = match source {
            MediaSource::File(path) => path
                .to_str()
                .ok_or_else(|| PlayerError::load(source.display_name(), "Invalid path encoding"))?
                .to_string(),
            MediaSource::Url(url) => url.clone(),
        };

        info!("Opening media with MPV: {}", target);
        self.mpv.command("loadfile", &[&target]).map_err(|e| {
            error!("Failed to load file: {}", e);
            PlayerError::load(source.display_name(), e)
        })?;
        self.loaded = true;
        self.stopped = true;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if self.flag("eof-reached") {
            self.seek(Duration::ZERO)?;
        }
        self.mpv
            .set_property("pause", false)
            .map_err(|e| PlayerError::engine("Play", e))?;
        self.stopped = false;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.mpv
            .set_property("pause", true)
            .map_err(|e| PlayerError::engine("Pause", e))
    }

    fn stop(&mut self) -> Result<()> {
        // mpv's own `stop` unloads the file; keep it loaded and rewind instead.
        self.pause()?;
        if let Err(e) = self.seek(Duration::ZERO) {
            warn!("Rewind on stop failed: {e}");
        }
        self.stopped = true;
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        let secs = position.as_secs_f64();
        self.mpv
            .command("seek", &[&secs.to_string(), "absolute"])
            .map_err(|e| PlayerError::engine("Seek", e))
    }

    fn set_rate(&mut self, rate: f64) -> Result<()> {
        self.mpv
            .set_property("speed", rate)
            .map_err(|e| PlayerError::engine("Set rate", e))
    }

    fn set_volume(&mut self, percent: f64) -> Result<()> {
        self.mpv
            .set_property("volume", percent.clamp(0.0, 100.0))
            .map_err(|e| PlayerError::engine("Set volume", e))
    }

    fn state(&self) -> PlaybackState {
        if !self.loaded || self.flag("idle-active") {
            return PlaybackState::Unknown;
        }
        if self.flag("eof-reached") {
            PlaybackState::Ended
        } else if self.stopped {
            PlaybackState::Stopped
        } else if self.flag("pause") {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        }
    }

    fn current_time(&self) -> Duration {
        self.seconds("time-pos")
    }

    fn duration(&self) -> Duration {
        self.seconds("duration")
    }

    fn audio_tracks(&self) -> Vec<TrackDescriptor> {
        self.tracks_of("audio")
    }

    fn subtitle_tracks(&self) -> Vec<TrackDescriptor> {
        self.tracks_of("sub")
    }

    fn select_track(&mut self, kind: TrackKind, id: i64) -> Result<()> {
        let property = match kind {
            TrackKind::Audio => "aid",
            TrackKind::Subtitle => "sid",
        };
        let result = if id < 0 {
            self.mpv.set_property(property, "no")
        } else {
            self.mpv.set_property(property, id)
        };
        result.map_err(|e| PlayerError::engine("Track selection", e))
    }

    fn release(&mut self) {
        if self.loaded {
            if let Err(e) = self.mpv.command("stop", &[]) {
                warn!("MPV stop on release failed: {e}");
            }
        }
        self.loaded = false;
        self.stopped = true;
    }
}

fn secs_to_duration(seconds: f64) -> Duration {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}
