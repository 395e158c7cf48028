//! Audio-only backend built on rodio.

use super::{MediaEngine, MediaSource, PlaybackState};
use crate::error::{PlayerError, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::{fs::File, io::BufReader, path::PathBuf, time::Duration};
use tracing::{debug, info, warn};

pub struct RodioEngine {
    // Dropping the stream silences the sink; it has to outlive it.
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
    path: Option<PathBuf>,
    duration: Duration,
    stopped: bool,
    rate: f32,
    volume: f32,
}

impl RodioEngine {
    pub fn new() -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| PlayerError::engine("Audio output", e))?;
        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
            path: None,
            duration: Duration::ZERO,
            stopped: true,
            rate: 1.0,
            volume: 0.5,
        })
    }

    fn build_sink(&mut self, path: &PathBuf) -> Result<()> {
        let name = path.display().to_string();
        let file = File::open(path).map_err(|e| PlayerError::load(name.clone(), e))?;
        let source = Decoder::new(BufReader::new(file)).map_err(|e| PlayerError::load(name.clone(), e))?;
        let duration = source.total_duration().unwrap_or(Duration::ZERO);

        let sink = Sink::try_new(&self.handle).map_err(|e| PlayerError::load(name, e))?;
        sink.pause();
        sink.set_speed(self.rate);
        sink.set_volume(self.volume);
        sink.append(source);

        if let Some(old) = self.sink.replace(sink) {
            old.stop();
        }
        self.duration = duration;
        Ok(())
    }

    /// The decoder is consumed once it reaches the end; start over from a
    /// fresh, paused source so seeks and play act on live audio.
    fn revive_if_drained(&mut self) -> Result<()> {
        let drained = self.sink.as_ref().is_some_and(Sink::empty);
        if let (true, Some(path)) = (drained, self.path.clone()) {
            debug!("Source drained, reloading");
            self.build_sink(&path)?;
        }
        Ok(())
    }

    fn sink(&self) -> Result<&Sink> {
        self.sink
            .as_ref()
            .ok_or_else(|| PlayerError::engine("Playback", "nothing loaded"))
    }
}

impl MediaEngine for RodioEngine {
    fn load(&mut self, source: &MediaSource) -> Result<()> {
        let MediaSource::File(path) = source else {
            return Err(PlayerError::load(
                source.display_name(),
                "network streams need the libmpv backend",
            ));
        };
        self.build_sink(path)?;
        self.path = Some(path.clone());
        self.stopped = true;
        info!(path = %path.display(), duration_secs = self.duration.as_secs_f64(), "Loaded audio");
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.revive_if_drained()?;
        self.sink()?.play();
        self.stopped = false;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.sink()?.pause();
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.revive_if_drained()?;
        let sink = self.sink()?;
        sink.pause();
        if let Err(e) = sink.try_seek(Duration::ZERO) {
            warn!("Rewind on stop failed: {e}");
        }
        self.stopped = true;
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        let target = if self.duration.is_zero() {
            position
        } else {
            position.min(self.duration)
        };
        self.revive_if_drained()?;
        self.sink()?
            .try_seek(target)
            .map_err(|e| PlayerError::engine("Seek", e))
    }

    fn set_rate(&mut self, rate: f64) -> Result<()> {
        self.rate = rate as f32;
        if let Some(sink) = &self.sink {
            sink.set_speed(self.rate);
        }
        Ok(())
    }

    fn set_volume(&mut self, percent: f64) -> Result<()> {
        self.volume = (percent / 100.0).clamp(0.0, 1.0) as f32;
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
        Ok(())
    }

    fn state(&self) -> PlaybackState {
        match &self.sink {
            None => PlaybackState::Unknown,
            Some(_) if self.stopped => PlaybackState::Stopped,
            Some(sink) if sink.empty() => PlaybackState::Ended,
            Some(sink) if sink.is_paused() => PlaybackState::Paused,
            Some(_) => PlaybackState::Playing,
        }
    }

    fn current_time(&self) -> Duration {
        match &self.sink {
            Some(sink) if !sink.empty() => sink.get_pos(),
            Some(_) if !self.stopped => self.duration,
            _ => Duration::ZERO,
        }
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn release(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.path = None;
        self.stopped = true;
    }
}
