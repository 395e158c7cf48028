//! Transport state machine and button enablement.

use crate::engine::PlaybackState;
use std::time::Duration;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum TransportCommand {
    Play,
    Pause,
    Stop,
    SeekTo(Duration),
    SetRate(f64),
    /// Percent, `0.0..=100.0`.
    SetVolume(f64),
}

impl TransportCommand {
    pub fn name(&self) -> &'static str {
        match self {
            TransportCommand::Play => "Play",
            TransportCommand::Pause => "Pause",
            TransportCommand::Stop => "Stop",
            TransportCommand::SeekTo(_) => "Seek",
            TransportCommand::SetRate(_) => "Set rate",
            TransportCommand::SetVolume(_) => "Set volume",
        }
    }
}

/// Where the player is, from the user's point of view.
///
/// `Ready` is a freshly opened item that has not played yet, or one that
/// reached its end and was rewound. `Stopped` is an explicit stop.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TransportPhase {
    #[default]
    Idle,
    Ready,
    Playing,
    Paused,
    Stopped,
    Ended,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ButtonStates {
    pub play: bool,
    pub pause: bool,
    pub stop: bool,
}

#[derive(Debug)]
pub struct TransportController {
    phase: TransportPhase,
    buttons: ButtonStates,
    rate: f64,
    volume: f64,
}

impl TransportController {
    pub fn new(volume: f64) -> Self {
        Self {
            phase: TransportPhase::Idle,
            buttons: ButtonStates::default(),
            rate: 1.0,
            volume: volume.clamp(0.0, 100.0),
        }
    }

    pub fn phase(&self) -> TransportPhase {
        self.phase
    }

    pub fn buttons(&self) -> ButtonStates {
        self.buttons
    }

    pub fn has_media(&self) -> bool {
        self.phase != TransportPhase::Idle
    }

    pub fn is_playing(&self) -> bool {
        self.phase == TransportPhase::Playing
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Validates a user intent. Returns the command to forward to the engine,
    /// or `None` when it is a no-op in the current phase.
    ///
    /// Rate and volume are remembered even with nothing loaded; the worker
    /// applies them to the next session.
    pub fn issue(&mut self, command: TransportCommand) -> Option<TransportCommand> {
        let command = match command {
            TransportCommand::SetRate(rate) if rate.is_finite() && rate > 0.0 => {
                self.rate = rate;
                command
            }
            TransportCommand::SetRate(_) => return None,
            TransportCommand::SetVolume(volume) if volume.is_finite() => {
                self.volume = volume.clamp(0.0, 100.0);
                TransportCommand::SetVolume(self.volume)
            }
            TransportCommand::SetVolume(_) => return None,
            other => other,
        };

        if !self.has_media() {
            return match command {
                TransportCommand::SetRate(_) | TransportCommand::SetVolume(_) => Some(command),
                _ => None,
            };
        }
        Some(command)
    }

    /// Space/enter: pause when playing, play when paused or freshly ready.
    pub fn toggle(&mut self) -> Option<TransportCommand> {
        match self.phase {
            TransportPhase::Playing => self.issue(TransportCommand::Pause),
            TransportPhase::Paused | TransportPhase::Ready => self.issue(TransportCommand::Play),
            TransportPhase::Idle | TransportPhase::Stopped | TransportPhase::Ended => None,
        }
    }

    /// A new session is live and stopped at zero.
    pub fn on_opened(&mut self) {
        self.phase = TransportPhase::Ready;
        self.buttons = buttons_for(PlaybackState::Stopped);
    }

    pub fn on_closed(&mut self) {
        self.phase = TransportPhase::Idle;
        self.buttons = ButtonStates::default();
    }

    pub fn on_engine_state_changed(&mut self, state: PlaybackState) {
        if !self.has_media() {
            return;
        }
        self.buttons = buttons_for(state);
        self.phase = match (self.phase, state) {
            (_, PlaybackState::Playing) => TransportPhase::Playing,
            (_, PlaybackState::Paused) => TransportPhase::Paused,
            (_, PlaybackState::Ended) => TransportPhase::Ended,
            // The engine reports Stopped right after loading; that is Ready, not a stop.
            (TransportPhase::Ready, PlaybackState::Stopped | PlaybackState::Unknown) => {
                TransportPhase::Ready
            }
            (_, PlaybackState::Stopped | PlaybackState::Unknown) => TransportPhase::Stopped,
        };
    }

    /// The engine has been stopped and rewound after reaching the end.
    pub fn on_end_of_media(&mut self) {
        if !self.has_media() {
            return;
        }
        self.phase = TransportPhase::Ready;
        self.buttons = buttons_for(PlaybackState::Stopped);
    }
}

pub fn buttons_for(state: PlaybackState) -> ButtonStates {
    match state {
        PlaybackState::Stopped | PlaybackState::Ended | PlaybackState::Unknown => ButtonStates {
            play: true,
            pause: false,
            stop: false,
        },
        PlaybackState::Playing => ButtonStates {
            play: false,
            pause: true,
            stop: true,
        },
        PlaybackState::Paused => ButtonStates {
            play: true,
            pause: false,
            stop: true,
        },
    }
}
