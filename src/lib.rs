//! Flickwav: a small desktop media player.
//!
//! The GUI lives in the binary; this library holds the parts that decide
//! what the GUI shows and what the media engine is told to do.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod session;
pub mod stream;
pub mod sync;
pub mod tags;
pub mod transport;

pub use engine::{MediaEngine, MediaSource, PlaybackState, TrackDescriptor, TrackKind};
pub use error::PlayerError;
pub use model::PlayerModel;
pub use session::{Player, PlayerEvent, PlayerHandle, PlayerRequest};
pub use transport::TransportCommand;
