use thiserror::Error;

/// Failures surfaced to the user as notifications.
///
/// None of these terminate the application; the model turns every variant
/// into a message and leaves the transport in `Idle` or its prior state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    #[error("Could not open {source_name}: {reason}")]
    EngineLoad { source_name: String, reason: String },

    #[error("No playback backend compiled in (rebuild with --features rodio or --features libmpv)")]
    NoBackend,

    #[error("{action} failed: {reason}")]
    Engine { action: &'static str, reason: String },

    #[error("Tag read failed: {0}")]
    TagParse(String),

    #[error("Stream resolution failed: {0}")]
    StreamResolution(String),
}

impl PlayerError {
    pub fn engine(action: &'static str, reason: impl ToString) -> Self {
        Self::Engine {
            action,
            reason: reason.to_string(),
        }
    }

    pub fn load(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::EngineLoad {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
