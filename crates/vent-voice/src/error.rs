//! Error types for the voice coordination system

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur while driving the capture and output channels
#[derive(Error, Debug)]
pub enum VoiceError {
    /// The platform capability (recognizer or synthesizer) is missing.
    #[error("Platform unavailable: {0}")]
    PlatformUnavailable(String),

    /// The channel is already running. Benign; callers swallow it.
    #[error("Channel already active")]
    AlreadyActive,

    #[error("Start failed: {0}")]
    StartFailed(String),

    #[error("Stop failed: {0}")]
    StopFailed(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl VoiceError {
    /// True for errors the coordinator logs and otherwise ignores.
    pub fn is_benign(&self) -> bool {
        matches!(self, VoiceError::AlreadyActive)
    }

    /// True when the capability itself is missing (as opposed to a transient failure).
    pub fn is_unavailable(&self) -> bool {
        matches!(self, VoiceError::PlatformUnavailable(_))
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for VoiceError {
    fn from(err: tokio::sync::mpsc::error::SendError<T>) -> Self {
        VoiceError::ChannelSend(err.to_string())
    }
}
