//! Error types for klipper-voice

use std::io;
use thiserror::Error;

/// Main error type for the announcement engine
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Resolution exhausted the fallback chain
    #[error("No playable audio for '{message_type}' (language '{language}')")]
    AssetNotFound {
        message_type: String,
        language: String,
    },

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    /// Bad command arguments; reported back to whoever issued the command
    #[error("{0}")]
    Command(String),

    #[error("API error: {0}")]
    Api(String),
}

/// Result type alias for klipper-voice operations
pub type Result<T> = std::result::Result<T, VoiceError>;

impl From<serde_json::Error> for VoiceError {
    fn from(e: serde_json::Error) -> Self {
        VoiceError::Api(format!("JSON error: {}", e))
    }
}
