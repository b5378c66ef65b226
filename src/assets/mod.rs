//! Audio assets: message types, formats and the on-disk index
//!
//! Files follow the `<message_type>.<language>.<format>` naming convention,
//! e.g. `print_start.en.mp3`.

pub mod index;
pub mod resolver;

pub use index::AssetIndex;
pub use resolver::resolve;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Language code used when a file carries no language part
pub const DEFAULT_LANGUAGE: &str = "default";

/// Language tried after the requested one
pub const FALLBACK_LANGUAGE: &str = "en";

/// Announcement category
///
/// The built-in types cover printer lifecycle events; anything else is kept
/// as a free-text tag so users can drop in their own audio files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum MessageType {
    PrintStart,
    PrintEnd,
    PrintPause,
    PrintResume,
    PrintCancel,
    FilamentRunout,
    Error,
    Ready,
    Heating,
    TempReached,
    /// Free-text tag (`custom` included)
    Custom(String),
}

impl MessageType {
    /// All built-in types, in announcement-table order
    pub const BUILTIN: [MessageType; 10] = [
        MessageType::PrintStart,
        MessageType::PrintEnd,
        MessageType::PrintPause,
        MessageType::PrintResume,
        MessageType::PrintCancel,
        MessageType::FilamentRunout,
        MessageType::Error,
        MessageType::Ready,
        MessageType::Heating,
        MessageType::TempReached,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            MessageType::PrintStart => "print_start",
            MessageType::PrintEnd => "print_end",
            MessageType::PrintPause => "print_pause",
            MessageType::PrintResume => "print_resume",
            MessageType::PrintCancel => "print_cancel",
            MessageType::FilamentRunout => "filament_runout",
            MessageType::Error => "error",
            MessageType::Ready => "ready",
            MessageType::Heating => "heating",
            MessageType::TempReached => "temp_reached",
            MessageType::Custom(tag) => tag,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, MessageType::Custom(_))
    }

    /// Text spoken for this type when no custom text is configured
    pub fn default_text(&self) -> Option<&'static str> {
        let text = match self {
            MessageType::PrintStart => "Print started",
            MessageType::PrintEnd => "Print completed",
            MessageType::PrintPause => "Print paused",
            MessageType::PrintResume => "Print resumed",
            MessageType::PrintCancel => "Print cancelled",
            MessageType::FilamentRunout => "Filament runout detected",
            MessageType::Error => "Error occurred",
            MessageType::Ready => "Printer ready",
            MessageType::Heating => "Heating started",
            MessageType::TempReached => "Target temperature reached",
            MessageType::Custom(_) => return None,
        };
        Some(text)
    }
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        match s {
            "print_start" => MessageType::PrintStart,
            "print_end" => MessageType::PrintEnd,
            "print_pause" => MessageType::PrintPause,
            "print_resume" => MessageType::PrintResume,
            "print_cancel" => MessageType::PrintCancel,
            "filament_runout" => MessageType::FilamentRunout,
            "error" => MessageType::Error,
            "ready" => MessageType::Ready,
            "heating" => MessageType::Heating,
            "temp_reached" => MessageType::TempReached,
            other => MessageType::Custom(other.to_string()),
        }
    }
}

impl From<String> for MessageType {
    fn from(s: String) -> Self {
        MessageType::from(s.as_str())
    }
}

impl From<MessageType> for String {
    fn from(t: MessageType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio container/codec, identified by file extension
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Ogg,
    Opus,
    Flac,
    M4a,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Opus => "opus",
            AudioFormat::Flac => "flac",
            AudioFormat::M4a => "m4a",
        }
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            "ogg" | "oga" => Ok(AudioFormat::Ogg),
            "opus" => Ok(AudioFormat::Opus),
            "flac" => Ok(AudioFormat::Flac),
            "m4a" => Ok(AudioFormat::M4a),
            other => Err(format!("unsupported audio format '{}'", other)),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One audio file on disk
///
/// Identity is `(message_type, language, format)`; the index keeps at most one
/// asset per identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioAsset {
    pub message_type: MessageType,
    pub language: String,
    pub format: AudioFormat,
    pub path: PathBuf,
}
