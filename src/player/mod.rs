//! Audio playback through external programs

pub mod command;
pub mod detect;
pub mod mixer;
pub mod programs;

pub use command::CommandPlayer;
pub use detect::detect_player;

use crate::assets::AudioFormat;
use crate::Result;
use std::path::PathBuf;

/// What the detected playback program can do
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerCapability {
    pub program_name: String,
    /// Decodable formats, most preferred first
    pub supported_formats: Vec<AudioFormat>,
    pub supports_volume_flag: bool,
    pub supports_speed_flag: bool,
}

impl PlayerCapability {
    /// Capability without volume or speed flags
    pub fn new(program_name: &str, supported_formats: Vec<AudioFormat>) -> Self {
        Self {
            program_name: program_name.to_string(),
            supported_formats,
            supports_volume_flag: false,
            supports_speed_flag: false,
        }
    }

    pub fn supports(&self, format: &AudioFormat) -> bool {
        self.supported_formats.contains(format)
    }

    /// Position of `format` in the priority order (lower is better)
    pub fn format_rank(&self, format: &AudioFormat) -> usize {
        self.supported_formats
            .iter()
            .position(|f| f == format)
            .unwrap_or(usize::MAX)
    }

    /// Copy with `format` moved to the front, if the player supports it
    pub fn preferring(&self, format: &AudioFormat) -> Self {
        let mut cap = self.clone();
        if let Some(pos) = cap.supported_formats.iter().position(|f| f == format) {
            let preferred = cap.supported_formats.remove(pos);
            cap.supported_formats.insert(0, preferred);
        }
        cap
    }
}

/// Everything needed to start one playback
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    pub path: PathBuf,
    /// 0.0 - 1.0
    pub volume: f32,
    /// 0.5 - 2.0, 1.0 is normal speed
    pub speed: f32,
}

/// State of a running playback as seen by a poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackStatus {
    Running,
    Finished,
    Failed(String),
}

/// Handle to a playback started in the background
///
/// Polling never blocks; the scheduler calls it from the host loop.
pub trait Playback: Send {
    fn poll(&mut self) -> PlaybackStatus;

    /// Terminate the playback if it is still running
    fn stop(&mut self);
}

/// A playback program (or a fake one in tests)
pub trait Player: Send + Sync {
    fn capability(&self) -> &PlayerCapability;

    /// Start playing without waiting for the audio to finish
    fn play(&self, request: &PlaybackRequest) -> Result<Box<dyn Playback>>;
}
