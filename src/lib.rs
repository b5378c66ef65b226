//! Klipper Voice - spoken printer announcements
//!
//! Plays pre-recorded audio clips when a 3D printer changes state: print
//! started, paused, finished, heater at temperature and so on. Clips live in
//! one directory as `<type>.<language>.<ext>` files and are played with
//! whatever command-line player the host has installed.

pub mod api;
pub mod assets;
pub mod commands;
pub mod error;
pub mod events;
pub mod player;
pub mod scheduler;
pub mod state;

pub use error::{Result, VoiceError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "klipper-voice";
