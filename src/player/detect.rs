//! Playback program detection
//!
//! Checks a fixed priority list of programs and returns the first one that
//! is installed. A configured `audio_player` is tried before the list.

use super::programs::{find_spec, PROGRAMS};
use super::{CommandPlayer, PlayerCapability};
use crate::state::config::Config;
use log::{info, warn};

/// Detect a usable playback program
///
/// Returns `None` when nothing is installed; the caller then runs in silent
/// mode. That condition is logged here, once per detection.
pub fn detect_player(config: &Config) -> Option<CommandPlayer> {
    let player = find_installed(config).map(|player| {
        player
            .with_extra_args(config.audio_player_args.clone())
            .with_hardware_volume(config.use_hardware_volume, &config.mixer_control)
    });

    if player.is_none() {
        warn!("No audio player found. Tried: {}", tried_list(config));
        warn!("Voice announcements will be logged only");
    }

    player
}

fn find_installed(config: &Config) -> Option<CommandPlayer> {
    if let Some(configured) = config.audio_player.as_deref() {
        info!("Trying configured audio player {}...", configured);
        match which::which(configured).ok() {
            Some(path) => {
                info!("✓ Audio player found: {}", path.display());
                return Some(match find_spec(configured) {
                    Some(spec) => CommandPlayer::known(spec, path),
                    None => {
                        let name = configured.rsplit('/').next().unwrap_or(configured);
                        let cap = PlayerCapability::new(name, vec![config.audio_format.clone()]);
                        CommandPlayer::generic(cap, path)
                    }
                });
            }
            None => info!("✗ Configured audio player not found: {}", configured),
        }
    }

    for spec in PROGRAMS {
        match which::which(spec.name).ok() {
            Some(path) => {
                info!("✓ Audio player found: {} ({})", spec.name, path.display());
                return Some(CommandPlayer::known(spec, path));
            }
            None => info!("✗ {} not installed", spec.name),
        }
    }

    None
}

fn tried_list(config: &Config) -> String {
    config
        .audio_player
        .iter()
        .map(String::as_str)
        .chain(PROGRAMS.iter().map(|spec| spec.name))
        .collect::<Vec<_>>()
        .join(", ")
}
