//! System mixer volume through `amixer`
//!
//! Used for players that have no gain flag of their own (e.g. aplay).

use super::programs::percent;
use log::{debug, warn};
use std::process::{Child, Command, Stdio};

/// Build the amixer invocation for a volume level
fn mixer_command(amixer: &str, control: &str, volume: f32) -> Command {
    let mut cmd = Command::new(amixer);
    cmd.arg("-q")
        .arg("sset")
        .arg(control)
        .arg(format!("{}%", percent(volume)));
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    cmd
}

/// Start an amixer call setting `control` to `volume`
///
/// Returns the running process so the caller can reap it later; `None` if
/// amixer is missing or could not be started.
pub fn set_hardware_volume(control: &str, volume: f32) -> Option<Child> {
    let Ok(amixer) = which::which("amixer") else {
        debug!("amixer not found, hardware volume unchanged");
        return None;
    };

    let mut cmd = mixer_command(&amixer.to_string_lossy(), control, volume);
    match cmd.spawn() {
        Ok(child) => {
            debug!("Set mixer '{}' to {}%", control, percent(volume));
            Some(child)
        }
        Err(e) => {
            warn!("Failed to start amixer: {}", e);
            None
        }
    }
}
