//! Command execution against the engine state
//!
//! Each command returns the lines to report back to the user. Errors are
//! user errors (bad arguments) and are reported the same way by the host.

use super::Command;
use crate::assets::MessageType;
use crate::scheduler::{AnnouncementRequest, DropReason, SkipReason, SubmitOutcome};
use crate::state::State;
use crate::{Result, VoiceError};
use log::{info, warn};
use std::time::Instant;

/// Run a command and return its response lines
pub fn execute(state: &State, command: Command, now: Instant) -> Result<Vec<String>> {
    match command {
        Command::Announce {
            message,
            message_type,
            volume,
        } => announce(state, message, message_type, volume, now),
        Command::Config {
            enable,
            volume,
            speed,
            language,
        } => configure(state, enable, volume, speed, language),
        Command::Status => Ok(status(state)),
        Command::Test { message_type } => test(state, message_type, now),
        Command::Scan => scan(state),
        Command::Stop => Ok(vec![if state.stop() {
            "Voice playback stopped".to_string()
        } else {
            "Nothing is playing".to_string()
        }]),
    }
}

fn known_types() -> String {
    MessageType::BUILTIN
        .iter()
        .map(MessageType::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Human-readable result of a submission
fn describe(outcome: &SubmitOutcome, what: &str) -> String {
    match outcome {
        SubmitOutcome::Started => format!("Voice announcement sent: {}", what),
        SubmitOutcome::Queued => format!("Voice announcement queued: {}", what),
        SubmitOutcome::Dropped(DropReason::Disabled) => {
            "Voice announcement blocked (disabled)".to_string()
        }
        SubmitOutcome::Dropped(DropReason::RateLimited) => {
            "Voice announcement blocked (too frequent)".to_string()
        }
        SubmitOutcome::Skipped(SkipReason::AssetNotFound) => {
            format!("Voice announcement logged, no audio file: {}", what)
        }
        SubmitOutcome::Skipped(SkipReason::NoSpeechSynthesis) => {
            format!("Voice announcement logged, no speech synthesis: {}", what)
        }
        SubmitOutcome::Skipped(SkipReason::PlayerUnavailable) => {
            format!("Voice announcement logged, no audio player: {}", what)
        }
        SubmitOutcome::Failed(reason) => format!("Voice playback failed: {}", reason),
    }
}

fn announce(
    state: &State,
    message: Option<String>,
    message_type: Option<MessageType>,
    volume: Option<f32>,
    now: Instant,
) -> Result<Vec<String>> {
    let message_type = message_type.unwrap_or_else(|| MessageType::from("custom"));

    let text = match message.as_deref() {
        Some(message) => message.to_string(),
        None => state
            .config()
            .message_text(&message_type)
            .map(str::to_string)
            .ok_or_else(|| {
                VoiceError::Command(format!(
                    "No MESSAGE specified and TYPE '{}' not found",
                    message_type
                ))
            })?,
    };

    // Only literal text counts as custom; TYPE alone plays the type's clip
    let mut request = AnnouncementRequest::new(message_type, now);
    if let Some(message) = message {
        request = request.with_message(message);
    }
    if let Some(volume) = volume {
        request = request.with_volume(volume);
    }

    let outcome = state.announce(request);
    Ok(vec![describe(&outcome, &text)])
}

fn configure(
    state: &State,
    enable: Option<bool>,
    volume: Option<f32>,
    speed: Option<f32>,
    language: Option<String>,
) -> Result<Vec<String>> {
    let mut changed = Vec::new();

    if let Some(enable) = enable {
        state.set_enabled(enable);
        changed.push(format!("enabled={}", enable));
    }
    if let Some(volume) = volume {
        state.set_volume(volume);
        changed.push(format!("volume={:.1}", state.config().volume));
    }
    if let Some(speed) = speed {
        state.set_voice_speed(speed);
        changed.push(format!("speed={:.1}", state.config().voice_speed));
    }
    if let Some(language) = language {
        state.set_language(&language);
        changed.push(format!("language={}", state.config().language));
    }

    if changed.is_empty() {
        let config = state.config();
        return Ok(vec![format!(
            "Voice config - enabled: {}, volume: {:.1}, speed: {:.1}, language: {}",
            config.enabled, config.volume, config.voice_speed, config.language
        )]);
    }

    let summary = changed.join(", ");
    info!("Voice config updated: {}", summary);
    if let Err(e) = state.save_config() {
        warn!("{}", e);
    }
    Ok(vec![format!("Voice config updated: {}", summary)])
}

fn status(state: &State) -> Vec<String> {
    let status = state.status();
    vec![
        "Voice Plugin Status:".to_string(),
        format!("  Enabled: {}", status.enabled),
        format!("  Volume: {:.1}", status.volume),
        format!("  Speed: {:.1}", status.voice_speed),
        format!("  Language: {}", status.language),
        format!("  Minimum interval: {:.1}s", status.min_interval),
        format!(
            "  Player: {}",
            status.player.as_deref().unwrap_or("none (silent mode)")
        ),
        format!(
            "  Audio files: {} ({} message types)",
            status.indexed_files, status.message_types
        ),
        format!(
            "  Last announcement: {}",
            status
                .last_announcement
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "None".to_string())
        ),
        format!("  Queue length: {}", status.queue_length),
    ]
}

fn test(state: &State, message_type: Option<MessageType>, now: Instant) -> Result<Vec<String>> {
    let message_type = message_type.unwrap_or(MessageType::Ready);
    if !message_type.is_builtin() {
        return Err(VoiceError::Command(format!(
            "Unknown test type '{}'. Available: {}",
            message_type,
            known_types()
        )));
    }

    let outcome = state.announce(AnnouncementRequest::new(message_type.clone(), now));
    let line = if outcome.accepted() {
        format!(
            "Voice test completed: {} ({})",
            message_type,
            describe(&outcome, message_type.as_str())
        )
    } else {
        "Voice test blocked (disabled or too frequent)".to_string()
    };
    Ok(vec![line])
}

fn scan(state: &State) -> Result<Vec<String>> {
    let index = state.rescan()?;

    let types: Vec<String> = index.message_types().iter().map(|t| t.to_string()).collect();
    let mut lines = vec![
        "Audio file scan completed:".to_string(),
        format!("  Directory: {}", index.root().display()),
        format!("  Found {} audio files", index.len()),
        format!("  Available message types: {}", types.join(", ")),
    ];

    let missing: Vec<String> = index.missing_builtin().iter().map(|t| t.to_string()).collect();
    if missing.is_empty() {
        lines.push("  All message types have audio files available".to_string());
    } else {
        lines.push(format!("  Missing audio files for: {}", missing.join(", ")));
    }

    Ok(lines)
}
