//! Remote interface payloads
//!
//! JSON in and out for the three endpoints a web frontend talks to:
//! `voice/announce`, `voice/config` and `voice/status`. The transport is the
//! host's business; this module only maps request bodies onto `State`.

use crate::assets::MessageType;
use crate::scheduler::{AnnouncementRequest, SubmitOutcome};
use crate::state::{State, Status};
use crate::{Result, VoiceError};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

pub const ANNOUNCE_ENDPOINT: &str = "voice/announce";
pub const CONFIG_ENDPOINT: &str = "voice/config";
pub const STATUS_ENDPOINT: &str = "voice/status";

/// Body of `voice/announce`
#[derive(Debug, Default, Deserialize)]
pub struct AnnounceRequest {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub message_type: Option<String>,
}

/// Reply of `voice/announce`
#[derive(Debug, Serialize, PartialEq)]
pub struct AnnounceResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reply of `voice/config`
#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub enabled: bool,
    pub volume: f32,
    pub language: String,
    pub voice_speed: f32,
    pub auto_announce: BTreeMap<String, bool>,
    pub voice_messages: BTreeMap<String, String>,
}

fn outcome_name(outcome: &SubmitOutcome) -> String {
    match outcome {
        SubmitOutcome::Started => "started".to_string(),
        SubmitOutcome::Queued => "queued".to_string(),
        SubmitOutcome::Dropped(reason) => format!("dropped: {:?}", reason).to_lowercase(),
        SubmitOutcome::Skipped(reason) => format!("skipped: {:?}", reason).to_lowercase(),
        SubmitOutcome::Failed(reason) => format!("failed: {}", reason),
    }
}

/// Announce a message on behalf of a remote caller
pub fn announce(state: &State, request: AnnounceRequest, now: Instant) -> AnnounceResponse {
    if request.message.is_empty() {
        return AnnounceResponse {
            success: false,
            message: None,
            outcome: None,
            error: Some("No message provided".to_string()),
        };
    }

    let message_type = request
        .message_type
        .as_deref()
        .map(MessageType::from)
        .unwrap_or_else(|| MessageType::from("custom"));

    let outcome = state.announce(
        AnnouncementRequest::new(message_type, now).with_message(request.message.clone()),
    );

    AnnounceResponse {
        success: outcome.accepted(),
        message: Some(request.message),
        outcome: Some(outcome_name(&outcome)),
        error: None,
    }
}

/// Current settings
pub fn config_report(state: &State) -> ConfigReport {
    let config = state.config();
    let auto_announce = config
        .announcements
        .iter()
        .map(|(t, a)| (t.to_string(), a.auto))
        .collect();
    let voice_messages = config
        .announcements
        .iter()
        .map(|(t, a)| (t.to_string(), a.text.clone()))
        .collect();

    ConfigReport {
        enabled: config.enabled,
        volume: config.volume,
        language: config.language,
        voice_speed: config.voice_speed,
        auto_announce,
        voice_messages,
    }
}

/// Runtime status
pub fn status(state: &State) -> Status {
    state.status()
}

/// Route one request to its endpoint and serialize the reply
///
/// `body` is the JSON request body, if any.
pub fn handle_request(
    state: &State,
    endpoint: &str,
    body: Option<&str>,
    now: Instant,
) -> Result<String> {
    debug!("API request: {} {:?}", endpoint, body);

    let reply = match endpoint.trim_start_matches('/') {
        ANNOUNCE_ENDPOINT => {
            let request = match body.map(str::trim).filter(|b| !b.is_empty()) {
                Some(body) => serde_json::from_str(body)?,
                None => AnnounceRequest::default(),
            };
            serde_json::to_string(&announce(state, request, now))?
        }
        CONFIG_ENDPOINT => serde_json::to_string(&config_report(state))?,
        STATUS_ENDPOINT => serde_json::to_string(&status(state))?,
        other => return Err(VoiceError::Api(format!("Unknown endpoint '{}'", other))),
    };

    Ok(reply)
}
