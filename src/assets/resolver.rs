//! Language/format fallback chain
//!
//! Picks one playable asset for a message type. Pure over the index: no
//! filesystem access happens here.

use super::{AssetIndex, AudioAsset, MessageType, DEFAULT_LANGUAGE, FALLBACK_LANGUAGE};
use crate::player::PlayerCapability;
use crate::{Result, VoiceError};
use log::debug;

/// Resolve `message_type` to the best asset the player can handle
///
/// Language preference: `preferred_language`, then `en`, then `default`,
/// then the lexicographically first language available. Within a language,
/// the format that comes first in the player's priority order wins. Assets
/// in formats the player can't decode are never returned.
pub fn resolve(
    index: &AssetIndex,
    message_type: &MessageType,
    preferred_language: &str,
    capability: &PlayerCapability,
) -> Result<AudioAsset> {
    let playable: Vec<&AudioAsset> = index
        .lookup(message_type)
        .into_iter()
        .filter(|asset| capability.supports(&asset.format))
        .collect();

    let not_found = || VoiceError::AssetNotFound {
        message_type: message_type.to_string(),
        language: preferred_language.to_string(),
    };

    if playable.is_empty() {
        return Err(not_found());
    }

    let language = [preferred_language, FALLBACK_LANGUAGE, DEFAULT_LANGUAGE]
        .into_iter()
        .find(|lang| playable.iter().any(|a| a.language == *lang))
        .map(str::to_string)
        .or_else(|| playable.iter().map(|a| a.language.clone()).min())
        .ok_or_else(not_found)?;

    let chosen = playable
        .into_iter()
        .filter(|a| a.language == language)
        .min_by_key(|a| capability.format_rank(&a.format))
        .ok_or_else(not_found)?;

    debug!(
        "Resolved {} ({}) -> {}",
        message_type,
        preferred_language,
        chosen.path.display()
    );

    Ok(chosen.clone())
}
