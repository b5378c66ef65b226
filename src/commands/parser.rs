//! Command line tokenizer
//!
//! `VOICE_ANNOUNCE MESSAGE="Bed is hot" VOLUME=0.5` becomes the verb
//! `ANNOUNCE` plus upper-cased parameter keys.

use crate::{Result, VoiceError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// `KEY=value`, `KEY="quoted value"` or `KEY='quoted value'`
static PARAM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_][A-Za-z0-9_]*)=(?:"([^"]*)"|'([^']*)'|(\S*))"#)
        .expect("parameter regex is valid")
});

/// Optional prefix of every verb
const VERB_PREFIX: &str = "VOICE_";

/// Verb and parameters of one command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub verb: String,
    pub params: HashMap<String, String>,
}

impl CommandLine {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Parse a float parameter; absent keys give `Ok(None)`
    pub fn get_float(&self, key: &str) -> Result<Option<f32>> {
        self.get(key)
            .map(|raw| {
                raw.parse::<f32>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| VoiceError::Command(format!("Invalid {} '{}'", key, raw)))
            })
            .transpose()
    }

    /// Parse a 0/1 parameter
    pub fn get_flag(&self, key: &str) -> Result<Option<bool>> {
        self.get(key)
            .map(|raw| match raw {
                "1" => Ok(true),
                "0" => Ok(false),
                other => Err(VoiceError::Command(format!(
                    "{} must be 0 or 1, got '{}'",
                    key, other
                ))),
            })
            .transpose()
    }
}

/// Split a command line into verb and parameters
pub fn parse_line(line: &str) -> Result<CommandLine> {
    let line = line.trim();
    let (verb, rest) = match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], &line[pos..]),
        None => (line, ""),
    };

    if verb.is_empty() {
        return Err(VoiceError::Command("Empty command".to_string()));
    }

    let verb = verb.to_ascii_uppercase();
    let verb = verb
        .strip_prefix(VERB_PREFIX)
        .map(str::to_string)
        .unwrap_or(verb);

    let mut params = HashMap::new();
    for caps in PARAM_RE.captures_iter(rest) {
        let key = caps[1].to_ascii_uppercase();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        params.insert(key, value);
    }

    let leftover: String = PARAM_RE.replace_all(rest, "").split_whitespace().collect();
    if !leftover.is_empty() {
        return Err(VoiceError::Command(format!(
            "Malformed parameters in '{}'",
            line
        )));
    }

    Ok(CommandLine { verb, params })
}
