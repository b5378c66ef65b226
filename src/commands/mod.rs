//! Command surface consumed from the host's command dispatcher
//!
//! - `ANNOUNCE {MESSAGE=text | TYPE=type} [VOLUME=0.0-1.0]`
//! - `CONFIG [ENABLE=0|1] [VOLUME=..] [SPEED=..] [LANGUAGE=code]`
//! - `STATUS`
//! - `TEST [TYPE=type]`
//! - `SCAN`
//! - `STOP`
//!
//! Every verb may also be written with a `VOICE_` prefix.

pub mod dispatch;
pub mod parser;

pub use dispatch::execute;
pub use parser::{parse_line, CommandLine};

use crate::assets::MessageType;
use crate::{Result, VoiceError};

/// A parsed voice command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Announce {
        message: Option<String>,
        message_type: Option<MessageType>,
        volume: Option<f32>,
    },
    Config {
        enable: Option<bool>,
        volume: Option<f32>,
        speed: Option<f32>,
        language: Option<String>,
    },
    Status,
    Test {
        message_type: Option<MessageType>,
    },
    Scan,
    Stop,
}

impl Command {
    /// Parse one command line
    pub fn parse(line: &str) -> Result<Self> {
        let cmd = parse_line(line)?;
        let message_type = || cmd.get("TYPE").map(MessageType::from);

        let command = match cmd.verb.as_str() {
            "ANNOUNCE" => Command::Announce {
                message: cmd.get("MESSAGE").filter(|m| !m.is_empty()).map(str::to_string),
                message_type: message_type(),
                volume: cmd.get_float("VOLUME")?,
            },
            "CONFIG" => Command::Config {
                enable: cmd.get_flag("ENABLE")?,
                volume: cmd.get_float("VOLUME")?,
                speed: cmd.get_float("SPEED")?,
                language: cmd.get("LANGUAGE").map(str::to_string),
            },
            "STATUS" => Command::Status,
            "TEST" => Command::Test {
                message_type: message_type(),
            },
            "SCAN" => Command::Scan,
            "STOP" => Command::Stop,
            other => {
                return Err(VoiceError::Command(format!(
                    "Unknown command '{}'",
                    other
                )))
            }
        };

        Ok(command)
    }
}
