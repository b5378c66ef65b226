//! Configuration management
//!
//! Settings live in an INI file (`~/.klipper_voice.cfg` by default):
//!
//! ```ini
//! [voice]
//! enabled = true
//! volume = 0.8
//! language = en
//!
//! [messages]
//! print_start = Print started
//!
//! [auto_announce]
//! error = false
//! ```

use crate::assets::{AudioFormat, MessageType, FALLBACK_LANGUAGE};
use crate::{Result, VoiceError};
use ini::Ini;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const VOLUME_RANGE: (f32, f32) = (0.0, 1.0);
pub const SPEED_RANGE: (f32, f32) = (0.5, 2.0);
pub const MIN_INTERVAL_FLOOR: f32 = 0.1;
pub const PLAYBACK_TIMEOUT_FLOOR: f32 = 1.0;
/// Upper bound for every duration setting
pub const SECONDS_CEILING: f32 = 3600.0;

const VOICE: &str = "voice";
const MESSAGES: &str = "messages";
const AUTO_ANNOUNCE: &str = "auto_announce";

/// Per-type settings
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    /// Announce automatically when the matching printer event fires
    pub auto: bool,
    /// Text logged (and, with TTS, spoken) for this type
    pub text: String,
}

/// Typed announcement settings
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub enabled: bool,
    /// 0.0 (mute) - 1.0
    pub volume: f32,
    /// 0.5 (slow) - 2.0 (fast)
    pub voice_speed: f32,
    pub language: String,
    /// Minimum time between two announcements
    pub min_interval: Duration,
    /// Watchdog for a single playback
    pub playback_timeout: Duration,
    pub audio_path: PathBuf,
    /// Preferred format when a message has several
    pub audio_format: AudioFormat,
    /// Program to try before the built-in list
    pub audio_player: Option<String>,
    pub audio_player_args: Vec<String>,
    pub use_hardware_volume: bool,
    pub mixer_control: String,
    pub announcements: BTreeMap<MessageType, Announcement>,
}

impl Default for Config {
    fn default() -> Self {
        let announcements = MessageType::BUILTIN
            .iter()
            .map(|t| {
                let announcement = Announcement {
                    auto: default_auto(t),
                    text: t.default_text().unwrap_or_default().to_string(),
                };
                (t.clone(), announcement)
            })
            .collect();

        Self {
            enabled: true,
            volume: 0.8,
            voice_speed: 1.0,
            language: FALLBACK_LANGUAGE.to_string(),
            min_interval: Duration::from_secs(2),
            playback_timeout: Duration::from_secs(30),
            audio_path: default_audio_path(),
            audio_format: AudioFormat::Mp3,
            audio_player: None,
            audio_player_args: Vec::new(),
            use_hardware_volume: true,
            mixer_control: "Master".to_string(),
            announcements,
        }
    }
}

/// Error and heating announcements are off unless asked for
fn default_auto(message_type: &MessageType) -> bool {
    !matches!(message_type, MessageType::Error | MessageType::Heating)
}

fn default_audio_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("klipper_voice_files")
}

impl Config {
    /// Default config file path (~/.klipper_voice.cfg)
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".klipper_voice.cfg")
    }

    /// Load configuration from disk, writing the defaults if the file is missing
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);

        if !path.exists() {
            info!("Config file not found, creating default at {:?}", path);
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let ini = Ini::load_from_file(path)
            .map_err(|e| VoiceError::IniParse(format!("Failed to load config: {}", e)))?;
        Ok(Self::from_ini(&ini))
    }

    /// Parse configuration from INI text
    pub fn parse(text: &str) -> Result<Self> {
        let ini = Ini::load_from_str(text)
            .map_err(|e| VoiceError::IniParse(format!("Failed to parse config: {}", e)))?;
        Ok(Self::from_ini(&ini))
    }

    /// Build a config from parsed INI, falling back to defaults per key
    pub fn from_ini(ini: &Ini) -> Self {
        let defaults = Self::default();
        let get = |key: &str| ini.get_from(Some(VOICE), key).map(str::trim);

        let mut config = Self {
            enabled: read_bool(get("enabled"), "enabled", defaults.enabled),
            volume: read_clamped(get("volume"), "volume", defaults.volume, VOLUME_RANGE),
            voice_speed: read_clamped(
                get("voice_speed"),
                "voice_speed",
                defaults.voice_speed,
                SPEED_RANGE,
            ),
            language: get("language")
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .unwrap_or(defaults.language),
            min_interval: read_seconds(
                get("min_interval"),
                "min_interval",
                defaults.min_interval,
                MIN_INTERVAL_FLOOR,
            ),
            playback_timeout: read_seconds(
                get("playback_timeout"),
                "playback_timeout",
                defaults.playback_timeout,
                PLAYBACK_TIMEOUT_FLOOR,
            ),
            audio_path: get("audio_path")
                .filter(|p| !p.is_empty())
                .map(expand_home)
                .unwrap_or(defaults.audio_path),
            audio_format: match get("audio_format") {
                Some(raw) => raw.parse().unwrap_or_else(|e| {
                    warn!("Invalid audio_format: {}, using {}", e, defaults.audio_format);
                    defaults.audio_format.clone()
                }),
                None => defaults.audio_format,
            },
            audio_player: get("audio_player")
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            audio_player_args: get("audio_player_args")
                .map(|a| a.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            use_hardware_volume: read_bool(
                get("use_hardware_volume"),
                "use_hardware_volume",
                defaults.use_hardware_volume,
            ),
            mixer_control: get("mixer_control")
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .unwrap_or(defaults.mixer_control),
            announcements: defaults.announcements,
        };

        if let Some(section) = ini.section(Some(MESSAGES)) {
            for (key, text) in section.iter() {
                config.entry(MessageType::from(key.trim())).text = text.trim().to_string();
            }
        }

        if let Some(section) = ini.section(Some(AUTO_ANNOUNCE)) {
            for (key, value) in section.iter() {
                let message_type = MessageType::from(key.trim());
                let current = config.auto_announce(&message_type);
                config.entry(message_type).auto = read_bool(Some(value.trim()), key, current);
            }
        }

        debug!("Loaded {} announcement types", config.announcements.len());
        config
    }

    /// Serialize to INI
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some(VOICE))
            .set("enabled", self.enabled.to_string())
            .set("volume", format!("{:.2}", self.volume))
            .set("voice_speed", format!("{:.2}", self.voice_speed))
            .set("language", self.language.as_str())
            .set("min_interval", format!("{}", self.min_interval.as_secs_f32()))
            .set(
                "playback_timeout",
                format!("{}", self.playback_timeout.as_secs_f32()),
            )
            .set("audio_path", self.audio_path.to_string_lossy())
            .set("audio_format", self.audio_format.extension())
            .set("audio_player", self.audio_player.clone().unwrap_or_default())
            .set("audio_player_args", self.audio_player_args.join(" "))
            .set("use_hardware_volume", self.use_hardware_volume.to_string())
            .set("mixer_control", self.mixer_control.as_str());

        for (message_type, announcement) in &self.announcements {
            ini.with_section(Some(MESSAGES))
                .set(message_type.as_str(), announcement.text.as_str());
        }
        for (message_type, announcement) in &self.announcements {
            ini.with_section(Some(AUTO_ANNOUNCE))
                .set(message_type.as_str(), announcement.auto.to_string());
        }

        ini
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        debug!("Saving config to {:?}", path);
        self.to_ini()
            .write_to_file(path)
            .map_err(|e| VoiceError::Config(format!("Failed to save config: {}", e)))
    }

    fn entry(&mut self, message_type: MessageType) -> &mut Announcement {
        self.announcements
            .entry(message_type.clone())
            .or_insert_with(|| Announcement {
                auto: default_auto(&message_type),
                text: message_type.default_text().unwrap_or_default().to_string(),
            })
    }

    /// Should this type be announced automatically on printer events?
    pub fn auto_announce(&self, message_type: &MessageType) -> bool {
        self.announcements
            .get(message_type)
            .map(|a| a.auto)
            .unwrap_or(false)
    }

    /// Configured text for a type (known types always have one)
    pub fn message_text(&self, message_type: &MessageType) -> Option<&str> {
        self.announcements
            .get(message_type)
            .map(|a| a.text.as_str())
    }

    /// Set volume, clamped to 0.0-1.0
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = clamp_logged("volume", volume, VOLUME_RANGE);
    }

    /// Set voice speed, clamped to 0.5-2.0
    pub fn set_voice_speed(&mut self, speed: f32) {
        self.voice_speed = clamp_logged("voice_speed", speed, SPEED_RANGE);
    }

    pub fn set_language(&mut self, language: &str) {
        let language = language.trim();
        if language.is_empty() {
            warn!("Ignoring empty language code");
            return;
        }
        self.language = language.to_string();
    }
}

/// Clamp to `range`, warning when the value had to change
pub fn clamp_logged(name: &str, value: f32, range: (f32, f32)) -> f32 {
    if value.is_nan() {
        warn!("{} is not a number, using {}", name, range.0);
        return range.0;
    }
    let clamped = value.clamp(range.0, range.1);
    if clamped != value {
        warn!("{} {} out of range, clamped to {}", name, value, clamped);
    }
    clamped
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_bool(raw: Option<&str>, name: &str, default: bool) -> bool {
    match raw {
        Some(raw) => parse_bool(raw).unwrap_or_else(|| {
            warn!("Invalid boolean for {}: '{}', using {}", name, raw, default);
            default
        }),
        None => default,
    }
}

fn read_clamped(raw: Option<&str>, name: &str, default: f32, range: (f32, f32)) -> f32 {
    match raw.map(|r| r.parse::<f32>()) {
        Some(Ok(value)) => clamp_logged(name, value, range),
        Some(Err(_)) => {
            warn!("Invalid number for {}, using {}", name, default);
            default
        }
        None => default,
    }
}

fn read_seconds(raw: Option<&str>, name: &str, default: Duration, floor: f32) -> Duration {
    let secs = read_clamped(raw, name, default.as_secs_f32(), (floor, SECONDS_CEILING));
    Duration::from_secs_f32(secs)
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.enabled);
        assert_eq!(config.volume, 0.8);
        assert_eq!(config.language, "en");
        assert_eq!(config.min_interval, Duration::from_secs(2));
        assert!(config.auto_announce(&MessageType::PrintStart));
        assert!(!config.auto_announce(&MessageType::Error));
        assert!(!config.auto_announce(&MessageType::Heating));
        assert_eq!(
            config.message_text(&MessageType::FilamentRunout),
            Some("Filament runout detected")
        );
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let config = Config::parse("[voice]\nvolume = 1.7\nvoice_speed = 0.1\nmin_interval = 0\n")
            .unwrap();
        assert_eq!(config.volume, 1.0);
        assert_eq!(config.voice_speed, 0.5);
        assert_eq!(config.min_interval, Duration::from_secs_f32(MIN_INTERVAL_FLOOR));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::parse(
            "[voice]\nvolume = loud\nenabled = maybe\naudio_format = midi\n",
        )
        .unwrap();
        assert_eq!(config.volume, 0.8);
        assert!(config.enabled);
        assert_eq!(config.audio_format, AudioFormat::Mp3);
    }

    #[test]
    fn test_messages_and_auto_sections() {
        let config = Config::parse(
            "[messages]\nprint_start = Here we go\nbed_leveled = Bed leveled\n\
             [auto_announce]\nerror = True\nprint_end = no\n",
        )
        .unwrap();
        assert_eq!(config.message_text(&MessageType::PrintStart), Some("Here we go"));
        assert_eq!(
            config.message_text(&MessageType::Custom("bed_leveled".to_string())),
            Some("Bed leveled")
        );
        assert!(config.auto_announce(&MessageType::Error));
        assert!(!config.auto_announce(&MessageType::PrintEnd));
    }

    #[test]
    fn test_setters_clamp() {
        let mut config = Config::default();
        config.set_volume(-1.0);
        assert_eq!(config.volume, 0.0);
        config.set_voice_speed(5.0);
        assert_eq!(config.voice_speed, 2.0);
        config.set_volume(f32::NAN);
        assert_eq!(config.volume, 0.0);
        config.set_language("  ");
        assert_eq!(config.language, "en");
        config.set_language("zh");
        assert_eq!(config.language, "zh");
    }

    #[test]
    fn test_player_settings() {
        let config = Config::parse(
            "[voice]\naudio_player = mpg123\naudio_player_args = -q  --no-control\n\
             use_hardware_volume = false\n",
        )
        .unwrap();
        assert_eq!(config.audio_player.as_deref(), Some("mpg123"));
        assert_eq!(config.audio_player_args, vec!["-q", "--no-control"]);
        assert!(!config.use_hardware_volume);
    }
}
