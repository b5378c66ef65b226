//! Known playback programs and how to drive them

use crate::assets::AudioFormat;

/// Static description of a playback program
pub struct ProgramSpec {
    pub name: &'static str,
    /// Formats it decodes, most preferred first
    pub formats: &'static [AudioFormat],
    /// Arguments always passed (quiet mode, no video window, ...)
    pub base_args: &'static [&'static str],
    /// Builds the volume arguments from a 0.0-1.0 level
    pub volume_args: Option<fn(f32) -> Vec<String>>,
    /// Builds the speed arguments from a 0.5-2.0 factor
    pub speed_args: Option<fn(f32) -> Vec<String>>,
}

const ALL_FORMATS: &[AudioFormat] = &[
    AudioFormat::Mp3,
    AudioFormat::Ogg,
    AudioFormat::Opus,
    AudioFormat::Flac,
    AudioFormat::Wav,
    AudioFormat::M4a,
];

/// Detection order: full-format players first, then single-format ones
pub static PROGRAMS: &[ProgramSpec] = &[
    ProgramSpec {
        name: "mpv",
        formats: ALL_FORMATS,
        base_args: &["--no-video", "--really-quiet"],
        volume_args: Some(|v| vec![format!("--volume={}", percent(v))]),
        speed_args: Some(|s| vec![format!("--speed={:.2}", s)]),
    },
    ProgramSpec {
        name: "ffplay",
        formats: ALL_FORMATS,
        base_args: &["-nodisp", "-autoexit", "-loglevel", "quiet"],
        volume_args: Some(|v| vec!["-volume".to_string(), percent(v).to_string()]),
        // atempo accepts 0.5-2.0, the same range as voice_speed
        speed_args: Some(|s| vec!["-af".to_string(), format!("atempo={:.2}", s)]),
    },
    ProgramSpec {
        name: "mpg123",
        formats: &[AudioFormat::Mp3],
        base_args: &["-q"],
        volume_args: Some(|v| vec!["-f".to_string(), scaled(v, 32768).to_string()]),
        speed_args: None,
    },
    ProgramSpec {
        name: "paplay",
        formats: &[AudioFormat::Wav, AudioFormat::Ogg, AudioFormat::Flac],
        base_args: &[],
        volume_args: Some(|v| vec![format!("--volume={}", scaled(v, 65536))]),
        speed_args: None,
    },
    ProgramSpec {
        name: "aplay",
        formats: &[AudioFormat::Wav],
        base_args: &["-q"],
        volume_args: None,
        speed_args: None,
    },
];

/// Look up a known program by name or by the file name of a path
pub fn find_spec(program: &str) -> Option<&'static ProgramSpec> {
    let name = program.rsplit('/').next().unwrap_or(program);
    PROGRAMS.iter().find(|spec| spec.name == name)
}

/// Convert volume (0.0-1.0) to a 0-100 percentage
pub fn percent(volume: f32) -> u32 {
    scaled(volume, 100)
}

fn scaled(volume: f32, max: u32) -> u32 {
    (volume.clamp(0.0, 1.0) * max as f32).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_spec() {
        assert_eq!(find_spec("mpg123").map(|s| s.name), Some("mpg123"));
        assert_eq!(find_spec("/usr/bin/aplay").map(|s| s.name), Some("aplay"));
        assert!(find_spec("vlc").is_none());
    }

    #[test]
    fn test_volume_conversion() {
        assert_eq!(percent(0.0), 0);
        assert_eq!(percent(0.8), 80);
        assert_eq!(percent(1.0), 100);
        assert_eq!(percent(3.0), 100);
        assert_eq!(scaled(0.5, 32768), 16384);
    }

    #[test]
    fn test_mpv_flags() {
        let spec = find_spec("mpv").unwrap();
        let volume = spec.volume_args.unwrap()(0.5);
        assert_eq!(volume, vec!["--volume=50".to_string()]);
        let speed = spec.speed_args.unwrap()(1.25);
        assert_eq!(speed, vec!["--speed=1.25".to_string()]);
    }

    #[test]
    fn test_single_format_players_have_no_speed() {
        for name in ["mpg123", "paplay", "aplay"] {
            assert!(find_spec(name).unwrap().speed_args.is_none());
        }
        assert!(find_spec("aplay").unwrap().volume_args.is_none());
    }
}
