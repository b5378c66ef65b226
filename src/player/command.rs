//! Player backed by an external program
//!
//! Each playback is a child process with its output discarded, started in a
//! process group of its own so a stop reaches any helpers it forks. The
//! process is polled with `try_wait`, never waited on from the caller's path.

use super::mixer::set_hardware_volume;
use super::programs::ProgramSpec;
use super::{Playback, PlaybackRequest, PlaybackStatus, Player, PlayerCapability};
use crate::{Result, VoiceError};
use log::{debug, error, warn};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// How long a stopped player gets to exit after SIGTERM before it is killed
const STOP_GRACE: Duration = Duration::from_millis(200);

/// Playback program detected on this host
pub struct CommandPlayer {
    capability: PlayerCapability,

    /// Resolved executable path
    program_path: PathBuf,

    /// Flag builders; `None` for unknown user-configured programs
    spec: Option<&'static ProgramSpec>,

    /// Extra arguments from the configuration
    extra_args: Vec<String>,

    /// Drive the system mixer when the program has no gain flag
    use_hardware_volume: bool,

    /// amixer control name
    mixer_control: String,
}

impl CommandPlayer {
    /// Player for one of the built-in programs
    pub fn known(spec: &'static ProgramSpec, program_path: PathBuf) -> Self {
        Self {
            capability: PlayerCapability {
                program_name: spec.name.to_string(),
                supported_formats: spec.formats.to_vec(),
                supports_volume_flag: spec.volume_args.is_some(),
                supports_speed_flag: spec.speed_args.is_some(),
            },
            program_path,
            spec: Some(spec),
            extra_args: Vec::new(),
            use_hardware_volume: false,
            mixer_control: "Master".to_string(),
        }
    }

    /// Player for a program we know nothing about besides its path
    pub fn generic(capability: PlayerCapability, program_path: PathBuf) -> Self {
        Self {
            capability,
            program_path,
            spec: None,
            extra_args: Vec::new(),
            use_hardware_volume: false,
            mixer_control: "Master".to_string(),
        }
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn with_hardware_volume(mut self, enabled: bool, control: &str) -> Self {
        self.use_hardware_volume = enabled;
        self.mixer_control = control.to_string();
        self
    }

    /// Full argument list for a request (program path excluded)
    pub fn build_args(&self, request: &PlaybackRequest) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();

        if let Some(spec) = self.spec {
            args.extend(spec.base_args.iter().map(|a| a.to_string()));
        }
        args.extend(self.extra_args.iter().cloned());

        if let Some(volume_args) = self.spec.and_then(|s| s.volume_args) {
            args.extend(volume_args(request.volume));
        }

        if (request.speed - 1.0).abs() > f32::EPSILON {
            match self.spec.and_then(|s| s.speed_args) {
                Some(speed_args) => args.extend(speed_args(request.speed)),
                None => debug!(
                    "{} has no speed control, playing at normal speed",
                    self.capability.program_name
                ),
            }
        }

        args.push(request.path.to_string_lossy().into_owned());
        args
    }
}

impl Player for CommandPlayer {
    fn capability(&self) -> &PlayerCapability {
        &self.capability
    }

    fn play(&self, request: &PlaybackRequest) -> Result<Box<dyn Playback>> {
        let mixer = if !self.capability.supports_volume_flag && self.use_hardware_volume {
            set_hardware_volume(&self.mixer_control, request.volume)
        } else {
            None
        };

        let args = self.build_args(request);
        debug!(
            "Executing audio command: {} {}",
            self.program_path.display(),
            args.join(" ")
        );

        let mut cmd = Command::new(&self.program_path);
        cmd.args(&args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        cmd.process_group(0);

        match cmd.spawn() {
            Ok(child) => {
                debug!("{} process started", self.capability.program_name);
                Ok(Box::new(ChildPlayback {
                    child: Some(child),
                    mixer,
                    program: self.capability.program_name.clone(),
                    terminated_at: None,
                    killed: false,
                }))
            }
            Err(e) => {
                error!("Failed to spawn {}: {}", self.capability.program_name, e);
                Err(VoiceError::PlaybackFailed(format!(
                    "failed to start {}: {}",
                    self.capability.program_name, e
                )))
            }
        }
    }
}

/// Running playback process
struct ChildPlayback {
    /// `None` once the process has been reaped
    child: Option<Child>,

    /// amixer call started alongside, reaped opportunistically
    mixer: Option<Child>,

    program: String,

    /// When SIGTERM was sent; SIGKILL follows after `STOP_GRACE`
    terminated_at: Option<Instant>,

    killed: bool,
}

impl ChildPlayback {
    fn reap_mixer(&mut self) {
        if let Some(mixer) = self.mixer.as_mut() {
            if !matches!(mixer.try_wait(), Ok(None)) {
                self.mixer = None;
            }
        }
    }

    /// Signal the player's whole process group
    fn signal(&self, signal: Signal) {
        let Some(child) = self.child.as_ref() else {
            return;
        };
        let group = Pid::from_raw(child.id() as i32);
        if let Err(e) = killpg(group, signal) {
            debug!("{:?} to {} failed: {}", signal, self.program, e);
        }
    }
}

/// Wait for a process on a throwaway thread so it does not linger as a zombie
fn reap_in_background(mut child: Child) {
    thread::spawn(move || {
        let _ = child.wait();
    });
}

impl Playback for ChildPlayback {
    fn poll(&mut self) -> PlaybackStatus {
        self.reap_mixer();

        let Some(child) = self.child.as_mut() else {
            return PlaybackStatus::Finished;
        };

        match child.try_wait() {
            Ok(None) => {
                let overdue = self
                    .terminated_at
                    .is_some_and(|at| at.elapsed() >= STOP_GRACE);
                if overdue && !self.killed {
                    warn!("{} ignored SIGTERM, killing it", self.program);
                    self.signal(Signal::SIGKILL);
                    self.killed = true;
                }
                PlaybackStatus::Running
            }
            Ok(Some(status)) => {
                self.child = None;
                if status.success() || self.terminated_at.is_some() {
                    PlaybackStatus::Finished
                } else {
                    PlaybackStatus::Failed(format!("{} exited with {}", self.program, status))
                }
            }
            Err(e) => {
                self.child = None;
                PlaybackStatus::Failed(format!("failed to poll {}: {}", self.program, e))
            }
        }
    }

    fn stop(&mut self) {
        if self.child.is_none() || self.terminated_at.is_some() {
            return;
        }

        debug!("Stopping {} process", self.program);
        self.signal(Signal::SIGTERM);
        self.terminated_at = Some(Instant::now());
    }
}

impl Drop for ChildPlayback {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if matches!(child.try_wait(), Ok(None)) {
                let group = Pid::from_raw(child.id() as i32);
                if let Err(e) = killpg(group, Signal::SIGKILL) {
                    debug!("SIGKILL to {} failed: {}", self.program, e);
                }
                reap_in_background(child);
            }
        }
        if let Some(mut mixer) = self.mixer.take() {
            if matches!(mixer.try_wait(), Ok(None)) {
                reap_in_background(mixer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AudioFormat;
    use crate::player::programs::find_spec;

    fn request(volume: f32, speed: f32) -> PlaybackRequest {
        PlaybackRequest {
            path: PathBuf::from("/audio/ready.en.mp3"),
            volume,
            speed,
        }
    }

    #[test]
    fn test_mpg123_args() {
        let player = CommandPlayer::known(find_spec("mpg123").unwrap(), "mpg123".into());
        let args = player.build_args(&request(0.5, 1.5));
        assert_eq!(args, vec!["-q", "-f", "16384", "/audio/ready.en.mp3"]);
    }

    #[test]
    fn test_mpv_args_with_speed() {
        let player = CommandPlayer::known(find_spec("mpv").unwrap(), "mpv".into());
        let args = player.build_args(&request(1.0, 0.5));
        assert_eq!(
            args,
            vec![
                "--no-video",
                "--really-quiet",
                "--volume=100",
                "--speed=0.50",
                "/audio/ready.en.mp3"
            ]
        );
    }

    #[test]
    fn test_normal_speed_adds_no_flag() {
        let player = CommandPlayer::known(find_spec("ffplay").unwrap(), "ffplay".into());
        let args = player.build_args(&request(0.8, 1.0));
        assert!(!args.iter().any(|a| a.starts_with("atempo")));
    }

    #[test]
    fn test_generic_player_args() {
        let cap = PlayerCapability::new("myplayer", vec![AudioFormat::Mp3]);
        let player = CommandPlayer::generic(cap, "/opt/myplayer".into())
            .with_extra_args(vec!["--quiet".to_string()]);
        let args = player.build_args(&request(0.3, 2.0));
        assert_eq!(args, vec!["--quiet", "/audio/ready.en.mp3"]);
    }

    #[test]
    fn test_child_playback_lifecycle() {
        // `true` ignores its arguments and exits 0
        let cap = PlayerCapability::new("true", vec![AudioFormat::Mp3]);
        let player = CommandPlayer::generic(cap, "/bin/true".into());
        let mut playback = match player.play(&request(1.0, 1.0)) {
            Ok(p) => p,
            Err(e) => {
                println!("⚠ /bin/true not available: {}", e);
                return;
            }
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut status = playback.poll();
        while status == PlaybackStatus::Running && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
            status = playback.poll();
        }
        assert_eq!(status, PlaybackStatus::Finished);
    }

    #[test]
    fn test_nonzero_exit_is_failure() {
        let cap = PlayerCapability::new("false", vec![AudioFormat::Mp3]);
        let player = CommandPlayer::generic(cap, "/bin/false".into());
        let mut playback = match player.play(&request(1.0, 1.0)) {
            Ok(p) => p,
            Err(e) => {
                println!("⚠ /bin/false not available: {}", e);
                return;
            }
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut status = playback.poll();
        while status == PlaybackStatus::Running && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
            status = playback.poll();
        }
        assert!(matches!(status, PlaybackStatus::Failed(_)));
    }

    /// Start a shell script that ignores SIGTERM and touches its argument
    /// once the trap is in place
    fn start_stubborn_player(dir: &tempfile::TempDir) -> Option<(Box<dyn Playback>, PathBuf)> {
        let script = dir.path().join("stubborn.sh");
        std::fs::write(&script, "trap '' TERM\n: > \"$1\"\nsleep 5\n").unwrap();
        let marker = dir.path().join("started");

        let cap = PlayerCapability::new("sh", vec![AudioFormat::Mp3]);
        let player = CommandPlayer::generic(cap, "/bin/sh".into())
            .with_extra_args(vec![script.to_string_lossy().into_owned()]);
        let playback = match player.play(&PlaybackRequest {
            path: marker.clone(),
            volume: 1.0,
            speed: 1.0,
        }) {
            Ok(p) => p,
            Err(e) => {
                println!("⚠ /bin/sh not available: {}", e);
                return None;
            }
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while !marker.exists() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(marker.exists(), "script never started");
        Some((playback, marker))
    }

    #[test]
    fn test_stop_does_not_block_on_stubborn_player() {
        let dir = tempfile::tempdir().unwrap();
        let Some((mut playback, _)) = start_stubborn_player(&dir) else {
            return;
        };

        let started = Instant::now();
        playback.stop();
        assert!(started.elapsed() < Duration::from_millis(100));
        // SIGTERM is ignored and the grace period has not run out yet
        assert_eq!(playback.poll(), PlaybackStatus::Running);

        let deadline = Instant::now() + Duration::from_secs(3);
        let mut status = playback.poll();
        while status == PlaybackStatus::Running && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
            status = playback.poll();
        }
        // Killed well before `sleep 5` would have returned
        assert_eq!(status, PlaybackStatus::Finished);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_drop_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let Some((playback, _)) = start_stubborn_player(&dir) else {
            return;
        };

        let started = Instant::now();
        drop(playback);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_spawn_failure_is_playback_failed() {
        let cap = PlayerCapability::new("missing", vec![AudioFormat::Mp3]);
        let player = CommandPlayer::generic(cap, "/nonexistent/player".into());
        assert!(matches!(
            player.play(&request(1.0, 1.0)),
            Err(VoiceError::PlaybackFailed(_))
        ));
    }
}
