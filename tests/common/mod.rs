//! Shared fixtures: a scripted player and a temp audio directory

#![allow(dead_code)]

use klipper_voice::assets::AudioFormat;
use klipper_voice::player::{Playback, PlaybackRequest, PlaybackStatus, Player, PlayerCapability};
use klipper_voice::state::config::Config;
use klipper_voice::state::State;
use klipper_voice::{Result, VoiceError};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Shared view of every playback a `FakePlayer` started
#[derive(Clone, Default)]
pub struct PlayLog {
    pub requests: Arc<Mutex<Vec<PlaybackRequest>>>,
    pub status: Arc<Mutex<Option<PlaybackStatus>>>,
    pub stops: Arc<Mutex<usize>>,
}

impl PlayLog {
    pub fn paths(&self) -> Vec<PathBuf> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.path.clone())
            .collect()
    }

    pub fn last(&self) -> Option<PlaybackRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// Status every running playback reports on its next poll
    pub fn set_status(&self, status: PlaybackStatus) {
        *self.status.lock().unwrap() = Some(status);
    }

    pub fn stops(&self) -> usize {
        *self.stops.lock().unwrap()
    }
}

struct FakePlayback {
    log: PlayLog,
    stopped: bool,
}

impl Playback for FakePlayback {
    fn poll(&mut self) -> PlaybackStatus {
        if self.stopped {
            return PlaybackStatus::Finished;
        }
        self.log
            .status
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(PlaybackStatus::Running)
    }

    fn stop(&mut self) {
        self.stopped = true;
        *self.log.stops.lock().unwrap() += 1;
    }
}

/// Player that never touches audio hardware
pub struct FakePlayer {
    capability: PlayerCapability,
    log: PlayLog,
    fail_spawn: bool,
}

impl FakePlayer {
    pub fn new(log: PlayLog) -> Self {
        Self {
            capability: PlayerCapability::new("fake", vec![AudioFormat::Mp3, AudioFormat::Wav]),
            log,
            fail_spawn: false,
        }
    }

    pub fn failing(log: PlayLog) -> Self {
        Self {
            fail_spawn: true,
            ..Self::new(log)
        }
    }
}

impl Player for FakePlayer {
    fn capability(&self) -> &PlayerCapability {
        &self.capability
    }

    fn play(&self, request: &PlaybackRequest) -> Result<Box<dyn Playback>> {
        if self.fail_spawn {
            return Err(VoiceError::PlaybackFailed("no such device".to_string()));
        }
        // A fresh playback starts out running
        *self.log.status.lock().unwrap() = None;
        self.log.requests.lock().unwrap().push(request.clone());
        Ok(Box::new(FakePlayback {
            log: self.log.clone(),
            stopped: false,
        }))
    }
}

/// Temp audio directory holding the given (empty) files
pub fn audio_dir(files: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for name in files {
        fs::write(dir.path().join(name), b"audio").unwrap();
    }
    dir
}

/// Engine over `dir` with a fake player; returns the state and its play log
pub fn fake_state(dir: &TempDir, tweak: impl FnOnce(&mut Config)) -> (State, PlayLog) {
    let mut config = Config::default();
    config.audio_path = dir.path().to_path_buf();
    tweak(&mut config);

    let log = PlayLog::default();
    let player: Arc<dyn Player> = Arc::new(FakePlayer::new(log.clone()));
    (State::with_player(config, Some(player)), log)
}
