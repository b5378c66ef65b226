//! Announcement engine state
//!
//! `State` is the context object every trigger path goes through: commands,
//! printer events and API calls all submit announcements here. It owns the
//! configuration, the current asset index snapshot, the detected player and
//! the scheduler. All methods take `&self`, so it can be shared behind an
//! `Arc` between trigger paths.

pub mod config;

use crate::assets::{resolve, AssetIndex, MessageType};
use crate::player::{detect_player, PlaybackRequest, Player};
use crate::scheduler::{
    AnnouncementRequest, DropReason, Phase, PreparedAnnouncement, RateLimiter, Scheduler,
    SchedulerStats, SkipReason, SubmitOutcome,
};
use crate::Result;
use config::{clamp_logged, Config, VOLUME_RANGE};
use log::{debug, error, info};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Snapshot reported by STATUS and the status API
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub enabled: bool,
    pub volume: f32,
    pub voice_speed: f32,
    pub language: String,
    /// Seconds the rate limiter keeps between announcements
    pub min_interval: f64,
    pub player: Option<String>,
    pub phase: Phase,
    pub indexed_files: usize,
    pub message_types: usize,
    pub last_announcement: Option<MessageType>,
    pub seconds_since_last_announcement: Option<f64>,
    pub queue_length: usize,
    pub stats: SchedulerStats,
}

/// Main announcement engine state
pub struct State {
    /// Settings, changed at runtime by CONFIG
    config: RwLock<Config>,

    /// Where CONFIG changes are persisted, if anywhere
    config_path: Option<PathBuf>,

    /// Replaced wholesale on rescan; readers clone the Arc
    index: RwLock<Arc<AssetIndex>>,

    /// `None` means silent mode: announcements are only logged
    player: RwLock<Option<Arc<dyn Player>>>,

    /// Detect the player again on rescan (off when one was injected)
    auto_detect: bool,

    limiter: RateLimiter,

    scheduler: Mutex<Scheduler>,
}

impl State {
    /// Create state with a detected player
    ///
    /// Creates the audio directory if needed and scans it. Failures are
    /// logged; the engine still starts.
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Self {
        if !config.audio_path.exists() {
            match fs::create_dir_all(&config.audio_path) {
                Ok(()) => info!("Created audio directory: {}", config.audio_path.display()),
                Err(e) => error!(
                    "Failed to create audio directory {}: {}",
                    config.audio_path.display(),
                    e
                ),
            }
        }

        let player = detect_player(&config).map(|p| Arc::new(p) as Arc<dyn Player>);
        let mut state = Self::with_player(config, player);
        state.auto_detect = true;
        state.config_path = config_path;
        state
    }

    /// Create state around a given player (`None` for silent mode)
    pub fn with_player(config: Config, player: Option<Arc<dyn Player>>) -> Self {
        let index = AssetIndex::rebuild(&config.audio_path).unwrap_or_else(|e| {
            error!("Error scanning audio files: {}", e);
            AssetIndex::new()
        });

        info!(
            "Voice state initialized - enabled: {}, volume: {:.1}, player: {}",
            config.enabled,
            config.volume,
            player
                .as_ref()
                .map(|p| p.capability().program_name.as_str())
                .unwrap_or("none")
        );

        Self {
            limiter: RateLimiter::new(config.min_interval),
            scheduler: Mutex::new(Scheduler::new(config.playback_timeout)),
            config: RwLock::new(config),
            config_path: None,
            index: RwLock::new(Arc::new(index)),
            player: RwLock::new(player),
            auto_detect: false,
        }
    }

    fn read_config(&self) -> RwLockReadGuard<'_, Config> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_config(&self) -> RwLockWriteGuard<'_, Config> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_scheduler(&self) -> MutexGuard<'_, Scheduler> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current configuration
    pub fn config(&self) -> Config {
        self.read_config().clone()
    }

    /// Current asset index snapshot
    pub fn index(&self) -> Arc<AssetIndex> {
        Arc::clone(&self.index.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Detected player, if any
    pub fn player(&self) -> Option<Arc<dyn Player>> {
        self.player
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn player_name(&self) -> Option<String> {
        self.player()
            .map(|p| p.capability().program_name.clone())
    }

    // ========== Configuration ==========

    /// Enable or disable announcements
    ///
    /// Disabling lets the current playback finish but discards the pending one.
    pub fn set_enabled(&self, enabled: bool) {
        self.write_config().enabled = enabled;
        if !enabled {
            self.lock_scheduler().clear_pending();
        }
    }

    pub fn set_volume(&self, volume: f32) {
        self.write_config().set_volume(volume);
    }

    pub fn set_voice_speed(&self, speed: f32) {
        self.write_config().set_voice_speed(speed);
    }

    pub fn set_language(&self, language: &str) {
        self.write_config().set_language(language);
    }

    /// Persist the configuration if it came from a file
    pub fn save_config(&self) -> Result<()> {
        match &self.config_path {
            Some(path) => self.read_config().save(path),
            None => Ok(()),
        }
    }

    // ========== Asset index ==========

    /// Rebuild the asset index and swap it in
    ///
    /// The scan runs without holding any lock; announcements in flight keep
    /// using the previous snapshot. The player is detected again unless it
    /// was injected.
    pub fn rescan(&self) -> Result<Arc<AssetIndex>> {
        let config = self.config();
        info!("Rescanning audio files in {}", config.audio_path.display());
        let index = Arc::new(AssetIndex::rebuild(&config.audio_path)?);
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&index);

        if self.auto_detect {
            let player = detect_player(&config).map(|p| Arc::new(p) as Arc<dyn Player>);
            *self.player.write().unwrap_or_else(PoisonError::into_inner) = player;
        }

        Ok(index)
    }

    // ========== Announcements ==========

    /// Submit an announcement
    ///
    /// Never fails: every problem ends in a logged outcome.
    pub fn announce(&self, request: AnnouncementRequest) -> SubmitOutcome {
        let now = request.requested_at;
        let config = self.config();

        if !config.enabled {
            debug!("Announcement blocked - disabled");
            self.lock_scheduler().record_drop();
            return SubmitOutcome::Dropped(DropReason::Disabled);
        }

        if !self.limiter.allow(now) {
            debug!("Announcement blocked - too frequent");
            self.lock_scheduler().record_drop();
            return SubmitOutcome::Dropped(DropReason::RateLimited);
        }

        let message_type = request.message_type;
        let text = request
            .literal_message
            .as_deref()
            .or_else(|| config.message_text(&message_type))
            .unwrap_or("Unknown message")
            .to_string();

        info!(
            "VOICE ANNOUNCEMENT [{}]: {} (volume: {:.1}, speed: {:.1}, lang: {})",
            message_type.as_str().to_uppercase(),
            text,
            request.volume_override.unwrap_or(config.volume),
            config.voice_speed,
            config.language
        );

        let Some(player) = self.player() else {
            debug!("No audio player, announcement logged only");
            return SubmitOutcome::Skipped(SkipReason::PlayerUnavailable);
        };

        let capability = player.capability().preferring(&config.audio_format);
        let index = self.index();
        let asset = match resolve(&index, &message_type, &config.language, &capability) {
            Ok(asset) => asset,
            Err(e) if request.literal_message.is_some() => {
                info!("{}; no speech synthesis for custom text '{}'", e, text);
                return SubmitOutcome::Skipped(SkipReason::NoSpeechSynthesis);
            }
            Err(e) => {
                info!("{}", e);
                return SubmitOutcome::Skipped(SkipReason::AssetNotFound);
            }
        };

        let volume = request
            .volume_override
            .map(|v| clamp_logged("volume", v, VOLUME_RANGE))
            .unwrap_or(config.volume);

        let prepared = PreparedAnnouncement {
            message_type,
            playback: PlaybackRequest {
                path: asset.path,
                volume,
                speed: config.voice_speed,
            },
        };

        self.lock_scheduler().enqueue(prepared, player.as_ref(), now)
    }

    /// Drive playback completion, the watchdog and the pending slot
    ///
    /// Called from the host loop.
    pub fn tick(&self, now: Instant) {
        if let Some(player) = self.player() {
            self.lock_scheduler().poll(player.as_ref(), now);
        }
    }

    /// Stop the current playback and drop the pending one
    pub fn stop(&self) -> bool {
        self.lock_scheduler().stop()
    }

    pub fn phase(&self) -> Phase {
        self.lock_scheduler().phase()
    }

    /// How long the host loop may wait before calling `tick` again
    pub fn time_until_next_tick(&self) -> Option<Duration> {
        self.lock_scheduler().time_until_next_poll()
    }

    pub fn status(&self) -> Status {
        let config = self.config();
        let index = self.index();
        let scheduler = self.lock_scheduler();
        let last = scheduler.last_started();

        Status {
            enabled: config.enabled,
            volume: config.volume,
            voice_speed: config.voice_speed,
            language: config.language,
            min_interval: self.limiter.min_interval().as_secs_f64(),
            player: self.player_name(),
            phase: scheduler.phase(),
            indexed_files: index.len(),
            message_types: index.message_types().len(),
            last_announcement: last.map(|(t, _)| t.clone()),
            seconds_since_last_announcement: last.map(|(_, at)| at.elapsed().as_secs_f64()),
            queue_length: scheduler.queue_length(),
            stats: scheduler.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent_state() -> State {
        let mut config = Config::default();
        config.audio_path = PathBuf::from("/nonexistent/klipper_voice_files");
        State::with_player(config, None)
    }

    #[test]
    fn test_silent_mode_skips() {
        let state = silent_state();
        let outcome = state.announce(AnnouncementRequest::new(MessageType::Ready, Instant::now()));
        assert_eq!(outcome, SubmitOutcome::Skipped(SkipReason::PlayerUnavailable));
    }

    #[test]
    fn test_disabled_drops() {
        let state = silent_state();
        state.set_enabled(false);
        let outcome = state.announce(AnnouncementRequest::new(MessageType::Ready, Instant::now()));
        assert_eq!(outcome, SubmitOutcome::Dropped(DropReason::Disabled));
        assert_eq!(state.status().stats.dropped, 1);
    }

    #[test]
    fn test_config_setters_clamp() {
        let state = silent_state();
        state.set_volume(4.0);
        state.set_voice_speed(0.0);
        state.set_language("de");
        let status = state.status();
        assert_eq!(status.volume, 1.0);
        assert_eq!(status.voice_speed, 0.5);
        assert_eq!(status.language, "de");
        assert_eq!(status.player, None);
        assert_eq!(status.indexed_files, 0);
    }

    #[test]
    fn test_save_without_path_is_noop() {
        assert!(silent_state().save_config().is_ok());
    }
}
