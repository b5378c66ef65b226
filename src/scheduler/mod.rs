//! Announcement scheduling
//!
//! One playback at a time. While something is playing, at most one
//! announcement waits behind it; a newer one replaces it. Playbacks are
//! polled from the host loop and force-stopped by a watchdog.

pub mod limiter;

pub use limiter::RateLimiter;

use crate::assets::MessageType;
use crate::player::{Playback, PlaybackRequest, PlaybackStatus, Player};
use log::{debug, info, warn};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Poll period while a playback is running
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One announcement as requested by a command, event or API call
#[derive(Debug, Clone, PartialEq)]
pub struct AnnouncementRequest {
    pub message_type: MessageType,
    /// Text overriding the configured message
    pub literal_message: Option<String>,
    /// 0.0-1.0, replaces the configured volume for this announcement
    pub volume_override: Option<f32>,
    pub requested_at: Instant,
}

impl AnnouncementRequest {
    pub fn new(message_type: MessageType, requested_at: Instant) -> Self {
        Self {
            message_type,
            literal_message: None,
            volume_override: None,
            requested_at,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.literal_message = Some(message.into());
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume_override = Some(volume);
        self
    }
}

/// Announcement with its audio file resolved, ready to start
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedAnnouncement {
    pub message_type: MessageType,
    pub playback: PlaybackRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Playing,
}

/// Why a request was dropped before resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Disabled,
    RateLimited,
}

/// Why an allowed request produced no playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AssetNotFound,
    /// Custom text without an audio file; there is no speech synthesis
    NoSpeechSynthesis,
    PlayerUnavailable,
}

/// What happened to a submitted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Started,
    /// Waiting for the current playback to finish
    Queued,
    Dropped(DropReason),
    Skipped(SkipReason),
    /// The player could not be started
    Failed(String),
}

impl SubmitOutcome {
    /// Request got past the enabled/rate-limit gate
    pub fn accepted(&self) -> bool {
        !matches!(self, SubmitOutcome::Dropped(_))
    }
}

/// Counters reported by status queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub superseded: u64,
    pub dropped: u64,
}

struct ActivePlayback {
    message_type: MessageType,
    handle: Box<dyn Playback>,
    started_at: Instant,
}

/// Single-playback queue with a one-slot backlog
pub struct Scheduler {
    watchdog: Duration,
    active: Option<ActivePlayback>,
    /// Stopped playbacks whose process has not exited yet
    stopping: Vec<Box<dyn Playback>>,
    pending: Option<PreparedAnnouncement>,
    last_started: Option<(MessageType, Instant)>,
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new(watchdog: Duration) -> Self {
        Self {
            watchdog,
            active: None,
            stopping: Vec::new(),
            pending: None,
            last_started: None,
            stats: SchedulerStats::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        if self.active.is_some() {
            Phase::Playing
        } else {
            Phase::Idle
        }
    }

    /// Start the announcement now, or park it behind the current playback
    pub fn enqueue(
        &mut self,
        announcement: PreparedAnnouncement,
        player: &dyn Player,
        now: Instant,
    ) -> SubmitOutcome {
        self.poll(player, now);

        if self.active.is_none() {
            return self.start(announcement, player, now);
        }

        if let Some(old) = self.pending.replace(announcement) {
            debug!("Pending announcement {} superseded", old.message_type);
            self.stats.superseded += 1;
        }
        SubmitOutcome::Queued
    }

    /// Observe the active playback and advance the queue
    ///
    /// Completion, failure and watchdog expiry all return the scheduler to
    /// idle; a pending announcement is then started.
    pub fn poll(&mut self, player: &dyn Player, now: Instant) {
        self.stopping
            .retain_mut(|handle| handle.poll() == PlaybackStatus::Running);

        if let Some(active) = self.active.as_mut() {
            match active.handle.poll() {
                PlaybackStatus::Running => {
                    if now.saturating_duration_since(active.started_at) >= self.watchdog {
                        warn!(
                            "Audio playback timeout: {} (after {:?})",
                            active.message_type, self.watchdog
                        );
                        self.stats.failed += 1;
                        if let Some(active) = self.active.take() {
                            self.retire(active.handle);
                        }
                    }
                }
                PlaybackStatus::Finished => {
                    debug!("Audio playback completed: {}", active.message_type);
                    self.stats.completed += 1;
                    self.active = None;
                }
                PlaybackStatus::Failed(reason) => {
                    warn!("Audio playback failed: {} ({})", active.message_type, reason);
                    self.stats.failed += 1;
                    self.active = None;
                }
            }
        }

        if self.active.is_none() {
            if let Some(next) = self.pending.take() {
                self.start(next, player, now);
            }
        }
    }

    fn start(
        &mut self,
        announcement: PreparedAnnouncement,
        player: &dyn Player,
        now: Instant,
    ) -> SubmitOutcome {
        match player.play(&announcement.playback) {
            Ok(handle) => {
                info!(
                    "Started audio playback: {} -> {}",
                    announcement.message_type,
                    announcement.playback.path.display()
                );
                self.stats.started += 1;
                self.last_started = Some((announcement.message_type.clone(), now));
                self.active = Some(ActivePlayback {
                    message_type: announcement.message_type,
                    handle,
                    started_at: now,
                });
                SubmitOutcome::Started
            }
            Err(e) => {
                warn!("Audio playback failed: {} ({})", announcement.message_type, e);
                self.stats.failed += 1;
                SubmitOutcome::Failed(e.to_string())
            }
        }
    }

    /// Terminate the active playback and forget the pending one
    ///
    /// Returns true if anything was playing.
    pub fn stop(&mut self) -> bool {
        self.pending = None;
        match self.active.take() {
            Some(active) => {
                debug!("Stopping current audio playback: {}", active.message_type);
                self.retire(active.handle);
                true
            }
            None => false,
        }
    }

    /// Ask a playback to stop and keep polling it until its process exits
    fn retire(&mut self, mut handle: Box<dyn Playback>) {
        handle.stop();
        if handle.poll() == PlaybackStatus::Running {
            self.stopping.push(handle);
        }
    }

    /// Drop the waiting announcement, leaving the active one alone
    pub fn clear_pending(&mut self) {
        if self.pending.take().is_some() {
            debug!("Pending announcement discarded");
        }
    }

    pub fn record_drop(&mut self) {
        self.stats.dropped += 1;
    }

    /// Number of waiting announcements (0 or 1)
    pub fn queue_length(&self) -> usize {
        usize::from(self.pending.is_some())
    }

    pub fn last_started(&self) -> Option<&(MessageType, Instant)> {
        self.last_started.as_ref()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// How long the host loop may sleep before the next poll
    pub fn time_until_next_poll(&self) -> Option<Duration> {
        (self.active.is_some() || !self.stopping.is_empty()).then_some(POLL_INTERVAL)
    }
}
