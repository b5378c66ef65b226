//! Printer lifecycle events
//!
//! The host delivers notifications; this module maps them onto message types
//! and submits announcements for the ones enabled in `[auto_announce]`.

use crate::assets::MessageType;
use crate::scheduler::{AnnouncementRequest, SubmitOutcome};
use crate::state::State;
use log::debug;
use std::str::FromStr;
use std::time::Instant;

/// Within this many degrees of the target a heater counts as "reached"
pub const TEMPERATURE_TOLERANCE: f32 = 2.0;

/// Lifecycle notification from the printer host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterEvent {
    Ready,
    PrintStarted,
    PrintPaused,
    PrintResumed,
    PrintCancelled,
    PrintCompleted,
    Heating,
    TemperatureReached,
    FilamentRunout,
    Error,
    Shutdown,
}

impl PrinterEvent {
    /// Message announced for this event; `None` for events that only act
    pub fn message_type(&self) -> Option<MessageType> {
        let message_type = match self {
            PrinterEvent::Ready => MessageType::Ready,
            PrinterEvent::PrintStarted => MessageType::PrintStart,
            PrinterEvent::PrintPaused => MessageType::PrintPause,
            PrinterEvent::PrintResumed => MessageType::PrintResume,
            PrinterEvent::PrintCancelled => MessageType::PrintCancel,
            PrinterEvent::PrintCompleted => MessageType::PrintEnd,
            PrinterEvent::Heating => MessageType::Heating,
            PrinterEvent::TemperatureReached => MessageType::TempReached,
            PrinterEvent::FilamentRunout => MessageType::FilamentRunout,
            PrinterEvent::Error => MessageType::Error,
            PrinterEvent::Shutdown => return None,
        };
        Some(message_type)
    }
}

impl FromStr for PrinterEvent {
    type Err = String;

    /// Accepts message type names and the host's own event names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let event = match s.trim().to_ascii_lowercase().as_str() {
            "ready" | "klippy:ready" => PrinterEvent::Ready,
            "print_start" | "print_started" => PrinterEvent::PrintStarted,
            "print_pause" | "print_paused" => PrinterEvent::PrintPaused,
            "print_resume" | "print_resumed" => PrinterEvent::PrintResumed,
            "print_cancel" | "print_cancelled" => PrinterEvent::PrintCancelled,
            "print_end" | "print_complete" | "print_completed" => PrinterEvent::PrintCompleted,
            "heating" => PrinterEvent::Heating,
            "temp_reached" | "temperature_reached" => PrinterEvent::TemperatureReached,
            "filament_runout" | "runout" => PrinterEvent::FilamentRunout,
            "error" => PrinterEvent::Error,
            "shutdown" | "klippy:shutdown" => PrinterEvent::Shutdown,
            other => return Err(format!("Unknown printer event '{}'", other)),
        };
        Ok(event)
    }
}

/// Receiver of printer events
///
/// The host integration only needs this one call.
pub trait EventSink {
    /// Handle an event; returns the submit outcome if an announcement was made
    fn on_event(&self, event: PrinterEvent, now: Instant) -> Option<SubmitOutcome>;
}

impl EventSink for State {
    fn on_event(&self, event: PrinterEvent, now: Instant) -> Option<SubmitOutcome> {
        debug!("Printer event received: {:?}", event);

        let Some(message_type) = event.message_type() else {
            self.stop();
            return None;
        };

        if !self.config().auto_announce(&message_type) {
            debug!("Auto-announce off for {}", message_type);
            return None;
        }

        Some(self.announce(AnnouncementRequest::new(message_type, now)))
    }
}

/// Turns `print_stats.state` transitions into lifecycle events
#[derive(Debug, Default)]
pub struct PrintStateTracker {
    last: Option<String>,
}

impl PrintStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the latest state; returns an event when the state changed
    pub fn update(&mut self, state: &str) -> Option<PrinterEvent> {
        let state = state.trim().to_ascii_lowercase();
        let previous = self.last.replace(state.clone());
        if previous.as_deref() == Some(state.as_str()) {
            return None;
        }

        match (previous.as_deref(), state.as_str()) {
            (Some("paused"), "printing") => Some(PrinterEvent::PrintResumed),
            (_, "printing") => Some(PrinterEvent::PrintStarted),
            (Some(_), "paused") => Some(PrinterEvent::PrintPaused),
            (Some(_), "complete") => Some(PrinterEvent::PrintCompleted),
            (Some(_), "cancelled") => Some(PrinterEvent::PrintCancelled),
            (Some(_), "error") => Some(PrinterEvent::Error),
            _ => None,
        }
    }
}

/// Watches one heater and reports heating / target-reached milestones
#[derive(Debug, Default)]
pub struct TemperatureTracker {
    target: f32,
    reached: bool,
    /// Started below the target, so any sample at or past it counts
    heating: bool,
}

impl TemperatureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a `(temperature, target)` sample
    pub fn update(&mut self, temperature: f32, target: f32) -> Option<PrinterEvent> {
        if target <= 0.0 {
            self.target = 0.0;
            self.reached = false;
            self.heating = false;
            return None;
        }

        if (target - self.target).abs() > f32::EPSILON {
            self.target = target;
            self.reached = (target - temperature).abs() <= TEMPERATURE_TOLERANCE;
            self.heating = !self.reached && temperature < target;
            return self.heating.then_some(PrinterEvent::Heating);
        }

        let arrived = if self.heating {
            temperature >= target - TEMPERATURE_TOLERANCE
        } else {
            (target - temperature).abs() <= TEMPERATURE_TOLERANCE
        };

        if !self.reached && arrived {
            self.reached = true;
            return Some(PrinterEvent::TemperatureReached);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!("klippy:ready".parse::<PrinterEvent>(), Ok(PrinterEvent::Ready));
        assert_eq!("print_start".parse::<PrinterEvent>(), Ok(PrinterEvent::PrintStarted));
        assert_eq!("PRINT_END".parse::<PrinterEvent>(), Ok(PrinterEvent::PrintCompleted));
        assert!("bogus".parse::<PrinterEvent>().is_err());
    }

    #[test]
    fn test_event_message_types() {
        assert_eq!(PrinterEvent::PrintCompleted.message_type(), Some(MessageType::PrintEnd));
        assert_eq!(
            PrinterEvent::TemperatureReached.message_type(),
            Some(MessageType::TempReached)
        );
        assert_eq!(PrinterEvent::Shutdown.message_type(), None);
    }

    #[test]
    fn test_print_state_transitions() {
        let mut tracker = PrintStateTracker::new();
        assert_eq!(tracker.update("standby"), None);
        assert_eq!(tracker.update("printing"), Some(PrinterEvent::PrintStarted));
        assert_eq!(tracker.update("printing"), None);
        assert_eq!(tracker.update("paused"), Some(PrinterEvent::PrintPaused));
        assert_eq!(tracker.update("printing"), Some(PrinterEvent::PrintResumed));
        assert_eq!(tracker.update("complete"), Some(PrinterEvent::PrintCompleted));
        assert_eq!(tracker.update("standby"), None);
        assert_eq!(tracker.update("printing"), Some(PrinterEvent::PrintStarted));
        assert_eq!(tracker.update("cancelled"), Some(PrinterEvent::PrintCancelled));
        assert_eq!(tracker.update("error"), Some(PrinterEvent::Error));
    }

    #[test]
    fn test_temperature_milestones() {
        let mut tracker = TemperatureTracker::new();
        assert_eq!(tracker.update(25.0, 0.0), None);
        assert_eq!(tracker.update(25.0, 210.0), Some(PrinterEvent::Heating));
        assert_eq!(tracker.update(150.0, 210.0), None);
        assert_eq!(tracker.update(208.5, 210.0), Some(PrinterEvent::TemperatureReached));
        assert_eq!(tracker.update(210.0, 210.0), None);
        // Heater turned off, then on again at a temperature already reached
        assert_eq!(tracker.update(200.0, 0.0), None);
        assert_eq!(tracker.update(200.0, 200.0), None);
        assert_eq!(tracker.update(205.0, 200.0), None);
    }

    #[test]
    fn test_temperature_overshoot_counts_as_reached() {
        let mut tracker = TemperatureTracker::new();
        assert_eq!(tracker.update(25.0, 210.0), Some(PrinterEvent::Heating));
        assert_eq!(tracker.update(190.0, 210.0), None);
        // Jumped past the tolerance band between samples
        assert_eq!(tracker.update(215.0, 210.0), Some(PrinterEvent::TemperatureReached));
        assert_eq!(tracker.update(210.0, 210.0), None);

        // Cooling towards a lower target still needs the band
        assert_eq!(tracker.update(215.0, 180.0), None);
        assert_eq!(tracker.update(190.0, 180.0), None);
        assert_eq!(tracker.update(181.0, 180.0), Some(PrinterEvent::TemperatureReached));
    }
}
