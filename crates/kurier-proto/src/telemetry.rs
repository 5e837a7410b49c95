use serde::{Deserialize, Serialize};

use crate::command::{ActuatorCommand, FailsafeReason, FlightMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Status,
    ModeChange,
    Failsafe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub ts_unix_ms: i64,
    pub kind: EventKind,
    pub mode: FlightMode,
    pub failsafe_reason: Option<FailsafeReason>,
    // Vehicle state as measured
    pub alt_m: Option<f64>,
    pub airspeed_ms: f64,
    // Last command
    pub thrust: f64,
    pub pitch: f64,
    pub target_alt_m: f64,
    pub target_airspeed_ms: f64,
    pub msg: String,
}

impl TelemetryEvent {
    /// Classify a command against the previous one: failsafe onset wins over a mode change.
    pub fn classify(prev: Option<&ActuatorCommand>, cmd: &ActuatorCommand) -> EventKind {
        let new_reason = prev.map_or(true, |p| p.failsafe_reason != cmd.failsafe_reason);
        if cmd.failsafe_reason.is_some() && new_reason {
            return EventKind::Failsafe;
        }
        match prev {
            Some(p) if p.mode != cmd.mode => EventKind::ModeChange,
            _ => EventKind::Status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Targets;

    #[test]
    fn failsafe_onset_beats_mode_change() {
        let prev = ActuatorCommand::idle(FlightMode::Cruise, None, Targets::default());
        let cmd = ActuatorCommand::idle(
            FlightMode::Land,
            Some(FailsafeReason::LowBattery),
            Targets::default(),
        );
        assert_eq!(TelemetryEvent::classify(Some(&prev), &cmd), EventKind::Failsafe);
        // same reason on the next tick is just status
        assert_eq!(TelemetryEvent::classify(Some(&cmd), &cmd), EventKind::Status);
    }

    #[test]
    fn mode_change_without_failsafe() {
        let prev = ActuatorCommand::idle(FlightMode::Cruise, None, Targets::default());
        let cmd = ActuatorCommand::idle(FlightMode::Rtl, None, Targets::default());
        assert_eq!(TelemetryEvent::classify(Some(&prev), &cmd), EventKind::ModeChange);
        assert_eq!(TelemetryEvent::classify(None, &prev), EventKind::Status);
    }
}
