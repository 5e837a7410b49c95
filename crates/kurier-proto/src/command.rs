use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Autopilot flight modes. The wire name is the upper-case form (`HOLD_ALT`, `RTL`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightMode {
    /// Stick inputs passed straight to the actuators.
    #[default]
    Manual,
    /// Barometric altitude hold, wings level.
    HoldAlt,
    /// Altitude hold plus airspeed hold through pitch.
    Cruise,
    /// Hold altitude and nose toward home; course steering is external.
    Rtl,
    /// Stepped descent at the current position.
    Land,
}

impl FlightMode {
    pub const ALL: [FlightMode; 5] = [
        FlightMode::Manual,
        FlightMode::HoldAlt,
        FlightMode::Cruise,
        FlightMode::Rtl,
        FlightMode::Land,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlightMode::Manual => "MANUAL",
            FlightMode::HoldAlt => "HOLD_ALT",
            FlightMode::Cruise => "CRUISE",
            FlightMode::Rtl => "RTL",
            FlightMode::Land => "LAND",
        }
    }

    /// Modes whose altitude target follows the terrain when terrain-follow is on.
    pub fn follows_terrain(&self) -> bool {
        matches!(self, FlightMode::HoldAlt | FlightMode::Cruise)
    }
}

impl fmt::Display for FlightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseModeError(pub String);

impl fmt::Display for ParseModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown flight mode: {}", self.0)
    }
}

impl std::error::Error for ParseModeError {}

impl FromStr for FlightMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FlightMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ParseModeError(s.to_string()))
    }
}

/// Failsafe reasons in priority order: the first one that applies is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailsafeReason {
    LowBattery,
    LinkLoss,
    BaroFault,
    NoRtk,
}

impl FailsafeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailsafeReason::LowBattery => "LOW_BATTERY",
            FailsafeReason::LinkLoss => "LINK_LOSS",
            FailsafeReason::BaroFault => "BARO_FAULT",
            FailsafeReason::NoRtk => "NO_RTK",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "LOW_BATTERY" => Some(FailsafeReason::LowBattery),
            "LINK_LOSS" => Some(FailsafeReason::LinkLoss),
            "BARO_FAULT" => Some(FailsafeReason::BaroFault),
            "NO_RTK" => Some(FailsafeReason::NoRtk),
            _ => None,
        }
    }
}

impl fmt::Display for FailsafeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tick sensor sample. Missing fields take the documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSnapshot {
    /// Barometric altitude, meters ASL. `None` or non-finite is a baro fault.
    pub baro_alt_m: Option<f64>,
    pub airspeed_ms: f64,
    pub lat: f64,
    pub lon: f64,
    /// Ground elevation under the vehicle, meters ASL (from the DEM layer).
    pub terrain_elev_m: f64,
    /// RTK fixed/float available.
    pub rtk_fix: bool,
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self {
            baro_alt_m: None,
            airspeed_ms: 0.0,
            lat: 0.0,
            lon: 0.0,
            terrain_elev_m: 0.0,
            rtk_fix: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSnapshot {
    /// Tick interval, seconds.
    pub dt: f64,
    pub battery_v: f64,
    pub link_ok: bool,
}

impl Default for SystemSnapshot {
    fn default() -> Self {
        Self { dt: 0.1, battery_v: 0.0, link_ok: true }
    }
}

/// Stick command, only consulted in MANUAL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualCommand {
    pub thrust: f64,
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    pub alt_m: f64,
    pub airspeed_ms: f64,
}

/// Output of one autopilot tick, consumed by the link layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorCommand {
    /// Normalized thrust, 0..1.
    pub thrust: f64,
    /// -1..1 for pitch, roll and yaw.
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
    pub failsafe: bool,
    /// Serialized as `""` when no failsafe is active.
    #[serde(serialize_with = "reason_to_str", deserialize_with = "reason_from_str")]
    pub failsafe_reason: Option<FailsafeReason>,
    pub mode: FlightMode,
    pub targets: Targets,
}

impl ActuatorCommand {
    pub fn idle(
        mode: FlightMode,
        failsafe_reason: Option<FailsafeReason>,
        targets: Targets,
    ) -> Self {
        Self {
            thrust: 0.0,
            pitch: 0.0,
            roll: 0.0,
            yaw: 0.0,
            failsafe: failsafe_reason.is_some(),
            failsafe_reason,
            mode,
            targets,
        }
    }

    pub fn failsafe_reason_str(&self) -> &'static str {
        self.failsafe_reason.as_ref().map(FailsafeReason::as_str).unwrap_or("")
    }
}

fn reason_to_str<S: Serializer>(r: &Option<FailsafeReason>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(r.as_ref().map(FailsafeReason::as_str).unwrap_or(""))
}

fn reason_from_str<'de, D: Deserializer<'de>>(d: D) -> Result<Option<FailsafeReason>, D::Error> {
    let s = String::deserialize(d)?;
    if s.is_empty() {
        return Ok(None);
    }
    FailsafeReason::parse(&s)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown failsafe reason: {}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_names_parse() {
        assert_eq!("HOLD_ALT".parse::<FlightMode>(), Ok(FlightMode::HoldAlt));
        assert_eq!("RTL".parse::<FlightMode>(), Ok(FlightMode::Rtl));
        assert!("hold_alt".parse::<FlightMode>().is_err());
        assert!("ACRO".parse::<FlightMode>().is_err());
    }

    #[test]
    fn empty_reason_when_no_failsafe() {
        let cmd = ActuatorCommand::idle(FlightMode::HoldAlt, None, Targets::default());
        let v = serde_json::to_value(&cmd).unwrap();
        assert_eq!(v["failsafe_reason"], "");
        assert_eq!(v["mode"], "HOLD_ALT");
        assert_eq!(v["failsafe"], false);
    }

    #[test]
    fn reason_serializes_upper_case() {
        let cmd = ActuatorCommand::idle(
            FlightMode::Land,
            Some(FailsafeReason::LowBattery),
            Targets::default(),
        );
        let s = serde_json::to_string(&cmd).unwrap();
        assert!(s.contains("\"failsafe_reason\":\"LOW_BATTERY\""));
        let back: ActuatorCommand = serde_json::from_str(&s).unwrap();
        assert_eq!(back.failsafe_reason, Some(FailsafeReason::LowBattery));
        assert!(back.failsafe);
    }

    #[test]
    fn snapshot_defaults() {
        let s: SensorSnapshot = serde_json::from_str("{}").unwrap();
        assert!(s.baro_alt_m.is_none());
        assert!(s.rtk_fix);
        let sys: SystemSnapshot = serde_json::from_str("{\"battery_v\": 23.5}").unwrap();
        assert_eq!(sys.dt, 0.1);
        assert!(sys.link_ok);
    }
}
