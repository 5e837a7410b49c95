pub mod autopilot;
pub mod doctor;
pub mod error;
pub mod geofence;
pub mod guidance;
pub mod hold;
pub mod pid;
pub mod safety;
pub mod snapshot;
pub mod terrain;

pub use autopilot::Autopilot;
pub use error::{CtlError, CtlResult};

use serde::{Deserialize, Serialize};

use geofence::KeepInZone;
use guidance::ManeuverProfile;
use hold::{AirspeedHoldConfig, AltitudeHoldConfig};
use safety::SafetyConfig;

/// Full autopilot configuration, usually the `[autopilot]` table of the CLI config.
/// Every section is optional and falls back to the airframe defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AutopilotConfig {
    pub altitude: AltitudeHoldConfig,
    pub airspeed: AirspeedHoldConfig,
    pub safety: SafetyConfig,
    pub terrain: TerrainConfig,
    pub land: LandConfig,
    pub rtl: RtlConfig,

    /// Circular keep-in zone. No geofence when absent.
    pub geofence: Option<KeepInZone>,

    /// Home point for RTL. Link loss falls back to HOLD_ALT while unset.
    pub home: Option<HomePoint>,

    /// Optional maneuver bias applied in HOLD_ALT/CRUISE.
    pub guidance: Option<ManeuverProfile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomePoint {
    pub lat: f64,
    pub lon: f64,
    pub alt_asl_m: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub enabled: bool,
    pub agl_offset_m: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self { enabled: true, agl_offset_m: 60.0 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LandConfig {
    /// Altitude target ratchet, meters per second of `dt`.
    pub descent_rate_mps: f64,
    /// Subtracted from the altitude channel's thrust while landing.
    pub thrust_reduction: f64,
    pub min_thrust: f64,
    pub pitch: f64,
    /// Thrust reported for every LAND tick while LOW_BATTERY is active.
    pub low_battery_thrust: f64,
}

impl Default for LandConfig {
    fn default() -> Self {
        Self {
            // 0.6 m per tick at 10 Hz
            descent_rate_mps: 6.0,
            thrust_reduction: 0.1,
            min_thrust: 0.2,
            pitch: -0.05,
            low_battery_thrust: 0.3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RtlConfig {
    /// Small nose-toward-home pitch. Course steering is external.
    pub pitch: f64,
}

impl Default for RtlConfig {
    fn default() -> Self {
        Self { pitch: 0.15 }
    }
}

impl HomePoint {
    pub fn validate(&self) -> CtlResult<()> {
        if !(self.lat.is_finite() && self.lon.is_finite() && self.alt_asl_m.is_finite()) {
            return Err(CtlError::InvalidConfig(format!("home must be finite (got {:?})", self)));
        }
        Ok(())
    }
}

/// Rejects NaN and infinities under a config key name.
pub(crate) fn check_finite(name: &str, v: f64) -> CtlResult<()> {
    if !v.is_finite() {
        return Err(CtlError::InvalidConfig(format!("{} must be finite (got {})", name, v)));
    }
    Ok(())
}

impl AutopilotConfig {
    /// Hard invariants the controllers rely on. Operator-level sanity checks live in
    /// [`doctor::check_config`]. The runtime setters on [`Autopilot`] apply the same checks.
    pub fn validate(&self) -> CtlResult<()> {
        for (name, b) in [
            ("altitude.output_limits", self.altitude.output_limits),
            ("altitude.integral_limits", self.altitude.integral_limits),
            ("airspeed.output_limits", self.airspeed.output_limits),
            ("airspeed.integral_limits", self.airspeed.integral_limits),
        ] {
            if !b.is_valid() {
                return Err(CtlError::InvalidConfig(format!(
                    "{} must be finite with min <= max (got {}..{})",
                    name, b.min, b.max
                )));
            }
        }

        for (name, g) in
            [("altitude.gains", self.altitude.gains), ("airspeed.gains", self.airspeed.gains)]
        {
            if !(g.kp.is_finite() && g.ki.is_finite() && g.kd.is_finite()) {
                return Err(CtlError::InvalidConfig(format!("{} must be finite", name)));
            }
        }

        for (name, v) in [
            ("altitude.hover_ff", self.altitude.hover_ff),
            ("altitude.authority", self.altitude.authority),
            ("altitude.target_alt_m", self.altitude.target_alt_m),
            ("airspeed.target_ms", self.airspeed.target_ms),
            ("terrain.agl_offset_m", self.terrain.agl_offset_m),
            ("land.thrust_reduction", self.land.thrust_reduction),
            ("land.min_thrust", self.land.min_thrust),
            ("land.pitch", self.land.pitch),
            ("land.low_battery_thrust", self.land.low_battery_thrust),
            ("rtl.pitch", self.rtl.pitch),
        ] {
            check_finite(name, v)?;
        }

        self.safety.validate()?;
        if !(self.land.descent_rate_mps >= 0.0) || !self.land.descent_rate_mps.is_finite() {
            return Err(CtlError::InvalidConfig(format!(
                "land.descent_rate_mps must be >= 0 (got {})",
                self.land.descent_rate_mps
            )));
        }
        if let Some(z) = &self.geofence {
            z.validate()?;
        }
        if let Some(home) = &self.home {
            home.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pid::Bounds;

    #[test]
    fn defaults_are_valid() {
        assert!(AutopilotConfig::default().validate().is_ok());
    }

    #[test]
    fn inverted_bounds_rejected() {
        let mut cfg = AutopilotConfig::default();
        cfg.airspeed.integral_limits = Bounds::new(0.2, -0.2);
        assert!(matches!(cfg.validate(), Err(CtlError::InvalidConfig(_))));
    }

    #[test]
    fn non_positive_link_timeout_rejected() {
        let mut cfg = AutopilotConfig::default();
        cfg.safety.link_timeout_s = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_partial_toml() {
        let cfg: AutopilotConfig = toml::from_str(
            r#"
            [altitude]
            hover_ff = 0.5
            gains = { kp = 1.1, ki = 0.2, kd = 0.0 }

            [safety]
            min_battery_v = 21.0
            require_rtk = true

            [geofence]
            lat0 = 52.12
            lon0 = 13.45
            radius_m = 800.0

            [home]
            lat = 52.12
            lon = 13.45
            alt_asl_m = 140.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.altitude.hover_ff, 0.5);
        assert_eq!(cfg.altitude.gains.kp, 1.1);
        // untouched fields keep their defaults
        assert_eq!(cfg.altitude.authority, 0.8);
        assert_eq!(cfg.safety.link_timeout_s, 2.0);
        assert!(cfg.safety.require_rtk);
        assert_eq!(cfg.geofence.unwrap().radius_m, 800.0);
        assert!(cfg.terrain.enabled);
        assert!(cfg.guidance.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn degenerate_geofence_and_home_rejected() {
        let mut cfg = AutopilotConfig {
            geofence: Some(KeepInZone::new(52.12, 13.45, -1.0)),
            ..AutopilotConfig::default()
        };
        assert!(cfg.validate().is_err());
        cfg.geofence = None;
        cfg.home = Some(HomePoint { lat: f64::NAN, lon: 13.45, alt_asl_m: 0.0 });
        assert!(cfg.validate().is_err());
    }
}
