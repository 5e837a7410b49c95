//! Optional guidance-bias stage applied on top of the core command.
//!
//! A bias only nudges pitch in HOLD_ALT/CRUISE and is skipped whenever a failsafe is
//! active, so failsafe and geofence behavior is identical with or without a profile.
//! Course/roll for the maneuver itself come from an external guidance layer.

use kurier_proto::{ActuatorCommand, FlightMode};
use serde::Deserialize;

use crate::hold::PITCH_RANGE;

pub trait GuidanceBias: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Pitch offset for the given resolved mode.
    fn pitch_bias(&self, mode: FlightMode) -> f64;
}

/// Apply `bias` to `cmd` unless a failsafe is active.
pub fn apply(bias: &dyn GuidanceBias, cmd: &mut ActuatorCommand) {
    if cmd.failsafe {
        return;
    }
    let b = bias.pitch_bias(cmd.mode);
    if b != 0.0 {
        cmd.pitch = PITCH_RANGE.clamp(cmd.pitch + b);
    }
}

/// Gentle training patterns for a mapping VTOL. No loops, rolls or inverted flight.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "profile", rename_all = "snake_case")]
pub enum ManeuverProfile {
    Orbit {
        #[serde(default = "default_orbit_radius")]
        radius_m: f64,
        #[serde(default = "default_orbit_yaw_rate")]
        yaw_rate_dps: f64,
    },
    FigureEight,
    SCurve,
    Loiter,
}

fn default_orbit_radius() -> f64 {
    60.0
}

fn default_orbit_yaw_rate() -> f64 {
    8.0
}

impl ManeuverProfile {
    pub fn orbit() -> Self {
        ManeuverProfile::Orbit {
            radius_m: default_orbit_radius(),
            yaw_rate_dps: default_orbit_yaw_rate(),
        }
    }
}

impl GuidanceBias for ManeuverProfile {
    fn name(&self) -> &'static str {
        match self {
            ManeuverProfile::Orbit { .. } => "orbit",
            ManeuverProfile::FigureEight => "figure_eight",
            ManeuverProfile::SCurve => "s_curve",
            ManeuverProfile::Loiter => "loiter",
        }
    }

    fn pitch_bias(&self, mode: FlightMode) -> f64 {
        if !mode.follows_terrain() {
            return 0.0;
        }
        match self {
            ManeuverProfile::Orbit { .. } => 0.02,
            ManeuverProfile::FigureEight => 0.03,
            ManeuverProfile::SCurve => 0.025,
            ManeuverProfile::Loiter => 0.01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurier_proto::{FailsafeReason, Targets};

    #[test]
    fn biases_cruise_only_without_failsafe() {
        let p = ManeuverProfile::FigureEight;

        let mut cmd = ActuatorCommand::idle(FlightMode::Cruise, None, Targets::default());
        cmd.pitch = 0.1;
        apply(&p, &mut cmd);
        assert!((cmd.pitch - 0.13).abs() < 1e-12);

        let mut rtl = ActuatorCommand::idle(FlightMode::Rtl, None, Targets::default());
        rtl.pitch = 0.15;
        apply(&p, &mut rtl);
        assert_eq!(rtl.pitch, 0.15);

        let no_rtk = Some(FailsafeReason::NoRtk);
        let mut fs = ActuatorCommand::idle(FlightMode::HoldAlt, no_rtk, Targets::default());
        apply(&p, &mut fs);
        assert_eq!(fs.pitch, 0.0);
    }

    #[test]
    fn clamps_to_pitch_range() {
        let mut cmd = ActuatorCommand::idle(FlightMode::HoldAlt, None, Targets::default());
        cmd.pitch = 0.995;
        apply(&ManeuverProfile::orbit(), &mut cmd);
        assert_eq!(cmd.pitch, 1.0);
    }

    #[test]
    fn profile_from_toml_shape() {
        #[derive(Deserialize)]
        struct W {
            guidance: ManeuverProfile,
        }
        let w: W = toml::from_str("[guidance]\nprofile = \"orbit\"\nradius_m = 120.0\n").unwrap();
        assert_eq!(w.guidance, ManeuverProfile::Orbit { radius_m: 120.0, yaw_rate_dps: 8.0 });
        let w: W = toml::from_str("[guidance]\nprofile = \"s_curve\"\n").unwrap();
        assert_eq!(w.guidance.name(), "s_curve");
    }
}
