//! Altitude and airspeed hold channels: one PID each plus output shaping.

use serde::Deserialize;

use crate::error::CtlResult;
use crate::pid::{Bounds, Gains, Pid};

pub const THRUST_RANGE: Bounds = Bounds::new(0.0, 1.0);
pub const PITCH_RANGE: Bounds = Bounds::new(-1.0, 1.0);

/// Raw altitude PID output is centered here before feed-forward is applied.
const ALT_PID_CENTER: f64 = 0.5;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AltitudeHoldConfig {
    pub gains: Gains,
    pub output_limits: Bounds,
    pub integral_limits: Bounds,
    pub target_alt_m: f64,
    /// Thrust needed for level flight/hover.
    pub hover_ff: f64,
    /// Thrust swing per unit of PID output around the center.
    pub authority: f64,
}

impl Default for AltitudeHoldConfig {
    fn default() -> Self {
        Self {
            gains: Gains { kp: 0.9, ki: 0.25, kd: 0.05 },
            output_limits: Bounds::new(0.0, 1.0),
            integral_limits: Bounds::new(-0.5, 0.5),
            target_alt_m: 0.0,
            hover_ff: 0.45,
            authority: 0.8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AirspeedHoldConfig {
    pub gains: Gains,
    pub output_limits: Bounds,
    pub integral_limits: Bounds,
    pub target_ms: f64,
}

impl Default for AirspeedHoldConfig {
    fn default() -> Self {
        Self {
            gains: Gains { kp: 0.4, ki: 0.05, kd: 0.02 },
            output_limits: Bounds::new(-1.0, 1.0),
            integral_limits: Bounds::new(-0.2, 0.2),
            target_ms: 18.0,
        }
    }
}

/// Barometric altitude hold. Output: thrust in [0, 1].
#[derive(Debug, Clone)]
pub struct AltitudeHold {
    pid: Pid,
    target_alt_m: f64,
    hover_ff: f64,
    authority: f64,
}

impl AltitudeHold {
    pub fn new(cfg: &AltitudeHoldConfig) -> Self {
        Self {
            pid: Pid::new(cfg.gains, cfg.target_alt_m, cfg.output_limits, cfg.integral_limits),
            target_alt_m: cfg.target_alt_m,
            hover_ff: cfg.hover_ff,
            authority: cfg.authority,
        }
    }

    pub fn set_target(&mut self, alt_m: f64) {
        self.target_alt_m = alt_m;
        self.pid.set_setpoint(alt_m);
    }

    pub fn target(&self) -> f64 {
        self.target_alt_m
    }

    pub fn reset(&mut self) {
        self.pid.reset();
    }

    pub fn update(&mut self, baro_alt_m: f64, dt: f64) -> CtlResult<f64> {
        // the PID output clamp already maps NaN to 0
        let u = self.pid.update(baro_alt_m, dt)?;
        Ok(THRUST_RANGE.clamp(self.hover_ff + self.authority * (u - ALT_PID_CENTER)))
    }

    pub fn pid(&self) -> &Pid {
        &self.pid
    }
}

/// Airspeed hold through pitch. Output: pitch in [-1, 1].
#[derive(Debug, Clone)]
pub struct AirspeedHold {
    pid: Pid,
    target_ms: f64,
}

impl AirspeedHold {
    pub fn new(cfg: &AirspeedHoldConfig) -> Self {
        Self {
            pid: Pid::new(cfg.gains, cfg.target_ms, cfg.output_limits, cfg.integral_limits),
            target_ms: cfg.target_ms,
        }
    }

    pub fn set_target(&mut self, v_ms: f64) {
        self.target_ms = v_ms;
        self.pid.set_setpoint(v_ms);
    }

    pub fn target(&self) -> f64 {
        self.target_ms
    }

    pub fn reset(&mut self) {
        self.pid.reset();
    }

    pub fn update(&mut self, airspeed_ms: f64, dt: f64) -> CtlResult<f64> {
        Ok(PITCH_RANGE.clamp(self.pid.update(airspeed_ms, dt)?))
    }

    pub fn pid(&self) -> &Pid {
        &self.pid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thrust_at_target_is_near_hover() {
        let mut alt = AltitudeHold::new(&AltitudeHoldConfig::default());
        alt.set_target(100.0);
        // zero error, zero integral => raw output 0 => thrust below hover
        let t = alt.update(100.0, 0.1).unwrap();
        assert!((t - (0.45 - 0.8 * 0.5)).abs() < 1e-12);
    }

    #[test]
    fn thrust_saturates_when_far_below() {
        let mut alt = AltitudeHold::new(&AltitudeHoldConfig::default());
        alt.set_target(500.0);
        let t = alt.update(0.0, 0.1).unwrap();
        assert!((t - 0.85).abs() < 1e-12);
        assert!(THRUST_RANGE.contains(t));
    }

    #[test]
    fn nan_measurement_maps_to_zero_pid_output() {
        // raw output 0 => hover_ff - authority * 0.5
        let mut alt = AltitudeHold::new(&AltitudeHoldConfig::default());
        let t = alt.update(f64::NAN, 0.1).unwrap();
        assert!((t - (0.45 - 0.8 * 0.5)).abs() < 1e-12, "thrust = {}", t);

        let mut spd = AirspeedHold::new(&AirspeedHoldConfig::default());
        assert_eq!(spd.update(f64::NAN, 0.1).unwrap(), 0.0);
        // NaN last measurement must not leak into the derivative
        assert_eq!(spd.update(f64::NAN, 0.1).unwrap(), 0.0);
        assert!(spd.update(10.0, 0.1).unwrap().is_finite());
    }

    #[test]
    fn nan_target_gives_level_pitch() {
        let mut spd = AirspeedHold::new(&AirspeedHoldConfig::default());
        spd.set_target(f64::NAN);
        assert_eq!(spd.update(12.0, 0.1).unwrap(), 0.0);
    }

    #[test]
    fn pitch_clamped() {
        let cfg = AirspeedHoldConfig {
            output_limits: Bounds::new(-5.0, 5.0),
            ..AirspeedHoldConfig::default()
        };
        let mut spd = AirspeedHold::new(&cfg);
        spd.set_target(40.0);
        assert_eq!(spd.update(0.0, 0.1).unwrap(), 1.0);
        spd.set_target(0.0);
        spd.reset();
        assert_eq!(spd.update(80.0, 0.1).unwrap(), -1.0);
    }

    #[test]
    fn invalid_dt_propagates() {
        let mut spd = AirspeedHold::new(&AirspeedHoldConfig::default());
        assert!(spd.update(10.0, 0.0).is_err());
    }
}
