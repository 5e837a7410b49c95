use kurier_proto::{FailsafeReason, SensorSnapshot, SystemSnapshot};
use serde::Deserialize;

use crate::error::{CtlError, CtlResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// 6S pack at ~3.2 V/cell.
    pub min_battery_v: f64,
    pub link_timeout_s: f64,
    pub require_rtk: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self { min_battery_v: 19.2, link_timeout_s: 2.0, require_rtk: false }
    }
}

impl SafetyConfig {
    pub fn validate(&self) -> CtlResult<()> {
        check_min_battery_v(self.min_battery_v)?;
        check_link_timeout_s(self.link_timeout_s)
    }
}

fn check_min_battery_v(v: f64) -> CtlResult<()> {
    if !v.is_finite() {
        return Err(CtlError::InvalidConfig(format!(
            "safety.min_battery_v must be finite (got {})",
            v
        )));
    }
    Ok(())
}

// NaN would never compare greater than the link timer, so link loss could not fire
fn check_link_timeout_s(s: f64) -> CtlResult<()> {
    if !(s > 0.0) || !s.is_finite() {
        return Err(CtlError::InvalidConfig(format!(
            "safety.link_timeout_s must be > 0 (got {})",
            s
        )));
    }
    Ok(())
}

/// Per-tick battery/link/sensor checks. Owns the link-loss timer.
#[derive(Debug, Clone)]
pub struct SafetySupervisor {
    min_battery_v: f64,
    link_timeout_s: f64,
    require_rtk: bool,
    link_down_s: f64,
}

impl SafetySupervisor {
    pub fn new(cfg: &SafetyConfig) -> Self {
        Self {
            min_battery_v: cfg.min_battery_v,
            link_timeout_s: cfg.link_timeout_s,
            require_rtk: cfg.require_rtk,
            link_down_s: 0.0,
        }
    }

    /// Advance the link timer by `sys.dt` and return the highest-priority fault, if any.
    pub fn evaluate(
        &mut self,
        sys: &SystemSnapshot,
        sensors: &SensorSnapshot,
    ) -> Option<FailsafeReason> {
        self.link_down_s = if sys.link_ok { 0.0 } else { self.link_down_s + sys.dt };

        if sys.battery_v <= 0.0 || sys.battery_v < self.min_battery_v || sys.battery_v.is_nan() {
            return Some(FailsafeReason::LowBattery);
        }
        if self.link_down_s > self.link_timeout_s {
            return Some(FailsafeReason::LinkLoss);
        }
        if !sensors.baro_alt_m.is_some_and(f64::is_finite) {
            return Some(FailsafeReason::BaroFault);
        }
        if self.require_rtk && !sensors.rtk_fix {
            return Some(FailsafeReason::NoRtk);
        }
        None
    }

    pub fn link_down_s(&self) -> f64 {
        self.link_down_s
    }

    pub fn set_min_battery_v(&mut self, v: f64) -> CtlResult<()> {
        check_min_battery_v(v)?;
        self.min_battery_v = v;
        Ok(())
    }

    pub fn set_link_timeout_s(&mut self, s: f64) -> CtlResult<()> {
        check_link_timeout_s(s)?;
        self.link_timeout_s = s;
        Ok(())
    }

    pub fn link_timeout_s(&self) -> f64 {
        self.link_timeout_s
    }

    pub fn set_require_rtk(&mut self, on: bool) {
        self.require_rtk = on;
    }

    pub fn require_rtk(&self) -> bool {
        self.require_rtk
    }
}
