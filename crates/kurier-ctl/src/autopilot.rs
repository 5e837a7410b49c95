//! Flight-mode orchestrator: failsafes, terrain follow, geofence and per-mode command
//! synthesis, run once per control tick.
//!
//! Tick order:
//! 1. safety checks (battery, link timer, baro, RTK), first match wins
//! 2. terrain follow rewrites the altitude target in HOLD_ALT/CRUISE
//! 3. failsafe mode override
//! 4. keep-in geofence override (never overrides LAND)
//! 5. command synthesis for the resolved mode, then the optional guidance bias

use kurier_proto::{
    ActuatorCommand, FailsafeReason, FlightMode, ManualCommand, SensorSnapshot, SystemSnapshot,
    Targets,
};
use tracing::{debug, info, warn};

use crate::error::{CtlError, CtlResult};
use crate::geofence::KeepInZone;
use crate::guidance::{self, GuidanceBias};
use crate::hold::{AirspeedHold, AltitudeHold, PITCH_RANGE, THRUST_RANGE};
use crate::safety::SafetySupervisor;
use crate::terrain::TerrainReference;
use crate::{check_finite, AutopilotConfig, HomePoint, LandConfig, RtlConfig};

#[derive(Debug)]
pub struct Autopilot {
    mode: FlightMode,
    alt_ctl: AltitudeHold,
    spd_ctl: AirspeedHold,
    safety: SafetySupervisor,

    keepin: Option<KeepInZone>,
    terrain: TerrainReference,
    use_terrain: bool,
    home: Option<HomePoint>,

    land: LandConfig,
    rtl: RtlConfig,
    bias: Option<Box<dyn GuidanceBias>>,

    // edge detection for logging
    last_fault: Option<FailsafeReason>,
    outside_fence: bool,
}

impl Default for Autopilot {
    fn default() -> Self {
        Self::build(&AutopilotConfig::default())
    }
}

impl Autopilot {
    pub fn new(cfg: &AutopilotConfig) -> CtlResult<Self> {
        cfg.validate()?;
        Ok(Self::build(cfg))
    }

    fn build(cfg: &AutopilotConfig) -> Self {
        Self {
            mode: FlightMode::Manual,
            alt_ctl: AltitudeHold::new(&cfg.altitude),
            spd_ctl: AirspeedHold::new(&cfg.airspeed),
            safety: SafetySupervisor::new(&cfg.safety),
            keepin: cfg.geofence,
            terrain: TerrainReference::new(cfg.terrain.agl_offset_m),
            use_terrain: cfg.terrain.enabled,
            home: cfg.home,
            land: cfg.land.clone(),
            rtl: cfg.rtl.clone(),
            bias: cfg.guidance.map(|p| Box::new(p) as Box<dyn GuidanceBias>),
            last_fault: None,
            outside_fence: false,
        }
    }

    // ---- configuration ----
    //
    // Setters apply the checks of `AutopilotConfig::validate`. A rejected value leaves the
    // previous one in place.

    pub fn set_home(&mut self, lat: f64, lon: f64, alt_asl_m: f64) -> CtlResult<()> {
        let home = HomePoint { lat, lon, alt_asl_m };
        home.validate()?;
        self.home = Some(home);
        Ok(())
    }

    pub fn clear_home(&mut self) {
        self.home = None;
    }

    pub fn home(&self) -> Option<HomePoint> {
        self.home
    }

    pub fn set_geofence(&mut self, lat: f64, lon: f64, radius_m: f64) -> CtlResult<()> {
        let zone = KeepInZone::new(lat, lon, radius_m);
        zone.validate()?;
        self.keepin = Some(zone);
        self.outside_fence = false;
        Ok(())
    }

    pub fn clear_geofence(&mut self) {
        self.keepin = None;
        self.outside_fence = false;
    }

    pub fn set_terrain_follow(&mut self, enabled: bool) {
        self.use_terrain = enabled;
    }

    pub fn set_agl_offset(&mut self, agl_offset_m: f64) -> CtlResult<()> {
        check_finite("terrain.agl_offset_m", agl_offset_m)?;
        self.terrain = TerrainReference::new(agl_offset_m);
        Ok(())
    }

    pub fn set_min_battery_v(&mut self, v: f64) -> CtlResult<()> {
        self.safety.set_min_battery_v(v)
    }

    pub fn set_link_timeout_s(&mut self, s: f64) -> CtlResult<()> {
        self.safety.set_link_timeout_s(s)
    }

    pub fn set_require_rtk(&mut self, on: bool) {
        self.safety.set_require_rtk(on);
    }

    pub fn set_guidance_bias(&mut self, bias: Option<Box<dyn GuidanceBias>>) {
        if let Some(b) = &bias {
            info!("guidance bias: {}", b.name());
        }
        self.bias = bias;
    }

    // ---- modes and targets ----

    /// Switch mode, optionally with new targets. Both channel integrators are always reset.
    pub fn set_mode(
        &mut self,
        mode: FlightMode,
        target_alt_m: Option<f64>,
        target_airspeed_ms: Option<f64>,
    ) {
        if mode != self.mode {
            info!("mode: {} -> {} (commanded)", self.mode, mode);
        }
        self.mode = mode;
        self.set_targets(target_alt_m, target_airspeed_ms);
        self.reset_channels();
    }

    /// Same as [`Autopilot::set_mode`] for a mode name; unknown names are rejected untouched.
    pub fn set_mode_by_name(
        &mut self,
        name: &str,
        target_alt_m: Option<f64>,
        target_airspeed_ms: Option<f64>,
    ) -> CtlResult<()> {
        let mode: FlightMode = name.parse().map_err(CtlError::from)?;
        self.set_mode(mode, target_alt_m, target_airspeed_ms);
        Ok(())
    }

    /// Change targets without resetting the controllers.
    pub fn set_targets(&mut self, alt_m: Option<f64>, airspeed_ms: Option<f64>) {
        if let Some(a) = alt_m {
            self.alt_ctl.set_target(a);
        }
        if let Some(v) = airspeed_ms {
            self.spd_ctl.set_target(v);
        }
    }

    pub fn mode(&self) -> FlightMode {
        self.mode
    }

    pub fn targets(&self) -> Targets {
        Targets { alt_m: self.alt_ctl.target(), airspeed_ms: self.spd_ctl.target() }
    }

    pub fn altitude_channel(&self) -> &AltitudeHold {
        &self.alt_ctl
    }

    pub fn airspeed_channel(&self) -> &AirspeedHold {
        &self.spd_ctl
    }

    fn reset_channels(&mut self) {
        self.alt_ctl.reset();
        self.spd_ctl.reset();
    }

    /// Automatic transition from a failsafe or the geofence.
    fn force_mode(&mut self, mode: FlightMode, why: &str) {
        if mode == self.mode {
            return;
        }
        warn!("mode: {} -> {} ({})", self.mode, mode, why);
        self.mode = mode;
        self.reset_channels();
    }

    fn failsafe_mode(&self, reason: FailsafeReason) -> Option<FlightMode> {
        match reason {
            FailsafeReason::LowBattery => Some(FlightMode::Land),
            FailsafeReason::LinkLoss if self.home.is_some() => Some(FlightMode::Rtl),
            FailsafeReason::LinkLoss => Some(FlightMode::HoldAlt),
            FailsafeReason::BaroFault => Some(FlightMode::HoldAlt),
            // degrade: keep flying the mission, only report
            FailsafeReason::NoRtk => None,
        }
    }

    fn note_fault(&mut self, fault: Option<FailsafeReason>) {
        if fault == self.last_fault {
            return;
        }
        match fault {
            Some(r) => warn!("failsafe: {} (link down {:.1}s)", r, self.safety.link_down_s()),
            None => info!("failsafe cleared"),
        }
        self.last_fault = fault;
    }

    // ---- tick ----

    /// Run one control tick. Fails only for a non-positive or non-finite `sys.dt`, in
    /// which case no state is touched.
    pub fn update(
        &mut self,
        sensors: &SensorSnapshot,
        sys: &SystemSnapshot,
        manual: Option<&ManualCommand>,
    ) -> CtlResult<ActuatorCommand> {
        let dt = sys.dt;
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(CtlError::InvalidDt(dt));
        }

        let fault = self.safety.evaluate(sys, sensors);
        self.note_fault(fault);

        if self.use_terrain && self.mode.follows_terrain() {
            self.alt_ctl.set_target(self.terrain.target_asl(sensors.terrain_elev_m));
        }

        if let Some(mode) = fault.and_then(|r| self.failsafe_mode(r)) {
            self.force_mode(mode, "failsafe");
        }

        if let Some(zone) = self.keepin {
            let outside = !zone.contains(sensors.lat, sensors.lon);
            if outside && !self.outside_fence {
                let dist_m = zone.distance_m(sensors.lat, sensors.lon);
                warn!("geofence: outside keep-in zone ({:.0} m from center)", dist_m);
            }
            self.outside_fence = outside;
            if outside && self.mode != FlightMode::Land {
                self.force_mode(FlightMode::Rtl, "geofence");
            }
        }

        // the baro fault itself is reported above; the channels only ever see finite numbers
        let baro_alt_m = sensors.baro_alt_m.filter(|v| v.is_finite()).unwrap_or(0.0);
        let airspeed_ms = if sensors.airspeed_ms.is_finite() { sensors.airspeed_ms } else { 0.0 };

        let mut cmd = ActuatorCommand::idle(self.mode, fault, Targets::default());

        match self.mode {
            FlightMode::Manual => {
                let m = manual.copied().unwrap_or_default();
                cmd.thrust = THRUST_RANGE.clamp(m.thrust);
                cmd.pitch = PITCH_RANGE.clamp(m.pitch);
                cmd.roll = PITCH_RANGE.clamp(m.roll);
                cmd.yaw = PITCH_RANGE.clamp(m.yaw);
            }
            FlightMode::HoldAlt => {
                cmd.thrust = self.alt_ctl.update(baro_alt_m, dt)?;
            }
            FlightMode::Cruise => {
                cmd.thrust = self.alt_ctl.update(baro_alt_m, dt)?;
                cmd.pitch = self.spd_ctl.update(airspeed_ms, dt)?;
            }
            FlightMode::Rtl => {
                cmd.thrust = self.alt_ctl.update(baro_alt_m, dt)?;
                cmd.pitch = self.rtl.pitch;
            }
            FlightMode::Land => {
                let target = (self.alt_ctl.target() - self.land.descent_rate_mps * dt).max(0.0);
                self.alt_ctl.set_target(target);
                let thrust = self.alt_ctl.update(baro_alt_m, dt)?;
                cmd.thrust = if fault == Some(FailsafeReason::LowBattery) {
                    self.land.low_battery_thrust
                } else {
                    (thrust - self.land.thrust_reduction).max(self.land.min_thrust)
                };
                cmd.pitch = self.land.pitch;
            }
        }

        if let Some(bias) = &self.bias {
            guidance::apply(bias.as_ref(), &mut cmd);
        }

        cmd.targets = self.targets();
        debug!(
            mode = %cmd.mode,
            thrust = cmd.thrust,
            pitch = cmd.pitch,
            alt_target = cmd.targets.alt_m,
            "tick"
        );
        Ok(cmd)
    }
}
