use anyhow::{Context, Result};
use kurier_ctl::geofence::M_PER_DEG_LAT;
use kurier_ctl::{Autopilot, AutopilotConfig};
use kurier_proto::{ActuatorCommand, FlightMode, SensorSnapshot, SystemSnapshot};
use serde::Serialize;
use std::str::FromStr;
use tracing::info;

use crate::plant::{Plant, PlantParams, PlantState};

/// Everything the plant does not model: power, link, position, terrain, GNSS.
#[derive(Debug, Clone)]
pub struct Environment {
    pub battery_v: f64,
    pub link_ok: bool,
    pub baro_ok: bool,
    pub lat: f64,
    pub lon: f64,
    pub terrain_elev_m: f64,
    pub rtk_fix: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            battery_v: 23.5,
            link_ok: true,
            baro_ok: true,
            lat: 52.12,
            lon: 13.45,
            terrain_elev_m: 0.0,
            rtk_fix: true,
        }
    }
}

impl Environment {
    pub fn sensors(&self, state: &PlantState) -> SensorSnapshot {
        SensorSnapshot {
            baro_alt_m: self.baro_ok.then_some(state.alt_m),
            airspeed_ms: state.airspeed_ms,
            lat: self.lat,
            lon: self.lon,
            terrain_elev_m: self.terrain_elev_m,
            rtk_fix: self.rtk_fix,
        }
    }

    pub fn system(&self, dt: f64) -> SystemSnapshot {
        SystemSnapshot { dt, battery_v: self.battery_v, link_ok: self.link_ok }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    pub t_s: f64,
    pub state: PlantState,
    pub cmd: ActuatorCommand,
}

/// Fixed-rate closed loop: autopilot -> plant -> sensors.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub dt: f64,
    pub ticks: usize,
    pub env: Environment,
}

impl Scenario {
    pub fn new(seconds: f64, dt: f64, env: Environment) -> Self {
        let ticks = (seconds / dt).round().max(0.0) as usize;
        Self { dt, ticks, env }
    }

    pub fn run(&self, ap: &mut Autopilot, plant: &mut Plant) -> Result<Vec<Sample>> {
        self.run_with(ap, plant, |_, _| {})
    }

    /// `hook(tick, env)` runs before each tick and may change the environment.
    pub fn run_with<F>(
        &self,
        ap: &mut Autopilot,
        plant: &mut Plant,
        mut hook: F,
    ) -> Result<Vec<Sample>>
    where
        F: FnMut(usize, &mut Environment),
    {
        let mut env = self.env.clone();
        let mut trace = Vec::with_capacity(self.ticks);
        for tick in 0..self.ticks {
            hook(tick, &mut env);
            let sensors = env.sensors(&plant.state());
            let cmd = ap
                .update(&sensors, &env.system(self.dt), None)
                .with_context(|| format!("autopilot tick {}", tick))?;
            let state = plant.step(&cmd, self.dt);
            trace.push(Sample { t_s: (tick + 1) as f64 * self.dt, state, cmd });
        }
        Ok(trace)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoKind {
    /// HOLD_ALT to 50 m from the ground.
    Hold,
    /// CRUISE with terrain follow: 140 m ground + AGL offset, 18 m/s.
    Cruise,
    /// HOLD_ALT, then the battery sags and the vehicle lands.
    Land,
    /// CRUISE while drifting east out of the keep-in zone.
    Geofence,
}

impl FromStr for DemoKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hold" => Ok(DemoKind::Hold),
            "cruise" => Ok(DemoKind::Cruise),
            "land" => Ok(DemoKind::Land),
            "geofence" => Ok(DemoKind::Geofence),
            other => anyhow::bail!("unknown demo scenario: {} (hold|cruise|land|geofence)", other),
        }
    }
}

/// Run a canned demo on top of `cfg`.
pub fn run_demo(
    kind: DemoKind,
    cfg: &AutopilotConfig,
    seconds: f64,
    dt: f64,
) -> Result<Vec<Sample>> {
    let mut ap = Autopilot::new(cfg)?;
    let env = Environment::default();
    let trace = match kind {
        DemoKind::Hold => {
            ap.set_terrain_follow(false);
            ap.set_mode(FlightMode::HoldAlt, Some(50.0), None);
            let mut plant = Plant::new(PlantParams::default(), PlantState::default());
            Scenario::new(seconds, dt, env).run(&mut ap, &mut plant)?
        }
        DemoKind::Cruise => {
            let terrain = 140.0;
            ap.set_terrain_follow(true);
            ap.set_mode(FlightMode::Cruise, Some(terrain + cfg.terrain.agl_offset_m), Some(18.0));
            let start = PlantState { alt_m: terrain, airspeed_ms: 0.0 };
            let mut plant = Plant::new(PlantParams::default(), start);
            let env = Environment { terrain_elev_m: terrain, ..env };
            Scenario::new(seconds, dt, env).run(&mut ap, &mut plant)?
        }
        DemoKind::Land => {
            ap.set_terrain_follow(false);
            ap.set_mode(FlightMode::HoldAlt, Some(50.0), None);
            let mut plant = Plant::new(PlantParams::default(), PlantState::default());
            let sag_tick = (seconds * 0.4 / dt) as usize;
            Scenario::new(seconds, dt, env).run_with(&mut ap, &mut plant, |tick, env| {
                if tick == sag_tick {
                    env.battery_v = 18.0;
                }
            })?
        }
        DemoKind::Geofence => {
            let (lat, lon) = (env.lat, env.lon);
            ap.set_terrain_follow(false);
            ap.set_home(lat, lon, 0.0)?;
            ap.set_geofence(lat, lon, 300.0)?;
            ap.set_mode(FlightMode::Cruise, Some(40.0), Some(18.0));
            let start = PlantState { alt_m: 40.0, airspeed_ms: 18.0 };
            let mut plant = Plant::new(PlantParams::default(), start);
            // drift 15 m per second eastward
            let step_deg = 15.0 * dt / (M_PER_DEG_LAT * kurier_ctl::geofence::LON_SCALE);
            Scenario::new(seconds, dt, env)
                .run_with(&mut ap, &mut plant, |_, env| env.lon += step_deg)?
        }
    };

    if let Some(last) = trace.last() {
        info!(
            "demo {:?}: t={:.1}s alt={:.1} m v={:.1} m/s mode={} targets={:.1}/{:.1} failsafe={}",
            kind,
            last.t_s,
            last.state.alt_m,
            last.state.airspeed_ms,
            last.cmd.mode,
            last.cmd.targets.alt_m,
            last.cmd.targets.airspeed_ms,
            last.cmd.failsafe_reason_str(),
        );
    }
    Ok(trace)
}
