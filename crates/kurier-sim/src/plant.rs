//! Toy longitudinal dynamics for demos and closed-loop tests.
//!
//! alt' = kT * (thrust - hover) + kP * pitch
//! v'   = kV * pitch - drag * v

use kurier_proto::ActuatorCommand;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PlantParams {
    pub k_thrust: f64,
    pub hover: f64,
    pub k_pitch_climb: f64,
    pub k_pitch_speed: f64,
    pub drag: f64,
}

impl Default for PlantParams {
    fn default() -> Self {
        Self { k_thrust: 6.0, hover: 0.45, k_pitch_climb: 2.0, k_pitch_speed: 10.0, drag: 0.12 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlantState {
    pub alt_m: f64,
    pub airspeed_ms: f64,
}

#[derive(Debug, Clone)]
pub struct Plant {
    params: PlantParams,
    state: PlantState,
}

impl Plant {
    pub fn new(params: PlantParams, initial: PlantState) -> Self {
        Self { params, state: initial }
    }

    pub fn state(&self) -> PlantState {
        self.state
    }

    /// Explicit Euler step. Altitude and airspeed never go negative.
    pub fn step(&mut self, cmd: &ActuatorCommand, dt: f64) -> PlantState {
        let p = &self.params;
        let s = &mut self.state;
        let alt_dot = p.k_thrust * (cmd.thrust - p.hover) + p.k_pitch_climb * cmd.pitch;
        let v_dot = p.k_pitch_speed * cmd.pitch - p.drag * s.airspeed_ms;
        s.alt_m = (s.alt_m + alt_dot * dt).max(0.0);
        s.airspeed_ms = (s.airspeed_ms + v_dot * dt).max(0.0);
        *s
    }
}
