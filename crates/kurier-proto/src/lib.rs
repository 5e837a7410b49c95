pub mod command;
pub mod telemetry;

pub use command::{
    ActuatorCommand, FailsafeReason, FlightMode, ManualCommand, ParseModeError, SensorSnapshot,
    SystemSnapshot, Targets,
};
