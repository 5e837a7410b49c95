pub mod plant;
pub mod scenario;

pub use plant::{Plant, PlantParams, PlantState};
pub use scenario::{Environment, Sample, Scenario};
