//! Movement simulation for worksite scenarios.

pub mod paths;
pub mod scenarios;

pub use paths::{LinearPath, MovementPath, StationaryPath};
pub use scenarios::{create_approach_scenario, Scenario};
