//! Application state management.

pub mod store;

pub use store::{AppState, SensorEvent, StateError};
