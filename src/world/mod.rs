//! Scenario loading

pub mod loader;

pub use loader::{Scenario, ScenarioLoader};
