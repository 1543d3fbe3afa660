//! Simulation configuration with documented constants
//!
//! All magic numbers are collected here with explanations of their purpose
//! and how they interact with each other. One `SimulationConfig` lives on the
//! `World` for the whole session.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{ColonyError, Result};

/// Configuration for the simulation systems
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // === RANDOMNESS ===
    /// Seed for the world RNG (lottery drops, hunting success)
    pub seed: u64,

    // === RESOLVER ===
    /// How far (Manhattan distance, in tiles) the resolver searches for items
    /// and worker-chosen work spots around the requesting location.
    pub search_radius: u32,

    /// Maximum length of a synthesized-task chain below one top-level task.
    ///
    /// A chain deeper than this is treated as a recipe cycle even if no
    /// producer repeats, so a malformed catalog can never recurse forever.
    pub max_resolve_depth: u32,

    /// Maximum number of tasks synthesized on behalf of one top-level task
    /// over its whole lifetime.
    pub max_synthesized_per_request: u32,

    /// How many times a cannot-work frame may try synthesis before the
    /// requesting task is cancelled as unsatisfiable.
    pub max_synthesis_attempts: u32,

    /// How many times a frame is re-resolved after a failed world lookup
    /// before its task is cancelled.
    pub max_reresolve_attempts: u32,

    // === MOVEMENT ===
    /// Ticks to cross one tile orthogonally on terrain with walk-lag 1.0
    pub orthogonal_step_cost: f32,

    /// Ticks to cross one tile diagonally on terrain with walk-lag 1.0
    pub diagonal_step_cost: f32,

    // === NODES ===
    /// Item capacity of a node inventory when its block does not set one
    pub default_node_capacity: usize,

    // === DRIVER ===
    /// Rate at which the external real-time driver calls `tick()`.
    ///
    /// The core never reads the wall clock; this only converts tick counts
    /// into seconds for reporting.
    pub tick_rate_hz: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,

            search_radius: 12,
            max_resolve_depth: 8,
            max_synthesized_per_request: 32,
            max_synthesis_attempts: 3,
            max_reresolve_attempts: 1,

            orthogonal_step_cost: 1.0,
            diagonal_step_cost: 1.4,

            default_node_capacity: 16,

            tick_rate_hz: 20,
        }
    }
}

impl SimulationConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style seed override
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Load a config from a TOML file. Missing keys keep their defaults.
    pub fn load_from_toml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse a config from a TOML string and validate it
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.orthogonal_step_cost <= 0.0 || self.diagonal_step_cost <= 0.0 {
            return Err(ColonyError::InvalidConfig(
                "step costs must be positive".into(),
            ));
        }

        if self.diagonal_step_cost < self.orthogonal_step_cost {
            return Err(ColonyError::InvalidConfig(format!(
                "diagonal_step_cost ({}) should be >= orthogonal_step_cost ({})",
                self.diagonal_step_cost, self.orthogonal_step_cost
            )));
        }

        if self.max_resolve_depth == 0 || self.max_synthesized_per_request == 0 {
            return Err(ColonyError::InvalidConfig(
                "resolver bounds must be at least 1".into(),
            ));
        }

        if self.default_node_capacity == 0 {
            return Err(ColonyError::InvalidConfig(
                "default_node_capacity must be at least 1".into(),
            ));
        }

        if self.tick_rate_hz == 0 {
            return Err(ColonyError::InvalidConfig("tick_rate_hz must be positive".into()));
        }

        Ok(())
    }

    /// Seconds of simulated time represented by `ticks`
    pub fn ticks_to_seconds(&self, ticks: u64) -> f64 {
        ticks as f64 / self.tick_rate_hz as f64
    }
}
