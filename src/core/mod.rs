pub mod config;
pub mod error;
pub mod types;

pub use config::SimulationConfig;
pub use error::{ColonyError, ErrorKind, Result};
pub use types::{Coord, ItemId, NodeId, TaskId, Tick, WorkerId};
