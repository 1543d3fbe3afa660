pub mod execute;
pub mod resolver;
pub mod tick;

pub use resolver::{resolve, synthesize, Synthesis};
pub use tick::{run_simulation_tick, run_ticks, SimulationEvent};
