//! UI module - render models for a display layer

pub mod state;

pub use state::{node_views, EventLog, LogEntry, NodeView};
