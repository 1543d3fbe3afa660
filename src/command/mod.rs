//! Command execution - player requests against the world
//!
//! Placing nodes and requesting tasks; both validate against the catalog
//! before touching world state.

pub mod executor;

pub use executor::{place_node, request_task};
