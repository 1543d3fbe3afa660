//! Spatial layer - the tile grid

pub mod grid;

pub use grid::{TerrainGrid, TerrainKind, Tile};
