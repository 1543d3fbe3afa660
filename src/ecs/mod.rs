pub mod world;

pub use world::{Removal, World};
