//! City layer - recipes, nodes, construction, and production

pub mod building;
pub mod construction;
pub mod production;
pub mod recipe;
pub mod stockpile;

pub use building::{NodeState, ProductionNode};
pub use construction::{apply_construction_work, materials_in_place, ContributionResult};
pub use production::{tick_nodes, NodeTickResult};
pub use recipe::{
    Alternative, BlockDef, LocationPolicy, OutputDef, ProducerRef, RecipeCatalog,
    RequirementGroup, Role, TaskDef,
};
pub use stockpile::Stockpile;
