//! Load a starting world from a JSON scenario file
//!
//! A scenario describes the map (base terrain plus rectangular patches),
//! loose items and tools, workers, nodes and the initial task requests.
//! `ScenarioLoader` turns it into a ready-to-tick `World`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::city::recipe::RecipeCatalog;
use crate::command::executor::{place_node, request_task};
use crate::core::config::SimulationConfig;
use crate::core::error::{ColonyError, Result};
use crate::core::types::{Coord, NodeId};
use crate::ecs::world::World;
use crate::spatial::grid::TerrainKind;

/// A rectangle of terrain laid over the base, corners inclusive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainPatch {
    pub terrain: TerrainKind,
    pub from: Coord,
    pub to: Coord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPlacement {
    pub kind: String,
    pub at: Coord,
    #[serde(default = "one")]
    pub count: u32,
}

/// A tool on a tile, or stored in a node's tool slot when `node` (an index
/// into the scenario's `nodes` list) is given instead of `at`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPlacement {
    pub kind: String,
    #[serde(default)]
    pub at: Option<Coord>,
    #[serde(default)]
    pub node: Option<usize>,
    pub durability: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPlacement {
    pub name: String,
    pub at: Coord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodePlacement {
    pub block: String,
    pub at: Coord,
    /// Start complete instead of as a construction site
    #[serde(default)]
    pub built: bool,
}

/// An initial task request. `node` indexes the scenario's `nodes` list;
/// leave it out for open-field tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    #[serde(default)]
    pub node: Option<usize>,
    pub task: String,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub location: Option<Coord>,
}

/// Scenario file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_terrain")]
    pub terrain: TerrainKind,
    #[serde(default)]
    pub patches: Vec<TerrainPatch>,
    #[serde(default)]
    pub items: Vec<ItemPlacement>,
    #[serde(default)]
    pub tools: Vec<ToolPlacement>,
    #[serde(default)]
    pub workers: Vec<WorkerPlacement>,
    #[serde(default)]
    pub nodes: Vec<NodePlacement>,
    #[serde(default)]
    pub requests: Vec<TaskRequest>,
}

fn one() -> u32 {
    1
}

fn default_terrain() -> TerrainKind {
    TerrainKind::Grass
}

fn scenario_node(nodes: &[NodeId], index: usize, wanted_by: &str) -> Result<NodeId> {
    nodes.get(index).copied().ok_or_else(|| {
        ColonyError::InvalidRequest(format!(
            "{} names node #{} of {}",
            wanted_by,
            index,
            nodes.len()
        ))
    })
}

/// Builds worlds from scenarios against a given catalog and config
pub struct ScenarioLoader {
    catalog: RecipeCatalog,
    config: SimulationConfig,
}

impl ScenarioLoader {
    pub fn new(catalog: RecipeCatalog, config: SimulationConfig) -> Self {
        Self { catalog, config }
    }

    /// Load a scenario from a JSON string
    pub fn load_from_json(&self, json: &str) -> Result<World> {
        let scenario: Scenario = serde_json::from_str(json)?;
        self.build(&scenario)
    }

    /// Load a scenario from a JSON file on disk
    pub fn load_from_file(&self, path: &Path) -> Result<World> {
        let content = std::fs::read_to_string(path)?;
        self.load_from_json(&content)
    }

    /// Instantiate a parsed scenario
    pub fn build(&self, scenario: &Scenario) -> Result<World> {
        if scenario.width == 0 || scenario.height == 0 {
            return Err(ColonyError::InvalidRequest("scenario map is empty".into()));
        }
        self.config.validate()?;
        self.catalog.validate()?;

        let mut world = World::new(
            scenario.width,
            scenario.height,
            scenario.terrain,
            self.catalog.clone(),
            self.config.clone(),
        );

        for patch in &scenario.patches {
            for y in patch.from.y.min(patch.to.y)..=patch.from.y.max(patch.to.y) {
                for x in patch.from.x.min(patch.to.x)..=patch.from.x.max(patch.to.x) {
                    world.tiles.set_base(Coord::new(x, y), patch.terrain);
                }
            }
        }

        let mut nodes: Vec<NodeId> = Vec::with_capacity(scenario.nodes.len());
        for placement in &scenario.nodes {
            nodes.push(place_node(&mut world, &placement.block, placement.at, placement.built)?);
        }
        for placement in &scenario.items {
            for _ in 0..placement.count {
                world.spawn_item(&placement.kind, placement.at)?;
            }
        }
        for placement in &scenario.tools {
            match (placement.at, placement.node) {
                (Some(at), None) => {
                    world.spawn_tool(&placement.kind, placement.durability, at)?;
                }
                (None, Some(index)) => {
                    let node = scenario_node(&nodes, index, &placement.kind)?;
                    let at = world.node(node)?.position;
                    let tool = world.spawn_tool(&placement.kind, placement.durability, at)?;
                    if !world.accept_tool(node, tool)? {
                        return Err(ColonyError::InvalidRequest(format!(
                            "no room for {} at node #{}",
                            placement.kind, index
                        )));
                    }
                }
                _ => {
                    return Err(ColonyError::InvalidRequest(format!(
                        "tool {} needs exactly one of `at` or `node`",
                        placement.kind
                    )))
                }
            }
        }
        for placement in &scenario.workers {
            world.spawn_worker(placement.name.clone(), placement.at)?;
        }

        for request in &scenario.requests {
            let node = match request.node {
                Some(index) => Some(scenario_node(&nodes, index, &request.task)?),
                None => None,
            };
            request_task(&mut world, node, &request.task, request.quantity, request.location)?;
        }

        tracing::info!(
            "Loaded scenario: {}x{}, {} workers, {} nodes, {} items, {} tasks",
            scenario.width,
            scenario.height,
            world.workers.len(),
            world.nodes.len(),
            world.items.len(),
            world.tasks.len()
        );
        Ok(world)
    }
}
