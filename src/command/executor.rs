//! Command execution - turns player requests into world changes
//!
//! Two entry points: placing a node (the building-placement collaborator)
//! and requesting a task on a node or in the open field.

use crate::city::building::{NodeState, ProductionNode};
use crate::city::recipe::{LocationPolicy, ProducerRef};
use crate::core::error::{ColonyError, Result, WorldRef};
use crate::core::types::{Coord, NodeId, TaskId};
use crate::ecs::world::World;
use crate::entity::tasks::{TaskInstance, TaskKind};

/// Place a node of `block` at `coord`.
///
/// With `built` the node starts complete; otherwise a block with a build
/// cost starts as a construction site with an open construction task.
pub fn place_node(world: &mut World, block: &str, coord: Coord, built: bool) -> Result<NodeId> {
    let def = world
        .catalog
        .block(block)
        .ok_or_else(|| ColonyError::MissingRecipeData(format!("block {}", block)))?;
    let tile = world
        .tiles
        .get(coord)
        .ok_or(ColonyError::InvalidWorldReference(WorldRef::Tile(coord)))?;
    if let Some(existing) = tile.node {
        return Err(ColonyError::InvalidRequest(format!(
            "tile {} already holds node {}",
            coord, existing.0
        )));
    }

    let id = world.ids.node();
    let mut node = ProductionNode::new(id, def, coord, world.config.default_node_capacity);
    if built {
        node.state = NodeState::Complete;
        node.completed_tick = Some(world.current_tick);
    }
    let needs_building = !node.is_usable();
    tracing::info!("Placed {} {} at {} (built: {})", node.block, id.0, coord, !needs_building);
    world.nodes.insert(id, node);
    if let Some(tile) = world.tiles.get_mut(coord) {
        tile.node = Some(id);
    }

    if needs_building {
        let task = TaskInstance::new(world.ids.task(), TaskKind::Construction, Some(id), world.current_tick);
        world.add_task(task);
    }
    Ok(id)
}

/// Create a task instance on request.
///
/// With a node, `task_name` must be one of the node's available tasks;
/// without one it must be an open-field task. `quantity` only applies to
/// batch tasks, and `location` is required exactly for user-chosen tasks.
pub fn request_task(
    world: &mut World,
    node: Option<NodeId>,
    task_name: &str,
    quantity: Option<u32>,
    location: Option<Coord>,
) -> Result<TaskId> {
    let (producer, def) = match node {
        Some(id) => {
            let n = world.node(id)?;
            if !n.is_usable() {
                return Err(ColonyError::InvalidRequest(format!(
                    "{} {} is still under construction",
                    n.block, id.0
                )));
            }
            let def = n
                .available_tasks(&world.catalog, &world.ledger)
                .into_iter()
                .find(|t| t.name == task_name)
                .ok_or_else(|| {
                    ColonyError::InvalidRequest(format!("{} does not offer {}", n.block, task_name))
                })?;
            (ProducerRef::block(&n.block, task_name), def)
        }
        None => {
            let def = world.catalog.field_task(task_name).ok_or_else(|| {
                ColonyError::InvalidRequest(format!("{} is not an open-field task", task_name))
            })?;
            (ProducerRef::field(task_name), def)
        }
    };

    let quantity = quantity.unwrap_or(1);
    if quantity == 0 {
        return Err(ColonyError::InvalidRequest("quantity must be at least 1".into()));
    }
    if quantity > 1 && !def.batch {
        return Err(ColonyError::InvalidRequest(format!(
            "{} cannot be batched",
            task_name
        )));
    }
    match (def.location, location) {
        (LocationPolicy::UserChosen, None) => {
            return Err(ColonyError::InvalidRequest(format!(
                "{} needs a work location",
                task_name
            )));
        }
        (LocationPolicy::UserChosen, Some(c)) if !world.tiles.in_bounds(c) => {
            return Err(ColonyError::InvalidWorldReference(WorldRef::Tile(c)));
        }
        (LocationPolicy::UserChosen, Some(_)) => {}
        (_, Some(_)) => {
            return Err(ColonyError::InvalidRequest(format!(
                "{} does not take a work location",
                task_name
            )));
        }
        (_, None) => {}
    }

    let mut task = TaskInstance::new(
        world.ids.task(),
        TaskKind::Recipe(producer),
        node,
        world.current_tick,
    )
    .with_quantity(quantity);
    if let Some(c) = location {
        task = task.with_location(c);
    }
    tracing::info!("Requested {} x{} as task {}", task.label(), quantity, task.id.0);
    Ok(world.add_task(task))
}
