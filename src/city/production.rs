//! Production system - finishing work units and the autonomous node tick
//!
//! Worker-driven tasks and node-driven (autonomous) tasks finish a batch unit
//! the same way:
//! - Inputs in place are consumed (or released, for deposit-only tasks)
//! - Outputs are created at the node or on the worked tile
//! - The completed count advances and progress resets
//!
//! The node tick itself covers only what happens without a worker present:
//! fire heat decay and refuelling, autonomous recipes, and burning of
//! perishable outputs left too long on a hot fire.

use crate::city::recipe::{RequirementGroup, Role, TaskDef};
use crate::core::error::{ColonyError, Result};
use crate::core::types::{ItemId, NodeId, TaskId};
use crate::ecs::world::{Removal, World};
use crate::entity::item::{ItemLocation, NodeSlot};
use crate::entity::tasks::{TaskInstance, TaskState};

/// One finished batch unit
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedUnit {
    pub task: TaskId,
    pub outputs: Vec<ItemId>,
    /// Quantity reached; the caller retires the task
    pub batch_done: bool,
}

/// What a node did on its own this tick
#[derive(Debug)]
pub struct NodeTickResult {
    pub node: NodeId,
    /// Fuel kinds burned
    pub fuel_burned: Vec<String>,
    pub finished: Vec<FinishedUnit>,
    /// (spoiled kind, replacement item)
    pub burnt: Vec<(String, ItemId)>,
    /// Autonomous tasks that could not be advanced
    pub failed: Vec<(TaskId, ColonyError)>,
}

impl NodeTickResult {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            fuel_burned: Vec::new(),
            finished: Vec::new(),
            burnt: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Nothing happened
    pub fn is_quiet(&self) -> bool {
        self.fuel_burned.is_empty()
            && self.finished.is_empty()
            && self.burnt.is_empty()
            && self.failed.is_empty()
    }
}

/// Whether `item` sits where `task` uses it: tools in the holder's hands,
/// inputs in the node's input slot (or in hand for node-less tasks)
pub fn is_in_place(world: &World, task: &TaskInstance, item: ItemId, role: Role) -> bool {
    let Some(found) = world.items.get(item) else {
        return false;
    };
    let carried = |w| found.location == ItemLocation::Carried(w);
    match (role, task.node) {
        (Role::Tool, _) | (Role::Input, None) => task.worker.map_or(false, carried),
        (Role::Input, Some(node)) => {
            found.location
                == ItemLocation::Node {
                    node,
                    slot: NodeSlot::Input,
                }
        }
    }
}

/// Items reserved by `task` and in place that satisfy `group`, if enough are
/// present for one alternative. Alternatives are tried in priority order.
pub fn placed_for(world: &World, task: &TaskInstance, group: &RequirementGroup) -> Option<Vec<ItemId>> {
    let reserved: Vec<ItemId> = world
        .reservations
        .items_of(task.id)
        .filter(|i| is_in_place(world, task, *i, group.role))
        .collect();

    group.alternatives.iter().find_map(|alt| {
        let matching: Vec<ItemId> = reserved
            .iter()
            .copied()
            .filter(|i| world.items.kind_of(*i) == Some(alt.name.as_str()))
            .take(alt.qty as usize)
            .collect();
        (matching.len() as u32 >= alt.qty).then_some(matching)
    })
}

/// Consume the in-place inputs of every input group
pub fn consume_inputs(world: &mut World, task: TaskId, groups: &[RequirementGroup]) -> Result<u32> {
    let mut consumed = 0;
    for group in groups.iter().filter(|g| g.role == Role::Input) {
        let instance = world.task(task)?.clone();
        if let Some(items) = placed_for(world, &instance, group) {
            for item in items {
                world.remove_item(item, Removal::Consumed)?;
                consumed += 1;
            }
        }
    }
    Ok(consumed)
}

/// Untag in-place inputs and leave them where they are (fuel deliveries)
fn release_inputs(world: &mut World, task: TaskId, groups: &[RequirementGroup]) -> Result<()> {
    for group in groups.iter().filter(|g| g.role == Role::Input) {
        let instance = world.task(task)?.clone();
        if let Some(items) = placed_for(world, &instance, group) {
            for item in items {
                world.reservations.untag(item);
            }
        }
    }
    Ok(())
}

/// Finish one batch unit of a recipe task, placing outputs at `output_at`
pub fn finish_unit(
    world: &mut World,
    task: TaskId,
    def: &TaskDef,
    output_at: ItemLocation,
) -> Result<FinishedUnit> {
    if def.deposit_only {
        release_inputs(world, task, &def.requirements)?;
    } else {
        consume_inputs(world, task, &def.requirements)?;
    }
    let outputs = world.create_outputs(task, def, output_at)?;

    let instance = world.task_mut(task)?;
    instance.completed += 1;
    instance.progress = 0.0;
    let batch_done = instance.batch_done();

    tracing::info!(
        "Task {} finished unit {}/{} of {} ({} outputs)",
        task.0,
        instance.completed,
        instance.quantity,
        def.name,
        outputs.len()
    );

    Ok(FinishedUnit {
        task,
        outputs,
        batch_done,
    })
}

/// Run the autonomous tick of every usable node, in id order
pub fn tick_nodes(world: &mut World) -> Vec<NodeTickResult> {
    let ids: Vec<NodeId> = world
        .nodes
        .values()
        .filter(|n| n.is_usable())
        .map(|n| n.id)
        .collect();

    ids.into_iter()
        .map(|id| tick_node(world, id))
        .filter(|r| !r.is_quiet())
        .collect()
}

fn tick_node(world: &mut World, id: NodeId) -> NodeTickResult {
    let mut result = NodeTickResult::new(id);
    let fire = world
        .nodes
        .get(&id)
        .and_then(|n| world.catalog.block(&n.block))
        .and_then(|b| b.fire.clone());

    // Heat
    if let Some(fire) = &fire {
        let heat = match world.nodes.get_mut(&id) {
            Some(node) => {
                node.heat = (node.heat - fire.decay_per_tick).max(0.0);
                node.heat
            }
            None => return result,
        };
        if heat < fire.refuel_below {
            let fuel = world.nodes.get(&id).and_then(|n| {
                n.stockpile.inputs.iter().copied().find(|item| {
                    world.reservations.holder(*item).is_none()
                        && world
                            .items
                            .kind_of(*item)
                            .map_or(false, |k| fire.fuel.iter().any(|f| f == k))
                })
            });
            if let Some(fuel) = fuel {
                if let Ok(item) = world.remove_item(fuel, Removal::Consumed) {
                    if let Some(node) = world.nodes.get_mut(&id) {
                        node.heat = (node.heat + fire.heat_per_fuel).min(fire.max_heat);
                    }
                    tracing::debug!("Node {} burned {}", id.0, item.kind);
                    result.fuel_burned.push(item.kind);
                }
            }
        }
    }
    let hot = fire.is_none() || world.nodes.get(&id).map_or(false, |n| n.heat > 0.0);

    // Autonomous recipes
    let processing: Vec<TaskId> = world
        .nodes
        .get(&id)
        .map(|n| n.active_tasks.clone())
        .unwrap_or_default()
        .into_iter()
        .filter(|t| world.tasks.get(t).map_or(false, |t| t.state == TaskState::Processing))
        .collect();
    if hot {
        for task in processing {
            match advance_processing(world, id, task) {
                Ok(Some(unit)) => result.finished.push(unit),
                Ok(None) => {}
                Err(e) => result.failed.push((task, e)),
            }
        }
    }

    // Burning
    if fire.is_some() && hot {
        let now = world.current_tick;
        let spoiled: Vec<(ItemId, String)> = world
            .nodes
            .get(&id)
            .map(|n| n.stockpile.onhand.clone())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                let perishable = world.items.get(item)?.perishable.as_ref()?;
                perishable
                    .is_spoiled(now)
                    .then(|| (item, perishable.spoils_into.clone()))
            })
            .collect();
        for (item, into) in spoiled {
            match burn_item(world, id, item, &into) {
                Ok((kind, replacement)) => result.burnt.push((kind, replacement)),
                Err(e) => tracing::warn!("Node {} could not burn item {}: {}", id.0, item.0, e),
            }
        }
    }

    result
}

fn advance_processing(world: &mut World, node: NodeId, task: TaskId) -> Result<Option<FinishedUnit>> {
    let instance = world.task(task)?.clone();
    let def = world.task_def(&instance)?.clone();

    let progress = {
        let t = world.task_mut(task)?;
        t.progress += 1.0;
        t.progress
    };
    if progress < def.duration as f32 {
        return Ok(None);
    }

    let unit = finish_unit(
        world,
        task,
        &def,
        ItemLocation::Node {
            node,
            slot: NodeSlot::Onhand,
        },
    )?;
    if unit.batch_done {
        world.complete_task(task);
    } else {
        // Next unit needs fresh inputs delivered
        let t = world.task_mut(task)?;
        t.state = TaskState::Open;
        t.worker = None;
    }
    Ok(Some(unit))
}

fn burn_item(world: &mut World, node: NodeId, item: ItemId, into: &str) -> Result<(String, ItemId)> {
    let holder = world.reservations.holder(item);
    let old = world.remove_item(item, Removal::Destroyed)?;
    let replacement = world.create_item(
        into,
        None,
        None,
        ItemLocation::Node {
            node,
            slot: NodeSlot::Onhand,
        },
    )?;
    if let Some(task) = holder {
        world.reservations.tag(replacement, task);
    }
    tracing::info!("{} burnt into {} at node {}", old.kind, into, node.0);
    Ok((old.kind, replacement))
}
