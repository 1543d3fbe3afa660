//! Resolver - demand search and recursive synthesis
//!
//! `resolve` looks for items satisfying one requirement group and reserves
//! them for the requesting task. `synthesize` is the fallback when nothing
//! suitable exists: it picks a producer from the catalog's reverse index and
//! creates a task instance whose outputs are routed back to the requester.
//!
//! Search order is fully deterministic:
//! 1. items already reserved by the task, anywhere on the map
//! 2. items already in place (the target node's input or tool slot, the
//!    holder's hands for tools)
//! 3. free items on tiles (and node outputs) within `search_radius`, nearest
//!    first by Manhattan distance, ties broken by scan order (y, then x)
//!
//! Alternatives are tried in priority order, except that once a task holds
//! items of one alternative it keeps to that alternative.

use std::collections::BTreeSet;

use crate::city::building::is_unlocked;
use crate::city::recipe::{Alternative, ProducerRef, RequirementGroup, Role};
use crate::core::error::{ColonyError, Result, WorldRef};
use crate::core::types::{Coord, ItemId, NodeId, TaskId, WorkerId};
use crate::ecs::world::World;
use crate::entity::item::NodeSlot;
use crate::entity::tasks::{TaskInstance, TaskKind, TaskState};

/// Outcome of a synthesis attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Synthesis {
    /// A producing task was created and handed to the worker
    Created(TaskId),
    /// The only producer runs at a block with no completed node
    NodeNeeded(String),
}

/// Find and reserve items satisfying `group` for `task`.
///
/// Returns the reserved items of one alternative, or None when no
/// alternative can be completed from what exists within reach. Nothing new
/// is reserved on None.
pub fn resolve(world: &mut World, task: TaskId, group: &RequirementGroup) -> Result<Option<Vec<ItemId>>> {
    let instance = world.task(task)?.clone();
    let origin = search_origin(world, &instance)?;

    for alt in alternative_order(world, &instance, group) {
        let picked: Vec<ItemId> = candidates(world, &instance, origin, &alt.name, group.role)
            .into_iter()
            .take(alt.qty as usize)
            .collect();
        if picked.len() as u32 == alt.qty {
            for item in &picked {
                world.reservations.tag(*item, task);
            }
            tracing::debug!(
                "Task {} reserved {}x {} for {}",
                task.0,
                alt.qty,
                alt.name,
                group.label()
            );
            return Ok(Some(picked));
        }
    }
    Ok(None)
}

/// Node position for node tasks, the holder's position otherwise
fn search_origin(world: &World, task: &TaskInstance) -> Result<Coord> {
    if let Some(node) = task.node {
        return Ok(world.node(node)?.position);
    }
    match task.worker {
        Some(w) => Ok(world.worker(w)?.position),
        None => Err(ColonyError::InvalidWorldReference(WorldRef::Task(task.id))),
    }
}

fn alternative_order<'g>(world: &World, task: &TaskInstance, group: &'g RequirementGroup) -> Vec<&'g Alternative> {
    let held: BTreeSet<&str> = world
        .reservations
        .items_of(task.id)
        .filter_map(|i| world.items.kind_of(i))
        .collect();
    let (sticky, rest): (Vec<&Alternative>, Vec<&Alternative>) = group
        .alternatives
        .iter()
        .partition(|a| held.contains(a.name.as_str()));
    sticky.into_iter().chain(rest).collect()
}

/// Every item of `kind` the task may use, best first
fn candidates(world: &World, task: &TaskInstance, origin: Coord, kind: &str, role: Role) -> Vec<ItemId> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    let mut offer = |item: ItemId, out: &mut Vec<ItemId>| {
        if world.items.kind_of(item) == Some(kind)
            && world.reservations.available_to(item, task.id)
            && seen.insert(item)
        {
            out.push(item);
        }
    };

    let reserved: Vec<ItemId> = world.reservations.items_of(task.id).collect();
    for item in reserved {
        offer(item, &mut out);
    }

    if role == Role::Tool {
        if let Some(worker) = task.worker.and_then(|w| world.workers.get(&w)) {
            for item in &worker.carried {
                offer(*item, &mut out);
            }
        }
    }
    if let Some(node) = task.node.and_then(|n| world.nodes.get(&n)) {
        let slot = match role {
            Role::Input => NodeSlot::Input,
            Role::Tool => NodeSlot::Tool,
        };
        for item in node.stockpile.slot(slot) {
            offer(*item, &mut out);
        }
    }

    let mut nearby: Vec<(u32, usize, ItemId)> = Vec::new();
    for (scan, tile) in world
        .tiles
        .within_radius(origin, world.config.search_radius)
        .enumerate()
    {
        let distance = origin.manhattan(&tile.coord);
        for item in &tile.items {
            nearby.push((distance, scan, *item));
        }
        if let Some(node) = tile.node.and_then(|n| world.nodes.get(&n)) {
            for item in &node.stockpile.onhand {
                nearby.push((distance, scan, *item));
            }
        }
    }
    nearby.sort_by_key(|(distance, scan, _)| (*distance, *scan));
    for (_, _, item) in nearby {
        offer(item, &mut out);
    }
    out
}

/// Create a task that produces something `group` accepts, on behalf of
/// `requester`, held by `worker`.
///
/// Producer choice: the first alternative (priority order) with an unlocked
/// producer that can run now (field task, or block with a completed node).
/// Failing that, degrade to the last alternative that has any producer,
/// regardless of unlocks.
pub fn synthesize(
    world: &mut World,
    requester: TaskId,
    worker: WorkerId,
    group: &RequirementGroup,
) -> Result<Synthesis> {
    let parent = world.task(requester)?.clone();

    let (producer, node, alt) = match choose_producer(world, group)? {
        Choice::Ready(p, node, alt) => (p, node, alt),
        Choice::NodeNeeded(block) => {
            tracing::warn!(
                "Cannot synthesize {} for task {}: no completed {}",
                group.label(),
                requester.0,
                block
            );
            return Ok(Synthesis::NodeNeeded(block));
        }
    };

    check_bounds(world, &parent, &producer)?;

    let def = world.catalog.task(&producer)?;
    let already: u32 = world
        .reservations
        .items_of(requester)
        .filter(|i| world.items.kind_of(*i) == Some(alt.name.as_str()))
        .count() as u32;
    let need = alt.qty.saturating_sub(already).max(1);
    let per_unit: u32 = def
        .outputs
        .iter()
        .filter(|o| o.name == alt.name)
        .map(|o| o.qty)
        .sum::<u32>()
        .max(1);
    let units = if def.batch { need.div_ceil(per_unit) } else { 1 };

    let id = world.ids.task();
    let mut task = TaskInstance::new(id, TaskKind::Recipe(producer.clone()), node, world.current_tick)
        .requested_for(&parent)
        .with_quantity(units);
    task.worker = Some(worker);
    task.state = TaskState::InProgress;
    world.add_task(task);
    if let Ok(root) = world.task_mut(parent.root) {
        root.synthesized += 1;
    }

    tracing::info!(
        "Synthesized task {} ({} x{}) for task {} at depth {}",
        id.0,
        producer,
        units,
        requester.0,
        parent.depth + 1
    );
    Ok(Synthesis::Created(id))
}

enum Choice {
    Ready(ProducerRef, Option<NodeId>, Alternative),
    NodeNeeded(String),
}

fn choose_producer(world: &World, group: &RequirementGroup) -> Result<Choice> {
    for alt in &group.alternatives {
        for producer in world.catalog.producers_of(&alt.name) {
            let Ok(def) = world.catalog.task(producer) else {
                continue;
            };
            if !is_unlocked(def, &world.ledger) {
                continue;
            }
            match &producer.block {
                None => return Ok(Choice::Ready(producer.clone(), None, alt.clone())),
                Some(block) => {
                    if let Some(node) = world.first_node_of(block) {
                        return Ok(Choice::Ready(producer.clone(), Some(node), alt.clone()));
                    }
                }
            }
        }
    }

    for alt in group.alternatives.iter().rev() {
        if let Some(producer) = world.catalog.producers_of(&alt.name).first() {
            return Ok(match &producer.block {
                None => Choice::Ready(producer.clone(), None, alt.clone()),
                Some(block) => match world.first_node_of(block) {
                    Some(node) => Choice::Ready(producer.clone(), Some(node), alt.clone()),
                    None => Choice::NodeNeeded(block.clone()),
                },
            });
        }
    }

    Err(ColonyError::unsatisfiable(
        group.label(),
        "nothing in the catalog produces it",
    ))
}

/// Runtime guard against cyclic catalogs
fn check_bounds(world: &World, parent: &TaskInstance, producer: &ProducerRef) -> Result<()> {
    let mut cursor = Some(parent);
    while let Some(task) = cursor {
        if task.producer() == Some(producer) {
            return Err(ColonyError::RecipeCycle(format!(
                "{} already in the chain of task {}",
                producer, parent.root.0
            )));
        }
        cursor = task.requested_by.and_then(|id| world.tasks.get(&id));
    }

    if parent.depth + 1 > world.config.max_resolve_depth {
        return Err(ColonyError::RecipeCycle(format!(
            "{} exceeds depth {}",
            producer, world.config.max_resolve_depth
        )));
    }

    let synthesized = world.tasks.get(&parent.root).map_or(0, |r| r.synthesized);
    if synthesized >= world.config.max_synthesized_per_request {
        return Err(ColonyError::RecipeCycle(format!(
            "task {} synthesized {} tasks",
            parent.root.0, synthesized
        )));
    }
    Ok(())
}
