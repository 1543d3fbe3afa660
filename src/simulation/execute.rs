//! Frame execution - one state-machine step for one worker
//!
//! The innermost frame of a worker's stack always runs. A step either walks
//! one cell toward the frame's target, or performs the frame's action once
//! the worker stands on it. Actions may push frames (fetches, cannot-work,
//! synthesized tasks) or pop the current one; the parent frame resumes on a
//! later tick and re-validates everything it relies on.
//!
//! Errors are returned with the stack untouched so the scheduler can apply
//! the recovery policy to the frame that failed.

use crate::city::construction::{apply_construction_work, build_cost, materials_in_place, ContributionResult};
use crate::city::production::{finish_unit, is_in_place, placed_for, FinishedUnit};
use crate::city::recipe::{LocationPolicy, RequirementGroup, Role, TaskDef};
use crate::core::error::{ColonyError, Result, WorldRef};
use crate::core::types::{Coord, ItemId, TaskId, WorkerId};
use crate::ecs::world::{Removal, World};
use crate::entity::item::{ItemLocation, NodeSlot};
use crate::entity::tasks::{Destination, FrameKind, TaskFrame, TaskInstance, TaskKind, TaskState};
use crate::entity::worker::Movement;
use crate::simulation::resolver::{self, Synthesis};
use crate::simulation::tick::SimulationEvent;

/// The frame a worker starts a task with
pub fn initial_frame(world: &World, task: TaskId) -> Result<TaskFrame> {
    let instance = world.task(task)?;
    let frame = match (&instance.kind, instance.node) {
        (TaskKind::Construction, Some(node)) => {
            TaskFrame::new(FrameKind::Construct, task).at(world.node(node)?.position)
        }
        (TaskKind::Recipe(_), Some(node)) => {
            TaskFrame::new(FrameKind::WorkOnSite, task).at(world.node(node)?.position)
        }
        (TaskKind::Recipe(_), None) => TaskFrame::new(FrameKind::WorkAtSpot, task),
        (TaskKind::Construction, None) => {
            return Err(ColonyError::InvalidWorldReference(WorldRef::Task(task)))
        }
    };
    Ok(frame)
}

/// Bind an open task to an idle worker
pub fn assign_task(world: &mut World, worker: WorkerId, task: TaskId) -> Result<()> {
    let frame = initial_frame(world, task)?;
    let instance = world.task_mut(task)?;
    instance.worker = Some(worker);
    instance.state = TaskState::InProgress;
    world.worker_mut(worker)?.push(frame);
    tracing::debug!("Worker {} took task {}", worker.0, task.0);
    Ok(())
}

/// Join a construction task as a helper
pub fn assist_task(world: &mut World, worker: WorkerId, task: TaskId) -> Result<()> {
    let frame = initial_frame(world, task)?;
    let instance = world.task_mut(task)?;
    if !instance.helpers.contains(&worker) {
        instance.helpers.push(worker);
    }
    world.worker_mut(worker)?.push(frame);
    tracing::debug!("Worker {} assisting task {}", worker.0, task.0);
    Ok(())
}

/// Execute one step of the worker's innermost frame
pub fn step_worker(world: &mut World, worker: WorkerId, events: &mut Vec<SimulationEvent>) -> Result<()> {
    let Some(frame) = world.worker(worker)?.current_frame().cloned() else {
        return Ok(());
    };
    if !world.tasks.contains_key(&frame.task) {
        // Task retired under this frame
        world.worker_mut(worker)?.pop();
        return Ok(());
    }

    match frame.kind.clone() {
        FrameKind::WorkOnSite => work_on_site(world, worker, &frame, events),
        FrameKind::WorkAtSpot => work_at_spot(world, worker, &frame, events),
        FrameKind::Construct => construct(world, worker, &frame, events),
        FrameKind::FetchItem { item, dest } => fetch(world, worker, &frame, item, dest),
        FrameKind::FetchTool { item } => fetch(world, worker, &frame, item, Destination::Carry),
        FrameKind::MoveItem { item, dest } => carry(world, worker, &frame, item, dest),
        FrameKind::CannotWork {
            group,
            dependency,
            attempts,
        } => cannot_work(world, worker, &frame, group, dependency, attempts, events),
    }
}

// === HELPERS ===

/// Walk toward `target`; true once standing on it
fn walk(world: &mut World, worker: WorkerId, target: Coord) -> Result<bool> {
    let World {
        workers,
        tiles,
        config,
        ..
    } = world;
    let w = workers
        .get_mut(&worker)
        .ok_or(ColonyError::InvalidWorldReference(WorldRef::Worker(worker)))?;
    match w.advance_toward(target, tiles, config) {
        Movement::Arrived => Ok(true),
        Movement::Moved | Movement::Waiting => Ok(false),
        Movement::Blocked => Err(ColonyError::InvalidWorldReference(WorldRef::Tile(target))),
    }
}

fn set_target(world: &mut World, worker: WorkerId, target: Option<Coord>) -> Result<()> {
    if let Some(frame) = world.worker_mut(worker)?.current_frame_mut() {
        frame.target = target;
    }
    Ok(())
}

fn pop(world: &mut World, worker: WorkerId) -> Result<()> {
    if let Some(frame) = world.worker_mut(worker)?.pop() {
        tracing::debug!("Worker {} finished {} frame", worker.0, frame.kind.name());
    }
    Ok(())
}

fn destination_coord(world: &World, dest: Destination, worker: WorkerId) -> Result<Coord> {
    match dest {
        Destination::Node(node) => Ok(world.node(node)?.position),
        Destination::Tile(c) => Ok(c),
        Destination::Carry => Ok(world.worker(worker)?.position),
    }
}

/// Requirement groups and duration behind a task
fn requirements(world: &World, task: &TaskInstance) -> Result<(Vec<RequirementGroup>, u32)> {
    match &task.kind {
        TaskKind::Recipe(_) => {
            let def = world.task_def(task)?;
            Ok((def.requirements.clone(), def.duration))
        }
        TaskKind::Construction => {
            let node = task
                .node
                .ok_or(ColonyError::InvalidWorldReference(WorldRef::Task(task.id)))?;
            let cost = build_cost(world, node)?;
            Ok((cost.requirements, cost.duration))
        }
    }
}

/// Make sure every group is reserved and in place.
///
/// Returns true when the task can be worked. Otherwise the frames needed to
/// get there (fetches, or a cannot-work) have been pushed.
fn ensure_requirements(
    world: &mut World,
    worker: WorkerId,
    task: TaskId,
    groups: &[RequirementGroup],
) -> Result<bool> {
    for (index, group) in groups.iter().enumerate() {
        let instance = world.task(task)?.clone();
        if placed_for(world, &instance, group).is_some() {
            continue;
        }

        let Some(items) = resolver::resolve(world, task, group)? else {
            tracing::debug!(
                "Worker {} cannot find {} for task {}",
                worker.0,
                group.label(),
                task.0
            );
            world.worker_mut(worker)?.push(TaskFrame::new(
                FrameKind::CannotWork {
                    group: index,
                    dependency: None,
                    attempts: 0,
                },
                task,
            ));
            return Ok(false);
        };

        let mut frames = Vec::new();
        for item in items.iter().rev() {
            if is_in_place(world, &instance, *item, group.role) {
                continue;
            }
            let at = world
                .item_coord(*item)
                .ok_or(ColonyError::InvalidWorldReference(WorldRef::Item(*item)))?;
            let kind = match (group.role, instance.node) {
                (Role::Tool, _) => FrameKind::FetchTool { item: *item },
                (Role::Input, Some(node)) => FrameKind::FetchItem {
                    item: *item,
                    dest: Destination::Node(node),
                },
                (Role::Input, None) => FrameKind::FetchItem {
                    item: *item,
                    dest: Destination::Carry,
                },
            };
            frames.push(TaskFrame::new(kind, task).at(at));
        }
        if frames.is_empty() {
            // Reserved just now from what was already in place
            continue;
        }
        let w = world.worker_mut(worker)?;
        for frame in frames {
            tracing::debug!("Worker {} pushes {} for task {}", worker.0, frame.kind.name(), task.0);
            w.push(frame);
        }
        return Ok(false);
    }
    Ok(true)
}

/// Wear every equipped tool of the task by one use.
///
/// A tool already at zero durability breaks instead; the step then makes no
/// progress. Returns whether work may proceed.
fn wear_tools(
    world: &mut World,
    task: TaskId,
    def: &TaskDef,
    events: &mut Vec<SimulationEvent>,
) -> Result<bool> {
    let instance = world.task(task)?.clone();
    let tools: Vec<ItemId> = def
        .requirements
        .iter()
        .filter(|g| g.role == Role::Tool)
        .filter_map(|g| placed_for(world, &instance, g))
        .flatten()
        .collect();

    let mut intact = true;
    for tool in tools {
        let durability = world.item(tool)?.durability;
        match durability {
            Some(0) => {
                let broken = world.remove_item(tool, Removal::Destroyed)?;
                tracing::info!("{} {} wore out during task {}", broken.kind, tool.0, task.0);
                events.push(SimulationEvent::ToolWornOut {
                    item: tool,
                    kind: broken.kind,
                });
                intact = false;
            }
            Some(left) => {
                if let Some(item) = world.items.get_mut(tool) {
                    item.durability = Some(left.saturating_sub(def.tool_wear));
                }
            }
            None => {}
        }
    }
    Ok(intact)
}

/// Apply one step of work; true when the current unit is done
fn apply_work(world: &mut World, worker: WorkerId, task: TaskId, duration: u32) -> Result<bool> {
    let efficiency = world.worker(worker)?.efficiency;
    let instance = world.task_mut(task)?;
    instance.progress += efficiency;
    Ok(instance.progress >= duration as f32)
}

fn report_unit(world: &World, unit: &FinishedUnit, events: &mut Vec<SimulationEvent>) {
    for item in &unit.outputs {
        if let Some(kind) = world.items.kind_of(*item) {
            events.push(SimulationEvent::ItemProduced {
                task: unit.task,
                item: *item,
                kind: kind.to_string(),
            });
        }
    }
}

fn retire(world: &mut World, task: TaskId, events: &mut Vec<SimulationEvent>) {
    world.complete_task(task);
    tracing::info!("Task {} complete", task.0);
    events.push(SimulationEvent::TaskCompleted { task });
}

// === FRAMES ===

fn work_on_site(
    world: &mut World,
    worker: WorkerId,
    frame: &TaskFrame,
    events: &mut Vec<SimulationEvent>,
) -> Result<()> {
    let task = world.task(frame.task)?.clone();
    let def = world.task_def(&task)?.clone();
    let node = task
        .node
        .ok_or(ColonyError::InvalidWorldReference(WorldRef::Task(task.id)))?;
    if !world.node(node)?.is_usable() {
        return Err(ColonyError::InvalidWorldReference(WorldRef::Node(node)));
    }
    let target = match frame.target {
        Some(t) => t,
        None => {
            let at = world.node(node)?.position;
            set_target(world, worker, Some(at))?;
            at
        }
    };

    if !ensure_requirements(world, worker, task.id, &def.requirements)? {
        return Ok(());
    }

    if def.autonomous {
        // Inputs delivered; the node takes it from here
        let instance = world.task_mut(task.id)?;
        instance.state = TaskState::Processing;
        instance.worker = None;
        pop(world, worker)?;
        events.push(SimulationEvent::TaskProcessing { task: task.id, node });
        return Ok(());
    }

    if !walk(world, worker, target)? {
        return Ok(());
    }
    if !wear_tools(world, task.id, &def, events)? {
        return Ok(());
    }
    if !apply_work(world, worker, task.id, def.duration)? {
        return Ok(());
    }

    let unit = finish_unit(
        world,
        task.id,
        &def,
        ItemLocation::Node {
            node,
            slot: NodeSlot::Onhand,
        },
    )?;
    report_unit(world, &unit, events);
    if unit.batch_done {
        retire(world, task.id, events);
    }
    Ok(())
}

fn work_at_spot(
    world: &mut World,
    worker: WorkerId,
    frame: &TaskFrame,
    events: &mut Vec<SimulationEvent>,
) -> Result<()> {
    let task = world.task(frame.task)?.clone();
    let def = world.task_def(&task)?.clone();

    if !ensure_requirements(world, worker, task.id, &def.requirements)? {
        return Ok(());
    }

    let target = match frame.target {
        Some(t) => t,
        None => {
            let site = choose_site(world, worker, &task, &def)?;
            tracing::debug!("Worker {} picked site {} for task {}", worker.0, site, task.id.0);
            set_target(world, worker, Some(site))?;
            site
        }
    };

    if !walk(world, worker, target)? {
        return Ok(());
    }
    if !wear_tools(world, task.id, &def, events)? {
        return Ok(());
    }
    if !apply_work(world, worker, task.id, def.duration)? {
        return Ok(());
    }

    let unit = finish_unit(world, task.id, &def, ItemLocation::Tile(target))?;
    report_unit(world, &unit, events);

    if let LocationPolicy::WorkerChosen(rule) = &def.location {
        if let Some(depleted) = rule.deplete_to {
            if let Some(tile) = world.tiles.get_mut(target) {
                tile.overridden = Some(depleted);
            }
        }
    }

    if unit.batch_done {
        retire(world, task.id, events);
    } else if task.location.is_none() {
        // Next unit picks a fresh site
        set_target(world, worker, None)?;
    }
    Ok(())
}

/// Nearest free tile matching the task's site rule
fn choose_site(world: &World, worker: WorkerId, task: &TaskInstance, def: &TaskDef) -> Result<Coord> {
    if let Some(at) = task.location {
        if !world.tiles.in_bounds(at) {
            return Err(ColonyError::InvalidWorldReference(WorldRef::Tile(at)));
        }
        return Ok(at);
    }
    let rule = match &def.location {
        LocationPolicy::WorkerChosen(rule) => rule,
        LocationPolicy::UserChosen => {
            return Err(ColonyError::InvalidRequest(format!(
                "{} needs a location",
                def.name
            )))
        }
        LocationPolicy::AtNode => {
            return Err(ColonyError::MissingRecipeData(format!(
                "{} has no node and no site rule",
                def.name
            )))
        }
    };

    let taken: Vec<Coord> = world
        .workers
        .values()
        .filter(|w| w.id != worker)
        .flat_map(|w| w.stack.iter())
        .filter(|f| f.kind == FrameKind::WorkAtSpot)
        .filter_map(|f| f.target)
        .collect();

    let origin = world.worker(worker)?.position;
    world
        .tiles
        .within_radius(origin, world.config.search_radius)
        .enumerate()
        .filter(|(_, t)| t.terrain() == rule.terrain && t.node.is_none() && !taken.contains(&t.coord))
        .min_by_key(|(scan, t)| (origin.manhattan(&t.coord), *scan))
        .map(|(_, t)| t.coord)
        .ok_or_else(|| {
            ColonyError::unsatisfiable(
                format!("{:?} site", rule.terrain),
                format!("none free within {} tiles", world.config.search_radius),
            )
        })
}

fn construct(
    world: &mut World,
    worker: WorkerId,
    frame: &TaskFrame,
    events: &mut Vec<SimulationEvent>,
) -> Result<()> {
    let task = world.task(frame.task)?.clone();
    let node = task
        .node
        .ok_or(ColonyError::InvalidWorldReference(WorldRef::Task(task.id)))?;
    let target = match frame.target {
        Some(t) => t,
        None => {
            let at = world.node(node)?.position;
            set_target(world, worker, Some(at))?;
            at
        }
    };

    if task.worker == Some(worker) {
        let cost = build_cost(world, node)?;
        if !ensure_requirements(world, worker, task.id, &cost.requirements)? {
            return Ok(());
        }
    } else if !materials_in_place(world, task.id)? {
        // Helpers only add work; they never fetch
        world.task_mut(task.id)?.helpers.retain(|w| *w != worker);
        pop(world, worker)?;
        return Ok(());
    }

    if !walk(world, worker, target)? {
        return Ok(());
    }
    let efficiency = world.worker(worker)?.efficiency;
    match apply_construction_work(world, task.id, efficiency)? {
        ContributionResult::InProgress { .. } | ContributionResult::MaterialsMissing => {}
        ContributionResult::Completed { .. } => {
            events.push(SimulationEvent::NodeCompleted { node });
            retire(world, task.id, events);
        }
        ContributionResult::AlreadyComplete => retire(world, task.id, events),
    }
    Ok(())
}

/// Walk to a reserved item and pick it up, then carry it on to `dest`
fn fetch(world: &mut World, worker: WorkerId, frame: &TaskFrame, item: ItemId, dest: Destination) -> Result<()> {
    let still_ours = world.items.contains(item) && world.reservations.holder(item) == Some(frame.task);
    if !still_ours {
        // Parent re-resolves
        tracing::debug!("Item {} gone before worker {} reached it", item.0, worker.0);
        return pop(world, worker);
    }

    let in_hand = world.worker(worker)?.holds(item);
    if !in_hand {
        let target = match frame.target {
            Some(t) => t,
            None => {
                let at = world
                    .item_coord(item)
                    .ok_or(ColonyError::InvalidWorldReference(WorldRef::Item(item)))?;
                set_target(world, worker, Some(at))?;
                at
            }
        };
        if !walk(world, worker, target)? {
            return Ok(());
        }
        if world.item_coord(item) != Some(target) {
            return Err(ColonyError::InvalidWorldReference(WorldRef::Item(item)));
        }
        pick_up(world, worker, item)?;
        tracing::debug!("Worker {} picked up item {}", worker.0, item.0);
    }

    match dest {
        Destination::Carry => pop(world, worker),
        dest => {
            let at = destination_coord(world, dest, worker)?;
            let w = world.worker_mut(worker)?;
            w.pop();
            w.push(TaskFrame::new(FrameKind::MoveItem { item, dest }, frame.task).at(at));
            Ok(())
        }
    }
}

/// Take an item into the worker's hands; node outputs are withdrawn
fn pick_up(world: &mut World, worker: WorkerId, item: ItemId) -> Result<()> {
    let hands = ItemLocation::Carried(worker);
    let location = world.item(item)?.location;
    match location {
        ItemLocation::Node {
            node,
            slot: NodeSlot::Onhand,
        } => {
            world
                .withdraw_output(node, item, hands)?
                .ok_or(ColonyError::InvalidWorldReference(WorldRef::Item(item)))?;
            Ok(())
        }
        _ => world.move_item(item, hands),
    }
}

/// Carry a held item to `dest` and put it down
fn carry(world: &mut World, worker: WorkerId, frame: &TaskFrame, item: ItemId, dest: Destination) -> Result<()> {
    if !world.worker(worker)?.holds(item) {
        return pop(world, worker);
    }
    let target = match frame.target {
        Some(t) => t,
        None => {
            let at = destination_coord(world, dest, worker)?;
            set_target(world, worker, Some(at))?;
            at
        }
    };
    if !walk(world, worker, target)? {
        return Ok(());
    }

    match dest {
        Destination::Node(node) => {
            if !world.accept_input(node, item)? {
                return Err(ColonyError::unsatisfiable(
                    format!("room at node {}", node.0),
                    "inventory full",
                ));
            }
            tracing::debug!("Worker {} delivered item {} to node {}", worker.0, item.0, node.0);
        }
        Destination::Tile(c) => world.move_item(item, ItemLocation::Tile(c))?,
        Destination::Carry => {}
    }
    pop(world, worker)
}

/// Retry point for a missing requirement group
fn cannot_work(
    world: &mut World,
    worker: WorkerId,
    frame: &TaskFrame,
    group_index: usize,
    dependency: Option<TaskId>,
    attempts: u32,
    events: &mut Vec<SimulationEvent>,
) -> Result<()> {
    if let Some(dep) = dependency {
        if let Some(pending) = world.tasks.get(&dep) {
            if pending.state == TaskState::Open && pending.worker.is_none() {
                // Waiting on work nobody holds: take it back
                assign_task(world, worker, dep)?;
            }
            return Ok(());
        }
    }

    let task = world.task(frame.task)?.clone();
    let (groups, _) = requirements(world, &task)?;
    let group = groups.get(group_index).cloned().ok_or_else(|| {
        ColonyError::MissingRecipeData(format!("group {} of task {}", group_index, task.id.0))
    })?;

    if resolver::resolve(world, task.id, &group)?.is_some() {
        return pop(world, worker);
    }
    if attempts >= world.config.max_synthesis_attempts {
        return Err(ColonyError::unsatisfiable(
            group.label(),
            format!("still missing after {} attempts", attempts),
        ));
    }

    match resolver::synthesize(world, task.id, worker, &group)? {
        Synthesis::Created(dep) => {
            let first = initial_frame(world, dep)?;
            let w = world.worker_mut(worker)?;
            if let Some(top) = w.current_frame_mut() {
                top.kind = FrameKind::CannotWork {
                    group: group_index,
                    dependency: Some(dep),
                    attempts: attempts + 1,
                };
            }
            w.push(first);
            let producer = world
                .tasks
                .get(&dep)
                .map(|t| t.label())
                .unwrap_or_default();
            events.push(SimulationEvent::TaskSynthesized {
                task: dep,
                requested_by: task.id,
                producer,
            });
            Ok(())
        }
        Synthesis::NodeNeeded(block) => {
            events.push(SimulationEvent::NodeNeeded { block: block.clone() });
            Err(ColonyError::unsatisfiable(
                group.label(),
                format!("no completed {}", block),
            ))
        }
    }
}
