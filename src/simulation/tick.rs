//! Tick system - orchestrates simulation updates
//!
//! Each tick runs three fixed passes:
//! (a) every usable node's autonomous update, in node id order
//! (b) idle workers, in creation order, take an open task or assist a build
//! (c) every working worker executes exactly one frame step, in creation order
//!
//! No pass interleaves with another and no step suspends mid-way, so a
//! reservation made by one worker is visible to every later worker in the
//! same tick.

use crate::city::construction::materials_in_place;
use crate::city::production::tick_nodes;
use crate::core::error::{ColonyError, ErrorKind};
use crate::core::types::{ItemId, NodeId, TaskId, WorkerId};
use crate::ecs::world::World;
use crate::entity::tasks::{TaskKind, TaskState};
use crate::simulation::execute::{assign_task, assist_task, step_worker};

/// Events generated during simulation tick
///
/// These events are returned by `run_simulation_tick` for logging and for
/// the display layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationEvent {
    /// An idle worker took an open task
    TaskAssigned { task: TaskId, worker: WorkerId },
    /// An idle worker joined a construction task
    Assisting { task: TaskId, worker: WorkerId },
    /// The resolver created a task to produce a missing requirement
    TaskSynthesized {
        task: TaskId,
        requested_by: TaskId,
        producer: String,
    },
    /// Inputs delivered; the node works the task on its own
    TaskProcessing { task: TaskId, node: NodeId },
    ItemProduced {
        task: TaskId,
        item: ItemId,
        kind: String,
    },
    TaskCompleted { task: TaskId },
    TaskCancelled { task: TaskId, reason: ErrorKind },
    ToolWornOut { item: ItemId, kind: String },
    NodeCompleted { node: NodeId },
    /// A producer exists but no completed node of its block does
    NodeNeeded { block: String },
    FuelBurned { node: NodeId, kind: String },
    /// A perishable output burnt on the fire
    ItemBurnt {
        node: NodeId,
        from: String,
        into: ItemId,
    },
    /// The recipe graph looped at runtime; the whole chain was dropped
    RecipeCycleDetected { root: TaskId },
}

/// Run one tick of the simulation
///
/// Returns a list of events that occurred during this tick.
pub fn run_simulation_tick(world: &mut World) -> Vec<SimulationEvent> {
    let mut events = Vec::new();

    update_nodes(world, &mut events);
    assign_idle_workers(world, &mut events);
    step_working_workers(world, &mut events);

    world.tick();
    events
}

/// Run `ticks` ticks, collecting every event
pub fn run_ticks(world: &mut World, ticks: u64) -> Vec<SimulationEvent> {
    let mut events = Vec::new();
    for _ in 0..ticks {
        events.extend(run_simulation_tick(world));
    }
    events
}

fn update_nodes(world: &mut World, events: &mut Vec<SimulationEvent>) {
    for result in tick_nodes(world) {
        for kind in result.fuel_burned {
            events.push(SimulationEvent::FuelBurned {
                node: result.node,
                kind,
            });
        }
        for unit in result.finished {
            for item in &unit.outputs {
                let kind = world.items.kind_of(*item).unwrap_or_default().to_string();
                events.push(SimulationEvent::ItemProduced {
                    task: unit.task,
                    item: *item,
                    kind,
                });
            }
            if unit.batch_done {
                events.push(SimulationEvent::TaskCompleted { task: unit.task });
            }
        }
        for (from, into) in result.burnt {
            events.push(SimulationEvent::ItemBurnt {
                node: result.node,
                from,
                into,
            });
        }
        for (task, error) in result.failed {
            handle_failure(world, task, None, error, events);
        }
    }
}

fn assign_idle_workers(world: &mut World, events: &mut Vec<SimulationEvent>) {
    let idle: Vec<WorkerId> = world
        .workers
        .values()
        .filter(|w| w.is_idle())
        .map(|w| w.id)
        .collect();

    for worker in idle {
        let open = world.open_tasks().next().map(|t| t.id);
        if let Some(task) = open {
            match assign_task(world, worker, task) {
                Ok(()) => events.push(SimulationEvent::TaskAssigned { task, worker }),
                Err(e) => handle_failure(world, task, None, e, events),
            }
            continue;
        }

        let assist = world
            .tasks
            .values()
            .filter(|t| {
                t.kind == TaskKind::Construction
                    && t.state == TaskState::InProgress
                    && t.worker.is_some()
                    && t.worker != Some(worker)
                    && !t.helpers.contains(&worker)
            })
            .map(|t| t.id)
            .find(|t| materials_in_place(world, *t).unwrap_or(false));
        if let Some(task) = assist {
            match assist_task(world, worker, task) {
                Ok(()) => events.push(SimulationEvent::Assisting { task, worker }),
                Err(e) => tracing::warn!("Worker {} could not assist task {}: {}", worker.0, task.0, e),
            }
        }
    }
}

fn step_working_workers(world: &mut World, events: &mut Vec<SimulationEvent>) {
    let working: Vec<WorkerId> = world
        .workers
        .values()
        .filter(|w| !w.is_idle())
        .map(|w| w.id)
        .collect();

    for worker in working {
        let Some(task) = world
            .workers
            .get(&worker)
            .and_then(|w| w.current_frame())
            .map(|f| f.task)
        else {
            continue;
        };
        if let Err(e) = step_worker(world, worker, events) {
            handle_failure(world, task, Some(worker), e, events);
        }
    }
}

/// Apply the recovery policy for a failed step.
///
/// - InvalidWorldReference: re-resolve the frame's target, up to
///   `max_reresolve_attempts` times, then cancel the task
/// - RecipeCycle: cancel the whole chain from its root and mark the catalog
/// - anything else: cancel the task; a parent waiting in cannot-work retries
fn handle_failure(
    world: &mut World,
    task: TaskId,
    worker: Option<WorkerId>,
    error: ColonyError,
    events: &mut Vec<SimulationEvent>,
) {
    let kind = error.kind();
    match kind {
        ErrorKind::InvalidWorldReference => {
            let max = world.config.max_reresolve_attempts;
            let frame = worker
                .and_then(|w| world.workers.get_mut(&w))
                .and_then(|w| w.current_frame_mut())
                .filter(|f| f.task == task && f.retries < max);
            if let Some(frame) = frame {
                frame.retries += 1;
                frame.target = None;
                tracing::warn!("Task {}: {}; re-resolving", task.0, error);
                return;
            }
            tracing::warn!("Task {}: {}; giving up", task.0, error);
            cancel(world, task, kind, events);
        }
        ErrorKind::RecipeCycle => {
            let root = world.tasks.get(&task).map_or(task, |t| t.root);
            tracing::error!("Task {}: {}; dropping chain rooted at {}", task.0, error, root.0);
            world.catalog_invalid = true;
            events.push(SimulationEvent::RecipeCycleDetected { root });
            cancel(world, root, kind, events);
        }
        _ => {
            tracing::warn!("Task {} cancelled: {}", task.0, error);
            cancel(world, task, kind, events);
        }
    }
}

fn cancel(world: &mut World, task: TaskId, reason: ErrorKind, events: &mut Vec<SimulationEvent>) {
    for id in world.cancel_task(task) {
        events.push(SimulationEvent::TaskCancelled { task: id, reason });
    }
}
