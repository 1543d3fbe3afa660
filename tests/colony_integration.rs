//! Integration tests for the colony production loop
//!
//! These tests drive whole scenarios through `run_simulation_tick`:
//! - Demand-driven crafting (missing tools are synthesized, then used)
//! - Cancelling part of a chain while the rest waits on it
//! - Runtime recipe-cycle detection
//! - Tool wear and batch work with re-targeted field sites
//! - Recovery from moved items, exhausted synthesis and full nodes
//! - Determinism and item conservation across seeds

use colony_forge::city::building::NodeState;
use colony_forge::city::recipe::{
    Alternative, BlockDef, LocationPolicy, OutputDef, RecipeCatalog, RequirementGroup, SiteRule,
    TaskDef,
};
use colony_forge::city::stockpile::Stockpile;
use colony_forge::command::executor::{place_node, request_task};
use colony_forge::core::config::SimulationConfig;
use colony_forge::core::error::ErrorKind;
use colony_forge::core::types::{Coord, ItemId, NodeId, TaskId, WorkerId};
use colony_forge::ecs::world::World;
use colony_forge::entity::item::{ItemLocation, NodeSlot};
use colony_forge::entity::tasks::FrameKind;
use colony_forge::simulation::tick::{run_simulation_tick, run_ticks, SimulationEvent};
use colony_forge::spatial::grid::TerrainKind;
use colony_forge::world::loader::ScenarioLoader;
use proptest::prelude::*;

fn world_with(width: u32, height: u32, catalog: RecipeCatalog) -> World {
    World::new(width, height, TerrainKind::Grass, catalog, SimulationConfig::default())
}

/// Stick Maker and Tool Bench side by side, with axe materials nearby and
/// no axe anywhere
fn stick_workshop() -> (World, NodeId, NodeId, WorkerId, TaskId) {
    let mut world = world_with(20, 20, RecipeCatalog::with_defaults());
    let maker = place_node(&mut world, "Stick Maker", Coord::new(10, 10), true).unwrap();
    let bench = place_node(&mut world, "Tool Bench", Coord::new(6, 10), true).unwrap();
    world.spawn_item("Log", Coord::new(11, 10)).unwrap();
    world.spawn_item("Flint", Coord::new(7, 10)).unwrap();
    world.spawn_item("Twig", Coord::new(7, 11)).unwrap();
    world.spawn_item("Twig", Coord::new(7, 11)).unwrap();
    let worker = world.spawn_worker("Ada", Coord::new(10, 11)).unwrap();
    let task = request_task(&mut world, Some(maker), "Short Stick", None, None).unwrap();
    (world, maker, bench, worker, task)
}

fn synthesized_for(events: &[SimulationEvent], parent: TaskId) -> Option<TaskId> {
    events.iter().find_map(|e| match e {
        SimulationEvent::TaskSynthesized {
            task, requested_by, ..
        } if *requested_by == parent => Some(*task),
        _ => None,
    })
}

// ============================================================================
// Demand-Driven Crafting
// ============================================================================

/// A Short Stick needs a Flint Axe nobody has: the worker first makes the
/// axe at the Tool Bench, equips it, then works the stick at 1 per tick.
#[test]
fn test_simple_craft_synthesizes_missing_tool() {
    let (mut world, maker, _bench, worker, task) = stick_workshop();

    let mut axe_task = None;
    for _ in 0..20 {
        let events = run_simulation_tick(&mut world);
        if let Some(dep) = synthesized_for(&events, task) {
            axe_task = Some(dep);
            break;
        }
    }
    let axe_task = axe_task.expect("axe task synthesized");
    // No progress before the tool exists
    assert_eq!(world.tasks[&task].progress, 0.0);
    assert_eq!(world.tasks[&axe_task].requested_by, Some(task));
    assert_eq!(world.ledger.expected_live("Flint Axe"), 0);

    // Once work starts, progress climbs one per tick
    let mut last = 0.0;
    let mut climbing = Vec::new();
    for _ in 0..300 {
        run_simulation_tick(&mut world);
        let Some(t) = world.tasks.get(&task) else {
            break;
        };
        if t.progress > last {
            climbing.push(t.progress - last);
        }
        last = t.progress;
    }
    assert!(!world.tasks.contains_key(&task), "stick task finished");
    assert_eq!(climbing.len(), 19);
    assert!(climbing.iter().all(|d| (*d - 1.0).abs() < f32::EPSILON));

    let sticks: Vec<_> = world
        .items
        .iter()
        .filter(|i| i.kind == "Short Stick")
        .collect();
    assert_eq!(sticks.len(), 1);
    assert_eq!(
        sticks[0].location,
        ItemLocation::Node {
            node: maker,
            slot: NodeSlot::Onhand
        }
    );

    // The axe stays in hand, worn by 20 uses
    let axe = world.items.iter().find(|i| i.kind == "Flint Axe").unwrap();
    assert_eq!(axe.location, ItemLocation::Carried(worker));
    assert_eq!(axe.durability, Some(0));
    assert_eq!(world.items.count_kind("Log"), 0);
    assert_eq!(world.items.count_kind("Flint"), 0);
    assert_eq!(world.items.count_kind("Twig"), 0);
    assert!(world.workers[&worker].is_idle());
    assert!(world.check_integrity().is_ok());
}

// ============================================================================
// Cancellation
// ============================================================================

/// Deleting the axe sub-task mid-chain leaves the stick task waiting in
/// cannot-work; it synthesizes again and still finishes.
#[test]
fn test_cancel_mid_chain_leaves_parent_in_cannot_work() {
    let (mut world, _maker, _bench, worker, task) = stick_workshop();

    let mut axe_task = None;
    for _ in 0..20 {
        let events = run_simulation_tick(&mut world);
        if let Some(dep) = synthesized_for(&events, task) {
            axe_task = Some(dep);
            break;
        }
    }
    let axe_task = axe_task.expect("axe task synthesized");
    // Let the worker get going on the axe
    for _ in 0..4 {
        run_simulation_tick(&mut world);
    }

    let cancelled = world.cancel_task(axe_task);
    assert_eq!(cancelled, vec![axe_task]);
    assert!(world.reservations.items_of(axe_task).next().is_none());
    let frame = world.workers[&worker].current_frame().unwrap();
    assert_eq!(frame.task, task);
    assert!(matches!(frame.kind, FrameKind::CannotWork { .. }));
    assert!(world.check_integrity().is_ok());

    // The parent re-resolves: a second axe task is made and the stick follows
    let events = run_ticks(&mut world, 300);
    let retry = synthesized_for(&events, task).expect("second axe task");
    assert_ne!(retry, axe_task);
    assert!(events.contains(&SimulationEvent::TaskCompleted { task }));
    assert_eq!(world.items.count_kind("Short Stick"), 1);
    assert!(world.check_integrity().is_ok());
}

#[test]
fn test_cancel_root_drops_whole_chain() {
    let (mut world, _maker, _bench, worker, task) = stick_workshop();
    let mut axe_task = None;
    for _ in 0..20 {
        let events = run_simulation_tick(&mut world);
        if let Some(dep) = synthesized_for(&events, task) {
            axe_task = Some(dep);
            break;
        }
    }
    let axe_task = axe_task.expect("axe task synthesized");

    let cancelled = world.cancel_task(task);
    assert_eq!(cancelled, vec![axe_task, task]);
    assert!(world.tasks.is_empty());
    assert_eq!(world.reservations.iter().count(), 0);
    assert!(world.workers[&worker].is_idle());
    assert!(world.check_integrity().is_ok());
}

// ============================================================================
// Recipe Cycles
// ============================================================================

fn looping_catalog() -> RecipeCatalog {
    let mut catalog = RecipeCatalog::new();
    let mut mill = BlockDef::new("Mill", "Gears need axles need gears");
    mill.tasks.push(
        TaskDef::new("Gear", 5)
            .requires(RequirementGroup::input(vec![Alternative::new("Axle", 1)]))
            .yields(OutputDef::new("Gear", 1)),
    );
    mill.tasks.push(
        TaskDef::new("Axle", 5)
            .requires(RequirementGroup::input(vec![Alternative::new("Gear", 1)]))
            .yields(OutputDef::new("Axle", 1)),
    );
    catalog.add_block(mill);
    catalog
}

#[test]
fn test_injected_cycle_raises_recipe_cycle() {
    let catalog = looping_catalog();
    let err = catalog.validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RecipeCycle);

    let mut world = world_with(8, 8, catalog);
    let mill = place_node(&mut world, "Mill", Coord::new(3, 3), true).unwrap();
    let worker = world.spawn_worker("Ada", Coord::new(3, 4)).unwrap();
    let gear = request_task(&mut world, Some(mill), "Gear", None, None).unwrap();

    let events = run_ticks(&mut world, 20);
    assert!(events.contains(&SimulationEvent::RecipeCycleDetected { root: gear }));
    assert!(events.contains(&SimulationEvent::TaskCancelled {
        task: gear,
        reason: ErrorKind::RecipeCycle
    }));
    assert!(world.catalog_invalid);
    assert!(world.tasks.is_empty());
    assert!(world.workers[&worker].is_idle());
    assert!(world.check_integrity().is_ok());
}

// ============================================================================
// Tool Wear
// ============================================================================

/// An axe with durability 3 gives three working steps; the fourth use
/// breaks it and clears every reference to it.
#[test]
fn test_tool_breaks_on_use_past_durability() {
    let mut world = world_with(10, 10, RecipeCatalog::with_defaults());
    let maker = place_node(&mut world, "Stick Maker", Coord::new(5, 5), true).unwrap();
    let axe = world.spawn_tool("Flint Axe", 3, Coord::new(5, 6)).unwrap();
    world.spawn_item("Log", Coord::new(4, 5)).unwrap();
    let worker = world.spawn_worker("Ada", Coord::new(5, 7)).unwrap();
    let task = request_task(&mut world, Some(maker), "Short Stick", None, None).unwrap();

    let mut broke = false;
    for _ in 0..60 {
        let events = run_simulation_tick(&mut world);
        if events.contains(&SimulationEvent::ToolWornOut {
            item: axe,
            kind: "Flint Axe".into(),
        }) {
            broke = true;
            break;
        }
    }
    assert!(broke);
    assert_eq!(world.tasks[&task].progress, 3.0);
    assert!(!world.items.contains(axe));
    assert_eq!(world.reservations.holder(axe), None);
    assert!(!world.workers[&worker].carried.contains(&axe));
    assert_eq!(world.ledger.expected_live("Flint Axe"), 0);
    assert!(world.check_integrity().is_ok());

    // With no Tool Bench the axe can't be replaced
    let events = run_ticks(&mut world, 10);
    assert!(events.contains(&SimulationEvent::NodeNeeded {
        block: "Tool Bench".into()
    }));
    assert!(events.contains(&SimulationEvent::TaskCancelled {
        task,
        reason: ErrorKind::Unsatisfiable
    }));
}

// ============================================================================
// Batch Work
// ============================================================================

/// Five units of a 10-tick field task: every unit depletes its tile, so the
/// worker re-targets a fresh marsh tile for each.
#[test]
fn test_batch_of_five_retargets_between_units() {
    let mut catalog = RecipeCatalog::with_defaults();
    catalog.add_field_task(
        TaskDef::new("Cut Reeds", 10)
            .yields(OutputDef::new("Reed", 1))
            .batched()
            .at(LocationPolicy::WorkerChosen(SiteRule {
                terrain: TerrainKind::Marsh,
                deplete_to: Some(TerrainKind::Grass),
            })),
    );
    let mut world = world_with(12, 4, catalog);
    let marsh: Vec<Coord> = (2..=6).map(|x| Coord::new(x, 0)).collect();
    for c in &marsh {
        world.tiles.set_base(*c, TerrainKind::Marsh);
    }
    let worker = world.spawn_worker("Ada", Coord::new(0, 0)).unwrap();
    let task = request_task(&mut world, None, "Cut Reeds", Some(5), None).unwrap();

    let mut done_at = None;
    for _ in 0..200 {
        let tick = world.current_tick;
        let events = run_simulation_tick(&mut world);
        if events.contains(&SimulationEvent::TaskCompleted { task }) {
            done_at = Some(tick);
            break;
        }
    }
    let done_at = done_at.expect("batch finished");
    assert!(done_at >= 50);

    let mut reed_tiles: Vec<Coord> = world
        .items
        .iter()
        .filter(|i| i.kind == "Reed")
        .map(|i| match i.location {
            ItemLocation::Tile(c) => c,
            other => panic!("reed not on the ground: {:?}", other),
        })
        .collect();
    reed_tiles.sort();
    assert_eq!(reed_tiles, marsh);
    for c in &marsh {
        assert_eq!(world.tiles.get(*c).unwrap().terrain(), TerrainKind::Grass);
    }
    assert!(world.workers[&worker].is_idle());
    assert!(world.check_integrity().is_ok());
}

// ============================================================================
// Construction and Fire
// ============================================================================

#[test]
fn test_campfire_built_then_fuelled_then_roasts() {
    let mut world = world_with(12, 12, RecipeCatalog::with_defaults());
    world.spawn_worker("Ada", Coord::new(5, 5)).unwrap();
    let fire = place_node(&mut world, "Campfire", Coord::new(5, 6), false).unwrap();
    world.spawn_item("Raw Meat", Coord::new(4, 6)).unwrap();
    // Three twigs go into the build, four feed the fire
    for _ in 0..7 {
        world.spawn_item("Twig", Coord::new(6, 6)).unwrap();
    }

    let events = run_ticks(&mut world, 80);
    assert!(events.contains(&SimulationEvent::NodeCompleted { node: fire }));
    assert_eq!(world.nodes[&fire].state, NodeState::Complete);
    assert_eq!(world.items.count_kind("Twig"), 4);
    assert_eq!(world.nodes[&fire].heat, 0.0);

    let fuel = request_task(&mut world, Some(fire), "Add Fuel", None, None).unwrap();
    let roast = request_task(&mut world, Some(fire), "Roast Meat", None, None).unwrap();
    let events = run_ticks(&mut world, 100);
    assert!(events.contains(&SimulationEvent::TaskCompleted { task: fuel }));
    assert!(events.contains(&SimulationEvent::FuelBurned {
        node: fire,
        kind: "Twig".into()
    }));
    assert!(events.contains(&SimulationEvent::TaskProcessing { task: roast, node: fire }));
    assert!(events.contains(&SimulationEvent::TaskCompleted { task: roast }));
    assert_eq!(world.items.count_kind("Raw Meat"), 0);
    assert_eq!(
        world.items.count_kind("Cooked Meat") + world.items.count_kind("Burnt Meat"),
        1
    );
    assert!(world.check_integrity().is_ok());
}

// ============================================================================
// Failure Recovery
// ============================================================================

/// Stick Maker with an axe next to it and the only log a few tiles west
fn log_fetch_setup() -> (World, WorkerId, ItemId, TaskId) {
    let mut world = world_with(10, 10, RecipeCatalog::with_defaults());
    let maker = place_node(&mut world, "Stick Maker", Coord::new(5, 5), true).unwrap();
    world.spawn_tool("Flint Axe", 30, Coord::new(5, 6)).unwrap();
    let log = world.spawn_item("Log", Coord::new(1, 5)).unwrap();
    let worker = world.spawn_worker("Ada", Coord::new(5, 7)).unwrap();
    let task = request_task(&mut world, Some(maker), "Short Stick", None, None).unwrap();
    (world, worker, log, task)
}

fn cancel_reason(events: &[SimulationEvent], task: TaskId) -> Option<ErrorKind> {
    events.iter().find_map(|e| match e {
        SimulationEvent::TaskCancelled { task: t, reason } if *t == task => Some(*reason),
        _ => None,
    })
}

/// Run until `task` completes or is cancelled. Each time the worker is
/// walking to the log with `moves` failed lookups behind it, the log is
/// moved to the next spot in `spots`.
fn run_moving_log(
    world: &mut World,
    worker: WorkerId,
    log: ItemId,
    task: TaskId,
    spots: &[Coord],
) -> (bool, Option<ErrorKind>) {
    let mut moves = 0usize;
    for _ in 0..200 {
        let events = run_simulation_tick(world);
        if events.contains(&SimulationEvent::TaskCompleted { task }) {
            return (true, None);
        }
        if let Some(reason) = cancel_reason(&events, task) {
            return (false, Some(reason));
        }
        let Some(frame) = world.workers[&worker].current_frame().cloned() else {
            continue;
        };
        let fetching = matches!(frame.kind, FrameKind::FetchItem { item, .. } if item == log);
        if moves < spots.len() && fetching && frame.target.is_some() && frame.retries as usize == moves {
            world.move_item(log, ItemLocation::Tile(spots[moves])).unwrap();
            moves += 1;
        }
    }
    (false, None)
}

/// The log moves after the worker set off for it: one failed lookup, a
/// fresh target, and the stick still gets made.
#[test]
fn test_moved_item_is_re_resolved_once() {
    let (mut world, worker, log, task) = log_fetch_setup();
    let (done, cancelled) = run_moving_log(&mut world, worker, log, task, &[Coord::new(1, 8)]);
    assert_eq!(cancelled, None);
    assert!(done);
    assert_eq!(world.items.count_kind("Short Stick"), 1);
    assert!(!world.items.contains(log));
    assert!(world.check_integrity().is_ok());
}

#[test]
fn test_item_missing_twice_cancels_task() {
    let (mut world, worker, log, task) = log_fetch_setup();
    let spots = [Coord::new(1, 8), Coord::new(1, 2)];
    let (done, cancelled) = run_moving_log(&mut world, worker, log, task, &spots);
    assert!(!done);
    assert_eq!(cancelled, Some(ErrorKind::InvalidWorldReference));
    assert!(world.tasks.is_empty());
    assert_eq!(world.reservations.holder(log), None);
    assert_eq!(
        world.items.get(log).unwrap().location,
        ItemLocation::Tile(Coord::new(1, 2))
    );
    // Tools stay in hand
    let axe = world.items.iter().find(|i| i.kind == "Flint Axe").unwrap();
    assert_eq!(axe.location, ItemLocation::Carried(worker));
    assert!(world.check_integrity().is_ok());
}

/// Every axe task the stick task asks for is cancelled at once: after the
/// allowed number of attempts the stick task gives up.
#[test]
fn test_synthesis_attempts_run_out() {
    let (mut world, _maker, _bench, worker, task) = stick_workshop();
    let mut syntheses = 0u32;
    let mut reason = None;
    for _ in 0..100 {
        let events = run_simulation_tick(&mut world);
        if let Some(dep) = synthesized_for(&events, task) {
            syntheses += 1;
            assert_eq!(world.cancel_task(dep), vec![dep]);
        }
        reason = cancel_reason(&events, task);
        if reason.is_some() {
            break;
        }
    }
    assert_eq!(reason, Some(ErrorKind::Unsatisfiable));
    assert_eq!(syntheses, world.config.max_synthesis_attempts);
    assert!(world.tasks.is_empty());
    assert!(world.workers[&worker].is_idle());
    assert_eq!(world.items.count_kind("Flint Axe"), 0);
    assert!(world.check_integrity().is_ok());
}

#[test]
fn test_delivery_to_full_node_is_unsatisfiable() {
    let mut world = world_with(10, 10, RecipeCatalog::with_defaults());
    let maker = place_node(&mut world, "Stick Maker", Coord::new(5, 5), true).unwrap();
    world.nodes.get_mut(&maker).unwrap().stockpile = Stockpile::new(1);
    let onhand = ItemLocation::Node {
        node: maker,
        slot: NodeSlot::Onhand,
    };
    world.create_item("Short Stick", None, None, onhand).unwrap();
    world.spawn_tool("Flint Axe", 30, Coord::new(5, 6)).unwrap();
    let log = world.spawn_item("Log", Coord::new(3, 5)).unwrap();
    world.spawn_worker("Ada", Coord::new(5, 7)).unwrap();
    let task = request_task(&mut world, Some(maker), "Short Stick", None, None).unwrap();

    let events = run_ticks(&mut world, 40);
    assert_eq!(cancel_reason(&events, task), Some(ErrorKind::Unsatisfiable));
    // The log is dropped at the door, free for anyone
    assert_eq!(
        world.items.get(log).unwrap().location,
        ItemLocation::Tile(Coord::new(5, 5))
    );
    assert_eq!(world.reservations.holder(log), None);
    assert_eq!(world.nodes[&maker].stockpile.len(), 1);
    assert!(world.check_integrity().is_ok());
}

// ============================================================================
// Node Inventory
// ============================================================================

const STATIONED_AXE: &str = r#"{
    "width": 10,
    "height": 10,
    "items": [ { "kind": "Log", "at": { "x": 3, "y": 5 } } ],
    "tools": [ { "kind": "Flint Axe", "node": 0, "durability": 25 } ],
    "workers": [ { "name": "Ada", "at": { "x": 5, "y": 8 } } ],
    "nodes": [ { "block": "Stick Maker", "at": { "x": 5, "y": 5 }, "built": true } ],
    "requests": [ { "node": 0, "task": "Short Stick" } ]
}"#;

/// An axe kept in the Stick Maker's tool slot is found there and used; no
/// replacement is made.
#[test]
fn test_tool_stored_at_node_is_used() {
    let mut world = ScenarioLoader::new(RecipeCatalog::with_defaults(), SimulationConfig::default())
        .load_from_json(STATIONED_AXE)
        .unwrap();
    let maker = *world.nodes.keys().next().unwrap();
    let axe = world.nodes[&maker].stockpile.tools[0];
    let task = *world.tasks.keys().next().unwrap();

    let events = run_ticks(&mut world, 100);
    assert!(events.contains(&SimulationEvent::TaskCompleted { task }));
    assert!(!events
        .iter()
        .any(|e| matches!(e, SimulationEvent::TaskSynthesized { .. })));

    assert!(world.nodes[&maker].stockpile.tools.is_empty());
    let axe = world.items.get(axe).unwrap();
    assert!(matches!(axe.location, ItemLocation::Carried(_)));
    assert_eq!(axe.durability, Some(5));
    assert_eq!(world.nodes[&maker].stockpile.onhand.len(), 1);
    assert!(world.check_integrity().is_ok());
}

/// Sticks waiting in the Stick Maker's output are withdrawn and carried to
/// the fire as fuel.
#[test]
fn test_node_outputs_are_withdrawn_for_other_tasks() {
    let mut world = world_with(12, 12, RecipeCatalog::with_defaults());
    let maker = place_node(&mut world, "Stick Maker", Coord::new(3, 3), true).unwrap();
    let fire = place_node(&mut world, "Campfire", Coord::new(7, 3), true).unwrap();
    let onhand = ItemLocation::Node {
        node: maker,
        slot: NodeSlot::Onhand,
    };
    for _ in 0..2 {
        world.create_item("Short Stick", None, None, onhand).unwrap();
    }
    world.spawn_worker("Ada", Coord::new(5, 5)).unwrap();
    let fuel = request_task(&mut world, Some(fire), "Add Fuel", None, None).unwrap();

    let events = run_ticks(&mut world, 40);
    assert!(events.contains(&SimulationEvent::TaskCompleted { task: fuel }));
    assert!(events.contains(&SimulationEvent::FuelBurned {
        node: fire,
        kind: "Short Stick".into()
    }));
    assert!(world.nodes[&maker].stockpile.onhand.is_empty());
    assert!(world.check_integrity().is_ok());
}

// ============================================================================
// Determinism and Conservation
// ============================================================================

const CAMP: &str = r#"{
    "width": 16,
    "height": 12,
    "patches": [
        { "terrain": "Forest", "from": { "x": 10, "y": 0 }, "to": { "x": 15, "y": 5 } },
        { "terrain": "Rock", "from": { "x": 0, "y": 9 }, "to": { "x": 3, "y": 11 } }
    ],
    "items": [
        { "kind": "Log", "at": { "x": 6, "y": 6 }, "count": 2 },
        { "kind": "Twig", "at": { "x": 5, "y": 4 }, "count": 4 }
    ],
    "tools": [
        { "kind": "Flint Axe", "at": { "x": 7, "y": 5 }, "durability": 40 }
    ],
    "workers": [
        { "name": "Ada", "at": { "x": 6, "y": 5 } },
        { "name": "Bo", "at": { "x": 8, "y": 5 } },
        { "name": "Cy", "at": { "x": 4, "y": 7 } }
    ],
    "nodes": [
        { "block": "Tool Bench", "at": { "x": 4, "y": 4 }, "built": true },
        { "block": "Stick Maker", "at": { "x": 8, "y": 8 }, "built": true },
        { "block": "Campfire", "at": { "x": 6, "y": 8 } }
    ],
    "requests": [
        { "task": "Hunt", "quantity": 4 },
        { "node": 1, "task": "Short Stick", "quantity": 2 },
        { "task": "Collect Flint", "quantity": 2 },
        { "task": "Gather Twigs", "quantity": 3 }
    ]
}"#;

fn camp(seed: u64) -> World {
    ScenarioLoader::new(
        RecipeCatalog::with_defaults(),
        SimulationConfig::default().with_seed(seed),
    )
    .load_from_json(CAMP)
    .unwrap()
}

#[test]
fn test_identical_seeds_give_identical_worlds() {
    let mut a = camp(7);
    let mut b = camp(7);
    let events_a = run_ticks(&mut a, 250);
    let events_b = run_ticks(&mut b, 250);
    assert_eq!(events_a, events_b);
    assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
}

#[test]
fn test_snapshot_resumes_identically() {
    let mut straight = camp(11);
    run_ticks(&mut straight, 120);

    let mut first = camp(11);
    run_ticks(&mut first, 60);
    let mut resumed = World::from_json(&first.to_json().unwrap()).unwrap();
    run_ticks(&mut resumed, 60);

    assert_eq!(straight.to_json().unwrap(), resumed.to_json().unwrap());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_runs_are_reproducible(seed in any::<u64>(), ticks in 1u64..150) {
        let mut a = camp(seed);
        let mut b = camp(seed);
        run_ticks(&mut a, ticks);
        run_ticks(&mut b, ticks);
        prop_assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }

    #[test]
    fn prop_items_are_conserved_every_tick(seed in any::<u64>(), ticks in 1u64..150) {
        let mut world = camp(seed);
        for _ in 0..ticks {
            run_simulation_tick(&mut world);
            prop_assert!(world.check_integrity().is_ok());
            for kind in world.ledger.kinds() {
                prop_assert_eq!(world.items.count_kind(kind) as i64, world.ledger.expected_live(kind));
            }
        }
    }
}
