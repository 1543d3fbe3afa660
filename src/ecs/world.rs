//! World - the single context object for one simulation session
//!
//! Owns the tile grid, every item, node, task instance and worker, the
//! reservation relation, the recipe catalog, the config, the RNG and the id
//! counters. Nothing is global: the scheduler and resolver receive the world
//! explicitly.
//!
//! All collections iterated during a tick are `BTreeMap`s so two runs with
//! the same seed and inputs visit entities in the same order.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::city::building::ProductionNode;
use crate::city::recipe::{RecipeCatalog, TaskDef};
use crate::core::config::SimulationConfig;
use crate::core::error::{ColonyError, Result, WorldRef};
use crate::core::types::{Coord, IdAllocator, ItemId, NodeId, TaskId, Tick, WorkerId};
use crate::entity::item::{Item, ItemLedger, ItemLocation, ItemStore, NodeSlot, Perishable};
use crate::entity::reservation::Reservations;
use crate::entity::tasks::{TaskInstance, TaskState};
use crate::entity::worker::Worker;
use crate::spatial::grid::{TerrainGrid, TerrainKind};

/// Why an item left the world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Used up as a recipe input or fuel
    Consumed,
    /// Worn out, spoiled, or deleted
    Destroyed,
}

/// The game world containing all simulation state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    pub current_tick: Tick,
    pub config: SimulationConfig,
    pub catalog: RecipeCatalog,
    pub tiles: TerrainGrid,
    pub items: ItemStore,
    pub nodes: BTreeMap<NodeId, ProductionNode>,
    pub tasks: BTreeMap<TaskId, TaskInstance>,
    /// Iterated in creation order (ids are sequential)
    pub workers: BTreeMap<WorkerId, Worker>,
    pub reservations: Reservations,
    pub ledger: ItemLedger,
    pub ids: IdAllocator,
    pub rng: ChaCha8Rng,
    /// Set when a recipe cycle was hit at runtime
    pub catalog_invalid: bool,
}

impl World {
    pub fn new(
        width: u32,
        height: u32,
        terrain: TerrainKind,
        catalog: RecipeCatalog,
        config: SimulationConfig,
    ) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            current_tick: 0,
            config,
            catalog,
            tiles: TerrainGrid::new(width, height, terrain),
            items: ItemStore::new(),
            nodes: BTreeMap::new(),
            tasks: BTreeMap::new(),
            workers: BTreeMap::new(),
            reservations: Reservations::new(),
            ledger: ItemLedger::default(),
            ids: IdAllocator::new(),
            rng,
            catalog_invalid: false,
        }
    }

    /// Advance the tick counter
    pub fn tick(&mut self) {
        self.current_tick += 1;
    }

    // === LOOKUPS ===

    pub fn worker(&self, id: WorkerId) -> Result<&Worker> {
        self.workers
            .get(&id)
            .ok_or(ColonyError::InvalidWorldReference(WorldRef::Worker(id)))
    }

    pub fn worker_mut(&mut self, id: WorkerId) -> Result<&mut Worker> {
        self.workers
            .get_mut(&id)
            .ok_or(ColonyError::InvalidWorldReference(WorldRef::Worker(id)))
    }

    pub fn node(&self, id: NodeId) -> Result<&ProductionNode> {
        self.nodes
            .get(&id)
            .ok_or(ColonyError::InvalidWorldReference(WorldRef::Node(id)))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut ProductionNode> {
        self.nodes
            .get_mut(&id)
            .ok_or(ColonyError::InvalidWorldReference(WorldRef::Node(id)))
    }

    pub fn task(&self, id: TaskId) -> Result<&TaskInstance> {
        self.tasks
            .get(&id)
            .ok_or(ColonyError::InvalidWorldReference(WorldRef::Task(id)))
    }

    pub fn task_mut(&mut self, id: TaskId) -> Result<&mut TaskInstance> {
        self.tasks
            .get_mut(&id)
            .ok_or(ColonyError::InvalidWorldReference(WorldRef::Task(id)))
    }

    pub fn item(&self, id: ItemId) -> Result<&Item> {
        self.items
            .get(id)
            .ok_or(ColonyError::InvalidWorldReference(WorldRef::Item(id)))
    }

    /// Definition behind a recipe task instance
    pub fn task_def(&self, task: &TaskInstance) -> Result<&TaskDef> {
        match task.producer() {
            Some(p) => self.catalog.task(p),
            None => Err(ColonyError::MissingRecipeData(format!(
                "task {} has no recipe",
                task.id.0
            ))),
        }
    }

    /// Tile an item can be reached at
    pub fn item_coord(&self, id: ItemId) -> Option<Coord> {
        match self.items.get(id)?.location {
            ItemLocation::Tile(c) => Some(c),
            ItemLocation::Carried(w) => self.workers.get(&w).map(|w| w.position),
            ItemLocation::Node { node, .. } => self.nodes.get(&node).map(|n| n.position),
        }
    }

    pub fn node_at(&self, c: Coord) -> Option<NodeId> {
        self.tiles.get(c).and_then(|t| t.node)
    }

    /// First node of a block type, usable ones only, in id order
    pub fn first_node_of(&self, block: &str) -> Option<NodeId> {
        self.nodes
            .values()
            .find(|n| n.block == block && n.is_usable())
            .map(|n| n.id)
    }

    // === SPAWNING ===

    pub fn spawn_worker(&mut self, name: impl Into<String>, position: Coord) -> Result<WorkerId> {
        if !self.tiles.in_bounds(position) {
            return Err(ColonyError::InvalidWorldReference(WorldRef::Tile(position)));
        }
        let id = self.ids.worker();
        self.workers.insert(id, Worker::new(id, name, position));
        Ok(id)
    }

    /// Create a plain item on a tile
    pub fn spawn_item(&mut self, kind: &str, at: Coord) -> Result<ItemId> {
        self.create_item(kind, None, None, ItemLocation::Tile(at))
    }

    /// Create a tool with the given durability on a tile
    pub fn spawn_tool(&mut self, kind: &str, durability: u32, at: Coord) -> Result<ItemId> {
        self.create_item(kind, Some(durability), None, ItemLocation::Tile(at))
    }

    /// Create an item in any container and record it in the ledger
    pub fn create_item(
        &mut self,
        kind: &str,
        durability: Option<u32>,
        perishable: Option<Perishable>,
        location: ItemLocation,
    ) -> Result<ItemId> {
        self.check_container(location)?;
        let id = self.ids.item();
        self.items.insert(Item {
            id,
            kind: kind.to_string(),
            location,
            durability,
            perishable,
        });
        self.attach(id, location)?;
        self.ledger.record_created(kind);
        Ok(id)
    }

    fn check_container(&self, location: ItemLocation) -> Result<()> {
        match location {
            ItemLocation::Tile(c) => {
                if !self.tiles.in_bounds(c) {
                    return Err(ColonyError::InvalidWorldReference(WorldRef::Tile(c)));
                }
            }
            ItemLocation::Carried(w) => {
                self.worker(w)?;
            }
            ItemLocation::Node { node, .. } => {
                self.node(node)?;
            }
        }
        Ok(())
    }

    // === ITEM CONTAINERS ===

    /// Put an id into a container list. Node slots ignore capacity here;
    /// callers that must respect it check `has_room` first.
    fn attach(&mut self, id: ItemId, location: ItemLocation) -> Result<()> {
        match location {
            ItemLocation::Tile(c) => self
                .tiles
                .get_mut(c)
                .ok_or(ColonyError::InvalidWorldReference(WorldRef::Tile(c)))?
                .items
                .push(id),
            ItemLocation::Carried(w) => self.worker_mut(w)?.carried.push(id),
            ItemLocation::Node { node, slot } => self.node_mut(node)?.stockpile.force_add(slot, id),
        }
        Ok(())
    }

    /// Take an id out of whatever container holds it
    fn detach(&mut self, id: ItemId) -> Result<ItemLocation> {
        let location = self.item(id)?.location;
        match location {
            ItemLocation::Tile(c) => {
                if let Some(tile) = self.tiles.get_mut(c) {
                    tile.items.retain(|i| *i != id);
                }
            }
            ItemLocation::Carried(w) => {
                if let Some(worker) = self.workers.get_mut(&w) {
                    worker.carried.retain(|i| *i != id);
                }
            }
            ItemLocation::Node { node, .. } => {
                if let Some(node) = self.nodes.get_mut(&node) {
                    node.stockpile.remove(id);
                }
            }
        }
        Ok(location)
    }

    /// Move an item to a new container in one step
    pub fn move_item(&mut self, id: ItemId, to: ItemLocation) -> Result<()> {
        self.check_container(to)?;
        self.detach(id)?;
        self.attach(id, to)?;
        if let Some(item) = self.items.get_mut(id) {
            item.location = to;
        }
        Ok(())
    }

    // === NODE INVENTORY ===

    /// Take an item into a node's input slot.
    ///
    /// Returns Ok(false) and leaves the item where it was when the node is full.
    pub fn accept_input(&mut self, node: NodeId, id: ItemId) -> Result<bool> {
        self.deposit(node, id, NodeSlot::Input)
    }

    /// Store a tool in a node's tool slot, capacity permitting
    pub fn accept_tool(&mut self, node: NodeId, id: ItemId) -> Result<bool> {
        if !self.item(id)?.is_tool() {
            return Err(ColonyError::InvalidRequest(format!(
                "item {} is not a tool",
                id.0
            )));
        }
        self.deposit(node, id, NodeSlot::Tool)
    }

    fn deposit(&mut self, node: NodeId, id: ItemId, slot: NodeSlot) -> Result<bool> {
        if !self.node(node)?.has_room() {
            return Ok(false);
        }
        self.move_item(id, ItemLocation::Node { node, slot })?;
        Ok(true)
    }

    /// Hand a finished output from a node's onhand slot to `to`.
    ///
    /// Returns None, moving nothing, if the item is not on hand at that node.
    pub fn withdraw_output(&mut self, node: NodeId, id: ItemId, to: ItemLocation) -> Result<Option<ItemId>> {
        let onhand = ItemLocation::Node {
            node,
            slot: NodeSlot::Onhand,
        };
        if self.items.get(id).map(|i| i.location) != Some(onhand) {
            return Ok(None);
        }
        self.move_item(id, to)?;
        Ok(Some(id))
    }

    /// Remove an item from the world, releasing any reservation on it
    pub fn remove_item(&mut self, id: ItemId, why: Removal) -> Result<Item> {
        self.detach(id)?;
        self.reservations.untag(id);
        let item = self
            .items
            .remove(id)
            .ok_or(ColonyError::InvalidWorldReference(WorldRef::Item(id)))?;
        match why {
            Removal::Consumed => self.ledger.record_consumed(&item.kind),
            Removal::Destroyed => self.ledger.record_destroyed(&item.kind),
        }
        Ok(item)
    }

    /// Create the outputs of one finished batch unit of `task`.
    ///
    /// Outputs with a drop chance are rolled against the world RNG. If the
    /// task was synthesized for another, its outputs are reserved for the
    /// requester straight away.
    pub fn create_outputs(
        &mut self,
        task: TaskId,
        def: &TaskDef,
        location: ItemLocation,
    ) -> Result<Vec<ItemId>> {
        let requester = self.task(task)?.requested_by;
        let mut created = Vec::new();
        for output in &def.outputs {
            for _ in 0..output.qty {
                if let Some(chance) = output.chance {
                    if self.rng.gen::<f32>() >= chance {
                        continue;
                    }
                }
                let perishable = def.burn.as_ref().map(|b| Perishable {
                    created: self.current_tick,
                    spoil_after: b.window,
                    spoils_into: b.into.clone(),
                });
                let id = self.create_item(&output.name, output.durability, perishable, location)?;
                if let Some(parent) = requester {
                    self.reservations.tag(id, parent);
                }
                created.push(id);
            }
        }
        Ok(created)
    }

    // === TASKS ===

    /// Add a task to the pool and bind it to its node
    pub fn add_task(&mut self, task: TaskInstance) -> TaskId {
        let id = task.id;
        if let Some(node) = task.node {
            if let Some(n) = self.nodes.get_mut(&node) {
                n.attach_task(id);
            }
        }
        self.tasks.insert(id, task);
        id
    }

    /// Cancel a task and everything synthesized for it.
    ///
    /// For each cancelled task, in order: release its reservations, detach it
    /// from its node, remove its frames from every worker stack. Non-tool
    /// items a worker was carrying for it are dropped where the worker
    /// stands. Returns every cancelled id, children first.
    pub fn cancel_task(&mut self, id: TaskId) -> Vec<TaskId> {
        let mut cancelled = Vec::new();
        let children: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|t| t.requested_by == Some(id))
            .map(|t| t.id)
            .collect();
        for child in children {
            cancelled.extend(self.cancel_task(child));
        }

        let freed = self.reservations.untag_task(id);
        self.retire_task(id, &freed);
        if self.tasks.remove(&id).is_some() {
            cancelled.push(id);
        }
        cancelled
    }

    /// Remove a finished task from the pool, releasing what it still holds
    pub fn complete_task(&mut self, id: TaskId) {
        let freed = self.reservations.untag_task(id);
        self.retire_task(id, &freed);
        self.tasks.remove(&id);
    }

    fn retire_task(&mut self, id: TaskId, freed: &[ItemId]) {
        let node = self.tasks.get(&id).and_then(|t| t.node);
        if let Some(node) = node {
            if let Some(n) = self.nodes.get_mut(&node) {
                n.detach_task(id);
            }
        }

        let mut drops = Vec::new();
        for worker in self.workers.values_mut() {
            if worker.drop_frames_of(id) == 0 {
                continue;
            }
            for item in freed {
                if worker.holds(*item) {
                    let is_tool = self.items.get(*item).map_or(false, Item::is_tool);
                    if !is_tool {
                        drops.push((*item, worker.position));
                    }
                }
            }
        }
        for (item, at) in drops {
            if let Err(e) = self.move_item(item, ItemLocation::Tile(at)) {
                tracing::warn!("Could not drop item {} for task {}: {}", item.0, id.0, e);
            }
        }
    }

    /// Tasks waiting in the pool with no holder, oldest first
    pub fn open_tasks(&self) -> impl Iterator<Item = &TaskInstance> {
        self.tasks
            .values()
            .filter(|t| t.state == TaskState::Open && t.worker.is_none())
    }

    // === INTEGRITY ===

    /// Verify the conservation and ownership invariants.
    ///
    /// - every item sits in exactly the container its location names
    /// - no container lists an item twice or lists a missing item
    /// - live count per kind equals created - consumed - destroyed
    /// - reservations point at live items and tasks
    /// - workers stand on the map; tasks point at live nodes
    pub fn check_integrity(&self) -> Result<()> {
        let mut seen: BTreeMap<ItemId, ItemLocation> = BTreeMap::new();
        let mut record = |id: ItemId, loc: ItemLocation| -> Result<()> {
            if seen.insert(id, loc).is_some() {
                return Err(ColonyError::InvalidWorldReference(WorldRef::Item(id)));
            }
            Ok(())
        };

        for tile in self.tiles.tiles() {
            for id in &tile.items {
                record(*id, ItemLocation::Tile(tile.coord))?;
            }
        }
        for worker in self.workers.values() {
            if !self.tiles.in_bounds(worker.position) {
                return Err(ColonyError::InvalidWorldReference(WorldRef::Worker(worker.id)));
            }
            for id in &worker.carried {
                record(*id, ItemLocation::Carried(worker.id))?;
            }
        }
        for node in self.nodes.values() {
            for (slot, id) in node.stockpile.iter() {
                record(id, ItemLocation::Node { node: node.id, slot })?;
            }
            for task in &node.active_tasks {
                self.task(*task)?;
            }
        }

        if seen.len() != self.items.len() {
            let missing = self.items.iter().find(|i| !seen.contains_key(&i.id));
            let id = missing.map(|i| i.id).unwrap_or(ItemId(0));
            return Err(ColonyError::InvalidWorldReference(WorldRef::Item(id)));
        }
        for item in self.items.iter() {
            if seen.get(&item.id) != Some(&item.location) {
                return Err(ColonyError::InvalidWorldReference(WorldRef::Item(item.id)));
            }
        }

        for kind in self.ledger.kinds() {
            let live = self.items.count_kind(kind) as i64;
            if live != self.ledger.expected_live(kind) {
                return Err(ColonyError::InvalidRequest(format!(
                    "conservation broken for {}: {} live, ledger expects {}",
                    kind,
                    live,
                    self.ledger.expected_live(kind)
                )));
            }
        }

        for (item, task) in self.reservations.iter() {
            self.item(item)?;
            self.task(task)?;
        }
        for task in self.tasks.values() {
            if let Some(node) = task.node {
                self.node(node)?;
            }
        }
        Ok(())
    }

    // === SNAPSHOT ===

    /// Serialize the whole world, in-flight frames included
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Rehydrate a world saved with `to_json`
    pub fn from_json(json: &str) -> Result<Self> {
        let mut world: World = serde_json::from_str(json)?;
        world.catalog.rebuild_index();
        Ok(world)
    }
}
