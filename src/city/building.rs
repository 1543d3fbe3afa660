//! Production nodes - built structures bound to a tile

use serde::{Deserialize, Serialize};

use crate::city::recipe::{BlockDef, RecipeCatalog, TaskDef};
use crate::city::stockpile::Stockpile;
use crate::core::types::{Coord, NodeId, TaskId, Tick};
use crate::entity::item::ItemLedger;

/// Current state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    /// Construction site - accepts materials but runs no tasks
    UnderConstruction,
    /// Fully operational
    Complete,
}

/// One built (or being built) instance of a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionNode {
    pub id: NodeId,
    /// Block name in the recipe catalog
    pub block: String,
    pub position: Coord,
    pub state: NodeState,
    pub stockpile: Stockpile,
    /// Live task instances bound to this node, oldest first
    pub active_tasks: Vec<TaskId>,
    /// Construction progress (0.0 to build duration)
    pub construction_progress: f32,
    /// Fire heat; stays 0 for blocks without a fire
    pub heat: f32,
    /// Tick when construction finished
    pub completed_tick: Option<Tick>,
}

impl ProductionNode {
    pub fn new(id: NodeId, block: &BlockDef, position: Coord, default_capacity: usize) -> Self {
        let state = if block.build.is_some() {
            NodeState::UnderConstruction
        } else {
            NodeState::Complete
        };
        Self {
            id,
            block: block.name.clone(),
            position,
            state,
            stockpile: Stockpile::new(block.capacity.unwrap_or(default_capacity)),
            active_tasks: Vec::new(),
            construction_progress: 0.0,
            heat: 0.0,
            completed_tick: None,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.state == NodeState::Complete
    }

    /// Item movement goes through `World::accept_input`, `accept_tool` and
    /// `withdraw_output`, which keep item locations in step with the stockpile.
    pub fn has_room(&self) -> bool {
        self.stockpile.free_space() > 0
    }

    /// Task definitions this node currently offers.
    ///
    /// Nothing is offered while under construction; tasks gated behind an
    /// unlock appear once the unlocking item has ever been made.
    pub fn available_tasks<'a>(
        &self,
        catalog: &'a RecipeCatalog,
        ledger: &ItemLedger,
    ) -> Vec<&'a TaskDef> {
        if !self.is_usable() {
            return Vec::new();
        }
        catalog
            .block(&self.block)
            .map(|b| {
                b.tasks
                    .iter()
                    .filter(|t| is_unlocked(t, ledger))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn attach_task(&mut self, task: TaskId) {
        if !self.active_tasks.contains(&task) {
            self.active_tasks.push(task);
        }
    }

    pub fn detach_task(&mut self, task: TaskId) {
        self.active_tasks.retain(|t| *t != task);
    }
}

/// Whether a task definition's unlock condition is met
pub fn is_unlocked(task: &TaskDef, ledger: &ItemLedger) -> bool {
    task.unlocked_by
        .as_deref()
        .map_or(true, |kind| ledger.ever_created(kind))
}
