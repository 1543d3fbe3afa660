//! Stockpile - the inventory of one production node

use serde::{Deserialize, Serialize};

use crate::core::types::ItemId;
use crate::entity::item::NodeSlot;

/// Items held by a node, split by slot, with a shared capacity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stockpile {
    pub onhand: Vec<ItemId>,
    pub inputs: Vec<ItemId>,
    pub tools: Vec<ItemId>,
    capacity: usize,
}

impl Stockpile {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total items across all slots
    pub fn len(&self) -> usize {
        self.onhand.len() + self.inputs.len() + self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn free_space(&self) -> usize {
        self.capacity.saturating_sub(self.len())
    }

    pub fn slot(&self, slot: NodeSlot) -> &Vec<ItemId> {
        match slot {
            NodeSlot::Onhand => &self.onhand,
            NodeSlot::Input => &self.inputs,
            NodeSlot::Tool => &self.tools,
        }
    }

    fn slot_mut(&mut self, slot: NodeSlot) -> &mut Vec<ItemId> {
        match slot {
            NodeSlot::Onhand => &mut self.onhand,
            NodeSlot::Input => &mut self.inputs,
            NodeSlot::Tool => &mut self.tools,
        }
    }

    /// Add an item if there is room. Returns false when full.
    pub fn add(&mut self, slot: NodeSlot, item: ItemId) -> bool {
        if self.free_space() == 0 {
            return false;
        }
        self.slot_mut(slot).push(item);
        true
    }

    /// Add without a capacity check (task outputs must never vanish)
    pub fn force_add(&mut self, slot: NodeSlot, item: ItemId) {
        self.slot_mut(slot).push(item);
    }

    /// Remove an item from whichever slot holds it
    pub fn remove(&mut self, item: ItemId) -> Option<NodeSlot> {
        for slot in [NodeSlot::Onhand, NodeSlot::Input, NodeSlot::Tool] {
            let list = self.slot_mut(slot);
            if let Some(pos) = list.iter().position(|i| *i == item) {
                list.remove(pos);
                return Some(slot);
            }
        }
        None
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.onhand.contains(&item) || self.inputs.contains(&item) || self.tools.contains(&item)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeSlot, ItemId)> + '_ {
        self.onhand
            .iter()
            .map(|i| (NodeSlot::Onhand, *i))
            .chain(self.inputs.iter().map(|i| (NodeSlot::Input, *i)))
            .chain(self.tools.iter().map(|i| (NodeSlot::Tool, *i)))
    }
}
