//! Item instances - identity-bearing units of a named item kind
//!
//! Every live item sits in exactly one container at a time (a tile, a
//! worker's hands, or one slot of a node inventory). `ItemStore` owns the
//! item records; the containers only hold ids. `World::move_item` keeps the
//! two sides in sync.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::types::{Coord, ItemId, NodeId, Tick, WorkerId};

/// Which part of a node inventory holds an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeSlot {
    /// Finished outputs waiting to be withdrawn
    Onhand,
    /// Inputs delivered for a task (or fuel for a fire)
    Input,
    /// Tools stored at the node
    Tool,
}

/// The single container that owns an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemLocation {
    Tile(Coord),
    Carried(WorkerId),
    Node { node: NodeId, slot: NodeSlot },
}

/// Spoil metadata: after `spoil_after` ticks the item turns into `spoils_into`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perishable {
    pub created: Tick,
    pub spoil_after: u32,
    pub spoils_into: String,
}

impl Perishable {
    pub fn is_spoiled(&self, now: Tick) -> bool {
        now >= self.created + self.spoil_after as u64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub kind: String,
    pub location: ItemLocation,
    /// Remaining uses for tools
    pub durability: Option<u32>,
    pub perishable: Option<Perishable>,
}

impl Item {
    pub fn is_tool(&self) -> bool {
        self.durability.is_some()
    }
}

/// All live items, keyed by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemStore {
    items: BTreeMap<ItemId, Item>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(&id)
    }

    pub fn insert(&mut self, item: Item) {
        self.items.insert(item.id, item);
    }

    pub fn remove(&mut self, id: ItemId) -> Option<Item> {
        self.items.remove(&id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of live items of a kind
    pub fn count_kind(&self, kind: &str) -> usize {
        self.items.values().filter(|i| i.kind == kind).count()
    }

    pub fn kind_of(&self, id: ItemId) -> Option<&str> {
        self.items.get(&id).map(|i| i.kind.as_str())
    }
}

/// Running totals per item kind, used to check conservation and unlocks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLedger {
    pub created: BTreeMap<String, u64>,
    /// Eaten by a recipe as an input or burned as fuel
    pub consumed: BTreeMap<String, u64>,
    /// Worn out, spoiled, or deleted
    pub destroyed: BTreeMap<String, u64>,
}

impl ItemLedger {
    pub fn record_created(&mut self, kind: &str) {
        *self.created.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn record_consumed(&mut self, kind: &str) {
        *self.consumed.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn record_destroyed(&mut self, kind: &str) {
        *self.destroyed.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn ever_created(&self, kind: &str) -> bool {
        self.created.get(kind).copied().unwrap_or(0) > 0
    }

    /// created - consumed - destroyed
    pub fn expected_live(&self, kind: &str) -> i64 {
        let get = |m: &BTreeMap<String, u64>| m.get(kind).copied().unwrap_or(0) as i64;
        get(&self.created) - get(&self.consumed) - get(&self.destroyed)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &String> {
        self.created.keys()
    }
}
