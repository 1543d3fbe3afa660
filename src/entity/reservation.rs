//! Item reservations - which task has claimed which item
//!
//! A reservation is a relation, not a flag on the item: many items may be
//! claimed by one task, an item by at most one task. The resolver skips any
//! item claimed by a different task, which is what keeps two workers from
//! walking to the same log within a tick.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::types::{ItemId, TaskId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservations {
    by_item: BTreeMap<ItemId, TaskId>,
}

impl Reservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an item for a task.
    ///
    /// Returns false if another task already holds it.
    pub fn tag(&mut self, item: ItemId, task: TaskId) -> bool {
        match self.by_item.get(&item) {
            Some(holder) if *holder != task => false,
            _ => {
                self.by_item.insert(item, task);
                true
            }
        }
    }

    pub fn untag(&mut self, item: ItemId) -> Option<TaskId> {
        self.by_item.remove(&item)
    }

    /// Release everything a task holds, returning the freed items
    pub fn untag_task(&mut self, task: TaskId) -> Vec<ItemId> {
        let freed: Vec<ItemId> = self
            .by_item
            .iter()
            .filter(|(_, t)| **t == task)
            .map(|(i, _)| *i)
            .collect();
        for item in &freed {
            self.by_item.remove(item);
        }
        freed
    }

    pub fn holder(&self, item: ItemId) -> Option<TaskId> {
        self.by_item.get(&item).copied()
    }

    /// True if the item is free or already claimed by `task`
    pub fn available_to(&self, item: ItemId, task: TaskId) -> bool {
        self.by_item.get(&item).map_or(true, |t| *t == task)
    }

    pub fn items_of(&self, task: TaskId) -> impl Iterator<Item = ItemId> + '_ {
        self.by_item
            .iter()
            .filter(move |(_, t)| **t == task)
            .map(|(i, _)| *i)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, TaskId)> + '_ {
        self.by_item.iter().map(|(i, t)| (*i, *t))
    }
}
