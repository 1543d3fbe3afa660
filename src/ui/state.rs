//! Read-only render models for the display layer
//!
//! Nothing here feeds back into the simulation; the display asks for views
//! after a tick and presents them however it likes.

use std::collections::VecDeque;

use crate::city::building::{NodeState, ProductionNode};
use crate::core::types::{NodeId, Tick};
use crate::ecs::world::World;
use crate::simulation::tick::SimulationEvent;

/// Maximum event log entries to keep
const MAX_LOG_ENTRIES: usize = 50;

/// What a node panel shows
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub id: NodeId,
    pub name: String,
    pub description: String,
    /// Construction progress while being built, else the oldest task's
    /// progress on its current unit. 0 when idle.
    pub progress_percent: f32,
    pub available_tasks: Vec<String>,
    pub state: NodeState,
}

impl NodeView {
    pub fn from_node(world: &World, node: &ProductionNode) -> Self {
        let block = world.catalog.block(&node.block);
        let description = block.map(|b| b.description.clone()).unwrap_or_default();

        let progress_percent = match node.state {
            NodeState::UnderConstruction => block
                .and_then(|b| b.build.as_ref())
                .map(|cost| percent(node.construction_progress, cost.duration))
                .unwrap_or(0.0),
            NodeState::Complete => node
                .active_tasks
                .first()
                .and_then(|id| world.tasks.get(id))
                .and_then(|task| {
                    let def = world.task_def(task).ok()?;
                    Some(percent(task.progress, def.duration))
                })
                .unwrap_or(0.0),
        };

        Self {
            id: node.id,
            name: node.block.clone(),
            description,
            progress_percent,
            available_tasks: node
                .available_tasks(&world.catalog, &world.ledger)
                .into_iter()
                .map(|t| t.name.clone())
                .collect(),
            state: node.state,
        }
    }
}

fn percent(progress: f32, duration: u32) -> f32 {
    if duration == 0 {
        return 100.0;
    }
    (progress / duration as f32 * 100.0).clamp(0.0, 100.0)
}

/// Views of every node, in id order
pub fn node_views(world: &World) -> Vec<NodeView> {
    world
        .nodes
        .values()
        .map(|n| NodeView::from_node(world, n))
        .collect()
}

/// An entry in the event log
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub tick: Tick,
    pub event: SimulationEvent,
}

/// Bounded log of recent simulation events
#[derive(Debug, Default)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(MAX_LOG_ENTRIES),
        }
    }

    pub fn record(&mut self, tick: Tick, events: impl IntoIterator<Item = SimulationEvent>) {
        for event in events {
            if self.entries.len() >= MAX_LOG_ENTRIES {
                self.entries.pop_front();
            }
            self.entries.push_back(LogEntry { tick, event });
        }
    }

    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::city::recipe::RecipeCatalog;
    use crate::command::executor::place_node;
    use crate::core::config::SimulationConfig;
    use crate::core::types::{Coord, TaskId};
    use crate::spatial::grid::TerrainKind;

    fn world() -> World {
        World::new(
            6,
            6,
            TerrainKind::Grass,
            RecipeCatalog::with_defaults(),
            SimulationConfig::default(),
        )
    }

    #[test]
    fn test_construction_site_view() {
        let mut world = world();
        let fire = place_node(&mut world, "Campfire", Coord::new(1, 1), false).unwrap();
        world.nodes.get_mut(&fire).unwrap().construction_progress = 5.0;

        let view = NodeView::from_node(&world, &world.nodes[&fire]);
        assert_eq!(view.name, "Campfire");
        assert_eq!(view.description, "Cooks food while it has fuel");
        assert!((view.progress_percent - 50.0).abs() < 0.01);
        assert!(view.available_tasks.is_empty());
        assert_eq!(view.state, NodeState::UnderConstruction);
    }

    #[test]
    fn test_available_tasks_follow_unlocks() {
        let mut world = world();
        place_node(&mut world, "Tool Bench", Coord::new(1, 1), true).unwrap();

        let views = node_views(&world);
        assert_eq!(views[0].available_tasks, vec!["Flint Axe".to_string()]);
        assert_eq!(views[0].progress_percent, 0.0);

        world.ledger.record_created("Flint Axe");
        let views = node_views(&world);
        assert_eq!(
            views[0].available_tasks,
            vec!["Flint Axe".to_string(), "Spear".to_string()]
        );
    }

    #[test]
    fn test_event_log_is_bounded() {
        let mut log = EventLog::new();
        let events = (0..60).map(|i| SimulationEvent::TaskCompleted { task: TaskId(i) });
        log.record(3, events);
        assert_eq!(log.len(), MAX_LOG_ENTRIES);
        assert_eq!(
            log.entries().next().map(|e| e.event.clone()),
            Some(SimulationEvent::TaskCompleted { task: TaskId(10) })
        );
    }
}
