//! Task instances and the frames workers stack up to carry them out

use serde::{Deserialize, Serialize};

use crate::city::recipe::ProducerRef;
use crate::core::types::{Coord, ItemId, NodeId, TaskId, Tick, WorkerId};

/// What a task instance is doing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    /// Run a task definition from the catalog
    Recipe(ProducerRef),
    /// Build the owning node
    Construction,
}

/// Lifecycle state of a task instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// Waiting in the pool for a worker
    Open,
    /// A worker holds it
    InProgress,
    /// Inputs are in place and the node is working it on its own
    Processing,
}

/// A live binding of a task definition to a node (or open ground)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInstance {
    pub id: TaskId,
    pub kind: TaskKind,
    pub node: Option<NodeId>,
    /// Worker holding the task
    pub worker: Option<WorkerId>,
    /// Extra workers assisting (construction only)
    pub helpers: Vec<WorkerId>,
    /// Work applied to the current batch unit
    pub progress: f32,
    /// Batch units requested
    pub quantity: u32,
    /// Batch units finished
    pub completed: u32,
    /// User-chosen work location
    pub location: Option<Coord>,
    /// Task this one was synthesized for
    pub requested_by: Option<TaskId>,
    /// Outermost task of the synthesis chain (itself for top-level tasks)
    pub root: TaskId,
    /// Chain length below the root
    pub depth: u32,
    /// Tasks synthesized on behalf of this one's chain; only tracked on roots
    pub synthesized: u32,
    pub state: TaskState,
    pub created_tick: Tick,
}

impl TaskInstance {
    pub fn new(id: TaskId, kind: TaskKind, node: Option<NodeId>, tick: Tick) -> Self {
        Self {
            id,
            kind,
            node,
            worker: None,
            helpers: Vec::new(),
            progress: 0.0,
            quantity: 1,
            completed: 0,
            location: None,
            requested_by: None,
            root: id,
            depth: 0,
            synthesized: 0,
            state: TaskState::Open,
            created_tick: tick,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity.max(1);
        self
    }

    pub fn with_location(mut self, location: Coord) -> Self {
        self.location = Some(location);
        self
    }

    /// Mark this task as synthesized on behalf of `parent`
    pub fn requested_for(mut self, parent: &TaskInstance) -> Self {
        self.requested_by = Some(parent.id);
        self.root = parent.root;
        self.depth = parent.depth + 1;
        self
    }

    pub fn is_top_level(&self) -> bool {
        self.requested_by.is_none()
    }

    pub fn batch_done(&self) -> bool {
        self.completed >= self.quantity
    }

    pub fn producer(&self) -> Option<&ProducerRef> {
        match &self.kind {
            TaskKind::Recipe(p) => Some(p),
            TaskKind::Construction => None,
        }
    }

    /// Short label for logs
    pub fn label(&self) -> String {
        match &self.kind {
            TaskKind::Recipe(p) => p.to_string(),
            TaskKind::Construction => "construction".into(),
        }
    }
}

/// Where a carried item should end up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    /// Into the node's input slot
    Node(NodeId),
    /// Dropped on the tile
    Tile(Coord),
    /// Kept in hand (inputs of node-less tasks)
    Carry,
}

/// Subtask kind of one stack frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameKind {
    /// Work a task at its node
    WorkOnSite,
    /// Work a node-less task at a chosen spot
    WorkAtSpot,
    /// Add construction progress to the task's node
    Construct,
    /// Walk to an item, pick it up, then carry it on
    FetchItem { item: ItemId, dest: Destination },
    /// Walk to a tool and pick it up; carrying it is equipping it
    FetchTool { item: ItemId },
    /// Carry a held item to its destination and put it down
    MoveItem { item: ItemId, dest: Destination },
    /// A requirement group could not be found nearby
    CannotWork {
        group: usize,
        dependency: Option<TaskId>,
        attempts: u32,
    },
}

impl FrameKind {
    pub fn name(&self) -> &'static str {
        match self {
            FrameKind::WorkOnSite => "work-on-site",
            FrameKind::WorkAtSpot => "work-at-spot",
            FrameKind::Construct => "construct",
            FrameKind::FetchItem { .. } => "fetch-item",
            FrameKind::FetchTool { .. } => "fetch-tool",
            FrameKind::MoveItem { .. } => "move-item",
            FrameKind::CannotWork { .. } => "cannot-work",
        }
    }
}

/// One entry on a worker's LIFO stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFrame {
    pub kind: FrameKind,
    /// Tile the worker must stand on before acting; None until resolved
    pub target: Option<Coord>,
    /// Task the frame works for
    pub task: TaskId,
    /// Re-resolves after failed world lookups
    pub retries: u32,
}

impl TaskFrame {
    pub fn new(kind: FrameKind, task: TaskId) -> Self {
        Self {
            kind,
            target: None,
            task,
            retries: 0,
        }
    }

    pub fn at(mut self, target: Coord) -> Self {
        self.target = Some(target);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesized_task_inherits_chain() {
        let root = TaskInstance::new(
            TaskId(1),
            TaskKind::Recipe(ProducerRef::block("Stick Maker", "Short Stick")),
            Some(NodeId(1)),
            0,
        );
        let child = TaskInstance::new(
            TaskId(2),
            TaskKind::Recipe(ProducerRef::block("Tool Bench", "Flint Axe")),
            Some(NodeId(2)),
            5,
        )
        .requested_for(&root);
        let grandchild = TaskInstance::new(
            TaskId(3),
            TaskKind::Recipe(ProducerRef::field("Collect Flint")),
            None,
            6,
        )
        .requested_for(&child);

        assert!(root.is_top_level());
        assert_eq!(child.requested_by, Some(TaskId(1)));
        assert_eq!(grandchild.root, TaskId(1));
        assert_eq!(grandchild.depth, 2);
    }

    #[test]
    fn test_quantity_never_zero() {
        let task = TaskInstance::new(TaskId(1), TaskKind::Construction, Some(NodeId(1)), 0)
            .with_quantity(0);
        assert_eq!(task.quantity, 1);
        assert!(!task.batch_done());
    }

    #[test]
    fn test_frame_names() {
        let frame = TaskFrame::new(
            FrameKind::CannotWork {
                group: 0,
                dependency: None,
                attempts: 0,
            },
            TaskId(1),
        )
        .at(Coord::new(1, 2));
        assert_eq!(frame.kind.name(), "cannot-work");
        assert_eq!(frame.target, Some(Coord::new(1, 2)));
    }
}
