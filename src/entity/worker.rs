//! Workers - agents that carry out task frames

use serde::{Deserialize, Serialize};

use crate::core::config::SimulationConfig;
use crate::core::types::{Coord, ItemId, TaskId, WorkerId};
use crate::entity::tasks::TaskFrame;
use crate::spatial::grid::TerrainGrid;

/// Result of one tick of walking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    /// Standing on the target
    Arrived,
    /// Took one step
    Moved,
    /// Still paying for the previous step
    Waiting,
    /// Next step would leave the map
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub name: String,
    pub position: Coord,
    /// Ticks still owed for the last step taken
    pub move_delay: f32,
    /// LIFO; the last frame is the one executing
    pub stack: Vec<TaskFrame>,
    /// Items in hand. Carried tools count as equipped.
    pub carried: Vec<ItemId>,
    /// Work applied per tick of on-site work
    pub efficiency: f32,
}

impl Worker {
    pub fn new(id: WorkerId, name: impl Into<String>, position: Coord) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            move_delay: 0.0,
            stack: Vec::new(),
            carried: Vec::new(),
            efficiency: 1.0,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn current_frame(&self) -> Option<&TaskFrame> {
        self.stack.last()
    }

    pub fn current_frame_mut(&mut self) -> Option<&mut TaskFrame> {
        self.stack.last_mut()
    }

    pub fn push(&mut self, frame: TaskFrame) {
        self.stack.push(frame);
    }

    pub fn pop(&mut self) -> Option<TaskFrame> {
        self.stack.pop()
    }

    /// Remove every frame working for `task`. Returns how many were removed.
    pub fn drop_frames_of(&mut self, task: TaskId) -> usize {
        let before = self.stack.len();
        self.stack.retain(|f| f.task != task);
        before - self.stack.len()
    }

    pub fn holds(&self, item: ItemId) -> bool {
        self.carried.contains(&item)
    }

    /// Walk one tick toward `target`.
    ///
    /// A step costs `orthogonal_step_cost` or `diagonal_step_cost` scaled by the
    /// destination tile's walk-lag. The worker steps at most once per tick and
    /// carries the remainder of the cost as `move_delay`.
    pub fn advance_toward(
        &mut self,
        target: Coord,
        grid: &TerrainGrid,
        config: &SimulationConfig,
    ) -> Movement {
        if self.position == target {
            return Movement::Arrived;
        }
        if self.move_delay >= 1.0 {
            self.move_delay -= 1.0;
            return Movement::Waiting;
        }
        let (next, diagonal) = self.position.step_toward(&target);
        if !grid.in_bounds(next) {
            return Movement::Blocked;
        }
        let cost = grid.step_cost(
            next,
            diagonal,
            config.orthogonal_step_cost,
            config.diagonal_step_cost,
        );
        self.position = next;
        self.move_delay = (self.move_delay + cost - 1.0).max(0.0);
        Movement::Moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tasks::FrameKind;
    use crate::spatial::grid::TerrainKind;

    fn walk_until_arrived(worker: &mut Worker, target: Coord, grid: &TerrainGrid) -> u32 {
        let config = SimulationConfig::default();
        let mut ticks = 0;
        while worker.advance_toward(target, grid, &config) != Movement::Arrived {
            ticks += 1;
            assert!(ticks < 1000, "worker never arrived");
        }
        ticks
    }

    #[test]
    fn test_orthogonal_walk_on_grass_is_one_tick_per_tile() {
        let grid = TerrainGrid::new(10, 10, TerrainKind::Grass);
        let mut worker = Worker::new(WorkerId(1), "Ada", Coord::new(0, 0));
        let ticks = walk_until_arrived(&mut worker, Coord::new(5, 0), &grid);
        assert_eq!(ticks, 5);
        assert_eq!(worker.position, Coord::new(5, 0));
    }

    #[test]
    fn test_diagonal_steps_cost_more() {
        let grid = TerrainGrid::new(10, 10, TerrainKind::Grass);
        let mut worker = Worker::new(WorkerId(1), "Ada", Coord::new(0, 0));
        // 5 diagonal steps at 1.4; the remainder of the last step is never waited out
        let ticks = walk_until_arrived(&mut worker, Coord::new(5, 5), &grid);
        assert_eq!(ticks, 6);
    }

    #[test]
    fn test_forest_slows_walking() {
        let grid = TerrainGrid::new(10, 1, TerrainKind::Forest);
        let mut worker = Worker::new(WorkerId(1), "Ada", Coord::new(0, 0));
        let ticks = walk_until_arrived(&mut worker, Coord::new(5, 0), &grid);
        // 5 steps at 1.8, minus the unpaid remainder of the last
        assert_eq!(ticks, 8);
    }

    #[test]
    fn test_frame_stack_is_lifo() {
        let mut worker = Worker::new(WorkerId(1), "Ada", Coord::new(0, 0));
        assert!(worker.is_idle());
        worker.push(TaskFrame::new(FrameKind::WorkOnSite, TaskId(3)));
        worker.push(TaskFrame::new(FrameKind::WorkAtSpot, TaskId(4)));
        assert!(!worker.is_idle());
        assert_eq!(worker.drop_frames_of(TaskId(3)), 1);
        assert_eq!(worker.current_frame().unwrap().task, TaskId(4));
        worker.pop();
        assert!(worker.is_idle());
    }
}
