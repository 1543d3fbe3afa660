//! Construction system - handles node build progress from worker contributions

use crate::city::building::NodeState;
use crate::city::production::{consume_inputs, placed_for};
use crate::city::recipe::BuildCost;
use crate::core::error::{ColonyError, Result};
use crate::core::types::{NodeId, TaskId};
use crate::ecs::world::World;

/// Result of a worker contribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContributionResult {
    /// Work contributed, node still under construction
    InProgress { contributed: f32 },
    /// Work contributed, node is now complete
    Completed { contributed: f32 },
    /// Node is already complete
    AlreadyComplete,
    /// Building materials are not all delivered yet
    MaterialsMissing,
}

/// Build cost of the node a construction task works on
pub fn build_cost(world: &World, node: NodeId) -> Result<BuildCost> {
    let block = &world.node(node)?.block;
    world
        .catalog
        .block(block)
        .and_then(|b| b.build.clone())
        .ok_or_else(|| ColonyError::MissingRecipeData(format!("build cost of {}", block)))
}

/// Whether every material group of a construction task is in place
pub fn materials_in_place(world: &World, task: TaskId) -> Result<bool> {
    let instance = world.task(task)?;
    let node = instance
        .node
        .ok_or_else(|| ColonyError::InvalidRequest(format!("task {} builds nothing", task.0)))?;
    let cost = build_cost(world, node)?;
    Ok(cost
        .requirements
        .iter()
        .all(|g| placed_for(world, instance, g).is_some()))
}

/// Apply construction work to the node of `task`
///
/// Completion consumes the delivered materials, makes the node usable and
/// stamps `completed_tick`. The caller retires the task.
pub fn apply_construction_work(world: &mut World, task: TaskId, work_amount: f32) -> Result<ContributionResult> {
    let node = world
        .task(task)?
        .node
        .ok_or_else(|| ColonyError::InvalidRequest(format!("task {} builds nothing", task.0)))?;
    if world.node(node)?.state == NodeState::Complete {
        return Ok(ContributionResult::AlreadyComplete);
    }
    if !materials_in_place(world, task)? {
        return Ok(ContributionResult::MaterialsMissing);
    }

    let cost = build_cost(world, node)?;
    let current_tick = world.current_tick;
    let done = {
        let n = world.node_mut(node)?;
        n.construction_progress += work_amount;
        n.construction_progress >= cost.duration as f32
    };
    world.task_mut(task)?.progress += work_amount;

    if !done {
        return Ok(ContributionResult::InProgress {
            contributed: work_amount,
        });
    }

    consume_inputs(world, task, &cost.requirements)?;
    let n = world.node_mut(node)?;
    n.state = NodeState::Complete;
    n.completed_tick = Some(current_tick);
    tracing::info!("{} {} completed at tick {}", n.block, node.0, current_tick);
    Ok(ContributionResult::Completed {
        contributed: work_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::city::recipe::RecipeCatalog;
    use crate::command::executor::place_node;
    use crate::core::config::SimulationConfig;
    use crate::core::types::Coord;
    use crate::entity::item::{ItemLocation, NodeSlot};
    use crate::spatial::grid::TerrainKind;

    fn site() -> (World, NodeId, TaskId) {
        let mut world = World::new(
            6,
            6,
            TerrainKind::Grass,
            RecipeCatalog::with_defaults(),
            SimulationConfig::default(),
        );
        // Campfire: 3 twigs, 10 work
        let node = place_node(&mut world, "Campfire", Coord::new(1, 1), false).unwrap();
        let task = world.nodes[&node].active_tasks[0];
        (world, node, task)
    }

    fn deliver_twigs(world: &mut World, node: NodeId, task: TaskId, count: usize) {
        for _ in 0..count {
            let twig = world
                .create_item(
                    "Twig",
                    None,
                    None,
                    ItemLocation::Node {
                        node,
                        slot: NodeSlot::Input,
                    },
                )
                .unwrap();
            world.reservations.tag(twig, task);
        }
    }

    #[test]
    fn test_no_progress_without_materials() {
        let (mut world, node, task) = site();
        deliver_twigs(&mut world, node, task, 2);

        let result = apply_construction_work(&mut world, task, 1.0).unwrap();
        assert_eq!(result, ContributionResult::MaterialsMissing);
        assert_eq!(world.nodes[&node].construction_progress, 0.0);
    }

    #[test]
    fn test_construction_completion_transition() {
        let (mut world, node, task) = site();
        deliver_twigs(&mut world, node, task, 3);
        world.current_tick = 150;

        let result = apply_construction_work(&mut world, task, 6.0).unwrap();
        assert!(matches!(result, ContributionResult::InProgress { .. }));
        assert_eq!(world.nodes[&node].state, NodeState::UnderConstruction);

        let result = apply_construction_work(&mut world, task, 4.0).unwrap();
        assert!(
            matches!(result, ContributionResult::Completed { contributed } if (contributed - 4.0).abs() < 0.01)
        );
        assert_eq!(world.nodes[&node].state, NodeState::Complete);
        assert_eq!(world.nodes[&node].completed_tick, Some(150));
        // Materials are used up
        assert_eq!(world.items.count_kind("Twig"), 0);
        assert_eq!(world.ledger.expected_live("Twig"), 0);
    }

    #[test]
    fn test_apply_construction_already_complete() {
        let (mut world, node, task) = site();
        world.nodes.get_mut(&node).unwrap().state = NodeState::Complete;
        let result = apply_construction_work(&mut world, task, 10.0).unwrap();
        assert_eq!(result, ContributionResult::AlreadyComplete);
    }
}
