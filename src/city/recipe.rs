//! Recipe catalog - static definitions of blocks and the tasks they run
//!
//! A block is a kind of production node (a workbench, a campfire). Each
//! block lists the task definitions it can run. Field tasks run on open
//! ground with no node at all (foraging, hunting).
//!
//! The catalog keeps a reverse index from output name to the producers that
//! make it, which is what the resolver consults when a needed item does not
//! exist anywhere nearby.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::error::{ColonyError, Result};
use crate::spatial::grid::TerrainKind;

/// Whether a requirement is consumed or merely used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Input,
    Tool,
}

/// One acceptable way to satisfy a requirement group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    pub name: String,
    #[serde(default = "one")]
    pub qty: u32,
}

fn one() -> u32 {
    1
}

impl Alternative {
    pub fn new(name: &str, qty: u32) -> Self {
        Self { name: name.into(), qty }
    }
}

/// A set of interchangeable items, listed best first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementGroup {
    pub alternatives: Vec<Alternative>,
    pub role: Role,
}

impl RequirementGroup {
    pub fn input(alternatives: Vec<Alternative>) -> Self {
        Self { alternatives, role: Role::Input }
    }

    pub fn tool(names: &[&str]) -> Self {
        Self {
            alternatives: names.iter().map(|n| Alternative::new(n, 1)).collect(),
            role: Role::Tool,
        }
    }

    /// Short label for logs and errors
    pub fn label(&self) -> String {
        self.alternatives
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join("|")
    }

    pub fn accepts(&self, kind: &str) -> bool {
        self.alternatives.iter().any(|a| a.name == kind)
    }
}

/// An item a task creates on completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDef {
    pub name: String,
    #[serde(default = "one")]
    pub qty: u32,
    /// Probability each unit actually drops (hunting, lottery drops)
    #[serde(default)]
    pub chance: Option<f32>,
    /// Starting durability when the output is a tool
    #[serde(default)]
    pub durability: Option<u32>,
}

impl OutputDef {
    pub fn new(name: &str, qty: u32) -> Self {
        Self {
            name: name.into(),
            qty,
            chance: None,
            durability: None,
        }
    }

    pub fn tool(name: &str, durability: u32) -> Self {
        Self {
            durability: Some(durability),
            ..Self::new(name, 1)
        }
    }

    pub fn with_chance(mut self, chance: f32) -> Self {
        self.chance = Some(chance);
        self
    }
}

/// Which tiles a worker may pick for worker-chosen work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRule {
    pub terrain: TerrainKind,
    /// Terrain the tile turns into once worked
    #[serde(default)]
    pub deplete_to: Option<TerrainKind>,
}

/// Where the work of a task happens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationPolicy {
    /// At the owning node's tile
    AtNode,
    /// Nearest matching tile the worker finds, re-chosen for every batch unit
    WorkerChosen(SiteRule),
    /// A tile given with the request
    UserChosen,
}

/// Left on a hot node past `window` ticks, an output turns into `into`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnRule {
    pub window: u32,
    pub into: String,
}

/// Static rule for one unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
    pub name: String,
    #[serde(default)]
    pub requirements: Vec<RequirementGroup>,
    #[serde(default)]
    pub outputs: Vec<OutputDef>,
    /// Work units needed per batch unit
    pub duration: u32,
    /// Accepts quantity > 1
    #[serde(default)]
    pub batch: bool,
    #[serde(default = "at_node")]
    pub location: LocationPolicy,
    /// Durability taken from each equipped tool per work step
    #[serde(default = "one")]
    pub tool_wear: u32,
    /// Worker only delivers inputs; the node's own tick does the work
    #[serde(default)]
    pub autonomous: bool,
    /// Delivered inputs stay in the node instead of being consumed (fuel)
    #[serde(default)]
    pub deposit_only: bool,
    #[serde(default)]
    pub burn: Option<BurnRule>,
    /// Item kind that must have been made at least once before this task is offered
    #[serde(default)]
    pub unlocked_by: Option<String>,
}

fn at_node() -> LocationPolicy {
    LocationPolicy::AtNode
}

impl TaskDef {
    pub fn new(name: &str, duration: u32) -> Self {
        Self {
            name: name.into(),
            requirements: Vec::new(),
            outputs: Vec::new(),
            duration,
            batch: false,
            location: LocationPolicy::AtNode,
            tool_wear: 1,
            autonomous: false,
            deposit_only: false,
            burn: None,
            unlocked_by: None,
        }
    }

    pub fn requires(mut self, group: RequirementGroup) -> Self {
        self.requirements.push(group);
        self
    }

    pub fn yields(mut self, output: OutputDef) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn batched(mut self) -> Self {
        self.batch = true;
        self
    }

    pub fn at(mut self, location: LocationPolicy) -> Self {
        self.location = location;
        self
    }

    pub fn produces(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o.name == name)
    }
}

/// Material and time cost of constructing a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCost {
    #[serde(default)]
    pub requirements: Vec<RequirementGroup>,
    pub duration: u32,
}

/// Heat behavior of fire blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireDef {
    /// Item kinds the fire will burn from its input slot
    pub fuel: Vec<String>,
    pub heat_per_fuel: f32,
    pub decay_per_tick: f32,
    /// Burn another fuel item once heat drops below this
    pub refuel_below: f32,
    pub max_heat: f32,
}

/// A kind of production node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<TaskDef>,
    #[serde(default)]
    pub build: Option<BuildCost>,
    #[serde(default)]
    pub fire: Option<FireDef>,
    /// Inventory capacity; falls back to the config default
    #[serde(default)]
    pub capacity: Option<usize>,
}

impl BlockDef {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tasks: Vec::new(),
            build: None,
            fire: None,
            capacity: None,
        }
    }

    pub fn task(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.iter().find(|t| t.name == name)
    }
}

/// Names one task definition: a block task, or a field task when `block` is None
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProducerRef {
    pub block: Option<String>,
    pub task: String,
}

impl ProducerRef {
    pub fn block(block: &str, task: &str) -> Self {
        Self {
            block: Some(block.into()),
            task: task.into(),
        }
    }

    pub fn field(task: &str) -> Self {
        Self {
            block: None,
            task: task.into(),
        }
    }
}

impl std::fmt::Display for ProducerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.block {
            Some(b) => write!(f, "{}/{}", b, self.task),
            None => write!(f, "field/{}", self.task),
        }
    }
}

/// Catalog of all blocks and field tasks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeCatalog {
    #[serde(default)]
    blocks: Vec<BlockDef>,
    #[serde(default)]
    field_tasks: Vec<TaskDef>,
    /// output name -> producers, in catalog order
    #[serde(skip)]
    by_output: AHashMap<String, Vec<ProducerRef>>,
}

impl PartialEq for RecipeCatalog {
    fn eq(&self, other: &Self) -> bool {
        self.blocks == other.blocks && self.field_tasks == other.field_tasks
    }
}

impl RecipeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stone-age starter catalog
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();

        catalog.add_field_task(
            TaskDef::new("Gather Twigs", 5)
                .yields(OutputDef::new("Twig", 1))
                .batched()
                .at(LocationPolicy::WorkerChosen(SiteRule {
                    terrain: TerrainKind::Forest,
                    deplete_to: Some(TerrainKind::Clearing),
                })),
        );
        catalog.add_field_task(
            TaskDef::new("Collect Deadwood", 8)
                .yields(OutputDef::new("Log", 1))
                .batched()
                .at(LocationPolicy::WorkerChosen(SiteRule {
                    terrain: TerrainKind::Forest,
                    deplete_to: Some(TerrainKind::Clearing),
                })),
        );
        catalog.add_field_task(
            TaskDef::new("Collect Flint", 8)
                .yields(OutputDef::new("Flint", 1))
                .batched()
                .at(LocationPolicy::WorkerChosen(SiteRule {
                    terrain: TerrainKind::Rock,
                    deplete_to: None,
                })),
        );
        catalog.add_field_task(
            TaskDef::new("Forage Berries", 6)
                .yields(OutputDef::new("Berries", 2))
                .batched()
                .at(LocationPolicy::WorkerChosen(SiteRule {
                    terrain: TerrainKind::Grass,
                    deplete_to: Some(TerrainKind::Dirt),
                })),
        );
        catalog.add_field_task(
            TaskDef::new("Hunt", 12)
                .requires(RequirementGroup::tool(&["Spear", "Flint Axe"]))
                .yields(OutputDef::new("Raw Meat", 1).with_chance(0.5))
                .batched()
                .at(LocationPolicy::WorkerChosen(SiteRule {
                    terrain: TerrainKind::Forest,
                    deplete_to: None,
                })),
        );

        let mut bench = BlockDef::new("Tool Bench", "Knapping and hafting stone tools");
        bench.build = Some(BuildCost {
            requirements: vec![RequirementGroup::input(vec![Alternative::new("Twig", 4)])],
            duration: 30,
        });
        bench.tasks.push(
            TaskDef::new("Flint Axe", 15)
                .requires(RequirementGroup::input(vec![Alternative::new("Flint", 1)]))
                .requires(RequirementGroup::input(vec![Alternative::new("Twig", 2)]))
                .yields(OutputDef::tool("Flint Axe", 20)),
        );
        let mut spear = TaskDef::new("Spear", 12)
            .requires(RequirementGroup::input(vec![
                Alternative::new("Short Stick", 1),
                Alternative::new("Twig", 3),
            ]))
            .requires(RequirementGroup::input(vec![Alternative::new("Flint", 1)]))
            .yields(OutputDef::tool("Spear", 15));
        spear.unlocked_by = Some("Flint Axe".into());
        bench.tasks.push(spear);
        catalog.add_block(bench);

        let mut sticks = BlockDef::new("Stick Maker", "Splits logs into sticks");
        sticks.build = Some(BuildCost {
            requirements: vec![RequirementGroup::input(vec![Alternative::new("Twig", 2)])],
            duration: 20,
        });
        sticks.tasks.push(
            TaskDef::new("Short Stick", 20)
                .requires(RequirementGroup::tool(&["Flint Axe"]))
                .requires(RequirementGroup::input(vec![Alternative::new("Log", 1)]))
                .yields(OutputDef::new("Short Stick", 1))
                .batched(),
        );
        catalog.add_block(sticks);

        let mut fire = BlockDef::new("Campfire", "Cooks food while it has fuel");
        fire.build = Some(BuildCost {
            requirements: vec![RequirementGroup::input(vec![Alternative::new("Twig", 3)])],
            duration: 10,
        });
        fire.fire = Some(FireDef {
            fuel: vec!["Log".into(), "Short Stick".into(), "Twig".into()],
            heat_per_fuel: 40.0,
            decay_per_tick: 1.0,
            refuel_below: 20.0,
            max_heat: 100.0,
        });
        let mut stoke = TaskDef::new("Add Fuel", 1).requires(RequirementGroup::input(vec![
            Alternative::new("Log", 1),
            Alternative::new("Short Stick", 2),
            Alternative::new("Twig", 4),
        ]));
        stoke.deposit_only = true;
        stoke.batch = true;
        fire.tasks.push(stoke);
        let mut roast = TaskDef::new("Roast Meat", 10)
            .requires(RequirementGroup::input(vec![Alternative::new("Raw Meat", 1)]))
            .yields(OutputDef::new("Cooked Meat", 1))
            .batched();
        roast.autonomous = true;
        roast.burn = Some(BurnRule {
            window: 30,
            into: "Burnt Meat".into(),
        });
        fire.tasks.push(roast);
        catalog.add_block(fire);

        catalog
    }

    /// Add a block definition and refresh the output index
    pub fn add_block(&mut self, block: BlockDef) {
        self.blocks.push(block);
        self.rebuild_index();
    }

    /// Add a node-less task definition and refresh the output index
    pub fn add_field_task(&mut self, task: TaskDef) {
        self.field_tasks.push(task);
        self.rebuild_index();
    }

    /// Rebuild the output -> producer index (after deserializing)
    pub fn rebuild_index(&mut self) {
        let mut index: AHashMap<String, Vec<ProducerRef>> = AHashMap::new();
        for block in &self.blocks {
            for task in &block.tasks {
                for output in &task.outputs {
                    index
                        .entry(output.name.clone())
                        .or_default()
                        .push(ProducerRef::block(&block.name, &task.name));
                }
            }
        }
        for task in &self.field_tasks {
            for output in &task.outputs {
                index
                    .entry(output.name.clone())
                    .or_default()
                    .push(ProducerRef::field(&task.name));
            }
        }
        self.by_output = index;
    }

    pub fn block(&self, name: &str) -> Option<&BlockDef> {
        self.blocks.iter().find(|b| b.name == name)
    }

    pub fn blocks(&self) -> &[BlockDef] {
        &self.blocks
    }

    pub fn field_tasks(&self) -> &[TaskDef] {
        &self.field_tasks
    }

    pub fn field_task(&self, name: &str) -> Option<&TaskDef> {
        self.field_tasks.iter().find(|t| t.name == name)
    }

    /// Look up the definition a producer names
    pub fn task(&self, producer: &ProducerRef) -> Result<&TaskDef> {
        let found = match &producer.block {
            Some(block) => self.block(block).and_then(|b| b.task(&producer.task)),
            None => self.field_task(&producer.task),
        };
        found.ok_or_else(|| ColonyError::MissingRecipeData(producer.to_string()))
    }

    /// Every producer whose outputs include `name`, in catalog order
    pub fn producers_of(&self, name: &str) -> &[ProducerRef] {
        self.by_output.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Load a catalog from a TOML file
    pub fn load_from_toml(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse a catalog from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut catalog: RecipeCatalog = toml::from_str(content)?;
        catalog.rebuild_index();
        Ok(catalog)
    }

    /// Offline check: positive durations, unique names, and no item whose
    /// production (through any producer and any alternative) depends on itself.
    pub fn validate(&self) -> Result<()> {
        let mut names = BTreeSet::new();
        for block in &self.blocks {
            if !names.insert(block.name.as_str()) {
                return Err(ColonyError::MissingRecipeData(format!(
                    "duplicate block name {}",
                    block.name
                )));
            }
            let mut task_names = BTreeSet::new();
            for task in &block.tasks {
                if !task_names.insert(task.name.as_str()) {
                    return Err(ColonyError::MissingRecipeData(format!(
                        "duplicate task {} in block {}",
                        task.name, block.name
                    )));
                }
                check_duration(task)?;
            }
            if let Some(build) = &block.build {
                if build.duration == 0 {
                    return Err(ColonyError::MissingRecipeData(format!(
                        "block {} has zero build duration",
                        block.name
                    )));
                }
            }
        }
        for task in &self.field_tasks {
            check_duration(task)?;
            if matches!(task.location, LocationPolicy::AtNode) {
                return Err(ColonyError::MissingRecipeData(format!(
                    "field task {} cannot run at a node",
                    task.name
                )));
            }
        }

        let mut done = BTreeSet::new();
        for name in self.by_output.keys() {
            let mut path = Vec::new();
            self.visit(name, &mut path, &mut done)?;
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        path: &mut Vec<&'a str>,
        done: &mut BTreeSet<&'a str>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        if path.contains(&name) {
            path.push(name);
            return Err(ColonyError::RecipeCycle(path.join(" -> ")));
        }
        path.push(name);
        for producer in self.producers_of(name) {
            let task = self.task(producer)?;
            for group in &task.requirements {
                for alt in &group.alternatives {
                    self.visit(&alt.name, path, done)?;
                }
            }
        }
        path.pop();
        done.insert(name);
        Ok(())
    }
}

fn check_duration(task: &TaskDef) -> Result<()> {
    if task.duration == 0 {
        return Err(ColonyError::MissingRecipeData(format!(
            "task {} has zero duration",
            task.name
        )));
    }
    Ok(())
}
