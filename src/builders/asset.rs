//! Authored JSON asset and its conversion into a validated definition.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::builders::registry::{ConditionRegistry, TaskRegistry};
use crate::core::condition::Condition;
use crate::core::definition::{AbilityDefinition, ChannelRules, StackingRules};
use crate::core::error::{AbilityError, AppResult};
use crate::core::hooks::ScriptHooks;
use crate::core::segment::{BranchData, Segment};
use crate::core::targeting::QueryTargeting;
use crate::core::task::TaskDesc;
use crate::core::types::TaskResult;

const fn default_true() -> bool {
    true
}

const fn default_length() -> f32 {
    crate::core::definition::DEFAULT_SEGMENT_LENGTH
}

const fn default_play_rate() -> f32 {
    1.0
}

const fn default_failure() -> TaskResult {
    TaskResult::Interrupted
}

/// Condition reference: a registered kind plus its params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionAsset {
    /// Registered condition kind.
    pub kind: String,
    /// Flip `Passed` and `Failed`.
    #[serde(default)]
    pub negate: bool,
    /// Kind-specific params.
    #[serde(default)]
    pub params: Value,
}

/// Outgoing branch of a segment, or an entry branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchAsset {
    /// Destination segment name.
    pub target: String,
    /// Gating conditions.
    #[serde(default)]
    pub conditions: Vec<ConditionAsset>,
    /// Require every condition instead of any.
    #[serde(default = "default_true")]
    pub must_pass_all: bool,
    /// Keep targets across the branch.
    #[serde(default = "default_true")]
    pub copy_targets: bool,
}

/// A task reference: kind, scheduling data and params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAsset {
    /// Registered task kind.
    pub kind: String,
    /// Scheduling data, flattened into the task object.
    #[serde(flatten)]
    pub desc: TaskDesc,
    /// Kind-specific params.
    #[serde(default)]
    pub params: Value,
    /// Conditions for kinds that take them.
    #[serde(default)]
    pub conditions: Vec<ConditionAsset>,
}

/// Loop range of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopAsset {
    /// Range start.
    pub start: f32,
    /// Range end.
    pub end: f32,
    /// Traversals (0 = infinite).
    #[serde(default)]
    pub max_iterations: u32,
}

/// One authored segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentAsset {
    /// Unique name.
    pub name: String,
    /// Length in seconds.
    #[serde(default = "default_length")]
    pub length: f32,
    /// Loop range, if the segment loops.
    #[serde(default, rename = "loop")]
    pub looping: Option<LoopAsset>,
    /// Wait for every task before completing.
    #[serde(default = "default_true")]
    pub finish_all_tasks: bool,
    /// Re-run targeting when branched into.
    #[serde(default)]
    pub retarget: bool,
    /// Tasks in any order; sorted on load.
    #[serde(default)]
    pub tasks: Vec<TaskAsset>,
    /// Outgoing branches in priority order.
    #[serde(default)]
    pub branches: Vec<BranchAsset>,
}

/// Channel checks of a channeled ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAsset {
    /// Conditions that must keep holding.
    #[serde(default)]
    pub conditions: Vec<ConditionAsset>,
    /// Require every condition instead of any.
    #[serde(default = "default_true")]
    pub must_pass_all: bool,
    /// End reason on failure.
    #[serde(default = "default_failure")]
    pub failure_result: TaskResult,
}

/// Whole authored ability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityAsset {
    /// Ability name; hashed for identity.
    pub name: String,
    /// Segments in index order.
    #[serde(default)]
    pub segments: Vec<SegmentAsset>,
    /// Segment entered when no entry branch passes.
    #[serde(default)]
    pub entry_index: usize,
    /// Branches evaluated at activation to pick the first segment.
    #[serde(default)]
    pub entry_branches: Vec<BranchAsset>,
    /// Stacking rules.
    #[serde(default)]
    pub stacking: StackingRules,
    /// Cooldown in seconds.
    #[serde(default)]
    pub cooldown: f32,
    /// Time scale.
    #[serde(default = "default_play_rate")]
    pub play_rate: f32,
    /// Channel checks.
    #[serde(default)]
    pub channel: Option<ChannelAsset>,
    /// Activation targeting.
    #[serde(default)]
    pub targeting: Option<QueryTargeting>,
    /// Refuse activation without targets.
    #[serde(default)]
    pub requires_target: bool,
}

impl AbilityAsset {
    /// Parse an asset from JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for malformed input.
    pub fn from_json_str(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }
}

fn build_conditions(
    assets: &[ConditionAsset],
    conditions: &ConditionRegistry,
) -> Result<Vec<Arc<dyn Condition>>, AbilityError> {
    assets
        .iter()
        .map(|asset| conditions.build(&asset.kind, asset.negate, &asset.params))
        .collect()
}

fn build_branch(asset: &BranchAsset, conditions: &ConditionRegistry) -> Result<BranchData, AbilityError> {
    Ok(BranchData {
        target: asset.target.clone(),
        conditions: build_conditions(&asset.conditions, conditions)?,
        must_pass_all: asset.must_pass_all,
        copy_targets: asset.copy_targets,
    })
}

fn build_segment(
    asset: &SegmentAsset,
    tasks: &TaskRegistry,
    conditions: &ConditionRegistry,
) -> Result<Segment, AbilityError> {
    let mut segment = Segment::new(asset.name.clone(), asset.length).with_finish_all_tasks(asset.finish_all_tasks);
    if let Some(range) = asset.looping {
        segment = segment.with_loop(range.start, range.end, range.max_iterations);
    }
    if asset.retarget {
        segment = segment.with_retarget();
    }
    for task in &asset.tasks {
        let task_conditions = build_conditions(&task.conditions, conditions)?;
        segment.add_task(tasks.build(&task.kind, task.desc.clone(), &task.params, task_conditions)?);
    }
    for branch in &asset.branches {
        segment.branches.push(build_branch(branch, conditions)?);
    }
    Ok(segment)
}

/// Turn an asset into a validated definition.
///
/// # Errors
///
/// Unknown kinds, bad params, or [`AbilityError::Validation`].
pub fn build_definition(
    asset: &AbilityAsset,
    tasks: &TaskRegistry,
    conditions: &ConditionRegistry,
    hooks: Arc<dyn ScriptHooks>,
) -> Result<Arc<AbilityDefinition>, AbilityError> {
    let mut builder = AbilityDefinition::builder(asset.name.clone())
        .entry_index(asset.entry_index)
        .stacking(asset.stacking.clone())
        .cooldown(asset.cooldown)
        .play_rate(asset.play_rate)
        .requires_target(asset.requires_target)
        .hooks(hooks);

    for segment in &asset.segments {
        builder = builder.segment(build_segment(segment, tasks, conditions)?);
    }
    for branch in &asset.entry_branches {
        builder = builder.entry_branch(build_branch(branch, conditions)?);
    }
    if let Some(channel) = &asset.channel {
        builder = builder.channel(ChannelRules {
            conditions: build_conditions(&channel.conditions, conditions)?,
            must_pass_all: channel.must_pass_all,
            failure_result: channel.failure_result,
        });
    }
    if let Some(targeting) = &asset.targeting {
        builder = builder.targeting(Arc::new(targeting.clone()));
    }
    builder.build()
}

/// Read, parse and build an ability asset file.
///
/// # Errors
///
/// Any I/O, parse or build failure, with the file path attached.
pub fn load_definition_file(
    path: impl AsRef<Path>,
    tasks: &TaskRegistry,
    conditions: &ConditionRegistry,
    hooks: Arc<dyn ScriptHooks>,
) -> AppResult<Arc<AbilityDefinition>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading ability asset {}", path.display()))?;
    let asset = AbilityAsset::from_json_str(&raw)
        .with_context(|| format!("parsing ability asset {}", path.display()))?;
    let definition = build_definition(&asset, tasks, conditions, hooks)
        .with_context(|| format!("building ability `{}` from {}", asset.name, path.display()))?;
    info!(ability = %definition.name(), path = %path.display(), "Loaded ability asset");
    Ok(definition)
}
