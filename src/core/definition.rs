//! Immutable ability template.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::condition::Condition;
use crate::core::dependency::{build_dependency_list, repair_dependencies};
use crate::core::error::AbilityError;
use crate::core::hooks::{NoopHooks, ScriptHooks};
use crate::core::segment::{BranchData, Segment, TaskSlot};
use crate::core::targeting::Targeting;
use crate::core::types::{TaskKey, TaskResult};
use crate::core::validation::validate_definition;

/// Length of the segment synthesized for a definition without segments.
pub const DEFAULT_SEGMENT_LENGTH: f32 = 1.0;

/// Name of the synthesized segment.
pub const DEFAULT_SEGMENT_NAME: &str = "Default";

/// 32-bit FNV-1a hash used as the stable ability identity.
#[must_use]
pub fn name_hash(name: &str) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    name.bytes()
        .fold(OFFSET, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(PRIME))
}

/// Stack rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackingRules {
    /// Stacks a new activation starts with.
    pub initial: u32,
    /// Stacks added when an activation stacks onto a live instance.
    pub increment: u32,
    /// Stacks removed per restart with `decrement_and_restart_on_end`.
    pub decrement: u32,
    /// Stack cap; values above 1 enable stacking.
    pub max: u32,
    /// Seconds per decayed stack (0 = no decay).
    pub decay_time: f32,
    /// Restart the segment while stacks remain instead of ending.
    pub decrement_and_restart_on_end: bool,
}

impl Default for StackingRules {
    fn default() -> Self {
        Self {
            initial: 1,
            increment: 1,
            decrement: 1,
            max: 1,
            decay_time: 0.0,
            decrement_and_restart_on_end: false,
        }
    }
}

/// Channel rules checked every frame.
#[derive(Debug, Clone)]
pub struct ChannelRules {
    /// Conditions that must keep holding.
    pub conditions: Vec<Arc<dyn Condition>>,
    /// Require every condition instead of any.
    pub must_pass_all: bool,
    /// End reason when the check fails.
    pub failure_result: TaskResult,
}

impl Default for ChannelRules {
    fn default() -> Self {
        Self {
            conditions: Vec::new(),
            must_pass_all: true,
            failure_result: TaskResult::Interrupted,
        }
    }
}

/// Immutable, shared ability template.
///
/// Built through [`AbilityDefinitionBuilder`], which resolves dependencies
/// and refuses definitions that fail validation.
pub struct AbilityDefinition {
    name: String,
    name_hash: u32,
    segments: Vec<Segment>,
    entry_index: usize,
    entry_branches: Vec<BranchData>,
    stacking: StackingRules,
    cooldown: f32,
    play_rate: f32,
    channel: Option<ChannelRules>,
    targeting: Option<Arc<dyn Targeting>>,
    requires_target: bool,
    hooks: Arc<dyn ScriptHooks>,
    task_index: HashMap<TaskKey, (usize, usize)>,
}

impl fmt::Debug for AbilityDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbilityDefinition")
            .field("name", &self.name)
            .field("segments", &self.segments)
            .field("entry_index", &self.entry_index)
            .field("stacking", &self.stacking)
            .field("cooldown", &self.cooldown)
            .field("channel", &self.channel)
            .field("targeting", &self.targeting)
            .finish_non_exhaustive()
    }
}

impl AbilityDefinition {
    /// Start building a definition.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> AbilityDefinitionBuilder {
        AbilityDefinitionBuilder::new(name)
    }

    /// Authored name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stable identity hash of the name.
    #[must_use]
    pub const fn name_hash(&self) -> u32 {
        self.name_hash
    }

    /// Segments; never empty.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment by index.
    #[must_use]
    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// Index of the segment called `name`.
    #[must_use]
    pub fn segment_index(&self, name: &str) -> Option<usize> {
        self.segments.iter().position(|segment| segment.name == name)
    }

    /// Default entry segment.
    #[must_use]
    pub const fn entry_index(&self) -> usize {
        self.entry_index
    }

    /// Branches that may pick the entry segment.
    #[must_use]
    pub fn entry_branches(&self) -> &[BranchData] {
        &self.entry_branches
    }

    /// Stack rules.
    #[must_use]
    pub const fn stacking(&self) -> &StackingRules {
        &self.stacking
    }

    /// Whether activations stack onto a live instance.
    #[must_use]
    pub const fn is_stackable(&self) -> bool {
        self.stacking.max > 1
    }

    /// Authored cooldown in seconds.
    #[must_use]
    pub const fn cooldown(&self) -> f32 {
        self.cooldown
    }

    /// Time scale applied to every advance.
    #[must_use]
    pub const fn play_rate(&self) -> f32 {
        self.play_rate
    }

    /// Channel rules, for channeled abilities.
    #[must_use]
    pub const fn channel(&self) -> Option<&ChannelRules> {
        self.channel.as_ref()
    }

    /// Targeting method.
    #[must_use]
    pub fn targeting(&self) -> Option<&dyn Targeting> {
        self.targeting.as_deref()
    }

    /// Refuse activation without a target.
    #[must_use]
    pub const fn requires_target(&self) -> bool {
        self.requires_target
    }

    /// Script hooks.
    #[must_use]
    pub fn hooks(&self) -> &dyn ScriptHooks {
        self.hooks.as_ref()
    }

    /// Slot for `key` in any segment.
    #[must_use]
    pub fn task(&self, key: TaskKey) -> Option<&TaskSlot> {
        let &(segment, index) = self.task_index.get(&key)?;
        self.segments.get(segment)?.tasks().get(index)
    }

    /// Segment index owning `key`.
    #[must_use]
    pub fn segment_of(&self, key: TaskKey) -> Option<usize> {
        self.task_index.get(&key).map(|(segment, _)| *segment)
    }

    /// Every task in every segment.
    pub fn all_tasks(&self) -> impl Iterator<Item = &TaskSlot> {
        self.segments.iter().flat_map(|segment| segment.tasks().iter())
    }
}

/// Builder for [`AbilityDefinition`].
#[derive(Debug)]
pub struct AbilityDefinitionBuilder {
    name: String,
    segments: Vec<Segment>,
    entry_index: usize,
    entry_branches: Vec<BranchData>,
    stacking: StackingRules,
    cooldown: f32,
    play_rate: f32,
    channel: Option<ChannelRules>,
    targeting: Option<Arc<dyn Targeting>>,
    requires_target: bool,
    hooks: Option<Arc<dyn ScriptHooks>>,
}

impl AbilityDefinitionBuilder {
    /// Empty builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            segments: Vec::new(),
            entry_index: 0,
            entry_branches: Vec::new(),
            stacking: StackingRules::default(),
            cooldown: 0.0,
            play_rate: 1.0,
            channel: None,
            targeting: None,
            requires_target: false,
            hooks: None,
        }
    }

    /// Append a segment.
    #[must_use]
    pub fn segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    /// Default entry segment index.
    #[must_use]
    pub const fn entry_index(mut self, index: usize) -> Self {
        self.entry_index = index;
        self
    }

    /// Add an entry branch.
    #[must_use]
    pub fn entry_branch(mut self, branch: BranchData) -> Self {
        self.entry_branches.push(branch);
        self
    }

    /// Stack rules.
    #[must_use]
    pub fn stacking(mut self, stacking: StackingRules) -> Self {
        self.stacking = stacking;
        self
    }

    /// Cooldown in seconds.
    #[must_use]
    pub const fn cooldown(mut self, seconds: f32) -> Self {
        self.cooldown = seconds;
        self
    }

    /// Time scale.
    #[must_use]
    pub const fn play_rate(mut self, rate: f32) -> Self {
        self.play_rate = rate;
        self
    }

    /// Make the ability channeled.
    #[must_use]
    pub fn channel(mut self, channel: ChannelRules) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Targeting method.
    #[must_use]
    pub fn targeting(mut self, targeting: Arc<dyn Targeting>) -> Self {
        self.targeting = Some(targeting);
        self
    }

    /// Refuse activation without a target.
    #[must_use]
    pub const fn requires_target(mut self, required: bool) -> Self {
        self.requires_target = required;
        self
    }

    /// Script hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: Arc<dyn ScriptHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Resolve dependencies, validate and freeze.
    ///
    /// # Errors
    ///
    /// [`AbilityError::Validation`] with every problem found.
    pub fn build(self) -> Result<Arc<AbilityDefinition>, AbilityError> {
        let mut segments = self.segments;
        if segments.is_empty() {
            segments.push(Segment::new(DEFAULT_SEGMENT_NAME, DEFAULT_SEGMENT_LENGTH));
        }

        let repaired = repair_dependencies(&mut segments);
        for segment in &mut segments {
            build_dependency_list(segment);
        }

        let mut task_index = HashMap::new();
        for (segment_index, segment) in segments.iter().enumerate() {
            for (index, slot) in segment.tasks().iter().enumerate() {
                task_index.entry(slot.key()).or_insert((segment_index, index));
            }
        }

        let definition = AbilityDefinition {
            name_hash: name_hash(&self.name),
            name: self.name,
            segments,
            entry_index: self.entry_index,
            entry_branches: self.entry_branches,
            stacking: self.stacking,
            cooldown: self.cooldown,
            play_rate: self.play_rate,
            channel: self.channel,
            targeting: self.targeting,
            requires_target: self.requires_target,
            hooks: self.hooks.unwrap_or_else(|| Arc::new(NoopHooks)),
            task_index,
        };

        let report = validate_definition(&definition);
        if !report.is_valid() {
            return Err(AbilityError::Validation {
                name: definition.name,
                report,
            });
        }

        info!(
            ability = %definition.name,
            segments = definition.segments.len(),
            tasks = definition.task_index.len(),
            repaired_dependencies = repaired,
            "Ability definition built"
        );
        Ok(Arc::new(definition))
    }
}
