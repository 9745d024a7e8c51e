//! Mid-segment branch driven by conditions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::condition::{passes, Condition};
use crate::core::definition::AbilityDefinition;
use crate::core::error::ValidationError;
use crate::core::pool::{PoolManager, ScratchPad};
use crate::core::task::{SegmentTarget, Task, TaskContext, TaskDesc};

const fn default_true() -> bool {
    true
}

/// Authored branch settings; conditions are attached separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchTaskParams {
    /// Destination segment name.
    pub target: String,
    /// Require every condition instead of any.
    #[serde(default = "default_true")]
    pub must_pass_all: bool,
    /// Keep the current targets across the branch.
    #[serde(default = "default_true")]
    pub copy_targets: bool,
    /// Re-run targeting after the branch.
    #[serde(default)]
    pub retarget: bool,
}

impl BranchTaskParams {
    /// Branch to `target`, keeping targets.
    #[must_use]
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            must_pass_all: true,
            copy_targets: true,
            retarget: false,
        }
    }
}

/// Per-activation state of a [`BranchTask`].
#[derive(Debug, Default)]
pub struct BranchScratchPad {
    /// A branch was already queued.
    pub fired: bool,
}

impl ScratchPad for BranchScratchPad {
    fn reset(&mut self) {
        self.fired = false;
    }
}

/// Checks its conditions on start and every tick; queues one branch once they pass.
#[derive(Debug, Clone)]
pub struct BranchTask {
    desc: TaskDesc,
    params: BranchTaskParams,
    conditions: Vec<Arc<dyn Condition>>,
}

impl BranchTask {
    /// Branch task with no conditions (always branches).
    #[must_use]
    pub const fn new(desc: TaskDesc, params: BranchTaskParams) -> Self {
        Self {
            desc,
            params,
            conditions: Vec::new(),
        }
    }

    /// Add a condition.
    #[must_use]
    pub fn with_condition(mut self, condition: Arc<dyn Condition>) -> Self {
        self.conditions.push(condition);
        self
    }

    fn try_branch(&self, task: &mut TaskContext<'_>) {
        if task.scratch_pad::<BranchScratchPad>().is_some_and(|pad| pad.fired) {
            return;
        }
        if !passes(&self.conditions, &task.condition_env(), self.params.must_pass_all) {
            return;
        }
        if let Some(pad) = task.scratch_pad_mut::<BranchScratchPad>() {
            pad.fired = true;
        }
        debug!(task = %self.desc.id, target = %self.params.target, "Branch conditions passed");
        task.branch_to(
            SegmentTarget::Name(self.params.target.clone()),
            self.params.copy_targets,
            self.params.retarget,
        );
    }
}

impl Task for BranchTask {
    fn kind(&self) -> &'static str {
        "branch"
    }

    fn desc(&self) -> &TaskDesc {
        &self.desc
    }

    fn needs_tick(&self) -> bool {
        true
    }

    fn create_scratch_pad(&self, pools: &PoolManager) -> Option<Box<dyn ScratchPad>> {
        Some(pools.acquire_scratch_pad::<BranchScratchPad>())
    }

    fn on_task_start(&self, task: &mut TaskContext<'_>) {
        self.try_branch(task);
    }

    fn on_task_tick(&self, task: &mut TaskContext<'_>, _delta: f32) {
        self.try_branch(task);
    }

    fn validate(&self, definition: &AbilityDefinition) -> Vec<ValidationError> {
        let mut errors: Vec<ValidationError> = self
            .conditions
            .iter()
            .flat_map(|condition| condition.validate(definition.hooks()))
            .collect();
        if definition.segment_index(&self.params.target).is_none() {
            let segment = definition
                .segment_of(self.desc.id)
                .and_then(|index| definition.segment(index))
                .map_or_else(String::new, |segment| segment.name.clone());
            errors.push(ValidationError::UnknownBranchTarget {
                segment,
                target: self.params.target.clone(),
            });
        }
        errors
    }
}
