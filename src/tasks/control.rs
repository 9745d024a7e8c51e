//! Flow-control tasks: delay, cancel and stopping across-segment tasks.

use serde::{Deserialize, Serialize};

use crate::core::definition::AbilityDefinition;
use crate::core::error::ValidationError;
use crate::core::task::{Task, TaskContext, TaskDesc};
use crate::core::types::{TaskKey, TaskResult};

/// Occupies its window and does nothing else.
///
/// Useful as a blocking placeholder or as a dependency anchor.
#[derive(Debug, Clone)]
pub struct DelayTask {
    desc: TaskDesc,
}

impl DelayTask {
    /// Delay over `desc`.
    #[must_use]
    pub const fn new(desc: TaskDesc) -> Self {
        Self { desc }
    }
}

impl Task for DelayTask {
    fn kind(&self) -> &'static str {
        "delay"
    }

    fn desc(&self) -> &TaskDesc {
        &self.desc
    }

    fn needs_tick(&self) -> bool {
        false
    }
}

const fn interrupted() -> TaskResult {
    TaskResult::Interrupted
}

/// Authored cancel settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAbilityParams {
    /// End reason.
    #[serde(default = "interrupted")]
    pub result: TaskResult,
}

impl Default for CancelAbilityParams {
    fn default() -> Self {
        Self { result: interrupted() }
    }
}

/// Ends the ability when it starts.
#[derive(Debug, Clone)]
pub struct CancelAbilityTask {
    desc: TaskDesc,
    params: CancelAbilityParams,
}

impl CancelAbilityTask {
    /// Cancel at `desc.start_time`.
    #[must_use]
    pub const fn new(desc: TaskDesc, params: CancelAbilityParams) -> Self {
        Self { desc, params }
    }
}

impl Task for CancelAbilityTask {
    fn kind(&self) -> &'static str {
        "cancel_ability"
    }

    fn desc(&self) -> &TaskDesc {
        &self.desc
    }

    fn is_single_frame(&self) -> bool {
        true
    }

    fn on_task_start(&self, task: &mut TaskContext<'_>) {
        task.cancel_ability(self.params.result);
    }
}

/// Authored stop settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopAcrossParams {
    /// Across-segment tasks to end; empty ends all of them.
    #[serde(default)]
    pub tasks: Vec<TaskKey>,
}

/// Ends across-segment tasks with `StopAcross`.
#[derive(Debug, Clone)]
pub struct StopAcrossTask {
    desc: TaskDesc,
    params: StopAcrossParams,
}

impl StopAcrossTask {
    /// Stop at `desc.start_time`.
    #[must_use]
    pub const fn new(desc: TaskDesc, params: StopAcrossParams) -> Self {
        Self { desc, params }
    }
}

impl Task for StopAcrossTask {
    fn kind(&self) -> &'static str {
        "stop_across"
    }

    fn desc(&self) -> &TaskDesc {
        &self.desc
    }

    fn is_single_frame(&self) -> bool {
        true
    }

    fn on_task_start(&self, task: &mut TaskContext<'_>) {
        task.stop_across(self.params.tasks.clone());
    }

    fn validate(&self, definition: &AbilityDefinition) -> Vec<ValidationError> {
        self.params
            .tasks
            .iter()
            .filter(|key| {
                definition
                    .task(**key)
                    .is_none_or(|slot| !slot.task().desc().across_segment)
            })
            .map(|key| ValidationError::InvalidTaskData {
                task: self.desc.id,
                kind: self.kind().to_string(),
                message: format!("{key} is not an across-segment task"),
            })
            .collect()
    }
}
