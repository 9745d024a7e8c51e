//! Single-frame named script event.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::definition::AbilityDefinition;
use crate::core::error::ValidationError;
use crate::core::task::{Task, TaskContext, TaskDesc};
use crate::core::types::{CallbackResult, TaskResult};

/// Authored event settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomEventParams {
    /// Event name handed to `on_custom_event`.
    pub event: String,
    /// End the ability when the script answers `Complete`.
    #[serde(default)]
    pub end_ability_on_complete: bool,
}

/// Fires `on_custom_event` once when it starts.
#[derive(Debug, Clone)]
pub struct CustomEventTask {
    desc: TaskDesc,
    params: CustomEventParams,
}

impl CustomEventTask {
    /// Custom event at `desc.start_time`.
    #[must_use]
    pub const fn new(desc: TaskDesc, params: CustomEventParams) -> Self {
        Self { desc, params }
    }

    /// Event name.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.params.event
    }
}

impl Task for CustomEventTask {
    fn kind(&self) -> &'static str {
        "custom_event"
    }

    fn desc(&self) -> &TaskDesc {
        &self.desc
    }

    fn is_single_frame(&self) -> bool {
        true
    }

    fn needs_tick(&self) -> bool {
        false
    }

    fn on_task_start(&self, task: &mut TaskContext<'_>) {
        let hooks = task.hooks();
        let answer = hooks.on_custom_event(task.context_mut(), &self.params.event);
        debug!(task = %self.desc.id, event = %self.params.event, ?answer, "Custom event fired");
        if answer == CallbackResult::Complete && self.params.end_ability_on_complete {
            task.cancel_ability(TaskResult::Successful);
        }
    }

    fn validate(&self, definition: &AbilityDefinition) -> Vec<ValidationError> {
        if definition.hooks().supports_event(&self.params.event) {
            Vec::new()
        } else {
            vec![ValidationError::MissingHook {
                event: self.params.event.clone(),
            }]
        }
    }
}
