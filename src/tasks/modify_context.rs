//! Context parameter and target-location writes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::task::{Task, TaskContext, TaskDesc};
use crate::core::types::{TargetType, Vec3};

/// Parameter writes applied when the task starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifyContextParams {
    /// Integer parameters.
    pub ints: BTreeMap<String, i64>,
    /// Float parameters.
    pub floats: BTreeMap<String, f32>,
    /// String parameters.
    pub strings: BTreeMap<String, String>,
    /// Vector parameters.
    pub vectors: BTreeMap<String, Vec3>,
    /// New target location.
    pub target_location: Option<Vec3>,
    /// Take the target location from this entity's position instead.
    pub location_from: Option<TargetType>,
}

/// Writes parameters and the target location into the context.
#[derive(Debug, Clone)]
pub struct ModifyContextTask {
    desc: TaskDesc,
    params: ModifyContextParams,
}

impl ModifyContextTask {
    /// Context writes at `desc.start_time`.
    #[must_use]
    pub const fn new(desc: TaskDesc, params: ModifyContextParams) -> Self {
        Self { desc, params }
    }
}

impl Task for ModifyContextTask {
    fn kind(&self) -> &'static str {
        "modify_context"
    }

    fn desc(&self) -> &TaskDesc {
        &self.desc
    }

    fn needs_tick(&self) -> bool {
        false
    }

    fn uses_target_actors(&self) -> bool {
        self.params.location_from == Some(TargetType::TargetActor)
    }

    fn on_task_start(&self, task: &mut TaskContext<'_>) {
        let world = task.world();
        let location = match self.params.location_from {
            Some(source) => task
                .context()
                .subjects(source)
                .first()
                .and_then(|entity| world.location(*entity)),
            None => self.params.target_location,
        };

        let context = task.context_mut();
        for (name, value) in &self.params.ints {
            context.set_int_parameter(name.as_str(), *value);
        }
        for (name, value) in &self.params.floats {
            context.set_float_parameter(name.as_str(), *value);
        }
        for (name, value) in &self.params.strings {
            context.set_string_parameter(name.as_str(), value.as_str());
        }
        for (name, value) in &self.params.vectors {
            context.set_vector_parameter(name.as_str(), *value);
        }
        if location.is_some() {
            context.set_target_location(location);
        }
    }
}
