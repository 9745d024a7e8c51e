//! Per-target damage, optionally fanned out across the rayon pool.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::context::AbilityContext;
use crate::core::definition::AbilityDefinition;
use crate::core::error::ValidationError;
use crate::core::hooks::ScriptHooks;
use crate::core::pool::{PoolManager, ScratchPad};
use crate::core::task::{Task, TaskContext, TaskDesc};
use crate::core::types::{CallbackResult, EntityHandle, TargetType};

const fn default_subject() -> TargetType {
    TargetType::TargetActor
}

/// Authored damage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageEventParams {
    /// Script event receiving the computed damage.
    pub event: String,
    /// Damage before `calculate_damage_for_entity`.
    #[serde(default)]
    pub base_damage: f32,
    /// Entities receiving damage.
    #[serde(default = "default_subject")]
    pub subject: TargetType,
    /// Compute per-target damage in parallel when async work is enabled.
    #[serde(default)]
    pub use_async_calculate: bool,
    /// Deal damage again on every tick while active.
    #[serde(default)]
    pub repeat_each_tick: bool,
}

impl DamageEventParams {
    /// Sequential damage on the target list.
    #[must_use]
    pub fn new(event: impl Into<String>, base_damage: f32) -> Self {
        Self {
            event: event.into(),
            base_damage,
            subject: TargetType::TargetActor,
            use_async_calculate: false,
            repeat_each_tick: false,
        }
    }
}

/// Per-activation state of a [`DamageEventTask`].
#[derive(Debug, Default)]
pub struct DamageScratchPad {
    /// Base damage after the dynamic-property override.
    pub base_damage: Option<f32>,
    /// Entities the script asked to skip.
    pub ignored: Vec<EntityHandle>,
    /// The script reported the task complete.
    pub complete: bool,
}

impl ScratchPad for DamageScratchPad {
    fn reset(&mut self) {
        self.base_damage = None;
        self.ignored.clear();
        self.complete = false;
    }
}

/// Computes damage for every alive subject and reports it to the script.
///
/// Damage is dealt when the task starts, and on every tick with
/// `repeat_each_tick`, minus entities the script chose to ignore.
#[derive(Debug, Clone)]
pub struct DamageEventTask {
    desc: TaskDesc,
    params: DamageEventParams,
}

impl DamageEventTask {
    /// Damage task over `desc`.
    #[must_use]
    pub const fn new(desc: TaskDesc, params: DamageEventParams) -> Self {
        Self { desc, params }
    }

    fn deal(&self, task: &mut TaskContext<'_>) {
        let (base_damage, ignored) = task
            .scratch_pad::<DamageScratchPad>()
            .map_or((self.params.base_damage, Vec::new()), |pad| {
                (pad.base_damage.unwrap_or(self.params.base_damage), pad.ignored.clone())
            });

        let world = task.world();
        let subjects: Vec<EntityHandle> = task
            .context()
            .subjects(self.params.subject)
            .into_iter()
            .filter(|entity| world.is_alive(*entity) && !ignored.contains(entity))
            .collect();
        if subjects.is_empty() {
            if task.config().log_verbose {
                debug!(task = %self.desc.id, "No damage subjects");
            }
            return;
        }

        let hooks = task.hooks();
        let parallel = self.params.use_async_calculate && task.config().async_enabled;
        let damage = {
            let context = task.context();
            if parallel {
                compute_parallel(context, hooks, &subjects, base_damage)
            } else {
                subjects
                    .iter()
                    .map(|entity| (*entity, hooks.calculate_damage_for_entity(context, *entity, base_damage)))
                    .collect()
            }
        };
        debug!(
            task = %self.desc.id,
            targets = damage.len(),
            parallel,
            "Damage computed"
        );

        match hooks.on_damage_event(task.context_mut(), &self.params.event, &damage) {
            CallbackResult::Continue => {}
            CallbackResult::Complete => {
                if let Some(pad) = task.scratch_pad_mut::<DamageScratchPad>() {
                    pad.complete = true;
                }
            }
            CallbackResult::IgnoreActors => {
                if let Some(pad) = task.scratch_pad_mut::<DamageScratchPad>() {
                    pad.ignored.extend(subjects);
                }
            }
        }
    }
}

/// One calculation per subject on the rayon pool, joined in subject order.
fn compute_parallel(
    context: &AbilityContext,
    hooks: &dyn ScriptHooks,
    subjects: &[EntityHandle],
    base_damage: f32,
) -> Vec<(EntityHandle, f32)> {
    subjects
        .par_iter()
        .map(|entity| (*entity, hooks.calculate_damage_for_entity(context, *entity, base_damage)))
        .collect()
}

impl Task for DamageEventTask {
    fn kind(&self) -> &'static str {
        "damage_event"
    }

    fn desc(&self) -> &TaskDesc {
        &self.desc
    }

    fn needs_tick(&self) -> bool {
        self.params.repeat_each_tick
    }

    fn uses_target_actors(&self) -> bool {
        self.params.subject == TargetType::TargetActor
    }

    fn is_done(&self, context: &AbilityContext) -> bool {
        context.current_time() >= self.end_time()
            || context
                .scratch_pad::<DamageScratchPad>(self.key())
                .is_some_and(|pad| pad.complete)
    }

    fn create_scratch_pad(&self, pools: &PoolManager) -> Option<Box<dyn ScratchPad>> {
        Some(pools.acquire_scratch_pad::<DamageScratchPad>())
    }

    fn bind_dynamic_delegates(&self, task: &mut TaskContext<'_>) {
        let Some(parameter) = &self.desc.dynamic_property_id else {
            return;
        };
        let Some(value) = task.context().find_float_parameter(parameter) else {
            return;
        };
        if let Some(pad) = task.scratch_pad_mut::<DamageScratchPad>() {
            pad.base_damage = Some(value);
        }
    }

    fn on_task_start(&self, task: &mut TaskContext<'_>) {
        self.deal(task);
    }

    fn on_task_tick(&self, task: &mut TaskContext<'_>, _delta: f32) {
        self.deal(task);
    }

    fn validate(&self, definition: &AbilityDefinition) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if !definition.hooks().supports_event(&self.params.event) {
            errors.push(ValidationError::MissingHook {
                event: self.params.event.clone(),
            });
        }
        if self.params.subject == TargetType::Location {
            errors.push(ValidationError::InvalidTaskData {
                task: self.desc.id,
                kind: self.kind().to_string(),
                message: "damage needs entity subjects, not a location".to_string(),
            });
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct DoubleHooks;

    impl ScriptHooks for DoubleHooks {
        fn calculate_damage_for_entity(
            &self,
            _context: &AbilityContext,
            target: EntityHandle,
            base_damage: f32,
        ) -> f32 {
            base_damage * (target.index as f32 + 1.0)
        }
    }

    #[test]
    fn parallel_damage_keeps_subject_order() {
        let context = AbilityContext::new();
        let subjects: Vec<EntityHandle> = (0..64).map(|index| EntityHandle::new(index, 0)).collect();
        let damage = compute_parallel(&context, &DoubleHooks, &subjects, 2.0);
        assert_eq!(damage.len(), 64);
        for (index, (entity, amount)) in damage.iter().enumerate() {
            assert_eq!(entity.index as usize, index);
            assert!((amount - 2.0 * (index as f32 + 1.0)).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn scratch_pad_reset_forgets_override() {
        let mut pad = DamageScratchPad {
            base_damage: Some(9.0),
            ignored: vec![EntityHandle::new(1, 0)],
            complete: true,
        };
        pad.reset();
        assert!(pad.base_damage.is_none());
        assert!(pad.ignored.is_empty());
        assert!(!pad.complete);
    }
}
