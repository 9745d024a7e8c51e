//! Script hook capability interface.
//!
//! Concrete abilities plug behaviour into the scheduler through
//! [`ScriptHooks`]. Every method defaults to a no-op so the core has no
//! dependency on any scripting runtime.

use std::fmt;

use crate::core::context::AbilityContext;
use crate::core::query::QueryHit;
use crate::core::types::{CallbackResult, ConditionResult, EntityHandle, TaskResult};

/// Callbacks the scheduler and built-in tasks call into.
pub trait ScriptHooks: Send + Sync + fmt::Debug {
    /// A new activation has started.
    fn on_ability_start(&self, _context: &mut AbilityContext) {}

    /// The activation ended; runs after every task has ended.
    fn on_ability_end(&self, _context: &mut AbilityContext, _result: TaskResult) {}

    /// The activation was interrupted; runs before `on_ability_end`.
    fn on_ability_interrupt(&self, _context: &mut AbilityContext) {}

    /// The active segment changed.
    fn on_segment_branched(&self, _context: &mut AbilityContext, _from: usize, _to: usize) {}

    /// The loop range was re-entered; `iteration` counts completed traversals.
    fn on_ability_iteration(&self, _context: &mut AbilityContext, _iteration: u32) {}

    /// Extra activation gate evaluated after targeting.
    fn custom_can_execute(&self, _context: &AbilityContext) -> bool {
        true
    }

    /// Named custom condition.
    fn check_custom_condition(&self, _context: &AbilityContext, _name: &str) -> ConditionResult {
        ConditionResult::Ignored
    }

    /// Damage for one target. Called from worker threads when the damage
    /// task fans out, so it must not rely on thread-local state.
    fn calculate_damage_for_entity(
        &self,
        _context: &AbilityContext,
        _target: EntityHandle,
        base_damage: f32,
    ) -> f32 {
        base_damage
    }

    /// Cooldown started when an activation succeeds.
    fn calculate_cooldown(&self, _context: &AbilityContext, authored: f32) -> f32 {
        authored
    }

    /// Stack cap for a new activation.
    fn calculate_max_stacks(&self, _context: &AbilityContext, authored: u32) -> u32 {
        authored
    }

    /// Damage computed by a damage task.
    fn on_damage_event(
        &self,
        _context: &mut AbilityContext,
        _event: &str,
        _damage: &[(EntityHandle, f32)],
    ) -> CallbackResult {
        CallbackResult::Continue
    }

    /// Hits reported by a query task.
    fn on_query_event(
        &self,
        _context: &mut AbilityContext,
        _event: &str,
        _hits: &[QueryHit],
    ) -> CallbackResult {
        CallbackResult::Continue
    }

    /// Named custom event.
    fn on_custom_event(&self, _context: &mut AbilityContext, _event: &str) -> CallbackResult {
        CallbackResult::Continue
    }

    /// Whether the named event or custom condition is implemented.
    ///
    /// Used by the validation pass only.
    fn supports_event(&self, _event: &str) -> bool {
        true
    }
}

/// Hooks that implement nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl ScriptHooks for NoopHooks {
    fn supports_event(&self, _event: &str) -> bool {
        false
    }
}
