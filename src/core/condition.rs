//! Branch and channel conditions.
//!
//! A condition reports `Passed`, `Failed` or `Ignored`. Negation swaps the
//! first two and leaves `Ignored` alone. [`evaluate`] folds a list with
//! short-circuiting:
//!
//! - **must pass all**: stops at the first `Failed`
//! - **any**: stops at the first `Passed`
//!
//! When nothing short-circuits, the last result stands (an empty list passes).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::context::AbilityContext;
use crate::core::error::ValidationError;
use crate::core::hooks::ScriptHooks;
use crate::core::types::{ConditionResult, NetMode, TargetType};
use crate::core::world::World;

/// Read-only inputs available to a condition.
#[derive(Clone, Copy)]
pub struct ConditionEnv<'a> {
    /// Context being evaluated.
    pub context: &'a AbilityContext,
    /// Host world.
    pub world: &'a dyn World,
    /// Ability hooks.
    pub hooks: &'a dyn ScriptHooks,
    /// Side the scheduler runs on.
    pub net_mode: NetMode,
}

impl fmt::Debug for ConditionEnv<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionEnv")
            .field("activation", &self.context.activation_id())
            .field("net_mode", &self.net_mode)
            .finish_non_exhaustive()
    }
}

/// A pluggable predicate.
pub trait Condition: Send + Sync + fmt::Debug {
    /// Stable kind string used by the registry.
    fn kind(&self) -> &'static str;

    /// Raw result, before negation.
    fn check(&self, env: &ConditionEnv<'_>) -> ConditionResult;

    /// Whether [`Condition::result`] flips the raw result.
    fn negate(&self) -> bool {
        false
    }

    /// Result with negation applied.
    fn result(&self, env: &ConditionEnv<'_>) -> ConditionResult {
        let raw = self.check(env);
        if self.negate() {
            raw.negated()
        } else {
            raw
        }
    }

    /// Whether a channel failure on a client must be reported to the server.
    fn requires_server_notification(&self) -> bool {
        false
    }

    /// Offline configuration checks.
    fn validate(&self, _hooks: &dyn ScriptHooks) -> Vec<ValidationError> {
        Vec::new()
    }
}

/// Fold `conditions` into one result.
#[must_use]
pub fn evaluate(
    conditions: &[Arc<dyn Condition>],
    env: &ConditionEnv<'_>,
    must_pass_all: bool,
) -> ConditionResult {
    let mut result = ConditionResult::Passed;
    for condition in conditions {
        result = condition.result(env);
        match (must_pass_all, result) {
            (true, ConditionResult::Failed) => return ConditionResult::Failed,
            (false, ConditionResult::Passed) => return ConditionResult::Passed,
            _ => {}
        }
    }
    result
}

/// Boolean form of [`evaluate`].
///
/// With `must_pass_all`, anything but `Failed` passes; otherwise only
/// `Passed` does.
#[must_use]
pub fn passes(
    conditions: &[Arc<dyn Condition>],
    env: &ConditionEnv<'_>,
    must_pass_all: bool,
) -> bool {
    let result = evaluate(conditions, env, must_pass_all);
    if must_pass_all {
        result != ConditionResult::Failed
    } else {
        result == ConditionResult::Passed
    }
}

fn invalid(kind: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidConditionData {
        kind: kind.to_string(),
        message: message.into(),
    }
}

/// Always passes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlwaysCondition {
    /// Flip the result.
    #[serde(default)]
    pub negate: bool,
}

impl Condition for AlwaysCondition {
    fn kind(&self) -> &'static str {
        "always"
    }

    fn check(&self, _env: &ConditionEnv<'_>) -> ConditionResult {
        ConditionResult::Passed
    }

    fn negate(&self) -> bool {
        self.negate
    }
}

/// Passes while the owner holds an input.
///
/// Ignored when the owner is not controlled on this side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputCondition {
    /// Input action name.
    pub input: String,
    /// Only accept presses younger than `time_limit`.
    pub must_be_recently_pressed: bool,
    /// Age limit in seconds for a recent press.
    pub time_limit: f32,
    /// Notify the server when this fails as a channel condition.
    pub notify_server: bool,
    /// Flip the result.
    pub negate: bool,
}

impl Condition for InputCondition {
    fn kind(&self) -> &'static str {
        "input"
    }

    fn check(&self, env: &ConditionEnv<'_>) -> ConditionResult {
        let Some(owner) = env.context.owner() else {
            return ConditionResult::Ignored;
        };
        if !env.world.is_locally_controlled(owner) {
            return ConditionResult::Ignored;
        }
        match env.world.input_pressed_for(owner, &self.input) {
            Some(held) if self.must_be_recently_pressed => {
                ConditionResult::from_bool(held <= self.time_limit)
            }
            Some(_) => ConditionResult::Passed,
            None => ConditionResult::Failed,
        }
    }

    fn negate(&self) -> bool {
        self.negate
    }

    fn requires_server_notification(&self) -> bool {
        self.notify_server
    }

    fn validate(&self, _hooks: &dyn ScriptHooks) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.input.is_empty() {
            errors.push(invalid(self.kind(), "input name is empty"));
        }
        if self.must_be_recently_pressed && self.time_limit <= 0.0 {
            errors.push(invalid(self.kind(), "time_limit must be positive"));
        }
        errors
    }
}

/// Delegates to [`ScriptHooks::check_custom_condition`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomCondition {
    /// Name passed to the hook.
    pub name: String,
    /// Flip the result.
    #[serde(default)]
    pub negate: bool,
}

impl Condition for CustomCondition {
    fn kind(&self) -> &'static str {
        "custom"
    }

    fn check(&self, env: &ConditionEnv<'_>) -> ConditionResult {
        env.hooks.check_custom_condition(env.context, &self.name)
    }

    fn negate(&self) -> bool {
        self.negate
    }

    fn validate(&self, hooks: &dyn ScriptHooks) -> Vec<ValidationError> {
        if hooks.supports_event(&self.name) {
            Vec::new()
        } else {
            vec![ValidationError::MissingHook {
                event: self.name.clone(),
            }]
        }
    }
}

/// Passes when at least `min_targets` live targets are recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetPresenceCondition {
    /// Minimum live targets.
    #[serde(default = "one")]
    pub min_targets: usize,
    /// Flip the result.
    #[serde(default)]
    pub negate: bool,
}

const fn one() -> usize {
    1
}

impl Default for TargetPresenceCondition {
    fn default() -> Self {
        Self {
            min_targets: 1,
            negate: false,
        }
    }
}

impl Condition for TargetPresenceCondition {
    fn kind(&self) -> &'static str {
        "target_presence"
    }

    fn check(&self, env: &ConditionEnv<'_>) -> ConditionResult {
        let alive = env
            .context
            .targets()
            .iter()
            .filter(|target| env.world.is_alive(**target))
            .count();
        ConditionResult::from_bool(alive >= self.min_targets)
    }

    fn negate(&self) -> bool {
        self.negate
    }
}

/// Passes when every selected entity carries a tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagCondition {
    /// Gameplay tag.
    pub tag: String,
    /// Entities to inspect.
    #[serde(default)]
    pub target: TargetType,
    /// Flip the result.
    #[serde(default)]
    pub negate: bool,
}

impl Condition for TagCondition {
    fn kind(&self) -> &'static str {
        "tag"
    }

    fn check(&self, env: &ConditionEnv<'_>) -> ConditionResult {
        let subjects = env.context.subjects(self.target);
        if subjects.is_empty() {
            return ConditionResult::Ignored;
        }
        ConditionResult::from_bool(
            subjects
                .iter()
                .all(|entity| env.world.has_tag(*entity, &self.tag)),
        )
    }

    fn negate(&self) -> bool {
        self.negate
    }

    fn validate(&self, _hooks: &dyn ScriptHooks) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.tag.is_empty() {
            errors.push(invalid(self.kind(), "tag is empty"));
        }
        if self.target == TargetType::Location {
            errors.push(invalid(self.kind(), "a location carries no tags"));
        }
        errors
    }
}

/// Passes when the first target (or target location) lies within range of
/// the entity running the ability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceCondition {
    /// Inclusive lower bound.
    #[serde(default)]
    pub min: f32,
    /// Inclusive upper bound.
    pub max: f32,
    /// Flip the result.
    #[serde(default)]
    pub negate: bool,
}

impl Condition for DistanceCondition {
    fn kind(&self) -> &'static str {
        "distance"
    }

    fn check(&self, env: &ConditionEnv<'_>) -> ConditionResult {
        let context = env.context;
        let origin = context
            .self_entity()
            .or_else(|| context.owner())
            .and_then(|entity| env.world.location(entity));
        let target = context
            .targets()
            .first()
            .and_then(|entity| env.world.location(*entity))
            .or_else(|| context.target_location());

        match (origin, target) {
            (Some(origin), Some(target)) => {
                let distance = origin.distance(target);
                ConditionResult::from_bool(distance >= self.min && distance <= self.max)
            }
            _ => ConditionResult::Ignored,
        }
    }

    fn negate(&self) -> bool {
        self.negate
    }

    fn validate(&self, _hooks: &dyn ScriptHooks) -> Vec<ValidationError> {
        if self.min < 0.0 || self.max < self.min {
            vec![invalid(self.kind(), "range must satisfy 0 <= min <= max")]
        } else {
            Vec::new()
        }
    }
}

/// Always fails; blocks a branch until removed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BlockCondition;

impl Condition for BlockCondition {
    fn kind(&self) -> &'static str {
        "block"
    }

    fn check(&self, _env: &ConditionEnv<'_>) -> ConditionResult {
        ConditionResult::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hooks::NoopHooks;
    use crate::core::world::NullWorld;

    #[derive(Debug)]
    struct Fixed(ConditionResult);

    impl Condition for Fixed {
        fn kind(&self) -> &'static str {
            "fixed"
        }

        fn check(&self, _env: &ConditionEnv<'_>) -> ConditionResult {
            self.0
        }
    }

    fn list(results: &[ConditionResult]) -> Vec<Arc<dyn Condition>> {
        results
            .iter()
            .map(|r| Arc::new(Fixed(*r)) as Arc<dyn Condition>)
            .collect()
    }

    fn env(context: &AbilityContext) -> ConditionEnv<'_> {
        ConditionEnv {
            context,
            world: &NullWorld,
            hooks: &NoopHooks,
            net_mode: NetMode::Standalone,
        }
    }

    #[test]
    fn empty_list_passes_both_ways() {
        let context = AbilityContext::new();
        assert!(passes(&[], &env(&context), true));
        assert!(passes(&[], &env(&context), false));
    }

    #[test]
    fn ignored_alone_only_passes_must_pass_all() {
        let context = AbilityContext::new();
        let conditions = list(&[ConditionResult::Ignored]);
        assert!(passes(&conditions, &env(&context), true));
        assert!(!passes(&conditions, &env(&context), false));
    }

    #[test]
    fn block_condition_negated_passes() {
        #[derive(Debug)]
        struct NegatedBlock;
        impl Condition for NegatedBlock {
            fn kind(&self) -> &'static str {
                "negated_block"
            }
            fn check(&self, env: &ConditionEnv<'_>) -> ConditionResult {
                BlockCondition.check(env)
            }
            fn negate(&self) -> bool {
                true
            }
        }
        let context = AbilityContext::new();
        assert_eq!(NegatedBlock.result(&env(&context)), ConditionResult::Passed);
    }
}
