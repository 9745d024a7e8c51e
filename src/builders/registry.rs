//! Factory maps from stable kind strings to task and condition payloads.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::core::condition::{
    AlwaysCondition, BlockCondition, Condition, CustomCondition, DistanceCondition, InputCondition,
    TagCondition, TargetPresenceCondition,
};
use crate::core::error::AbilityError;
use crate::core::task::{Task, TaskDesc};
use crate::tasks::{
    BranchTask, BranchTaskParams, CancelAbilityParams, CancelAbilityTask, CustomEventParams,
    CustomEventTask, DamageEventParams, DamageEventTask, DelayTask, ModifyContextParams,
    ModifyContextTask, QueryTask, QueryTaskParams, StopAcrossParams, StopAcrossTask,
};

/// Inputs handed to a task factory.
#[derive(Debug)]
pub struct TaskSpec<'a> {
    /// Kind the factory was looked up by.
    pub kind: &'a str,
    /// Scheduling data.
    pub desc: TaskDesc,
    /// Kind-specific params (`{}` when absent).
    pub params: &'a Value,
    /// Conditions authored on the task.
    pub conditions: Vec<Arc<dyn Condition>>,
}

/// Builds a task from its spec.
pub type TaskFactory = Arc<dyn Fn(TaskSpec<'_>) -> Result<Arc<dyn Task>, AbilityError> + Send + Sync>;

/// Builds a condition from its params (with `negate` merged in).
pub type ConditionFactory =
    Arc<dyn Fn(&str, &Value) -> Result<Arc<dyn Condition>, AbilityError> + Send + Sync>;

/// Decode kind-specific params, treating `null` as an empty object.
///
/// # Errors
///
/// [`AbilityError::InvalidParams`] when the value does not fit `T`.
pub fn decode_params<T: DeserializeOwned>(kind: &str, params: &Value) -> Result<T, AbilityError> {
    let value = if params.is_null() {
        Value::Object(Map::new())
    } else {
        params.clone()
    };
    serde_json::from_value(value).map_err(|err| AbilityError::InvalidParams {
        kind: kind.to_string(),
        reason: err.to_string(),
    })
}

/// Task factories keyed by kind.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    factories: HashMap<String, TaskFactory>,
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl TaskRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every task in [`crate::tasks`].
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("delay", |spec| Ok(Arc::new(DelayTask::new(spec.desc))));
        registry.register("query", |spec| {
            let params: QueryTaskParams = decode_params(spec.kind, spec.params)?;
            Ok(Arc::new(QueryTask::new(spec.desc, params)))
        });
        registry.register("damage_event", |spec| {
            let params: DamageEventParams = decode_params(spec.kind, spec.params)?;
            Ok(Arc::new(DamageEventTask::new(spec.desc, params)))
        });
        registry.register("custom_event", |spec| {
            let params: CustomEventParams = decode_params(spec.kind, spec.params)?;
            Ok(Arc::new(CustomEventTask::new(spec.desc, params)))
        });
        registry.register("branch", |spec| {
            let params: BranchTaskParams = decode_params(spec.kind, spec.params)?;
            let task = spec
                .conditions
                .into_iter()
                .fold(BranchTask::new(spec.desc, params), BranchTask::with_condition);
            Ok(Arc::new(task))
        });
        registry.register("modify_context", |spec| {
            let params: ModifyContextParams = decode_params(spec.kind, spec.params)?;
            Ok(Arc::new(ModifyContextTask::new(spec.desc, params)))
        });
        registry.register("cancel_ability", |spec| {
            let params: CancelAbilityParams = decode_params(spec.kind, spec.params)?;
            Ok(Arc::new(CancelAbilityTask::new(spec.desc, params)))
        });
        registry.register("stop_across", |spec| {
            let params: StopAcrossParams = decode_params(spec.kind, spec.params)?;
            Ok(Arc::new(StopAcrossTask::new(spec.desc, params)))
        });
        registry
    }

    /// Register or replace the factory for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(TaskSpec<'_>) -> Result<Arc<dyn Task>, AbilityError> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    /// Whether `kind` is registered.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Build a task of `kind`.
    ///
    /// # Errors
    ///
    /// [`AbilityError::UnknownTaskKind`] or whatever the factory reports.
    pub fn build(
        &self,
        kind: &str,
        desc: TaskDesc,
        params: &Value,
        conditions: Vec<Arc<dyn Condition>>,
    ) -> Result<Arc<dyn Task>, AbilityError> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| AbilityError::UnknownTaskKind(kind.to_string()))?;
        factory(TaskSpec {
            kind,
            desc,
            params,
            conditions,
        })
    }
}

/// Condition factories keyed by kind.
#[derive(Clone, Default)]
pub struct ConditionRegistry {
    factories: HashMap<String, ConditionFactory>,
}

impl fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&String> = self.factories.keys().collect();
        kinds.sort_unstable();
        f.debug_struct("ConditionRegistry").field("kinds", &kinds).finish()
    }
}

fn decoded<T>(kind: &str, params: &Value) -> Result<Arc<dyn Condition>, AbilityError>
where
    T: Condition + DeserializeOwned + 'static,
{
    let condition: T = decode_params(kind, params)?;
    Ok(Arc::new(condition))
}

impl ConditionRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in condition.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("always", decoded::<AlwaysCondition>);
        registry.register("input", decoded::<InputCondition>);
        registry.register("custom", decoded::<CustomCondition>);
        registry.register("target_presence", decoded::<TargetPresenceCondition>);
        registry.register("tag", decoded::<TagCondition>);
        registry.register("distance", decoded::<DistanceCondition>);
        registry.register("block", |_, _| Ok(Arc::new(BlockCondition)));
        registry
    }

    /// Register or replace the factory for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&str, &Value) -> Result<Arc<dyn Condition>, AbilityError> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    /// Whether `kind` is registered.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Build a condition of `kind`; `negate` overrides the params flag.
    ///
    /// # Errors
    ///
    /// [`AbilityError::UnknownConditionKind`] or whatever the factory reports.
    pub fn build(&self, kind: &str, negate: bool, params: &Value) -> Result<Arc<dyn Condition>, AbilityError> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| AbilityError::UnknownConditionKind(kind.to_string()))?;
        if !negate {
            return factory(kind, params);
        }
        let mut merged = match params {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        merged.insert("negate".to_string(), Value::Bool(true));
        factory(kind, &Value::Object(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtins_cover_every_task_kind() {
        let registry = TaskRegistry::with_builtins();
        assert_eq!(
            registry.kinds(),
            vec![
                "branch",
                "cancel_ability",
                "custom_event",
                "damage_event",
                "delay",
                "modify_context",
                "query",
                "stop_across"
            ]
        );
    }

    #[test]
    fn negate_is_merged_into_params() {
        let registry = ConditionRegistry::with_builtins();
        let condition = registry
            .build("target_presence", true, &json!({ "min_targets": 2 }))
            .unwrap();
        assert!(condition.negate());
        assert_eq!(condition.kind(), "target_presence");
    }

    #[test]
    fn bad_params_are_reported_with_kind() {
        let registry = TaskRegistry::with_builtins();
        let err = registry
            .build("custom_event", TaskDesc::single_frame(1, 0.0), &json!({}), Vec::new())
            .unwrap_err();
        assert!(matches!(err, AbilityError::InvalidParams { ref kind, .. } if kind == "custom_event"));
    }
}
