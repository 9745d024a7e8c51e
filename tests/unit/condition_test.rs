//! Tests for condition evaluation

use std::sync::Arc;

use ability_timeline::core::{
    evaluate, passes, AbilityContext, Condition, ConditionEnv, ConditionResult, DistanceCondition,
    EntityHandle, NetMode, NoopHooks, NullWorld, TargetPresenceCondition, Vec3, World,
};
use proptest::prelude::*;

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

/// Entities 1..=3 stand on the x axis at x = index.
#[derive(Debug)]
struct LineWorld;

impl World for LineWorld {
    fn is_alive(&self, entity: EntityHandle) -> bool {
        entity.index != 3
    }

    fn location(&self, entity: EntityHandle) -> Option<Vec3> {
        (1..=3)
            .contains(&entity.index)
            .then(|| Vec3::new(entity.index as f32, 0.0, 0.0))
    }
}

fn env<'a>(context: &'a AbilityContext, world: &'a dyn World) -> ConditionEnv<'a> {
    ConditionEnv {
        context,
        world,
        hooks: &NoopHooks,
        net_mode: NetMode::Standalone,
    }
}

fn result_strategy() -> impl Strategy<Value = ConditionResult> {
    prop_oneof![
        Just(ConditionResult::Passed),
        Just(ConditionResult::Failed),
        Just(ConditionResult::Ignored),
    ]
}

fn conditions(results: &[ConditionResult]) -> Vec<Arc<dyn Condition>> {
    results
        .iter()
        .map(|result| Arc::new(Fixed(*result)) as Arc<dyn Condition>)
        .collect()
}

proptest! {
    #[test]
    fn test_must_pass_all_fails_iff_any_fails(results in prop::collection::vec(result_strategy(), 0..8)) {
        let context = AbilityContext::new();
        let outcome = evaluate(&conditions(&results), &env(&context, &NullWorld), true);
        let any_failed = results.contains(&ConditionResult::Failed);
        prop_assert_eq!(outcome == ConditionResult::Failed, any_failed);
    }

    #[test]
    fn test_any_passes_iff_one_passes(results in prop::collection::vec(result_strategy(), 1..8)) {
        let context = AbilityContext::new();
        let passed = passes(&conditions(&results), &env(&context, &NullWorld), false);
        prop_assert_eq!(passed, results.contains(&ConditionResult::Passed));
    }

    #[test]
    fn test_negation_swaps_passed_and_failed(result in result_strategy()) {
        prop_assert_eq!(result.negated().negated(), result);
        prop_assert_eq!(result.negated() == ConditionResult::Ignored, result == ConditionResult::Ignored);
    }
}

#[test]
fn test_target_presence_counts_live_targets() {
    let mut context = AbilityContext::new();
    context.add_target(EntityHandle::new(1, 0));
    context.add_target(EntityHandle::new(3, 0));

    let one = TargetPresenceCondition::default();
    let two = TargetPresenceCondition {
        min_targets: 2,
        negate: false,
    };
    assert_eq!(one.result(&env(&context, &LineWorld)), ConditionResult::Passed);
    assert_eq!(two.result(&env(&context, &LineWorld)), ConditionResult::Failed);

    let negated = TargetPresenceCondition {
        min_targets: 2,
        negate: true,
    };
    assert_eq!(negated.result(&env(&context, &LineWorld)), ConditionResult::Passed);
}

#[test]
fn test_distance_uses_self_and_first_target() {
    let mut context = AbilityContext::new();
    context.set_self_entity(Some(EntityHandle::new(1, 0)));
    context.add_target(EntityHandle::new(3, 0));

    let close = DistanceCondition {
        min: 0.0,
        max: 1.5,
        negate: false,
    };
    let far = DistanceCondition {
        min: 1.5,
        max: 5.0,
        negate: false,
    };
    assert_eq!(close.result(&env(&context, &LineWorld)), ConditionResult::Failed);
    assert_eq!(far.result(&env(&context, &LineWorld)), ConditionResult::Passed);
}

#[test]
fn test_distance_without_locations_is_ignored() {
    let mut context = AbilityContext::new();
    context.set_self_entity(Some(EntityHandle::new(1, 0)));
    let condition = DistanceCondition {
        min: 0.0,
        max: 10.0,
        negate: true,
    };
    assert_eq!(
        condition.result(&env(&context, &NullWorld)),
        ConditionResult::Ignored
    );
    assert!(condition.validate(&NoopHooks).is_empty());
}
