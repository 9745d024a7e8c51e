//! Tests for dependency resolution and repair

use std::collections::HashSet;
use std::sync::Arc;

use ability_timeline::core::{
    build_dependency_list, find_cycle, AbilityDefinition, AbilityError, Realm, Segment, TaskDesc,
    TaskKey, ValidationError,
};
use ability_timeline::tasks::DelayTask;
use proptest::prelude::*;

fn delay(desc: TaskDesc) -> Arc<DelayTask> {
    Arc::new(DelayTask::new(desc))
}

fn realm_strategy() -> impl Strategy<Value = Realm> {
    prop_oneof![
        Just(Realm::Client),
        Just(Realm::Server),
        Just(Realm::ClientAndServer),
    ]
}

/// Up to six tasks whose declared dependencies may be stale: self
/// references, duplicates and ids outside the segment.
fn segment_strategy() -> impl Strategy<Value = Segment> {
    prop::collection::vec(
        (realm_strategy(), prop::collection::vec(prop_oneof![1u32..=6, Just(99u32)], 0..5)),
        1..=6,
    )
    .prop_map(|tasks| {
        let mut segment = Segment::new("Main", 5.0);
        for (index, (realm, dependencies)) in tasks.into_iter().enumerate() {
            let id = u32::try_from(index).unwrap_or(0) + 1;
            let desc = TaskDesc::new(id, 0.0, 1.0)
                .with_realm(realm)
                .with_dependencies(dependencies);
            segment.add_task(delay(desc));
        }
        segment
    })
}

fn resolved(segment: &Segment) -> Vec<Vec<TaskKey>> {
    segment
        .tasks()
        .iter()
        .map(|slot| slot.dependencies().to_vec())
        .collect()
}

proptest! {
    #[test]
    fn test_dependency_resolution_is_idempotent(mut segment in segment_strategy()) {
        build_dependency_list(&mut segment);
        let first = resolved(&segment);
        let first_dependents = segment.dependent_tasks().to_vec();

        build_dependency_list(&mut segment);
        prop_assert_eq!(resolved(&segment), first);
        prop_assert_eq!(segment.dependent_tasks(), first_dependents.as_slice());
    }

    #[test]
    fn test_resolved_dependencies_are_live(mut segment in segment_strategy()) {
        build_dependency_list(&mut segment);
        for slot in segment.tasks() {
            let mut seen = HashSet::new();
            for dependency in slot.dependencies() {
                prop_assert_ne!(*dependency, slot.key());
                prop_assert!(seen.insert(*dependency));
                let other = segment.task(*dependency);
                prop_assert!(other.is_some());
                let other_realm = other.map(|other| other.task().realm());
                prop_assert!(other_realm.is_some_and(|realm| slot.task().realm().is_compatible_with(realm)));
                prop_assert!(segment.dependent_tasks().contains(dependency));
            }
        }
    }
}

#[test]
fn test_copied_segment_dependency_is_repaired() {
    let original = Segment::new("Light", 2.0)
        .with_task(delay(TaskDesc::new(1, 0.0, 0.5)))
        .with_task(delay(TaskDesc::new(2, 0.5, 1.0).with_dependencies([1])));
    // A duplicated segment whose consumer still points at the original producer.
    let copy = Segment::new("Heavy", 2.0)
        .with_task(delay(TaskDesc::new(11, 0.0, 0.5)))
        .with_task(delay(TaskDesc::new(12, 0.5, 1.0).with_dependencies([1])));

    let definition = AbilityDefinition::builder("Combo")
        .segment(original)
        .segment(copy)
        .build()
        .unwrap();

    let heavy = &definition.segments()[1];
    assert_eq!(heavy.repairs().get(&TaskKey(1)), Some(&TaskKey(11)));
    assert_eq!(heavy.task(TaskKey(12)).unwrap().dependencies(), &[TaskKey(11)]);
    assert_eq!(heavy.dependent_tasks(), &[TaskKey(11)]);
}

#[test]
fn test_cycle_is_reported() {
    let segment = Segment::new("Main", 2.0)
        .with_task(delay(TaskDesc::new(1, 0.0, 0.5).with_dependencies([2])))
        .with_task(delay(TaskDesc::new(2, 0.0, 0.5).with_dependencies([1])));

    let mut resolved = segment.clone();
    build_dependency_list(&mut resolved);
    assert!(find_cycle(&resolved).is_some());

    let err = AbilityDefinition::builder("Loop")
        .segment(segment)
        .build()
        .unwrap_err();
    let AbilityError::Validation { report, .. } = err else {
        panic!("expected a validation error");
    };
    assert!(report
        .errors()
        .iter()
        .any(|error| matches!(error, ValidationError::DependencyCycle { segment, .. } if segment == "Main")));
}

#[test]
fn test_realm_mismatch_is_reported() {
    let segment = Segment::new("Main", 2.0)
        .with_task(delay(TaskDesc::new(1, 0.0, 0.5).with_realm(Realm::Server)))
        .with_task(delay(
            TaskDesc::new(2, 0.5, 1.0)
                .with_realm(Realm::Client)
                .with_dependencies([1]),
        ));
    let err = AbilityDefinition::builder("Split")
        .segment(segment)
        .build()
        .unwrap_err();
    let AbilityError::Validation { report, .. } = err else {
        panic!("expected a validation error");
    };
    assert!(report.contains(&ValidationError::RealmMismatch {
        segment: "Main".into(),
        task: TaskKey(2),
        dependency: TaskKey(1),
    }));
}
