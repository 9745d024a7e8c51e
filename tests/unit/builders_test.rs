//! Tests for asset builders and registries

use std::sync::Arc;

use ability_timeline::builders::{
    build_definition, load_definition_file, AbilityAsset, ConditionRegistry, TaskRegistry,
};
use ability_timeline::core::{AbilityError, NoopHooks, TaskKey, TaskResult};
use ability_timeline::tasks::DelayTask;

const COMBO: &str = r#"{
    "name": "Combo",
    "cooldown": 1.5,
    "stacking": { "max": 3, "decay_time": 2.0 },
    "segments": [
        {
            "name": "Opener",
            "length": 1.0,
            "loop": { "start": 0.2, "end": 0.8, "max_iterations": 2 },
            "tasks": [
                { "kind": "delay", "id": 2, "start_time": 0.5, "end_time": 0.9 },
                { "kind": "delay", "id": 1, "start_time": 0.0, "end_time": 0.4 },
                {
                    "kind": "branch",
                    "id": 3,
                    "start_time": 0.9,
                    "end_time": 1.0,
                    "params": { "target": "Finisher" },
                    "conditions": [ { "kind": "always" } ]
                }
            ],
            "branches": [
                { "target": "Finisher", "conditions": [ { "kind": "always", "negate": true } ] }
            ]
        },
        {
            "name": "Finisher",
            "tasks": [
                { "kind": "delay", "id": 4, "start_time": 0.0, "end_time": 0.2, "dependencies": [4] }
            ]
        }
    ],
    "channel": { "conditions": [ { "kind": "target_presence", "params": { "min_targets": 1 } } ] }
}"#;

fn registries() -> (TaskRegistry, ConditionRegistry) {
    (TaskRegistry::with_builtins(), ConditionRegistry::with_builtins())
}

fn temp_asset(contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("ability-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_build_definition_from_json() {
    let (tasks, conditions) = registries();
    let asset = AbilityAsset::from_json_str(COMBO).unwrap();
    let definition = build_definition(&asset, &tasks, &conditions, Arc::new(NoopHooks)).unwrap();

    assert_eq!(definition.name(), "Combo");
    assert_eq!(definition.segments().len(), 2);
    assert_eq!(definition.segment_index("Finisher"), Some(1));
    assert!((definition.cooldown() - 1.5).abs() < f32::EPSILON);
    assert!(definition.is_stackable());
    assert_eq!(definition.stacking().initial, 1);

    let opener = &definition.segments()[0];
    assert!(opener.looping);
    assert_eq!(opener.loop_max_iterations, 2);
    let order: Vec<TaskKey> = opener.tasks().iter().map(|slot| slot.key()).collect();
    assert_eq!(order, vec![TaskKey(1), TaskKey(2), TaskKey(3)]);
    assert_eq!(opener.branches.len(), 1);
    assert!(opener.branches[0].conditions[0].negate());

    let finisher = &definition.segments()[1];
    assert!((finisher.length - ability_timeline::core::DEFAULT_SEGMENT_LENGTH).abs() < f32::EPSILON);
    assert!(finisher.task(TaskKey(4)).unwrap().dependencies().is_empty());

    let channel = definition.channel().unwrap();
    assert_eq!(channel.failure_result, TaskResult::Interrupted);
    assert!(channel.must_pass_all);
    assert_eq!(channel.conditions[0].kind(), "target_presence");
}

#[test]
fn test_unknown_kinds_are_errors() {
    let (tasks, conditions) = registries();
    let asset = AbilityAsset::from_json_str(
        r#"{ "name": "Odd", "segments": [ { "name": "Main", "tasks": [ { "kind": "teleport", "id": 1 } ] } ] }"#,
    )
    .unwrap();
    let err = build_definition(&asset, &tasks, &conditions, Arc::new(NoopHooks)).unwrap_err();
    assert!(matches!(err, AbilityError::UnknownTaskKind(ref kind) if kind == "teleport"));

    let asset = AbilityAsset::from_json_str(
        r#"{ "name": "Odd", "segments": [ { "name": "Main", "branches": [ { "target": "Main", "conditions": [ { "kind": "moon_phase" } ] } ] } ] }"#,
    )
    .unwrap();
    let err = build_definition(&asset, &tasks, &conditions, Arc::new(NoopHooks)).unwrap_err();
    assert!(matches!(err, AbilityError::UnknownConditionKind(ref kind) if kind == "moon_phase"));
}

#[test]
fn test_registered_kind_is_used() {
    let (mut tasks, conditions) = registries();
    assert!(!tasks.contains("pause"));
    tasks.register("pause", |spec| Ok(Arc::new(DelayTask::new(spec.desc))));
    assert!(tasks.contains("pause"));

    let asset = AbilityAsset::from_json_str(
        r#"{ "name": "Rest", "segments": [ { "name": "Main", "length": 1.0, "tasks": [ { "kind": "pause", "id": 7, "end_time": 1.0 } ] } ] }"#,
    )
    .unwrap();
    let definition = build_definition(&asset, &tasks, &conditions, Arc::new(NoopHooks)).unwrap();
    assert_eq!(definition.task(TaskKey(7)).unwrap().task().kind(), "delay");
}

#[test]
fn test_load_definition_file() {
    let (tasks, conditions) = registries();
    let path = temp_asset(COMBO);
    let definition = load_definition_file(&path, &tasks, &conditions, Arc::new(NoopHooks)).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(definition.name(), "Combo");
}

#[test]
fn test_load_definition_file_reports_context() {
    let (tasks, conditions) = registries();
    let missing = std::env::temp_dir().join("ability-does-not-exist.json");
    let err = load_definition_file(&missing, &tasks, &conditions, Arc::new(NoopHooks)).unwrap_err();
    assert!(err.to_string().starts_with("reading ability asset"), "{err:#}");

    let path = temp_asset(r#"{ "name": "Bad", "segments": [ { "name": "Main", "length": -1.0 } ] }"#);
    let err = load_definition_file(&path, &tasks, &conditions, Arc::new(NoopHooks)).unwrap_err();
    std::fs::remove_file(&path).unwrap();
    assert!(err.to_string().starts_with("building ability `Bad`"), "{err:#}");
    assert!(matches!(
        err.downcast_ref::<AbilityError>(),
        Some(AbilityError::Validation { .. })
    ));
}
