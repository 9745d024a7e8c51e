//! Tests for the offline validation pass

use std::sync::Arc;

use ability_timeline::core::{
    validate_definition, AbilityDefinition, AbilityError, BranchData, ChannelRules, ScriptHooks,
    Segment, TaskDesc, TaskKey, ValidationError, ValidationReport,
};
use ability_timeline::tasks::{CustomEventParams, CustomEventTask, DelayTask};

/// Hooks that accept every custom event.
#[derive(Debug)]
struct ScriptedHooks;

impl ScriptHooks for ScriptedHooks {}

fn delay(desc: TaskDesc) -> Arc<DelayTask> {
    Arc::new(DelayTask::new(desc))
}

fn custom_event(id: u32, event: &str) -> Arc<CustomEventTask> {
    Arc::new(CustomEventTask::new(
        TaskDesc::single_frame(id, 0.0),
        CustomEventParams {
            event: event.into(),
            end_ability_on_complete: false,
        },
    ))
}

fn report_of(err: AbilityError) -> ValidationReport {
    match err {
        AbilityError::Validation { report, .. } => report,
        other => panic!("expected a validation error, got {other}"),
    }
}

#[test]
fn test_every_problem_is_listed() {
    let first = Segment::new("A", 1.0)
        .with_loop(0.8, 0.2, 0)
        .with_task(delay(TaskDesc::new(1, 0.5, 0.2)))
        .with_task(delay(TaskDesc::new(2, 1.5, 2.0)))
        .with_branch(BranchData::to("Nowhere"));
    let second = Segment::new("A", 0.0).with_task(custom_event(1, "Boom"));

    let err = AbilityDefinition::builder("Broken")
        .segment(first)
        .segment(second)
        .entry_index(5)
        .channel(ChannelRules::default())
        .build()
        .unwrap_err();
    let report = report_of(err);

    let expected = [
        ValidationError::InvalidLoopRange { segment: "A".into() },
        ValidationError::EndBeforeStart {
            segment: "A".into(),
            task: TaskKey(1),
        },
        ValidationError::StartsBeyondSegment {
            segment: "A".into(),
            task: TaskKey(2),
        },
        ValidationError::UnknownBranchTarget {
            segment: "A".into(),
            target: "Nowhere".into(),
        },
        ValidationError::DuplicateSegment("A".into()),
        ValidationError::NonPositiveLength { segment: "A".into() },
        ValidationError::DuplicateTask(TaskKey(1)),
        ValidationError::MissingHook { event: "Boom".into() },
        ValidationError::UnknownBranchTarget {
            segment: "<entry>".into(),
            target: "#5".into(),
        },
        ValidationError::MissingChannelConditions,
    ];
    for error in &expected {
        assert!(report.contains(error), "missing {error} in\n{report}");
    }
    assert_eq!(report.len(), expected.len(), "{report}");
}

#[test]
fn test_custom_event_accepted_with_scripted_hooks() {
    let definition = AbilityDefinition::builder("Shout")
        .segment(Segment::new("Main", 1.0).with_task(custom_event(1, "Boom")))
        .hooks(Arc::new(ScriptedHooks))
        .build()
        .unwrap();
    assert!(validate_definition(&definition).is_valid());
}

#[test]
fn test_single_frame_task_ignores_end_time() {
    let mut desc = TaskDesc::single_frame(1, 0.5);
    desc.end_time = 0.0;
    let definition = AbilityDefinition::builder("Blink")
        .segment(Segment::new("Main", 1.0).with_task(delay(desc)))
        .build();
    assert!(definition.is_ok());
}

#[test]
fn test_entry_branch_targets_are_checked() {
    let err = AbilityDefinition::builder("Opener")
        .segment(Segment::new("Main", 1.0))
        .entry_branch(BranchData::to("Missing"))
        .build()
        .unwrap_err();
    let report = report_of(err);
    assert_eq!(
        report.errors(),
        &[ValidationError::UnknownBranchTarget {
            segment: "<entry>".into(),
            target: "Missing".into(),
        }]
    );
}

#[test]
fn test_play_rate_must_be_positive_and_finite() {
    for rate in [-1.0, 0.0, f32::NAN, f32::INFINITY] {
        let err = AbilityDefinition::builder("Slowed")
            .segment(Segment::new("Main", 1.0))
            .play_rate(rate)
            .build()
            .unwrap_err();
        let report = report_of(err);
        assert_eq!(report.errors(), &[ValidationError::InvalidPlayRate], "{rate}");
    }

    let definition = AbilityDefinition::builder("Hasted")
        .segment(Segment::new("Main", 1.0))
        .play_rate(2.5)
        .build()
        .unwrap();
    assert!(validate_definition(&definition).is_valid());
}
