//! Tests for error types

use ability_timeline::core::{AbilityError, QueryError, TaskKey, ValidationError, ValidationReport};

#[test]
fn test_query_error_display() {
    assert_eq!(QueryError::QueueFull.to_string(), "query queue is full");
    assert_eq!(QueryError::Shutdown.to_string(), "query bridge has been shut down");
    assert_eq!(QueryError::UnknownHandle.to_string(), "unknown query handle");
    assert_eq!(QueryError::Timeout.to_string(), "query wait timed out");
    assert_eq!(
        QueryError::Internal("worker panicked".into()).to_string(),
        "internal error: worker panicked"
    );
}

#[test]
fn test_query_error_converts_into_ability_error() {
    let err: AbilityError = QueryError::QueueFull.into();
    assert!(matches!(err, AbilityError::Query(QueryError::QueueFull)));
    assert_eq!(err.to_string(), "query queue is full");
}

#[test]
fn test_ability_error_display() {
    assert_eq!(
        AbilityError::UnknownSegment("Finisher".into()).to_string(),
        "unknown segment: Finisher"
    );
    assert_eq!(
        AbilityError::SegmentOutOfRange { index: 4, count: 2 }.to_string(),
        "segment index 4 out of range (2 segments)"
    );
    assert_eq!(
        AbilityError::UnknownTaskKind("teleport".into()).to_string(),
        "unknown task kind: teleport"
    );
}

#[test]
fn test_validation_error_counts_report() {
    let mut report = ValidationReport::new();
    report.push(ValidationError::DuplicateTask(TaskKey(3)));
    report.push(ValidationError::MissingChannelConditions);

    let err = AbilityError::Validation {
        name: "Slam".into(),
        report: report.clone(),
    };
    assert_eq!(err.to_string(), "ability `Slam` failed validation with 2 error(s)");
    assert_eq!(
        report.to_string(),
        "- duplicate task id task#3\n- channeled ability has no channel conditions"
    );
}
