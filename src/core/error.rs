//! Error types for definition building, activation and query bridging.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::core::types::TaskKey;
use crate::core::validation::ValidationReport;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum AbilityError {
    /// No factory is registered for the task kind.
    #[error("unknown task kind: {0}")]
    UnknownTaskKind(String),
    /// No factory is registered for the condition kind.
    #[error("unknown condition kind: {0}")]
    UnknownConditionKind(String),
    /// Authored parameters could not be decoded for a kind.
    #[error("invalid parameters for `{kind}`: {reason}")]
    InvalidParams {
        /// Task or condition kind.
        kind: String,
        /// Decoder message.
        reason: String,
    },
    /// A segment name did not resolve.
    #[error("unknown segment: {0}")]
    UnknownSegment(String),
    /// A segment index was outside the definition.
    #[error("segment index {index} out of range ({count} segments)")]
    SegmentOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of segments in the definition.
        count: usize,
    },
    /// No live instance carries the activation id.
    #[error("no live ability instance for activation {0}")]
    UnknownActivation(Uuid),
    /// The definition failed the offline validation pass.
    #[error("ability `{name}` failed validation with {} error(s)", .report.len())]
    Validation {
        /// Ability name.
        name: String,
        /// Every problem found.
        report: ValidationReport,
    },
    /// Configuration values were rejected.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Query bridge failure.
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Configuration problems found by the validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The definition has a segment without a name.
    #[error("segment {index} has no name")]
    UnnamedSegment {
        /// Segment index.
        index: usize,
    },
    /// Two segments share a name.
    #[error("duplicate segment name `{0}`")]
    DuplicateSegment(String),
    /// Segment length must be positive.
    #[error("segment `{segment}` has non-positive length")]
    NonPositiveLength {
        /// Segment name.
        segment: String,
    },
    /// Loop range lies outside `[0, length]` or is inverted.
    #[error("segment `{segment}` loop range is invalid")]
    InvalidLoopRange {
        /// Segment name.
        segment: String,
    },
    /// Two tasks share an authored id.
    #[error("duplicate task id {0}")]
    DuplicateTask(TaskKey),
    /// End time precedes start time.
    #[error("{task} in `{segment}` ends before it starts")]
    EndBeforeStart {
        /// Segment name.
        segment: String,
        /// Task id.
        task: TaskKey,
    },
    /// Task starts after the segment is over.
    #[error("{task} in `{segment}` starts beyond the segment length")]
    StartsBeyondSegment {
        /// Segment name.
        segment: String,
        /// Task id.
        task: TaskKey,
    },
    /// Declared dependency is not part of the same segment.
    #[error("{task} in `{segment}` depends on {dependency} which is not in the segment")]
    DependencyOutsideSegment {
        /// Segment name.
        segment: String,
        /// Dependent task.
        task: TaskKey,
        /// Missing dependency.
        dependency: TaskKey,
    },
    /// Declared dependency runs in an incompatible realm.
    #[error("{task} in `{segment}` depends on {dependency} from an incompatible realm")]
    RealmMismatch {
        /// Segment name.
        segment: String,
        /// Dependent task.
        task: TaskKey,
        /// Dependency in the other realm.
        dependency: TaskKey,
    },
    /// Dependencies form a cycle; none of the tasks could ever start.
    #[error("dependency cycle in `{segment}` through {task}")]
    DependencyCycle {
        /// Segment name.
        segment: String,
        /// A task on the cycle.
        task: TaskKey,
    },
    /// A branch names a segment that does not exist.
    #[error("branch in `{segment}` targets unknown segment `{target}`")]
    UnknownBranchTarget {
        /// Segment owning the branch (or `<entry>`).
        segment: String,
        /// Unresolved name.
        target: String,
    },
    /// Play rate scales every frame delta and must be a positive finite number.
    #[error("play rate must be positive and finite")]
    InvalidPlayRate,
    /// Channeled ability with nothing to check.
    #[error("channeled ability has no channel conditions")]
    MissingChannelConditions,
    /// Task reads target actors that nothing provides.
    #[error("{task} reads target actors but the ability has no targeting and no target-producing dependency")]
    MissingTargeting {
        /// Task id.
        task: TaskKey,
    },
    /// A script hook required by a task or condition is not provided.
    #[error("script hook for event `{event}` is not implemented")]
    MissingHook {
        /// Event name.
        event: String,
    },
    /// Task-specific data problem.
    #[error("{task} ({kind}): {message}")]
    InvalidTaskData {
        /// Task id.
        task: TaskKey,
        /// Task kind.
        kind: String,
        /// Description.
        message: String,
    },
    /// Targeting configuration problem.
    #[error("targeting `{kind}`: {message}")]
    InvalidTargeting {
        /// Targeting kind.
        kind: String,
        /// Description.
        message: String,
    },
    /// Condition-specific data problem.
    #[error("condition `{kind}`: {message}")]
    InvalidConditionData {
        /// Condition kind.
        kind: String,
        /// Description.
        message: String,
    },
}

/// Errors that can occur when using a query bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The query queue is full; no more queries can be accepted.
    QueueFull,

    /// The bridge has been shut down.
    Shutdown,

    /// The handle is unknown or its result was already consumed.
    UnknownHandle,

    /// A blocking wait timed out.
    Timeout,

    /// Internal error (worker thread failure, runtime creation, etc.).
    Internal(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "query queue is full"),
            Self::Shutdown => write!(f, "query bridge has been shut down"),
            Self::UnknownHandle => write!(f, "unknown query handle"),
            Self::Timeout => write!(f, "query wait timed out"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for QueryError {}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
