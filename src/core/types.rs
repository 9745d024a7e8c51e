//! Shared value types used across the scheduler.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Stable authored identifier of a task inside an ability definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskKey(pub u32);

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Opaque handle to a host-owned entity (arena index plus generation).
///
/// The scheduler never dereferences these itself; liveness and positions
/// are resolved through [`crate::core::World`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityHandle {
    /// Slot index in the host arena.
    pub index: u32,
    /// Generation of the slot when the handle was issued.
    pub generation: u32,
}

impl EntityHandle {
    /// Create a handle from raw parts.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Minimal 3D vector for locations handed to queries and stored on contexts.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl Vec3 {
    /// Origin.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    /// Construct a vector.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Squared euclidean distance to `other`.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx.mul_add(dx, dy.mul_add(dy, dz * dz))
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        self.distance_squared(other).sqrt()
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Execution-side tag deciding which side runs a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Realm {
    /// Runs only where a local client simulates.
    #[default]
    Client,
    /// Runs only on an authoritative server.
    Server,
    /// Runs everywhere.
    ClientAndServer,
}

impl Realm {
    /// Whether a task in this realm may consume results of a task in `other`.
    #[must_use]
    pub fn is_compatible_with(self, other: Self) -> bool {
        self == other || self == Self::ClientAndServer || other == Self::ClientAndServer
    }

    /// Whether a task in this realm runs under the given net mode.
    #[must_use]
    pub const fn runs_on(self, mode: NetMode) -> bool {
        match mode {
            NetMode::Standalone | NetMode::ListenServer => true,
            NetMode::Client => matches!(self, Self::Client | Self::ClientAndServer),
            NetMode::DedicatedServer => matches!(self, Self::Server | Self::ClientAndServer),
        }
    }
}

/// Side a scheduler executes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetMode {
    /// Single process, no networking.
    #[default]
    Standalone,
    /// Remote client.
    Client,
    /// Server that also hosts a local player.
    ListenServer,
    /// Headless authoritative server.
    DedicatedServer,
}

/// Reason handed to `on_task_end` and surfaced when an ability ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskResult {
    /// Ran to completion.
    Successful,
    /// Cancelled before completion.
    Interrupted,
    /// Stacks decayed to zero.
    Decayed,
    /// Ended by a failed check.
    Failed,
    /// The active segment branched to another segment.
    BranchSegment,
    /// An across-segment task was stopped explicitly.
    StopAcross,
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Successful => "successful",
            Self::Interrupted => "interrupted",
            Self::Decayed => "decayed",
            Self::Failed => "failed",
            Self::BranchSegment => "branch_segment",
            Self::StopAcross => "stop_across",
        };
        f.write_str(name)
    }
}

/// Outcome of a single branch or channel condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionResult {
    /// Condition holds.
    Passed,
    /// Condition does not hold.
    Failed,
    /// Condition cannot be decided on this side.
    Ignored,
}

impl ConditionResult {
    /// Swap `Passed` and `Failed`, leaving `Ignored` untouched.
    #[must_use]
    pub const fn negated(self) -> Self {
        match self {
            Self::Passed => Self::Failed,
            Self::Failed => Self::Passed,
            Self::Ignored => Self::Ignored,
        }
    }

    /// Map a boolean check onto `Passed`/`Failed`.
    #[must_use]
    pub const fn from_bool(value: bool) -> Self {
        if value {
            Self::Passed
        } else {
            Self::Failed
        }
    }
}

/// Control signal returned by script event callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackResult {
    /// Keep going.
    #[default]
    Continue,
    /// The emitting task may finish now.
    Complete,
    /// The emitting task should ignore the reported entities from now on.
    IgnoreActors,
}

/// Result of trying to activate an ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartResult {
    /// A new instance is running.
    Success,
    /// Targeting found nothing but the ability requires a target.
    InvalidTarget,
    /// The custom script check refused activation.
    FailedCustomCheck,
    /// Async targeting is still running; the activation is parked.
    AsyncProcessing,
    /// The ability is cooling down for this owner.
    OnCooldown,
    /// An existing instance absorbed the activation as extra stacks.
    Stacked,
}

impl StartResult {
    /// Whether the activation produced or refreshed a live instance.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success | Self::Stacked)
    }
}

/// Entity a task reads its subject from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// The entity running the ability.
    #[default]
    SelfActor,
    /// The owner recorded on the context.
    Owner,
    /// The instigator recorded on the context.
    Instigator,
    /// Every entity in the context target list.
    TargetActor,
    /// The context target location.
    Location,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realm_compatibility_is_symmetric_for_shared_realm() {
        assert!(Realm::Client.is_compatible_with(Realm::ClientAndServer));
        assert!(Realm::ClientAndServer.is_compatible_with(Realm::Server));
        assert!(!Realm::Client.is_compatible_with(Realm::Server));
    }

    #[test]
    fn realm_net_mode_matrix() {
        assert!(Realm::Server.runs_on(NetMode::Standalone));
        assert!(Realm::Server.runs_on(NetMode::ListenServer));
        assert!(!Realm::Server.runs_on(NetMode::Client));
        assert!(!Realm::Client.runs_on(NetMode::DedicatedServer));
        assert!(Realm::ClientAndServer.runs_on(NetMode::DedicatedServer));
    }

    #[test]
    fn negation_leaves_ignored_alone() {
        assert_eq!(ConditionResult::Passed.negated(), ConditionResult::Failed);
        assert_eq!(ConditionResult::Failed.negated(), ConditionResult::Passed);
        assert_eq!(ConditionResult::Ignored.negated(), ConditionResult::Ignored);
    }

    #[test]
    fn task_result_display_matches_serde_names() {
        let all = [
            TaskResult::Successful,
            TaskResult::Interrupted,
            TaskResult::Decayed,
            TaskResult::Failed,
            TaskResult::BranchSegment,
            TaskResult::StopAcross,
        ];
        for result in all {
            let json = serde_json::to_string(&result).unwrap();
            assert_eq!(json, format!("\"{result}\""));
        }
        assert!(serde_json::from_str::<TaskResult>("\"branched\"").is_err());
    }
}
