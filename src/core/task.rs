//! Task protocol.
//!
//! A task is a stateless, shared template with a time window. Everything it
//! mutates during an activation lives in the context or in its scratch pad.
//! The scheduler drives it through this order per activation:
//!
//! 1. `bind_dynamic_delegates` then `on_task_start` when the cursor reaches
//!    its start and every dependency has finished
//! 2. `on_task_tick` on later frames while `needs_tick`
//! 3. `poll_async` before any new start on each frame, for async-friendly tasks
//! 4. `on_task_end` exactly once, with the reason
//!
//! Tasks never call back into the scheduler directly; they queue a
//! [`TaskCommand`] that is applied once the current pass has finished.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::core::condition::ConditionEnv;
use crate::core::context::AbilityContext;
use crate::core::definition::AbilityDefinition;
use crate::core::error::ValidationError;
use crate::core::hooks::ScriptHooks;
use crate::core::pool::{PoolManager, ScratchPad};
use crate::core::query::QueryBridge;
use crate::core::services::Services;
use crate::core::types::{EntityHandle, Realm, TaskKey, TaskResult};
use crate::core::world::World;

const fn default_true() -> bool {
    true
}

const fn default_realm() -> Realm {
    Realm::ClientAndServer
}

/// Authored scheduling data shared by every task kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDesc {
    /// Stable id, unique within the definition.
    pub id: TaskKey,
    /// Segment-relative start in seconds.
    #[serde(default)]
    pub start_time: f32,
    /// Segment-relative end in seconds; ignored for single-frame tasks.
    #[serde(default)]
    pub end_time: f32,
    /// Side that runs the task.
    #[serde(default = "default_realm")]
    pub realm: Realm,
    /// Tasks in the same segment whose output this task consumes.
    #[serde(default)]
    pub dependencies: Vec<TaskKey>,
    /// Tie-break for equal start times (lower starts first).
    #[serde(default)]
    pub display_order: i32,
    /// Skip the task entirely.
    #[serde(default)]
    pub disabled: bool,
    /// End the task when the loop range restarts.
    #[serde(default = "default_true")]
    pub reset_for_iteration: bool,
    /// Start at most once per segment entry.
    #[serde(default)]
    pub once_during_iteration: bool,
    /// Keep running across segment branches.
    #[serde(default)]
    pub across_segment: bool,
    /// Start and end within the same frame.
    #[serde(default)]
    pub single_frame: bool,
    /// Hold segment completion while active even without "finish all tasks".
    #[serde(default)]
    pub blocking: bool,
    /// Context parameter that overrides a task field per activation.
    #[serde(default)]
    pub dynamic_property_id: Option<String>,
}

impl TaskDesc {
    /// Task running from `start_time` to `end_time` on every side.
    #[must_use]
    pub const fn new(id: u32, start_time: f32, end_time: f32) -> Self {
        Self {
            id: TaskKey(id),
            start_time,
            end_time,
            realm: Realm::ClientAndServer,
            dependencies: Vec::new(),
            display_order: 0,
            disabled: false,
            reset_for_iteration: true,
            once_during_iteration: false,
            across_segment: false,
            single_frame: false,
            blocking: false,
            dynamic_property_id: None,
        }
    }

    /// Single-frame task firing at `start_time`.
    #[must_use]
    pub const fn single_frame(id: u32, start_time: f32) -> Self {
        let mut desc = Self::new(id, start_time, start_time);
        desc.single_frame = true;
        desc
    }

    /// Set the realm.
    #[must_use]
    pub const fn with_realm(mut self, realm: Realm) -> Self {
        self.realm = realm;
        self
    }

    /// Set declared dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = u32>) -> Self {
        self.dependencies = dependencies.into_iter().map(TaskKey).collect();
        self
    }

    /// Set the display order.
    #[must_use]
    pub const fn with_display_order(mut self, order: i32) -> Self {
        self.display_order = order;
        self
    }

    /// Mark the task as surviving segment branches.
    #[must_use]
    pub const fn across_segment(mut self) -> Self {
        self.across_segment = true;
        self
    }

    /// Allow at most one start per segment entry.
    #[must_use]
    pub const fn once_during_iteration(mut self) -> Self {
        self.once_during_iteration = true;
        self
    }

    /// Hold segment completion while active.
    #[must_use]
    pub const fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    /// Control whether a loop restart ends the task.
    #[must_use]
    pub const fn with_reset_for_iteration(mut self, reset: bool) -> Self {
        self.reset_for_iteration = reset;
        self
    }

    /// Disable the task.
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Bind a per-activation override parameter.
    #[must_use]
    pub fn with_dynamic_property(mut self, parameter: impl Into<String>) -> Self {
        self.dynamic_property_id = Some(parameter.into());
        self
    }
}

/// Where a queued branch goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentTarget {
    /// Segment index.
    Index(usize),
    /// Segment name.
    Name(String),
}

/// Deferred request from a task to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskCommand {
    /// Switch the active segment.
    BranchSegment {
        /// Destination.
        target: SegmentTarget,
        /// Keep the current targets.
        copy_targets: bool,
        /// Re-run targeting after the switch.
        retarget: bool,
    },
    /// End the ability.
    Cancel(TaskResult),
    /// End across-segment tasks (all of them when empty).
    StopAcross(Vec<TaskKey>),
    /// Add targets to the context.
    AddTargets {
        /// Entities to add.
        targets: Vec<EntityHandle>,
        /// Keep duplicates.
        allow_duplicates: bool,
        /// Clear the list first.
        clear_first: bool,
    },
}

/// Everything a task callback may read or mutate.
pub struct TaskContext<'a> {
    context: &'a mut AbilityContext,
    definition: &'a AbilityDefinition,
    services: &'a Services,
    commands: &'a mut Vec<TaskCommand>,
    task: TaskKey,
}

impl fmt::Debug for TaskContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("task", &self.task)
            .field("ability", &self.definition.name())
            .field("time", &self.context.current_time())
            .finish_non_exhaustive()
    }
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(
        context: &'a mut AbilityContext,
        definition: &'a AbilityDefinition,
        services: &'a Services,
        commands: &'a mut Vec<TaskCommand>,
        task: TaskKey,
    ) -> Self {
        Self {
            context,
            definition,
            services,
            commands,
            task,
        }
    }

    /// Id of the task being called.
    #[must_use]
    pub const fn task_key(&self) -> TaskKey {
        self.task
    }

    /// Live context.
    #[must_use]
    pub fn context(&self) -> &AbilityContext {
        &*self.context
    }

    /// Live context, mutable.
    pub fn context_mut(&mut self) -> &mut AbilityContext {
        &mut *self.context
    }

    /// Running definition.
    #[must_use]
    pub const fn definition(&self) -> &'a AbilityDefinition {
        self.definition
    }

    /// Ability hooks.
    #[must_use]
    pub fn hooks(&self) -> &'a dyn ScriptHooks {
        let definition = self.definition;
        definition.hooks()
    }

    /// Host world.
    #[must_use]
    pub fn world(&self) -> &'a dyn World {
        let services = self.services;
        services.world.as_ref()
    }

    /// Async query bridge.
    #[must_use]
    pub fn queries(&self) -> &'a dyn QueryBridge {
        let services = self.services;
        services.queries.as_ref()
    }

    /// Pools.
    #[must_use]
    pub fn pools(&self) -> &'a PoolManager {
        let services = self.services;
        &services.pools
    }

    /// Scheduler configuration.
    #[must_use]
    pub fn config(&self) -> &'a SchedulerConfig {
        let services = self.services;
        &services.config
    }

    /// Inputs for evaluating conditions against this context.
    #[must_use]
    pub fn condition_env(&self) -> ConditionEnv<'_> {
        ConditionEnv {
            context: &*self.context,
            world: self.services.world.as_ref(),
            hooks: self.definition.hooks(),
            net_mode: self.services.config.net_mode,
        }
    }

    /// This task's scratch pad.
    #[must_use]
    pub fn scratch_pad<T: ScratchPad>(&self) -> Option<&T> {
        self.context.scratch_pad::<T>(self.task)
    }

    /// This task's scratch pad, mutable.
    pub fn scratch_pad_mut<T: ScratchPad>(&mut self) -> Option<&mut T> {
        self.context.scratch_pad_mut::<T>(self.task)
    }

    /// Queue a segment branch.
    pub fn branch_to(&mut self, target: SegmentTarget, copy_targets: bool, retarget: bool) {
        self.commands.push(TaskCommand::BranchSegment {
            target,
            copy_targets,
            retarget,
        });
    }

    /// Queue the end of the ability.
    pub fn cancel_ability(&mut self, result: TaskResult) {
        self.commands.push(TaskCommand::Cancel(result));
    }

    /// Queue the end of across-segment tasks.
    pub fn stop_across(&mut self, tasks: Vec<TaskKey>) {
        self.commands.push(TaskCommand::StopAcross(tasks));
    }

    /// Queue new targets.
    pub fn add_targets(&mut self, targets: Vec<EntityHandle>, allow_duplicates: bool, clear_first: bool) {
        self.commands.push(TaskCommand::AddTargets {
            targets,
            allow_duplicates,
            clear_first,
        });
    }
}

/// A time-windowed unit of scheduled work.
///
/// Implementations are shared across every concurrent activation and must
/// keep per-activation state in a scratch pad.
pub trait Task: Send + Sync + fmt::Debug {
    /// Stable kind string used by the registry.
    fn kind(&self) -> &'static str;

    /// Authored scheduling data.
    fn desc(&self) -> &TaskDesc;

    /// Task id.
    fn key(&self) -> TaskKey {
        self.desc().id
    }

    /// Segment-relative start.
    fn start_time(&self) -> f32 {
        self.desc().start_time
    }

    /// Segment-relative end.
    fn end_time(&self) -> f32 {
        if self.is_single_frame() {
            self.start_time() + f32::EPSILON
        } else {
            self.desc().end_time
        }
    }

    /// Side that runs the task.
    fn realm(&self) -> Realm {
        self.desc().realm
    }

    /// Start and end within the same frame.
    fn is_single_frame(&self) -> bool {
        self.desc().single_frame
    }

    /// Receive `on_task_tick` while active.
    fn needs_tick(&self) -> bool {
        false
    }

    /// Receive `poll_async` while active.
    fn is_async_friendly(&self) -> bool {
        false
    }

    /// Reads the context target list.
    fn uses_target_actors(&self) -> bool {
        false
    }

    /// Writes the context target list.
    fn produces_targets(&self) -> bool {
        false
    }

    /// Whether the task may start at `time`.
    fn can_start(&self, _context: &AbilityContext, time: f32) -> bool {
        time >= self.start_time()
    }

    /// Whether an active task should end this frame.
    fn is_done(&self, context: &AbilityContext) -> bool {
        context.current_time() >= self.end_time()
    }

    /// Pooled per-activation state, if the task keeps any.
    fn create_scratch_pad(&self, _pools: &PoolManager) -> Option<Box<dyn ScratchPad>> {
        None
    }

    /// Resolve per-activation overrides before `on_task_start`.
    fn bind_dynamic_delegates(&self, _task: &mut TaskContext<'_>) {}

    /// The task started.
    fn on_task_start(&self, _task: &mut TaskContext<'_>) {}

    /// One frame while active.
    fn on_task_tick(&self, _task: &mut TaskContext<'_>, _delta: f32) {}

    /// The task ended for `result`.
    fn on_task_end(&self, _task: &mut TaskContext<'_>, _result: TaskResult) {}

    /// Collect async results; runs before new tasks start each frame.
    fn poll_async(&self, _task: &mut TaskContext<'_>) {}

    /// Offline configuration checks.
    fn validate(&self, _definition: &AbilityDefinition) -> Vec<ValidationError> {
        Vec::new()
    }
}
