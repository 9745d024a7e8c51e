//! Segments: named sub-timelines with loop and branch rules.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::condition::Condition;
use crate::core::task::Task;
use crate::core::types::TaskKey;

/// A task placed in a segment together with its resolved dependencies.
#[derive(Clone)]
pub struct TaskSlot {
    task: Arc<dyn Task>,
    dependencies: Vec<TaskKey>,
}

impl fmt::Debug for TaskSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSlot")
            .field("key", &self.task.key())
            .field("kind", &self.task.kind())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl TaskSlot {
    fn new(task: Arc<dyn Task>) -> Self {
        Self {
            task,
            dependencies: Vec::new(),
        }
    }

    /// Shared task template.
    #[must_use]
    pub fn task(&self) -> &Arc<dyn Task> {
        &self.task
    }

    /// Task id.
    #[must_use]
    pub fn key(&self) -> TaskKey {
        self.task.key()
    }

    /// Live dependency set after filtering.
    #[must_use]
    pub fn dependencies(&self) -> &[TaskKey] {
        &self.dependencies
    }

    pub(crate) fn set_dependencies(&mut self, dependencies: Vec<TaskKey>) {
        self.dependencies = dependencies;
    }
}

/// Outgoing transition of a segment, tried in priority order.
#[derive(Debug, Clone)]
pub struct BranchData {
    /// Destination segment name.
    pub target: String,
    /// Conditions gating the branch.
    pub conditions: Vec<Arc<dyn Condition>>,
    /// Require every condition instead of any.
    pub must_pass_all: bool,
    /// Keep targets across the branch.
    pub copy_targets: bool,
}

impl BranchData {
    /// Unconditional branch to `target` that keeps targets.
    #[must_use]
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            conditions: Vec::new(),
            must_pass_all: true,
            copy_targets: true,
        }
    }

    /// Add a gating condition.
    #[must_use]
    pub fn with_condition(mut self, condition: Arc<dyn Condition>) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Pass when any condition passes.
    #[must_use]
    pub const fn any(mut self) -> Self {
        self.must_pass_all = false;
        self
    }

    /// Drop targets when the branch is taken.
    #[must_use]
    pub const fn without_targets(mut self) -> Self {
        self.copy_targets = false;
        self
    }
}

/// Named sub-timeline.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Unique name within the definition.
    pub name: String,
    /// Length in seconds.
    pub length: f32,
    /// Whether the loop range repeats.
    pub looping: bool,
    /// Loop range start.
    pub loop_start: f32,
    /// Loop range end.
    pub loop_end: f32,
    /// Traversals of the loop range (0 = infinite).
    pub loop_max_iterations: u32,
    /// Wait for every task before completing.
    pub finish_all_tasks: bool,
    /// Re-run targeting when this segment is branched into.
    pub retarget: bool,
    /// Outgoing branches in priority order.
    pub branches: Vec<BranchData>,
    tasks: Vec<TaskSlot>,
    dependent_tasks: Vec<TaskKey>,
    repairs: HashMap<TaskKey, TaskKey>,
}

impl Segment {
    /// Non-looping segment that waits for all tasks.
    #[must_use]
    pub fn new(name: impl Into<String>, length: f32) -> Self {
        Self {
            name: name.into(),
            length,
            looping: false,
            loop_start: 0.0,
            loop_end: length,
            loop_max_iterations: 0,
            finish_all_tasks: true,
            retarget: false,
            branches: Vec::new(),
            tasks: Vec::new(),
            dependent_tasks: Vec::new(),
            repairs: HashMap::new(),
        }
    }

    /// Loop `[start, end]` up to `max_iterations` traversals (0 = infinite).
    #[must_use]
    pub const fn with_loop(mut self, start: f32, end: f32, max_iterations: u32) -> Self {
        self.looping = true;
        self.loop_start = start;
        self.loop_end = end;
        self.loop_max_iterations = max_iterations;
        self
    }

    /// Set whether completion waits for every task.
    #[must_use]
    pub const fn with_finish_all_tasks(mut self, finish_all: bool) -> Self {
        self.finish_all_tasks = finish_all;
        self
    }

    /// Re-run targeting when branched into.
    #[must_use]
    pub const fn with_retarget(mut self) -> Self {
        self.retarget = true;
        self
    }

    /// Add a task.
    #[must_use]
    pub fn with_task(mut self, task: Arc<dyn Task>) -> Self {
        self.add_task(task);
        self
    }

    /// Add an outgoing branch.
    #[must_use]
    pub fn with_branch(mut self, branch: BranchData) -> Self {
        self.branches.push(branch);
        self
    }

    /// Insert a task, keeping (start, display order) order stable.
    ///
    /// Dependencies must be rebuilt afterwards.
    pub fn add_task(&mut self, task: Arc<dyn Task>) {
        let key = (task.start_time(), task.desc().display_order);
        let position = self.tasks.partition_point(|slot| {
            let other = (slot.task.start_time(), slot.task.desc().display_order);
            other.0.total_cmp(&key.0).then(other.1.cmp(&key.1)).is_le()
        });
        self.tasks.insert(position, TaskSlot::new(task));
    }

    /// Tasks in start order.
    #[must_use]
    pub fn tasks(&self) -> &[TaskSlot] {
        &self.tasks
    }

    pub(crate) fn tasks_mut(&mut self) -> &mut [TaskSlot] {
        &mut self.tasks
    }

    /// Slot for `key`, if the task is in this segment.
    #[must_use]
    pub fn task(&self, key: TaskKey) -> Option<&TaskSlot> {
        self.tasks.iter().find(|slot| slot.key() == key)
    }

    /// Whether the segment contains `key`.
    #[must_use]
    pub fn contains(&self, key: TaskKey) -> bool {
        self.task(key).is_some()
    }

    /// Every task some other task in this segment depends on.
    #[must_use]
    pub fn dependent_tasks(&self) -> &[TaskKey] {
        &self.dependent_tasks
    }

    pub(crate) fn set_dependent_tasks(&mut self, keys: Vec<TaskKey>) {
        self.dependent_tasks = keys;
    }

    /// Dependency substitutions found by the repair pass.
    #[must_use]
    pub const fn repairs(&self) -> &HashMap<TaskKey, TaskKey> {
        &self.repairs
    }

    pub(crate) fn set_repairs(&mut self, repairs: HashMap<TaskKey, TaskKey>) {
        self.repairs = repairs;
    }

    /// Whether a task starting at `time` is re-armed by each loop.
    #[must_use]
    pub fn in_loop_range(&self, time: f32) -> bool {
        self.looping && time >= self.loop_start && time <= self.loop_end
    }
}
