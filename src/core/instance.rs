//! One live activation and its timeline.
//!
//! An [`AbilityInstance`] pairs a shared [`AbilityDefinition`] with a pooled
//! [`AbilityContext`] and the bookkeeping that decides which task starts,
//! ticks or ends on each advance. Each advance runs these passes in order:
//!
//! 1. pending context changes and async targeting
//! 2. `poll_async` on active async-friendly tasks
//! 3. time cursor moves by `delta * play_rate`
//! 4. across-segment tasks start, then regular tasks in (start, display order)
//! 5. active tasks end when done, otherwise tick; fresh starts are not ticked
//! 6. commands queued by tasks are applied
//! 7. stack decay, loop restart or segment completion, channel check

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::condition::{evaluate, passes, ConditionEnv};
use crate::core::context::AbilityContext;
use crate::core::definition::AbilityDefinition;
use crate::core::error::AbilityError;
use crate::core::events::{build_event, AbilityEventKind};
use crate::core::segment::Segment;
use crate::core::services::Services;
use crate::core::targeting::TargetingStatus;
use crate::core::task::{SegmentTarget, Task, TaskCommand, TaskContext};
use crate::core::types::{ConditionResult, EntityHandle, TaskKey, TaskResult, Vec3};

/// Rounds of follow-up commands applied in one advance before giving up.
const MAX_COMMAND_ROUNDS: usize = 8;

/// Change to the context applied at the start of the next advance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContextModification {
    /// Replace the owner.
    Owner(Option<EntityHandle>),
    /// Replace the instigator.
    Instigator(Option<EntityHandle>),
    /// Replace the entity running the ability.
    SelfEntity(Option<EntityHandle>),
    /// Replace the target location.
    TargetLocation(Option<Vec3>),
}

/// Targets queued from outside the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTargets {
    /// Entities to add.
    pub targets: Vec<EntityHandle>,
    /// Keep duplicates.
    pub allow_duplicates: bool,
    /// Clear the list first.
    pub clear_first: bool,
}

/// Outcome of one advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    Running,
    Ended(TaskResult),
}

#[derive(Debug, Default)]
struct Timeline {
    /// Armed tasks that may still start, in segment order.
    pending: Vec<TaskKey>,
    /// Every task armed on the current segment entry.
    armed: HashSet<TaskKey>,
    /// Started, not ended, segment-bound.
    active: Vec<TaskKey>,
    /// Started, not ended, surviving branches.
    across: Vec<TaskKey>,
    /// Ended during the current loop traversal (looping segments only).
    finished: HashSet<TaskKey>,
    /// Ended since they were armed; gates dependents.
    completed: HashSet<TaskKey>,
    /// Started since the segment was entered.
    started_this_entry: HashSet<TaskKey>,
    pending_targets: Vec<PendingTargets>,
    pending_modifications: Vec<ContextModification>,
    decay_elapsed: f32,
    end_requested: Option<TaskResult>,
}

/// A live activation.
pub struct AbilityInstance {
    definition: Arc<AbilityDefinition>,
    context: Box<AbilityContext>,
    timeline: Timeline,
}

impl fmt::Debug for AbilityInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbilityInstance")
            .field("ability", &self.definition.name())
            .field("activation", &self.context.activation_id())
            .field("segment", &self.context.active_segment())
            .field("time", &self.context.current_time())
            .field("active", &self.timeline.active)
            .field("across", &self.timeline.across)
            .finish_non_exhaustive()
    }
}

impl AbilityInstance {
    /// Wrap a prepared context and enter `entry_segment`.
    ///
    /// Allocates scratch pads for every task, fires `on_ability_start` and
    /// records a `Started` event.
    pub(crate) fn start(
        definition: Arc<AbilityDefinition>,
        mut context: Box<AbilityContext>,
        services: &Services,
        entry_segment: usize,
    ) -> Self {
        for slot in definition.all_tasks() {
            let key = slot.key();
            if context.has_scratch_pad(key) {
                continue;
            }
            if let Some(pad) = slot.task().create_scratch_pad(&services.pools) {
                context.insert_scratch_pad(key, pad);
            }
        }
        context.set_active_segment(entry_segment);
        context.set_current_time(0.0);
        context.set_loop_iteration(0);

        let mut instance = Self {
            definition,
            context,
            timeline: Timeline::default(),
        };
        let definition = Arc::clone(&instance.definition);
        instance.arm_segment(&definition, services, entry_segment);
        definition.hooks().on_ability_start(instance.context.as_mut());
        instance.record(services, AbilityEventKind::Started);

        info!(
            ability = %definition.name(),
            activation = %instance.context.activation_id(),
            segment = entry_segment,
            stacks = instance.context.stack_count(),
            "Ability started"
        );
        instance
    }

    /// Activation id.
    #[must_use]
    pub fn activation_id(&self) -> Uuid {
        self.context.activation_id()
    }

    /// Running definition.
    #[must_use]
    pub const fn definition(&self) -> &Arc<AbilityDefinition> {
        &self.definition
    }

    /// Live context.
    #[must_use]
    pub fn context(&self) -> &AbilityContext {
        &self.context
    }

    pub(crate) fn context_mut(&mut self) -> &mut AbilityContext {
        &mut self.context
    }

    /// Segment-bound tasks started and not yet ended.
    #[must_use]
    pub fn active_tasks(&self) -> &[TaskKey] {
        &self.timeline.active
    }

    /// Across-segment tasks started and not yet ended.
    #[must_use]
    pub fn across_tasks(&self) -> &[TaskKey] {
        &self.timeline.across
    }

    /// Armed tasks that may still start.
    #[must_use]
    pub fn pending_tasks(&self) -> &[TaskKey] {
        &self.timeline.pending
    }

    /// Whether `key` is running.
    #[must_use]
    pub fn is_task_active(&self, key: TaskKey) -> bool {
        self.timeline.active.contains(&key) || self.timeline.across.contains(&key)
    }

    pub(crate) fn queue_targets(&mut self, targets: PendingTargets) {
        self.timeline.pending_targets.push(targets);
    }

    pub(crate) fn queue_modification(&mut self, modification: ContextModification) {
        self.timeline.pending_modifications.push(modification);
    }

    pub(crate) fn reset_decay(&mut self) {
        self.timeline.decay_elapsed = 0.0;
    }

    /// Set the stack count, recording the change.
    pub(crate) fn set_stack_count(&mut self, services: &Services, count: u32) {
        let from = self.context.stack_count();
        self.context.set_stack_count(count);
        let to = self.context.stack_count();
        if from != to {
            self.record(services, AbilityEventKind::StackChanged { from, to });
        }
    }

    /// Advance the timeline by `delta` seconds.
    pub(crate) fn advance(&mut self, services: &Services, delta: f32) -> Progress {
        if let Some(result) = self.timeline.end_requested {
            return Progress::Ended(result);
        }
        let definition = Arc::clone(&self.definition);
        let mut commands = Vec::new();

        self.apply_pending_context(&definition, services);
        self.poll_async_tasks(&definition, services, &mut commands);

        let scaled = delta.max(0.0) * definition.play_rate();
        self.context.advance_time(scaled);

        let mut started = Vec::new();
        // Across-segment tasks start in their own pass first; start time and
        // display order only break ties within a pass.
        self.start_tasks(&definition, services, true, &mut started, &mut commands);
        self.start_tasks(&definition, services, false, &mut started, &mut commands);
        self.update_active_tasks(&definition, services, scaled, &mut commands);
        self.admit_started(&definition, services, started, &mut commands);

        self.apply_commands(&definition, services, commands);
        if let Some(result) = self.timeline.end_requested {
            return Progress::Ended(result);
        }

        if let Some(result) = self.update_decay(&definition, services, scaled) {
            return Progress::Ended(result);
        }
        if let Some(result) = self.update_completion(&definition, services) {
            return Progress::Ended(result);
        }
        if let Some(result) = self.check_channel(&definition, services) {
            return Progress::Ended(result);
        }
        Progress::Running
    }

    /// Switch to segment `index` from outside the timeline.
    ///
    /// Returns `false` when `index` is already active.
    ///
    /// # Errors
    ///
    /// [`AbilityError::SegmentOutOfRange`] for an unknown index.
    pub(crate) fn branch_segment(
        &mut self,
        services: &Services,
        index: usize,
    ) -> Result<bool, AbilityError> {
        let definition = Arc::clone(&self.definition);
        let mut commands = Vec::new();
        let branched = self.enter_segment(&definition, services, index, true, false, false, &mut commands)?;
        self.apply_commands(&definition, services, commands);
        Ok(branched)
    }

    /// End every running task, fire end hooks and record `Ended`.
    ///
    /// The caller releases the context afterwards.
    pub(crate) fn end(&mut self, services: &Services, result: TaskResult) {
        let definition = Arc::clone(&self.definition);
        let mut commands = Vec::new();

        let running: Vec<TaskKey> = self
            .timeline
            .active
            .drain(..)
            .chain(self.timeline.across.drain(..))
            .collect();
        for key in running {
            self.end_task(&definition, services, key, result, &mut commands);
        }
        if !commands.is_empty() {
            debug!(
                ability = %definition.name(),
                dropped = commands.len(),
                "Dropping commands queued while ending"
            );
        }

        if let Some(handle) = self.context.targeting_query() {
            services.queries.cancel(handle);
            self.context.set_targeting_query(None);
        }

        let hooks = definition.hooks();
        if result == TaskResult::Interrupted {
            hooks.on_ability_interrupt(self.context.as_mut());
        }
        hooks.on_ability_end(self.context.as_mut(), result);
        self.record(services, AbilityEventKind::Ended { result });
        self.timeline.pending.clear();

        info!(
            ability = %definition.name(),
            activation = %self.context.activation_id(),
            %result,
            "Ability ended"
        );
    }

    pub(crate) fn into_context(self) -> Box<AbilityContext> {
        self.context
    }

    fn record(&self, services: &Services, kind: AbilityEventKind) {
        services.events.record(build_event(
            self.context.activation_id(),
            self.definition.name(),
            kind,
            self.context.current_time(),
        ));
    }

    fn condition_env<'a>(&'a self, definition: &'a AbilityDefinition, services: &'a Services) -> ConditionEnv<'a> {
        ConditionEnv {
            context: &self.context,
            world: services.world.as_ref(),
            hooks: definition.hooks(),
            net_mode: services.config.net_mode,
        }
    }

    fn arm_segment(&mut self, definition: &AbilityDefinition, services: &Services, index: usize) {
        let timeline = &mut self.timeline;
        timeline.pending.clear();
        timeline.armed.clear();
        timeline.finished.clear();
        timeline.completed.clear();
        timeline.started_this_entry.clear();

        let Some(segment) = definition.segment(index) else {
            return;
        };
        let net_mode = services.config.net_mode;
        for slot in segment.tasks() {
            let task = slot.task();
            let key = slot.key();
            if task.desc().disabled || !task.realm().runs_on(net_mode) {
                continue;
            }
            timeline.armed.insert(key);
            if !timeline.across.contains(&key) {
                timeline.pending.push(key);
            }
        }
    }

    fn apply_pending_context(&mut self, definition: &AbilityDefinition, services: &Services) {
        if self.context.targeting_query().is_some() {
            if let Some(targeting) = definition.targeting() {
                if targeting.poll(&mut self.context, services) == TargetingStatus::Pending {
                    debug!(activation = %self.context.activation_id(), "Targeting still pending");
                }
            }
        }

        for queued in std::mem::take(&mut self.timeline.pending_targets) {
            if queued.clear_first {
                self.context.clear_targets();
            }
            self.context
                .extend_targets(&queued.targets, queued.allow_duplicates);
        }

        for modification in std::mem::take(&mut self.timeline.pending_modifications) {
            match modification {
                ContextModification::Owner(owner) => self.context.set_owner(owner),
                ContextModification::Instigator(instigator) => {
                    self.context.set_instigator(instigator);
                }
                ContextModification::SelfEntity(entity) => self.context.set_self_entity(entity),
                ContextModification::TargetLocation(location) => {
                    self.context.set_target_location(location);
                }
            }
        }
    }

    fn poll_async_tasks(
        &mut self,
        definition: &AbilityDefinition,
        services: &Services,
        commands: &mut Vec<TaskCommand>,
    ) {
        let running: Vec<TaskKey> = self
            .timeline
            .active
            .iter()
            .chain(self.timeline.across.iter())
            .copied()
            .collect();
        for key in running {
            let Some(slot) = definition.task(key) else {
                continue;
            };
            let task = slot.task();
            if task.is_async_friendly() {
                let mut call = TaskContext::new(&mut self.context, definition, services, commands, key);
                task.poll_async(&mut call);
            }
        }
    }

    fn dependencies_met(&self, dependencies: &[TaskKey]) -> bool {
        dependencies.iter().all(|dependency| {
            self.timeline.completed.contains(dependency) || !self.timeline.armed.contains(dependency)
        })
    }

    fn start_tasks(
        &mut self,
        definition: &AbilityDefinition,
        services: &Services,
        across_pass: bool,
        started: &mut Vec<TaskKey>,
        commands: &mut Vec<TaskCommand>,
    ) {
        let Some(segment) = definition.segment(self.context.active_segment()) else {
            return;
        };
        let now = self.context.current_time();
        let mut index = 0;
        while index < self.timeline.pending.len() {
            let key = self.timeline.pending[index];
            let Some(slot) = segment.task(key) else {
                debug!(task = %key, "Skipping stale pending task");
                self.timeline.pending.remove(index);
                continue;
            };
            let task = slot.task();
            if task.desc().across_segment != across_pass {
                index += 1;
                continue;
            }
            if task.start_time() > now {
                if across_pass {
                    index += 1;
                    continue;
                }
                break;
            }

            let blocked = !task.can_start(&self.context, now)
                || (task.desc().once_during_iteration
                    && self.timeline.started_this_entry.contains(&key))
                || (segment.looping && self.timeline.finished.contains(&key))
                || self.is_task_active(key)
                || started.contains(&key)
                || !self.dependencies_met(slot.dependencies());
            if blocked {
                index += 1;
                continue;
            }

            if segment.in_loop_range(task.start_time()) {
                index += 1;
            } else {
                self.timeline.pending.remove(index);
            }
            self.timeline.started_this_entry.insert(key);
            self.start_task(definition, services, task, commands);

            if task.is_single_frame() {
                self.end_task(definition, services, key, TaskResult::Successful, commands);
                self.mark_completed(segment, key);
            } else {
                started.push(key);
            }
        }
    }

    fn start_task(
        &mut self,
        definition: &AbilityDefinition,
        services: &Services,
        task: &Arc<dyn Task>,
        commands: &mut Vec<TaskCommand>,
    ) {
        let key = task.key();
        if !self.context.reset_scratch_pad(key) {
            if let Some(pad) = task.create_scratch_pad(&services.pools) {
                self.context.insert_scratch_pad(key, pad);
            }
        }
        debug!(
            task = %key,
            kind = task.kind(),
            time = self.context.current_time(),
            "Task started"
        );
        let mut call = TaskContext::new(&mut self.context, definition, services, commands, key);
        task.bind_dynamic_delegates(&mut call);
        task.on_task_start(&mut call);
    }

    fn end_task(
        &mut self,
        definition: &AbilityDefinition,
        services: &Services,
        key: TaskKey,
        result: TaskResult,
        commands: &mut Vec<TaskCommand>,
    ) {
        let Some(slot) = definition.task(key) else {
            debug!(task = %key, "Skipping stale task on end");
            return;
        };
        debug!(task = %key, %result, time = self.context.current_time(), "Task ended");
        let mut call = TaskContext::new(&mut self.context, definition, services, commands, key);
        slot.task().on_task_end(&mut call, result);
    }

    fn mark_completed(&mut self, segment: &Segment, key: TaskKey) {
        self.timeline.completed.insert(key);
        if segment.looping {
            self.timeline.finished.insert(key);
        }
    }

    fn update_active_tasks(
        &mut self,
        definition: &AbilityDefinition,
        services: &Services,
        delta: f32,
        commands: &mut Vec<TaskCommand>,
    ) {
        let Some(segment) = definition.segment(self.context.active_segment()) else {
            return;
        };

        let active = std::mem::take(&mut self.timeline.active);
        let mut still_running = Vec::with_capacity(active.len());
        for key in active {
            let Some(slot) = definition.task(key) else {
                debug!(task = %key, "Dropping stale active task");
                continue;
            };
            let task = slot.task();
            if task.is_done(&self.context) {
                self.end_task(definition, services, key, TaskResult::Successful, commands);
                self.mark_completed(segment, key);
            } else {
                if task.needs_tick() {
                    let mut call = TaskContext::new(&mut self.context, definition, services, commands, key);
                    task.on_task_tick(&mut call, delta);
                }
                still_running.push(key);
            }
        }
        self.timeline.active = still_running;

        let across = self.timeline.across.clone();
        for key in across {
            let Some(slot) = definition.task(key) else {
                continue;
            };
            let task = slot.task();
            if task.needs_tick() {
                let mut call = TaskContext::new(&mut self.context, definition, services, commands, key);
                task.on_task_tick(&mut call, delta);
            }
        }
    }

    fn admit_started(
        &mut self,
        definition: &AbilityDefinition,
        services: &Services,
        started: Vec<TaskKey>,
        commands: &mut Vec<TaskCommand>,
    ) {
        let Some(segment) = definition.segment(self.context.active_segment()) else {
            return;
        };
        for key in started {
            let Some(slot) = definition.task(key) else {
                continue;
            };
            let task = slot.task();
            if task.desc().across_segment {
                self.timeline.across.push(key);
            } else if task.is_done(&self.context) {
                self.end_task(definition, services, key, TaskResult::Successful, commands);
                self.mark_completed(segment, key);
            } else {
                self.timeline.active.push(key);
            }
        }
    }

    fn apply_commands(
        &mut self,
        definition: &AbilityDefinition,
        services: &Services,
        mut commands: Vec<TaskCommand>,
    ) {
        let mut branched = false;
        let mut rounds = 0;
        while !commands.is_empty() {
            rounds += 1;
            if rounds > MAX_COMMAND_ROUNDS {
                warn!(
                    ability = %definition.name(),
                    dropped = commands.len(),
                    "Task commands kept spawning follow-ups, dropping the rest"
                );
                return;
            }

            let mut follow_ups = Vec::new();
            for command in commands {
                match command {
                    TaskCommand::BranchSegment {
                        target,
                        copy_targets,
                        retarget,
                    } => {
                        if branched || self.timeline.end_requested.is_some() {
                            debug!(?target, "Dropping extra branch request");
                            continue;
                        }
                        let index = match &target {
                            SegmentTarget::Index(index) => Some(*index),
                            SegmentTarget::Name(name) => definition.segment_index(name),
                        };
                        let Some(index) = index else {
                            warn!(?target, "Branch target does not resolve, ignoring");
                            continue;
                        };
                        match self.enter_segment(
                            definition,
                            services,
                            index,
                            copy_targets,
                            retarget,
                            false,
                            &mut follow_ups,
                        ) {
                            Ok(changed) => branched = changed,
                            Err(err) => warn!(error = %err, "Branch request rejected"),
                        }
                    }
                    TaskCommand::Cancel(result) => {
                        self.timeline.end_requested.get_or_insert(result);
                    }
                    TaskCommand::StopAcross(keys) => {
                        self.stop_across(definition, services, &keys, &mut follow_ups);
                    }
                    TaskCommand::AddTargets {
                        targets,
                        allow_duplicates,
                        clear_first,
                    } => {
                        if clear_first {
                            self.context.clear_targets();
                        }
                        self.context.extend_targets(&targets, allow_duplicates);
                    }
                }
            }
            commands = follow_ups;
        }
    }

    fn stop_across(
        &mut self,
        definition: &AbilityDefinition,
        services: &Services,
        keys: &[TaskKey],
        commands: &mut Vec<TaskCommand>,
    ) {
        let (stopped, kept): (Vec<TaskKey>, Vec<TaskKey>) = self
            .timeline
            .across
            .iter()
            .partition(|key| keys.is_empty() || keys.contains(key));
        self.timeline.across = kept;
        for key in stopped {
            self.end_task(definition, services, key, TaskResult::StopAcross, commands);
            self.timeline.completed.insert(key);
        }
    }

    /// Shared body of branching and restarting.
    #[allow(clippy::too_many_arguments)]
    fn enter_segment(
        &mut self,
        definition: &AbilityDefinition,
        services: &Services,
        index: usize,
        copy_targets: bool,
        retarget: bool,
        restart: bool,
        commands: &mut Vec<TaskCommand>,
    ) -> Result<bool, AbilityError> {
        let count = definition.segments().len();
        let Some(segment) = definition.segment(index) else {
            return Err(AbilityError::SegmentOutOfRange { index, count });
        };
        let from = self.context.active_segment();
        if index == from && !restart {
            return Ok(false);
        }

        let running = std::mem::take(&mut self.timeline.active);
        for key in running {
            self.end_task(definition, services, key, TaskResult::BranchSegment, commands);
        }

        self.context.set_active_segment(index);
        self.context.set_current_time(0.0);
        self.context.set_loop_iteration(0);
        if !copy_targets {
            self.context.clear_targets();
        }
        self.arm_segment(definition, services, index);

        if retarget || segment.retarget {
            if let Some(targeting) = definition.targeting() {
                self.context.clear_targets();
                targeting.find_targets(&mut self.context, services);
            }
        }

        if restart {
            debug!(segment = %segment.name, "Segment restarted");
        } else {
            definition
                .hooks()
                .on_segment_branched(self.context.as_mut(), from, index);
            self.record(services, AbilityEventKind::SegmentBranched { from, to: index });
            info!(
                ability = %definition.name(),
                from,
                to = index,
                segment = %segment.name,
                "Segment branched"
            );
        }
        Ok(true)
    }

    fn loop_back(
        &mut self,
        definition: &AbilityDefinition,
        services: &Services,
        segment: &Segment,
        commands: &mut Vec<TaskCommand>,
    ) {
        let active = std::mem::take(&mut self.timeline.active);
        let mut kept = Vec::with_capacity(active.len());
        for key in active {
            let resets = definition
                .task(key)
                .is_some_and(|slot| slot.task().desc().reset_for_iteration);
            if resets {
                self.end_task(definition, services, key, TaskResult::Successful, commands);
            } else {
                kept.push(key);
            }
        }
        self.timeline.active = kept;

        let time = self.context.current_time();
        let rewound = (time - segment.loop_end + segment.loop_start).max(segment.loop_start);
        self.context.set_current_time(rewound);
        let iteration = self.context.loop_iteration() + 1;
        self.context.set_loop_iteration(iteration);

        for slot in segment.tasks() {
            if segment.in_loop_range(slot.task().start_time()) {
                self.timeline.finished.remove(&slot.key());
                self.timeline.completed.remove(&slot.key());
            }
        }

        if let Some(targeting) = definition.targeting() {
            if targeting.reset_for_iteration() {
                self.context.clear_targets();
                targeting.find_targets(&mut self.context, services);
            }
        }

        definition
            .hooks()
            .on_ability_iteration(self.context.as_mut(), iteration);
        self.record(services, AbilityEventKind::Iteration { iteration });
        debug!(segment = %segment.name, iteration, time = rewound, "Loop restarted");
    }

    fn update_decay(
        &mut self,
        definition: &AbilityDefinition,
        services: &Services,
        delta: f32,
    ) -> Option<TaskResult> {
        let decay_time = definition.stacking().decay_time;
        if decay_time <= 0.0 {
            return None;
        }
        self.timeline.decay_elapsed += delta;
        while self.timeline.decay_elapsed >= decay_time {
            self.timeline.decay_elapsed -= decay_time;
            let remaining = self.context.stack_count().saturating_sub(1);
            self.set_stack_count(services, remaining);
            if remaining == 0 {
                return Some(TaskResult::Decayed);
            }
        }
        None
    }

    fn has_unfinished_pending(&self, segment: &Segment) -> bool {
        self.timeline.pending.iter().any(|key| {
            if self.timeline.finished.contains(key) {
                return false;
            }
            let once = segment
                .task(*key)
                .is_some_and(|slot| slot.task().desc().once_during_iteration);
            !(once && self.timeline.started_this_entry.contains(key))
        })
    }

    fn segment_settled(&self, definition: &AbilityDefinition, segment: &Segment) -> bool {
        if segment.finish_all_tasks {
            return self.timeline.active.is_empty() && !self.has_unfinished_pending(segment);
        }
        !self.timeline.active.iter().any(|key| {
            definition
                .task(*key)
                .is_some_and(|slot| slot.task().desc().blocking)
        })
    }

    fn update_completion(
        &mut self,
        definition: &AbilityDefinition,
        services: &Services,
    ) -> Option<TaskResult> {
        let index = self.context.active_segment();
        let segment = definition.segment(index)?;
        let now = self.context.current_time();
        let mut commands = Vec::new();

        let max = segment.loop_max_iterations;
        if segment.looping
            && now >= segment.loop_end
            && (max == 0 || self.context.loop_iteration() + 1 < max)
        {
            self.loop_back(definition, services, segment, &mut commands);
            self.apply_commands(definition, services, commands);
            return self.timeline.end_requested;
        }

        if now < segment.length || !self.segment_settled(definition, segment) {
            return None;
        }

        let chosen = segment.branches.iter().find(|branch| {
            passes(
                &branch.conditions,
                &self.condition_env(definition, services),
                branch.must_pass_all,
            )
        });
        if let Some(branch) = chosen {
            match definition.segment_index(&branch.target) {
                Some(target) => {
                    let copy_targets = branch.copy_targets;
                    if let Err(err) = self.enter_segment(
                        definition,
                        services,
                        target,
                        copy_targets,
                        false,
                        target == index,
                        &mut commands,
                    ) {
                        warn!(error = %err, "Segment branch failed");
                    }
                    self.apply_commands(definition, services, commands);
                    return self.timeline.end_requested;
                }
                None => warn!(target = %branch.target, "Branch target does not resolve"),
            }
        }

        let stacking = definition.stacking();
        if stacking.decrement_and_restart_on_end {
            let remaining = self.context.stack_count().saturating_sub(stacking.decrement);
            self.set_stack_count(services, remaining);
            if remaining > 0 {
                if let Err(err) =
                    self.enter_segment(definition, services, index, true, false, true, &mut commands)
                {
                    warn!(error = %err, "Segment restart failed");
                }
                self.apply_commands(definition, services, commands);
                return self.timeline.end_requested;
            }
        }

        Some(TaskResult::Successful)
    }

    fn check_channel(&self, definition: &AbilityDefinition, services: &Services) -> Option<TaskResult> {
        let channel = definition.channel()?;
        let result = evaluate(
            &channel.conditions,
            &self.condition_env(definition, services),
            channel.must_pass_all,
        );
        if result == ConditionResult::Failed {
            let notify = channel
                .conditions
                .iter()
                .any(|condition| condition.requires_server_notification());
            info!(
                ability = %definition.name(),
                result = %channel.failure_result,
                notify_server = notify,
                "Channel check failed"
            );
            Some(channel.failure_result)
        } else {
            None
        }
    }
}
