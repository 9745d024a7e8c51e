//! Frame-driven scheduler owning every live activation.
//!
//! The host calls [`Scheduler::tick`] once per frame. Activations whose
//! targeting is still waiting on an async query are parked and re-checked on
//! each tick before they get a live instance.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::core::condition::{passes, ConditionEnv};
use crate::core::context::{AbilityContext, ContextParams};
use crate::core::definition::AbilityDefinition;
use crate::core::error::AbilityError;
use crate::core::instance::{AbilityInstance, ContextModification, PendingTargets, Progress};
use crate::core::services::Services;
use crate::core::targeting::TargetingStatus;
use crate::core::types::{EntityHandle, StartResult, TaskResult, Vec3};

/// Inputs for one activation.
#[derive(Debug, Clone, Default)]
pub struct ActivationRequest {
    /// Owning entity; cooldowns and stacking are tracked per owner.
    pub owner: Option<EntityHandle>,
    /// Entity responsible for the activation.
    pub instigator: Option<EntityHandle>,
    /// Entity running the ability.
    pub self_entity: Option<EntityHandle>,
    /// Targets known up front.
    pub targets: Vec<EntityHandle>,
    /// Aim point.
    pub target_location: Option<Vec3>,
    /// Seed for the context random stream; random when unset.
    pub seed: Option<u64>,
    /// Segment to enter when no entry branch passes.
    pub entry_segment: Option<String>,
    /// Initial named parameters.
    pub params: ContextParams,
}

impl ActivationRequest {
    /// Empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the owner.
    #[must_use]
    pub const fn with_owner(mut self, owner: EntityHandle) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Set the instigator.
    #[must_use]
    pub const fn with_instigator(mut self, instigator: EntityHandle) -> Self {
        self.instigator = Some(instigator);
        self
    }

    /// Set the entity running the ability.
    #[must_use]
    pub const fn with_self_entity(mut self, entity: EntityHandle) -> Self {
        self.self_entity = Some(entity);
        self
    }

    /// Set the initial targets.
    #[must_use]
    pub fn with_targets(mut self, targets: impl IntoIterator<Item = EntityHandle>) -> Self {
        self.targets = targets.into_iter().collect();
        self
    }

    /// Set the aim point.
    #[must_use]
    pub const fn with_target_location(mut self, location: Vec3) -> Self {
        self.target_location = Some(location);
        self
    }

    /// Fix the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enter the named segment instead of the default entry.
    #[must_use]
    pub fn with_entry_segment(mut self, name: impl Into<String>) -> Self {
        self.entry_segment = Some(name.into());
        self
    }

    /// Seed named parameters.
    #[must_use]
    pub fn with_params(mut self, params: ContextParams) -> Self {
        self.params = params;
        self
    }
}

/// Outcome of [`Scheduler::activate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    /// What happened.
    pub result: StartResult,
    /// Id of the instance that is running, stacked or parked.
    pub id: Option<Uuid>,
}

impl Activation {
    const fn rejected(result: StartResult) -> Self {
        Self { result, id: None }
    }
}

/// What one [`Scheduler::tick`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Parked activations that resolved this tick.
    pub activated: Vec<(Uuid, StartResult)>,
    /// Instances that ended this tick.
    pub ended: Vec<(Uuid, TaskResult)>,
}

/// Counter snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Instances currently running.
    pub live: usize,
    /// Activations waiting on async targeting.
    pub parked: usize,
    /// Cooldowns still running.
    pub cooling_down: usize,
    /// Activations that produced an instance.
    pub started: u64,
    /// Activations absorbed as stacks.
    pub stacked: u64,
    /// Activations refused.
    pub rejected: u64,
    /// Instances ended.
    pub ended: u64,
}

#[derive(Debug, Default)]
struct Counters {
    started: u64,
    stacked: u64,
    rejected: u64,
    ended: u64,
}

struct ParkedActivation {
    definition: Arc<AbilityDefinition>,
    context: Box<AbilityContext>,
    entry_segment: Option<usize>,
}

type CooldownKey = (u32, Option<EntityHandle>);

/// Owns live ability instances and drives them frame by frame.
pub struct Scheduler {
    services: Services,
    instances: Vec<AbilityInstance>,
    parked: Vec<ParkedActivation>,
    cooldowns: HashMap<CooldownKey, f32>,
    counters: Counters,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("services", &self.services)
            .field("live", &self.instances.len())
            .field("parked", &self.parked.len())
            .field("cooldowns", &self.cooldowns.len())
            .finish()
    }
}

impl Scheduler {
    /// Scheduler with default services for `config`.
    ///
    /// # Errors
    ///
    /// [`AbilityError::Config`] when the configuration is invalid.
    pub fn new(config: SchedulerConfig) -> Result<Self, AbilityError> {
        config.validate().map_err(AbilityError::Config)?;
        Ok(Self::with_services(Services::new(config)))
    }

    /// Scheduler over caller-provided services.
    #[must_use]
    pub fn with_services(services: Services) -> Self {
        info!(
            net_mode = ?services.config.net_mode,
            async_enabled = services.config.async_enabled,
            "Ability scheduler created"
        );
        Self {
            services,
            instances: Vec::new(),
            parked: Vec::new(),
            cooldowns: HashMap::new(),
            counters: Counters::default(),
        }
    }

    /// Shared services.
    #[must_use]
    pub const fn services(&self) -> &Services {
        &self.services
    }

    /// Try to start `definition`.
    ///
    /// Refusals (cooldown, missing target, failed custom check) are reported
    /// through [`Activation::result`], not as errors.
    ///
    /// # Errors
    ///
    /// [`AbilityError::UnknownSegment`] when the request names a segment the
    /// definition does not have.
    pub fn activate(
        &mut self,
        definition: &Arc<AbilityDefinition>,
        request: ActivationRequest,
    ) -> Result<Activation, AbilityError> {
        let entry_segment = request
            .entry_segment
            .as_deref()
            .map(|name| {
                definition
                    .segment_index(name)
                    .ok_or_else(|| AbilityError::UnknownSegment(name.to_string()))
            })
            .transpose()?;

        let key = (definition.name_hash(), request.owner);
        if let Some(remaining) = self.cooldowns.get(&key) {
            debug!(ability = %definition.name(), remaining, "Activation refused, on cooldown");
            self.counters.rejected += 1;
            return Ok(Activation::rejected(StartResult::OnCooldown));
        }

        if definition.is_stackable() {
            let services = &self.services;
            let stacked = self.instances.iter_mut().find(|instance| {
                instance.definition().name_hash() == definition.name_hash()
                    && instance.context().owner() == request.owner
            });
            if let Some(instance) = stacked {
                let count = instance
                    .context()
                    .stack_count()
                    .saturating_add(definition.stacking().increment);
                instance.set_stack_count(services, count);
                instance.reset_decay();
                self.counters.stacked += 1;
                debug!(
                    ability = %definition.name(),
                    activation = %instance.activation_id(),
                    stacks = instance.context().stack_count(),
                    "Activation stacked"
                );
                return Ok(Activation {
                    result: StartResult::Stacked,
                    id: Some(instance.activation_id()),
                });
            }
        }

        let mut context = self.services.pools.acquire_context();
        let seed = request.seed.unwrap_or_else(rand::random);
        context.begin_activation(definition.name_hash(), seed);
        context.set_owner(request.owner);
        context.set_instigator(request.instigator);
        context.set_self_entity(request.self_entity);
        context.extend_targets(&request.targets, false);
        context.set_target_location(request.target_location);
        context.apply_params(&request.params);
        let max_stacks = definition
            .hooks()
            .calculate_max_stacks(&context, definition.stacking().max);
        context.set_max_stacks(max_stacks);

        if let Some(targeting) = definition.targeting() {
            if targeting.find_targets(&mut context, &self.services) == TargetingStatus::Pending {
                let id = context.activation_id();
                debug!(ability = %definition.name(), activation = %id, "Activation parked on async targeting");
                self.parked.push(ParkedActivation {
                    definition: Arc::clone(definition),
                    context,
                    entry_segment,
                });
                return Ok(Activation {
                    result: StartResult::AsyncProcessing,
                    id: Some(id),
                });
            }
        }

        Ok(self.finish_activation(Arc::clone(definition), context, entry_segment))
    }

    fn finish_activation(
        &mut self,
        definition: Arc<AbilityDefinition>,
        mut context: Box<AbilityContext>,
        entry_segment: Option<usize>,
    ) -> Activation {
        if definition.requires_target() && !context.has_targets() {
            debug!(ability = %definition.name(), "Activation refused, no target");
            self.services.pools.release_context(context);
            self.counters.rejected += 1;
            return Activation::rejected(StartResult::InvalidTarget);
        }
        if !definition.hooks().custom_can_execute(&context) {
            debug!(ability = %definition.name(), "Activation refused by custom check");
            self.services.pools.release_context(context);
            self.counters.rejected += 1;
            return Activation::rejected(StartResult::FailedCustomCheck);
        }

        context.set_stack_count(definition.stacking().initial);
        let entry = self.entry_segment(&definition, &context, entry_segment);
        let instance = AbilityInstance::start(Arc::clone(&definition), context, &self.services, entry);
        let id = instance.activation_id();

        let cooldown = definition
            .hooks()
            .calculate_cooldown(instance.context(), definition.cooldown());
        if cooldown > 0.0 {
            self.cooldowns
                .insert((definition.name_hash(), instance.context().owner()), cooldown);
        }

        self.instances.push(instance);
        self.counters.started += 1;
        Activation {
            result: StartResult::Success,
            id: Some(id),
        }
    }

    fn entry_segment(
        &self,
        definition: &AbilityDefinition,
        context: &AbilityContext,
        explicit: Option<usize>,
    ) -> usize {
        let env = ConditionEnv {
            context,
            world: self.services.world.as_ref(),
            hooks: definition.hooks(),
            net_mode: self.services.config.net_mode,
        };
        definition
            .entry_branches()
            .iter()
            .find(|branch| passes(&branch.conditions, &env, branch.must_pass_all))
            .and_then(|branch| definition.segment_index(&branch.target))
            .or(explicit)
            .unwrap_or_else(|| definition.entry_index())
    }

    /// Advance cooldowns, every live instance and parked activations.
    pub fn tick(&mut self, delta: f32) -> TickReport {
        let delta = delta.max(0.0);
        let mut report = TickReport::default();

        self.cooldowns.retain(|_, remaining| {
            *remaining -= delta;
            *remaining > 0.0
        });

        let mut index = 0;
        while index < self.instances.len() {
            match self.instances[index].advance(&self.services, delta) {
                Progress::Running => index += 1,
                Progress::Ended(result) => {
                    let instance = self.instances.remove(index);
                    report.ended.push((instance.activation_id(), result));
                    self.retire(instance, result);
                }
            }
        }

        for mut parked in std::mem::take(&mut self.parked) {
            let status = parked
                .definition
                .targeting()
                .map_or(TargetingStatus::Ready, |targeting| {
                    targeting.poll(&mut parked.context, &self.services)
                });
            if status == TargetingStatus::Pending {
                self.parked.push(parked);
                continue;
            }
            let id = parked.context.activation_id();
            let activation = self.finish_activation(parked.definition, parked.context, parked.entry_segment);
            report.activated.push((id, activation.result));
        }

        report
    }

    fn retire(&mut self, mut instance: AbilityInstance, result: TaskResult) {
        instance.end(&self.services, result);
        self.services.pools.release_context(instance.into_context());
        self.counters.ended += 1;
    }

    /// End an activation early, parked ones included.
    ///
    /// # Errors
    ///
    /// [`AbilityError::UnknownActivation`] when nothing carries `id`.
    pub fn cancel(&mut self, id: Uuid, result: TaskResult) -> Result<(), AbilityError> {
        if let Some(index) = self.instances.iter().position(|i| i.activation_id() == id) {
            let instance = self.instances.remove(index);
            self.retire(instance, result);
            return Ok(());
        }
        if let Some(index) = self
            .parked
            .iter()
            .position(|parked| parked.context.activation_id() == id)
        {
            let parked = self.parked.remove(index);
            if let Some(handle) = parked.context.targeting_query() {
                self.services.queries.cancel(handle);
            }
            self.services.pools.release_context(parked.context);
            return Ok(());
        }
        Err(AbilityError::UnknownActivation(id))
    }

    /// End every live and parked activation.
    pub fn cancel_all(&mut self, result: TaskResult) {
        let ids: Vec<Uuid> = self
            .instances
            .iter()
            .map(AbilityInstance::activation_id)
            .chain(self.parked.iter().map(|parked| parked.context.activation_id()))
            .collect();
        for id in ids {
            if let Err(err) = self.cancel(id, result) {
                warn!(error = %err, "Activation vanished during cancel_all");
            }
        }
    }

    /// Switch the active segment of a live instance.
    ///
    /// Returns `false` when `index` is already active.
    ///
    /// # Errors
    ///
    /// Unknown activation or out-of-range segment index.
    pub fn branch_segment(&mut self, id: Uuid, index: usize) -> Result<bool, AbilityError> {
        let services = &self.services;
        let instance = self
            .instances
            .iter_mut()
            .find(|instance| instance.activation_id() == id)
            .ok_or(AbilityError::UnknownActivation(id))?;
        instance.branch_segment(services, index)
    }

    /// Queue targets for a live instance; applied on its next advance.
    ///
    /// # Errors
    ///
    /// [`AbilityError::UnknownActivation`] when no instance carries `id`.
    pub fn add_additional_targets(
        &mut self,
        id: Uuid,
        targets: Vec<EntityHandle>,
        allow_duplicates: bool,
        clear_first: bool,
    ) -> Result<(), AbilityError> {
        self.instance_mut(id)?.queue_targets(PendingTargets {
            targets,
            allow_duplicates,
            clear_first,
        });
        Ok(())
    }

    /// Queue a context change for a live instance.
    ///
    /// # Errors
    ///
    /// [`AbilityError::UnknownActivation`] when no instance carries `id`.
    pub fn modify_context(&mut self, id: Uuid, modification: ContextModification) -> Result<(), AbilityError> {
        self.instance_mut(id)?.queue_modification(modification);
        Ok(())
    }

    /// Overwrite the stack count of a live instance (clamped to its max).
    ///
    /// # Errors
    ///
    /// [`AbilityError::UnknownActivation`] when no instance carries `id`.
    pub fn set_stack_count(&mut self, id: Uuid, count: u32) -> Result<(), AbilityError> {
        let services = &self.services;
        let instance = self
            .instances
            .iter_mut()
            .find(|instance| instance.activation_id() == id)
            .ok_or(AbilityError::UnknownActivation(id))?;
        instance.set_stack_count(services, count);
        Ok(())
    }

    /// Set a float parameter on a live context right away.
    ///
    /// # Errors
    ///
    /// [`AbilityError::UnknownActivation`] when no instance carries `id`.
    pub fn set_float_parameter(&mut self, id: Uuid, name: &str, value: f32) -> Result<(), AbilityError> {
        self.instance_mut(id)?
            .context_mut()
            .set_float_parameter(name, value);
        Ok(())
    }

    fn instance_mut(&mut self, id: Uuid) -> Result<&mut AbilityInstance, AbilityError> {
        self.instances
            .iter_mut()
            .find(|instance| instance.activation_id() == id)
            .ok_or(AbilityError::UnknownActivation(id))
    }

    /// Live instance by id.
    #[must_use]
    pub fn instance(&self, id: Uuid) -> Option<&AbilityInstance> {
        self.instances.iter().find(|instance| instance.activation_id() == id)
    }

    /// Every live instance, in activation order.
    #[must_use]
    pub fn instances(&self) -> &[AbilityInstance] {
        &self.instances
    }

    /// Whether `id` is waiting on async targeting.
    #[must_use]
    pub fn is_parked(&self, id: Uuid) -> bool {
        self.parked
            .iter()
            .any(|parked| parked.context.activation_id() == id)
    }

    /// Seconds of cooldown left for `definition` and `owner`.
    #[must_use]
    pub fn cooldown_remaining(&self, definition: &AbilityDefinition, owner: Option<EntityHandle>) -> f32 {
        self.cooldowns
            .get(&(definition.name_hash(), owner))
            .copied()
            .unwrap_or(0.0)
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            live: self.instances.len(),
            parked: self.parked.len(),
            cooling_down: self.cooldowns.len(),
            started: self.counters.started,
            stacked: self.counters.stacked,
            rejected: self.counters.rejected,
            ended: self.counters.ended,
        }
    }

    /// Cancel everything and drain the pools (world teardown).
    pub fn shutdown(&mut self) {
        self.cancel_all(TaskResult::Interrupted);
        self.cooldowns.clear();
        self.services.pools.clear_all_pools();
        info!("Ability scheduler shut down");
    }
}
