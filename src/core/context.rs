//! Live, pooled state of one ability activation.

use std::any::Any;
use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::core::pool::{PoolManager, ScratchPad};
use crate::core::query::QueryHandle;
use crate::core::types::{EntityHandle, TargetType, TaskKey, Vec3};

/// Named per-activation parameters set by callers and tasks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextParams {
    ints: HashMap<String, i64>,
    floats: HashMap<String, f32>,
    strings: HashMap<String, String>,
    vectors: HashMap<String, Vec3>,
}

impl ContextParams {
    /// Empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an integer parameter.
    #[must_use]
    pub fn with_int(mut self, name: impl Into<String>, value: i64) -> Self {
        self.ints.insert(name.into(), value);
        self
    }

    /// Add a float parameter.
    #[must_use]
    pub fn with_float(mut self, name: impl Into<String>, value: f32) -> Self {
        self.floats.insert(name.into(), value);
        self
    }

    /// Add a string parameter.
    #[must_use]
    pub fn with_string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.strings.insert(name.into(), value.into());
        self
    }

    /// Add a vector parameter.
    #[must_use]
    pub fn with_vector(mut self, name: impl Into<String>, value: Vec3) -> Self {
        self.vectors.insert(name.into(), value);
        self
    }

    /// Whether no parameter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ints.is_empty()
            && self.floats.is_empty()
            && self.strings.is_empty()
            && self.vectors.is_empty()
    }

    fn merge(&mut self, other: &Self) {
        self.ints.extend(other.ints.iter().map(|(k, v)| (k.clone(), *v)));
        self.floats.extend(other.floats.iter().map(|(k, v)| (k.clone(), *v)));
        self.strings
            .extend(other.strings.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.vectors.extend(other.vectors.iter().map(|(k, v)| (k.clone(), *v)));
    }

    fn clear(&mut self) {
        self.ints.clear();
        self.floats.clear();
        self.strings.clear();
        self.vectors.clear();
    }
}

/// One live activation: time cursor, targets, stacks and scratch pads.
///
/// Contexts are handed out by [`PoolManager::acquire_context`] and returned
/// through [`PoolManager::release_context`], which releases every scratch pad
/// before the context is reset.
#[derive(Debug)]
pub struct AbilityContext {
    activation_id: Uuid,
    ability_name_hash: u32,
    self_entity: Option<EntityHandle>,
    owner: Option<EntityHandle>,
    instigator: Option<EntityHandle>,
    targets: Vec<EntityHandle>,
    target_location: Option<Vec3>,
    current_time: f32,
    last_delta: f32,
    active_segment: usize,
    loop_iteration: u32,
    stack_count: u32,
    max_stacks: u32,
    params: ContextParams,
    random_seed: u64,
    rng: StdRng,
    scratch_pads: HashMap<TaskKey, Box<dyn ScratchPad>>,
    targeting_query: Option<QueryHandle>,
}

impl Default for AbilityContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AbilityContext {
    /// Blank context; normally obtained from a pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            activation_id: Uuid::nil(),
            ability_name_hash: 0,
            self_entity: None,
            owner: None,
            instigator: None,
            targets: Vec::new(),
            target_location: None,
            current_time: 0.0,
            last_delta: 0.0,
            active_segment: 0,
            loop_iteration: 0,
            stack_count: 0,
            max_stacks: 0,
            params: ContextParams::default(),
            random_seed: 0,
            rng: StdRng::seed_from_u64(0),
            scratch_pads: HashMap::new(),
            targeting_query: None,
        }
    }

    /// Stamp a fresh activation onto a blank context.
    pub fn begin_activation(&mut self, ability_name_hash: u32, seed: u64) {
        self.activation_id = Uuid::new_v4();
        self.ability_name_hash = ability_name_hash;
        self.random_seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Unique id of this activation.
    #[must_use]
    pub const fn activation_id(&self) -> Uuid {
        self.activation_id
    }

    /// Name hash of the running definition.
    #[must_use]
    pub const fn ability_name_hash(&self) -> u32 {
        self.ability_name_hash
    }

    /// Entity running the ability.
    #[must_use]
    pub const fn self_entity(&self) -> Option<EntityHandle> {
        self.self_entity
    }

    /// Set the entity running the ability.
    pub fn set_self_entity(&mut self, entity: Option<EntityHandle>) {
        self.self_entity = entity;
    }

    /// Owner entity.
    #[must_use]
    pub const fn owner(&self) -> Option<EntityHandle> {
        self.owner
    }

    /// Set the owner entity.
    pub fn set_owner(&mut self, entity: Option<EntityHandle>) {
        self.owner = entity;
    }

    /// Instigator entity.
    #[must_use]
    pub const fn instigator(&self) -> Option<EntityHandle> {
        self.instigator
    }

    /// Set the instigator entity.
    pub fn set_instigator(&mut self, entity: Option<EntityHandle>) {
        self.instigator = entity;
    }

    /// Ordered target list.
    #[must_use]
    pub fn targets(&self) -> &[EntityHandle] {
        &self.targets
    }

    /// Whether any target is recorded.
    #[must_use]
    pub fn has_targets(&self) -> bool {
        !self.targets.is_empty()
    }

    /// Append a target unless it is already present.
    ///
    /// Returns `true` if the target was added.
    pub fn add_target(&mut self, entity: EntityHandle) -> bool {
        if self.targets.contains(&entity) {
            return false;
        }
        self.targets.push(entity);
        true
    }

    /// Append targets, skipping duplicates unless `allow_duplicates`.
    pub fn extend_targets(&mut self, entities: &[EntityHandle], allow_duplicates: bool) {
        for &entity in entities {
            if allow_duplicates {
                self.targets.push(entity);
            } else {
                self.add_target(entity);
            }
        }
    }

    /// Entities a [`TargetType`] selects on this context.
    ///
    /// `Location` selects no entity.
    #[must_use]
    pub fn subjects(&self, target: TargetType) -> Vec<EntityHandle> {
        match target {
            TargetType::SelfActor => self.self_entity.into_iter().collect(),
            TargetType::Owner => self.owner.into_iter().collect(),
            TargetType::Instigator => self.instigator.into_iter().collect(),
            TargetType::TargetActor => self.targets.clone(),
            TargetType::Location => Vec::new(),
        }
    }

    /// Remove every target.
    pub fn clear_targets(&mut self) {
        self.targets.clear();
    }

    /// Keep only targets accepted by `keep`.
    pub fn retain_targets(&mut self, keep: impl FnMut(&EntityHandle) -> bool) {
        self.targets.retain(keep);
    }

    /// Target location, if any.
    #[must_use]
    pub const fn target_location(&self) -> Option<Vec3> {
        self.target_location
    }

    /// Set the target location.
    pub fn set_target_location(&mut self, location: Option<Vec3>) {
        self.target_location = location;
    }

    /// Time cursor within the active segment.
    #[must_use]
    pub const fn current_time(&self) -> f32 {
        self.current_time
    }

    pub(crate) fn set_current_time(&mut self, time: f32) {
        self.current_time = time;
    }

    pub(crate) fn advance_time(&mut self, delta: f32) {
        self.current_time += delta;
        self.last_delta = delta;
    }

    /// Scaled delta applied by the last advance.
    #[must_use]
    pub const fn last_delta(&self) -> f32 {
        self.last_delta
    }

    /// Index of the active segment.
    #[must_use]
    pub const fn active_segment(&self) -> usize {
        self.active_segment
    }

    pub(crate) fn set_active_segment(&mut self, index: usize) {
        self.active_segment = index;
    }

    /// Completed traversals of the active segment's loop range.
    #[must_use]
    pub const fn loop_iteration(&self) -> u32 {
        self.loop_iteration
    }

    pub(crate) fn set_loop_iteration(&mut self, iteration: u32) {
        self.loop_iteration = iteration;
    }

    /// Current stack count.
    #[must_use]
    pub const fn stack_count(&self) -> u32 {
        self.stack_count
    }

    /// Stack cap applied by [`Self::set_stack_count`] (0 = unbounded).
    #[must_use]
    pub const fn max_stacks(&self) -> u32 {
        self.max_stacks
    }

    pub(crate) fn set_max_stacks(&mut self, max: u32) {
        self.max_stacks = max;
    }

    /// Set the stack count, clamped to the cap when one is set.
    pub fn set_stack_count(&mut self, count: u32) {
        self.stack_count = if self.max_stacks > 0 {
            count.min(self.max_stacks)
        } else {
            count
        };
    }

    /// Seed the random stream was created from.
    #[must_use]
    pub const fn random_seed(&self) -> u64 {
        self.random_seed
    }

    /// Deterministic per-activation random stream.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Uniform float in `[low, high)` from the activation stream.
    pub fn random_range(&mut self, low: f32, high: f32) -> f32 {
        if high <= low {
            return low;
        }
        self.rng.random_range(low..high)
    }

    /// Copy every parameter in `params` onto the context, overwriting same names.
    pub fn apply_params(&mut self, params: &ContextParams) {
        self.params.merge(params);
    }

    /// Store an integer parameter.
    pub fn set_int_parameter(&mut self, name: impl Into<String>, value: i64) {
        self.params.ints.insert(name.into(), value);
    }

    /// Read an integer parameter (0 when missing).
    #[must_use]
    pub fn int_parameter(&self, name: &str) -> i64 {
        self.params.ints.get(name).copied().unwrap_or_default()
    }

    /// Store a float parameter.
    pub fn set_float_parameter(&mut self, name: impl Into<String>, value: f32) {
        self.params.floats.insert(name.into(), value);
    }

    /// Read a float parameter (0.0 when missing).
    #[must_use]
    pub fn float_parameter(&self, name: &str) -> f32 {
        self.params.floats.get(name).copied().unwrap_or_default()
    }

    /// Float parameter, if set.
    #[must_use]
    pub fn find_float_parameter(&self, name: &str) -> Option<f32> {
        self.params.floats.get(name).copied()
    }

    /// Store a string parameter.
    pub fn set_string_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.strings.insert(name.into(), value.into());
    }

    /// Read a string parameter (empty when missing).
    #[must_use]
    pub fn string_parameter(&self, name: &str) -> &str {
        self.params.strings.get(name).map_or("", String::as_str)
    }

    /// Store a vector parameter.
    pub fn set_vector_parameter(&mut self, name: impl Into<String>, value: Vec3) {
        self.params.vectors.insert(name.into(), value);
    }

    /// Read a vector parameter (origin when missing).
    #[must_use]
    pub fn vector_parameter(&self, name: &str) -> Vec3 {
        self.params.vectors.get(name).copied().unwrap_or_default()
    }

    /// Pending async targeting query, if any.
    #[must_use]
    pub const fn targeting_query(&self) -> Option<QueryHandle> {
        self.targeting_query
    }

    /// Record or clear the async targeting query handle.
    pub fn set_targeting_query(&mut self, handle: Option<QueryHandle>) {
        self.targeting_query = handle;
    }

    /// Attach a scratch pad for `task`, returning any pad it replaces.
    pub fn insert_scratch_pad(
        &mut self,
        task: TaskKey,
        pad: Box<dyn ScratchPad>,
    ) -> Option<Box<dyn ScratchPad>> {
        self.scratch_pads.insert(task, pad)
    }

    /// Whether `task` already has a scratch pad.
    #[must_use]
    pub fn has_scratch_pad(&self, task: TaskKey) -> bool {
        self.scratch_pads.contains_key(&task)
    }

    /// Typed view of the scratch pad for `task`.
    #[must_use]
    pub fn scratch_pad<T: ScratchPad>(&self, task: TaskKey) -> Option<&T> {
        let pad = self.scratch_pads.get(&task)?;
        let any: &dyn Any = &**pad;
        any.downcast_ref::<T>()
    }

    /// Typed mutable view of the scratch pad for `task`.
    pub fn scratch_pad_mut<T: ScratchPad>(&mut self, task: TaskKey) -> Option<&mut T> {
        let pad = self.scratch_pads.get_mut(&task)?;
        let any: &mut dyn Any = &mut **pad;
        any.downcast_mut::<T>()
    }

    /// Restore the scratch pad for `task` to its default; `false` if absent.
    pub fn reset_scratch_pad(&mut self, task: TaskKey) -> bool {
        match self.scratch_pads.get_mut(&task) {
            Some(pad) => {
                pad.reset();
                true
            }
            None => false,
        }
    }

    /// Number of scratch pads currently held.
    #[must_use]
    pub fn scratch_pad_count(&self) -> usize {
        self.scratch_pads.len()
    }

    /// Return every scratch pad to its pool.
    pub fn release_scratch_pads(&mut self, pools: &PoolManager) {
        for (_, pad) in self.scratch_pads.drain() {
            pools.release_scratch_pad(pad);
        }
    }

    /// Clear everything so the context can be recycled.
    ///
    /// Scratch pads still attached are dropped, not pooled; call
    /// [`Self::release_scratch_pads`] first.
    pub fn reset(&mut self) {
        self.activation_id = Uuid::nil();
        self.ability_name_hash = 0;
        self.self_entity = None;
        self.owner = None;
        self.instigator = None;
        self.targets.clear();
        self.target_location = None;
        self.current_time = 0.0;
        self.last_delta = 0.0;
        self.active_segment = 0;
        self.loop_iteration = 0;
        self.stack_count = 0;
        self.max_stacks = 0;
        self.params.clear();
        self.random_seed = 0;
        self.rng = StdRng::seed_from_u64(0);
        self.scratch_pads.clear();
        self.targeting_query = None;
    }
}
