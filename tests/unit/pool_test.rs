//! Tests for scratch-pad and context pooling

use ability_timeline::config::PoolConfig;
use ability_timeline::core::{EntityHandle, PoolManager, ScratchPad, TaskKey};

#[derive(Debug, Default)]
struct HitPad {
    hits: Vec<u32>,
}

impl ScratchPad for HitPad {
    fn reset(&mut self) {
        self.hits.clear();
    }
}

#[derive(Debug, Default)]
struct FlagPad {
    fired: bool,
}

impl ScratchPad for FlagPad {
    fn reset(&mut self) {
        self.fired = false;
    }
}

fn pools(allow_reuse: bool) -> PoolManager {
    PoolManager::new(PoolConfig {
        allow_reuse,
        initial_context_pool_size: 1,
        max_context_pool_size: 2,
        max_scratch_pads_per_class: 4,
    })
}

#[test]
fn test_disabled_reuse_drops_every_release() {
    let pools = pools(false);
    assert_eq!(pools.stats().contexts_resident, 0);

    let pad = pools.acquire_scratch_pad::<HitPad>();
    pools.release_scratch_pad(pad);
    let pad = pools.acquire_scratch_pad::<HitPad>();
    pools.release_scratch_pad(pad);

    let stats = pools.stats();
    assert_eq!(stats.scratch_pads_allocated, 2);
    assert_eq!(stats.scratch_pads_reused, 0);
    assert_eq!(stats.scratch_pads_dropped, 2);
    assert_eq!(pools.resident_scratch_pads::<HitPad>(), 0);
}

#[test]
fn test_buckets_are_per_class() {
    let pools = pools(true);
    let hit = pools.acquire_scratch_pad::<HitPad>();
    let flag = pools.acquire_scratch_pad::<FlagPad>();
    pools.release_scratch_pad(hit);
    pools.release_scratch_pad(flag);

    assert_eq!(pools.resident_scratch_pads::<HitPad>(), 1);
    assert_eq!(pools.resident_scratch_pads::<FlagPad>(), 1);
    assert_eq!(pools.stats().scratch_pads_resident, 2);
}

#[test]
fn test_released_context_comes_back_reset() {
    let pools = pools(true);
    let mut context = pools.acquire_context();
    context.begin_activation(42, 7);
    context.set_owner(Some(EntityHandle::new(9, 1)));
    context.add_target(EntityHandle::new(3, 0));
    context.set_float_parameter("Power", 2.5);
    let mut pad = pools.acquire_scratch_pad::<HitPad>();
    {
        let any: &mut dyn std::any::Any = &mut *pad;
        any.downcast_mut::<HitPad>().unwrap().hits.push(1);
    }
    context.insert_scratch_pad(TaskKey(1), pad);
    pools.release_context(context);

    assert_eq!(pools.resident_scratch_pads::<HitPad>(), 1);
    let context = pools.acquire_context();
    assert!(context.activation_id().is_nil());
    assert_eq!(context.ability_name_hash(), 0);
    assert_eq!(context.owner(), None);
    assert!(context.targets().is_empty());
    assert_eq!(context.find_float_parameter("Power"), None);
    assert_eq!(context.scratch_pad_count(), 0);

    let pad = pools.acquire_scratch_pad::<HitPad>();
    let any: &dyn std::any::Any = &*pad;
    assert!(any.downcast_ref::<HitPad>().unwrap().hits.is_empty());
}

#[test]
fn test_context_pool_is_capped() {
    let pools = pools(true);
    let contexts: Vec<_> = (0..4).map(|_| pools.acquire_context()).collect();
    assert_eq!(pools.stats().contexts_allocated, 3);
    for context in contexts {
        pools.release_context(context);
    }
    assert_eq!(pools.stats().contexts_resident, 2);
    assert_eq!(pools.stats().contexts_released, 4);
}

#[test]
fn test_clear_all_pools() {
    let pools = pools(true);
    let pad = pools.acquire_scratch_pad::<FlagPad>();
    pools.release_scratch_pad(pad);
    pools.clear_all_pools();

    let stats = pools.stats();
    assert_eq!(stats.scratch_pads_resident, 0);
    assert_eq!(stats.contexts_resident, 0);
}
