//! Scratch-pad and context pools.
//!
//! Every task that keeps per-activation state owns a [`ScratchPad`] while its
//! context is live. Pads and contexts are recycled through a [`PoolManager`]
//! so steady-state activations do not allocate:
//!
//! - **Per-class buckets**: scratch pads are bucketed by concrete type
//! - **Reset on release**: a pad is reset before it re-enters its bucket, so
//!   `acquire` never observes state from a previous borrower
//! - **Bounded residency**: buckets and the context pool are capped; overflow is dropped
//! - **Degraded miss path**: an exhausted bucket allocates with a warning
//!
//! ```rust,ignore
//! let pools = PoolManager::new(PoolConfig::default());
//! let pad = pools.acquire_scratch_pad::<QueryScratchPad>();
//! // ... task uses the pad ...
//! pools.release_scratch_pad(pad);
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::core::context::AbilityContext;

/// Mutable per-task state that lives for one activation.
///
/// Implementations must restore their class default in [`ScratchPad::reset`];
/// the pool calls it before a pad becomes available again.
pub trait ScratchPad: Any + Send + Sync + fmt::Debug {
    /// Restore the default state.
    fn reset(&mut self);
}

/// Snapshot of pool activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Scratch pads handed out.
    pub scratch_pads_acquired: u64,
    /// Scratch pads served from a bucket.
    pub scratch_pads_reused: u64,
    /// Scratch pads constructed because no pooled pad was available.
    pub scratch_pads_allocated: u64,
    /// Scratch pads returned.
    pub scratch_pads_released: u64,
    /// Scratch pads dropped on release (cap reached or reuse disabled).
    pub scratch_pads_dropped: u64,
    /// Scratch pads currently resident across all buckets.
    pub scratch_pads_resident: usize,
    /// Contexts handed out.
    pub contexts_acquired: u64,
    /// Contexts constructed on a pool miss.
    pub contexts_allocated: u64,
    /// Contexts returned.
    pub contexts_released: u64,
    /// Contexts currently resident.
    pub contexts_resident: usize,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
struct PoolCounters {
    pads_acquired: AtomicU64,
    pads_reused: AtomicU64,
    pads_allocated: AtomicU64,
    pads_released: AtomicU64,
    pads_dropped: AtomicU64,
    contexts_acquired: AtomicU64,
    contexts_allocated: AtomicU64,
    contexts_released: AtomicU64,
}

impl PoolCounters {
    fn snapshot(&self, pads_resident: usize, contexts_resident: usize) -> PoolStats {
        PoolStats {
            scratch_pads_acquired: self.pads_acquired.load(Ordering::Relaxed),
            scratch_pads_reused: self.pads_reused.load(Ordering::Relaxed),
            scratch_pads_allocated: self.pads_allocated.load(Ordering::Relaxed),
            scratch_pads_released: self.pads_released.load(Ordering::Relaxed),
            scratch_pads_dropped: self.pads_dropped.load(Ordering::Relaxed),
            scratch_pads_resident: pads_resident,
            contexts_acquired: self.contexts_acquired.load(Ordering::Relaxed),
            contexts_allocated: self.contexts_allocated.load(Ordering::Relaxed),
            contexts_released: self.contexts_released.load(Ordering::Relaxed),
            contexts_resident,
        }
    }
}

/// One bucket per concrete scratch-pad type.
#[derive(Default)]
struct Bucket {
    name: &'static str,
    free: Vec<Box<dyn ScratchPad>>,
    allocated: usize,
}

/// Explicitly constructed owner of every pool the scheduler uses.
pub struct PoolManager {
    config: PoolConfig,
    scratch_pads: Mutex<HashMap<TypeId, Bucket>>,
    contexts: Mutex<Vec<Box<AbilityContext>>>,
    counters: PoolCounters,
}

impl fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolManager")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl PoolManager {
    /// Create pools and prewarm the context pool.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        let prewarm = if config.allow_reuse {
            config.initial_context_pool_size.min(config.max_context_pool_size)
        } else {
            0
        };
        let contexts = (0..prewarm).map(|_| Box::new(AbilityContext::new())).collect();

        info!(
            allow_reuse = config.allow_reuse,
            prewarmed_contexts = prewarm,
            max_scratch_pads_per_class = config.max_scratch_pads_per_class,
            "Ability pools initialized"
        );

        Self {
            config,
            scratch_pads: Mutex::new(HashMap::new()),
            contexts: Mutex::new(contexts),
            counters: PoolCounters::default(),
        }
    }

    /// Pool configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Take a scratch pad of type `T`, recycled if one is resident.
    pub fn acquire_scratch_pad<T>(&self) -> Box<dyn ScratchPad>
    where
        T: ScratchPad + Default,
    {
        self.counters.pads_acquired.fetch_add(1, Ordering::Relaxed);

        if self.config.allow_reuse {
            let mut buckets = self.scratch_pads.lock();
            let bucket = buckets.entry(TypeId::of::<T>()).or_insert_with(|| Bucket {
                name: type_name::<T>(),
                free: Vec::new(),
                allocated: 0,
            });
            if let Some(pad) = bucket.free.pop() {
                self.counters.pads_reused.fetch_add(1, Ordering::Relaxed);
                return pad;
            }
            if bucket.allocated > 0 {
                warn!(
                    class = bucket.name,
                    allocated = bucket.allocated,
                    "Scratch pad pool exhausted, allocating"
                );
            } else {
                debug!(class = bucket.name, "Allocating scratch pad");
            }
            bucket.allocated += 1;
        }

        self.counters.pads_allocated.fetch_add(1, Ordering::Relaxed);
        Box::new(T::default())
    }

    /// Reset a scratch pad and return it to its class bucket.
    pub fn release_scratch_pad(&self, mut pad: Box<dyn ScratchPad>) {
        pad.reset();
        self.counters.pads_released.fetch_add(1, Ordering::Relaxed);

        if !self.config.allow_reuse {
            self.counters.pads_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let class = {
            let any: &dyn Any = &*pad;
            any.type_id()
        };
        let mut buckets = self.scratch_pads.lock();
        let bucket = buckets.entry(class).or_default();
        if bucket.free.len() >= self.config.max_scratch_pads_per_class {
            self.counters.pads_dropped.fetch_add(1, Ordering::Relaxed);
            debug!(class = bucket.name, "Scratch pad bucket full, dropping pad");
            return;
        }
        bucket.free.push(pad);
    }

    /// Take a context, recycled if one is resident.
    pub fn acquire_context(&self) -> Box<AbilityContext> {
        self.counters.contexts_acquired.fetch_add(1, Ordering::Relaxed);
        if self.config.allow_reuse {
            if let Some(context) = self.contexts.lock().pop() {
                return context;
            }
            debug!("Context pool empty, allocating");
        }
        self.counters.contexts_allocated.fetch_add(1, Ordering::Relaxed);
        Box::new(AbilityContext::new())
    }

    /// Release every scratch pad the context holds, reset it, and pool it.
    pub fn release_context(&self, mut context: Box<AbilityContext>) {
        context.release_scratch_pads(self);
        context.reset();
        self.counters.contexts_released.fetch_add(1, Ordering::Relaxed);

        if !self.config.allow_reuse {
            return;
        }
        let mut contexts = self.contexts.lock();
        if contexts.len() < self.config.max_context_pool_size {
            contexts.push(context);
        }
    }

    /// Drop every pooled instance (world teardown).
    pub fn clear_all_pools(&self) {
        let pads = {
            let mut buckets = self.scratch_pads.lock();
            let count = buckets.values().map(|bucket| bucket.free.len()).sum::<usize>();
            buckets.clear();
            count
        };
        let contexts = {
            let mut contexts = self.contexts.lock();
            let count = contexts.len();
            contexts.clear();
            count
        };
        info!(
            scratch_pads = pads,
            contexts = contexts,
            "Cleared all ability pools"
        );
    }

    /// Number of pooled pads of type `T`.
    #[must_use]
    pub fn resident_scratch_pads<T: ScratchPad>(&self) -> usize {
        self.scratch_pads
            .lock()
            .get(&TypeId::of::<T>())
            .map_or(0, |bucket| bucket.free.len())
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let pads_resident = self
            .scratch_pads
            .lock()
            .values()
            .map(|bucket| bucket.free.len())
            .sum();
        let contexts_resident = self.contexts.lock().len();
        self.counters.snapshot(pads_resident, contexts_resident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct CounterPad {
        hits: u32,
    }

    impl ScratchPad for CounterPad {
        fn reset(&mut self) {
            self.hits = 0;
        }
    }

    fn config(max_per_class: usize) -> PoolConfig {
        PoolConfig {
            allow_reuse: true,
            initial_context_pool_size: 2,
            max_context_pool_size: 4,
            max_scratch_pads_per_class: max_per_class,
        }
    }

    #[test]
    fn released_pad_is_reset_before_reuse() {
        let pools = PoolManager::new(config(8));
        let mut pad = pools.acquire_scratch_pad::<CounterPad>();
        let any: &mut dyn Any = &mut *pad;
        any.downcast_mut::<CounterPad>().unwrap().hits = 7;
        pools.release_scratch_pad(pad);

        let pad = pools.acquire_scratch_pad::<CounterPad>();
        let any: &dyn Any = &*pad;
        assert_eq!(any.downcast_ref::<CounterPad>().unwrap().hits, 0);
        assert_eq!(pools.stats().scratch_pads_reused, 1);
    }

    #[test]
    fn bucket_cap_drops_overflow() {
        let pools = PoolManager::new(config(1));
        let a = pools.acquire_scratch_pad::<CounterPad>();
        let b = pools.acquire_scratch_pad::<CounterPad>();
        pools.release_scratch_pad(a);
        pools.release_scratch_pad(b);
        assert_eq!(pools.resident_scratch_pads::<CounterPad>(), 1);
        assert_eq!(pools.stats().scratch_pads_dropped, 1);
    }

    #[test]
    fn context_pool_is_prewarmed() {
        let pools = PoolManager::new(config(4));
        assert_eq!(pools.stats().contexts_resident, 2);
        let context = pools.acquire_context();
        assert_eq!(pools.stats().contexts_allocated, 0);
        pools.release_context(context);
        assert_eq!(pools.stats().contexts_resident, 2);
    }
}
