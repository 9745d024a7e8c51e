//! Builders to construct a scheduler from configuration.

use std::sync::Arc;

use crate::config::{QueryConfig, SchedulerConfig};
use crate::core::events::EventSink;
use crate::core::pool::PoolManager;
use crate::core::query::QueryBridge;
use crate::core::scheduler::Scheduler;
use crate::core::services::Services;
use crate::core::world::World;
use crate::core::AbilityError;

/// Build a scheduler from configuration, using `query_factory` for the bridge.
///
/// # Errors
///
/// [`AbilityError::Config`] for invalid configuration, or whatever the
/// factory reports.
pub fn build_scheduler<FQ>(
    cfg: &SchedulerConfig,
    world: Arc<dyn World>,
    events: Arc<dyn EventSink>,
    mut query_factory: FQ,
) -> Result<Scheduler, AbilityError>
where
    FQ: FnMut(&QueryConfig) -> Result<Arc<dyn QueryBridge>, AbilityError>,
{
    cfg.validate()
        .map_err(|e| AbilityError::Config(format!("config invalid: {e}")))?;

    let queries = query_factory(&cfg.queries)?;
    let services = Services {
        pools: Arc::new(PoolManager::new(cfg.pools.clone())),
        queries,
        world,
        events,
        config: cfg.clone(),
    };
    Ok(Scheduler::with_services(services))
}

/// Query factory that spawns a [`WorkerQueryBridge`](crate::core::WorkerQueryBridge)
/// around `executor`.
#[cfg(all(feature = "tokio-runtime", not(target_arch = "wasm32")))]
pub fn worker_bridge<E>(executor: E) -> impl FnMut(&QueryConfig) -> Result<Arc<dyn QueryBridge>, AbilityError>
where
    E: crate::core::QueryExecutor,
{
    move |config: &QueryConfig| {
        let bridge = crate::core::WorkerQueryBridge::new(config.clone(), executor.clone())?;
        Ok(Arc::new(bridge) as Arc<dyn QueryBridge>)
    }
}

/// Query factory that hands out a shared [`ManualQueryBridge`](crate::core::ManualQueryBridge).
pub fn manual_bridge(
    bridge: Arc<crate::core::ManualQueryBridge>,
) -> impl FnMut(&QueryConfig) -> Result<Arc<dyn QueryBridge>, AbilityError> {
    move |_: &QueryConfig| Ok(Arc::clone(&bridge) as Arc<dyn QueryBridge>)
}
