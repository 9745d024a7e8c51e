//! Shared collaborators handed to tasks, targeting and the scheduler.

use std::fmt;
use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::core::events::{EventSink, NullEventSink};
use crate::core::pool::PoolManager;
use crate::core::query::{ManualQueryBridge, QueryBridge};
use crate::core::world::{NullWorld, World};

/// Everything outside an activation that its tasks may touch.
#[derive(Clone)]
pub struct Services {
    /// Scratch-pad and context pools.
    pub pools: Arc<PoolManager>,
    /// Async query bridge.
    pub queries: Arc<dyn QueryBridge>,
    /// Host world lookups.
    pub world: Arc<dyn World>,
    /// Lifecycle event sink.
    pub events: Arc<dyn EventSink>,
    /// Scheduler configuration.
    pub config: SchedulerConfig,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("pools", &self.pools)
            .field("queries_in_flight", &self.queries.in_flight())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Services {
    /// Services with fresh pools, a manual query bridge, an empty world and
    /// no event recording.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            pools: Arc::new(PoolManager::new(config.pools.clone())),
            queries: Arc::new(ManualQueryBridge::new()),
            world: Arc::new(NullWorld),
            events: Arc::new(NullEventSink),
            config,
        }
    }
}
