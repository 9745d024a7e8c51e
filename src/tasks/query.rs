//! Raycast and overlap queries, synchronous or through the async bridge.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::context::AbilityContext;
use crate::core::pool::{PoolManager, ScratchPad};
use crate::core::query::{QueryHandle, QueryHit, QueryPoll, QueryRequest, QueryShape};
use crate::core::task::{Task, TaskContext, TaskDesc};
use crate::core::types::{CallbackResult, TargetType, TaskResult, Vec3};

/// Authored query settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTaskParams {
    /// Shape relative to the anchor.
    pub shape: QueryShape,
    /// Entity the shape follows.
    #[serde(default)]
    pub anchor: TargetType,
    /// Collision channels.
    #[serde(default)]
    pub channels: Vec<u32>,
    /// Stop at the first blocking hit.
    #[serde(default)]
    pub only_blocking_hit: bool,
    /// Issue through the async bridge when the scheduler allows it.
    #[serde(default)]
    pub use_async: bool,
    /// Copy hit entities into the context targets.
    #[serde(default)]
    pub add_to_targets: bool,
    /// Clear the targets before copying.
    #[serde(default)]
    pub clear_targets: bool,
    /// Keep duplicate targets.
    #[serde(default)]
    pub allow_duplicates: bool,
    /// Script event fired with the hits.
    #[serde(default)]
    pub event: Option<String>,
}

impl QueryTaskParams {
    /// Synchronous query with `shape`, results discarded.
    #[must_use]
    pub const fn new(shape: QueryShape) -> Self {
        Self {
            shape,
            anchor: TargetType::SelfActor,
            channels: Vec::new(),
            only_blocking_hit: false,
            use_async: false,
            add_to_targets: false,
            clear_targets: false,
            allow_duplicates: false,
            event: None,
        }
    }
}

/// Per-activation state of a [`QueryTask`].
#[derive(Debug, Default)]
pub struct QueryScratchPad {
    /// In-flight async query.
    pub handle: Option<QueryHandle>,
    /// Results were consumed; later polls are no-ops.
    pub processed: bool,
    /// Hits delivered with the result.
    pub hits: usize,
}

impl ScratchPad for QueryScratchPad {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Runs one query when it starts and consumes the result exactly once.
#[derive(Debug, Clone)]
pub struct QueryTask {
    desc: TaskDesc,
    params: QueryTaskParams,
}

impl QueryTask {
    /// Query task over `desc`.
    #[must_use]
    pub const fn new(desc: TaskDesc, params: QueryTaskParams) -> Self {
        Self { desc, params }
    }

    /// Authored settings.
    #[must_use]
    pub const fn params(&self) -> &QueryTaskParams {
        &self.params
    }

    fn request(&self, task: &TaskContext<'_>) -> QueryRequest {
        let context = task.context();
        let anchor = if self.params.anchor == TargetType::Location {
            context.target_location()
        } else {
            context
                .subjects(self.params.anchor)
                .first()
                .and_then(|entity| task.world().location(*entity))
        };
        QueryRequest {
            shape: self.params.shape.translated(anchor.unwrap_or(Vec3::ZERO)),
            channels: self.params.channels.clone(),
            only_blocking_hit: self.params.only_blocking_hit,
            ignore: context.self_entity(),
        }
    }

    fn consume(&self, task: &mut TaskContext<'_>, hits: &[QueryHit]) {
        if let Some(pad) = task.scratch_pad_mut::<QueryScratchPad>() {
            pad.handle = None;
            pad.processed = true;
            pad.hits = hits.len();
        }

        if self.params.add_to_targets {
            let context = task.context_mut();
            if self.params.clear_targets {
                context.clear_targets();
            }
            let entities: Vec<_> = hits.iter().map(|hit| hit.entity).collect();
            context.extend_targets(&entities, self.params.allow_duplicates);
        }

        if let Some(event) = &self.params.event {
            let hooks = task.hooks();
            if hooks.on_query_event(task.context_mut(), event, hits) == CallbackResult::IgnoreActors {
                let context = task.context_mut();
                context.retain_targets(|target| hits.iter().all(|hit| hit.entity != *target));
            }
        }

        if task.config().log_verbose && hits.is_empty() {
            debug!(task = %self.desc.id, "Query returned no hits");
        }
    }
}

impl Task for QueryTask {
    fn kind(&self) -> &'static str {
        "query"
    }

    fn desc(&self) -> &TaskDesc {
        &self.desc
    }

    fn needs_tick(&self) -> bool {
        false
    }

    fn is_async_friendly(&self) -> bool {
        self.params.use_async
    }

    fn uses_target_actors(&self) -> bool {
        self.params.anchor == TargetType::TargetActor
    }

    fn produces_targets(&self) -> bool {
        self.params.add_to_targets
    }

    fn is_done(&self, context: &AbilityContext) -> bool {
        let processed = context
            .scratch_pad::<QueryScratchPad>(self.key())
            .is_none_or(|pad| pad.processed);
        processed && context.current_time() >= self.end_time()
    }

    fn create_scratch_pad(&self, pools: &PoolManager) -> Option<Box<dyn ScratchPad>> {
        Some(pools.acquire_scratch_pad::<QueryScratchPad>())
    }

    fn on_task_start(&self, task: &mut TaskContext<'_>) {
        let request = self.request(task);
        if self.params.use_async && task.config().async_enabled {
            match task.queries().submit(request.clone()) {
                Ok(handle) => {
                    debug!(task = %self.desc.id, %handle, "Query submitted");
                    if let Some(pad) = task.scratch_pad_mut::<QueryScratchPad>() {
                        pad.handle = Some(handle);
                    }
                    return;
                }
                Err(err) => warn!(task = %self.desc.id, error = %err, "Async query rejected, running synchronously"),
            }
        }
        let hits = task.world().query(&request);
        self.consume(task, &hits);
    }

    fn poll_async(&self, task: &mut TaskContext<'_>) {
        let Some(handle) = task
            .scratch_pad::<QueryScratchPad>()
            .filter(|pad| !pad.processed)
            .and_then(|pad| pad.handle)
        else {
            return;
        };
        match task.queries().poll(handle) {
            QueryPoll::Pending => {}
            QueryPoll::Ready(hits) => self.consume(task, &hits),
            QueryPoll::Unknown => {
                debug!(task = %self.desc.id, %handle, "Query handle vanished, treating as empty");
                self.consume(task, &[]);
            }
        }
    }

    fn on_task_end(&self, task: &mut TaskContext<'_>, result: TaskResult) {
        let pending = task
            .scratch_pad_mut::<QueryScratchPad>()
            .and_then(|pad| pad.handle.take());
        if let Some(handle) = pending {
            task.queries().cancel(handle);
            debug!(task = %self.desc.id, %handle, %result, "Query cancelled before completion");
        }
    }
}
