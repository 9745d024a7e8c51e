//! Async query bridge.
//!
//! Long-running shape and ray queries are the only place real concurrency
//! enters the scheduler. A task submits a [`QueryRequest`] through a
//! [`QueryBridge`], stores the returned [`QueryHandle`] in its scratch pad and
//! polls it on later ticks. Results are never awaited on the frame thread.
//!
//! - **Exactly-once delivery**: `poll` yields `Ready` at most once per handle
//! - **Cancellation is local**: a task ending early calls `cancel`, and a
//!   result arriving afterwards is discarded
//!
//! Two bridges ship with the crate: [`WorkerQueryBridge`] runs queries on
//! dedicated worker threads, and [`ManualQueryBridge`] is completed by the
//! host, which keeps frame-driven tests deterministic.

mod manual;
#[cfg(all(feature = "tokio-runtime", not(target_arch = "wasm32")))]
mod worker;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::QueryError;
use crate::core::types::{EntityHandle, Vec3};

pub use manual::ManualQueryBridge;
#[cfg(all(feature = "tokio-runtime", not(target_arch = "wasm32")))]
pub use worker::{QueryStats, WorkerQueryBridge};

/// Opaque identifier of an in-flight query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryHandle(pub u64);

impl fmt::Display for QueryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query#{}", self.0)
    }
}

/// Geometry of a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum QueryShape {
    /// Line trace from `start` to `end`.
    Ray {
        /// Trace origin.
        start: Vec3,
        /// Trace end.
        end: Vec3,
    },
    /// Sphere overlap.
    Sphere {
        /// Sphere center.
        center: Vec3,
        /// Sphere radius.
        radius: f32,
    },
    /// Axis-aligned box overlap.
    Box {
        /// Box center.
        center: Vec3,
        /// Half size on each axis.
        half_extents: Vec3,
    },
}

impl QueryShape {
    /// Same shape moved by `offset`.
    #[must_use]
    pub fn translated(self, offset: Vec3) -> Self {
        match self {
            Self::Ray { start, end } => Self::Ray {
                start: start + offset,
                end: end + offset,
            },
            Self::Sphere { center, radius } => Self::Sphere {
                center: center + offset,
                radius,
            },
            Self::Box {
                center,
                half_extents,
            } => Self::Box {
                center: center + offset,
                half_extents,
            },
        }
    }

    /// Point distances are measured from.
    #[must_use]
    pub const fn origin(&self) -> Vec3 {
        match self {
            Self::Ray { start, .. } => *start,
            Self::Sphere { center, .. } | Self::Box { center, .. } => *center,
        }
    }
}

/// A query handed to the host's physics world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Query geometry.
    pub shape: QueryShape,
    /// Collision channels to match (empty = all).
    #[serde(default)]
    pub channels: Vec<u32>,
    /// Stop at the first blocking hit.
    #[serde(default)]
    pub only_blocking_hit: bool,
    /// Entity excluded from results, usually the caster.
    #[serde(default)]
    pub ignore: Option<EntityHandle>,
}

impl QueryRequest {
    /// Request with default filtering.
    #[must_use]
    pub const fn new(shape: QueryShape) -> Self {
        Self {
            shape,
            channels: Vec::new(),
            only_blocking_hit: false,
            ignore: None,
        }
    }
}

/// One entity reported by a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    /// Entity hit.
    pub entity: EntityHandle,
    /// Hit location.
    pub location: Vec3,
    /// Distance from the query origin.
    pub distance: f32,
}

/// Result of polling a handle.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPoll {
    /// Still running.
    Pending,
    /// Finished; the hits are handed over exactly once.
    Ready(Vec<QueryHit>),
    /// Unknown, cancelled or already consumed.
    Unknown,
}

/// Submit/poll/cancel surface tasks use for asynchronous queries.
pub trait QueryBridge: Send + Sync {
    /// Start a query and return its handle.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::QueueFull`] or [`QueryError::Shutdown`] when the
    /// bridge cannot accept work.
    fn submit(&self, request: QueryRequest) -> Result<QueryHandle, QueryError>;

    /// Non-blocking check for a result.
    fn poll(&self, handle: QueryHandle) -> QueryPoll;

    /// Forget a handle; any late result is dropped.
    fn cancel(&self, handle: QueryHandle);

    /// Number of handles whose result has not been consumed.
    fn in_flight(&self) -> usize;
}

/// Executes queries on behalf of [`WorkerQueryBridge`].
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use ability_timeline::core::{QueryExecutor, QueryHit, QueryRequest};
///
/// #[derive(Clone)]
/// struct PhysicsExecutor { world: Arc<PhysicsWorld> }
///
/// #[async_trait]
/// impl QueryExecutor for PhysicsExecutor {
///     async fn execute(&self, request: QueryRequest) -> Vec<QueryHit> {
///         self.world.trace(&request)
///     }
/// }
/// ```
#[async_trait]
pub trait QueryExecutor: Send + Sync + Clone + 'static {
    /// Run one query to completion.
    ///
    /// On native platforms this is called from a dedicated worker thread
    /// with its own single-threaded tokio runtime, so it may block or await.
    async fn execute(&self, request: QueryRequest) -> Vec<QueryHit>;
}
