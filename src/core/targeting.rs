//! Activation targeting.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::context::AbilityContext;
use crate::core::error::ValidationError;
use crate::core::query::{QueryHit, QueryPoll, QueryRequest, QueryShape};
use crate::core::services::Services;
use crate::core::types::{TargetType, Vec3};

/// Whether targeting has produced its targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetingStatus {
    /// Targets are on the context.
    Ready,
    /// An async query is in flight; poll again later.
    Pending,
}

/// Fills the context target list when an ability starts or re-targets.
pub trait Targeting: Send + Sync + fmt::Debug {
    /// Stable kind string.
    fn kind(&self) -> &'static str;

    /// Begin targeting.
    fn find_targets(&self, context: &mut AbilityContext, services: &Services) -> TargetingStatus;

    /// Continue an async targeting started by `find_targets`.
    fn poll(&self, _context: &mut AbilityContext, _services: &Services) -> TargetingStatus {
        TargetingStatus::Ready
    }

    /// Re-run targeting each time the loop range restarts.
    fn reset_for_iteration(&self) -> bool {
        false
    }

    /// Offline configuration checks.
    fn validate(&self) -> Vec<ValidationError> {
        Vec::new()
    }
}

/// Targets whatever a shape query around an anchor reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryTargeting {
    /// Query shape, relative to the anchor.
    pub shape: QueryShape,
    /// Entity (or location) the shape is centered on.
    #[serde(default)]
    pub anchor: TargetType,
    /// Collision channels.
    #[serde(default)]
    pub channels: Vec<u32>,
    /// Cap on targets (0 = unlimited).
    #[serde(default)]
    pub max_targets: usize,
    /// Order targets nearest first.
    #[serde(default)]
    pub sort_by_distance: bool,
    /// Keep the entity running the ability in the results.
    #[serde(default)]
    pub include_self: bool,
    /// Issue the query through the async bridge when enabled.
    #[serde(default)]
    pub use_async: bool,
    /// Re-run on each loop restart.
    #[serde(default)]
    pub retarget_each_iteration: bool,
}

impl QueryTargeting {
    /// Synchronous targeting with `shape` centered on the caster.
    #[must_use]
    pub const fn new(shape: QueryShape) -> Self {
        Self {
            shape,
            anchor: TargetType::SelfActor,
            channels: Vec::new(),
            max_targets: 0,
            sort_by_distance: false,
            include_self: false,
            use_async: false,
            retarget_each_iteration: false,
        }
    }

    fn anchor_location(&self, context: &AbilityContext, services: &Services) -> Option<Vec3> {
        if self.anchor == TargetType::Location {
            return context.target_location();
        }
        context
            .subjects(self.anchor)
            .first()
            .and_then(|entity| services.world.location(*entity))
    }

    fn request(&self, context: &AbilityContext, services: &Services) -> QueryRequest {
        let offset = self.anchor_location(context, services).unwrap_or(Vec3::ZERO);
        QueryRequest {
            shape: self.shape.translated(offset),
            channels: self.channels.clone(),
            only_blocking_hit: false,
            ignore: if self.include_self {
                None
            } else {
                context.self_entity()
            },
        }
    }

    fn apply_hits(&self, context: &mut AbilityContext, services: &Services, mut hits: Vec<QueryHit>) {
        hits.retain(|hit| services.world.is_alive(hit.entity));
        if !self.include_self {
            if let Some(me) = context.self_entity() {
                hits.retain(|hit| hit.entity != me);
            }
        }
        if self.sort_by_distance {
            hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        }
        for hit in hits {
            if self.max_targets > 0 && context.targets().len() >= self.max_targets {
                break;
            }
            context.add_target(hit.entity);
        }
        if !context.has_targets() && services.config.log_verbose {
            debug!(activation = %context.activation_id(), "Targeting found nothing");
        }
    }
}

impl Targeting for QueryTargeting {
    fn kind(&self) -> &'static str {
        "query"
    }

    fn find_targets(&self, context: &mut AbilityContext, services: &Services) -> TargetingStatus {
        let request = self.request(context, services);
        if self.use_async && services.config.async_enabled {
            match services.queries.submit(request.clone()) {
                Ok(handle) => {
                    context.set_targeting_query(Some(handle));
                    return TargetingStatus::Pending;
                }
                Err(err) => {
                    warn!(error = %err, "Async targeting rejected, querying synchronously");
                }
            }
        }
        let hits = services.world.query(&request);
        self.apply_hits(context, services, hits);
        TargetingStatus::Ready
    }

    fn poll(&self, context: &mut AbilityContext, services: &Services) -> TargetingStatus {
        let Some(handle) = context.targeting_query() else {
            return TargetingStatus::Ready;
        };
        match services.queries.poll(handle) {
            QueryPoll::Pending => TargetingStatus::Pending,
            QueryPoll::Ready(hits) => {
                context.set_targeting_query(None);
                self.apply_hits(context, services, hits);
                TargetingStatus::Ready
            }
            QueryPoll::Unknown => {
                context.set_targeting_query(None);
                if services.config.log_verbose {
                    debug!(%handle, "Targeting query vanished, continuing without targets");
                }
                TargetingStatus::Ready
            }
        }
    }

    fn reset_for_iteration(&self) -> bool {
        self.retarget_each_iteration
    }

    fn validate(&self) -> Vec<ValidationError> {
        let bad_extent = match self.shape {
            QueryShape::Sphere { radius, .. } => radius <= 0.0,
            QueryShape::Box { half_extents, .. } => {
                half_extents.x <= 0.0 || half_extents.y <= 0.0 || half_extents.z <= 0.0
            }
            QueryShape::Ray { start, end } => start == end,
        };
        if bad_extent {
            vec![ValidationError::InvalidTargeting {
                kind: self.kind().to_string(),
                message: "query shape has no extent".to_string(),
            }]
        } else {
            Vec::new()
        }
    }
}
