//! Host lookup surface for entities, input and synchronous queries.

use crate::core::query::{QueryHit, QueryRequest};
use crate::core::types::{EntityHandle, Vec3};

/// Read-only view of the host world.
///
/// Entity handles are resolved here and nowhere else; the scheduler never
/// owns entities. Every method has a permissive default so hosts only
/// implement what their tasks and conditions read.
pub trait World: Send + Sync {
    /// Whether `entity` still refers to a live entity.
    fn is_alive(&self, _entity: EntityHandle) -> bool {
        true
    }

    /// World location of `entity`.
    fn location(&self, _entity: EntityHandle) -> Option<Vec3> {
        None
    }

    /// Whether `entity` is controlled by a local player on this side.
    fn is_locally_controlled(&self, _entity: EntityHandle) -> bool {
        true
    }

    /// Seconds since `input` was pressed on `entity`, `None` if not held.
    fn input_pressed_for(&self, _entity: EntityHandle, _input: &str) -> Option<f32> {
        None
    }

    /// Whether `entity` carries the gameplay tag.
    fn has_tag(&self, _entity: EntityHandle, _tag: &str) -> bool {
        false
    }

    /// Run a query synchronously.
    fn query(&self, _request: &QueryRequest) -> Vec<QueryHit> {
        Vec::new()
    }
}

/// World with no entities; every lookup returns the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullWorld;

impl World for NullWorld {}
