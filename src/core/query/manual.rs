//! Host-completed query bridge.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{QueryBridge, QueryHandle, QueryHit, QueryPoll, QueryRequest};
use crate::core::error::QueryError;

#[derive(Debug)]
enum Slot {
    Pending(QueryRequest),
    Ready(Vec<QueryHit>),
}

/// Bridge whose queries complete only when the host says so.
///
/// Useful for hosts that batch queries into their own physics step and for
/// deterministic frame-by-frame tests.
#[derive(Debug, Default)]
pub struct ManualQueryBridge {
    slots: Mutex<BTreeMap<QueryHandle, Slot>>,
    next_id: AtomicU64,
    capacity: Option<usize>,
}

impl ManualQueryBridge {
    /// Unbounded bridge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bridge that rejects submissions beyond `capacity` in-flight queries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Requests still waiting for a result, oldest first.
    #[must_use]
    pub fn pending_requests(&self) -> Vec<(QueryHandle, QueryRequest)> {
        self.slots
            .lock()
            .iter()
            .filter_map(|(handle, slot)| match slot {
                Slot::Pending(request) => Some((*handle, request.clone())),
                Slot::Ready(_) => None,
            })
            .collect()
    }

    /// Deliver hits for `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownHandle`] if the handle was cancelled,
    /// consumed or never issued.
    pub fn complete(&self, handle: QueryHandle, hits: Vec<QueryHit>) -> Result<(), QueryError> {
        let mut slots = self.slots.lock();
        match slots.get_mut(&handle) {
            Some(slot @ Slot::Pending(_)) => {
                debug!(%handle, hits = hits.len(), "Query completed by host");
                *slot = Slot::Ready(hits);
                Ok(())
            }
            Some(Slot::Ready(_)) | None => Err(QueryError::UnknownHandle),
        }
    }

    /// Complete every pending query with hits computed by `resolve`.
    pub fn complete_all(&self, mut resolve: impl FnMut(&QueryRequest) -> Vec<QueryHit>) -> usize {
        let mut slots = self.slots.lock();
        let mut completed = 0;
        for slot in slots.values_mut() {
            if let Slot::Pending(request) = slot {
                *slot = Slot::Ready(resolve(request));
                completed += 1;
            }
        }
        completed
    }
}

impl QueryBridge for ManualQueryBridge {
    fn submit(&self, request: QueryRequest) -> Result<QueryHandle, QueryError> {
        let mut slots = self.slots.lock();
        if self.capacity.is_some_and(|capacity| slots.len() >= capacity) {
            warn!("Manual query bridge is full");
            return Err(QueryError::QueueFull);
        }
        let handle = QueryHandle(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        slots.insert(handle, Slot::Pending(request));
        Ok(handle)
    }

    fn poll(&self, handle: QueryHandle) -> QueryPoll {
        let mut slots = self.slots.lock();
        match slots.get(&handle) {
            None => QueryPoll::Unknown,
            Some(Slot::Pending(_)) => QueryPoll::Pending,
            Some(Slot::Ready(_)) => match slots.remove(&handle) {
                Some(Slot::Ready(hits)) => QueryPoll::Ready(hits),
                _ => QueryPoll::Unknown,
            },
        }
    }

    fn cancel(&self, handle: QueryHandle) {
        if self.slots.lock().remove(&handle).is_some() {
            debug!(%handle, "Query cancelled");
        }
    }

    fn in_flight(&self) -> usize {
        self.slots.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::QueryShape;
    use crate::core::types::{EntityHandle, Vec3};

    fn request() -> QueryRequest {
        QueryRequest::new(QueryShape::Sphere {
            center: Vec3::ZERO,
            radius: 2.0,
        })
    }

    #[test]
    fn result_is_delivered_once() {
        let bridge = ManualQueryBridge::new();
        let handle = bridge.submit(request()).unwrap();
        assert_eq!(bridge.poll(handle), QueryPoll::Pending);

        let hit = QueryHit {
            entity: EntityHandle::new(3, 1),
            location: Vec3::new(1.0, 0.0, 0.0),
            distance: 1.0,
        };
        bridge.complete(handle, vec![hit]).unwrap();
        assert_eq!(bridge.poll(handle), QueryPoll::Ready(vec![hit]));
        assert_eq!(bridge.poll(handle), QueryPoll::Unknown);
        assert_eq!(bridge.in_flight(), 0);
    }

    #[test]
    fn cancelled_handle_rejects_completion() {
        let bridge = ManualQueryBridge::new();
        let handle = bridge.submit(request()).unwrap();
        bridge.cancel(handle);
        assert_eq!(bridge.complete(handle, Vec::new()), Err(QueryError::UnknownHandle));
    }

    #[test]
    fn capacity_is_enforced() {
        let bridge = ManualQueryBridge::with_capacity(1);
        bridge.submit(request()).unwrap();
        assert_eq!(bridge.submit(request()), Err(QueryError::QueueFull));
    }
}
