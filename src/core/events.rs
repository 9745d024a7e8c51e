//! Lifecycle event sinks.
//!
//! Provides an in-memory recorder for tests and tooling and a sink that
//! drops everything.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::types::TaskResult;
use crate::util::clock::now_ms;

/// What happened to an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbilityEventKind {
    /// The activation started.
    Started,
    /// The active segment changed.
    SegmentBranched {
        /// Previous segment index.
        from: usize,
        /// New segment index.
        to: usize,
    },
    /// The loop range restarted.
    Iteration {
        /// Completed traversals.
        iteration: u32,
    },
    /// The stack count changed.
    StackChanged {
        /// Previous count.
        from: u32,
        /// New count.
        to: u32,
    },
    /// The activation ended.
    Ended {
        /// End reason.
        result: TaskResult,
    },
}

/// Lifecycle event structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityEvent {
    /// Activation the event belongs to.
    pub activation_id: Uuid,
    /// Ability name.
    pub ability: String,
    /// What happened.
    pub kind: AbilityEventKind,
    /// Segment time cursor when it happened.
    pub time: f32,
    /// Wall-clock milliseconds.
    pub created_at_ms: u128,
}

/// Lifecycle event sink abstraction.
pub trait EventSink: Send + Sync {
    /// Record a lifecycle event.
    fn record(&self, event: AbilityEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn record(&self, _event: AbilityEvent) {}
}

/// In-memory event sink with a bounded buffer.
#[derive(Debug)]
pub struct InMemoryEventSink {
    events: Mutex<VecDeque<AbilityEvent>>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a sink keeping at most `max_events`, dropping the oldest.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events)),
            max_events,
        }
    }

    /// Snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AbilityEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Stored events of one activation.
    #[must_use]
    pub fn events_for(&self, activation_id: Uuid) -> Vec<AbilityEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.activation_id == activation_id)
            .cloned()
            .collect()
    }

    /// Drop every stored event.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&self, event: AbilityEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Helper to build a lifecycle event stamped with the wall clock.
pub fn build_event(
    activation_id: Uuid,
    ability: impl Into<String>,
    kind: AbilityEventKind,
    time: f32,
) -> AbilityEvent {
    AbilityEvent {
        activation_id,
        ability: ability.into(),
        kind,
        time,
        created_at_ms: now_ms(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_sink_drops_oldest() {
        let sink = InMemoryEventSink::new(2);
        let id = Uuid::new_v4();
        for iteration in 0..3 {
            sink.record(build_event(id, "Loop", AbilityEventKind::Iteration { iteration }, 0.0));
        }
        let kinds: Vec<_> = sink.events().into_iter().map(|event| event.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AbilityEventKind::Iteration { iteration: 1 },
                AbilityEventKind::Iteration { iteration: 2 },
            ]
        );
    }
}
