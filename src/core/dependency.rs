//! Per-segment dependency resolution.
//!
//! Declared dependencies are authored data and may be stale: they can point
//! at a task that lives in another segment, at the task itself, or at a task
//! on an incompatible realm. Resolution runs when a definition is built and
//! is idempotent; the scheduler only reads the resolved sets.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::core::segment::Segment;
use crate::core::types::TaskKey;

/// Start/end times closer than this are considered the same placement.
const TIME_TOLERANCE: f32 = 1.0e-3;

/// Replace declared dependencies that point outside their segment with the
/// same-kind task at nearly the same placement inside it.
///
/// This mirrors what happens when a segment is duplicated: the copies keep
/// pointing at the originals. Returns the number of substitutions made.
pub fn repair_dependencies(segments: &mut [Segment]) -> usize {
    let placements: HashMap<TaskKey, (&'static str, f32, f32)> = segments
        .iter()
        .flat_map(|segment| segment.tasks().iter())
        .map(|slot| {
            let task = slot.task();
            (slot.key(), (task.kind(), task.start_time(), task.end_time()))
        })
        .collect();

    let mut repaired = 0;
    for segment in segments.iter_mut() {
        let mut repairs = HashMap::new();
        for slot in segment.tasks() {
            for dependency in &slot.task().desc().dependencies {
                if segment.contains(*dependency) {
                    continue;
                }
                let Some(&(kind, start, end)) = placements.get(dependency) else {
                    continue;
                };
                let replacement = segment.tasks().iter().find(|candidate| {
                    let task = candidate.task();
                    candidate.key() != slot.key()
                        && task.kind() == kind
                        && (task.start_time() - start).abs() < TIME_TOLERANCE
                        && (task.end_time() - end).abs() < TIME_TOLERANCE
                });
                if let Some(replacement) = replacement {
                    debug!(
                        segment = %segment.name,
                        from = %dependency,
                        to = %replacement.key(),
                        "Repaired cross-segment dependency"
                    );
                    repairs.insert(*dependency, replacement.key());
                }
            }
        }
        repaired += repairs.len();
        segment.set_repairs(repairs);
    }
    repaired
}

/// Filter and store the live dependency set of every task in `segment`.
///
/// Drops self references, tasks outside the segment (after repairs) and
/// realm-incompatible tasks, then deduplicates. The union is stored on the
/// segment as its dependent-task list, in segment order.
pub fn build_dependency_list(segment: &mut Segment) {
    let lookup: HashMap<TaskKey, _> = segment
        .tasks()
        .iter()
        .map(|slot| (slot.key(), slot.task().realm()))
        .collect();
    let repairs = segment.repairs().clone();

    let mut resolved = Vec::with_capacity(segment.tasks().len());
    for slot in segment.tasks() {
        let task = slot.task();
        let mut seen = HashSet::new();
        let mut dependencies = Vec::new();
        for declared in &task.desc().dependencies {
            let key = repairs.get(declared).copied().unwrap_or(*declared);
            if key == slot.key() {
                continue;
            }
            let Some(realm) = lookup.get(&key) else {
                warn!(
                    segment = %segment.name,
                    task = %slot.key(),
                    dependency = %key,
                    "Dropping dependency outside the segment"
                );
                continue;
            };
            if !task.realm().is_compatible_with(*realm) {
                warn!(
                    segment = %segment.name,
                    task = %slot.key(),
                    dependency = %key,
                    "Dropping realm-incompatible dependency"
                );
                continue;
            }
            if seen.insert(key) {
                dependencies.push(key);
            }
        }
        resolved.push(dependencies);
    }

    let all: HashSet<TaskKey> = resolved.iter().flatten().copied().collect();
    let dependent_tasks = segment
        .tasks()
        .iter()
        .map(|slot| slot.key())
        .filter(|key| all.contains(key))
        .collect();

    for (slot, dependencies) in segment.tasks_mut().iter_mut().zip(resolved) {
        slot.set_dependencies(dependencies);
    }
    segment.set_dependent_tasks(dependent_tasks);
}

/// A task on a dependency cycle among resolved dependencies, if any.
#[must_use]
pub fn find_cycle(segment: &Segment) -> Option<TaskKey> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit(
        key: TaskKey,
        segment: &Segment,
        marks: &mut HashMap<TaskKey, Mark>,
    ) -> Option<TaskKey> {
        match marks.get(&key) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => return Some(key),
            None => {}
        }
        marks.insert(key, Mark::Visiting);
        if let Some(slot) = segment.task(key) {
            for dependency in slot.dependencies() {
                if let Some(found) = visit(*dependency, segment, marks) {
                    return Some(found);
                }
            }
        }
        marks.insert(key, Mark::Done);
        None
    }

    let mut marks = HashMap::new();
    segment
        .tasks()
        .iter()
        .find_map(|slot| visit(slot.key(), segment, &mut marks))
}
