//! Offline validation pass.
//!
//! Runs over a fully resolved definition before it is eligible to execute.
//! Every problem is collected; nothing here is checked again at runtime.

use std::collections::HashSet;
use std::fmt;

use crate::core::condition::Condition;
use crate::core::definition::AbilityDefinition;
use crate::core::dependency::find_cycle;
use crate::core::error::ValidationError;
use crate::core::segment::BranchData;

/// Every configuration error found in one definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    errors: Vec<ValidationError>,
}

impl ValidationReport {
    /// Empty report.
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Record an error.
    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Record several errors.
    pub fn extend(&mut self, errors: impl IntoIterator<Item = ValidationError>) {
        self.errors.extend(errors);
    }

    /// Whether no error was found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Same as [`Self::is_valid`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors in discovery order.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Whether an error equal to `error` was found.
    #[must_use]
    pub fn contains(&self, error: &ValidationError) -> bool {
        self.errors.contains(error)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.errors.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "- {error}")?;
        }
        Ok(())
    }
}

fn validate_conditions(
    conditions: &[std::sync::Arc<dyn Condition>],
    definition: &AbilityDefinition,
    report: &mut ValidationReport,
) {
    for condition in conditions {
        report.extend(condition.validate(definition.hooks()));
    }
}

fn validate_branches(
    owner: &str,
    branches: &[BranchData],
    definition: &AbilityDefinition,
    report: &mut ValidationReport,
) {
    for branch in branches {
        if definition.segment_index(&branch.target).is_none() {
            report.push(ValidationError::UnknownBranchTarget {
                segment: owner.to_string(),
                target: branch.target.clone(),
            });
        }
        validate_conditions(&branch.conditions, definition, report);
    }
}

/// Check a definition and list every configuration error.
#[must_use]
pub fn validate_definition(definition: &AbilityDefinition) -> ValidationReport {
    let mut report = ValidationReport::new();
    let mut segment_names = HashSet::new();
    let mut task_ids = HashSet::new();

    let rate = definition.play_rate();
    if !(rate.is_finite() && rate > 0.0) {
        report.push(ValidationError::InvalidPlayRate);
    }

    for (index, segment) in definition.segments().iter().enumerate() {
        if segment.name.is_empty() {
            report.push(ValidationError::UnnamedSegment { index });
        } else if !segment_names.insert(segment.name.as_str()) {
            report.push(ValidationError::DuplicateSegment(segment.name.clone()));
        }
        let name = &segment.name;

        if segment.length <= 0.0 {
            report.push(ValidationError::NonPositiveLength {
                segment: name.clone(),
            });
        }
        if segment.looping
            && (segment.loop_start < 0.0
                || segment.loop_end > segment.length
                || segment.loop_start >= segment.loop_end)
        {
            report.push(ValidationError::InvalidLoopRange {
                segment: name.clone(),
            });
        }

        for slot in segment.tasks() {
            let task = slot.task();
            let key = slot.key();
            if !task_ids.insert(key) {
                report.push(ValidationError::DuplicateTask(key));
            }
            if !task.is_single_frame() && task.desc().end_time < task.start_time() {
                report.push(ValidationError::EndBeforeStart {
                    segment: name.clone(),
                    task: key,
                });
            }
            if task.start_time() > segment.length {
                report.push(ValidationError::StartsBeyondSegment {
                    segment: name.clone(),
                    task: key,
                });
            }

            for declared in &task.desc().dependencies {
                let dependency = segment.repairs().get(declared).copied().unwrap_or(*declared);
                match segment.task(dependency) {
                    None => report.push(ValidationError::DependencyOutsideSegment {
                        segment: name.clone(),
                        task: key,
                        dependency,
                    }),
                    Some(other) if !task.realm().is_compatible_with(other.task().realm()) => {
                        report.push(ValidationError::RealmMismatch {
                            segment: name.clone(),
                            task: key,
                            dependency,
                        });
                    }
                    Some(_) => {}
                }
            }

            if task.uses_target_actors() && definition.targeting().is_none() {
                let fed = slot.dependencies().iter().any(|dependency| {
                    segment
                        .task(*dependency)
                        .is_some_and(|other| other.task().produces_targets())
                });
                if !fed {
                    report.push(ValidationError::MissingTargeting { task: key });
                }
            }

            report.extend(task.validate(definition));
        }

        if let Some(task) = find_cycle(segment) {
            report.push(ValidationError::DependencyCycle {
                segment: name.clone(),
                task,
            });
        }

        validate_branches(name, &segment.branches, definition, &mut report);
    }

    if definition.segment(definition.entry_index()).is_none() {
        report.push(ValidationError::UnknownBranchTarget {
            segment: "<entry>".to_string(),
            target: format!("#{}", definition.entry_index()),
        });
    }
    validate_branches("<entry>", definition.entry_branches(), definition, &mut report);

    if let Some(channel) = definition.channel() {
        if channel.conditions.is_empty() {
            report.push(ValidationError::MissingChannelConditions);
        }
        validate_conditions(&channel.conditions, definition, &mut report);
    }

    if let Some(targeting) = definition.targeting() {
        report.extend(targeting.validate());
    }

    report
}
