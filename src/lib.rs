//! # Ability Timeline
//!
//! A frame-driven scheduler for gameplay abilities authored as timelines.
//!
//! An ability is an immutable [`AbilityDefinition`](core::AbilityDefinition):
//! named segments of time-windowed tasks with loop ranges, branch rules,
//! stacking and channel checks. Every activation gets a pooled
//! [`AbilityContext`](core::AbilityContext) whose time cursor the
//! [`Scheduler`](core::Scheduler) advances once per frame, starting, ticking
//! and ending tasks as their windows pass.
//!
//! ## Core Problem Solved
//!
//! Gameplay abilities are many small pieces of work on a shared clock:
//!
//! - **Deterministic ordering**: equal start times run in authored display order
//! - **Zero per-frame allocation**: task state lives in pooled scratch pads
//! - **Long queries without stalls**: collision queries run on worker threads
//!   and are polled, never awaited on the frame thread
//! - **Realm filtering**: client-only and server-only tasks share one timeline
//!
//! ## Key Features
//!
//! - **Segments**: looping ranges with iteration caps and prioritized branches
//! - **Dependencies**: tasks wait for producers in the same segment
//! - **Stacking and cooldowns**: per-owner cooldowns, stack increments and decay
//! - **Channeling**: conditions checked every frame that can abort the ability
//! - **Async Query Bridge**: worker threads with exactly-once result delivery
//! - **Offline validation**: every authoring error reported before a
//!   definition can run
//!
//! ```rust,ignore
//! use ability_timeline::config::SchedulerConfig;
//! use ability_timeline::core::{
//!     AbilityDefinition, ActivationRequest, EntityHandle, Scheduler, Segment, TaskDesc,
//! };
//! use ability_timeline::tasks::DelayTask;
//! use std::sync::Arc;
//!
//! let definition = AbilityDefinition::builder("Dash")
//!     .segment(
//!         Segment::new("Main", 0.5)
//!             .with_task(Arc::new(DelayTask::new(TaskDesc::new(1, 0.0, 0.5)))),
//!     )
//!     .cooldown(2.0)
//!     .build()?;
//!
//! let mut scheduler = Scheduler::new(SchedulerConfig::default())?;
//! let activation = scheduler.activate(
//!     &definition,
//!     ActivationRequest::new().with_owner(EntityHandle::new(7, 0)),
//! )?;
//!
//! // Once per frame
//! let report = scheduler.tick(1.0 / 60.0);
//! ```
//!
//! Authored JSON assets are turned into definitions by
//! [`builders::build_definition`] through the task and condition registries.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Timeline model, pools, query bridge and the scheduler.
pub mod core;
/// Configuration models for the scheduler, pools and query workers.
pub mod config;
/// Builders from configuration and authored assets.
pub mod builders;
/// Built-in task payloads.
pub mod tasks;
/// Shared utilities.
pub mod util;
