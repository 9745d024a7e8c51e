//! Built-in task payloads.
//!
//! Each task pairs the shared [`TaskDesc`](crate::core::TaskDesc) with its
//! own params struct. Params deserialize from authored JSON through the
//! [`TaskRegistry`](crate::builders::TaskRegistry).

pub mod branch;
pub mod control;
pub mod custom_event;
pub mod damage;
pub mod modify_context;
pub mod query;

pub use branch::{BranchScratchPad, BranchTask, BranchTaskParams};
pub use control::{CancelAbilityParams, CancelAbilityTask, DelayTask, StopAcrossParams, StopAcrossTask};
pub use custom_event::{CustomEventParams, CustomEventTask};
pub use damage::{DamageEventParams, DamageEventTask, DamageScratchPad};
pub use modify_context::{ModifyContextParams, ModifyContextTask};
pub use query::{QueryScratchPad, QueryTask, QueryTaskParams};
