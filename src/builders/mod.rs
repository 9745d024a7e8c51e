//! Builders from configuration and authored assets.

pub mod asset;
pub mod registry;
pub mod scheduler_builder;

pub use asset::{
    build_definition, load_definition_file, AbilityAsset, BranchAsset, ChannelAsset, ConditionAsset,
    LoopAsset, SegmentAsset, TaskAsset,
};
pub use registry::{decode_params, ConditionFactory, ConditionRegistry, TaskFactory, TaskRegistry, TaskSpec};
#[cfg(all(feature = "tokio-runtime", not(target_arch = "wasm32")))]
pub use scheduler_builder::worker_bridge;
pub use scheduler_builder::{build_scheduler, manual_bridge};
