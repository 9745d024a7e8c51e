//! Core timeline model, pools and the frame-driven scheduler.

pub mod condition;
pub mod context;
pub mod definition;
pub mod dependency;
pub mod error;
pub mod events;
pub mod hooks;
pub mod instance;
pub mod pool;
pub mod query;
pub mod scheduler;
pub mod segment;
pub mod services;
pub mod targeting;
pub mod task;
pub mod types;
pub mod validation;
pub mod world;

pub use condition::{
    evaluate, passes, AlwaysCondition, BlockCondition, Condition, ConditionEnv, CustomCondition,
    DistanceCondition, InputCondition, TagCondition, TargetPresenceCondition,
};
pub use context::{AbilityContext, ContextParams};
pub use definition::{
    name_hash, AbilityDefinition, AbilityDefinitionBuilder, ChannelRules, StackingRules,
    DEFAULT_SEGMENT_LENGTH, DEFAULT_SEGMENT_NAME,
};
pub use dependency::{build_dependency_list, find_cycle, repair_dependencies};
pub use error::{AbilityError, AppResult, QueryError, ValidationError};
pub use events::{build_event, AbilityEvent, AbilityEventKind, EventSink, InMemoryEventSink, NullEventSink};
pub use hooks::{NoopHooks, ScriptHooks};
pub use instance::{AbilityInstance, ContextModification, PendingTargets};
pub use pool::{PoolManager, PoolStats, ScratchPad};
#[cfg(all(feature = "tokio-runtime", not(target_arch = "wasm32")))]
pub use query::{QueryStats, WorkerQueryBridge};
pub use query::{
    ManualQueryBridge, QueryBridge, QueryExecutor, QueryHandle, QueryHit, QueryPoll, QueryRequest,
    QueryShape,
};
pub use scheduler::{Activation, ActivationRequest, Scheduler, SchedulerStats, TickReport};
pub use segment::{BranchData, Segment, TaskSlot};
pub use services::Services;
pub use targeting::{QueryTargeting, Targeting, TargetingStatus};
pub use task::{SegmentTarget, Task, TaskCommand, TaskContext, TaskDesc};
pub use types::{
    CallbackResult, ConditionResult, EntityHandle, NetMode, Realm, StartResult, TargetType,
    TaskKey, TaskResult, Vec3,
};
pub use validation::{validate_definition, ValidationReport};
pub use world::{NullWorld, World};
