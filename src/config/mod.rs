//! Configuration models for the scheduler, pools and query workers.

pub mod pool;
pub mod scheduler;

pub use pool::{PoolConfig, QueryConfig};
pub use scheduler::SchedulerConfig;
