//! Pool and query worker configuration structures.

use serde::{Deserialize, Serialize};

/// Scratch-pad and context pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Recycle instances; when false every release drops the instance.
    pub allow_reuse: bool,
    /// Contexts constructed up front.
    pub initial_context_pool_size: usize,
    /// Maximum resident contexts.
    pub max_context_pool_size: usize,
    /// Maximum resident scratch pads per concrete type.
    pub max_scratch_pads_per_class: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            allow_reuse: true,
            initial_context_pool_size: 8,
            max_context_pool_size: 64,
            max_scratch_pads_per_class: 32,
        }
    }
}

impl PoolConfig {
    /// Validate pool configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.allow_reuse && self.max_context_pool_size == 0 {
            return Err("max_context_pool_size must be greater than 0 when reuse is enabled".into());
        }
        if self.initial_context_pool_size > self.max_context_pool_size {
            return Err("initial_context_pool_size cannot exceed max_context_pool_size".into());
        }
        Ok(())
    }
}

/// Async query worker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Number of dedicated worker threads.
    pub worker_count: usize,
    /// Maximum queries waiting for a worker before `submit` is rejected.
    pub max_queue_depth: usize,
    /// Stack size of each worker thread in bytes.
    pub thread_stack_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().clamp(1, 4),
            max_queue_depth: 256,
            thread_stack_size: 2 * 1024 * 1024,
        }
    }
}

impl QueryConfig {
    /// Defaults sized to the host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker thread count.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the queue depth.
    #[must_use]
    pub const fn with_max_queue_depth(mut self, max_queue_depth: usize) -> Self {
        self.max_queue_depth = max_queue_depth;
        self
    }

    /// Set the worker stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, thread_stack_size: usize) -> Self {
        self.thread_stack_size = thread_stack_size;
        self
    }

    /// Validate query worker values.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.max_queue_depth == 0 {
            return Err("max_queue_depth must be greater than 0".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }
}
