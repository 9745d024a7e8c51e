//! Root scheduler configuration.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::pool::{PoolConfig, QueryConfig};
use crate::core::types::NetMode;

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Side this scheduler executes on; filters tasks by realm.
    pub net_mode: NetMode,
    /// Global switch for async queries and parallel damage calculation.
    pub async_enabled: bool,
    /// Log runtime soft failures at debug level.
    pub log_verbose: bool,
    /// Scratch-pad and context pools.
    pub pools: PoolConfig,
    /// Async query workers.
    pub queries: QueryConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            net_mode: NetMode::Standalone,
            async_enabled: true,
            log_verbose: false,
            pools: PoolConfig::default(),
            queries: QueryConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Validate nested sections.
    pub fn validate(&self) -> Result<(), String> {
        self.pools
            .validate()
            .map_err(|e| format!("pools invalid: {e}"))?;
        self.queries
            .validate()
            .map_err(|e| format!("queries invalid: {e}"))?;
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `ABILITY_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    /// Recognised variables: `ABILITY_NET_MODE`, `ABILITY_ASYNC_ENABLED`,
    /// `ABILITY_LOG_VERBOSE`, `ABILITY_POOL_ALLOW_REUSE`,
    /// `ABILITY_POOL_INITIAL_CONTEXTS`, `ABILITY_POOL_MAX_CONTEXTS`,
    /// `ABILITY_POOL_MAX_SCRATCH_PADS`, `ABILITY_QUERY_WORKERS`,
    /// `ABILITY_QUERY_MAX_QUEUE_DEPTH`.
    pub fn from_env() -> Result<Self, String> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env file");
        }

        let mut cfg = Self::default();
        if let Some(mode) = env_var::<String>("ABILITY_NET_MODE")? {
            cfg.net_mode = parse_net_mode(&mode)?;
        }
        if let Some(value) = env_var("ABILITY_ASYNC_ENABLED")? {
            cfg.async_enabled = value;
        }
        if let Some(value) = env_var("ABILITY_LOG_VERBOSE")? {
            cfg.log_verbose = value;
        }
        if let Some(value) = env_var("ABILITY_POOL_ALLOW_REUSE")? {
            cfg.pools.allow_reuse = value;
        }
        if let Some(value) = env_var("ABILITY_POOL_INITIAL_CONTEXTS")? {
            cfg.pools.initial_context_pool_size = value;
        }
        if let Some(value) = env_var("ABILITY_POOL_MAX_CONTEXTS")? {
            cfg.pools.max_context_pool_size = value;
        }
        if let Some(value) = env_var("ABILITY_POOL_MAX_SCRATCH_PADS")? {
            cfg.pools.max_scratch_pads_per_class = value;
        }
        if let Some(value) = env_var("ABILITY_QUERY_WORKERS")? {
            cfg.queries.worker_count = value;
        }
        if let Some(value) = env_var("ABILITY_QUERY_MAX_QUEUE_DEPTH")? {
            cfg.queries.max_queue_depth = value;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn env_var<T: FromStr>(name: &str) -> Result<Option<T>, String> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| format!("{name} has an invalid value `{raw}`")),
        Err(_) => Ok(None),
    }
}

fn parse_net_mode(raw: &str) -> Result<NetMode, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "standalone" => Ok(NetMode::Standalone),
        "client" => Ok(NetMode::Client),
        "listen_server" => Ok(NetMode::ListenServer),
        "dedicated_server" => Ok(NetMode::DedicatedServer),
        other => Err(format!("unknown net mode `{other}`")),
    }
}
