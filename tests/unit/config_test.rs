//! Tests for configuration validation

use ability_timeline::config::{PoolConfig, QueryConfig, SchedulerConfig};
use ability_timeline::core::NetMode;
use parking_lot::Mutex;

/// Serializes tests that mutate the process environment.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const ENV_VARS: [&str; 9] = [
    "ABILITY_NET_MODE",
    "ABILITY_ASYNC_ENABLED",
    "ABILITY_LOG_VERBOSE",
    "ABILITY_POOL_ALLOW_REUSE",
    "ABILITY_POOL_INITIAL_CONTEXTS",
    "ABILITY_POOL_MAX_CONTEXTS",
    "ABILITY_POOL_MAX_SCRATCH_PADS",
    "ABILITY_QUERY_WORKERS",
    "ABILITY_QUERY_MAX_QUEUE_DEPTH",
];

/// Run `from_env` with exactly `vars` set among the recognised variables.
fn from_env_with(vars: &[(&str, &str)]) -> Result<SchedulerConfig, String> {
    let _guard = ENV_LOCK.lock();
    for name in ENV_VARS {
        std::env::remove_var(name);
    }
    for (name, value) in vars {
        std::env::set_var(name, value);
    }
    let result = SchedulerConfig::from_env();
    for (name, _) in vars {
        std::env::remove_var(name);
    }
    result
}

#[test]
fn test_default_scheduler_config_is_valid() {
    let config = SchedulerConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.net_mode, NetMode::Standalone);
    assert!(config.async_enabled);
    assert!(config.pools.allow_reuse);
}

#[test]
fn test_pool_config_initial_exceeds_max() {
    let invalid = PoolConfig {
        initial_context_pool_size: 10,
        max_context_pool_size: 4,
        ..PoolConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_zero_capacity_requires_reuse_off() {
    let invalid = PoolConfig {
        allow_reuse: true,
        initial_context_pool_size: 0,
        max_context_pool_size: 0,
        max_scratch_pads_per_class: 4,
    };
    assert!(invalid.validate().is_err());

    let no_reuse = PoolConfig {
        allow_reuse: false,
        ..invalid
    };
    assert!(no_reuse.validate().is_ok());
}

#[test]
fn test_query_config_rejects_zero_workers() {
    assert!(QueryConfig::new().with_worker_count(0).validate().is_err());
    assert!(QueryConfig::new().with_max_queue_depth(0).validate().is_err());
    assert!(QueryConfig::new()
        .with_thread_stack_size(1024)
        .validate()
        .is_err());
}

#[test]
fn test_query_config_builders() {
    let config = QueryConfig::new()
        .with_worker_count(3)
        .with_max_queue_depth(64)
        .with_thread_stack_size(512 * 1024);
    assert_eq!(config.worker_count, 3);
    assert_eq!(config.max_queue_depth, 64);
    assert_eq!(config.thread_stack_size, 512 * 1024);
    assert!(config.validate().is_ok());
}

#[test]
fn test_nested_errors_name_their_section() {
    let config = SchedulerConfig {
        queries: QueryConfig::new().with_worker_count(0),
        ..SchedulerConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.starts_with("queries invalid"), "{err}");
}

#[test]
fn test_from_json_str_fills_missing_fields() {
    let config = SchedulerConfig::from_json_str(
        r#"{ "net_mode": "dedicated_server", "pools": { "max_scratch_pads_per_class": 4 } }"#,
    )
    .unwrap();
    assert_eq!(config.net_mode, NetMode::DedicatedServer);
    assert_eq!(config.pools.max_scratch_pads_per_class, 4);
    assert_eq!(config.pools.max_context_pool_size, PoolConfig::default().max_context_pool_size);
    assert!(config.async_enabled);
}

#[test]
fn test_from_json_str_reports_parse_errors() {
    let err = SchedulerConfig::from_json_str("{ not json").unwrap_err();
    assert!(err.starts_with("parse error"), "{err}");

    let err = SchedulerConfig::from_json_str(r#"{ "queries": { "worker_count": 0 } }"#).unwrap_err();
    assert!(err.contains("worker_count"), "{err}");
}

#[test]
fn test_from_env_without_overrides_uses_defaults() {
    let config = from_env_with(&[]).unwrap();
    assert_eq!(config, SchedulerConfig::default());
}

#[test]
fn test_from_env_applies_overrides() {
    let config = from_env_with(&[
        ("ABILITY_NET_MODE", "dedicated_server"),
        ("ABILITY_ASYNC_ENABLED", "false"),
        ("ABILITY_POOL_INITIAL_CONTEXTS", "2"),
        ("ABILITY_POOL_MAX_CONTEXTS", "3"),
        ("ABILITY_POOL_MAX_SCRATCH_PADS", " 5 "),
        ("ABILITY_QUERY_WORKERS", "2"),
        ("ABILITY_QUERY_MAX_QUEUE_DEPTH", "16"),
    ])
    .unwrap();
    assert_eq!(config.net_mode, NetMode::DedicatedServer);
    assert!(!config.async_enabled);
    assert_eq!(config.pools.initial_context_pool_size, 2);
    assert_eq!(config.pools.max_context_pool_size, 3);
    assert_eq!(config.pools.max_scratch_pads_per_class, 5);
    assert_eq!(config.queries.worker_count, 2);
    assert_eq!(config.queries.max_queue_depth, 16);
}

#[test]
fn test_from_env_net_mode_is_case_insensitive() {
    let config = from_env_with(&[("ABILITY_NET_MODE", "Listen_Server")]).unwrap();
    assert_eq!(config.net_mode, NetMode::ListenServer);
}

#[test]
fn test_from_env_rejects_bad_values() {
    let err = from_env_with(&[("ABILITY_QUERY_WORKERS", "many")]).unwrap_err();
    assert!(err.contains("ABILITY_QUERY_WORKERS"), "{err}");

    let err = from_env_with(&[("ABILITY_NET_MODE", "peer")]).unwrap_err();
    assert!(err.contains("unknown net mode"), "{err}");

    let err = from_env_with(&[("ABILITY_LOG_VERBOSE", "sometimes")]).unwrap_err();
    assert!(err.contains("ABILITY_LOG_VERBOSE"), "{err}");
}

#[test]
fn test_from_env_validates_result() {
    let err = from_env_with(&[("ABILITY_POOL_MAX_CONTEXTS", "3")]).unwrap_err();
    assert!(err.starts_with("pools invalid"), "{err}");
}
