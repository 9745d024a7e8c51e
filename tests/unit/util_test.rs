//! Tests for utility functions

use ability_timeline::util::{init_tracing, init_tracing_with_default, now_ms};

#[test]
fn test_now_ms_is_monotonic_enough() {
    let first = now_ms();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let second = now_ms();
    assert!(first > 0);
    assert!(second >= first);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing_with_default("ability_timeline=debug");
    init_tracing();
    init_tracing();
    tracing::info!(component = "util_test", "tracing initialized twice without panicking");
}
