//! Tests for utility functions

use prometheus_batch::util::{elapsed_ms, init_tracing, init_tracing_with, now_ms, DEFAULT_LOG_FILTER};

#[test]
fn test_clock_is_monotone_enough() {
    let a = now_ms();
    let b = now_ms();
    assert!(elapsed_ms(a, b) < 1_000);
    assert_eq!(elapsed_ms(b + 5, b), 0);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing_with("debug");
    tracing::info!("tracing initialised twice without panicking");
}

#[test]
fn test_default_filter_targets_crate() {
    assert!(DEFAULT_LOG_FILTER.starts_with("prometheus_batch"));
}
