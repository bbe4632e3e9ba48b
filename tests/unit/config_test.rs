//! Tests for configuration validation

use prometheus_batch::config::{RegistryConfig, SchedulerOptions, ENV_MAX_CONCURRENCY, ENV_RETRY_COUNT};
use std::collections::BTreeMap;

#[test]
fn test_scheduler_options_validation() {
    let valid = SchedulerOptions {
        max_concurrency: 4,
        retry_count: 0,
        retry_delay_ms: 0,
    };
    assert!(valid.validate().is_ok());

    let invalid = SchedulerOptions {
        max_concurrency: 0,
        ..valid
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_options_builders() {
    let opts = SchedulerOptions::default()
        .with_max_concurrency(10)
        .with_retry_count(5)
        .with_retry_delay_ms(20);
    assert_eq!(opts.max_concurrency, 10);
    assert_eq!(opts.retry_count, 5);
    assert_eq!(opts.retry_delay().as_millis(), 20);
}

#[test]
fn test_scheduler_options_from_lookup_defaults() {
    let opts = SchedulerOptions::from_lookup(|_| None).unwrap();
    assert_eq!(opts, SchedulerOptions::default());
}

#[test]
fn test_scheduler_options_from_lookup_rejects_zero() {
    let err = SchedulerOptions::from_lookup(|k| (k == ENV_MAX_CONCURRENCY).then(|| "0".into()))
        .unwrap_err();
    assert!(err.contains("max_concurrency"));

    let err = SchedulerOptions::from_lookup(|k| (k == ENV_RETRY_COUNT).then(|| "-1".into()))
        .unwrap_err();
    assert!(err.contains(ENV_RETRY_COUNT));
}

#[test]
fn test_registry_config_validation() {
    let mut schedulers = BTreeMap::new();
    schedulers.insert("images".to_string(), SchedulerOptions::default());
    let valid = RegistryConfig {
        schedulers,
        default_scheduler: Some("images".to_string()),
        ..RegistryConfig::default()
    };
    assert!(valid.validate().is_ok());

    let bad_capacity = RegistryConfig {
        event_capacity: 0,
        ..valid.clone()
    };
    assert!(bad_capacity.validate().is_err());

    let mut bad_scheduler = valid;
    bad_scheduler.schedulers.insert(
        "broken".to_string(),
        SchedulerOptions::default().with_max_concurrency(0),
    );
    let err = bad_scheduler.validate().unwrap_err();
    assert!(err.contains("broken"));
}

#[test]
fn test_registry_config_rejects_malformed_json() {
    assert!(RegistryConfig::from_json_str("{ not json").is_err());
    assert!(RegistryConfig::from_json_str(r#"{"schedulers": {"a": {"max_concurrency": 0}}}"#).is_err());
}
