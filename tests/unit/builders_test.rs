//! Tests for builder modules

use prometheus_batch::builders::registry_builder::build_registry;
use prometheus_batch::config::{RegistryConfig, SchedulerOptions};
use prometheus_batch::core::SchedulerError;

#[test]
fn test_build_registry_defaults() {
    let registry = build_registry::<u32, u32>(&RegistryConfig::default()).unwrap();
    assert!(registry.is_empty());
    assert!(registry.default_id().is_none());
}

#[test]
fn test_build_registry_explicit_default() {
    let cfg = RegistryConfig::from_json_str(
        r#"{
            "schedulers": {
                "audio": { "max_concurrency": 1 },
                "images": { "max_concurrency": 4, "retry_count": 0 }
            },
            "default_scheduler": "images"
        }"#,
    )
    .unwrap();

    let registry = build_registry::<String, String>(&cfg).unwrap();

    assert_eq!(registry.ids(), vec!["audio", "images"]);
    let default = registry.get_processor(None).unwrap();
    assert_eq!(default.id(), "images");
    assert_eq!(default.options().max_concurrency, 4);
    assert_eq!(default.options().retry_count, 0);
}

#[test]
fn test_build_registry_first_sorted_is_default() {
    let mut cfg = RegistryConfig::default();
    cfg.schedulers.insert("zeta".into(), SchedulerOptions::default());
    cfg.schedulers.insert("alpha".into(), SchedulerOptions::default());

    let registry = build_registry::<u32, u32>(&cfg).unwrap();
    assert_eq!(registry.default_id().as_deref(), Some("alpha"));
}

#[test]
fn test_build_registry_rejects_invalid() {
    let mut cfg = RegistryConfig::default();
    cfg.schedulers
        .insert("bad".into(), SchedulerOptions::default().with_max_concurrency(0));

    let err = build_registry::<u32, u32>(&cfg).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidConfig(_)));
}
