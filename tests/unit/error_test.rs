//! Tests for error types

use prometheus_batch::core::{SchedulerError, TaskError};

#[test]
fn test_already_running_error() {
    let err = SchedulerError::AlreadyRunning("images".to_string());
    assert_eq!(format!("{}", err), "scheduler `images` is already running");
}

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("max_concurrency must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: max_concurrency must be greater than 0"
    );
}

#[test]
fn test_duplicate_scheduler_error() {
    let err = SchedulerError::DuplicateScheduler("audio".to_string());
    assert_eq!(format!("{}", err), "scheduler `audio` already registered");
}

#[test]
fn test_runtime_error() {
    let err = SchedulerError::Runtime("no reactor running".to_string());
    assert_eq!(format!("{}", err), "runtime unavailable: no reactor running");
}

#[test]
fn test_task_error_keeps_cause_chain() {
    let err = anyhow::anyhow!("connection refused").context("fetching model weights");
    let task_err = TaskError::from_anyhow(&err);
    assert_eq!(task_err.message, "fetching model weights");
    assert_eq!(task_err.chain, vec!["connection refused".to_string()]);
    assert_eq!(format!("{}", task_err), "fetching model weights");
}

#[test]
fn test_task_error_serializes() {
    let json = serde_json::to_value(TaskError::new("boom")).unwrap();
    assert_eq!(json["message"], "boom");
    assert!(json["chain"].as_array().unwrap().is_empty());
}
