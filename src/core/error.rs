//! Error types for scheduler operations.

use thiserror::Error;

/// Errors surfaced synchronously to callers of the scheduler and registry.
///
/// Task failures never appear here: they are absorbed by the retry policy and
/// reported through error events and [`crate::core::BatchScheduler::export_results`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// `start()` was called while a run is already in progress.
    #[error("scheduler `{0}` is already running")]
    AlreadyRunning(String),
    /// Configuration values failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A scheduler with this id is already registered.
    #[error("scheduler `{0}` already registered")]
    DuplicateScheduler(String),
    /// No async runtime was available to execute tasks on.
    #[error("runtime unavailable: {0}")]
    Runtime(String),
}

/// Result type returned by processors; any error counts as a task failure.
pub type AppResult<T> = Result<T, anyhow::Error>;
