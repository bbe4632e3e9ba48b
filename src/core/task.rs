//! Task records, lifecycle states and the immutable views handed to callers.

use std::any::Any;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::executor::Processor;

/// Opaque unique task identifier.
pub type TaskId = Uuid;

/// Free-form per-task configuration passed through to the processor.
pub type TaskOptions = serde_json::Value;

/// Lifecycle state of a task.
///
/// ```text
/// pending -> running -> completed
///                    -> retrying -> pending   (bounded by retry_count)
///                    -> failed
/// pending | running | retrying -> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the queue.
    Pending,
    /// Processor invocation in flight.
    Running,
    /// Last attempt failed; waiting out the retry delay before re-queueing.
    Retrying,
    /// Finished successfully.
    Completed,
    /// Failed with retries exhausted.
    Failed,
    /// Dropped by `stop()`.
    Cancelled,
}

impl TaskStatus {
    /// Terminal states admit no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Cancelled)
                | (
                    Self::Running,
                    Self::Completed | Self::Retrying | Self::Failed | Self::Cancelled
                )
                | (Self::Retrying, Self::Pending | Self::Cancelled)
        )
    }
}

/// Serializable failure of one processor attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct TaskError {
    /// Top-level error message.
    pub message: String,
    /// Underlying causes, outermost first.
    pub chain: Vec<String>,
}

impl TaskError {
    /// Error with a message and no causes.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            chain: Vec::new(),
        }
    }

    /// Capture an `anyhow` error together with its cause chain.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        Self {
            message: err.to_string(),
            chain: err.chain().skip(1).map(ToString::to_string).collect(),
        }
    }

    /// Convert a caught panic payload.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".into());
        Self::new(format!("processor panicked: {detail}"))
    }
}

/// A unit of work as submitted by a caller.
pub struct TaskSubmission<P, R> {
    /// Capability that turns `data` into a result.
    pub processor: Processor<P, R>,
    /// Input payload.
    pub data: P,
    /// Options passed to the processor on every attempt.
    pub options: TaskOptions,
    /// Optional display name.
    pub name: Option<String>,
    /// Optional description.
    pub description: Option<String>,
}

impl<P, R> TaskSubmission<P, R> {
    /// Submission with null options and no name.
    pub fn new(processor: Processor<P, R>, data: P) -> Self {
        Self {
            processor,
            data,
            options: TaskOptions::Null,
            name: None,
            description: None,
        }
    }

    /// Set processor options.
    #[must_use]
    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }

    /// Set a display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Mutable run-state of a submitted task. Owned by exactly one scheduler collection.
pub(crate) struct TaskRecord<P, R> {
    pub id: TaskId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub processor: Processor<P, R>,
    pub data: P,
    pub options: TaskOptions,
    pub status: TaskStatus,
    pub progress: u8,
    pub error: Option<TaskError>,
    pub result: Option<R>,
    pub submitted_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub ended_at_ms: Option<u64>,
    pub retry_count: u32,
}

impl<P, R> TaskRecord<P, R> {
    pub fn from_submission(submission: TaskSubmission<P, R>, now_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: submission.name,
            description: submission.description,
            processor: submission.processor,
            data: submission.data,
            options: submission.options,
            status: TaskStatus::Pending,
            progress: 0,
            error: None,
            result: None,
            submitted_at_ms: now_ms,
            started_at_ms: None,
            ended_at_ms: None,
            retry_count: 0,
        }
    }

    /// Apply a lifecycle transition; illegal moves are refused and logged.
    pub fn transition(&mut self, next: TaskStatus) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::warn!(
                "task {} refused transition {:?} -> {:?}",
                self.id,
                self.status,
                next
            );
            return false;
        }
        self.status = next;
        true
    }

    /// Move a retrying task back to pending, clearing per-attempt state.
    pub fn reset_for_retry(&mut self) -> bool {
        if !self.transition(TaskStatus::Pending) {
            return false;
        }
        self.error = None;
        self.result = None;
        self.progress = 0;
        self.started_at_ms = None;
        true
    }

    pub fn duration_ms(&self) -> u64 {
        match (self.started_at_ms, self.ended_at_ms) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => 0,
        }
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            progress: self.progress,
            retry_count: self.retry_count,
        }
    }
}

impl<P: Clone, R: Clone> TaskRecord<P, R> {
    pub fn snapshot(&self) -> TaskSnapshot<P, R> {
        TaskSnapshot {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            status: self.status,
            progress: self.progress,
            data: self.data.clone(),
            options: self.options.clone(),
            result: self.result.clone(),
            error: self.error.clone(),
            retry_count: self.retry_count,
            submitted_at_ms: self.submitted_at_ms,
            started_at_ms: self.started_at_ms,
            ended_at_ms: self.ended_at_ms,
        }
    }
}

/// Lightweight task identity carried in events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// Task identifier.
    pub id: TaskId,
    /// Display name, if any.
    pub name: Option<String>,
    /// Status at the time of the event.
    pub status: TaskStatus,
    /// Task progress 0..=100.
    pub progress: u8,
    /// Retries consumed so far.
    pub retry_count: u32,
}

/// Immutable copy of a task's state at query time.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot<P, R> {
    /// Task identifier.
    pub id: TaskId,
    /// Display name.
    pub name: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Lifecycle state.
    pub status: TaskStatus,
    /// Progress 0..=100.
    pub progress: u8,
    /// Input payload.
    pub data: P,
    /// Processor options.
    pub options: TaskOptions,
    /// Result of the successful attempt.
    pub result: Option<R>,
    /// Error of the latest failed attempt.
    pub error: Option<TaskError>,
    /// Retries consumed so far.
    pub retry_count: u32,
    /// Submission time (ms since epoch).
    pub submitted_at_ms: u64,
    /// Start of the current or last attempt.
    pub started_at_ms: Option<u64>,
    /// Time the task reached a terminal state.
    pub ended_at_ms: Option<u64>,
}
