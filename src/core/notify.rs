//! Batch notifications: event types, sinks and the broadcast bus.
//!
//! Each event is delivered synchronously to every registered
//! [`NotificationSink`] right after the state change that produced it, and then
//! published on an [`EventBus`]. The bus is a broadcast channel: subscribers only
//! see events sent after they subscribed, and slow subscribers may lag.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

use super::task::{TaskError, TaskSummary};

/// Per-task progress together with the batch aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// Scheduler that emitted the event.
    pub scheduler_id: String,
    /// Task the progress refers to.
    pub task: TaskSummary,
    /// Task progress 0..=100.
    pub task_progress: u8,
    /// Message passed with the progress report, if any.
    pub task_message: Option<String>,
    /// Batch-wide progress 0..=100.
    pub overall_progress: u8,
    /// Completed plus failed.
    pub processed_tasks: u64,
    /// Lifetime submitted tasks.
    pub total_tasks: u64,
    /// `total_tasks - processed_tasks`.
    pub remaining_tasks: u64,
    /// Tasks in flight.
    pub running_tasks: usize,
    /// Completed tasks.
    pub completed_tasks: usize,
    /// Failed tasks.
    pub failed_tasks: usize,
}

/// A task failed permanently, or the scheduling loop itself hit a defect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEvent {
    /// Scheduler that emitted the event.
    pub scheduler_id: String,
    /// Failed task; `None` for a loop defect.
    pub task: Option<TaskSummary>,
    /// Error message and cause chain.
    pub error: TaskError,
}

/// Summary delivered exactly once per `start()` session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchCompletion {
    /// Scheduler that emitted the event.
    pub scheduler_id: String,
    /// Lifetime submitted tasks.
    pub total_tasks: u64,
    /// Completed tasks.
    pub completed_tasks: usize,
    /// Failed tasks.
    pub failed_tasks: usize,
    /// Session wall time in milliseconds.
    pub duration_ms: u64,
    /// `duration_ms / total_tasks`, 0 for an empty batch.
    pub average_time_ms: f64,
    /// Completed share of submitted tasks, in percent.
    pub success_rate: f64,
}

/// Notification emitted by a scheduler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    /// Task progress changed or a task completed.
    Progress(ProgressEvent),
    /// Task failed permanently.
    Error(ErrorEvent),
    /// A `start()` session ended.
    Complete(BatchCompletion),
}

impl BatchEvent {
    /// Scheduler that emitted the event.
    pub fn scheduler_id(&self) -> &str {
        match self {
            Self::Progress(e) => &e.scheduler_id,
            Self::Error(e) => &e.scheduler_id,
            Self::Complete(e) => &e.scheduler_id,
        }
    }
}

/// Receiver of batch events. Called synchronously on the scheduling path, so
/// implementations must be quick and must not block.
///
/// Progress and error events are delivered from the scheduling loop, one at a
/// time and in the order the state changed. A sink that panics is logged and
/// skipped for that event.
pub trait NotificationSink: Send + Sync {
    /// Handle one event.
    fn notify(&self, event: &BatchEvent);
}

impl<F> NotificationSink for F
where
    F: Fn(&BatchEvent) + Send + Sync,
{
    fn notify(&self, event: &BatchEvent) {
        self(event);
    }
}

/// Sink that keeps the most recent events in memory, for tests and dev.
pub struct InMemoryNotificationSink {
    events: Mutex<VecDeque<BatchEvent>>,
    max_events: usize,
}

impl InMemoryNotificationSink {
    /// Create a sink with a bounded buffer; the oldest events are dropped first.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        }
    }

    /// Snapshot of stored events, oldest first.
    pub fn events(&self) -> Vec<BatchEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Stored completion events.
    pub fn completions(&self) -> Vec<BatchCompletion> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                BatchEvent::Complete(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    /// Stored error events.
    pub fn errors(&self) -> Vec<ErrorEvent> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                BatchEvent::Error(err) => Some(err.clone()),
                _ => None,
            })
            .collect()
    }

    /// Stored progress events.
    pub fn progress(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                BatchEvent::Progress(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }
}

impl NotificationSink for InMemoryNotificationSink {
    fn notify(&self, event: &BatchEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event.clone());
    }
}

/// Sink that writes every event to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, event: &BatchEvent) {
        match event {
            BatchEvent::Progress(p) => tracing::debug!(
                scheduler = %p.scheduler_id,
                task = %p.task.id,
                task_progress = p.task_progress,
                overall = p.overall_progress,
                "task progress"
            ),
            BatchEvent::Error(e) => tracing::error!(
                scheduler = %e.scheduler_id,
                task = ?e.task.as_ref().map(|t| t.id),
                "task failed: {}",
                e.error
            ),
            BatchEvent::Complete(c) => tracing::info!(
                scheduler = %c.scheduler_id,
                completed = c.completed_tasks,
                failed = c.failed_tasks,
                duration_ms = c.duration_ms,
                "batch complete"
            ),
        }
    }
}

/// Default number of events buffered for lagging subscribers.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Broadcast channel shared by every scheduler attached to it.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BatchEvent>,
}

impl EventBus {
    /// Create a bus that buffers up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: BatchEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receivers", &self.tx.receiver_count())
            .finish()
    }
}
