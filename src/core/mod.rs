//! Core scheduling abstractions: tasks, processors, the scheduler loop and the registry.

pub mod error;
pub mod executor;
pub mod notify;
pub mod progress;
pub(crate) mod queue;
pub mod registry;
pub mod scheduler;
pub mod task;

pub use error::{AppResult, SchedulerError};
pub use executor::{Processor, ProcessorFn, ProgressReporter, TaskExecutor, TaskPayload};
pub use notify::{
    BatchCompletion, BatchEvent, ErrorEvent, EventBus, InMemoryNotificationSink,
    NotificationSink, ProgressEvent, TracingNotificationSink, DEFAULT_EVENT_CAPACITY,
};
pub use progress::{
    overall_progress, success_rate, BatchReport, BatchStats, CompletedEntry, FailedEntry,
};
pub use registry::{SchedulerRegistry, DEFAULT_SCHEDULER_ID};
pub use scheduler::{BatchScheduler, SchedulerBuilder, Spawn};
pub use task::{TaskError, TaskId, TaskOptions, TaskSnapshot, TaskStatus, TaskSubmission, TaskSummary};
