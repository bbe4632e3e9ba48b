//! The processor capability: what turns a task's data into a result.
//!
//! A processor comes in one of two shapes, fixed when the task is built:
//!
//! - [`Processor::Callable`]: an async function of `(data, options, progress)`,
//!   able to report intermediate progress.
//! - [`Processor::Executor`]: an object implementing [`TaskExecutor`], invoked as
//!   `execute(data, options)` with no progress reporting.
//!
//! Because the shape is an enum there is no way to submit a task whose processor
//! matches neither contract.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::error::AppResult;
use super::task::{TaskId, TaskOptions};

/// Object-shaped processor.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_batch::core::{AppResult, TaskExecutor, TaskOptions};
///
/// struct Thumbnail;
///
/// #[async_trait]
/// impl TaskExecutor<Vec<u8>, Vec<u8>> for Thumbnail {
///     async fn execute(&self, image: Vec<u8>, _options: TaskOptions) -> AppResult<Vec<u8>> {
///         Ok(downscale(&image)?)
///     }
/// }
/// ```
#[async_trait]
pub trait TaskExecutor<P, R>: Send + Sync + 'static {
    /// Run one attempt. Any `Err` counts as a task failure and is subject to retry.
    async fn execute(&self, data: P, options: TaskOptions) -> AppResult<R>;
}

/// Marker for task data and results: cloned for retries and snapshots, moved across threads.
pub trait TaskPayload: Clone + Send + Sync + 'static {}

/// Blanket implementation: any type meeting the requirements is a `TaskPayload`.
impl<T> TaskPayload for T where T: Clone + Send + Sync + 'static {}

type ReportFn = dyn Fn(u8, Option<String>) + Send + Sync;

/// Handle given to callable processors for reporting per-task progress.
///
/// Reports are clamped to `0..=100`. Reports arriving after the task was
/// cancelled, or from an attempt that has since been retried, are ignored.
#[derive(Clone)]
pub struct ProgressReporter {
    task_id: TaskId,
    report: Arc<ReportFn>,
}

impl ProgressReporter {
    pub(crate) fn new(task_id: TaskId, report: Arc<ReportFn>) -> Self {
        Self { task_id, report }
    }

    /// Reporter that discards everything, for invoking processors outside a scheduler.
    pub fn detached(task_id: TaskId) -> Self {
        Self::new(task_id, Arc::new(|_: u8, _: Option<String>| {}))
    }

    /// Task this reporter belongs to.
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Report progress with a human readable message.
    pub fn report(&self, percent: u8, message: impl Into<String>) {
        (self.report)(percent.min(100), Some(message.into()));
    }

    /// Report progress without a message.
    pub fn set_progress(&self, percent: u8) {
        (self.report)(percent.min(100), None);
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("task_id", &self.task_id)
            .finish_non_exhaustive()
    }
}

/// Boxed callable processor.
pub type ProcessorFn<P, R> =
    dyn Fn(P, TaskOptions, ProgressReporter) -> BoxFuture<'static, AppResult<R>> + Send + Sync;

/// The two processor shapes.
pub enum Processor<P, R> {
    /// `(data, options, progress) -> result`.
    Callable(Arc<ProcessorFn<P, R>>),
    /// `execute(data, options) -> result`.
    Executor(Arc<dyn TaskExecutor<P, R>>),
}

impl<P, R> Clone for Processor<P, R> {
    fn clone(&self) -> Self {
        match self {
            Self::Callable(f) => Self::Callable(Arc::clone(f)),
            Self::Executor(e) => Self::Executor(Arc::clone(e)),
        }
    }
}

impl<P, R> fmt::Debug for Processor<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

impl<P, R> Processor<P, R> {
    /// Shape name, used in logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Callable(_) => "callable",
            Self::Executor(_) => "executor",
        }
    }
}

impl<P, R> Processor<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Wrap an async closure.
    pub fn callable<F, Fut>(f: F) -> Self
    where
        F: Fn(P, TaskOptions, ProgressReporter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<R>> + Send + 'static,
    {
        Self::Callable(Arc::new(
            move |data: P,
                  options: TaskOptions,
                  progress: ProgressReporter|
                  -> BoxFuture<'static, AppResult<R>> {
                Box::pin(f(data, options, progress))
            },
        ))
    }

    /// Wrap a [`TaskExecutor`] implementation.
    pub fn executor<E>(executor: E) -> Self
    where
        E: TaskExecutor<P, R>,
    {
        Self::Executor(Arc::new(executor))
    }

    /// Start one attempt.
    pub fn invoke(
        &self,
        data: P,
        options: TaskOptions,
        progress: ProgressReporter,
    ) -> BoxFuture<'static, AppResult<R>> {
        match self {
            Self::Callable(f) => f(data, options, progress),
            Self::Executor(executor) => {
                let executor = Arc::clone(executor);
                Box::pin(async move { executor.execute(data, options).await })
            }
        }
    }
}
