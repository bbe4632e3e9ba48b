//! Bounded-concurrency batch scheduler with retries and aggregate progress.
//!
//! A [`BatchScheduler`] owns four collections (queue, running, completed,
//! failed) and moves every task through exactly one of them at a time. The
//! scheduling loop inside [`BatchScheduler::start`] admits queued tasks up to
//! `max_concurrency`, spawns each processor invocation without waiting for it,
//! and then sleeps on a completion channel until at least one running task
//! departs (or a control call wakes it). All collection and counter updates go
//! through a single `parking_lot::Mutex`.
//!
//! # Example
//!
//! ```rust,ignore
//! use prometheus_batch::config::SchedulerOptions;
//! use prometheus_batch::core::{BatchScheduler, Processor, TaskSubmission};
//!
//! let scheduler = BatchScheduler::<String, usize>::new("thumbnails", SchedulerOptions::default())?;
//! let measure = Processor::callable(|path: String, _opts, progress| async move {
//!     progress.report(50, "reading");
//!     Ok(path.len())
//! });
//! scheduler.add_task(TaskSubmission::new(measure, "a.png".into()));
//! let summary = scheduler.start().await?;
//! assert_eq!(summary.completed_tasks, 1);
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Notify};

use crate::config::SchedulerOptions;
use crate::core::executor::{Processor, ProgressReporter, TaskPayload};
use crate::core::notify::{
    BatchCompletion, BatchEvent, ErrorEvent, EventBus, NotificationSink, ProgressEvent,
};
use crate::core::progress::{
    overall_progress, success_rate, BatchReport, BatchStats, CompletedEntry, FailedEntry,
};
use crate::core::queue::TaskQueue;
use crate::core::task::{
    TaskError, TaskId, TaskOptions, TaskRecord, TaskSnapshot, TaskStatus, TaskSubmission,
    TaskSummary,
};
use crate::core::SchedulerError;
use crate::runtime::TokioSpawner;
use crate::util::clock::{elapsed_ms, now_ms};

/// Abstraction for spawning task execution on a runtime.
pub trait Spawn: Send + Sync {
    /// Run a future to completion in the background.
    fn spawn(&self, fut: BoxFuture<'static, ()>);
}

/// Message from a spawned attempt (or retry timer) back to the scheduling loop.
enum LoopMessage<R> {
    Finished {
        id: TaskId,
        attempt: u32,
        outcome: Result<R, TaskError>,
    },
    RetryDue {
        id: TaskId,
        attempt: u32,
    },
    Progress {
        id: TaskId,
        attempt: u32,
        percent: u8,
        message: Option<String>,
    },
}

type LoopSender<R> = mpsc::UnboundedSender<LoopMessage<R>>;

/// Everything needed to start one attempt, captured while holding the lock.
struct Launch<P, R> {
    id: TaskId,
    attempt: u32,
    processor: Processor<P, R>,
    data: P,
    options: TaskOptions,
}

struct SchedulerState<P, R> {
    queue: TaskQueue<P, R>,
    running: Vec<TaskRecord<P, R>>,
    completed: Vec<TaskRecord<P, R>>,
    failed: Vec<TaskRecord<P, R>>,
    total_tasks: u64,
    processed_tasks: u64,
    is_processing: bool,
    is_paused: bool,
    started_at_ms: Option<u64>,
    ended_at_ms: Option<u64>,
    /// Incremented by every `start()`; a loop whose session is stale exits.
    session: u64,
}

impl<P, R> SchedulerState<P, R> {
    fn new() -> Self {
        Self {
            queue: TaskQueue::new(),
            running: Vec::new(),
            completed: Vec::new(),
            failed: Vec::new(),
            total_tasks: 0,
            processed_tasks: 0,
            is_processing: false,
            is_paused: false,
            started_at_ms: None,
            ended_at_ms: None,
            session: 0,
        }
    }

    fn running_index(&self, id: TaskId) -> Option<usize> {
        self.running.iter().position(|t| t.id == id)
    }

    /// Tasks with an attempt in flight. Tasks waiting out a retry delay do not occupy a slot.
    fn active_count(&self) -> usize {
        self.running
            .iter()
            .filter(|t| t.status == TaskStatus::Running)
            .count()
    }

    /// Cancel every queued and running task and end the session.
    fn cancel_all(&mut self, now: u64) -> Vec<TaskSummary> {
        let mut cancelled: Vec<TaskRecord<P, R>> = self.running.drain(..).collect();
        cancelled.extend(self.queue.drain());
        if self.is_processing {
            self.ended_at_ms = Some(now);
        }
        self.is_processing = false;
        self.is_paused = false;
        cancelled
            .iter_mut()
            .map(|task| {
                task.transition(TaskStatus::Cancelled);
                task.ended_at_ms = Some(now);
                task.summary()
            })
            .collect()
    }

    fn overall_progress(&self) -> u8 {
        overall_progress(
            self.total_tasks,
            self.completed.len(),
            self.running.iter().map(|t| t.progress),
        )
    }

    fn stats(&self, now: u64) -> BatchStats {
        BatchStats {
            total_tasks: self.total_tasks,
            processed_tasks: self.processed_tasks,
            pending_tasks: self.queue.len(),
            running_tasks: self.active_count(),
            completed_tasks: self.completed.len(),
            failed_tasks: self.failed.len(),
            overall_progress: self.overall_progress(),
            elapsed_ms: self.started_at_ms.map_or(0, |start| elapsed_ms(start, now)),
            is_processing: self.is_processing,
            is_paused: self.is_paused,
            success_rate: success_rate(self.completed.len(), self.total_tasks),
        }
    }

    fn progress_event(
        &self,
        scheduler_id: &str,
        task: TaskSummary,
        task_message: Option<String>,
    ) -> ProgressEvent {
        ProgressEvent {
            scheduler_id: scheduler_id.to_string(),
            task_progress: task.progress,
            task,
            task_message,
            overall_progress: self.overall_progress(),
            processed_tasks: self.processed_tasks,
            total_tasks: self.total_tasks,
            remaining_tasks: self.total_tasks.saturating_sub(self.processed_tasks),
            running_tasks: self.active_count(),
            completed_tasks: self.completed.len(),
            failed_tasks: self.failed.len(),
        }
    }

    fn completion(&self, scheduler_id: &str, duration_ms: u64) -> BatchCompletion {
        let average_time_ms = if self.total_tasks == 0 {
            0.0
        } else {
            duration_ms as f64 / self.total_tasks as f64
        };
        BatchCompletion {
            scheduler_id: scheduler_id.to_string(),
            total_tasks: self.total_tasks,
            completed_tasks: self.completed.len(),
            failed_tasks: self.failed.len(),
            duration_ms,
            average_time_ms,
            success_rate: success_rate(self.completed.len(), self.total_tasks),
        }
    }

    fn find(&self, id: TaskId) -> Option<&TaskRecord<P, R>> {
        self.queue
            .find(id)
            .or_else(|| self.running.iter().find(|t| t.id == id))
            .or_else(|| self.completed.iter().find(|t| t.id == id))
            .or_else(|| self.failed.iter().find(|t| t.id == id))
    }
}

struct Shared<P, R> {
    id: String,
    options: SchedulerOptions,
    state: Mutex<SchedulerState<P, R>>,
    sinks: RwLock<Vec<Arc<dyn NotificationSink>>>,
    bus: EventBus,
    spawner: Option<Arc<dyn Spawn>>,
    /// Wakes the loop for control calls (stop, resume, clear, new submissions).
    wake: Notify,
}

impl<P, R> Shared<P, R> {
    /// Deliver events to sinks, then publish them on the bus. Never called with the state lock held.
    ///
    /// A panicking sink is logged and skipped; it never reaches the scheduling loop.
    fn emit(&self, events: Vec<BatchEvent>) {
        if events.is_empty() {
            return;
        }
        let sinks = self.sinks.read().clone();
        for event in events {
            for sink in &sinks {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(|| sink.notify(&event))) {
                    tracing::error!(
                        "scheduler {} notification sink panicked: {}",
                        self.id,
                        TaskError::from_panic(panic.as_ref())
                    );
                }
            }
            self.bus.publish(event);
        }
    }
}

/// Cloneable handle to a batch scheduler.
///
/// Clones share the same state, so one clone can drive `start()` while another
/// calls `pause()`, `stop()` or queries statistics.
pub struct BatchScheduler<P, R> {
    shared: Arc<Shared<P, R>>,
}

impl<P, R> Clone for BatchScheduler<P, R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P, R> fmt::Debug for BatchScheduler<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchScheduler")
            .field("id", &self.shared.id)
            .field("options", &self.shared.options)
            .finish_non_exhaustive()
    }
}

/// Builder for [`BatchScheduler`].
pub struct SchedulerBuilder<P, R> {
    id: String,
    options: SchedulerOptions,
    bus: Option<EventBus>,
    spawner: Option<Arc<dyn Spawn>>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    _marker: PhantomData<fn() -> (P, R)>,
}

impl<P, R> SchedulerBuilder<P, R> {
    /// Concurrency and retry settings.
    #[must_use]
    pub fn options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    /// Publish events on a shared bus instead of a private one.
    #[must_use]
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Spawn attempts with a custom spawner instead of the ambient tokio runtime.
    #[must_use]
    pub fn spawner(mut self, spawner: Arc<dyn Spawn>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Register a notification sink.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Validate options and build the scheduler.
    pub fn build(self) -> Result<BatchScheduler<P, R>, SchedulerError> {
        self.options
            .validate()
            .map_err(|e| SchedulerError::InvalidConfig(format!("scheduler `{}`: {e}", self.id)))?;
        Ok(BatchScheduler {
            shared: Arc::new(Shared {
                id: self.id,
                options: self.options,
                state: Mutex::new(SchedulerState::new()),
                sinks: RwLock::new(self.sinks),
                bus: self.bus.unwrap_or_default(),
                spawner: self.spawner,
                wake: Notify::new(),
            }),
        })
    }
}

impl<P, R> BatchScheduler<P, R> {
    /// Start building a scheduler with default options.
    pub fn builder(id: impl Into<String>) -> SchedulerBuilder<P, R> {
        SchedulerBuilder {
            id: id.into(),
            options: SchedulerOptions::default(),
            bus: None,
            spawner: None,
            sinks: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Scheduler with the given options, a private event bus and the ambient tokio runtime.
    pub fn new(id: impl Into<String>, options: SchedulerOptions) -> Result<Self, SchedulerError> {
        Self::builder(id).options(options).build()
    }

    /// Scheduler identifier.
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Configured options.
    pub fn options(&self) -> &SchedulerOptions {
        &self.shared.options
    }

    /// A `start()` session is active.
    pub fn is_processing(&self) -> bool {
        self.shared.state.lock().is_processing
    }

    /// Admission is paused.
    pub fn is_paused(&self) -> bool {
        self.shared.state.lock().is_paused
    }

    /// Register an additional notification sink.
    pub fn add_sink(&self, sink: Arc<dyn NotificationSink>) {
        self.shared.sinks.write().push(sink);
    }

    /// Subscribe to this scheduler's event bus.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.shared.bus.subscribe()
    }

    /// Queue a task at the tail and return its id.
    pub fn add_task(&self, submission: TaskSubmission<P, R>) -> TaskId {
        let task = TaskRecord::from_submission(submission, now_ms());
        let id = task.id;
        tracing::debug!(
            "scheduler {} queued task {} ({} processor)",
            self.shared.id,
            id,
            task.processor.kind()
        );
        {
            let mut state = self.shared.state.lock();
            state.queue.push_back(task);
            state.total_tasks += 1;
        }
        self.shared.wake.notify_one();
        id
    }

    /// Queue several tasks; ids are returned in submission order.
    pub fn add_tasks<I>(&self, submissions: I) -> Vec<TaskId>
    where
        I: IntoIterator<Item = TaskSubmission<P, R>>,
    {
        submissions.into_iter().map(|s| self.add_task(s)).collect()
    }

    /// Stop admitting queued tasks. Running tasks finish normally. Idempotent.
    pub fn pause(&self) {
        let mut state = self.shared.state.lock();
        if !state.is_paused {
            state.is_paused = true;
            tracing::info!("scheduler {} paused", self.shared.id);
        }
    }

    /// Resume admission after `pause()`. Returns `false` if there was nothing to resume.
    pub fn resume(&self) -> bool {
        let resumed = {
            let mut state = self.shared.state.lock();
            if state.is_processing && state.is_paused {
                state.is_paused = false;
                true
            } else {
                false
            }
        };
        if resumed {
            tracing::info!("scheduler {} resumed", self.shared.id);
            self.shared.wake.notify_one();
        }
        resumed
    }

    /// Cancel every queued and running task and end the current session.
    ///
    /// Both collections are emptied immediately. In-flight processor futures are
    /// not aborted; their results are discarded when they arrive. Returns the
    /// cancelled tasks.
    pub fn stop(&self) -> Vec<TaskSummary> {
        let cancelled = self.shared.state.lock().cancel_all(now_ms());
        self.shared.wake.notify_one();
        tracing::info!(
            "scheduler {} stopped, {} tasks cancelled",
            self.shared.id,
            cancelled.len()
        );
        cancelled
    }

    /// Drop every task and zero all counters, whatever the processing state.
    pub fn clear(&self) {
        {
            let mut state = self.shared.state.lock();
            let mut fresh = SchedulerState::new();
            fresh.session = state.session;
            if state.is_processing {
                fresh.is_processing = true;
                fresh.is_paused = state.is_paused;
                fresh.started_at_ms = state.started_at_ms;
            }
            *state = fresh;
        }
        self.shared.wake.notify_one();
        tracing::info!("scheduler {} cleared", self.shared.id);
    }

    /// Aggregate completion percentage, see [`overall_progress`].
    pub fn get_overall_progress(&self) -> u8 {
        self.shared.state.lock().overall_progress()
    }

    /// Snapshot of counters and flags.
    pub fn get_stats(&self) -> BatchStats {
        self.shared.state.lock().stats(now_ms())
    }
}

impl<P, R> BatchScheduler<P, R>
where
    P: TaskPayload,
    R: TaskPayload,
{
    /// Run queued tasks until the queue and running set are empty, or `stop()` is called.
    ///
    /// Fails immediately with [`SchedulerError::AlreadyRunning`] if a session is
    /// already active. Task failures never surface here; they are retried, then
    /// recorded and reported through error events. Exactly one completion event
    /// is emitted per successful call, and its payload is returned.
    pub async fn start(&self) -> Result<BatchCompletion, SchedulerError> {
        let spawner = self.resolve_spawner()?;
        let (session, started_at, queued) = {
            let mut state = self.shared.state.lock();
            if state.is_processing {
                return Err(SchedulerError::AlreadyRunning(self.shared.id.clone()));
            }
            let now = now_ms();
            state.is_processing = true;
            state.is_paused = false;
            state.started_at_ms = Some(now);
            state.ended_at_ms = None;
            state.session += 1;
            (state.session, now, state.queue.len())
        };
        tracing::info!(
            "scheduler {} started: {} queued, max_concurrency={}",
            self.shared.id,
            queued,
            self.shared.options.max_concurrency
        );

        let run = AssertUnwindSafe(self.run_loop(session, &spawner))
            .catch_unwind()
            .await;
        if let Err(panic) = run {
            let error = TaskError::from_panic(panic.as_ref());
            tracing::error!("scheduler {} loop aborted: {}", self.shared.id, error);
            let cancelled = {
                let mut state = self.shared.state.lock();
                if state.session == session && state.is_processing {
                    state.cancel_all(now_ms())
                } else {
                    Vec::new()
                }
            };
            if !cancelled.is_empty() {
                tracing::warn!(
                    "scheduler {} cancelled {} tasks left behind by the aborted loop",
                    self.shared.id,
                    cancelled.len()
                );
            }
            self.shared.emit(vec![BatchEvent::Error(ErrorEvent {
                scheduler_id: self.shared.id.clone(),
                task: None,
                error,
            })]);
        }

        let duration = elapsed_ms(started_at, now_ms());
        let completion = self.shared.state.lock().completion(&self.shared.id, duration);
        tracing::info!(
            "scheduler {} finished: {} completed, {} failed in {}ms",
            self.shared.id,
            completion.completed_tasks,
            completion.failed_tasks,
            completion.duration_ms
        );
        self.shared
            .emit(vec![BatchEvent::Complete(completion.clone())]);
        Ok(completion)
    }

    fn resolve_spawner(&self) -> Result<Arc<dyn Spawn>, SchedulerError> {
        match &self.shared.spawner {
            Some(spawner) => Ok(Arc::clone(spawner)),
            None => Ok(Arc::new(TokioSpawner::current()?)),
        }
    }

    async fn run_loop(&self, session: u64, spawner: &Arc<dyn Spawn>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        loop {
            let (launches, done) = self.admit(session);
            for launch in launches {
                self.launch(launch, spawner, &tx);
            }
            if done {
                break;
            }
            // Wait for at least one running task to depart, or a control call.
            tokio::select! {
                Some(message) = rx.recv() => self.handle_message(message, spawner, &tx),
                () = self.shared.wake.notified() => {}
            }
        }
    }

    /// Move queued tasks into running up to the concurrency cap.
    /// Returns the attempts to launch and whether the session is over.
    fn admit(&self, session: u64) -> (Vec<Launch<P, R>>, bool) {
        let mut state = self.shared.state.lock();
        if state.session != session {
            tracing::debug!("scheduler {} session {} superseded", self.shared.id, session);
            return (Vec::new(), true);
        }
        if !state.is_processing {
            return (Vec::new(), true);
        }

        let mut launches = Vec::new();
        if !state.is_paused {
            let now = now_ms();
            let mut active = state.active_count();
            while active < self.shared.options.max_concurrency {
                let Some(mut task) = state.queue.pop_front() else {
                    break;
                };
                task.transition(TaskStatus::Running);
                task.started_at_ms = Some(now);
                task.progress = 0;
                tracing::debug!(
                    "scheduler {} admitted task {} (attempt {})",
                    self.shared.id,
                    task.id,
                    task.retry_count + 1
                );
                launches.push(Launch {
                    id: task.id,
                    attempt: task.retry_count,
                    processor: task.processor.clone(),
                    data: task.data.clone(),
                    options: task.options.clone(),
                });
                state.running.push(task);
                active += 1;
            }
        }

        if state.queue.is_empty() && state.running.is_empty() {
            state.is_processing = false;
            state.ended_at_ms = Some(now_ms());
            return (launches, true);
        }
        (launches, false)
    }

    fn launch(&self, launch: Launch<P, R>, spawner: &Arc<dyn Spawn>, tx: &LoopSender<R>) {
        let Launch {
            id,
            attempt,
            processor,
            data,
            options,
        } = launch;
        let reporter = Self::progress_reporter(id, attempt, tx);
        let tx = tx.clone();
        spawner.spawn(Box::pin(async move {
            let attempt_fut = async move { processor.invoke(data, options, reporter).await };
            let outcome = match AssertUnwindSafe(attempt_fut).catch_unwind().await {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(err)) => Err(TaskError::from_anyhow(&err)),
                Err(panic) => Err(TaskError::from_panic(panic.as_ref())),
            };
            // The loop may already be gone after stop(); the result is then orphaned.
            let _ = tx.send(LoopMessage::Finished {
                id,
                attempt,
                outcome,
            });
        }));
    }

    /// Reports travel through the loop channel so every event is emitted from the loop, in order.
    fn progress_reporter(id: TaskId, attempt: u32, tx: &LoopSender<R>) -> ProgressReporter {
        let tx = tx.clone();
        ProgressReporter::new(
            id,
            Arc::new(move |percent: u8, message: Option<String>| {
                let _ = tx.send(LoopMessage::Progress {
                    id,
                    attempt,
                    percent,
                    message,
                });
            }),
        )
    }

    fn handle_message(&self, message: LoopMessage<R>, spawner: &Arc<dyn Spawn>, tx: &LoopSender<R>) {
        match message {
            LoopMessage::Finished {
                id,
                attempt,
                outcome,
            } => self.on_finished(id, attempt, outcome, spawner, tx),
            LoopMessage::RetryDue { id, attempt } => self.on_retry_due(id, attempt),
            LoopMessage::Progress {
                id,
                attempt,
                percent,
                message,
            } => self.on_progress(id, attempt, percent, message),
        }
    }

    fn on_progress(&self, id: TaskId, attempt: u32, percent: u8, message: Option<String>) {
        let event = {
            let mut state = self.shared.state.lock();
            let Some(idx) = state.running_index(id) else {
                tracing::debug!("ignoring progress for task {} that is no longer running", id);
                return;
            };
            let task = &mut state.running[idx];
            if task.retry_count != attempt || task.status != TaskStatus::Running {
                return;
            }
            task.progress = task.progress.max(percent);
            let summary = task.summary();
            state.progress_event(&self.shared.id, summary, message)
        };
        self.shared.emit(vec![BatchEvent::Progress(event)]);
    }

    fn on_finished(
        &self,
        id: TaskId,
        attempt: u32,
        outcome: Result<R, TaskError>,
        spawner: &Arc<dyn Spawn>,
        tx: &LoopSender<R>,
    ) {
        let mut events = Vec::new();
        let mut retry_attempt = None;
        {
            let mut state = self.shared.state.lock();
            let Some(idx) = state.running_index(id) else {
                tracing::warn!(
                    "scheduler {} dropped result of task {} that is no longer tracked",
                    self.shared.id,
                    id
                );
                return;
            };
            if state.running[idx].retry_count != attempt
                || state.running[idx].status != TaskStatus::Running
            {
                return;
            }
            let now = now_ms();
            match outcome {
                Ok(result) => {
                    let mut task = state.running.remove(idx);
                    task.transition(TaskStatus::Completed);
                    task.result = Some(result);
                    task.progress = 100;
                    task.ended_at_ms = Some(now);
                    tracing::debug!(
                        "scheduler {} completed task {} in {}ms",
                        self.shared.id,
                        id,
                        task.duration_ms()
                    );
                    let summary = task.summary();
                    state.completed.push(task);
                    state.processed_tasks += 1;
                    events.push(BatchEvent::Progress(state.progress_event(
                        &self.shared.id,
                        summary,
                        None,
                    )));
                }
                Err(error) if attempt < self.shared.options.retry_count => {
                    let task = &mut state.running[idx];
                    task.transition(TaskStatus::Retrying);
                    task.retry_count += 1;
                    tracing::warn!(
                        "scheduler {} task {} failed (attempt {}), retrying in {}ms: {}",
                        self.shared.id,
                        id,
                        attempt + 1,
                        self.shared.options.retry_delay_ms,
                        error
                    );
                    task.error = Some(error);
                    retry_attempt = Some(task.retry_count);
                }
                Err(error) => {
                    let mut task = state.running.remove(idx);
                    task.transition(TaskStatus::Failed);
                    task.error = Some(error.clone());
                    task.ended_at_ms = Some(now);
                    tracing::error!(
                        "scheduler {} task {} failed after {} attempts: {}",
                        self.shared.id,
                        id,
                        attempt + 1,
                        error
                    );
                    let summary = task.summary();
                    state.failed.push(task);
                    state.processed_tasks += 1;
                    events.push(BatchEvent::Error(ErrorEvent {
                        scheduler_id: self.shared.id.clone(),
                        task: Some(summary),
                        error,
                    }));
                }
            }
        }
        if let Some(attempt) = retry_attempt {
            self.schedule_retry(id, attempt, spawner, tx);
        }
        self.shared.emit(events);
    }

    /// The task stays tracked in `running` as `retrying` without holding a slot;
    /// later work is admitted while the delay elapses.
    fn schedule_retry(&self, id: TaskId, attempt: u32, spawner: &Arc<dyn Spawn>, tx: &LoopSender<R>) {
        let delay = self.shared.options.retry_delay();
        let tx = tx.clone();
        if delay.is_zero() {
            let _ = tx.send(LoopMessage::RetryDue { id, attempt });
            return;
        }
        spawner.spawn(Box::pin(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(LoopMessage::RetryDue { id, attempt });
        }));
    }

    fn on_retry_due(&self, id: TaskId, attempt: u32) {
        let mut state = self.shared.state.lock();
        let Some(idx) = state.running_index(id) else {
            return;
        };
        if state.running[idx].status != TaskStatus::Retrying
            || state.running[idx].retry_count != attempt
        {
            return;
        }
        let mut task = state.running.remove(idx);
        task.reset_for_retry();
        tracing::debug!(
            "scheduler {} re-queued task {} at head for attempt {}",
            self.shared.id,
            id,
            attempt + 1
        );
        state.queue.push_front(task);
    }

    /// Completed tasks in completion order.
    pub fn get_completed_tasks(&self) -> Vec<TaskSnapshot<P, R>> {
        self.shared
            .state
            .lock()
            .completed
            .iter()
            .map(TaskRecord::snapshot)
            .collect()
    }

    /// Permanently failed tasks in failure order.
    pub fn get_failed_tasks(&self) -> Vec<TaskSnapshot<P, R>> {
        self.shared
            .state
            .lock()
            .failed
            .iter()
            .map(TaskRecord::snapshot)
            .collect()
    }

    /// Every tracked task: queued, then running, then completed, then failed.
    pub fn get_all_tasks(&self) -> Vec<TaskSnapshot<P, R>> {
        let state = self.shared.state.lock();
        state
            .queue
            .iter()
            .chain(state.running.iter())
            .chain(state.completed.iter())
            .chain(state.failed.iter())
            .map(TaskRecord::snapshot)
            .collect()
    }

    /// Look up one tracked task by id.
    pub fn get_task(&self, id: TaskId) -> Option<TaskSnapshot<P, R>> {
        self.shared.state.lock().find(id).map(TaskRecord::snapshot)
    }

    /// Statistics plus the outcome of every resolved task.
    pub fn export_results(&self) -> BatchReport<P, R> {
        let state = self.shared.state.lock();
        BatchReport {
            stats: state.stats(now_ms()),
            completed: state
                .completed
                .iter()
                .filter_map(|t| {
                    t.result.clone().map(|result| CompletedEntry {
                        id: t.id,
                        data: t.data.clone(),
                        result,
                        duration_ms: t.duration_ms(),
                    })
                })
                .collect(),
            failed: state
                .failed
                .iter()
                .map(|t| FailedEntry {
                    id: t.id,
                    data: t.data.clone(),
                    error: t.error.clone(),
                    retry_count: t.retry_count,
                })
                .collect(),
        }
    }

    /// [`Self::export_results`] as JSON.
    pub fn export_json(&self) -> Result<serde_json::Value, serde_json::Error>
    where
        P: Serialize,
        R: Serialize,
    {
        serde_json::to_value(self.export_results())
    }
}
