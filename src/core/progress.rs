//! Batch-wide progress aggregation, statistics and result export.
//!
//! Overall progress measures progress toward *success*: completed tasks count
//! 100 each, running tasks count their own reported progress, and queued or
//! failed tasks count 0. A batch where every task failed therefore reports 0%
//! even though every task is resolved.

use serde::Serialize;

use super::task::{TaskError, TaskId};

/// Aggregate completion percentage over the lifetime task count.
///
/// Returns 0 when no tasks were submitted.
pub fn overall_progress<I>(total_tasks: u64, completed: usize, running_progress: I) -> u8
where
    I: IntoIterator<Item = u8>,
{
    if total_tasks == 0 {
        return 0;
    }
    let running: u64 = running_progress.into_iter().map(u64::from).sum();
    let numerator = 100 * completed as u64 + running;
    // Round half up using integer math.
    let pct = (2 * numerator + total_tasks) / (2 * total_tasks);
    u8::try_from(pct.min(100)).unwrap_or(100)
}

/// Share of submitted tasks that completed successfully, in percent.
///
/// Defined as 0 (not NaN) for an empty batch.
pub fn success_rate(completed: usize, total_tasks: u64) -> f64 {
    if total_tasks == 0 {
        return 0.0;
    }
    completed as f64 / total_tasks as f64 * 100.0
}

/// Point-in-time statistics for one scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchStats {
    /// Tasks submitted over the scheduler's lifetime (reset by `clear()`).
    pub total_tasks: u64,
    /// Tasks that reached completed or failed.
    pub processed_tasks: u64,
    /// Tasks waiting in the queue.
    pub pending_tasks: usize,
    /// Tasks in flight, including those waiting out a retry delay.
    pub running_tasks: usize,
    /// Successfully completed tasks.
    pub completed_tasks: usize,
    /// Permanently failed tasks.
    pub failed_tasks: usize,
    /// See [`overall_progress`].
    pub overall_progress: u8,
    /// Milliseconds since the current or last run started; 0 if never started.
    pub elapsed_ms: u64,
    /// A `start()` session is active.
    pub is_processing: bool,
    /// Admission is paused.
    pub is_paused: bool,
    /// See [`success_rate`].
    pub success_rate: f64,
}

/// Exported view of a completed task.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedEntry<P, R> {
    /// Task identifier.
    pub id: TaskId,
    /// Input payload.
    pub data: P,
    /// Processor result.
    pub result: R,
    /// Duration of the successful attempt in milliseconds.
    pub duration_ms: u64,
}

/// Exported view of a failed task.
#[derive(Debug, Clone, Serialize)]
pub struct FailedEntry<P> {
    /// Task identifier.
    pub id: TaskId,
    /// Input payload.
    pub data: P,
    /// Error of the final attempt.
    pub error: Option<TaskError>,
    /// Retries consumed before giving up.
    pub retry_count: u32,
}

/// Final state of a scheduler, as returned by `export_results()`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport<P, R> {
    /// Statistics at export time.
    pub stats: BatchStats,
    /// Completed tasks in completion order.
    pub completed: Vec<CompletedEntry<P, R>>,
    /// Failed tasks in failure order.
    pub failed: Vec<FailedEntry<P>>,
}
