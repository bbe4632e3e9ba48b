//! # Prometheus Batch
//!
//! A bounded-concurrency batch task scheduler for AI platform workloads.
//!
//! Callers submit independent work items (a processor plus its input data and
//! options), start a run, and get back aggregate progress, per-task outcomes and
//! a completion summary. The scheduler caps how many processor invocations are
//! in flight, retries failures with a fixed delay ahead of newer work, and keeps
//! every task in exactly one of four collections: queue, running, completed or
//! failed.
//!
//! ## Key Features
//!
//! - **Concurrency cap**: at most `max_concurrency` invocations in flight; the
//!   loop sleeps on a completion channel rather than polling
//! - **Retry policy**: up to `retry_count` re-attempts, re-queued at the head
//!   after `retry_delay_ms`
//! - **Progress**: per-task reports from callable processors plus a batch-wide
//!   percentage measured toward success
//! - **Notifications**: progress, error and completion events delivered to sinks
//!   and broadcast on an event bus
//! - **Registry**: explicitly constructed map of named schedulers with a default
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use prometheus_batch::config::SchedulerOptions;
//! use prometheus_batch::core::{BatchScheduler, Processor, TaskSubmission};
//!
//! let scheduler = BatchScheduler::<u32, u32>::new(
//!     "squares",
//!     SchedulerOptions::default().with_max_concurrency(2),
//! )?;
//! let square = Processor::callable(|n: u32, _opts, progress| async move {
//!     progress.report(50, "halfway");
//!     Ok(n * n)
//! });
//! scheduler.add_tasks((1..=5).map(|n| TaskSubmission::new(square.clone(), n)));
//!
//! let summary = scheduler.start().await?;
//! assert_eq!(summary.completed_tasks, 5);
//! let report = scheduler.export_results();
//! ```
//!
//! For complete examples, see:
//! - `tests/scheduler_test.rs` - Scheduling, retry and cancellation scenarios
//! - `tests/registry_test.rs` - Registry and configuration wiring

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: tasks, processors, scheduler, registry.
pub mod core;
/// Configuration models for schedulers and registries.
pub mod config;
/// Builders to construct registries from configuration.
pub mod builders;
/// Runtime adapters for spawning processor attempts.
pub mod runtime;
/// Shared utilities.
pub mod util;
