//! Tests for tokio spawner utilities

use prometheus_batch::config::SchedulerOptions;
use prometheus_batch::core::{BatchScheduler, Processor, Spawn, TaskSubmission};
use prometheus_batch::runtime::tokio_spawner::TokioSpawner;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(Box::pin(async move {
        tx.send(123).unwrap();
    }));

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

/// Spawner that counts what it runs.
struct CountingSpawner {
    inner: TokioSpawner,
    spawned: AtomicUsize,
}

impl Spawn for CountingSpawner {
    fn spawn(&self, fut: BoxFuture<'static, ()>) {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        self.inner.spawn(fut);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scheduler_uses_custom_spawner() {
    let spawner = Arc::new(CountingSpawner {
        inner: TokioSpawner::current().unwrap(),
        spawned: AtomicUsize::new(0),
    });
    let scheduler = BatchScheduler::builder("custom-spawner")
        .options(SchedulerOptions::default().with_max_concurrency(2))
        .spawner(spawner.clone())
        .build()
        .unwrap();
    let processor = Processor::callable(|n: u32, _options, _progress| async move { Ok(n + 1) });
    scheduler.add_tasks((0..3).map(|n| TaskSubmission::new(processor.clone(), n)));

    let summary = scheduler.start().await.unwrap();

    assert_eq!(summary.completed_tasks, 3);
    assert_eq!(spawner.spawned.load(Ordering::SeqCst), 3);
}
