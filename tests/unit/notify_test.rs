//! Tests for notification sinks and the event bus

use prometheus_batch::core::{
    BatchCompletion, BatchEvent, ErrorEvent, EventBus, InMemoryNotificationSink, NotificationSink,
    TaskError,
};

fn completion(id: &str) -> BatchEvent {
    BatchEvent::Complete(BatchCompletion {
        scheduler_id: id.to_string(),
        total_tasks: 2,
        completed_tasks: 1,
        failed_tasks: 1,
        duration_ms: 40,
        average_time_ms: 20.0,
        success_rate: 50.0,
    })
}

fn failure(id: &str) -> BatchEvent {
    BatchEvent::Error(ErrorEvent {
        scheduler_id: id.to_string(),
        task: None,
        error: TaskError::new("boom"),
    })
}

#[test]
fn test_in_memory_sink_filters_by_kind() {
    let sink = InMemoryNotificationSink::new(10);
    sink.notify(&failure("a"));
    sink.notify(&completion("a"));

    assert_eq!(sink.events().len(), 2);
    assert_eq!(sink.errors().len(), 1);
    assert_eq!(sink.completions().len(), 1);
    assert!(sink.progress().is_empty());
    assert_eq!(sink.completions()[0].average_time_ms, 20.0);
}

#[test]
fn test_in_memory_sink_overflow() {
    let sink = InMemoryNotificationSink::new(2);
    sink.notify(&completion("first"));
    sink.notify(&completion("second"));
    sink.notify(&completion("third"));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].scheduler_id(), "second");
    assert_eq!(events[1].scheduler_id(), "third");
}

#[test]
fn test_event_json_is_tagged() {
    let json = serde_json::to_value(completion("jobs")).unwrap();
    assert_eq!(json["type"], "complete");
    assert_eq!(json["scheduler_id"], "jobs");
    assert_eq!(json["success_rate"], 50.0);

    let json = serde_json::to_value(failure("jobs")).unwrap();
    assert_eq!(json["type"], "error");
    assert!(json["task"].is_null());
}

#[tokio::test]
async fn test_event_bus_fan_out() {
    let bus = EventBus::new(8);
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();
    assert_eq!(bus.receiver_count(), 2);

    bus.publish(completion("jobs"));

    assert_eq!(a.recv().await.unwrap(), completion("jobs"));
    assert_eq!(b.recv().await.unwrap(), completion("jobs"));
}

#[test]
fn test_event_bus_without_subscribers() {
    let bus = EventBus::default();
    bus.publish(completion("nobody"));
    assert_eq!(bus.receiver_count(), 0);
}
