//! Named scheduler registry.
//!
//! The registry is an ordinary value: construct it where the application wires
//! its services and pass it (or an `Arc` of it) to whoever needs schedulers.
//! Every scheduler created through it publishes on the registry's event bus.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::config::SchedulerOptions;
use crate::core::notify::{BatchEvent, EventBus};
use crate::core::scheduler::BatchScheduler;
use crate::core::SchedulerError;

/// Id used for the lazily created default scheduler.
pub const DEFAULT_SCHEDULER_ID: &str = "default";

#[derive(Debug)]
struct RegistryState<P, R> {
    schedulers: HashMap<String, BatchScheduler<P, R>>,
    default_id: Option<String>,
}

/// Maps job ids to schedulers and tracks which one is the default.
///
/// The registry stores `BatchScheduler` handles, which are shared-ownership
/// clones rather than non-owning references: a scheduler stays alive while it
/// is registered, even if every caller dropped its handle, and all handles
/// see the same queue and counters. `remove_processor` and `cleanup` stop a
/// scheduler and release the registry's handle.
#[derive(Debug)]
pub struct SchedulerRegistry<P, R> {
    state: Mutex<RegistryState<P, R>>,
    bus: EventBus,
    default_options: SchedulerOptions,
}

impl<P, R> SchedulerRegistry<P, R> {
    /// Empty registry with default options and event capacity.
    pub fn new() -> Self {
        Self::with_options(SchedulerOptions::default(), EventBus::default())
    }

    /// Empty registry using `default_options` for the lazily created default
    /// scheduler and `bus` for every scheduler's events.
    pub fn with_options(default_options: SchedulerOptions, bus: EventBus) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                schedulers: HashMap::new(),
                default_id: None,
            }),
            bus,
            default_options,
        }
    }

    /// Create and register a scheduler. The first scheduler registered becomes
    /// the default if none is set yet.
    pub fn create_processor(
        &self,
        id: impl Into<String>,
        options: SchedulerOptions,
    ) -> Result<BatchScheduler<P, R>, SchedulerError> {
        let id = id.into();
        let mut state = self.state.lock();
        if state.schedulers.contains_key(&id) {
            return Err(SchedulerError::DuplicateScheduler(id));
        }
        let scheduler = BatchScheduler::builder(id.clone())
            .options(options)
            .event_bus(self.bus.clone())
            .build()?;
        state.schedulers.insert(id.clone(), scheduler.clone());
        if state.default_id.is_none() {
            tracing::debug!("scheduler {} is now the default", id);
            state.default_id = Some(id.clone());
        }
        tracing::info!("registered scheduler {}", id);
        Ok(scheduler)
    }

    /// Scheduler by id, or the default scheduler when `id` is `None`.
    pub fn get_processor(&self, id: Option<&str>) -> Option<BatchScheduler<P, R>> {
        let state = self.state.lock();
        let key = match id {
            Some(id) => id,
            None => state.default_id.as_deref()?,
        };
        state.schedulers.get(key).cloned()
    }

    /// The default scheduler, creating one named [`DEFAULT_SCHEDULER_ID`] if none exists.
    pub fn get_default_processor(&self) -> Result<BatchScheduler<P, R>, SchedulerError> {
        if let Some(existing) = self.get_processor(None) {
            return Ok(existing);
        }
        match self.create_processor(DEFAULT_SCHEDULER_ID, self.default_options.clone()) {
            Ok(scheduler) => {
                self.state.lock().default_id = Some(DEFAULT_SCHEDULER_ID.to_string());
                Ok(scheduler)
            }
            Err(SchedulerError::DuplicateScheduler(_)) => {
                // A scheduler named "default" exists but another one is the default.
                let mut state = self.state.lock();
                state.default_id = Some(DEFAULT_SCHEDULER_ID.to_string());
                state
                    .schedulers
                    .get(DEFAULT_SCHEDULER_ID)
                    .cloned()
                    .ok_or_else(|| SchedulerError::DuplicateScheduler(DEFAULT_SCHEDULER_ID.into()))
            }
            Err(other) => Err(other),
        }
    }

    /// Stop and unregister a scheduler. Returns `false` if the id was unknown.
    pub fn remove_processor(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.state.lock();
            let removed = state.schedulers.remove(id);
            if removed.is_some() && state.default_id.as_deref() == Some(id) {
                state.default_id = None;
            }
            removed
        };
        match removed {
            Some(scheduler) => {
                scheduler.stop();
                tracing::info!("removed scheduler {}", id);
                true
            }
            None => false,
        }
    }

    /// Stop and unregister every scheduler.
    pub fn cleanup(&self) {
        let drained: Vec<BatchScheduler<P, R>> = {
            let mut state = self.state.lock();
            state.default_id = None;
            state.schedulers.drain().map(|(_, s)| s).collect()
        };
        for scheduler in &drained {
            scheduler.stop();
        }
        tracing::info!("registry cleaned up {} schedulers", drained.len());
    }

    /// Registered scheduler ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().schedulers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Id of the current default scheduler.
    pub fn default_id(&self) -> Option<String> {
        self.state.lock().default_id.clone()
    }

    /// Number of registered schedulers.
    pub fn len(&self) -> usize {
        self.state.lock().schedulers.len()
    }

    /// No schedulers registered.
    pub fn is_empty(&self) -> bool {
        self.state.lock().schedulers.is_empty()
    }

    /// Subscribe to events from every scheduler in this registry.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.bus.subscribe()
    }

    pub(crate) fn set_default(&self, id: &str) -> Result<(), SchedulerError> {
        let mut state = self.state.lock();
        if !state.schedulers.contains_key(id) {
            return Err(SchedulerError::InvalidConfig(format!(
                "default scheduler `{id}` is not registered"
            )));
        }
        state.default_id = Some(id.to_string());
        Ok(())
    }
}

impl<P, R> Default for SchedulerRegistry<P, R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_created_becomes_default() {
        let registry = SchedulerRegistry::<u32, u32>::new();
        assert!(registry.get_processor(None).is_none());
        registry
            .create_processor("images", SchedulerOptions::default())
            .unwrap();
        registry
            .create_processor("audio", SchedulerOptions::default())
            .unwrap();
        assert_eq!(registry.default_id().as_deref(), Some("images"));
        assert_eq!(registry.get_processor(None).unwrap().id(), "images");
        assert_eq!(registry.ids(), vec!["audio", "images"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let registry = SchedulerRegistry::<u32, u32>::new();
        registry.create_processor("a", SchedulerOptions::default()).unwrap();
        let err = registry
            .create_processor("a", SchedulerOptions::default())
            .unwrap_err();
        assert_eq!(err, SchedulerError::DuplicateScheduler("a".into()));
    }

    #[test]
    fn test_lazy_default() {
        let registry = SchedulerRegistry::<u32, u32>::new();
        let first = registry.get_default_processor().unwrap();
        let second = registry.get_default_processor().unwrap();
        assert_eq!(first.id(), DEFAULT_SCHEDULER_ID);
        assert_eq!(second.id(), DEFAULT_SCHEDULER_ID);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registered_handle_outlives_caller() {
        let registry = SchedulerRegistry::<u32, u32>::new();
        let created = registry
            .create_processor("jobs", SchedulerOptions::default())
            .unwrap();
        drop(created);

        let fetched = registry.get_processor(Some("jobs")).unwrap();
        let processor = crate::core::Processor::callable(|n: u32, _, _| async move { Ok(n) });
        fetched.add_task(crate::core::TaskSubmission::new(processor, 1));
        assert_eq!(registry.get_default_processor().unwrap().get_stats().total_tasks, 1);
    }

    #[test]
    fn test_remove_clears_default() {
        let registry = SchedulerRegistry::<u32, u32>::new();
        registry.create_processor("a", SchedulerOptions::default()).unwrap();
        assert!(registry.remove_processor("a"));
        assert!(!registry.remove_processor("a"));
        assert!(registry.default_id().is_none());
        assert!(registry.is_empty());
    }
}
