//! Build a scheduler registry from configuration.

use crate::config::RegistryConfig;
use crate::core::{EventBus, SchedulerError, SchedulerRegistry};

/// Validate `cfg`, then create every configured scheduler on a shared event bus.
///
/// The default scheduler is `cfg.default_scheduler` when set, otherwise the first
/// configured id in sorted order. With no configured schedulers, the default is
/// created lazily on first use with `cfg.default_options`.
pub fn build_registry<P, R>(cfg: &RegistryConfig) -> Result<SchedulerRegistry<P, R>, SchedulerError> {
    cfg.validate().map_err(SchedulerError::InvalidConfig)?;

    let registry =
        SchedulerRegistry::with_options(cfg.default_options.clone(), EventBus::new(cfg.event_capacity));
    for (name, options) in &cfg.schedulers {
        registry.create_processor(name.clone(), options.clone())?;
    }
    if let Some(default) = &cfg.default_scheduler {
        registry.set_default(default)?;
    }
    tracing::info!(
        "built registry with {} schedulers (default: {:?})",
        registry.len(),
        registry.default_id()
    );
    Ok(registry)
}
