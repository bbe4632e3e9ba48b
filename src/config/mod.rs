//! Configuration models for schedulers and registries.

pub mod scheduler;

pub use scheduler::{
    RegistryConfig, SchedulerOptions, ENV_MAX_CONCURRENCY, ENV_RETRY_COUNT, ENV_RETRY_DELAY_MS,
};
