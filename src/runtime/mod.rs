//! Runtime adapters for executing processor attempts.

pub mod tokio_spawner;

pub use tokio_spawner::TokioSpawner;
