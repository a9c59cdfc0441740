//! Runtime adapters and API surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{health, start_run, Health, ProgressEvent, StartRunRequest, StartRunResponse};
pub use tokio_spawner::TokioSpawner;
