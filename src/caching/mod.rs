//! Caching runs: turning one job trigger into fetch, normalize and store
//! steps, and recording the outcome.

pub mod models;
pub mod orchestrator;
pub mod result_log;

pub use models::{CachingResult, CachingUnit, RunStatus};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use result_log::{InMemoryResultLog, ResultLog};
