//! HVW League Data Cache Library
//!
//! This library keeps a normalized, query-ready copy of handball league
//! standings and schedules. Scheduled jobs pull data from the handball4all
//! JSON service, normalize it and upsert it into a cache store, recording an
//! auditable result for every run. Readers are served from the cache only.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hvw_cache::caching::orchestrator::{Orchestrator, OrchestratorSettings};
//! use hvw_cache::caching::result_log::InMemoryResultLog;
//! use hvw_cache::data_fetcher::api::HvwSourceClient;
//! use hvw_cache::data_fetcher::cache::InMemoryCacheStore;
//! use hvw_cache::jobs::models::{CachingType, Job};
//! use hvw_cache::read_api::LeagueReader;
//! use hvw_cache::{AppError, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AppError> {
//!     let config = Config::default();
//!     let store = Arc::new(InMemoryCacheStore::new());
//!     let results = Arc::new(InMemoryResultLog::new());
//!
//!     let orchestrator = Orchestrator::new(
//!         Arc::new(HvwSourceClient::from_config(&config)?),
//!         store.clone(),
//!         results.clone(),
//!         OrchestratorSettings::from_config(&config),
//!     );
//!
//!     // Discover classes and the current week, then cache everything
//!     let job = Job::new("full", "Full refresh", CachingType::Full, "0 4 * * *");
//!     let result = orchestrator.run(&job).await;
//!     println!("{}: {} units failed", result.status, result.units_failed);
//!
//!     let reader = LeagueReader::new(store, results);
//!     for class in reader.list_classes().await? {
//!         if let Some(table) = reader.get_table(&class.id).await? {
//!             println!("{}: {} teams", class.long_name, table.scores.len());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod caching;
pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod data_fetcher;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod read_api;
pub mod testing_utils;

// Re-export commonly used types for convenience
pub use caching::{CachingResult, Orchestrator, RunStatus};
pub use config::Config;
pub use data_fetcher::cache::{CacheStore, InMemoryCacheStore};
pub use data_fetcher::models::{Class, Game, Table, Week};
pub use error::AppError;
pub use jobs::{CachingType, Job, Scheduler};
pub use read_api::LeagueReader;

/// Current version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
