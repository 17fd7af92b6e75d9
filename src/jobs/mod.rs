//! Job definitions, their cron schedules and the scheduler that runs them.

pub mod cron;
pub mod models;
pub mod registry;
pub mod scheduler;

pub use cron::{CronError, CronSchedule};
pub use models::{CachingType, Job};
pub use registry::{InMemoryJobRegistry, JobRegistry, JobsFile, validate_job};
pub use scheduler::{Clock, JobRunner, Scheduler, SystemClock, TriggerOutcome};
