use crate::caching::orchestrator::Orchestrator;
use crate::config::Config;
use crate::error::AppError;
use crate::jobs::registry::JobRegistry;
use crate::jobs::scheduler::{Scheduler, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Run the scheduler daemon flow.
///
/// - Starts a timer per enabled job and the registry supervisor
/// - Runs until Ctrl+C
/// - Stops all timers, then waits up to the run timeout so that runs in
///   flight still record their caching result
pub async fn run_daemon(
    config: &Config,
    registry: Arc<dyn JobRegistry>,
    orchestrator: Arc<Orchestrator>,
) -> Result<(), AppError> {
    let scheduler = Scheduler::new(
        registry,
        orchestrator,
        Arc::new(SystemClock),
        Duration::from_secs(config.registry_poll_seconds),
    );
    scheduler.start().await?;
    info!(
        "Daemon running with {} scheduled job(s), press Ctrl+C to stop",
        scheduler.scheduled_jobs().len()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    scheduler.shutdown();

    drain(&scheduler, Duration::from_secs(config.run_timeout_seconds)).await;
    Ok(())
}

/// Waits until no job is running or `limit` has passed.
async fn drain(scheduler: &Scheduler, limit: Duration) {
    let deadline = Instant::now() + limit;
    loop {
        let running = scheduler.running_jobs();
        if running.is_empty() {
            return;
        }
        if Instant::now() >= deadline {
            warn!(
                "Exiting with runs still in progress: {}",
                running.join(", ")
            );
            return;
        }
        info!("Waiting for running jobs: {}", running.join(", "));
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}
