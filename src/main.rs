// src/main.rs
use clap::Parser;
use hvw_cache::caching::orchestrator::{Orchestrator, OrchestratorSettings};
use hvw_cache::caching::models::RunStatus;
use hvw_cache::caching::result_log::InMemoryResultLog;
use hvw_cache::cli::{Args, is_config_update};
use hvw_cache::data_fetcher::api::HvwSourceClient;
use hvw_cache::data_fetcher::cache::InMemoryCacheStore;
use hvw_cache::jobs::registry::InMemoryJobRegistry;
use hvw_cache::read_api::LeagueReader;
use hvw_cache::{app, commands, logging};
use hvw_cache::{AppError, Config};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<ExitCode, AppError> {
    let args = Args::parse();
    commands::validate_args(&args)?;

    // Config updates run before logging so a broken log path can be fixed
    if is_config_update(&args) {
        commands::handle_config_update_command(&args).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::load().await?;

    if args.list_config {
        commands::handle_list_config_command(&config);
        return Ok(ExitCode::SUCCESS);
    }

    // The guard must be kept alive for the duration of the program
    // to ensure logs are flushed properly
    let (log_file_path, _guard) = logging::setup_logging(&args, &config).await?;
    info!(
        "{} {} starting, logging to {}",
        hvw_cache::NAME,
        hvw_cache::VERSION,
        log_file_path
    );

    let jobs_path = args
        .jobs_file
        .as_ref()
        .map_or_else(|| config.jobs_path(), PathBuf::from);
    let registry = Arc::new(InMemoryJobRegistry::open(&jobs_path).await?);

    if args.list_jobs {
        commands::handle_list_jobs_command(registry.as_ref()).await?;
        return Ok(ExitCode::SUCCESS);
    }
    if args.enable.is_some() || args.disable.is_some() {
        if let Some(job_id) = &args.enable {
            commands::handle_toggle_job_command(registry.as_ref(), job_id, false).await?;
        }
        if let Some(job_id) = &args.disable {
            commands::handle_toggle_job_command(registry.as_ref(), job_id, true).await?;
        }
        return Ok(ExitCode::SUCCESS);
    }

    let store = Arc::new(InMemoryCacheStore::open(config.snapshot_path()).await?);
    let results = Arc::new(InMemoryResultLog::open(config.results_path()).await?);
    let reader = LeagueReader::new(store.clone(), results.clone());

    if let Some(job_id) = &args.list_results {
        commands::handle_list_results_command(&reader, job_id, args.limit).await?;
        return Ok(ExitCode::SUCCESS);
    }
    if let Some(class_id) = &args.show_table {
        commands::handle_show_table_command(&reader, class_id).await?;
        return Ok(ExitCode::SUCCESS);
    }
    if let Some(class_id) = &args.show_games {
        commands::handle_show_games_command(&reader, class_id).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let source = Arc::new(HvwSourceClient::from_config(&config)?);
    let orchestrator = Arc::new(Orchestrator::new(
        source,
        store.clone(),
        results,
        OrchestratorSettings::from_config(&config),
    ));

    if let Some(job_id) = &args.once {
        let status =
            commands::handle_once_command(orchestrator.as_ref(), registry.as_ref(), job_id)
                .await?;
        flush_store(&store).await;
        return Ok(match status {
            RunStatus::Success => ExitCode::SUCCESS,
            RunStatus::Partial => ExitCode::from(2),
            RunStatus::Failure => ExitCode::FAILURE,
        });
    }

    app::run_daemon(&config, registry, orchestrator).await?;
    flush_store(&store).await;
    Ok(ExitCode::SUCCESS)
}

/// Retries a snapshot save that failed during the last run.
async fn flush_store(store: &InMemoryCacheStore) {
    if let Err(e) = store.flush().await {
        error!("Cache snapshot is out of date: {}", e);
    }
}
