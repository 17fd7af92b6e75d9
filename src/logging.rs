use crate::cli::{Args, logs_to_stdout};
use crate::config::Config;
use crate::constants::LOG_FILE_NAME;
use crate::error::AppError;
use std::io::stdout;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_DIRECTIVE: &str = "hvw_cache=info";

fn env_filter() -> Result<EnvFilter, AppError> {
    let directive = DEFAULT_DIRECTIVE
        .parse()
        .map_err(|e| AppError::log_setup_error(format!("Invalid log directive: {e}")))?;
    Ok(EnvFilter::from_default_env().add_directive(directive))
}

/// Splits the configured log path into directory and file name.
///
/// `--log-file` wins over the config file; without either the platform
/// log directory is used.
pub fn resolve_log_location(args: &Args, config: &Config) -> (String, String) {
    let custom_log_path = args.log_file.as_ref().or(config.log_file_path.as_ref());
    match custom_log_path {
        Some(custom_path) => {
            let path = Path::new(custom_path);
            let parent = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(LOG_FILE_NAME);
            (parent.to_string_lossy().to_string(), file_name.to_string())
        }
        None => (Config::get_log_dir_path(), LOG_FILE_NAME.to_string()),
    }
}

/// Sets up logging configuration for the application.
///
/// - Always logs to a daily rolling file through a non-blocking writer
/// - Also logs to stdout for the daemon and `--once` unless `--quiet` is set
/// - Creates the log directory if it doesn't exist
///
/// Returns the path to the log file and the guard that must be kept alive
/// for the duration of the program to ensure proper log flushing.
pub async fn setup_logging(args: &Args, config: &Config) -> Result<(String, WorkerGuard), AppError> {
    let (log_dir, log_file_name) = resolve_log_location(args, config);

    if !Path::new(&log_dir).exists() {
        tokio::fs::create_dir_all(&log_dir).await.map_err(|e| {
            AppError::log_setup_error(format!("Failed to create log directory: {e}"))
        })?;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, &log_file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::Layer::new()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(env_filter()?);

    let stdout_layer = if logs_to_stdout(args) {
        Some(
            fmt::Layer::new()
                .with_writer(stdout)
                .with_ansi(true)
                .with_filter(env_filter()?),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| AppError::log_setup_error(format!("Failed to install subscriber: {e}")))?;

    let log_file_path = format!("{log_dir}/{log_file_name}");
    Ok((log_file_path, guard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_log_location_prefers_cli_over_config() {
        let args = Args::parse_from(["hvw_cache", "--log-file", "/tmp/cli/run.log"]);
        let config = Config {
            log_file_path: Some("/var/log/hvw/config.log".to_string()),
            ..Config::default()
        };
        assert_eq!(
            resolve_log_location(&args, &config),
            ("/tmp/cli".to_string(), "run.log".to_string())
        );

        let args = Args::parse_from(["hvw_cache"]);
        assert_eq!(
            resolve_log_location(&args, &config),
            ("/var/log/hvw".to_string(), "config.log".to_string())
        );
    }

    #[test]
    fn test_log_location_defaults() {
        let args = Args::parse_from(["hvw_cache"]);
        let (dir, file) = resolve_log_location(&args, &Config::default());
        assert_eq!(dir, Config::get_log_dir_path());
        assert_eq!(file, LOG_FILE_NAME);
    }

    #[test]
    fn test_bare_file_name_uses_current_dir() {
        let args = Args::parse_from(["hvw_cache", "--log-file", "hvw.log"]);
        assert_eq!(
            resolve_log_location(&args, &Config::default()),
            (".".to_string(), "hvw.log".to_string())
        );
    }
}
