use clap::Parser;
use clap::builder::styling::{AnsiColor, Effects, Styles};

fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
        .usage(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Yellow.on_default())
        .error(AnsiColor::Red.on_default().effects(Effects::BOLD))
        .valid(AnsiColor::Green.on_default())
        .invalid(AnsiColor::Red.on_default())
}

/// Determines if the application should run a single command and exit
/// instead of starting the scheduler daemon. This is the case when any of
/// these are requested:
/// - a single job run (--once)
/// - config inspection or updates
/// - listings of cached data, jobs or results
/// - enabling or disabling a job
pub fn is_one_shot_mode(args: &Args) -> bool {
    args.once.is_some()
        || is_config_update(args)
        || args.list_config
        || args.list_jobs
        || args.list_results.is_some()
        || args.show_table.is_some()
        || args.show_games.is_some()
        || args.enable.is_some()
        || args.disable.is_some()
}

/// Whether any of the config update flags is present
pub fn is_config_update(args: &Args) -> bool {
    args.new_api_domain.is_some() || args.new_log_file_path.is_some() || args.clear_log_file_path
}

/// Whether log output should also go to stdout.
///
/// The daemon and `--once` log to stdout unless `--quiet` is given. Listing
/// commands print their own output, so they only log to the file.
pub fn logs_to_stdout(args: &Args) -> bool {
    if args.quiet {
        return false;
    }
    !is_one_shot_mode(args) || args.once.is_some()
}

/// HVW league data cache
///
/// Periodically pulls standings and schedules of the handball association
/// from the handball4all JSON service and keeps a normalized copy for
/// readers.
///
/// Without arguments the scheduler daemon starts and runs every enabled job
/// from the jobs file on its cron schedule until interrupted with Ctrl+C.
#[derive(Parser, Debug, Default)]
#[command(about, version, long_about = None)]
#[command(styles = get_styles())]
pub struct Args {
    /// Run a single job once and exit. The result is recorded like a
    /// scheduled run.
    #[arg(short, long, value_name = "JOB_ID")]
    pub once: Option<String>,

    /// Path of the jobs file. Defaults to jobs.toml in the data directory.
    #[arg(long = "jobs-file", value_name = "PATH")]
    pub jobs_file: Option<String>,

    /// List configured jobs
    #[arg(long = "list-jobs", help_heading = "Jobs")]
    pub list_jobs: bool,

    /// Enable a job
    #[arg(long = "enable", value_name = "JOB_ID", help_heading = "Jobs")]
    pub enable: Option<String>,

    /// Disable a job. A run in progress completes.
    #[arg(long = "disable", value_name = "JOB_ID", help_heading = "Jobs")]
    pub disable: Option<String>,

    /// Show the most recent caching results of a job
    #[arg(long = "list-results", value_name = "JOB_ID", help_heading = "Cached Data")]
    pub list_results: Option<String>,

    /// Number of results shown by --list-results
    #[arg(
        long = "limit",
        default_value_t = crate::constants::results::DEFAULT_LIST_LIMIT,
        help_heading = "Cached Data"
    )]
    pub limit: usize,

    /// Show the cached standings of a class
    #[arg(long = "show-table", value_name = "CLASS_ID", help_heading = "Cached Data")]
    pub show_table: Option<String>,

    /// Show the cached games of a class for the current week
    #[arg(long = "show-games", value_name = "CLASS_ID", help_heading = "Cached Data")]
    pub show_games: Option<String>,

    /// Update API domain in config
    #[arg(
        long = "config-domain",
        help_heading = "Configuration",
        value_name = "API_DOMAIN"
    )]
    pub new_api_domain: Option<String>,

    /// Update log file path in config. This sets a persistent custom log file location.
    #[arg(long = "set-log-file", help_heading = "Configuration")]
    pub new_log_file_path: Option<String>,

    /// Clear the custom log file path from config. This reverts to using the default log location.
    #[arg(long = "clear-log-file", help_heading = "Configuration")]
    pub clear_log_file_path: bool,

    /// List current configuration settings
    #[arg(long = "list-config", short = 'l', help_heading = "Configuration")]
    pub list_config: bool,

    /// Specify a custom log file path. If not provided, logs will be written to the default location.
    #[arg(long = "log-file", help_heading = "Logging")]
    pub log_file: Option<String>,

    /// Do not echo log output to stdout
    #[arg(short, long, help_heading = "Logging")]
    pub quiet: bool,
}
