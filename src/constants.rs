//! Application-wide constants and configuration values
//!
//! This module centralizes the magic numbers used by the caching pipeline so
//! that defaults live in one place.

/// Default base URL of the handball4all JSON service
pub const DEFAULT_API_DOMAIN: &str = "https://spo.handball4all.de";

/// Default organization (association) identifier used for class discovery
pub const DEFAULT_ORGANIZATION_ID: &str = "3";

/// Default timeout for HTTP requests in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;

/// Maximum number of idle connections per host in the HTTP client pool
pub const HTTP_POOL_MAX_IDLE_PER_HOST: usize = 16;

/// Default wall-clock budget for a single caching run in seconds
pub const DEFAULT_RUN_TIMEOUT_SECONDS: u64 = 600;

/// Default number of units processed concurrently within one run
pub const DEFAULT_MAX_CONCURRENT_UNITS: usize = 4;

/// Default interval in seconds between job registry re-scans
pub const DEFAULT_REGISTRY_POLL_SECONDS: u64 = 60;

/// File name used for the rolling log file
pub const LOG_FILE_NAME: &str = "hvw_cache.log";

/// Retry configuration for the external source client
pub mod retry {
    /// Maximum number of attempts (first request included) for transient failures
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 250;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECONDS: u64 = 30;

    /// Upper bound of the random jitter added to each backoff (milliseconds)
    pub const MAX_JITTER_MS: u64 = 100;
}

/// Environment variable names
pub mod env_vars {
    /// Environment variable for API domain override
    pub const API_DOMAIN: &str = "HVW_API_DOMAIN";

    /// Environment variable for log file path override
    pub const LOG_FILE: &str = "HVW_LOG_FILE";

    /// Environment variable for HTTP timeout override in seconds
    pub const HTTP_TIMEOUT: &str = "HVW_HTTP_TIMEOUT";

    /// Environment variable for data directory override
    pub const DATA_DIR: &str = "HVW_DATA_DIR";
}

/// Result log limits
pub mod results {
    /// Number of results returned by listing operations when no limit is given
    pub const DEFAULT_LIST_LIMIT: usize = 20;

    /// Maximum number of error summaries stored on one caching result
    pub const MAX_ERROR_SUMMARIES: usize = 50;
}

/// File names inside the data directory
pub mod files {
    /// JSON snapshot of the cache store
    pub const SNAPSHOT_FILE: &str = "cache_snapshot.json";

    /// JSON Lines file holding caching results
    pub const RESULTS_FILE: &str = "caching_results.jsonl";

    /// TOML file with job definitions
    pub const JOBS_FILE: &str = "jobs.toml";
}
