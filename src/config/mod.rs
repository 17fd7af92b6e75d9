use crate::constants::{self, env_vars, files};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub mod paths;
pub mod validation;

use paths::{get_config_path, get_data_dir_path, get_log_dir_path};
use validation::validate_config;

/// Configuration structure for the caching daemon.
/// Handles loading, saving, and managing application settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the league data service. Should include https:// prefix.
    #[serde(default = "default_api_domain")]
    pub api_domain: String,
    /// Association whose classes are discovered by FULL jobs.
    #[serde(default = "default_organization_id")]
    pub organization_id: String,
    /// Path to the log file. If not specified, logs will be written to a default location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file_path: Option<String>,
    /// HTTP timeout in seconds for source requests.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
    /// Wall-clock budget of one caching run in seconds.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_seconds: u64,
    /// Units fetched concurrently within one run.
    #[serde(default = "default_max_concurrent_units")]
    pub max_concurrent_units: usize,
    /// How often the scheduler re-reads the job registry.
    #[serde(default = "default_registry_poll")]
    pub registry_poll_seconds: u64,
    /// Directory for the cache snapshot, result log and jobs file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// FULL jobs also refresh every stored past week, not just the current one.
    #[serde(default)]
    pub full_includes_history_weeks: bool,
}

fn default_api_domain() -> String {
    constants::DEFAULT_API_DOMAIN.to_string()
}

fn default_organization_id() -> String {
    constants::DEFAULT_ORGANIZATION_ID.to_string()
}

fn default_http_timeout() -> u64 {
    constants::DEFAULT_HTTP_TIMEOUT_SECONDS
}

fn default_run_timeout() -> u64 {
    constants::DEFAULT_RUN_TIMEOUT_SECONDS
}

fn default_max_concurrent_units() -> usize {
    constants::DEFAULT_MAX_CONCURRENT_UNITS
}

fn default_registry_poll() -> u64 {
    constants::DEFAULT_REGISTRY_POLL_SECONDS
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_domain: default_api_domain(),
            organization_id: default_organization_id(),
            log_file_path: None,
            http_timeout_seconds: default_http_timeout(),
            run_timeout_seconds: default_run_timeout(),
            max_concurrent_units: default_max_concurrent_units(),
            registry_poll_seconds: default_registry_poll(),
            data_dir: None,
            full_includes_history_weeks: false,
        }
    }
}

impl Config {
    /// Loads configuration from the default config file location.
    /// Falls back to defaults when no file exists; environment variables
    /// override file values.
    ///
    /// # Environment Variables
    /// - `HVW_API_DOMAIN` - Override API domain
    /// - `HVW_LOG_FILE` - Override log file path
    /// - `HVW_HTTP_TIMEOUT` - Override HTTP timeout in seconds
    /// - `HVW_DATA_DIR` - Override data directory
    pub async fn load() -> Result<Self, AppError> {
        let config_path = get_config_path();

        let mut config = if Path::new(&config_path).exists() {
            Self::load_from_path(&config_path).await?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a custom file path without applying overrides.
    pub async fn load_from_path(path: &str) -> Result<Self, AppError> {
        let content = fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Applies `HVW_*` environment variables on top of the loaded values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(api_domain) = std::env::var(env_vars::API_DOMAIN) {
            self.api_domain = api_domain;
        }

        if let Ok(log_file_path) = std::env::var(env_vars::LOG_FILE) {
            self.log_file_path = Some(log_file_path);
        }

        if let Some(timeout) = std::env::var(env_vars::HTTP_TIMEOUT)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            self.http_timeout_seconds = timeout;
        }

        if let Ok(data_dir) = std::env::var(env_vars::DATA_DIR) {
            self.data_dir = Some(data_dir);
        }
    }

    /// Validates the configuration settings
    pub fn validate(&self) -> Result<(), AppError> {
        validate_config(self)
    }

    /// Saves current configuration to the default config file location.
    pub async fn save(&self) -> Result<(), AppError> {
        let config_path = get_config_path();
        self.save_to_path(&config_path).await
    }

    /// Saves configuration to a custom file path.
    ///
    /// Creates the parent directory if it doesn't exist and ensures the API
    /// domain has a scheme (https:// unless http:// was given explicitly for a
    /// local service).
    pub async fn save_to_path(&self, path: &str) -> Result<(), AppError> {
        let config_dir = Path::new(path).parent().ok_or_else(|| {
            AppError::config_error(format!("Path '{path}' has no parent directory"))
        })?;

        if !config_dir.exists() {
            fs::create_dir_all(config_dir).await?;
        }

        let api_domain = if self.api_domain.starts_with("https://")
            || self.api_domain.starts_with("http://localhost")
        {
            self.api_domain.clone()
        } else {
            format!("https://{}", self.api_domain.trim_start_matches("http://"))
        };

        let content = toml::to_string_pretty(&Config {
            api_domain,
            ..self.clone()
        })?;
        let mut file = fs::File::create(path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Directory holding the snapshot, results and jobs files.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(get_data_dir_path()))
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir().join(files::SNAPSHOT_FILE)
    }

    pub fn results_path(&self) -> PathBuf {
        self.data_dir().join(files::RESULTS_FILE)
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.data_dir().join(files::JOBS_FILE)
    }

    /// Returns the platform-specific path for the config file.
    pub fn get_config_path() -> String {
        paths::get_config_path()
    }

    /// Returns the platform-specific path for the log directory.
    pub fn get_log_dir_path() -> String {
        paths::get_log_dir_path()
    }

    /// Displays current configuration settings to stdout.
    pub fn display(&self) {
        let config_path = get_config_path();
        let log_dir = get_log_dir_path();

        println!("\nCurrent Configuration");
        println!("────────────────────────────────────");
        println!("Config Location:");
        if Path::new(&config_path).exists() {
            println!("{config_path}");
        } else {
            println!("{config_path} (not found, using defaults)");
        }
        println!("────────────────────────────────────");
        println!("API Domain:");
        println!("{}", self.api_domain);
        println!("Organization:");
        println!("{}", self.organization_id);
        println!("────────────────────────────────────");
        println!("HTTP Timeout: {} seconds", self.http_timeout_seconds);
        println!("Run Timeout: {} seconds", self.run_timeout_seconds);
        println!("Concurrent Units: {}", self.max_concurrent_units);
        println!("Registry Poll: {} seconds", self.registry_poll_seconds);
        println!(
            "FULL Jobs Cover Past Weeks: {}",
            if self.full_includes_history_weeks { "yes" } else { "no" }
        );
        println!("────────────────────────────────────");
        println!("Data Directory:");
        println!("{}", self.data_dir().display());
        println!("────────────────────────────────────");
        println!("Log File Location:");
        if let Some(custom_path) = &self.log_file_path {
            println!("{custom_path}");
        } else {
            println!("{log_dir}/{}", constants::LOG_FILE_NAME);
            println!("(Default location)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_config_load_existing_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let config_path_str = config_path.to_string_lossy();

        let config_content = r#"
api_domain = "https://api.example.com"
organization_id = "7"
log_file_path = "/custom/log/path"
max_concurrent_units = 2
"#;
        tokio::fs::write(&config_path, config_content).await.unwrap();

        let config = Config::load_from_path(&config_path_str).await.unwrap();

        assert_eq!(config.api_domain, "https://api.example.com");
        assert_eq!(config.organization_id, "7");
        assert_eq!(config.log_file_path, Some("/custom/log/path".to_string()));
        assert_eq!(config.max_concurrent_units, 2);
        assert_eq!(
            config.run_timeout_seconds,
            constants::DEFAULT_RUN_TIMEOUT_SECONDS
        );
    }

    #[tokio::test]
    async fn test_config_load_empty_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        tokio::fs::write(&config_path, "").await.unwrap();

        let config = Config::load_from_path(&config_path.to_string_lossy())
            .await
            .unwrap();
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    async fn test_config_save_without_https_prefix() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");
        let config_path_str = config_path.to_string_lossy();
        let config = Config {
            api_domain: "api.example.com".to_string(),
            ..Config::default()
        };
        config.save_to_path(&config_path_str).await.unwrap();

        let loaded = Config::load_from_path(&config_path_str).await.unwrap();
        assert_eq!(loaded.api_domain, "https://api.example.com");
    }

    #[tokio::test]
    async fn test_config_save_keeps_local_http() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let config_path_str = config_path.to_string_lossy();
        let config = Config {
            api_domain: "http://localhost:8080".to_string(),
            data_dir: Some("/var/lib/hvw".to_string()),
            ..Config::default()
        };
        config.save_to_path(&config_path_str).await.unwrap();

        let loaded = Config::load_from_path(&config_path_str).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_data_paths_follow_data_dir() {
        let config = Config {
            data_dir: Some("/srv/hvw".to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("/srv/hvw/cache_snapshot.json")
        );
        assert_eq!(
            config.results_path(),
            PathBuf::from("/srv/hvw/caching_results.jsonl")
        );
        assert_eq!(config.jobs_path(), PathBuf::from("/srv/hvw/jobs.toml"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        unsafe {
            std::env::set_var(env_vars::API_DOMAIN, "https://override.example.com");
            std::env::set_var(env_vars::HTTP_TIMEOUT, "5");
            std::env::set_var(env_vars::DATA_DIR, "/tmp/hvw-data");
        }

        let mut config = Config::default();
        config.apply_env_overrides();

        unsafe {
            std::env::remove_var(env_vars::API_DOMAIN);
            std::env::remove_var(env_vars::HTTP_TIMEOUT);
            std::env::remove_var(env_vars::DATA_DIR);
        }

        assert_eq!(config.api_domain, "https://override.example.com");
        assert_eq!(config.http_timeout_seconds, 5);
        assert_eq!(config.data_dir, Some("/tmp/hvw-data".to_string()));
    }

    #[test]
    #[serial]
    fn test_invalid_timeout_env_is_ignored() {
        unsafe {
            std::env::set_var(env_vars::HTTP_TIMEOUT, "soon");
        }

        let mut config = Config::default();
        config.apply_env_overrides();

        unsafe {
            std::env::remove_var(env_vars::HTTP_TIMEOUT);
        }

        assert_eq!(
            config.http_timeout_seconds,
            constants::DEFAULT_HTTP_TIMEOUT_SECONDS
        );
    }
}
