use super::Config;
use crate::error::AppError;
use std::path::Path;

/// Validates the configuration settings
///
/// # Validation Rules
/// - API domain cannot be empty and must look like a URL or domain name
/// - Organization id cannot be empty
/// - Timeouts and the unit pool size must be positive
/// - If a log file path is provided, it cannot be empty and its parent directory
///   must exist or be creatable
pub fn validate_config(config: &Config) -> Result<(), AppError> {
    let api_domain = config.api_domain.as_str();
    if api_domain.is_empty() {
        return Err(AppError::config_error("API domain cannot be empty"));
    }

    if !api_domain.starts_with("http://")
        && !api_domain.starts_with("https://")
        && !api_domain.contains('.')
        && !api_domain.starts_with("localhost")
    {
        return Err(AppError::config_error(
            "API domain must be a valid URL or domain name",
        ));
    }

    if config.organization_id.trim().is_empty() {
        return Err(AppError::config_error("Organization id cannot be empty"));
    }

    if config.http_timeout_seconds == 0 {
        return Err(AppError::config_error("HTTP timeout must be at least 1 second"));
    }

    if config.run_timeout_seconds == 0 {
        return Err(AppError::config_error("Run timeout must be at least 1 second"));
    }

    if config.max_concurrent_units == 0 {
        return Err(AppError::config_error(
            "max_concurrent_units must be at least 1",
        ));
    }

    if config.registry_poll_seconds == 0 {
        return Err(AppError::config_error(
            "Registry poll interval must be at least 1 second",
        ));
    }

    if let Some(log_path) = &config.log_file_path {
        if log_path.is_empty() {
            return Err(AppError::config_error("Log file path cannot be empty"));
        }

        if let Some(parent) = Path::new(log_path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::config_error(format!(
                    "Cannot create log directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    Ok(())
}
