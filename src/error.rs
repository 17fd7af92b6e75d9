use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Log setup error: {0}")]
    LogSetup(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cron(#[from] crate::jobs::cron::CronError),
}

impl AppError {
    /// Create a configuration error with context
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a log setup error with context
    pub fn log_setup_error(msg: impl Into<String>) -> Self {
        Self::LogSetup(msg.into())
    }

    /// Create a job not found error
    pub fn job_not_found(job_id: impl Into<String>) -> Self {
        Self::JobNotFound(job_id.into())
    }
}

/// Whether a fetch failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Transient,
    Permanent,
}

/// Failures of the external source client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    // Transient
    #[error("Network timeout while fetching data from: {url}")]
    Timeout { url: String },

    #[error("Connection failed to: {url} - {message}")]
    Connection { url: String, message: String },

    #[error("Source server error ({status}) (URL: {url})")]
    ServerError { status: u16, url: String },

    #[error("Source rate limit exceeded (429) (URL: {url})")]
    RateLimited { url: String },

    // Permanent
    #[error("Source resource not found (404): {url}")]
    NotFound { url: String },

    #[error("Source client error ({status}) (URL: {url})")]
    ClientError { status: u16, url: String },

    #[error("Invalid request URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Source returned an empty body (URL: {url})")]
    EmptyBody { url: String },

    #[error("Failed to read response from {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    /// Create a network timeout error
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Create a connection error
    pub fn connection(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(url: impl Into<String>) -> Self {
        Self::NotFound { url: url.into() }
    }

    /// Maps a non-success HTTP status to the matching error
    pub fn from_status(status: u16, url: impl Into<String>) -> Self {
        let url = url.into();
        match status {
            404 => Self::NotFound { url },
            429 => Self::RateLimited { url },
            500..=599 => Self::ServerError { status, url },
            _ => Self::ClientError { status, url },
        }
    }

    /// Classifies the error as transient or permanent
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Timeout { .. }
            | FetchError::Connection { .. }
            | FetchError::ServerError { .. }
            | FetchError::RateLimited { .. }
            | FetchError::Body { .. } => FetchErrorKind::Transient,
            FetchError::NotFound { .. }
            | FetchError::ClientError { .. }
            | FetchError::InvalidUrl { .. }
            | FetchError::EmptyBody { .. } => FetchErrorKind::Permanent,
        }
    }

    /// Check if error is retryable (network issues, server errors, rate limits)
    pub fn is_transient(&self) -> bool {
        self.kind() == FetchErrorKind::Transient
    }
}

/// Failures of the normalizer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Payload from {url} is not valid JSON: {message}")]
    MalformedJson { url: String, message: String },

    #[error("Payload from {url} is missing required field '{field}'")]
    MissingField { url: String, field: String },

    #[error("Payload from {url} has an unexpected structure: {message}")]
    UnexpectedShape { url: String, message: String },

    #[error("Payload from {url} contained {skipped} row(s) of {kind} and none were valid")]
    NoValidRows {
        url: String,
        kind: String,
        skipped: usize,
    },
}

impl ParseError {
    pub fn malformed_json(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedJson {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn missing_field(url: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            url: url.into(),
            field: field.into(),
        }
    }

    pub fn unexpected_shape(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnexpectedShape {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Failures of the cache store and the result log.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Unknown class: {0}")]
    UnknownClass(String),

    #[error("Unknown week: {0}")]
    UnknownWeek(NaiveDate),

    #[error("Failed to persist {path}: {message}")]
    Persist { path: String, message: String },

    #[error("Failed to load {path}: {message}")]
    Load { path: String, message: String },
}

impl StoreError {
    pub fn persist(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persist {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Failure of one caching unit. Recorded on the run, never propagated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UnitError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Run timed out before the unit finished")]
    RunTimeout,
}

/// A single invalid field found while validating operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All field errors found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// Returns `Ok(value)` when no errors were collected
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed: ")?;
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_helper() {
        let error = AppError::config_error("Invalid configuration");
        assert!(matches!(error, AppError::Config(_)));
        assert_eq!(
            error.to_string(),
            "Configuration error: Invalid configuration"
        );
    }

    #[test]
    fn test_log_setup_error_helper() {
        let error = AppError::log_setup_error("Failed to initialize logger");
        assert_eq!(
            error.to_string(),
            "Log setup error: Failed to initialize logger"
        );
    }

    #[test]
    fn test_fetch_error_from_status() {
        assert!(matches!(
            FetchError::from_status(404, "u"),
            FetchError::NotFound { .. }
        ));
        assert!(matches!(
            FetchError::from_status(429, "u"),
            FetchError::RateLimited { .. }
        ));
        assert!(matches!(
            FetchError::from_status(503, "u"),
            FetchError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            FetchError::from_status(400, "u"),
            FetchError::ClientError { status: 400, .. }
        ));
    }

    #[test]
    fn test_fetch_error_kind() {
        assert!(FetchError::timeout("u").is_transient());
        assert!(FetchError::connection("u", "refused").is_transient());
        assert!(FetchError::from_status(500, "u").is_transient());
        assert!(FetchError::from_status(429, "u").is_transient());
        assert!(
            FetchError::Body {
                url: "u".into(),
                message: "connection reset".into()
            }
            .is_transient()
        );

        assert_eq!(FetchError::not_found("u").kind(), FetchErrorKind::Permanent);
        assert_eq!(
            FetchError::from_status(403, "u").kind(),
            FetchErrorKind::Permanent
        );
        assert_eq!(
            FetchError::EmptyBody { url: "u".into() }.kind(),
            FetchErrorKind::Permanent
        );
    }

    #[test]
    fn test_fetch_error_display() {
        let error = FetchError::from_status(502, "https://api.example.com");
        assert_eq!(
            error.to_string(),
            "Source server error (502) (URL: https://api.example.com)"
        );
    }

    #[test]
    fn test_validation_errors_display() {
        let mut errors = ValidationErrors::new();
        errors.push("name", "must not be empty");
        errors.push("cron_expression", "expected 5 fields");
        assert!(errors.has_field("name"));
        assert_eq!(
            errors.to_string(),
            "Validation failed: name: must not be empty; cron_expression: expected 5 fields"
        );
    }

    #[test]
    fn test_validation_errors_into_result() {
        assert_eq!(ValidationErrors::new().into_result(7), Ok(7));

        let mut errors = ValidationErrors::new();
        errors.push("id", "must not be empty");
        assert!(errors.into_result(7).is_err());
    }

    #[test]
    fn test_unit_error_wraps_sources() {
        let error: UnitError = ParseError::missing_field("u", "content.score").into();
        assert_eq!(
            error.to_string(),
            "Payload from u is missing required field 'content.score'"
        );
        assert_eq!(
            UnitError::RunTimeout.to_string(),
            "Run timed out before the unit finished"
        );
    }

    #[test]
    fn test_store_error_converts_into_app_error() {
        let error: AppError = StoreError::UnknownClass("m-ll-1".to_string()).into();
        assert_eq!(error.to_string(), "Unknown class: m-ll-1");
    }
}
