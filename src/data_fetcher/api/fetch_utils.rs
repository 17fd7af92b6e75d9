//! Raw HTTP fetching with bounded retries for transient failures

use rand::Rng;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::constants::retry;
use crate::data_fetcher::models::RawPayload;
use crate::error::FetchError;

/// Bounds and pacing of the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first request
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            base_delay: Duration::from_millis(retry::BASE_DELAY_MS),
            max_delay: Duration::from_secs(retry::MAX_DELAY_SECONDS),
            max_jitter: Duration::from_millis(retry::MAX_JITTER_MS),
        }
    }
}

impl RetryPolicy {
    /// Exponential delay before the attempt following `attempt` (1-based),
    /// capped at `max_delay`, plus random jitter.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        let jitter_ms = self.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return delay;
        }
        let jitter = rand::rng().random_range(0..=jitter_ms);
        delay + Duration::from_millis(jitter)
    }
}

struct AttemptError {
    error: FetchError,
    retry_after: Option<Duration>,
}

impl From<FetchError> for AttemptError {
    fn from(error: FetchError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

/// Fetches `url` and returns the body unparsed.
///
/// Transient failures (timeouts, connection errors, 5xx, 429) are retried up
/// to `policy.max_attempts` in total with exponential backoff; a `Retry-After`
/// header takes precedence over the computed delay. Permanent failures are
/// returned immediately. Nothing is cached.
#[instrument(skip(client, policy))]
pub async fn fetch_raw(
    client: &Client,
    url: &str,
    policy: &RetryPolicy,
) -> Result<RawPayload, FetchError> {
    info!("Fetching data from URL: {url}");

    let mut attempt = 1u32;
    loop {
        match fetch_once(client, url).await {
            Ok(payload) => {
                if attempt > 1 {
                    info!("Fetched {} after {} attempts", url, attempt);
                }
                return Ok(payload);
            }
            Err(failure) if failure.error.is_transient() && attempt < policy.max_attempts => {
                let wait = failure
                    .retry_after
                    .map(|d| d.min(policy.max_delay))
                    .unwrap_or_else(|| policy.backoff_for(attempt));
                warn!(
                    "Transient failure for {}: {}. Retrying in {:?} (attempt {}/{})",
                    url,
                    failure.error,
                    wait,
                    attempt + 1,
                    policy.max_attempts
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(failure) => {
                if failure.error.is_transient() {
                    error!(
                        "Giving up on {} after {} attempts: {}",
                        url, attempt, failure.error
                    );
                } else {
                    error!("Permanent failure for {}: {}", url, failure.error);
                }
                return Err(failure.error);
            }
        }
    }
}

async fn fetch_once(client: &Client, url: &str) -> Result<RawPayload, AttemptError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| classify_request_error(url, e))?;

    let status = response.status();
    debug!("Response status: {status}");

    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(AttemptError {
            error: FetchError::from_status(status.as_u16(), url),
            retry_after,
        });
    }

    let body = response.text().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::timeout(url)
        } else {
            FetchError::Body {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    })?;

    if body.trim().is_empty() {
        return Err(FetchError::EmptyBody {
            url: url.to_string(),
        }
        .into());
    }

    debug!("Response length: {} bytes", body.len());
    let preview: String = body.chars().take(512).collect();
    debug!("Response text (first 512 chars): {preview}");

    Ok(RawPayload::new(url, body))
}

fn classify_request_error(url: &str, e: reqwest::Error) -> AttemptError {
    let error = if e.is_builder() {
        FetchError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        }
    } else if e.is_timeout() {
        FetchError::timeout(url)
    } else {
        FetchError::connection(url, e.to_string())
    };
    error.into()
}
