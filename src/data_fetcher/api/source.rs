//! External source client for the handball4all JSON service

use async_trait::async_trait;
use reqwest::Client;
use tracing::instrument;

use super::fetch_utils::{RetryPolicy, fetch_raw};
use super::http_client::create_http_client_with_timeout;
use super::urls::{build_class_url, build_index_url};
use crate::config::Config;
use crate::data_fetcher::models::{RawPayload, WeekId};
use crate::error::{AppError, FetchError};

/// Pure I/O access to the league data source. Implementations never cache.
#[async_trait]
pub trait LeagueSource: Send + Sync {
    /// Fetches the organization page listing classes and the active round.
    async fn fetch_index(&self) -> Result<RawPayload, FetchError>;

    /// Fetches the class page. Without a week the source answers with the
    /// round it considers active.
    async fn fetch_class(
        &self,
        class_id: &str,
        week: Option<WeekId>,
    ) -> Result<RawPayload, FetchError>;
}

/// HTTP implementation of [`LeagueSource`].
#[derive(Debug, Clone)]
pub struct HvwSourceClient {
    client: Client,
    api_domain: String,
    organization_id: String,
    retry: RetryPolicy,
}

impl HvwSourceClient {
    pub fn new(
        client: Client,
        api_domain: impl Into<String>,
        organization_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_domain: api_domain.into(),
            organization_id: organization_id.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Builds a client with the configured domain, organization and timeout.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let client = create_http_client_with_timeout(config.http_timeout_seconds)?;
        Ok(Self::new(
            client,
            config.api_domain.clone(),
            config.organization_id.clone(),
        ))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn api_domain(&self) -> &str {
        &self.api_domain
    }
}

#[async_trait]
impl LeagueSource for HvwSourceClient {
    #[instrument(skip(self), fields(org = %self.organization_id))]
    async fn fetch_index(&self) -> Result<RawPayload, FetchError> {
        let url = build_index_url(&self.api_domain, &self.organization_id)?;
        fetch_raw(&self.client, &url, &self.retry).await
    }

    #[instrument(skip(self))]
    async fn fetch_class(
        &self,
        class_id: &str,
        week: Option<WeekId>,
    ) -> Result<RawPayload, FetchError> {
        let url = build_class_url(&self.api_domain, class_id, week)?;
        fetch_raw(&self.client, &url, &self.retry).await
    }
}
