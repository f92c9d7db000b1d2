//! Generic paginated JSON feed fetcher.
//!
//! Talks to any endpoint that accepts the query parameters below and answers
//! with a serialized [`PageFetchResult`]:
//!
//! ```text
//! GET {endpoint}?action=search&q=rockets&limit=100
//!               [&since=2024-01-01T00:00:00Z][&since_id=123][&cursor=abc]
//!
//! { "items": [...], "next": "def", "profile": null }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Criterion, CursorHints, NetworkConfig, PageFetchResult, PageParams};
use crate::services::Fetcher;

/// Fetcher for one network's JSON endpoint.
pub struct HttpFeedFetcher {
    name: String,
    endpoint: Url,
    client: Client,
    bearer_token: Option<String>,
    exhausted_sentinel: Option<String>,
}

impl HttpFeedFetcher {
    pub fn new(name: impl Into<String>, endpoint: &str, client: Client) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            endpoint: Url::parse(endpoint)?,
            client,
            bearer_token: None,
            exhausted_sentinel: None,
        })
    }

    /// Build from configuration, reading the bearer token from the configured
    /// environment variable.
    pub fn from_config(config: &NetworkConfig, client: Client) -> Result<Self> {
        let mut fetcher = Self::new(&config.name, &config.endpoint, client)?;
        if let Some(var) = &config.auth_token_env {
            let token = std::env::var(var).map_err(|_| {
                AppError::config(format!(
                    "network '{}' expects a token in ${var}, which is not set",
                    config.name
                ))
            })?;
            fetcher = fetcher.with_bearer_token(token);
        }
        if let Some(sentinel) = &config.exhausted_sentinel {
            fetcher = fetcher.with_exhausted_sentinel(sentinel.clone());
        }
        Ok(fetcher)
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Treat this continuation value as "no more pages".
    pub fn with_exhausted_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.exhausted_sentinel = Some(sentinel.into());
        self
    }

    fn request_url(&self, criterion: &Criterion, hints: &CursorHints, params: &PageParams) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("action", criterion.action().as_str())
                .append_pair("q", &criterion.value)
                .append_pair("limit", &params.results_per_page.to_string());
            if let Some(since) = hints.since {
                query.append_pair("since", &since.to_rfc3339());
            }
            if let Some(since_id) = &hints.since_id {
                query.append_pair("since_id", since_id);
            }
            if let Some(token) = &params.continuation {
                query.append_pair("cursor", token);
            }
        }
        url
    }

    fn fetch_error(&self, criterion: &Criterion, message: impl std::fmt::Display) -> AppError {
        AppError::fetch(&self.name, &criterion.value, message)
    }
}

#[async_trait]
impl Fetcher for HttpFeedFetcher {
    fn network(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        criterion: &Criterion,
        hints: &CursorHints,
        params: &PageParams,
    ) -> Result<PageFetchResult> {
        let url = self.request_url(criterion, hints, params);
        log::debug!("[{}] GET {}", self.name, url);

        let mut request = self.client.get(url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.fetch_error(criterion, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.fetch_error(criterion, format!("HTTP {status}: {body}")));
        }

        response
            .json::<PageFetchResult>()
            .await
            .map_err(|e| self.fetch_error(criterion, format!("invalid page: {e}")))
    }

    fn is_exhausted(&self, page: &PageFetchResult) -> bool {
        match (page.continuation(), &self.exhausted_sentinel) {
            (None, _) => true,
            (Some(token), Some(sentinel)) => token == sentinel,
            (Some(_), None) => false,
        }
    }
}
