//! Range query client for the Prometheus HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use tracing::{debug, warn};

use super::query::RangeQuery;
use super::response::{QueryRangeData, QueryRangeResponse};
use crate::config::PrometheusSettings;
use crate::error::QueryError;

/// Longest error body kept in a [`QueryError::Http`].
const MAX_ERROR_BODY: usize = 512;

/// Source of range-query results. Implemented by [`PrometheusClient`] and by
/// in-memory fakes in tests.
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Execute `query` and return the `data` member of the response.
    ///
    /// A non-2xx status is returned as [`QueryError::Http`], never as a panic.
    async fn query_range(&self, query: &RangeQuery) -> Result<QueryRangeData, QueryError>;
}

#[async_trait]
impl<M: MetricsBackend + ?Sized> MetricsBackend for std::sync::Arc<M> {
    async fn query_range(&self, query: &RangeQuery) -> Result<QueryRangeData, QueryError> {
        (**self).query_range(query).await
    }
}

/// Connection settings for [`PrometheusClient`].
#[derive(Debug, Clone)]
pub struct PrometheusClientConfig {
    /// e.g. `http://10.100.176.57:31078`
    pub base_url: String,
    pub verify_tls: bool,
    pub bearer_token: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl PrometheusClientConfig {
    /// Defaults: TLS verification off, 3 s connect timeout, 10 s request timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            verify_tls: false,
            bearer_token: None,
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_settings(settings: &PrometheusSettings) -> Self {
        Self {
            verify_tls: settings.verify_tls,
            bearer_token: settings.bearer_token.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            ..Self::new(settings.base_url())
        }
    }
}

/// HTTP client bound to one Prometheus server.
pub struct PrometheusClient {
    config: PrometheusClientConfig,
    http: reqwest::Client,
}

impl PrometheusClient {
    /// Build the underlying HTTP client.
    ///
    /// # Errors
    /// Fails only if the TLS backend cannot be initialised.
    pub fn new(config: PrometheusClientConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &PrometheusClientConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/api/v1/query_range", self.config.base_url)
    }
}

#[async_trait]
impl MetricsBackend for PrometheusClient {
    async fn query_range(&self, query: &RangeQuery) -> Result<QueryRangeData, QueryError> {
        let url = self.endpoint();
        let start = query.window.start_param();
        let end = query.window.end_param();
        debug!(metric = query.metric, %url, %start, %end, step = %query.window.step, "querying prometheus");

        let mut request = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .query(&[
                ("query", query.promql.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("step", query.window.step.as_str()),
            ]);
        if let Some(token) = &self.config.bearer_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let resp = request.send().await.map_err(|e| QueryError::Connect {
            url: url.clone(),
            detail: e.to_string(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(QueryError::Http { status: status.as_u16(), url, body });
        }

        let bytes = resp.bytes().await.map_err(|e| QueryError::Connect {
            url: url.clone(),
            detail: e.to_string(),
        })?;

        let response = serde_json::from_slice::<QueryRangeResponse>(&bytes)
            .map_err(|e| QueryError::Decode { url: url.clone(), detail: e.to_string() })?;
        if !response.is_success() {
            warn!(
                metric = query.metric,
                %url,
                status = response.status.as_deref().unwrap_or_default(),
                "prometheus reported non-success status, using returned data"
            );
        }
        Ok(response.data)
    }
}
