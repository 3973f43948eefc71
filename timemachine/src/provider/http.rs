//! Async HTTP transport

use std::future::Future;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use reqwest::StatusCode;
use tracing::{debug, trace, warn};

use super::types::ProviderError;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const DEFAULT_USER_AGENT: &str = concat!("timemachine/", env!("CARGO_PKG_VERSION"));

/// A successful response body with its modification time, if the server sent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub body: Bytes,
    pub last_modified: Option<SystemTime>,
}

/// Outcome of a conditional GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalResponse {
    /// Remote copy is newer; here it is.
    Modified(HttpResponse),
    /// HTTP 304: the cached copy is current.
    NotModified,
}

/// Async HTTP client trait.
///
/// Implementations must be shareable across tasks; one client serves every
/// packet and asset fetch of a store.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an async HTTP GET request.
    fn get(&self, url: &str) -> impl Future<Output = Result<HttpResponse, ProviderError>> + Send;

    /// Performs a GET with `If-Modified-Since: since`.
    fn get_if_modified_since(
        &self,
        url: &str,
        since: SystemTime,
    ) -> impl Future<Output = Result<ConditionalResponse, ProviderError>> + Send;
}

/// Formats a timestamp as an RFC 7231 HTTP date.
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Parses an HTTP date header value.
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(SystemTime::from)
}

/// Async HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct AsyncReqwestClient {
    client: reqwest::Client,
}

impl AsyncReqwestClient {
    /// Creates a new client with the default timeout.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a new client with a custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(DEFAULT_USER_AGENT)
            // Packet traversal fans out to many small requests on two hosts
            .pool_max_idle_per_host(64)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                ProviderError::HttpError(format!("Failed to create async HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    async fn send(
        &self,
        url: &str,
        since: Option<SystemTime>,
    ) -> Result<reqwest::Response, ProviderError> {
        trace!(url = url, "HTTP GET request starting");

        let mut request = self.client.get(url);
        if let Some(since) = since {
            request = request.header(IF_MODIFIED_SINCE, format_http_date(since));
        }

        match request.send().await {
            Ok(response) => {
                debug!(
                    url = url,
                    status = response.status().as_u16(),
                    "HTTP response received"
                );
                Ok(response)
            }
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                Err(ProviderError::HttpError(format!("Request failed: {}", e)))
            }
        }
    }

    async fn read(url: &str, response: reqwest::Response) -> Result<HttpResponse, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            warn!(url = url, status = status.as_u16(), "HTTP error status");
            return Err(ProviderError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_http_date);

        match response.bytes().await {
            Ok(body) => {
                trace!(url = url, bytes = body.len(), "HTTP response body read");
                Ok(HttpResponse {
                    body,
                    last_modified,
                })
            }
            Err(e) => {
                warn!(url = url, error = %e, "Failed to read response body");
                Err(ProviderError::HttpError(format!(
                    "Failed to read response: {}",
                    e
                )))
            }
        }
    }
}

impl AsyncHttpClient for AsyncReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, ProviderError> {
        let response = self.send(url, None).await?;
        Self::read(url, response).await
    }

    async fn get_if_modified_since(
        &self,
        url: &str,
        since: SystemTime,
    ) -> Result<ConditionalResponse, ProviderError> {
        let response = self.send(url, Some(since)).await?;
        if response.status() == StatusCode::NOT_MODIFIED {
            debug!(url = url, "Remote copy not modified");
            return Ok(ConditionalResponse::NotModified);
        }
        Self::read(url, response)
            .await
            .map(ConditionalResponse::Modified)
    }
}
