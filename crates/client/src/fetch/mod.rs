//! HTTP fetch layer for hostile or flaky sources.
//!
//! ### Transport seam
//! - `HttpTransport` issues exactly one GET per call; everything above it
//!   (identity rotation, retries, validation, politeness) is transport-agnostic.
//! - `ReqwestTransport` is the production implementation.
//!
//! ### Identity rotation
//! - Each attempt presents the headers of one `IdentityProfile`.
//! - Attempt n uses profile `n mod pool_size`, so a request blocked under one
//!   identity is retried under another.
//!
//! ### Validation
//! - Success requires status 200, a non-empty body within the size limit,
//!   and, for documents, an allow-listed content type.

pub mod identity;
pub mod politeness;
pub mod retry;
pub mod url;
pub mod validate;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, header};
use std::time::{Duration, Instant};

pub use identity::{IdentityPool, IdentityProfile};
pub use politeness::PolitenessGate;
pub use retry::{Attempt, RetryExhausted, RetryPolicy};
pub use self::url::{UrlError, canonicalize, external_id};
pub use validate::{Rejection, ResponseRules};

/// Transport-level failure. Always retryable.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("response too large: {size} bytes exceeds {limit}")]
    TooLarge { size: usize, limit: usize },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { TransportError::Timeout(err.to_string()) } else { TransportError::Network(err.to_string()) }
    }
}

/// One GET request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: ::url::Url,
    pub profile: IdentityProfile,
    pub timeout: Duration,
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL requested
    pub url: ::url::Url,
    /// The final URL after redirects
    pub final_url: ::url::Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Issues a single HTTP GET.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError>;
}

/// Configuration for the reqwest transport.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum response body size in bytes (default: 20MB)
    pub max_bytes: usize,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { max_bytes: 20 * 1024 * 1024, max_redirects: 5 }
    }
}

/// reqwest-backed transport.
///
/// Headers come from the request's identity profile rather than client
/// defaults, so one client serves every identity.
pub struct ReqwestTransport {
    http: Client,
    config: FetchConfig,
}

impl ReqwestTransport {
    pub fn new(config: FetchConfig) -> Result<Self, TransportError> {
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        let start = Instant::now();

        let headers = request
            .profile
            .header_map()
            .map_err(|e| TransportError::Network(format!("invalid identity header: {e}")))?;

        let response = self
            .http
            .get(request.url.as_str())
            .headers(headers)
            .timeout(request.timeout)
            .send()
            .await?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(TransportError::TooLarge { size: len as usize, limit: self.config.max_bytes });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response.bytes().await?;

        if bytes.len() > self.config.max_bytes {
            return Err(TransportError::TooLarge { size: bytes.len(), limit: self.config.max_bytes });
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            url = %request.url,
            final_url = %final_url,
            status = status.as_u16(),
            identity = %request.profile.name,
            fetch_ms,
            bytes = bytes.len(),
            "fetched"
        );

        Ok(FetchResponse { url: request.url.clone(), final_url, status, content_type, bytes, fetch_ms })
    }
}
