//! Fetcher interface and the default HTTP implementation
//!
//! The crawl core talks to the network only through the [`Fetcher`]
//! trait; [`HttpFetcher`] is the reqwest-backed default. Headless
//! browser drivers would implement the same trait.

use crate::canonical::CanonicalUrl;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::trace;

/// Hard ceiling applied before streaming: responses that declare a
/// larger Content-Length are refused outright instead of truncated.
const ABSOLUTE_BODY_LIMIT: usize = 100 * 1024 * 1024;

/// Per-request fetch options.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    /// Bodies beyond this many bytes are truncated.
    pub max_body_bytes: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// A completed fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub elapsed_ms: u64,
    /// Whether the body hit the per-request size ceiling.
    pub truncated: bool,
}

impl FetchResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Body decoded as UTF-8, lossily.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Fetch failures, classified for the retry policy.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("connection reset or refused")]
    ConnectionReset,
    #[error("DNS resolution failed")]
    Dns,
    #[error("TLS handshake failed")]
    Tls,
    #[error("HTTP protocol error (status {0})")]
    Http(u16),
    #[error("response body exceeds the absolute size limit")]
    BodyTooLarge,
    #[error("request cancelled")]
    Cancelled,
    #[error("i/o error: {0}")]
    Io(String),
}

impl FetchError {
    /// Whether the worker pool should retry this failure. TLS
    /// handshakes can time out transiently, so they retry too.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::ConnectionReset | Self::Tls | Self::Io(_)
        )
    }
}

/// The core's only view of the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &CanonicalUrl,
        options: &FetchOptions,
    ) -> Result<FetchResponse, FetchError>;
}

/// reqwest-backed fetcher with connection pooling, compression, and
/// optional cookie injection.
pub struct HttpFetcher {
    client: reqwest::Client,
    cookie: Option<String>,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, cookie: Option<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .gzip(true)
            .brotli(true)
            .pool_max_idle_per_host(8)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FetchError::Io(e.to_string()))?;
        Ok(Self { client, cookie })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &CanonicalUrl,
        options: &FetchOptions,
    ) -> Result<FetchResponse, FetchError> {
        let start = Instant::now();
        let mut request = self
            .client
            .get(url.as_str())
            .timeout(options.timeout);
        if let Some(cookie) = &self.cookie {
            request = request.header(reqwest::header::COOKIE, cookie.as_str());
        }

        let response = request.send().await.map_err(classify_reqwest_error)?;

        if let Some(length) = response.content_length() {
            if length as usize > ABSOLUTE_BODY_LIMIT {
                return Err(FetchError::BodyTooLarge);
            }
        }

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();

        let mut body = Vec::new();
        let mut truncated = false;
        let mut response = response;
        while let Some(chunk) = response.chunk().await.map_err(classify_reqwest_error)? {
            if body.len() + chunk.len() > options.max_body_bytes {
                let room = options.max_body_bytes - body.len();
                body.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        trace!(url = %url, status, elapsed_ms, bytes = body.len(), truncated, "fetched");

        Ok(FetchResponse {
            final_url,
            status,
            headers,
            body,
            elapsed_ms,
            truncated,
        })
    }
}

fn classify_reqwest_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        return FetchError::Timeout;
    }
    if let Some(status) = error.status() {
        return FetchError::Http(status.as_u16());
    }
    let message = error.to_string().to_ascii_lowercase();
    if message.contains("dns") || message.contains("resolve") {
        FetchError::Dns
    } else if message.contains("tls") || message.contains("certificate") || message.contains("ssl")
    {
        FetchError::Tls
    } else if message.contains("connection reset")
        || message.contains("connection refused")
        || message.contains("broken pipe")
        || error.is_connect()
    {
        FetchError::ConnectionReset
    } else {
        FetchError::Io(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::ConnectionReset.is_retryable());
        assert!(FetchError::Io("unexpected eof".into()).is_retryable());
        assert!(FetchError::Tls.is_retryable());
        assert!(!FetchError::Dns.is_retryable());
        assert!(!FetchError::Http(508).is_retryable());
        assert!(!FetchError::BodyTooLarge.is_retryable());
        assert!(!FetchError::Cancelled.is_retryable());
    }

    #[test]
    fn test_response_header_lookup_case_insensitive() {
        let response = FetchResponse {
            final_url: "https://example.com/".into(),
            status: 200,
            headers: vec![("Content-Type".into(), "text/html; charset=utf-8".into())],
            body: b"<html></html>".to_vec(),
            elapsed_ms: 5,
            truncated: false,
        };
        assert_eq!(
            response.content_type(),
            Some("text/html; charset=utf-8")
        );
        assert_eq!(response.header("CONTENT-TYPE"), response.content_type());
        assert!(response.header("x-missing").is_none());
    }

    #[test]
    fn test_body_text_lossy() {
        let response = FetchResponse {
            final_url: "https://example.com/".into(),
            status: 200,
            headers: vec![],
            body: vec![0x68, 0x69, 0xFF],
            elapsed_ms: 1,
            truncated: false,
        };
        assert!(response.body_text().starts_with("hi"));
    }
}
