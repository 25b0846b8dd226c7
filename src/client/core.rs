use crate::config::GatewayConfig;
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, RetryPolicy};
use crate::transport::HttpTransport;
use crate::{BoxStream, Error, Result};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::TranslationDirection;
use crate::ErrorContext;

/// Resilient delivery client: every upstream call goes through the circuit
/// breaker and the retry policy.
pub struct ResilientClient {
    pub(crate) transport: Arc<HttpTransport>,
    pub(crate) breaker: Arc<CircuitBreaker>,
    pub(crate) retry: RetryPolicy,
    /// Total budget of a non-streaming attempt, or time to first byte of a streaming one.
    pub(crate) request_timeout: Duration,
    /// Longest wait for any single chunk once a stream is flowing.
    pub(crate) read_timeout: Duration,
}

impl ResilientClient {
    pub fn from_config(cfg: &GatewayConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(cfg)?);
        let breaker = Arc::new(CircuitBreaker::new(
            CircuitBreakerConfig::new()
                .with_failure_threshold(cfg.circuit_failure_threshold)
                .with_recovery_timeout(cfg.circuit_recovery_timeout)
                .with_half_open_max_calls(cfg.circuit_half_open_max_calls),
        ));
        Ok(super::builder::ResilientClientBuilder::new(transport)
            .circuit_breaker(breaker)
            .retry_policy(RetryPolicy::from_config(cfg))
            .request_timeout(cfg.request_timeout)
            .read_timeout(cfg.request_timeout)
            .build())
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Snapshot current runtime signals for health reporting.
    pub fn signals(&self) -> super::signals::SignalsSnapshot {
        super::signals::SignalsSnapshot {
            circuit_breaker: self.breaker.snapshot(),
            max_attempts: self.retry.max_attempts,
        }
    }
}

/// Description of one logical upstream call.
#[derive(Debug, Clone)]
pub struct UpstreamCall {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub request_id: Option<String>,
    pub cancel: Option<CancellationToken>,
}

impl UpstreamCall {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
            request_id: None,
            cancel: None,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
            request_id: None,
            cancel: None,
        }
    }

    pub fn with_request_id(mut self, id: Option<String>) -> Self {
        self.request_id = id;
        self
    }

    pub fn with_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }
}

/// A fully read upstream response, successful or not.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Attempts spent to obtain this response.
    pub attempts: u32,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// `Retry-After: <seconds>`; the HTTP-date form is ignored.
    pub fn retry_after(&self) -> Option<Duration> {
        retry_after(&self.headers)
    }

    /// Decodes a successful body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            Error::translation(
                TranslationDirection::Response,
                format!("Invalid upstream response body: {}", e),
                ErrorContext::new()
                    .with_details(crate::error::truncate_chars(
                        &self.text(),
                        crate::error::STREAM_PREVIEW_CHARS,
                    ))
                    .with_source("upstream_client"),
            )
        })
    }

    /// The taxonomy error for a non-2xx response.
    pub fn into_error(self) -> Error {
        let retry_after = self.retry_after();
        Error::from_upstream_status(self.status, &self.text(), retry_after)
    }
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get("retry-after")?.to_str().ok()?.trim();
    raw.parse::<u64>().ok().map(Duration::from_secs)
}

/// An open upstream stream whose first chunk has already arrived.
pub struct StreamResponse {
    pub status: u16,
    pub attempts: u32,
    pub body: BoxStream<'static, Bytes>,
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}
