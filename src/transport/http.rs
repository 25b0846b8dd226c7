use crate::config::GatewayConfig;
use crate::{Error, Result};
use reqwest::Method;
use std::time::Duration;

/// Pooled HTTP connection to the OpenAI-compatible upstream.
///
/// One instance per process. It owns the connection pool and attaches the
/// bearer credential; status handling, retries and the breaker live in
/// [`crate::client`].
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(cfg: &GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(cfg.connect_timeout)
            .pool_max_idle_per_host(cfg.pool_max_idle_per_host)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            // Conservative HTTP/2 keepalive defaults for long-lived streams.
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .http2_keep_alive_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            base_url: cfg.base_url.clone(),
            api_key: cfg.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sends one request. `timeout` bounds the whole exchange including the body;
    /// streaming calls pass `None` and bound each chunk read instead.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        streaming: bool,
        timeout: Option<Duration>,
        request_id: Option<&str>,
    ) -> std::result::Result<reqwest::Response, TransportError> {
        let mut req = self
            .client
            .request(method, self.url(path))
            .bearer_auth(&self.api_key);

        if let Some(body) = body {
            req = req.json(body);
        }
        if streaming {
            req = req.header("accept", "text/event-stream");
        }
        if let Some(id) = request_id {
            req = req.header("x-request-id", id);
        }
        if let Some(t) = timeout {
            req = req.timeout(t);
        }

        req.send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Circuit breaker is open, upstream calls are suspended")]
    CircuitOpen,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Reclassifies a reqwest failure so timeouts and connect errors are distinguishable.
    pub fn from_reqwest(e: reqwest::Error, timeout: Option<Duration>) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(timeout.unwrap_or_default())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Http(e)
        }
    }

    /// Network-level faults worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::CircuitOpen | TransportError::Cancelled)
    }

    /// Whether this outcome counts against the circuit breaker.
    pub fn counts_as_failure(&self) -> bool {
        self.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TransportError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(TransportError::Connect("refused".into()).is_retryable());
        assert!(!TransportError::CircuitOpen.is_retryable());
        assert!(!TransportError::Cancelled.is_retryable());
    }

    #[test]
    fn test_url_join() {
        let cfg = GatewayConfig::new("http://localhost:8000", "sk-test").unwrap();
        let t = HttpTransport::new(&cfg).unwrap();
        assert_eq!(t.url("/chat/completions"), "http://localhost:8000/v1/chat/completions");
        assert_eq!(t.url("models"), "http://localhost:8000/v1/models");
    }
}
