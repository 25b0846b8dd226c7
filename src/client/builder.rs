use crate::client::core::ResilientClient;
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, RetryPolicy};
use crate::transport::HttpTransport;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`ResilientClient`].
///
/// Anything left unset falls back to the library defaults: a fresh breaker with
/// [`CircuitBreakerConfig::default`], [`RetryPolicy::default`] and 60s timeouts.
pub struct ResilientClientBuilder {
    transport: Arc<HttpTransport>,
    breaker: Option<Arc<CircuitBreaker>>,
    retry: Option<RetryPolicy>,
    request_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
}

impl ResilientClientBuilder {
    pub fn new(transport: Arc<HttpTransport>) -> Self {
        Self {
            transport,
            breaker: None,
            retry: None,
            request_timeout: None,
            read_timeout: None,
        }
    }

    /// Share an existing breaker (one per upstream).
    pub fn circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Budget of a non-streaming attempt, and the time to first byte of a stream.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Longest gap between two chunks of a flowing stream.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> ResilientClient {
        let request_timeout = self.request_timeout.unwrap_or(Duration::from_secs(60));
        ResilientClient {
            transport: self.transport,
            breaker: self
                .breaker
                .unwrap_or_else(|| Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()))),
            retry: self.retry.unwrap_or_default(),
            request_timeout,
            read_timeout: self.read_timeout.unwrap_or(request_timeout),
        }
    }
}
