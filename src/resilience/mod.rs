//! # Resilience Primitives Module
//!
//! Failure isolation and bounded retry for upstream calls.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`circuit_breaker`] | Closed / Open / HalfOpen breaker shared per upstream |
//! | [`retry`] | Retry policy with exponential backoff and jitter |
//!
//! ## Circuit Breaker
//!
//! - **Closed**: Normal operation, requests pass through
//! - **Open**: Failures reached the threshold, requests fail fast
//! - **Half-Open**: A bounded number of probes test whether the upstream recovered
//!
//! ```rust
//! use ollama_openai_gateway::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::new(
//!     CircuitBreakerConfig::new()
//!         .with_failure_threshold(5)
//!         .with_recovery_timeout(Duration::from_secs(60))
//!         .with_half_open_max_calls(3),
//! );
//!
//! if let Ok(permit) = breaker.acquire() {
//!     // Make the upstream call, then record how it went. A permit dropped
//!     // without an outcome gives its half-open probe slot back.
//!     permit.success();
//! };
//! ```
//!
//! ## Retry
//!
//! ```rust
//! use ollama_openai_gateway::resilience::retry::{Outcome, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new()
//!     .with_max_attempts(3)
//!     .with_base_delay(Duration::from_millis(500));
//! assert!(policy.should_retry(&Outcome::Status(503)));
//! assert!(!policy.should_retry(&Outcome::Status(400)));
//! ```

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitState, Permit};
pub use retry::{Outcome, RetryPolicy, RetryPredicate};
