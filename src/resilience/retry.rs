use crate::config::GatewayConfig;
use crate::transport::TransportError;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Jitter multiplies a delay by a factor drawn from this range.
const JITTER_RANGE: (f64, f64) = (0.75, 1.25);

/// The result of one attempt, as seen by the retry decision.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    /// The upstream answered with this HTTP status.
    Status(u16),
    /// No usable response.
    Error(&'a TransportError),
}

/// Caller-supplied classification that replaces the default one entirely.
pub type RetryPredicate = Arc<dyn Fn(&Outcome<'_>) -> bool + Send + Sync>;

/// Bounded retry with exponential backoff.
///
/// `max_attempts` counts every attempt including the first. The delay before
/// retry `n` (1-based) is `min(max_delay, base_delay * backoff_multiplier^(n-1))`,
/// optionally scaled by a jitter factor in `[0.75, 1.25]` and clamped again.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
    pub retryable_statuses: Vec<u16>,
    predicate: Option<RetryPredicate>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter", &self.jitter)
            .field("retryable_statuses", &self.retryable_statuses)
            .field("custom_predicate", &self.predicate.is_some())
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(60_000),
            backoff_multiplier: 2.0,
            jitter: true,
            retryable_statuses: default_retryable_statuses(),
            predicate: None,
        }
    }
}

/// 408, 429 and every 5xx.
pub fn default_retryable_statuses() -> Vec<u16> {
    let mut statuses = vec![408, 429];
    statuses.extend(500..=599);
    statuses
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(cfg: &GatewayConfig) -> Self {
        Self::default()
            .with_max_attempts(cfg.max_retries)
            .with_base_delay(cfg.retry_base_delay)
            .with_max_delay(cfg.retry_max_delay)
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Outcome<'_>) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Whether this outcome deserves another attempt (ignoring the attempt budget).
    pub fn should_retry(&self, outcome: &Outcome<'_>) -> bool {
        if let Some(p) = &self.predicate {
            return p(outcome);
        }
        match outcome {
            Outcome::Status(s) => self.retryable_statuses.contains(s),
            Outcome::Error(e) => e.is_retryable(),
        }
    }

    /// Deterministic backoff before retry `retry` (1-based).
    pub fn base_delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(63) as i32;
        let nanos = self.base_delay.as_nanos() as f64 * self.backoff_multiplier.powi(exp);
        let capped = nanos.min(self.max_delay.as_nanos() as f64);
        Duration::from_nanos(capped.max(0.0).round() as u64)
    }

    /// Backoff before retry `retry`, with jitter when enabled. A server-provided
    /// `retry_after` raises the delay but never past `max_delay`.
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let mut delay = self.base_delay_for(retry);
        if self.jitter && !delay.is_zero() {
            let factor = rand::thread_rng().gen_range(JITTER_RANGE.0..=JITTER_RANGE.1);
            delay = delay.mul_f64(factor).min(self.max_delay);
        }
        match retry_after {
            Some(ra) => delay.max(ra).min(self.max_delay),
            None => delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new()
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(1_000))
            .with_jitter(false)
    }

    #[test]
    fn test_exponential_backoff_capped() {
        let p = policy();
        assert_eq!(p.base_delay_for(1), Duration::from_millis(100));
        assert_eq!(p.base_delay_for(2), Duration::from_millis(200));
        assert_eq!(p.base_delay_for(3), Duration::from_millis(400));
        assert_eq!(p.base_delay_for(5), Duration::from_millis(1_000));
        assert_eq!(p.base_delay_for(40), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_bounds() {
        let p = policy().with_jitter(true);
        for _ in 0..200 {
            let d = p.delay_for(2, None);
            assert!(d >= Duration::from_millis(150) && d <= Duration::from_millis(250), "{d:?}");
            assert!(p.delay_for(10, None) <= Duration::from_millis(1_000));
        }
    }

    #[test]
    fn test_retry_after_respected_within_cap() {
        let p = policy();
        assert_eq!(p.delay_for(1, Some(Duration::from_millis(500))), Duration::from_millis(500));
        assert_eq!(p.delay_for(1, Some(Duration::from_secs(30))), Duration::from_millis(1_000));
    }

    #[test]
    fn test_default_classification() {
        let p = policy();
        for s in [408, 429, 500, 502, 503, 504, 599] {
            assert!(p.should_retry(&Outcome::Status(s)), "{s}");
        }
        for s in [200, 400, 401, 404, 422] {
            assert!(!p.should_retry(&Outcome::Status(s)), "{s}");
        }
        let timeout = TransportError::Timeout(Duration::from_secs(1));
        assert!(p.should_retry(&Outcome::Error(&timeout)));
        assert!(!p.should_retry(&Outcome::Error(&TransportError::Cancelled)));
    }

    #[test]
    fn test_predicate_overrides_classification() {
        let p = policy().with_predicate(|o| matches!(o, Outcome::Status(400)));
        assert!(p.should_retry(&Outcome::Status(400)));
        assert!(!p.should_retry(&Outcome::Status(503)));
    }

    #[test]
    fn test_max_attempts_floor() {
        assert_eq!(RetryPolicy::new().with_max_attempts(0).max_attempts, 1);
    }
}
