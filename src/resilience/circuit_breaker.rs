use crate::transport::TransportError;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
    pub half_open_max_calls: u32,
    pub failure_count: u32,
    pub half_open_probes: u32,
    pub half_open_successes: u32,
    /// Remaining open time in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_max_calls: 3,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    pub fn with_half_open_max_calls(mut self, calls: u32) -> Self {
        self.half_open_max_calls = calls.max(1);
        self
    }
}

#[derive(Debug)]
struct State {
    state: CircuitState,
    failure_count: u32,
    half_open_probes: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
    /// Bumped on every transition to Open; tells probe slots of different
    /// half-open periods apart.
    generation: u64,
}

/// Three-state circuit breaker shared by all calls to one upstream.
///
/// - Closed: calls pass; consecutive failures are counted and reaching the
///   threshold opens the breaker
/// - Open: calls are rejected until `recovery_timeout` has passed, then the next
///   inspection moves to HalfOpen
/// - HalfOpen: up to `half_open_max_calls` probes pass; that many successes close
///   the breaker, any failure reopens it
pub struct CircuitBreaker {
    cfg: CircuitBreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(cfg: CircuitBreakerConfig) -> Self {
        Self {
            cfg,
            state: Mutex::new(State {
                state: CircuitState::Closed,
                failure_count: 0,
                half_open_probes: 0,
                half_open_successes: 0,
                opened_at: None,
                generation: 0,
            }),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.cfg
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Counters stay consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Admits or rejects one call.
    pub fn allow(&self) -> Result<(), TransportError> {
        self.admit().map(|_| ())
    }

    /// Admits one call and hands back a permit that must be settled with its
    /// outcome. A permit dropped unsettled (the caller's future was dropped
    /// mid-call) gives its probe slot back.
    pub fn acquire(&self) -> Result<Permit<'_>, TransportError> {
        let probe = self.admit()?;
        Ok(Permit {
            breaker: self,
            probe,
            settled: false,
        })
    }

    /// On success, the generation whose half-open probe slot was taken, if any.
    fn admit(&self) -> Result<Option<u64>, TransportError> {
        let mut st = self.lock();
        if st.state == CircuitState::Open {
            let elapsed = st.opened_at.map(|t| t.elapsed()).unwrap_or_default();
            if elapsed < self.cfg.recovery_timeout {
                return Err(TransportError::CircuitOpen);
            }
            info!("circuit breaker half-open, allowing probe calls");
            st.state = CircuitState::HalfOpen;
            st.half_open_probes = 0;
            st.half_open_successes = 0;
        }
        if st.state == CircuitState::HalfOpen {
            if st.half_open_probes >= self.cfg.half_open_max_calls {
                return Err(TransportError::CircuitOpen);
            }
            st.half_open_probes += 1;
            return Ok(Some(st.generation));
        }
        Ok(None)
    }

    pub fn on_success(&self) {
        let mut st = self.lock();
        match st.state {
            CircuitState::Closed => st.failure_count = 0,
            CircuitState::HalfOpen => {
                st.half_open_successes += 1;
                if st.half_open_successes >= self.cfg.half_open_max_calls {
                    info!("circuit breaker closed after successful probes");
                    st.state = CircuitState::Closed;
                    st.failure_count = 0;
                    st.half_open_probes = 0;
                    st.half_open_successes = 0;
                    st.opened_at = None;
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn on_failure(&self) {
        let mut st = self.lock();
        match st.state {
            CircuitState::Closed => {
                st.failure_count = st.failure_count.saturating_add(1);
                if st.failure_count >= self.cfg.failure_threshold {
                    warn!(
                        failures = st.failure_count,
                        recovery_timeout_ms = self.cfg.recovery_timeout.as_millis() as u64,
                        "circuit breaker opened"
                    );
                    Self::open(&mut st);
                }
            }
            CircuitState::HalfOpen => {
                warn!("probe failed, circuit breaker reopened");
                st.failure_count = st.failure_count.saturating_add(1);
                Self::open(&mut st);
            }
            CircuitState::Open => {}
        }
    }

    /// Releases an admitted call that ended without an outcome (cancelled by
    /// the caller). Frees its half-open probe slot; counters are untouched.
    pub fn on_abandoned(&self) {
        let mut st = self.lock();
        if st.state == CircuitState::HalfOpen {
            st.half_open_probes = st.half_open_probes.saturating_sub(1);
        }
    }

    fn release(&self, probe: Option<u64>) {
        let Some(generation) = probe else {
            return;
        };
        let mut st = self.lock();
        if st.state == CircuitState::HalfOpen && st.generation == generation {
            st.half_open_probes = st.half_open_probes.saturating_sub(1);
        }
    }

    fn open(st: &mut State) {
        st.state = CircuitState::Open;
        st.generation = st.generation.wrapping_add(1);
        st.opened_at = Some(Instant::now());
        st.half_open_probes = 0;
        st.half_open_successes = 0;
    }

    /// Current state. An expired Open period is reported as HalfOpen.
    pub fn state(&self) -> CircuitState {
        self.snapshot().state
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let st = self.lock();
        let remaining = match (st.state, st.opened_at) {
            (CircuitState::Open, Some(at)) => self.cfg.recovery_timeout.checked_sub(at.elapsed()),
            _ => None,
        }
        .filter(|d| !d.is_zero());
        let state = match (st.state, remaining) {
            (CircuitState::Open, None) => CircuitState::HalfOpen,
            (s, _) => s,
        };
        CircuitBreakerSnapshot {
            state,
            failure_threshold: self.cfg.failure_threshold,
            recovery_timeout_ms: self.cfg.recovery_timeout.as_millis() as u64,
            half_open_max_calls: self.cfg.half_open_max_calls,
            failure_count: st.failure_count,
            half_open_probes: st.half_open_probes,
            half_open_successes: st.half_open_successes,
            open_remaining_ms: remaining.map(|d| d.as_millis() as u64),
        }
    }
}

/// An admitted call. `success`, `failure` or `abandon` records its outcome;
/// dropping it unsettled counts as abandoned.
#[must_use = "an unsettled permit is treated as abandoned"]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: Option<u64>,
    settled: bool,
}

impl Permit<'_> {
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.on_success();
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure();
    }

    pub fn abandon(mut self) {
        self.settled = true;
        self.breaker.release(self.probe);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release(self.probe);
        }
    }
}
