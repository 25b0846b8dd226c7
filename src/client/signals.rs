use crate::resilience::circuit_breaker::CircuitBreakerSnapshot;
use serde::Serialize;

/// A facts-only snapshot of the delivery client, reported by the health probe.
#[derive(Debug, Clone, Serialize)]
pub struct SignalsSnapshot {
    pub circuit_breaker: CircuitBreakerSnapshot,
    pub max_attempts: u32,
}
