use crate::resilience::{Outcome, RetryPolicy};
use crate::transport::TransportError;
use crate::{Error, Result};
use std::time::Duration;

/// What one attempt produced.
pub(crate) enum Attempt<T> {
    /// The upstream answered; `value` carries whatever the attempt read.
    Response {
        status: u16,
        retry_after: Option<Duration>,
        value: T,
    },
    Failed(TransportError),
}

impl<T> Attempt<T> {
    fn outcome(&self) -> Outcome<'_> {
        match self {
            Attempt::Response { status, .. } => Outcome::Status(*status),
            Attempt::Failed(e) => Outcome::Error(e),
        }
    }
}

/// How to proceed after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Retry { delay: Duration },
    Stop,
}

/// Decide what to do after attempt number `attempt` (1-based).
///
/// Keep this deterministic apart from jitter: the policy classification and
/// the attempt budget are the only inputs.
pub(crate) fn decide<T>(policy: &RetryPolicy, attempt_out: &Attempt<T>, attempt: u32) -> Decision {
    if matches!(attempt_out, Attempt::Response { status, .. } if (200..300).contains(status)) {
        return Decision::Stop;
    }
    if attempt >= policy.max_attempts || !policy.should_retry(&attempt_out.outcome()) {
        return Decision::Stop;
    }
    let retry_after = match attempt_out {
        Attempt::Response { retry_after, .. } => *retry_after,
        Attempt::Failed(_) => None,
    };
    Decision::Retry {
        delay: policy.delay_for(attempt, retry_after),
    }
}

/// Transport failures and 5xx responses count against the breaker; 4xx do not.
pub(crate) fn is_breaker_failure<T>(attempt_out: &Attempt<T>) -> bool {
    match attempt_out {
        Attempt::Response { status, .. } => *status >= 500,
        Attempt::Failed(e) => e.counts_as_failure(),
    }
}

pub(crate) fn is_cancelled<T>(attempt_out: &Attempt<T>) -> bool {
    matches!(attempt_out, Attempt::Failed(TransportError::Cancelled))
}

pub(crate) fn describe<T>(attempt_out: &Attempt<T>) -> String {
    match attempt_out {
        Attempt::Response { status, .. } => format!("status {}", status),
        Attempt::Failed(e) => e.to_string(),
    }
}

/// Turns the final attempt into the caller's result.
pub(crate) fn finish<T>(attempt_out: Attempt<T>, attempts: u32) -> Result<(T, u32)> {
    match attempt_out {
        Attempt::Response { value, .. } => Ok((value, attempts)),
        Attempt::Failed(e) => Err(Error::Transport(e)),
    }
}
