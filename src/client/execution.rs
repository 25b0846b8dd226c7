//! Request execution: the retry loop plus single-attempt streaming and
//! non-streaming execution.

use super::core::{retry_after, RawResponse, ResilientClient, StreamResponse, UpstreamCall};
use super::policy::{self, Attempt, Decision};
use crate::transport::TransportError;
use crate::{BoxStream, Error, Result};
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// What a streaming attempt produced once the retry loop is done with it.
enum StreamStart {
    Accepted {
        first: Option<Bytes>,
        rest: BoxStream<'static, Bytes>,
    },
    Rejected(RawResponse),
}

impl ResilientClient {
    /// Runs `attempt_fn` under the breaker and the retry policy.
    ///
    /// The last outcome is returned unchanged once the policy stops: a final
    /// non-2xx response comes back as `Ok`, a final transport failure as `Err`.
    pub(crate) async fn run_with_retry<T, F, Fut>(&self, call: &UpstreamCall, mut attempt_fn: F) -> Result<(T, u32)>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let mut attempt: u32 = 0;
        let mut last: Option<Attempt<T>> = None;

        loop {
            attempt += 1;
            if call.is_cancelled() {
                return Err(Error::Transport(TransportError::Cancelled));
            }
            // Held across the attempt so a dropped future still returns the slot.
            let permit = match self.breaker.acquire() {
                Ok(permit) => permit,
                Err(rejected) => {
                    warn!(path = %call.path, attempt, "circuit breaker rejected upstream call");
                    return match last {
                        Some(previous) => policy::finish(previous, attempt - 1),
                        None => Err(Error::Transport(rejected)),
                    };
                }
            };

            let start = Instant::now();
            let outcome = match &call.cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => Attempt::Failed(TransportError::Cancelled),
                    out = attempt_fn(attempt) => out,
                },
                None => attempt_fn(attempt).await,
            };

            if policy::is_breaker_failure(&outcome) {
                permit.failure();
            } else if policy::is_cancelled(&outcome) {
                permit.abandon();
            } else {
                permit.success();
            }

            match policy::decide(&self.retry, &outcome, attempt) {
                Decision::Stop => {
                    if let Attempt::Failed(e) = &outcome {
                        if !matches!(e, TransportError::Cancelled) {
                            error!(path = %call.path, attempt, error = %e, "upstream call failed");
                        }
                    }
                    return policy::finish(outcome, attempt);
                }
                Decision::Retry { delay } => {
                    warn!(
                        path = %call.path,
                        attempt,
                        outcome = %policy::describe(&outcome),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        delay_ms = delay.as_millis() as u64,
                        "retrying upstream call"
                    );
                    if !sleep_or_cancel(delay, call.cancel.as_ref()).await {
                        return Err(Error::Transport(TransportError::Cancelled));
                    }
                    last = Some(outcome);
                }
            }
        }
    }

    /// Sends a non-streaming call and reads the whole body.
    ///
    /// Returns the final response even when it is not 2xx; callers convert with
    /// [`RawResponse::into_error`].
    pub async fn send(&self, call: &UpstreamCall) -> Result<RawResponse> {
        let timeout = self.request_timeout;
        let (mut resp, attempts) = self
            .run_with_retry(call, |attempt| async move {
                debug!(path = %call.path, attempt, "sending upstream request");
                let resp = match self
                    .transport
                    .send(
                        call.method.clone(),
                        &call.path,
                        call.body.as_ref(),
                        false,
                        Some(timeout),
                        call.request_id.as_deref(),
                    )
                    .await
                {
                    Ok(r) => r,
                    Err(e) => return Attempt::Failed(e),
                };
                let status = resp.status().as_u16();
                let headers = resp.headers().clone();
                match resp.bytes().await {
                    Ok(body) => Attempt::Response {
                        status,
                        retry_after: retry_after(&headers),
                        value: RawResponse {
                            status,
                            headers,
                            body,
                            attempts: attempt,
                        },
                    },
                    Err(e) => Attempt::Failed(TransportError::from_reqwest(e, Some(timeout))),
                }
            })
            .await?;
        resp.attempts = attempts;
        Ok(resp)
    }

    /// Opens a streaming call.
    ///
    /// Everything up to and including the first body chunk happens inside the
    /// retried attempt, bounded by the request timeout. After that, failures are
    /// yielded as [`Error::Streaming`] items and never retried, and each further
    /// chunk must arrive within the read timeout. A final non-2xx status becomes
    /// the matching taxonomy error.
    pub async fn stream(&self, call: &UpstreamCall) -> Result<StreamResponse> {
        let first_byte_timeout = self.request_timeout;
        let (start, attempts) = self
            .run_with_retry(call, |attempt| async move {
                debug!(path = %call.path, attempt, "opening upstream stream");
                match tokio::time::timeout(first_byte_timeout, self.open_stream(call)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Attempt::Failed(TransportError::Timeout(first_byte_timeout)),
                }
            })
            .await?;

        match start {
            StreamStart::Rejected(raw) => Err(raw.into_error()),
            StreamStart::Accepted { first, rest } => Ok(StreamResponse {
                status: 200,
                attempts,
                body: guarded_body(first, rest, self.read_timeout, call.cancel.clone()),
            }),
        }
    }

    async fn open_stream(&self, call: &UpstreamCall) -> Attempt<StreamStart> {
        let resp = match self
            .transport
            .send(
                call.method.clone(),
                &call.path,
                call.body.as_ref(),
                true,
                None,
                call.request_id.as_deref(),
            )
            .await
        {
            Ok(r) => r,
            Err(e) => return Attempt::Failed(e),
        };

        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        if !resp.status().is_success() {
            return match resp.bytes().await {
                Ok(body) => Attempt::Response {
                    status,
                    retry_after: retry_after(&headers),
                    value: StreamStart::Rejected(RawResponse {
                        status,
                        headers,
                        body,
                        attempts: 0,
                    }),
                },
                Err(e) => Attempt::Failed(TransportError::from_reqwest(e, None)),
            };
        }

        let mut body = resp.bytes_stream();
        let first = match body.next().await {
            Some(Ok(bytes)) => Some(bytes),
            Some(Err(e)) => return Attempt::Failed(TransportError::from_reqwest(e, None)),
            None => None,
        };
        let rest: BoxStream<'static, Bytes> = Box::pin(body.map(|r| {
            r.map_err(|e| Error::Transport(TransportError::from_reqwest(e, None)))
        }));
        Attempt::Response {
            status,
            retry_after: None,
            value: StreamStart::Accepted { first, rest },
        }
    }
}

/// Sleeps for `delay`; returns false if cancelled first.
async fn sleep_or_cancel(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    match cancel {
        Some(token) => tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        },
        None => {
            tokio::time::sleep(delay).await;
            true
        }
    }
}

/// Prepends the first chunk and enforces the per-chunk read timeout and
/// cancellation. The first failure is reported as [`Error::Streaming`] and
/// ends the stream.
fn guarded_body(
    first: Option<Bytes>,
    rest: BoxStream<'static, Bytes>,
    read_timeout: Duration,
    cancel: Option<CancellationToken>,
) -> BoxStream<'static, Bytes> {
    let cancel = cancel.unwrap_or_default();
    let state = (first, rest, cancel, 1usize, false);
    Box::pin(stream::unfold(
        state,
        move |(first, mut rest, cancel, index, ended)| async move {
            if ended {
                return None;
            }
            if let Some(bytes) = first {
                return Some((Ok(bytes), (None, rest, cancel, index, false)));
            }
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(chunk_index = index, "stream cancelled by caller");
                    return None;
                }
                next = tokio::time::timeout(read_timeout, rest.next()) => next,
            };
            match next {
                Ok(Some(Ok(bytes))) => Some((Ok(bytes), (None, rest, cancel, index + 1, false))),
                Ok(None) => None,
                Ok(Some(Err(e))) => {
                    error!(chunk_index = index, error = %e, "upstream stream failed mid-flight");
                    let err = Error::streaming(e.to_string(), Some(index), "");
                    Some((Err(err), (None, rest, cancel, index, true)))
                }
                Err(_) => {
                    error!(chunk_index = index, timeout_ms = read_timeout.as_millis() as u64, "upstream stream stalled");
                    let err = Error::streaming(
                        format!("No data from upstream for {:?}", read_timeout),
                        Some(index),
                        "",
                    );
                    Some((Err(err), (None, rest, cancel, index, true)))
                }
            }
        },
    ))
}
