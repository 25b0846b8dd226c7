//! Resilient delivery to the OpenAI-compatible upstream.
//!
//! Every call passes the circuit breaker, then the retry loop. Streaming calls
//! are retried only until the first body byte has arrived; after that a fault
//! is surfaced in-band as a streaming error.
//!
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod core;
mod execution;
mod policy;
pub mod signals;
pub mod upstream;

pub use builder::ResilientClientBuilder;
pub use core::{RawResponse, ResilientClient, StreamResponse, UpstreamCall};
pub use signals::SignalsSnapshot;
pub use upstream::{CallContext, Upstream, UpstreamClient};
