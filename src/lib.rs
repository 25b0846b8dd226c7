//! # ollama-openai-gateway
//!
//! An Ollama-compatible gateway that serves the Ollama REST API on top of an
//! OpenAI-compatible backend.
//!
//! ## Overview
//!
//! Inbound Ollama requests are translated into OpenAI requests, delivered with
//! bounded retries and a circuit breaker, and the replies are translated back.
//! Streamed replies pass through a per-request state machine that re-frames
//! upstream Server-Sent Events as Ollama NDJSON events.
//!
//! ```text
//! Ollama request → Translator → ResilientClient → upstream
//!                                     │
//! Ollama reply   ← Translator ←───────┘            (single response)
//! NDJSON events  ← StreamBridge ← SseDecoder ←──── (streamed response)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ollama_openai_gateway::{config::GatewayConfig, mapping::ModelMapping, server};
//! use ollama_openai_gateway::client::UpstreamClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> ollama_openai_gateway::Result<()> {
//!     let cfg = GatewayConfig::new("http://localhost:8000", "sk-local")?;
//!     let mapping = Arc::new(ModelMapping::load(cfg.model_mapping_file.as_deref())?);
//!     let upstream = Arc::new(UpstreamClient::from_config(&cfg)?);
//!     let state = server::AppState::new(upstream, mapping, (&cfg).into());
//!
//!     let listener = tokio::net::TcpListener::bind(("0.0.0.0", cfg.port)).await?;
//!     axum::serve(listener, server::router(state)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Process configuration from the environment |
//! | [`mapping`] | Bidirectional model name mapping |
//! | [`options`] | Generation option normalization |
//! | [`types`] | Request and response bodies of both dialects |
//! | [`translate`] | Chat and embeddings translators |
//! | [`pipeline`] | SSE decoding, the streaming bridge, NDJSON encoding |
//! | [`resilience`] | Circuit breaker and retry policy |
//! | [`transport`] | Pooled HTTP transport |
//! | [`client`] | Resilient upstream client |
//! | [`catalog`] | Model listing, show and version |
//! | [`server`] | axum routes |

pub mod catalog;
pub mod client;
pub mod config;
pub mod error_code;
pub mod logging;
pub mod mapping;
pub mod options;
pub mod pipeline;
pub mod resilience;
pub mod server;
pub mod translate;
pub mod transport;
pub mod types;
pub mod utils;

pub use client::{ResilientClient, Upstream, UpstreamClient};
pub use config::GatewayConfig;
pub use mapping::ModelMapping;
pub use translate::{ChatTranslator, EmbeddingsTranslator, Translator};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
