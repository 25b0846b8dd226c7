//! # Translation
//!
//! Converters between the Ollama dialect and the OpenAI dialect. Every
//! converter implements [`Translator`]; callers hold it as a trait object.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`chat`] | `/api/generate` and `/api/chat` ↔ `/chat/completions` |
//! | [`embeddings`] | `/api/embed` and `/api/embeddings` ↔ `/embeddings` |
//! | [`multimodal`] | Image attachments to content parts |
//! | [`tools`] | Tool definitions and tool calls |
//!
//! Translators are stateless per call. A failed `translate_request` produces
//! nothing; there is no partially translated request.

pub mod chat;
pub mod embeddings;
pub mod multimodal;
pub mod tools;

use crate::config::GatewayConfig;
use crate::types::{
    ChatCompletion, ChatCompletionRequest, EmbeddingRequest, EmbeddingResponse,
    InboundEmbedRequest, InboundEmbedResponse, InboundRequest, InboundResponse,
};
use crate::Result;
use std::sync::Arc;

pub use chat::{ChatStreamState, ChatTranslator};
pub use embeddings::EmbeddingsTranslator;

/// Shared translation contract.
pub trait Translator: Send + Sync {
    type Request;
    type UpstreamRequest;
    type UpstreamResponse;
    type Response;
    /// Per-stream state carried between payloads of one streamed reply.
    type StreamState: Default + Send;

    /// Validates `request` and builds a fresh upstream request.
    fn translate_request(&self, request: &Self::Request) -> Result<Self::UpstreamRequest>;

    /// Converts a single upstream reply back, given the request that caused it.
    fn translate_response(
        &self,
        response: &Self::UpstreamResponse,
        original: &Self::Request,
    ) -> Result<Self::Response>;

    /// Converts one raw upstream stream payload (the text after `data: `).
    /// `Ok(None)` means nothing is emitted for this payload. `is_last` forces a
    /// terminal event.
    fn translate_streaming_response(
        &self,
        raw: &str,
        original: &Self::Request,
        state: &mut Self::StreamState,
        is_first: bool,
        is_last: bool,
    ) -> Result<Option<Self::Response>>;

    fn map_model_name(&self, name: &str) -> String;

    fn reverse_map_model_name(&self, name: &str) -> String;
}

pub type DynChatTranslator = Arc<
    dyn Translator<
        Request = InboundRequest,
        UpstreamRequest = ChatCompletionRequest,
        UpstreamResponse = ChatCompletion,
        Response = InboundResponse,
        StreamState = ChatStreamState,
    >,
>;

pub type DynEmbeddingsTranslator = Arc<
    dyn Translator<
        Request = InboundEmbedRequest,
        UpstreamRequest = EmbeddingRequest,
        UpstreamResponse = EmbeddingResponse,
        Response = InboundEmbedResponse,
        StreamState = (),
    >,
>;

/// Feature switches shared by the translators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslatorSettings {
    pub enable_tools: bool,
    pub enable_images: bool,
    /// Fill a placeholder `total_duration` when usage is reported without timing.
    pub synthesize_timings: bool,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            enable_tools: true,
            enable_images: true,
            synthesize_timings: false,
        }
    }
}

impl From<&GatewayConfig> for TranslatorSettings {
    fn from(cfg: &GatewayConfig) -> Self {
        Self {
            enable_tools: cfg.enable_tools,
            enable_images: cfg.enable_images,
            synthesize_timings: cfg.synthesize_timings,
        }
    }
}

/// Placeholder total duration (1s in nanoseconds) used when timings are synthesized.
pub const SYNTHETIC_TOTAL_DURATION_NS: u64 = 1_000_000_000;

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}
