//! Embeddings translation.
//!
//! Both inbound forms go upstream as a list `input` with float encoding. The
//! batch form answers with one vector per input in upstream index order; the
//! deprecated singular form always exposes the first vector only.

use super::{Translator, TranslatorSettings, SYNTHETIC_TOTAL_DURATION_NS};
use crate::error::TranslationDirection;
use crate::mapping::ModelMapping;
use crate::types::{
    EmbedResponse, EmbeddingRequest, EmbeddingResponse, EmbeddingsResponse, InboundEmbedRequest,
    InboundEmbedResponse,
};
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;

pub struct EmbeddingsTranslator {
    mapping: Arc<ModelMapping>,
    settings: TranslatorSettings,
}

impl EmbeddingsTranslator {
    pub fn new(mapping: Arc<ModelMapping>, settings: TranslatorSettings) -> Self {
        Self { mapping, settings }
    }
}

impl Translator for EmbeddingsTranslator {
    type Request = InboundEmbedRequest;
    type UpstreamRequest = EmbeddingRequest;
    type UpstreamResponse = EmbeddingResponse;
    type Response = InboundEmbedResponse;
    type StreamState = ();

    fn translate_request(&self, request: &InboundEmbedRequest) -> Result<EmbeddingRequest> {
        if request.model().trim().is_empty() {
            return Err(Error::validation_with_context(
                "Model name cannot be empty",
                ErrorContext::new()
                    .with_field_path("model")
                    .with_source("embeddings_translator"),
            ));
        }
        let input = match request {
            InboundEmbedRequest::Batch(r) => r.input.clone().into_vec(),
            InboundEmbedRequest::Legacy(r) => vec![r.prompt.clone()],
        };
        if input.is_empty() {
            return Err(Error::validation_with_context(
                "Input cannot be empty",
                ErrorContext::new()
                    .with_field_path("input")
                    .with_source("embeddings_translator"),
            ));
        }
        Ok(EmbeddingRequest {
            model: self.map_model_name(request.model()),
            input,
            encoding_format: "float".to_string(),
        })
    }

    fn translate_response(
        &self,
        response: &EmbeddingResponse,
        original: &InboundEmbedRequest,
    ) -> Result<InboundEmbedResponse> {
        if response.data.is_empty() {
            return Err(Error::translation(
                TranslationDirection::Response,
                "Upstream returned no embedding data",
                ErrorContext::new()
                    .with_field_path("data")
                    .with_source("embeddings_translator"),
            ));
        }

        let mut data: Vec<_> = response.data.iter().collect();
        data.sort_by_key(|d| d.index);

        Ok(match original {
            InboundEmbedRequest::Batch(r) => InboundEmbedResponse::Batch(EmbedResponse {
                model: r.model.clone(),
                embeddings: data.into_iter().map(|d| d.embedding.clone()).collect(),
                total_duration: (self.settings.synthesize_timings && response.usage.is_some())
                    .then_some(SYNTHETIC_TOTAL_DURATION_NS),
                prompt_eval_count: response.usage.map(|u| u.prompt_tokens),
            }),
            InboundEmbedRequest::Legacy(_) => InboundEmbedResponse::Legacy(EmbeddingsResponse {
                embedding: data[0].embedding.clone(),
            }),
        })
    }

    fn translate_streaming_response(
        &self,
        _raw: &str,
        _original: &InboundEmbedRequest,
        _state: &mut (),
        _is_first: bool,
        _is_last: bool,
    ) -> Result<Option<InboundEmbedResponse>> {
        // Embeddings never stream.
        Ok(None)
    }

    fn map_model_name(&self, name: &str) -> String {
        self.mapping.map(name).to_string()
    }

    fn reverse_map_model_name(&self, name: &str) -> String {
        self.mapping.reverse(name).to_string()
    }
}
