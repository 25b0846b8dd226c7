use super::core::{ResilientClient, UpstreamCall};
use super::signals::SignalsSnapshot;
use crate::config::GatewayConfig;
use crate::types::{ChatCompletion, ChatCompletionRequest, EmbeddingRequest, EmbeddingResponse, ModelList};
use crate::{BoxStream, Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";
pub const EMBEDDINGS_PATH: &str = "/embeddings";
pub const MODELS_PATH: &str = "/models";

/// Per-request metadata carried into upstream calls.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub request_id: Option<String>,
    /// Fires when the downstream client goes away.
    pub cancel: Option<CancellationToken>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// The OpenAI-compatible backend as the server sees it.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn chat(&self, request: &ChatCompletionRequest, ctx: &CallContext) -> Result<ChatCompletion>;

    /// Opens a streaming completion; yields raw SSE bytes.
    async fn chat_stream(
        &self,
        request: &ChatCompletionRequest,
        ctx: &CallContext,
    ) -> Result<BoxStream<'static, Bytes>>;

    async fn embeddings(&self, request: &EmbeddingRequest, ctx: &CallContext) -> Result<EmbeddingResponse>;

    async fn models(&self, ctx: &CallContext) -> Result<ModelList>;

    /// Runtime facts for the health probe, if the implementation has any.
    fn signals(&self) -> Option<SignalsSnapshot> {
        None
    }
}

/// [`Upstream`] over HTTP, with retries and the circuit breaker.
pub struct UpstreamClient {
    client: ResilientClient,
}

impl UpstreamClient {
    pub fn new(client: ResilientClient) -> Self {
        Self { client }
    }

    pub fn from_config(cfg: &GatewayConfig) -> Result<Self> {
        Ok(Self::new(ResilientClient::from_config(cfg)?))
    }

    pub fn inner(&self) -> &ResilientClient {
        &self.client
    }

    fn call<T: Serialize>(path: &str, body: &T, ctx: &CallContext) -> Result<UpstreamCall> {
        Ok(UpstreamCall::post(path, serde_json::to_value(body)?)
            .with_request_id(ctx.request_id.clone())
            .with_cancellation(ctx.cancel.clone()))
    }

    async fn post_json<T, R>(&self, path: &str, body: &T, ctx: &CallContext) -> Result<R>
    where
        T: Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let call = Self::call(path, body, ctx)?;
        let resp = self.client.send(&call).await?;
        debug!(path, status = resp.status, attempts = resp.attempts, "upstream responded");
        if !resp.is_success() {
            let err = resp.into_error();
            error!(path, code = err.code().code(), error = %err, "upstream returned an error");
            return Err(err);
        }
        resp.json()
    }
}

#[async_trait]
impl Upstream for UpstreamClient {
    async fn chat(&self, request: &ChatCompletionRequest, ctx: &CallContext) -> Result<ChatCompletion> {
        self.post_json(CHAT_COMPLETIONS_PATH, request, ctx).await
    }

    async fn chat_stream(
        &self,
        request: &ChatCompletionRequest,
        ctx: &CallContext,
    ) -> Result<BoxStream<'static, Bytes>> {
        let call = Self::call(CHAT_COMPLETIONS_PATH, request, ctx)?;
        match self.client.stream(&call).await {
            Ok(resp) => {
                debug!(attempts = resp.attempts, "upstream stream opened");
                Ok(resp.body)
            }
            Err(err) => {
                if !matches!(err, Error::Transport(crate::transport::TransportError::Cancelled)) {
                    error!(code = err.code().code(), error = %err, "upstream stream failed to open");
                }
                Err(err)
            }
        }
    }

    async fn embeddings(&self, request: &EmbeddingRequest, ctx: &CallContext) -> Result<EmbeddingResponse> {
        self.post_json(EMBEDDINGS_PATH, request, ctx).await
    }

    async fn models(&self, ctx: &CallContext) -> Result<ModelList> {
        let call = UpstreamCall::get(MODELS_PATH)
            .with_request_id(ctx.request_id.clone())
            .with_cancellation(ctx.cancel.clone());
        let resp = self.client.send(&call).await?;
        if !resp.is_success() {
            let err = resp.into_error();
            error!(path = MODELS_PATH, code = err.code().code(), error = %err, "upstream returned an error");
            return Err(err);
        }
        resp.json()
    }

    fn signals(&self) -> Option<SignalsSnapshot> {
        Some(self.client.signals())
    }
}
