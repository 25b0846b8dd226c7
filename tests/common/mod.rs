//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use ollama_openai_gateway::client::{CallContext, SignalsSnapshot, Upstream};
use ollama_openai_gateway::config::GatewayConfig;
use ollama_openai_gateway::types::{
    ChatCompletion, ChatCompletionRequest, EmbeddingRequest, EmbeddingResponse, ModelList,
};
use ollama_openai_gateway::{BoxStream, Error, Result};
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;

/// Config pointing at `url` with millisecond backoff so retry tests stay fast.
pub fn fast_config(url: &str) -> GatewayConfig {
    GatewayConfig::new(url, "sk-test")
        .unwrap()
        .with_max_retries(3)
        .with_retry_delays(Duration::from_millis(1), Duration::from_millis(5))
        .with_request_timeout(Duration::from_secs(5))
}

pub fn completion_json(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gpt-3.5-turbo",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })
}

pub fn chunk_json(content: Option<&str>, finish: Option<&str>) -> String {
    let delta = match content {
        Some(c) => json!({"content": c}),
        None => json!({}),
    };
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion.chunk",
        "model": "gpt-3.5-turbo",
        "choices": [{"index": 0, "delta": delta, "finish_reason": finish}]
    })
    .to_string()
}

/// SSE body: one `data:` event per payload, then the `[DONE]` sentinel.
pub fn sse_body(payloads: &[String]) -> String {
    let mut body: String = payloads.iter().map(|p| format!("data: {}\n\n", p)).collect();
    body.push_str("data: [DONE]\n\n");
    body
}

/// In-memory [`Upstream`] with canned replies; records chat requests.
#[derive(Default)]
pub struct StubUpstream {
    pub completion: Option<Value>,
    pub sse: Option<String>,
    pub embeddings: Option<Value>,
    pub models: Option<Value>,
    pub fail_status: Option<(u16, String)>,
    pub seen: Mutex<Vec<ChatCompletionRequest>>,
}

impl StubUpstream {
    fn check_failure(&self) -> Result<()> {
        match &self.fail_status {
            Some((status, body)) => Err(Error::from_upstream_status(*status, body, None)),
            None => Ok(()),
        }
    }

    pub fn last_request(&self) -> Option<ChatCompletionRequest> {
        self.seen.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Upstream for StubUpstream {
    async fn chat(&self, request: &ChatCompletionRequest, _ctx: &CallContext) -> Result<ChatCompletion> {
        self.seen.lock().unwrap().push(request.clone());
        self.check_failure()?;
        let body = self.completion.clone().unwrap_or_else(|| completion_json(""));
        Ok(serde_json::from_value(body)?)
    }

    async fn chat_stream(
        &self,
        request: &ChatCompletionRequest,
        _ctx: &CallContext,
    ) -> Result<BoxStream<'static, Bytes>> {
        self.seen.lock().unwrap().push(request.clone());
        self.check_failure()?;
        let body = self.sse.clone().unwrap_or_default();
        // Split at odd offsets so events straddle chunk boundaries.
        let bytes = body.into_bytes();
        let chunks: Vec<Result<Bytes>> = bytes
            .chunks(7)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn embeddings(&self, _request: &EmbeddingRequest, _ctx: &CallContext) -> Result<EmbeddingResponse> {
        self.check_failure()?;
        let body = self
            .embeddings
            .clone()
            .unwrap_or_else(|| json!({"data": [], "model": "embed"}));
        Ok(serde_json::from_value(body)?)
    }

    async fn models(&self, _ctx: &CallContext) -> Result<ModelList> {
        self.check_failure()?;
        let body = self.models.clone().unwrap_or_else(|| json!({"data": []}));
        Ok(serde_json::from_value(body)?)
    }

    fn signals(&self) -> Option<SignalsSnapshot> {
        None
    }
}
