//! Ollama-dialect request and response bodies.

use super::tool::InboundToolCall;
use crate::options::Options;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_stream() -> bool {
    true
}

/// `POST /api/generate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Base64 images. Kept as raw JSON so malformed entries can be skipped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,
    #[serde(default = "default_stream")]
    pub stream: bool,
    /// `"json"` or a JSON schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<i64>>,
    #[serde(default)]
    pub raw: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<Value>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            images: Vec::new(),
            options: None,
            stream: false,
            format: None,
            template: None,
            context: None,
            raw: false,
            keep_alive: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<InboundToolCall>,
    /// Name of the tool whose result a `tool` message carries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_images(mut self, images: Vec<Value>) -> Self {
        self.images = images;
        self
    }
}

fn null_as_empty<'de, D>(de: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(de)?.unwrap_or_default())
}

/// `POST /api/chat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Raw tool definitions; normalized during translation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,
    #[serde(default = "default_stream")]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<Value>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: None,
            options: None,
            stream: false,
            format: None,
            keep_alive: None,
        }
    }
}

/// The two text-producing request shapes, dispatched once at the translation boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundRequest {
    Generate(GenerateRequest),
    Chat(ChatRequest),
}

impl InboundRequest {
    pub fn model(&self) -> &str {
        match self {
            InboundRequest::Generate(r) => &r.model,
            InboundRequest::Chat(r) => &r.model,
        }
    }

    pub fn stream(&self) -> bool {
        match self {
            InboundRequest::Generate(r) => r.stream,
            InboundRequest::Chat(r) => r.stream,
        }
    }

    pub fn options(&self) -> Option<&Options> {
        match self {
            InboundRequest::Generate(r) => r.options.as_ref(),
            InboundRequest::Chat(r) => r.options.as_ref(),
        }
    }
}

impl From<GenerateRequest> for InboundRequest {
    fn from(r: GenerateRequest) -> Self {
        InboundRequest::Generate(r)
    }
}

impl From<ChatRequest> for InboundRequest {
    fn from(r: ChatRequest) -> Self {
        InboundRequest::Chat(r)
    }
}

/// Token counts and durations (nanoseconds) reported alongside a final answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_duration: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub model: String,
    pub created_at: String,
    pub response: String,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<i64>>,
    #[serde(flatten)]
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<InboundToolCall>,
}

impl ResponseMessage {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub model: String,
    pub created_at: String,
    pub message: ResponseMessage,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    #[serde(flatten)]
    pub metrics: Metrics,
}

/// A translated reply. Streaming events use the same shapes, one per NDJSON line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InboundResponse {
    Generate(GenerateResponse),
    Chat(ChatResponse),
}

pub type InboundStreamEvent = InboundResponse;

impl InboundResponse {
    pub fn model(&self) -> &str {
        match self {
            InboundResponse::Generate(r) => &r.model,
            InboundResponse::Chat(r) => &r.model,
        }
    }

    pub fn done(&self) -> bool {
        match self {
            InboundResponse::Generate(r) => r.done,
            InboundResponse::Chat(r) => r.done,
        }
    }

    pub fn done_reason(&self) -> Option<&str> {
        match self {
            InboundResponse::Generate(r) => r.done_reason.as_deref(),
            InboundResponse::Chat(r) => r.done_reason.as_deref(),
        }
    }

    /// Flat text for generation, `message.content` for chat.
    pub fn text(&self) -> &str {
        match self {
            InboundResponse::Generate(r) => &r.response,
            InboundResponse::Chat(r) => &r.message.content,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        match self {
            InboundResponse::Generate(r) => &r.metrics,
            InboundResponse::Chat(r) => &r.metrics,
        }
    }
}

/// `input` of `/api/embed`: one string or many.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbedInput {
    One(String),
    Many(Vec<String>),
}

impl EmbedInput {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            EmbedInput::One(s) => vec![s],
            EmbedInput::Many(v) => v,
        }
    }
}

/// `POST /api/embed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub model: String,
    pub input: EmbedInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<Value>,
}

/// `POST /api/embeddings` (deprecated singular form)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingsRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<Value>,
}

/// Either embeddings request shape.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEmbedRequest {
    Batch(EmbedRequest),
    Legacy(EmbeddingsRequest),
}

impl InboundEmbedRequest {
    pub fn model(&self) -> &str {
        match self {
            InboundEmbedRequest::Batch(r) => &r.model,
            InboundEmbedRequest::Legacy(r) => &r.model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub model: String,
    pub embeddings: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingsResponse {
    pub embedding: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InboundEmbedResponse {
    Batch(EmbedResponse),
    Legacy(EmbeddingsResponse),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDetails {
    pub format: String,
    pub family: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub families: Option<Vec<String>>,
    pub parameter_size: String,
    pub quantization_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTag {
    pub name: String,
    pub model: String,
    pub modified_at: String,
    pub size: u64,
    pub digest: String,
    pub details: ModelDetails,
}

/// `GET /api/tags`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagsResponse {
    pub models: Vec<ModelTag>,
}

/// `POST /api/show`; older clients send `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowRequest {
    #[serde(alias = "name")]
    pub model: String,
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowResponse {
    pub modelfile: String,
    pub parameters: String,
    pub template: String,
    pub details: ModelDetails,
    pub model_info: Value,
    pub modified_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generate_request_defaults() {
        let req: GenerateRequest =
            serde_json::from_value(json!({"model": "llama2", "prompt": "Hi"})).unwrap();
        assert!(req.stream);
        assert!(req.images.is_empty());
        assert!(!req.raw);
    }

    #[test]
    fn test_unknown_role_and_null_content() {
        let msg: ChatMessage =
            serde_json::from_value(json!({"role": "narrator", "content": null})).unwrap();
        assert_eq!(msg.role, Role::Unknown);
        assert_eq!(msg.content, "");
    }

    #[test]
    fn test_generate_response_omits_absent_metrics() {
        let resp = InboundResponse::Generate(GenerateResponse {
            model: "llama2".into(),
            created_at: "2024-01-01T00:00:00Z".into(),
            response: "Hello!".into(),
            done: true,
            done_reason: Some("stop".into()),
            context: None,
            metrics: Metrics {
                prompt_eval_count: Some(10),
                eval_count: Some(5),
                ..Default::default()
            },
        });
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["prompt_eval_count"], 10);
        assert_eq!(v["eval_count"], 5);
        assert!(v.get("total_duration").is_none());
        assert!(v.get("context").is_none());
    }

    #[test]
    fn test_show_request_accepts_name_alias() {
        let req: ShowRequest = serde_json::from_value(json!({"name": "llama2"})).unwrap();
        assert_eq!(req.model, "llama2");
    }

    #[test]
    fn test_embed_input_forms() {
        let one: EmbedRequest =
            serde_json::from_value(json!({"model": "m", "input": "a"})).unwrap();
        assert_eq!(one.input.into_vec(), vec!["a".to_string()]);
        let many: EmbedRequest =
            serde_json::from_value(json!({"model": "m", "input": ["a", "b"]})).unwrap();
        assert_eq!(many.input.into_vec().len(), 2);
    }
}
