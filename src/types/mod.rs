//! # Types Module
//!
//! Strongly typed bodies for both wire dialects.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`inbound`] | Ollama requests and responses (`/api/generate`, `/api/chat`, `/api/embed`, ...) |
//! | [`upstream`] | OpenAI requests and responses (`/chat/completions`, `/embeddings`, `/models`) |
//! | [`tool`] | Tool definitions and tool calls in both shapes |
//!
//! ## Example
//!
//! ```rust
//! use ollama_openai_gateway::types::{ChatMessage, ChatRequest, InboundRequest};
//!
//! let req = ChatRequest::new("llama2", vec![ChatMessage::user("Hello")]);
//! let inbound = InboundRequest::from(req);
//! assert_eq!(inbound.model(), "llama2");
//! ```

pub mod inbound;
pub mod tool;
pub mod upstream;

pub use inbound::{
    ChatMessage, ChatRequest, ChatResponse, EmbedInput, EmbedRequest, EmbedResponse,
    EmbeddingsRequest, EmbeddingsResponse, GenerateRequest, GenerateResponse, InboundEmbedRequest,
    InboundEmbedResponse, InboundRequest, InboundResponse, InboundStreamEvent, Metrics,
    ModelDetails, ModelTag, ResponseMessage, Role, ShowRequest, ShowResponse, TagsResponse,
    VersionResponse,
};
pub use tool::{
    FunctionCall, FunctionCallDelta, FunctionDefinition, InboundFunctionCall, InboundToolCall,
    Tool, ToolCall, ToolCallDelta,
};
pub use upstream::{
    ChatCompletion, ChatCompletionChunk, ChatCompletionRequest, Choice, ChoiceMessage,
    ChunkChoice, ContentPart, Delta, EmbeddingData, EmbeddingRequest, EmbeddingResponse,
    EmbeddingUsage, ImageUrl, MessageContent, ModelList, ModelObject, UpstreamMessage,
    UpstreamRole, Usage,
};
