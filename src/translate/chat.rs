//! Generation and chat translation.
//!
//! `/api/generate` is turned into a one- or two-message conversation
//! (optional system message, then the prompt as a user message). `/api/chat`
//! history is flattened message by message. Both go to `/chat/completions`.

use super::{multimodal, now_rfc3339, tools, Translator, TranslatorSettings, SYNTHETIC_TOTAL_DURATION_NS};
use crate::mapping::ModelMapping;
use crate::utils::ToolCallAssembler;
use crate::types::{
    ChatCompletion, ChatCompletionChunk, ChatCompletionRequest, ChatMessage, ChatResponse,
    GenerateResponse, InboundRequest, InboundResponse, InboundToolCall, Metrics, MessageContent,
    ResponseMessage, Role, UpstreamMessage, UpstreamRole, Usage,
};
use crate::{Error, ErrorContext, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Literal payload that ends an upstream SSE stream.
pub const STREAM_SENTINEL: &str = "[DONE]";

/// Reason reported when the upstream does not supply one.
pub const DEFAULT_DONE_REASON: &str = "stop";

/// One classified upstream stream payload.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPayload {
    /// The `[DONE]` sentinel.
    Sentinel,
    /// Valid JSON, parsed leniently. A payload without the expected choice
    /// structure becomes an empty chunk.
    Chunk(ChatCompletionChunk),
    /// Not JSON at all.
    Malformed,
}

/// Classifies `raw`; `None` for an empty payload.
pub fn parse_stream_payload(raw: &str) -> Option<StreamPayload> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw == STREAM_SENTINEL {
        return Some(StreamPayload::Sentinel);
    }
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return Some(StreamPayload::Malformed),
    };
    let chunk = match serde_json::from_value::<ChatCompletionChunk>(value) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!(error = %e, "stream payload has no usable choices, treating as empty");
            ChatCompletionChunk::default()
        }
    };
    Some(StreamPayload::Chunk(chunk))
}

/// Tool-call deltas and usage gathered across one streamed reply.
#[derive(Debug, Default)]
pub struct ChatStreamState {
    tool_calls: ToolCallAssembler,
    usage: Option<Usage>,
}

impl ChatStreamState {
    fn take_tool_calls(&mut self) -> Vec<InboundToolCall> {
        std::mem::take(&mut self.tool_calls).finalize()
    }
}

pub struct ChatTranslator {
    mapping: Arc<ModelMapping>,
    settings: TranslatorSettings,
}

impl ChatTranslator {
    pub fn new(mapping: Arc<ModelMapping>, settings: TranslatorSettings) -> Self {
        Self { mapping, settings }
    }

    pub fn settings(&self) -> TranslatorSettings {
        self.settings
    }

    fn validate(&self, request: &InboundRequest) -> Result<()> {
        if request.model().trim().is_empty() {
            return Err(Error::validation_with_context(
                "Model name cannot be empty",
                ErrorContext::new()
                    .with_field_path("model")
                    .with_source("chat_translator"),
            ));
        }
        match request {
            InboundRequest::Generate(r) => {
                if !r.images.is_empty() && !self.settings.enable_images {
                    return Err(unsupported("images", "Image input is not supported"));
                }
            }
            InboundRequest::Chat(r) => {
                if r.messages.is_empty() {
                    return Err(Error::validation_with_context(
                        "Messages cannot be empty",
                        ErrorContext::new()
                            .with_field_path("messages")
                            .with_source("chat_translator"),
                    ));
                }
                if !self.settings.enable_tools && r.tools.as_ref().is_some_and(|t| !t.is_empty()) {
                    return Err(unsupported("tools", "Tool calling is not supported"));
                }
                if !self.settings.enable_images {
                    if let Some(i) = r.messages.iter().position(|m| !m.images.is_empty()) {
                        return Err(unsupported(
                            &format!("messages[{}].images", i),
                            "Image input is not supported",
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn generate_messages(&self, system: Option<&str>, prompt: &str, images: &[Value]) -> Vec<UpstreamMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system.filter(|s| !s.is_empty()) {
            messages.push(UpstreamMessage::text(UpstreamRole::System, system));
        }
        messages.push(UpstreamMessage::new(
            UpstreamRole::User,
            multimodal::build_content(prompt, images),
        ));
        messages
    }

    fn chat_messages(&self, history: &[ChatMessage]) -> Vec<UpstreamMessage> {
        let mut out: Vec<UpstreamMessage> = Vec::with_capacity(history.len());
        for msg in history {
            let role = match msg.role {
                Role::System => UpstreamRole::System,
                Role::User => UpstreamRole::User,
                Role::Assistant => UpstreamRole::Assistant,
                Role::Tool => UpstreamRole::Tool,
                Role::Unknown => {
                    warn!("unknown message role, sending as user");
                    UpstreamRole::User
                }
            };
            let content = match role {
                UpstreamRole::User => multimodal::build_content(&msg.content, &msg.images),
                _ => MessageContent::Text(msg.content.clone()),
            };
            let mut upstream = UpstreamMessage::new(role, content);
            if role == UpstreamRole::Assistant && !msg.tool_calls.is_empty() {
                upstream.tool_calls = Some(tools::to_upstream_calls(&msg.tool_calls));
            }
            if role == UpstreamRole::Tool {
                upstream.tool_call_id = find_tool_call_id(&out, msg.tool_name.as_deref());
                upstream.name = msg.tool_name.clone();
            }
            out.push(upstream);
        }
        out
    }

    /// Counts from `usage`, plus the placeholder duration when enabled.
    fn metrics(&self, usage: Option<&Usage>) -> Metrics {
        let Some(usage) = usage else {
            return Metrics::default();
        };
        Metrics {
            prompt_eval_count: Some(usage.prompt_tokens),
            eval_count: Some(usage.completion_tokens),
            total_duration: self
                .settings
                .synthesize_timings
                .then_some(SYNTHETIC_TOTAL_DURATION_NS),
            ..Default::default()
        }
    }

    /// Builds an inbound reply of the shape matching `original`.
    fn build_event(
        &self,
        original: &InboundRequest,
        text: String,
        done: bool,
        done_reason: Option<String>,
        tool_calls: Vec<InboundToolCall>,
        metrics: Metrics,
    ) -> InboundResponse {
        let model = original.model().to_string();
        let created_at = now_rfc3339();
        match original {
            InboundRequest::Generate(_) => InboundResponse::Generate(GenerateResponse {
                model,
                created_at,
                response: text,
                done,
                done_reason,
                context: None,
                metrics,
            }),
            InboundRequest::Chat(_) => InboundResponse::Chat(ChatResponse {
                model,
                created_at,
                message: ResponseMessage {
                    tool_calls,
                    ..ResponseMessage::assistant(text)
                },
                done,
                done_reason,
                metrics,
            }),
        }
    }

    fn terminal_event(&self, original: &InboundRequest, state: &mut ChatStreamState) -> InboundResponse {
        self.build_event(
            original,
            String::new(),
            true,
            Some(DEFAULT_DONE_REASON.to_string()),
            state.take_tool_calls(),
            self.metrics(state.usage.as_ref()),
        )
    }

    /// Event for one parsed chunk. `force_done` closes the stream even without a
    /// finish reason.
    fn chunk_event(
        &self,
        chunk: &ChatCompletionChunk,
        original: &InboundRequest,
        state: &mut ChatStreamState,
        force_done: bool,
    ) -> InboundResponse {
        if chunk.usage.is_some() {
            state.usage = chunk.usage;
        }
        let choice = chunk.choices.first();
        if let Some(deltas) = choice.and_then(|c| c.delta.tool_calls.as_ref()) {
            deltas.iter().for_each(|d| state.tool_calls.on_delta(d));
        }
        let text = choice
            .and_then(|c| c.delta.content.clone())
            .unwrap_or_default();
        let finish = choice.and_then(|c| c.finish_reason.clone());

        if finish.is_some() || force_done {
            let reason = finish.unwrap_or_else(|| DEFAULT_DONE_REASON.to_string());
            self.build_event(
                original,
                text,
                true,
                Some(reason),
                state.take_tool_calls(),
                self.metrics(state.usage.as_ref()),
            )
        } else {
            self.build_event(original, text, false, None, Vec::new(), Metrics::default())
        }
    }
}

fn unsupported(field: &str, message: &str) -> Error {
    warn!(feature = field, "rejecting request with disabled feature");
    Error::validation_with_context(
        message,
        ErrorContext::new()
            .with_field_path(field.to_string())
            .with_details(format!("unsupported_feature: {}", field))
            .with_source("chat_translator"),
    )
}

/// Links a tool result to the most recent matching assistant tool call.
fn find_tool_call_id(previous: &[UpstreamMessage], tool_name: Option<&str>) -> Option<String> {
    let calls = previous
        .iter()
        .rev()
        .find_map(|m| m.tool_calls.as_ref().filter(|c| !c.is_empty()))?;
    let matched = tool_name.and_then(|name| calls.iter().rev().find(|c| c.function.name == name));
    matched.or_else(|| calls.last()).map(|c| c.id.clone())
}

fn response_format(format: Option<&Value>) -> Option<Value> {
    match format? {
        Value::String(s) if s == "json" => Some(json!({"type": "json_object"})),
        Value::Object(schema) => Some(json!({
            "type": "json_schema",
            "json_schema": {"name": "response", "schema": schema}
        })),
        _ => None,
    }
}

impl Translator for ChatTranslator {
    type Request = InboundRequest;
    type UpstreamRequest = ChatCompletionRequest;
    type UpstreamResponse = ChatCompletion;
    type Response = InboundResponse;
    type StreamState = ChatStreamState;

    fn translate_request(&self, request: &InboundRequest) -> Result<ChatCompletionRequest> {
        self.validate(request)?;

        let (messages, tools, format) = match request {
            InboundRequest::Generate(r) => {
                if r.template.is_some() || r.context.is_some() || r.raw {
                    debug!("ignoring template/context/raw on generate request");
                }
                (
                    self.generate_messages(r.system.as_deref(), &r.prompt, &r.images),
                    None,
                    r.format.as_ref(),
                )
            }
            InboundRequest::Chat(r) => {
                let tools = r
                    .tools
                    .as_deref()
                    .map(tools::normalize_tools)
                    .filter(|t| !t.is_empty());
                (self.chat_messages(&r.messages), tools, r.format.as_ref())
            }
        };

        Ok(ChatCompletionRequest {
            model: self.map_model_name(request.model()),
            messages,
            sampling: request
                .options()
                .map(|o| o.to_upstream())
                .unwrap_or_default(),
            stream: request.stream(),
            stream_options: None,
            tools,
            response_format: response_format(format),
        })
    }

    fn translate_response(
        &self,
        response: &ChatCompletion,
        original: &InboundRequest,
    ) -> Result<InboundResponse> {
        let choice = response.choices.first();
        let text = choice
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        let tool_calls = choice
            .map(|c| {
                tools::to_inbound_calls(
                    c.message.tool_calls.as_deref(),
                    c.message.function_call.as_ref(),
                )
            })
            .unwrap_or_default();
        let done_reason = choice
            .and_then(|c| c.finish_reason.clone())
            .unwrap_or_else(|| DEFAULT_DONE_REASON.to_string());

        Ok(self.build_event(
            original,
            text,
            true,
            Some(done_reason),
            tool_calls,
            self.metrics(response.usage.as_ref()),
        ))
    }

    fn translate_streaming_response(
        &self,
        raw: &str,
        original: &InboundRequest,
        state: &mut ChatStreamState,
        is_first: bool,
        is_last: bool,
    ) -> Result<Option<InboundResponse>> {
        if is_first {
            debug!(model = original.model(), "first upstream stream payload");
        }
        match parse_stream_payload(raw) {
            Some(StreamPayload::Sentinel) => Ok(Some(self.terminal_event(original, state))),
            Some(StreamPayload::Chunk(chunk)) => {
                Ok(Some(self.chunk_event(&chunk, original, state, is_last)))
            }
            Some(StreamPayload::Malformed) => {
                warn!(
                    preview = %crate::error::truncate_chars(raw, crate::error::STREAM_PREVIEW_CHARS),
                    "skipping malformed stream payload"
                );
                Ok(is_last.then(|| self.terminal_event(original, state)))
            }
            None => Ok(is_last.then(|| self.terminal_event(original, state))),
        }
    }

    fn map_model_name(&self, name: &str) -> String {
        self.mapping.map(name).to_string()
    }

    fn reverse_map_model_name(&self, name: &str) -> String {
        self.mapping.reverse(name).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::types::{ChatRequest, Choice, ChoiceMessage, ContentPart, GenerateRequest};

    fn translator() -> ChatTranslator {
        ChatTranslator::new(
            Arc::new(ModelMapping::with_overrides([("llama2", "gpt-3.5-turbo")])),
            TranslatorSettings::default(),
        )
    }

    fn completion(text: &str, usage: Option<Usage>) -> ChatCompletion {
        ChatCompletion {
            model: "gpt-3.5-turbo".into(),
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage {
                    role: Some("assistant".into()),
                    content: Some(text.into()),
                    ..Default::default()
                },
                finish_reason: Some("stop".into()),
            }],
            usage,
            ..Default::default()
        }
    }

    #[test]
    fn test_generate_scenario() {
        let t = translator();
        let req = InboundRequest::Generate(GenerateRequest::new("llama2", "Hi"));
        let upstream = t.translate_request(&req).unwrap();
        assert_eq!(upstream.model, "gpt-3.5-turbo");
        assert_eq!(upstream.messages.len(), 1);
        assert!(!upstream.stream);

        let resp = t
            .translate_response(
                &completion(
                    "Hello!",
                    Some(Usage {
                        prompt_tokens: 10,
                        completion_tokens: 5,
                        total_tokens: 15,
                    }),
                ),
                &req,
            )
            .unwrap();
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["model"], "llama2");
        assert_eq!(v["response"], "Hello!");
        assert_eq!(v["done"], true);
        assert_eq!(v["done_reason"], "stop");
        assert_eq!(v["prompt_eval_count"], 10);
        assert_eq!(v["eval_count"], 5);
        assert!(v.get("total_duration").is_none());
    }

    #[test]
    fn test_system_prompt_becomes_first_message() {
        let mut req = GenerateRequest::new("phi3", "Why is the sky blue?");
        req.system = Some("Be brief".into());
        req.options = Some(Options {
            temperature: Some(0.2),
            ..Default::default()
        });
        let upstream = translator()
            .translate_request(&InboundRequest::Generate(req))
            .unwrap();
        assert_eq!(upstream.model, "phi3");
        assert_eq!(upstream.messages[0].role, UpstreamRole::System);
        assert_eq!(upstream.messages[1].role, UpstreamRole::User);
        assert_eq!(upstream.sampling.temperature, Some(0.2));
    }

    #[test]
    fn test_empty_model_rejected() {
        let err = translator()
            .translate_request(&InboundRequest::Generate(GenerateRequest::new("  ", "Hi")))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(err.message(), "Model name cannot be empty");
    }

    #[test]
    fn test_disabled_tools_name_the_feature() {
        let t = ChatTranslator::new(
            Arc::new(ModelMapping::identity()),
            TranslatorSettings {
                enable_tools: false,
                ..Default::default()
            },
        );
        let mut req = ChatRequest::new("m", vec![ChatMessage::user("hi")]);
        req.tools = Some(vec![json!({"name": "f"})]);
        let err = t.translate_request(&InboundRequest::Chat(req)).unwrap_err();
        assert_eq!(err.context().unwrap().field_path.as_deref(), Some("tools"));
        assert!(err.message().contains("Tool calling is not supported"));
    }

    #[test]
    fn test_chat_history_and_unknown_role() {
        let mut narrator = ChatMessage::user("once upon a time");
        narrator.role = Role::Unknown;
        let req = ChatRequest::new(
            "m",
            vec![
                ChatMessage::system("sys"),
                ChatMessage::user("Hello"),
                ChatMessage::assistant("Hi there!"),
                narrator,
                ChatMessage::user("look").with_images(vec![json!("abc123")]),
            ],
        );
        let upstream = translator()
            .translate_request(&InboundRequest::Chat(req))
            .unwrap();
        assert_eq!(upstream.messages.len(), 5);
        assert_eq!(upstream.messages[3].role, UpstreamRole::User);
        match &upstream.messages[4].content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0], ContentPart::text("look"));
            }
            other => panic!("expected parts, got {other:?}"),
        }
    }

    #[test]
    fn test_tool_result_linked_to_call() {
        let mut assistant = ChatMessage::assistant("");
        assistant.tool_calls = vec![InboundToolCall {
            id: Some("call_9".into()),
            function: crate::types::InboundFunctionCall {
                name: "get_weather".into(),
                arguments: json!({"location": "Paris"}),
            },
        }];
        let mut result = ChatMessage::new(Role::Tool, "sunny");
        result.tool_name = Some("get_weather".into());
        let req = ChatRequest::new("m", vec![ChatMessage::user("weather?"), assistant, result]);
        let upstream = translator()
            .translate_request(&InboundRequest::Chat(req))
            .unwrap();
        assert_eq!(upstream.messages[2].tool_call_id.as_deref(), Some("call_9"));
        let calls = upstream.messages[1].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.arguments, r#"{"location":"Paris"}"#);
    }

    #[test]
    fn test_json_format_maps_to_response_format() {
        let mut req = GenerateRequest::new("m", "list colors");
        req.format = Some(json!("json"));
        let upstream = translator()
            .translate_request(&InboundRequest::Generate(req))
            .unwrap();
        assert_eq!(upstream.response_format, Some(json!({"type": "json_object"})));
    }

    #[test]
    fn test_no_choices_gives_empty_text() {
        let req = InboundRequest::Chat(ChatRequest::new("m", vec![ChatMessage::user("hi")]));
        let resp = translator()
            .translate_response(&ChatCompletion::default(), &req)
            .unwrap();
        assert_eq!(resp.text(), "");
        assert!(resp.done());
        assert_eq!(resp.metrics(), &Metrics::default());
    }

    #[test]
    fn test_synthesized_timings() {
        let t = ChatTranslator::new(
            Arc::new(ModelMapping::identity()),
            TranslatorSettings {
                synthesize_timings: true,
                ..Default::default()
            },
        );
        let req = InboundRequest::Generate(GenerateRequest::new("m", "Hi"));
        let with_usage = t
            .translate_response(&completion("x", Some(Usage::default())), &req)
            .unwrap();
        assert_eq!(with_usage.metrics().total_duration, Some(SYNTHETIC_TOTAL_DURATION_NS));
        let without = t.translate_response(&completion("x", None), &req).unwrap();
        assert_eq!(without.metrics().total_duration, None);
    }

    fn stream(t: &ChatTranslator, req: &InboundRequest, state: &mut ChatStreamState, raw: &str) -> Option<InboundResponse> {
        t.translate_streaming_response(raw, req, state, false, false).unwrap()
    }

    #[test]
    fn test_streaming_payloads() {
        let t = translator();
        let req = InboundRequest::Generate(GenerateRequest::new("llama2", "Hi"));
        let mut state = ChatStreamState::default();

        let ev = t
            .translate_streaming_response(
                r#"{"choices":[{"delta":{"content":"Hel"}}]}"#,
                &req,
                &mut state,
                true,
                false,
            )
            .unwrap()
            .unwrap();
        assert_eq!(ev.text(), "Hel");
        assert!(!ev.done());

        let empty = stream(&t, &req, &mut state, r#"{"id":"x"}"#).unwrap();
        assert_eq!(empty.text(), "");
        assert!(!empty.done());

        let fin = stream(&t, &req, &mut state, r#"{"choices":[{"delta":{},"finish_reason":"length"}]}"#).unwrap();
        assert!(fin.done());
        assert_eq!(fin.done_reason(), Some("length"));

        let done = t
            .translate_streaming_response("[DONE]", &req, &mut state, false, true)
            .unwrap()
            .unwrap();
        assert!(done.done());
        assert_eq!(done.done_reason(), Some("stop"));
        assert_eq!(done.text(), "");

        assert!(stream(&t, &req, &mut state, "{not json").is_none());
        assert!(stream(&t, &req, &mut state, "").is_none());
    }

    #[test]
    fn test_chunk_with_odd_metadata_keeps_content() {
        let t = translator();
        let req = InboundRequest::Generate(GenerateRequest::new("llama2", "Hi"));
        let mut state = ChatStreamState::default();

        let ev = stream(
            &t,
            &req,
            &mut state,
            r#"{"id":null,"model":7,"choices":[{"index":0,"delta":{"content":"Hello"}}]}"#,
        )
        .unwrap();
        assert_eq!(ev.text(), "Hello");

        let ev = stream(
            &t,
            &req,
            &mut state,
            r#"{"choices":[{"index":null,"delta":{"role":null,"content":" there"},"finish_reason":null}],"usage":"n/a"}"#,
        )
        .unwrap();
        assert_eq!(ev.text(), " there");
        assert!(!ev.done());

        // Choices that are not a list leave nothing usable.
        let ev = stream(&t, &req, &mut state, r#"{"choices":"oops"}"#).unwrap();
        assert_eq!(ev.text(), "");
    }

    #[test]
    fn test_tool_call_deltas_accumulate_across_chunks() {
        let t = translator();
        let req = InboundRequest::Chat(ChatRequest::new("m", vec![ChatMessage::user("hi")]));
        let mut state = ChatStreamState::default();

        let first = stream(
            &t,
            &req,
            &mut state,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"get_weather","arguments":"{\"city\":"}}]}}]}"#,
        )
        .unwrap();
        assert!(!first.done());
        stream(
            &t,
            &req,
            &mut state,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"Oslo\"}"}}]}}]}"#,
        );
        let last = stream(&t, &req, &mut state, "[DONE]").unwrap();
        match last {
            InboundResponse::Chat(c) => {
                assert_eq!(c.message.tool_calls.len(), 1);
                assert_eq!(c.message.tool_calls[0].id.as_deref(), Some("call_1"));
                assert_eq!(c.message.tool_calls[0].function.arguments, json!({"city": "Oslo"}));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_is_last_forces_terminal() {
        let t = translator();
        let req = InboundRequest::Generate(GenerateRequest::new("llama2", "Hi"));
        let mut state = ChatStreamState::default();
        let ev = t
            .translate_streaming_response("", &req, &mut state, false, true)
            .unwrap()
            .unwrap();
        assert!(ev.done());
        assert_eq!(ev.done_reason(), Some("stop"));
    }
}
