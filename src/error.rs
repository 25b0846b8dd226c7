use crate::error_code::ErrorCode;
use crate::transport::TransportError;
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Upstream bodies are cut to this many characters before they are carried in errors.
pub const UPSTREAM_BODY_PREVIEW_CHARS: usize = 500;

/// Partial streamed content is cut to this many characters for diagnostics.
pub const STREAM_PREVIEW_CHARS: usize = 100;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Field path that caused the error (e.g., "messages[0].images", "tools")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "chat_translator", "model_mapping")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    fn is_empty(&self) -> bool {
        self.field_path.is_none() && self.details.is_none() && self.source.is_none()
    }
}

/// Which half of a translation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationDirection {
    Request,
    Response,
}

/// Unified error type for the gateway.
///
/// Translation, delivery and configuration faults all end up here so the HTTP
/// boundary can render one stable JSON shape via [`Error::to_body`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Translation error: {message}{}", format_context(.context))]
    Translation {
        message: String,
        direction: TranslationDirection,
        context: ErrorContext,
    },

    #[error("Upstream error: HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Model '{model}' not found")]
    ModelNotFound { model: String },

    #[error("Authentication failed: HTTP {status}: {message}")]
    Authentication { status: u16, message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Request timed out: {message}")]
    Timeout {
        message: String,
        timeout: Option<Duration>,
    },

    #[error("Streaming error: {message}")]
    Streaming {
        message: String,
        chunk_index: Option<usize>,
        partial_len: usize,
        preview: String,
    },

    #[error("Operation '{operation}' is not supported")]
    UnsupportedOperation {
        operation: String,
        reason: Option<String>,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

/// Cuts `s` to at most `max` characters on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::validation_with_context(msg, ErrorContext::new())
    }

    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn translation(
        direction: TranslationDirection,
        msg: impl Into<String>,
        context: ErrorContext,
    ) -> Self {
        Error::Translation {
            message: msg.into(),
            direction,
            context,
        }
    }

    /// Wraps an unexpected lower-level fault raised while translating.
    pub fn translation_fault(
        direction: TranslationDirection,
        operation: &str,
        fault: impl std::fmt::Display,
    ) -> Self {
        Self::translation(
            direction,
            format!("Failed to translate in {}: {}", operation, fault),
            ErrorContext::new().with_source(operation.to_string()),
        )
    }

    /// Builds a streaming fault carrying a preview of what was already delivered.
    pub fn streaming(msg: impl Into<String>, chunk_index: Option<usize>, delivered: &str) -> Self {
        Error::Streaming {
            message: msg.into(),
            chunk_index,
            partial_len: delivered.chars().count(),
            preview: truncate_chars(delivered, STREAM_PREVIEW_CHARS),
        }
    }

    /// Selects the taxonomy member for a non-2xx upstream reply.
    pub fn from_upstream_status(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        let message = truncate_chars(body, UPSTREAM_BODY_PREVIEW_CHARS);
        match ErrorCode::from_http_status(status) {
            ErrorCode::Validation => Error::validation_with_context(
                message,
                ErrorContext::new()
                    .with_source("upstream")
                    .with_details(format!("upstream_status: {}", status)),
            ),
            ErrorCode::Authentication => Error::Authentication { status, message },
            ErrorCode::ModelNotFound => Error::ModelNotFound {
                model: extract_model_hint(body).unwrap_or_else(|| "unknown".to_string()),
            },
            ErrorCode::RateLimited => Error::RateLimit {
                message,
                retry_after,
            },
            ErrorCode::Timeout => Error::Timeout {
                message,
                timeout: None,
            },
            _ => Error::Upstream { status, message },
        }
    }

    /// The stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Configuration { .. } => ErrorCode::Configuration,
            Error::Validation { .. } => ErrorCode::Validation,
            Error::Translation { .. } => ErrorCode::Translation,
            Error::Upstream { status, .. } => match *status {
                400..=499 => ErrorCode::UpstreamClient,
                500..=599 => ErrorCode::UpstreamServer,
                _ => ErrorCode::Upstream,
            },
            Error::ModelNotFound { .. } => ErrorCode::ModelNotFound,
            Error::Authentication { .. } => ErrorCode::Authentication,
            Error::RateLimit { .. } => ErrorCode::RateLimited,
            Error::Timeout { .. } => ErrorCode::Timeout,
            Error::Streaming { .. } => ErrorCode::Streaming,
            Error::UnsupportedOperation { .. } => ErrorCode::UnsupportedOperation,
            Error::Transport(TransportError::CircuitOpen) => ErrorCode::CircuitOpen,
            Error::Transport(TransportError::Timeout(_)) => ErrorCode::Timeout,
            Error::Transport(_) => ErrorCode::Network,
            Error::Serialization(_) | Error::Io(_) => ErrorCode::Internal,
        }
    }

    /// HTTP status to answer the inbound caller with.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Translation {
                direction: TranslationDirection::Response,
                ..
            } => 502,
            // Forward upstream statuses that are meaningful to the caller.
            Error::Upstream { status, .. } if (400..=599).contains(status) => *status,
            Error::Authentication { status, .. } => *status,
            other => other.code().default_status(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.code().retryable()
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Translation { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Message without the category prefix, for the `message` field of the body.
    pub fn message(&self) -> String {
        match self {
            Error::Configuration { message, .. }
            | Error::Validation { message, .. }
            | Error::Translation { message, .. }
            | Error::Upstream { message, .. }
            | Error::Authentication { message, .. }
            | Error::RateLimit { message, .. }
            | Error::Timeout { message, .. }
            | Error::Streaming { message, .. } => message.clone(),
            Error::ModelNotFound { model } => format!("Model '{}' not found", model),
            Error::UnsupportedOperation { operation, reason } => match reason {
                Some(r) => format!("Operation '{}' is not supported: {}", operation, r),
                None => format!("Operation '{}' is not supported", operation),
            },
            Error::Transport(e) => e.to_string(),
            Error::Serialization(e) => e.to_string(),
            Error::Io(e) => e.to_string(),
        }
    }

    /// Renders the structured JSON error body.
    pub fn to_body(&self) -> Value {
        let code = self.code();
        let mut details = Map::new();
        if let Some(ctx) = self.context().filter(|c| !c.is_empty()) {
            if let Some(f) = &ctx.field_path {
                details.insert("field".into(), json!(f));
            }
            if let Some(d) = &ctx.details {
                details.insert("details".into(), json!(d));
            }
            if let Some(s) = &ctx.source {
                details.insert("source".into(), json!(s));
            }
        }
        match self {
            Error::Upstream { status, .. } | Error::Authentication { status, .. } => {
                details.insert("status_code".into(), json!(status));
            }
            Error::ModelNotFound { model } => {
                details.insert("requested_model".into(), json!(model));
            }
            Error::RateLimit {
                retry_after: Some(ra),
                ..
            } => {
                details.insert("retry_after_seconds".into(), json!(ra.as_secs()));
            }
            Error::Timeout {
                timeout: Some(t), ..
            } => {
                details.insert("timeout_seconds".into(), json!(t.as_secs_f64()));
            }
            Error::Streaming {
                chunk_index,
                partial_len,
                preview,
                ..
            } => {
                if let Some(i) = chunk_index {
                    details.insert("chunk_index".into(), json!(i));
                }
                details.insert("partial_response_length".into(), json!(partial_len));
                details.insert("partial_response_preview".into(), json!(preview));
            }
            _ => {}
        }

        json!({
            "error": {
                "type": code.kind(),
                "code": code.code(),
                "message": self.message(),
                "details": Value::Object(details),
            }
        })
    }
}

fn extract_model_hint(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    let err = v.get("error")?;
    err.get("param")
        .or_else(|| err.get("model"))
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_body() {
        let err = Error::validation_with_context(
            "Tool calling is not supported",
            ErrorContext::new().with_field_path("tools"),
        );
        assert_eq!(err.http_status(), 400);
        let body = err.to_body();
        assert_eq!(body["error"]["type"], "validation_error");
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["message"], "Tool calling is not supported");
        assert_eq!(body["error"]["details"]["field"], "tools");
    }

    #[test]
    fn test_from_upstream_status_specializations() {
        assert!(matches!(
            Error::from_upstream_status(400, "bad", None),
            Error::Validation { .. }
        ));
        assert!(matches!(
            Error::from_upstream_status(401, "nope", None),
            Error::Authentication { status: 401, .. }
        ));
        assert!(matches!(
            Error::from_upstream_status(404, "{}", None),
            Error::ModelNotFound { .. }
        ));
        assert!(matches!(
            Error::from_upstream_status(429, "slow down", Some(Duration::from_secs(60))),
            Error::RateLimit {
                retry_after: Some(_),
                ..
            }
        ));
        assert!(matches!(
            Error::from_upstream_status(504, "", None),
            Error::Timeout { .. }
        ));
        let err = Error::from_upstream_status(503, "unavailable", None);
        assert!(matches!(err, Error::Upstream { status: 503, .. }));
        assert_eq!(err.http_status(), 503);
        assert_eq!(err.code(), ErrorCode::UpstreamServer);
    }

    #[test]
    fn test_upstream_body_is_truncated() {
        let body = "x".repeat(2_000);
        match Error::from_upstream_status(500, &body, None) {
            Error::Upstream { message, .. } => {
                assert_eq!(message.len(), UPSTREAM_BODY_PREVIEW_CHARS)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_model_not_found_uses_error_param() {
        let body = r#"{"error":{"message":"no such model","param":"gpt-5"}}"#;
        let err = Error::from_upstream_status(404, body, None);
        assert_eq!(err.message(), "Model 'gpt-5' not found");
        assert_eq!(err.to_body()["error"]["details"]["requested_model"], "gpt-5");
    }

    #[test]
    fn test_streaming_error_preview() {
        let delivered = "x".repeat(200);
        let err = Error::streaming("connection reset", Some(42), &delivered);
        let body = err.to_body();
        assert_eq!(body["error"]["code"], "STREAMING_ERROR");
        assert_eq!(body["error"]["details"]["chunk_index"], 42);
        assert_eq!(body["error"]["details"]["partial_response_length"], 200);
        assert_eq!(
            body["error"]["details"]["partial_response_preview"],
            "x".repeat(100)
        );
    }

    #[test]
    fn test_response_translation_error_is_bad_gateway() {
        let err = Error::translation(
            TranslationDirection::Response,
            "no embedding data",
            ErrorContext::new(),
        );
        assert_eq!(err.http_status(), 502);
        let err = Error::translation_fault(TranslationDirection::Request, "translate_request", "boom");
        assert_eq!(err.http_status(), 400);
        assert!(err.message().contains("Failed to translate in translate_request"));
    }

    #[test]
    fn test_circuit_open_maps_to_service_unavailable() {
        let err = Error::Transport(TransportError::CircuitOpen);
        assert_eq!(err.http_status(), 503);
        assert_eq!(err.to_body()["error"]["type"], "network_error");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
