use super::request_id::RequestId;
use super::AppState;
use crate::catalog::ModelCatalog;
use crate::client::CallContext;
use crate::pipeline::{bridge_stream, ndjson_body, SseDecoder, StreamBridge};
use crate::resilience::CircuitState;
use crate::types::{
    ChatRequest, EmbedRequest, EmbeddingsRequest, GenerateRequest, InboundEmbedRequest,
    InboundRequest, ShowRequest,
};
use crate::{Error, ErrorContext, Result};
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Parses a JSON body so malformed input gets the gateway's error shape.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        Error::validation_with_context(
            format!("Invalid request body: {}", e),
            ErrorContext::new().with_source("request_parser"),
        )
    })
}

fn context(id: &RequestId) -> CallContext {
    CallContext::new().with_request_id(id.as_str())
}

pub async fn generate(
    State(state): State<AppState>,
    Extension(id): Extension<RequestId>,
    body: Bytes,
) -> Result<Response> {
    let request: GenerateRequest = parse_body(&body)?;
    complete(state, id, InboundRequest::Generate(request)).await
}

pub async fn chat(
    State(state): State<AppState>,
    Extension(id): Extension<RequestId>,
    body: Bytes,
) -> Result<Response> {
    let request: ChatRequest = parse_body(&body)?;
    complete(state, id, InboundRequest::Chat(request)).await
}

async fn complete(state: AppState, id: RequestId, inbound: InboundRequest) -> Result<Response> {
    let started = Instant::now();
    info!(
        request_id = id.as_str(),
        model = inbound.model(),
        stream = inbound.stream(),
        "completion request"
    );

    let upstream_request = state.chat.translate_request(&inbound)?;
    debug!(
        request_id = id.as_str(),
        options = ?upstream_request.sampling.to_options(),
        "effective generation options"
    );

    if !inbound.stream() {
        let completion = state.upstream.chat(&upstream_request, &context(&id)).await?;
        let response = state.chat.translate_response(&completion, &inbound)?;
        info!(
            request_id = id.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "completion finished"
        );
        return Ok(Json(response).into_response());
    }

    // Dropping the body cancels the upstream read.
    let token = CancellationToken::new();
    let ctx = context(&id).with_cancellation(token.clone());
    let bytes = state.upstream.chat_stream(&upstream_request, &ctx).await?;

    let bridge = StreamBridge::new(state.chat.clone(), inbound);
    let events = bridge_stream(SseDecoder::new().decode(bytes), bridge);
    let guard = token.drop_guard();
    let body = ndjson_body(events).map(move |line| {
        let _ = &guard;
        line
    });
    debug!(request_id = id.as_str(), "streaming response started");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body))
        .map_err(|e| Error::translation_fault(crate::error::TranslationDirection::Response, "stream_response", e))
}

pub async fn embed(
    State(state): State<AppState>,
    Extension(id): Extension<RequestId>,
    body: Bytes,
) -> Result<Response> {
    let request: EmbedRequest = parse_body(&body)?;
    embeddings_common(state, id, InboundEmbedRequest::Batch(request)).await
}

/// Deprecated single-prompt form.
pub async fn embeddings(
    State(state): State<AppState>,
    Extension(id): Extension<RequestId>,
    body: Bytes,
) -> Result<Response> {
    let request: EmbeddingsRequest = parse_body(&body)?;
    embeddings_common(state, id, InboundEmbedRequest::Legacy(request)).await
}

async fn embeddings_common(state: AppState, id: RequestId, inbound: InboundEmbedRequest) -> Result<Response> {
    info!(request_id = id.as_str(), model = inbound.model(), "embeddings request");
    let upstream_request = state.embeddings.translate_request(&inbound)?;
    let upstream = state.upstream.embeddings(&upstream_request, &context(&id)).await?;
    let response = state.embeddings.translate_response(&upstream, &inbound)?;
    Ok(Json(response).into_response())
}

pub async fn tags(State(state): State<AppState>, Extension(id): Extension<RequestId>) -> Result<Response> {
    let list = state.upstream.models(&context(&id)).await?;
    Ok(Json(state.catalog.tags(&list)).into_response())
}

pub async fn show(
    State(state): State<AppState>,
    Extension(id): Extension<RequestId>,
    body: Bytes,
) -> Result<Response> {
    let request: ShowRequest = parse_body(&body)?;
    let list = state.upstream.models(&context(&id)).await?;
    Ok(Json(state.catalog.show(&list, &request)?).into_response())
}

pub async fn version() -> Response {
    Json(ModelCatalog::version()).into_response()
}

pub async fn health(State(state): State<AppState>) -> Response {
    let signals = state.upstream.signals();
    let status = match signals.as_ref().map(|s| s.circuit_breaker.state) {
        Some(CircuitState::Open) | Some(CircuitState::HalfOpen) => "degraded",
        _ => "healthy",
    };
    Json(json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "signals": signals,
    }))
    .into_response()
}

fn not_supported(operation: &str) -> Error {
    Error::UnsupportedOperation {
        operation: operation.to_string(),
        reason: Some("model management is not available through the upstream API".to_string()),
    }
}

pub async fn pull() -> Error {
    not_supported("pull")
}

pub async fn push() -> Error {
    not_supported("push")
}

pub async fn delete() -> Error {
    not_supported("delete")
}

pub async fn create() -> Error {
    not_supported("create")
}

pub async fn copy() -> Error {
    not_supported("copy")
}
