//! # HTTP Boundary
//!
//! Ollama-compatible routes on top of the translators and the upstream client.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /api/generate` | [`handlers::generate`] |
//! | `POST /api/chat` | [`handlers::chat`] |
//! | `POST /api/embed` | [`handlers::embed`] |
//! | `POST /api/embeddings` | [`handlers::embeddings`] (deprecated form) |
//! | `GET /api/tags` | [`handlers::tags`] |
//! | `POST /api/show` | [`handlers::show`] |
//! | `GET /api/version` | [`handlers::version`] |
//! | `GET /health` | [`handlers::health`] |
//! | `pull` / `push` / `delete` / `create` / `copy` | 501 |
//!
//! Every response carries `X-Request-ID`.

mod error;
pub mod handlers;
pub mod request_id;

use crate::catalog::ModelCatalog;
use crate::client::Upstream;
use crate::mapping::ModelMapping;
use crate::translate::{
    ChatTranslator, DynChatTranslator, DynEmbeddingsTranslator, EmbeddingsTranslator,
    TranslatorSettings,
};
use axum::routing::{delete, get, post};
use axum::{middleware, Router};
use std::sync::Arc;

pub use request_id::{RequestId, REQUEST_ID_HEADER};

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<dyn Upstream>,
    pub chat: DynChatTranslator,
    pub embeddings: DynEmbeddingsTranslator,
    pub catalog: ModelCatalog,
}

impl AppState {
    pub fn new(upstream: Arc<dyn Upstream>, mapping: Arc<ModelMapping>, settings: TranslatorSettings) -> Self {
        let chat: DynChatTranslator = Arc::new(ChatTranslator::new(mapping.clone(), settings));
        Self {
            upstream,
            catalog: ModelCatalog::new(chat.clone()),
            chat,
            embeddings: Arc::new(EmbeddingsTranslator::new(mapping, settings)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/generate", post(handlers::generate))
        .route("/api/chat", post(handlers::chat))
        .route("/api/embed", post(handlers::embed))
        .route("/api/embeddings", post(handlers::embeddings))
        .route("/api/tags", get(handlers::tags))
        .route("/api/show", post(handlers::show))
        .route("/api/version", get(handlers::version))
        .route("/health", get(handlers::health))
        .route("/api/pull", post(handlers::pull))
        .route("/api/push", post(handlers::push))
        .route("/api/delete", delete(handlers::delete))
        .route("/api/create", post(handlers::create))
        .route("/api/copy", post(handlers::copy))
        .layer(middleware::from_fn(request_id::propagate))
        .with_state(state)
}
