//! # Streaming Pipeline
//!
//! ```text
//! Upstream bytes → SseDecoder → StreamBridge → NDJSON encoder → caller
//!                   (data: …)    (state machine)   (one event per line)
//! ```
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`decode`] | SSE framing to raw `data:` payloads |
//! | [`bridge`] | Per-request state machine emitting Ollama events |
//! | [`encode`] | NDJSON body encoding with in-band error lines |

pub mod bridge;
pub mod decode;
pub mod encode;

pub use bridge::{bridge_stream, BridgeState, StreamBridge};
pub use decode::SseDecoder;
pub use encode::{ndjson_body, ndjson_line};
