//! Streaming chunk bridge.
//!
//! A per-request state machine turning upstream stream payloads into Ollama
//! stream events:
//!
//! ```text
//! NotStarted ──chunk──▶ Streaming ──finish_reason / [DONE] / finish()──▶ Done
//! ```
//!
//! At most one event is emitted per payload, events keep upstream order, and
//! the terminal event (`done: true`) is emitted exactly once and last.

use crate::error::{truncate_chars, STREAM_PREVIEW_CHARS};
use crate::translate::chat::STREAM_SENTINEL;
use crate::translate::{ChatStreamState, DynChatTranslator};
use crate::types::{InboundRequest, InboundStreamEvent};
use crate::{BoxStream, Error, Result};
use futures::{stream, StreamExt};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    NotStarted,
    Streaming,
    Done,
}

pub struct StreamBridge {
    translator: DynChatTranslator,
    original: InboundRequest,
    state: BridgeState,
    cursor: ChatStreamState,
    received: usize,
    delivered_chars: usize,
    delivered_preview: String,
}

impl StreamBridge {
    pub fn new(translator: DynChatTranslator, original: InboundRequest) -> Self {
        Self {
            translator,
            original,
            state: BridgeState::NotStarted,
            cursor: ChatStreamState::default(),
            received: 0,
            delivered_chars: 0,
            delivered_preview: String::new(),
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Number of upstream payloads seen so far.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Feeds one raw payload. Returns the event to emit, if any.
    pub fn push(&mut self, raw: &str) -> Result<Option<InboundStreamEvent>> {
        if self.state == BridgeState::Done {
            debug!("ignoring payload after terminal event");
            return Ok(None);
        }
        self.received += 1;
        let is_first = self.received == 1;
        self.translate(raw, is_first, false)
    }

    /// Closes the stream. Emits a synthetic terminal event unless one was already sent.
    pub fn finish(&mut self) -> Result<Option<InboundStreamEvent>> {
        if self.state == BridgeState::Done {
            return Ok(None);
        }
        debug!("upstream stream ended without a terminal chunk");
        self.translate(STREAM_SENTINEL, self.received == 0, true)
    }

    /// Wraps a mid-stream failure with what was already delivered.
    pub fn fail(&mut self, err: Error) -> Error {
        self.state = BridgeState::Done;
        let message = match err {
            Error::Streaming { message, .. } => message,
            other => other.to_string(),
        };
        Error::Streaming {
            message,
            chunk_index: Some(self.received),
            partial_len: self.delivered_chars,
            preview: self.delivered_preview.clone(),
        }
    }

    fn translate(&mut self, raw: &str, is_first: bool, is_last: bool) -> Result<Option<InboundStreamEvent>> {
        let event = self.translator.translate_streaming_response(
            raw,
            &self.original,
            &mut self.cursor,
            is_first,
            is_last,
        )?;
        if let Some(event) = &event {
            self.state = if event.done() {
                BridgeState::Done
            } else {
                BridgeState::Streaming
            };
            self.record(event.text());
        }
        Ok(event)
    }

    fn record(&mut self, text: &str) {
        self.delivered_chars += text.chars().count();
        let room = STREAM_PREVIEW_CHARS.saturating_sub(self.delivered_preview.chars().count());
        if room > 0 {
            self.delivered_preview.push_str(&truncate_chars(text, room));
        }
    }
}

/// Drives `bridge` over a payload stream.
///
/// Upstream errors end the stream with one [`Error::Streaming`] item; a stream
/// that ends without a terminal chunk gets a synthetic terminal event.
pub fn bridge_stream(
    payloads: BoxStream<'static, String>,
    bridge: StreamBridge,
) -> BoxStream<'static, InboundStreamEvent> {
    let stream = stream::unfold(
        (payloads, bridge, false),
        |(mut payloads, mut bridge, ended)| async move {
            if ended {
                return None;
            }
            loop {
                let step = match payloads.next().await {
                    Some(Ok(raw)) => bridge.push(&raw),
                    Some(Err(e)) => Err(e),
                    None => {
                        return match bridge.finish() {
                            Ok(event) => event.map(|ev| (Ok(ev), (payloads, bridge, true))),
                            Err(e) => {
                                let err = bridge.fail(e);
                                Some((Err(err), (payloads, bridge, true)))
                            }
                        };
                    }
                };
                match step {
                    Ok(Some(event)) => {
                        let done = event.done();
                        return Some((Ok(event), (payloads, bridge, done)));
                    }
                    Ok(None) if bridge.state() == BridgeState::Done => return None,
                    Ok(None) => {}
                    Err(e) => {
                        let err = bridge.fail(e);
                        return Some((Err(err), (payloads, bridge, true)));
                    }
                }
            }
        },
    );
    Box::pin(stream)
}
