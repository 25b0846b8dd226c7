//! Streaming decoder (Bytes -> SSE `data:` payloads)
//!
//! The decoder knows SSE framing only. It does not parse JSON: malformed
//! payloads are passed on so the bridge can log and skip them.

use crate::BoxStream;
use bytes::Bytes;
use futures::{stream, StreamExt};

use crate::translate::chat::STREAM_SENTINEL;

/// Line-oriented SSE decoder:
/// - yields the text after `data:` for every data line
/// - skips blank lines, `:` comments and other SSE fields (`event:`, `id:`, `retry:`)
/// - yields the `[DONE]` sentinel and then ends
#[derive(Debug, Default, Clone, Copy)]
pub struct SseDecoder;

impl SseDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Extracts the payload from one SSE line, if it carries one.
    pub fn payload(line: &str) -> Option<&str> {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            return None;
        }
        line.strip_prefix("data:").map(str::trim)
    }

    pub fn decode(&self, input: BoxStream<'static, Bytes>) -> BoxStream<'static, String> {
        // Bytes are buffered until a newline so multi-byte UTF-8 sequences split
        // across chunks decode correctly.
        let stream = stream::unfold(
            (input, Vec::<u8>::new(), false),
            |(mut input, mut buf, finished)| async move {
                if finished {
                    return None;
                }
                loop {
                    if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = buf.drain(..=pos).collect();
                        let line = String::from_utf8_lossy(&line[..line.len() - 1]);
                        if let Some(payload) = Self::payload(&line) {
                            let done = payload == STREAM_SENTINEL;
                            return Some((Ok(payload.to_string()), (input, buf, done)));
                        }
                        continue;
                    }

                    match input.next().await {
                        Some(Ok(bytes)) => buf.extend_from_slice(&bytes),
                        Some(Err(e)) => return Some((Err(e), (input, buf, true))),
                        None => {
                            // EOF: a final line without a trailing newline.
                            let rest = String::from_utf8_lossy(&buf).into_owned();
                            return Self::payload(&rest)
                                .map(|p| (Ok(p.to_string()), (input, Vec::new(), true)));
                        }
                    }
                }
            },
        );
        Box::pin(stream)
    }
}
