//! NDJSON encoding of outbound stream events.

use crate::{BoxStream, Error};
use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use tracing::error;

/// One NDJSON line (object followed by `\n`).
pub fn ndjson_line<T: Serialize>(value: &T) -> Result<Bytes, Error> {
    let mut buf = serde_json::to_vec(value)?;
    buf.push(b'\n');
    Ok(Bytes::from(buf))
}

/// Encodes events as NDJSON. The first error becomes a final `{"error": ...}`
/// line and ends the body.
pub fn ndjson_body<T>(events: BoxStream<'static, T>) -> impl Stream<Item = Result<Bytes, Infallible>> + Send
where
    T: Serialize + Send + 'static,
{
    stream::unfold((events, false), |(mut events, ended)| async move {
        if ended {
            return None;
        }
        let item = events.next().await?;
        let (line, stop) = match item.and_then(|ev| ndjson_line(&ev)) {
            Ok(line) => (line, false),
            Err(e) => {
                error!(error = %e, "stream failed after first byte");
                (error_line(&e), true)
            }
        };
        Some((Ok(line), (events, stop)))
    })
}

fn error_line(err: &Error) -> Bytes {
    let mut buf = err.to_body().to_string().into_bytes();
    buf.push(b'\n');
    Bytes::from(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_error_becomes_last_line() {
        let events: BoxStream<'static, Value> = Box::pin(stream::iter(vec![
            Ok(json!({"response": "a", "done": false})),
            Err(Error::streaming("reset", Some(1), "a")),
            Ok(json!({"response": "b", "done": false})),
        ]));
        let lines: Vec<Bytes> = ndjson_body(events)
            .map(|r| match r {
                Ok(b) => b,
                Err(never) => match never {},
            })
            .collect()
            .await;
        assert_eq!(lines.len(), 2);
        assert_eq!(&lines[0][..], b"{\"done\":false,\"response\":\"a\"}\n");
        let err: Value = serde_json::from_slice(&lines[1]).unwrap();
        assert_eq!(err["error"]["code"], "STREAMING_ERROR");
    }
}
