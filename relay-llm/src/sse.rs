//! Server-sent-events decoding shared by the streaming providers.

use crate::error::{LlmError, Result};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};

/// `(event, data)` pair. A frame with no `event:` line is a `message`.
pub(crate) type SseEvent = (String, String);

/// Decode an SSE byte stream into `(event, data)` pairs.
///
/// Frames are separated by blank lines; multiple `data:` lines within a
/// frame are joined with newlines. Frames carrying neither an event name
/// nor data are skipped; transport errors surface as `LlmError::Http`.
pub(crate) fn decode_sse<S>(bytes_stream: S) -> impl Stream<Item = Result<SseEvent>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    futures_util::stream::unfold(
        (bytes_stream, String::new()),
        |(mut stream, mut buffer)| async move {
            loop {
                if let Some(idx) = buffer.find("\n\n") {
                    let raw = buffer[..idx].to_string();
                    buffer = buffer[idx + 2..].to_string();

                    let mut event = String::new();
                    let mut data_lines = Vec::new();

                    for line in raw.lines() {
                        let line = line.trim_end();
                        if let Some(rest) = line.strip_prefix("event:") {
                            event = rest.trim_start().to_string();
                            continue;
                        }
                        if let Some(rest) = line.strip_prefix("data:") {
                            data_lines.push(rest.trim_start().to_string());
                        }
                    }

                    let data = data_lines.join("\n");
                    if event.is_empty() && data.is_empty() {
                        continue;
                    }
                    if event.is_empty() {
                        event = "message".to_string();
                    }
                    return Some((Ok((event, data)), (stream, buffer)));
                }

                match stream.next().await {
                    Some(Ok(chunk)) => {
                        buffer.push_str(&String::from_utf8_lossy(&chunk));
                        continue;
                    }
                    Some(Err(e)) => {
                        return Some((Err(LlmError::Http(e.to_string())), (stream, buffer)));
                    }
                    None => return None,
                }
            }
        },
    )
}
