//! Server-Sent-Event framing over an HTTP byte stream.

use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use studio_core::error::StreamError;
use studio_core::stream::SseFrame;

/// Boxed stream of decoded frames, as returned by the API client.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<SseFrame, StreamError>> + Send>>;

/// Incremental SSE decoder.
///
/// Bytes are buffered until a full line is available, so frames and UTF-8
/// sequences split across chunk boundaries decode the same as whole ones.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&raw[..newline_pos]);
            let line = line.trim_end_matches('\r').to_string();
            if let Some(frame) = self.line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush whatever is left once the byte stream has ended.
    pub fn finish(mut self) -> Option<SseFrame> {
        if !self.buffer.is_empty() {
            let rest = String::from_utf8_lossy(&self.buffer).into_owned();
            self.buffer.clear();
            let rest = rest.trim_end_matches('\r').to_string();
            if let Some(frame) = self.line(&rest) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            // `retry` and anything unknown
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        if self.event.is_none() && self.data.is_empty() {
            self.id = None;
            return None;
        }
        let frame = SseFrame {
            event: self.event.take().unwrap_or_else(|| "message".to_string()),
            data: std::mem::take(&mut self.data).join("\n"),
            id: self.id.take(),
        };
        Some(frame)
    }
}

/// Decode a stream of byte chunks into SSE frames.
///
/// A transport error ends the stream after yielding it as
/// [`StreamError::Disconnected`].
pub fn sse_frame_stream<S, E>(bytes: S) -> impl Stream<Item = Result<SseFrame, StreamError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        let mut decoder = SseDecoder::new();
        let mut byte_stream = Box::pin(bytes);

        while let Some(result) = byte_stream.next().await {
            let chunk = match result {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield Err(StreamError::Disconnected(e.to_string()));
                    return;
                }
            };
            for frame in decoder.push(&chunk) {
                yield Ok(frame);
            }
        }

        if let Some(frame) = decoder.finish() {
            yield Ok(frame);
        }
    }
}

/// Frames from a streaming reqwest response.
pub fn response_frames(
    response: reqwest::Response,
) -> impl Stream<Item = Result<SseFrame, StreamError>> + Send {
    sse_frame_stream(response.bytes_stream())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&[u8]]) -> Vec<SseFrame> {
        let mut decoder = SseDecoder::new();
        let mut frames: Vec<SseFrame> = chunks.iter().flat_map(|c| decoder.push(c)).collect();
        frames.extend(decoder.finish());
        frames
    }

    #[test]
    fn single_frame() {
        let frames = decode_all(&[b"event: delta\ndata: {\"content\":\"hi\"}\n\n"]);
        assert_eq!(frames, vec![SseFrame::new("delta", r#"{"content":"hi"}"#)]);
    }

    #[test]
    fn frame_split_across_chunks() {
        let frames = decode_all(&[b"event: del", b"ta\nda", b"ta: {\"content\":\"a\"}\n", b"\n"]);
        assert_eq!(frames, vec![SseFrame::new("delta", r#"{"content":"a"}"#)]);
    }

    #[test]
    fn crlf_line_endings() {
        let frames = decode_all(&[b"id: 7\r\nevent: ping\r\ndata: {\"timestamp\":1}\r\n\r\n"]);
        assert_eq!(
            frames,
            vec![SseFrame::new("ping", r#"{"timestamp":1}"#).with_id("7")]
        );
    }

    #[test]
    fn multi_line_data_joined() {
        let frames = decode_all(&[b"event: log\ndata: one\ndata: two\n\n"]);
        assert_eq!(frames[0].data, "one\ntwo");
    }

    #[test]
    fn comments_and_empty_frames_skipped() {
        let frames = decode_all(&[b": keepalive\n\n\nevent: done\ndata: {}\n\n"]);
        assert_eq!(frames, vec![SseFrame::new("done", "{}")]);
    }

    #[test]
    fn missing_event_defaults_to_message() {
        let frames = decode_all(&[b"data: x\n\n"]);
        assert_eq!(frames[0].event, "message");
    }

    #[test]
    fn unterminated_frame_flushed_at_end() {
        let frames = decode_all(&[b"event: done\ndata: {}"]);
        assert_eq!(frames, vec![SseFrame::new("done", "{}")]);
    }

    #[test]
    fn utf8_split_inside_character() {
        let text = "event: delta\ndata: {\"content\":\"héllo\"}\n\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let frames = decode_all(&[&text[..split], &text[split..]]);
        assert_eq!(frames[0].data, r#"{"content":"héllo"}"#);
    }

    #[test]
    fn value_without_space() {
        let frames = decode_all(&[b"event:done\ndata:{}\n\n"]);
        assert_eq!(frames, vec![SseFrame::new("done", "{}")]);
    }

    #[tokio::test]
    async fn stream_surfaces_transport_error() {
        let chunks: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"event: delta\ndata: {\"content\":\"a\"}\n\n")),
            Err("reset by peer".to_string()),
            Ok(Bytes::from_static(b"event: done\ndata: {}\n\n")),
        ];
        let items: Vec<_> = sse_frame_stream(futures::stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(&items[1], Err(StreamError::Disconnected(msg)) if msg == "reset by peer"));
    }
}
