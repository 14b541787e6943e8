//! SSE decoding for `streamGenerateContent?alt=sse`.
//!
//! Gemini sends one JSON `GenerateContentResponse` per event:
//!
//! ```text
//! data: {"candidates":[{"content":{"parts":[{"text":"Hi"}],"role":"model"}}]}
//!
//! data: {"candidates":[{"content":{"parts":[{"text":" there"}],"role":"model"}}]}
//! ```
//!
//! Each event is reduced to the text it carries. The fragment stream ends at
//! the first error.

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::error::RelayError;
use crate::gemini::types::StreamPayload;
use crate::relay::model::FragmentStream;

/// Incremental SSE decoder.
///
/// Bytes are buffered until a full line is available so that events (and
/// multi-byte UTF-8 sequences) may be split across network chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning the `data` payloads of every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, RelayError> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = std::str::from_utf8(&raw)
                .map_err(|e| RelayError::Stream(format!("invalid UTF-8 in stream: {e}")))?;
            let line = line.trim_end_matches(['\n', '\r']);

            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Flush a trailing event when the body ends without a blank line.
    pub fn finish(&mut self) -> Result<Option<String>, RelayError> {
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            let line = String::from_utf8(rest)
                .map_err(|e| RelayError::Stream(format!("invalid UTF-8 in stream: {e}")))?;
            // A dispatched event cannot come out of a non-empty line.
            let _ = self.process_line(line.trim_end_matches('\r'));
        }
        Ok(self.dispatch())
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
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
        if field == "data" {
            self.data.push(value.to_string());
        }
        // `event`, `id` and `retry` carry nothing the relay needs.
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        Some(payload)
    }
}

/// Parse one event payload into the text it contributes.
pub fn decode_payload(payload: &str) -> Result<String, RelayError> {
    serde_json::from_str::<StreamPayload>(payload)
        .map_err(|e| RelayError::Decode(e.to_string()))?
        .into_fragment()
}

/// Turn a response body into a stream of fragment texts.
///
/// Empty fragments are passed through; dropping them is the relay's job.
pub fn fragment_stream<S>(byte_stream: S) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut decoder = SseDecoder::new();
        let mut bytes_stream = std::pin::pin!(byte_stream);

        while let Some(chunk) = bytes_stream.next().await {
            let chunk = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield Err(RelayError::Http(e));
                    return;
                }
            };

            let payloads = match decoder.push(&chunk) {
                Ok(p) => p,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            for payload in payloads {
                match decode_payload(&payload) {
                    Ok(text) => yield Ok(text),
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        match decoder.finish() {
            Ok(Some(payload)) => yield decode_payload(&payload),
            Ok(None) => {}
            Err(e) => yield Err(e),
        }
    })
}
