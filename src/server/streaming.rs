//! Newline-delimited plain-text streaming.
//!
//! Each relay event becomes one UTF-8 line. Fragments are sent verbatim with
//! a trailing `\n`; a failure becomes the `[ERROR STREAM] ` sentinel line and
//! ends the body. There is no SSE or JSON envelope.

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::relay::engine::RelayEvent;

/// Prefix of the in-band error line.
pub const ERROR_SENTINEL: &str = "[ERROR STREAM] ";

pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// Encode one event as a wire line.
pub fn frame(event: &RelayEvent) -> Bytes {
    match event {
        RelayEvent::Fragment(text) => Bytes::from(format!("{text}\n")),
        RelayEvent::StreamError(description) => {
            Bytes::from(format!("{ERROR_SENTINEL}{description}\n"))
        }
    }
}

/// Convert a relay event stream into body chunks, ending after the first error.
pub fn events_to_lines<S>(events: S) -> impl Stream<Item = Result<Bytes, Infallible>>
where
    S: Stream<Item = RelayEvent>,
{
    let mut errored = false;
    events
        .take_while(move |event| {
            let keep = !errored;
            errored |= matches!(event, RelayEvent::StreamError(_));
            keep
        })
        .map(|event| Ok(frame(&event)))
}

/// Wrap a relay receiver into a `200 text/plain` streaming response.
pub fn text_stream_response(rx: mpsc::Receiver<RelayEvent>, request_id: &str) -> Response {
    let body = Body::from_stream(events_to_lines(ReceiverStream::new(rx)));

    let mut response = (
        [(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF8))],
        body,
    )
        .into_response();

    if let Ok(value) = HeaderValue::from_str(request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static("x-request-id"), value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(events: Vec<RelayEvent>) -> Vec<u8> {
        let chunks: Vec<_> = events_to_lines(tokio_stream::iter(events)).collect().await;
        chunks
            .into_iter()
            .flat_map(|c| c.unwrap().to_vec())
            .collect()
    }

    #[test]
    fn frames_fragment_and_error() {
        assert_eq!(frame(&RelayEvent::Fragment("Hi".into())), "Hi\n");
        assert_eq!(
            frame(&RelayEvent::StreamError("slow".into())),
            "[ERROR STREAM] slow\n"
        );
    }

    #[test]
    fn fragment_with_newline_is_not_escaped() {
        assert_eq!(frame(&RelayEvent::Fragment("a\nb".into())), "a\nb\n");
    }

    #[tokio::test]
    async fn nothing_follows_the_sentinel() {
        let body = body_of(vec![
            RelayEvent::Fragment("one".into()),
            RelayEvent::StreamError("boom".into()),
            RelayEvent::Fragment("two".into()),
        ])
        .await;
        assert_eq!(body, b"one\n[ERROR STREAM] boom\n");
    }

    #[tokio::test]
    async fn empty_stream_is_empty_body() {
        assert!(body_of(vec![]).await.is_empty());
    }
}
