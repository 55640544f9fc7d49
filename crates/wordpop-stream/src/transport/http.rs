//! Direct HTTP transport used by the `Direct` and `DesktopNative` modes.
//!
//! Both modes fetch with the process-native HTTP client; the mode only
//! changes how the request was authorized to happen, which is the embedder's
//! concern, so they share this implementation.

use std::collections::VecDeque;

use futures::StreamExt as _;
use futures::stream;
use tracing::debug;

use crate::context::TransportMode;
use crate::errors::{ErrorPayload, SseError};
use crate::request::HttpOptions;
use crate::sse::SseDecoder;

use super::{Transport, TransportEvent, TransportHandle};

type ByteStream = std::pin::Pin<
    Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>,
>;

pub(crate) struct HttpTransport {
    client: reqwest::Client,
    mode: TransportMode,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, mode: TransportMode) -> Self {
        Self { client, mode }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn open(&self, url: &str, options: &HttpOptions) -> Result<TransportHandle, SseError> {
        let method = reqwest::Method::from_bytes(options.method.as_bytes())
            .map_err(|_| SseError::Config(format!("invalid HTTP method: {}", options.method)))?;

        let mut request = self.client.request(method, url);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| SseError::transport(format!("request failed: {e}")))?;
        let status = response.status().as_u16();
        debug!(mode = %self.mode, url, status, "response headers received");

        // Anything other than exactly 200 is an application-level failure:
        // the whole body is decoded as JSON and handed to the error sink.
        // The byte stream is never entered in that case.
        if status != 200 {
            let body = response
                .text()
                .await
                .map_err(|e| SseError::transport(format!("failed to read error body: {e}")))?;
            let payload = error_payload_from_body(&body)?;
            let single =
                stream::iter([Ok::<_, SseError>(TransportEvent::HttpFailure(payload))]);
            return Ok(TransportHandle {
                stream: Box::pin(single),
                aborter: None,
            });
        }

        let bytes: ByteStream = Box::pin(response.bytes_stream());
        Ok(TransportHandle {
            stream: Box::pin(sse_event_stream(bytes)),
            aborter: None,
        })
    }
}

/// Parses a non-200 body. Malformed JSON is a hard decode error for the
/// caller to catch, never silently swallowed.
fn error_payload_from_body(body: &str) -> Result<ErrorPayload, SseError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| SseError::decode(format!("malformed JSON error body: {e}")))?;
    Ok(ErrorPayload::Json(value))
}

/// Adapts a response byte stream into decoded SSE data payloads.
///
/// Frames without a `data` field (keepalives, bare `event:` lines) are
/// dropped here; everything else is emitted in wire order.
fn sse_event_stream<S, E>(
    bytes: S,
) -> impl futures::Stream<Item = Result<TransportEvent, SseError>> + Send
where
    S: futures::Stream<Item = Result<bytes::Bytes, E>> + Send + Unpin + 'static,
    E: std::fmt::Display + Send + 'static,
{
    struct State<S> {
        bytes: S,
        decoder: SseDecoder,
        pending: VecDeque<String>,
        done: bool,
    }

    stream::try_unfold(
        State {
            bytes,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(data) = state.pending.pop_front() {
                    return Ok(Some((TransportEvent::Message(data), state)));
                }
                if state.done {
                    return Ok(None);
                }

                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        for frame in state.decoder.feed(&chunk) {
                            if let Some(data) = frame.data {
                                state.pending.push_back(data);
                            }
                        }
                    }
                    Some(Err(e)) => {
                        return Err(SseError::transport(format!("stream read failed: {e}")));
                    }
                    None => state.done = true,
                }
            }
        },
    )
}
