//! Transport strategies behind a single call.
//!
//! A transport turns one request into an ordered stream of already-decoded
//! events. Exactly one transport is opened per call, chosen by the client from
//! the injected execution context.

mod http;
mod relay;

pub(crate) use http::HttpTransport;
pub(crate) use relay::RelayTransport;

use std::pin::Pin;

use crate::errors::{ErrorPayload, SseError};
use crate::request::HttpOptions;

/// Events a transport delivers to the stream task.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TransportEvent {
    /// One decoded text payload, in arrival order.
    Message(String),
    /// Application-level non-200 response.
    HttpFailure(ErrorPayload),
}

pub(crate) type BoxTransportStream =
    Pin<Box<dyn futures::Stream<Item = Result<TransportEvent, SseError>> + Send + 'static>>;

/// Open transport for one request. Dropping the handle releases the
/// underlying connection on every exit path.
pub(crate) struct TransportHandle {
    pub stream: BoxTransportStream,
    /// Cancellation hook for transports that must tell the remote side to
    /// stop (the relay). `None` where dropping the stream is enough.
    pub aborter: Option<Box<dyn AbortNotifier>>,
}

/// Best-effort cancellation notifier. Must be safe to invoke after the
/// transport has already disconnected and must never notify twice.
pub(crate) trait AbortNotifier: Send {
    fn notify(&mut self);
}

#[async_trait::async_trait]
pub(crate) trait Transport: Send + Sync {
    async fn open(&self, url: &str, options: &HttpOptions) -> Result<TransportHandle, SseError>;
}
