//! Streaming SSE fetch client for the WordPop overlay.
//!
//! The overlay's essay and lookup generators need one thing from this crate:
//! issue an HTTP request from whatever context the code happens to be running
//! in (extension page, injected content script, desktop wrapper, userscript)
//! and deliver the response as an ordered sequence of text events, with
//! cooperative cancellation. Transport selection is driven by an injected
//! [`ExecutionContext`], never by ambient environment probing.
//!
//! # Callback usage
//!
//! ```no_run
//! use wordpop_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), SseError> {
//! let client = SseClient::builder()
//!     .context(ExecutionContext::ExtensionPage)
//!     .build()?;
//!
//! let request = StreamRequest::new("https://api.example/gen")
//!     .method("POST")
//!     .header("Content-Type", "application/json")
//!     .json_body(&serde_json::json!({"prompt": "define 'petrichor'"}));
//!
//! client
//!     .stream_fetch(
//!         request,
//!         |data| print!("{data}"),
//!         |payload| eprintln!("request rejected: {payload:?}"),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Event-sequence usage
//!
//! [`SseClient::start_stream`] returns an [`SseStream`] to consume with
//! `next_event()`; `finish()` carries the hard-failure side channel and
//! [`SseStream::abort_handle`] cancels the call.

/// Cancellation handle/signal pair.
pub mod abort;
/// Client entry point, builder, and per-call stream handle.
pub mod client;
/// Execution context descriptor and transport mode selection.
pub mod context;
/// Error taxonomy: hard failures vs. application-level payloads.
pub mod errors;
/// Common imports for typical usage.
pub mod prelude;
/// Relay channel wire contract and connection traits.
pub mod relay;
/// Request shapes.
pub mod request;
/// Incremental SSE frame decoding.
pub mod sse;
/// Public stream events.
pub mod stream;
mod transport;

pub use abort::{AbortHandle, AbortSignal, abort_pair};
pub use client::{SseClient, SseClientBuilder, SseStream};
pub use context::{ExecutionContext, TransportMode};
pub use errors::{ErrorPayload, SseError};
pub use relay::{
    OpenDetails, RELAY_CHANNEL_NAME, RelayConnector, RelayErrorInfo, RelayInbound, RelayOutbound,
    RelayPort, RelayReceiver, RelaySender,
};
pub use request::{HttpOptions, StreamRequest};
pub use sse::{SseDecoder, SseFrame};
pub use stream::StreamEvent;
