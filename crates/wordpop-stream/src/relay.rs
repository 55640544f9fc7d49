//! Wire contract and connection seam for the background relay channel.
//!
//! A content script injected into an ordinary web page cannot perform
//! cross-origin fetches itself, so it proxies requests over a long-lived
//! message port to a privileged background process. The bus itself lives
//! elsewhere; this module pins down the message shapes and the traits the
//! client uses to reach it, so tests and embedders can supply their own port.

use crate::errors::SseError;
use crate::request::HttpOptions;

/// Default channel name the client connects with.
pub const RELAY_CHANNEL_NAME: &str = "background-fetch";

/// Messages sent from the client to the relay.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RelayOutbound {
    /// Start a request on the client's behalf.
    Open { details: OpenDetails },
    /// Best-effort cancellation of the in-flight request.
    Abort,
}

/// Payload of the `open` instruction.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OpenDetails {
    pub url: String,
    pub options: HttpOptions,
}

/// Transport-level error reported by the relay. Always terminal.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RelayErrorInfo {
    pub message: String,
    pub name: String,
}

/// One message from the relay.
///
/// The relay does not stream incrementally; each message carries one complete
/// response chunk. `error` being present overrides everything else.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RelayInbound {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RelayErrorInfo>,
    pub status: u16,
    pub response: String,
}

/// Opens relay ports. Injected into the client so relayed mode never depends
/// on extension-global state.
#[async_trait::async_trait]
pub trait RelayConnector: Send + Sync {
    /// Connects a fresh port on the named channel.
    async fn connect(&self, channel: &str) -> Result<RelayPort, SseError>;
}

/// A connected relay port, split into its two directions so the receive side
/// can be consumed by the stream task while the send side stays available for
/// the abort path.
pub struct RelayPort {
    pub sender: Box<dyn RelaySender>,
    pub receiver: Box<dyn RelayReceiver>,
}

/// Send half of a relay port.
pub trait RelaySender: Send {
    /// Posts a message. Fails if the port has disconnected.
    fn post(&self, message: &RelayOutbound) -> Result<(), SseError>;
}

/// Receive half of a relay port.
#[async_trait::async_trait]
pub trait RelayReceiver: Send {
    /// Waits for the next relay message; `None` means the port disconnected.
    async fn recv(&mut self) -> Option<RelayInbound>;
}
