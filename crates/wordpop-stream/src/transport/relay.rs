//! Relayed transport for content scripts on ordinary web pages.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream;
use tracing::debug;

use crate::errors::{ErrorPayload, SseError};
use crate::relay::{
    OpenDetails, RelayConnector, RelayOutbound, RelayPort, RelayReceiver, RelaySender,
};
use crate::request::HttpOptions;

use super::{AbortNotifier, Transport, TransportEvent, TransportHandle};

pub(crate) struct RelayTransport {
    connector: Arc<dyn RelayConnector>,
    channel: String,
}

impl RelayTransport {
    pub fn new(connector: Arc<dyn RelayConnector>, channel: impl Into<String>) -> Self {
        Self {
            connector,
            channel: channel.into(),
        }
    }
}

#[async_trait::async_trait]
impl Transport for RelayTransport {
    async fn open(&self, url: &str, options: &HttpOptions) -> Result<TransportHandle, SseError> {
        let RelayPort { sender, receiver } = self.connector.connect(&self.channel).await?;
        sender.post(&RelayOutbound::Open {
            details: OpenDetails {
                url: url.to_string(),
                options: options.clone(),
            },
        })?;
        debug!(channel = %self.channel, url, "relay port opened");

        let disconnected = Arc::new(AtomicBool::new(false));
        let stream = relay_event_stream(receiver, disconnected.clone());
        Ok(TransportHandle {
            stream: Box::pin(stream),
            aborter: Some(Box::new(RelayAborter {
                sender,
                disconnected,
                notified: false,
            })),
        })
    }
}

/// Maps relay envelopes onto transport events.
///
/// An `error` field is always terminal and becomes a stream error (the call
/// rejects); a non-200 status becomes an error-sink payload; a 200 message is
/// one complete chunk, forwarded verbatim. Port disconnect ends the stream
/// with no event at all, so a caller that needs an upper bound must bring its
/// own timeout.
fn relay_event_stream(
    receiver: Box<dyn RelayReceiver>,
    disconnected: Arc<AtomicBool>,
) -> impl futures::Stream<Item = Result<TransportEvent, SseError>> + Send {
    stream::try_unfold(
        (receiver, disconnected),
        |(mut receiver, disconnected)| async move {
            match receiver.recv().await {
                None => {
                    disconnected.store(true, Ordering::SeqCst);
                    Ok(None)
                }
                Some(msg) => {
                    if let Some(err) = msg.error {
                        return Err(SseError::Relay {
                            name: err.name,
                            message: err.message,
                        });
                    }
                    let event = if msg.status != 200 {
                        TransportEvent::HttpFailure(ErrorPayload::Relay {
                            status: msg.status,
                            response: msg.response,
                        })
                    } else {
                        TransportEvent::Message(msg.response)
                    };
                    Ok(Some((event, (receiver, disconnected))))
                }
            }
        },
    )
}

/// Posts the `abort` instruction at most once, and only while the port is
/// still connected. Mirrors detaching the abort listener on disconnect.
struct RelayAborter {
    sender: Box<dyn RelaySender>,
    disconnected: Arc<AtomicBool>,
    notified: bool,
}

impl AbortNotifier for RelayAborter {
    fn notify(&mut self) {
        if self.notified || self.disconnected.load(Ordering::SeqCst) {
            return;
        }
        self.notified = true;
        if let Err(e) = self.sender.post(&RelayOutbound::Abort) {
            debug!(error = %e, "abort notice not delivered");
        }
    }
}
