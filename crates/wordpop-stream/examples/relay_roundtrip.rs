//! Relayed mode end-to-end against an in-memory background process.
//!
//! The loopback connector stands in for the privileged background script: it
//! accepts the `open` instruction and answers with three complete chunks,
//! then disconnects.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use wordpop_stream::prelude::*;
use wordpop_stream::{
    RelayConnector, RelayInbound, RelayOutbound, RelayPort, RelayReceiver, RelaySender,
};

struct LoopbackConnector;

#[async_trait::async_trait]
impl RelayConnector for LoopbackConnector {
    async fn connect(&self, _channel: &str) -> Result<RelayPort, SseError> {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<RelayOutbound>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<RelayInbound>();

        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                match message {
                    RelayOutbound::Open { details } => {
                        eprintln!("background fetch opened for {}", details.url);
                        for chunk in ["The ", "quick ", "brown fox."] {
                            let reply = RelayInbound {
                                error: None,
                                status: 200,
                                response: chunk.to_string(),
                            };
                            if in_tx.send(reply).is_err() {
                                break;
                            }
                            tokio::time::sleep(Duration::from_millis(50)).await;
                        }
                        // Dropping in_tx disconnects the port.
                        break;
                    }
                    RelayOutbound::Abort => break,
                }
            }
        });

        Ok(RelayPort {
            sender: Box::new(LoopbackSender(out_tx)),
            receiver: Box::new(LoopbackReceiver(in_rx)),
        })
    }
}

struct LoopbackSender(mpsc::UnboundedSender<RelayOutbound>);

impl RelaySender for LoopbackSender {
    fn post(&self, message: &RelayOutbound) -> Result<(), SseError> {
        self.0
            .send(message.clone())
            .map_err(|_| SseError::transport("relay port closed"))
    }
}

struct LoopbackReceiver(mpsc::UnboundedReceiver<RelayInbound>);

#[async_trait::async_trait]
impl RelayReceiver for LoopbackReceiver {
    async fn recv(&mut self) -> Option<RelayInbound> {
        self.0.recv().await
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), SseError> {
    let client = SseClient::builder()
        .context(ExecutionContext::WebPage)
        .relay_connector(Arc::new(LoopbackConnector))
        .build()?;

    client
        .stream_fetch(
            StreamRequest::new("https://api.example/gen"),
            |data| print!("{data}"),
            |payload| eprintln!("request rejected: {payload:?}"),
        )
        .await?;
    println!();
    Ok(())
}
