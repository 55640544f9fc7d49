use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt as _;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::abort::{AbortHandle, AbortSignal, abort_pair};
use crate::context::{ExecutionContext, TransportMode};
use crate::errors::{ErrorPayload, SseError};
use crate::relay::{RELAY_CHANNEL_NAME, RelayConnector};
use crate::request::StreamRequest;
use crate::stream::StreamEvent;
use crate::transport::{HttpTransport, RelayTransport, Transport, TransportEvent, TransportHandle};

/// Streaming SSE fetch client.
///
/// One client serves many concurrent calls; each call selects a transport
/// from the injected execution context, owns its own connection, and releases
/// it independently. There is no retry, backoff, or internal timeout — those
/// are the caller's responsibility.
#[derive(Clone)]
pub struct SseClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    context: ExecutionContext,
    event_buffer: usize,
    direct: Box<dyn Transport>,
    relay: Option<Box<dyn Transport>>,
}

impl ClientInner {
    fn transport_for(&self, mode: TransportMode) -> Result<&dyn Transport, SseError> {
        match mode {
            TransportMode::Direct | TransportMode::DesktopNative => Ok(self.direct.as_ref()),
            TransportMode::Relayed => self.relay.as_deref().ok_or_else(|| {
                SseError::Config("no relay connector registered for relayed context".into())
            }),
        }
    }
}

impl SseClient {
    /// Starts a builder for configuring a client.
    pub fn builder() -> SseClientBuilder {
        SseClientBuilder::default()
    }

    /// Issues a request and returns a handle over its event sequence.
    ///
    /// Transport selection happens here, once; the mode is never revisited
    /// mid-stream. Connection setup and all I/O run on a spawned task, so
    /// this returns quickly and hard failures (including failures to open
    /// the transport) surface from [`SseStream::finish`].
    pub async fn start_stream(&self, request: StreamRequest) -> Result<SseStream, SseError> {
        let request_id = uuid::Uuid::new_v4();
        let mode = self.inner.context.transport_mode();
        debug!(%request_id, %mode, url = %request.url, "transport selected");

        let (tx, rx) = mpsc::channel(self.inner.event_buffer);
        let (final_tx, final_rx) = oneshot::channel();
        let (abort_handle, abort_signal) = abort_pair();

        tokio::spawn(stream_task(
            self.inner.clone(),
            request,
            request_id,
            mode,
            tx,
            final_tx,
            abort_signal,
        ));

        Ok(SseStream {
            request_id,
            mode,
            rx,
            final_rx,
            abort_handle,
        })
    }

    /// Callback-driven variant of [`start_stream`](Self::start_stream).
    ///
    /// Decoded payloads go to `on_message` in strict arrival order and
    /// application-level non-200 responses go to `on_error`; hard failures
    /// return as `Err` from this call instead of reaching either sink.
    /// Cancellation is not an error: an aborted call returns `Ok(())`.
    pub async fn stream_fetch<M, E>(
        &self,
        request: StreamRequest,
        mut on_message: M,
        mut on_error: E,
    ) -> Result<(), SseError>
    where
        M: FnMut(String) + Send,
        E: FnMut(ErrorPayload) + Send,
    {
        let mut stream = self.start_stream(request).await?;
        while let Some(event) = stream.next_event().await {
            match event {
                StreamEvent::Message { data, .. } => on_message(data),
                StreamEvent::HttpError { payload } => on_error(payload),
            }
        }
        stream.finish().await
    }
}

/// Handle over one in-flight streaming call.
///
/// Consume events with `next_event()`, then call `finish()` for the terminal
/// result. Dropping the handle cancels the call implicitly by closing the
/// event channel.
pub struct SseStream {
    request_id: uuid::Uuid,
    mode: TransportMode,
    rx: mpsc::Receiver<StreamEvent>,
    final_rx: oneshot::Receiver<Result<(), SseError>>,
    abort_handle: AbortHandle,
}

impl SseStream {
    /// Id correlating this call's log lines.
    pub fn request_id(&self) -> uuid::Uuid {
        self.request_id
    }

    /// Transport mode fixed for the lifetime of this call.
    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    /// Returns a handle that cancels this call.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for the next event. `None` means the stream is over, for any
    /// reason; `finish()` tells success from hard failure.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Drains any remaining events and returns the terminal result.
    ///
    /// `Ok(())` covers both natural stream end and cancellation; `Err` is the
    /// hard-failure side channel (transport, relay envelope, decode).
    pub async fn finish(mut self) -> Result<(), SseError> {
        while self.rx.recv().await.is_some() {}
        match self.final_rx.await {
            Ok(result) => result,
            Err(_) => Err(SseError::protocol_msg("stream task ended without a result")),
        }
    }
}

async fn stream_task(
    inner: Arc<ClientInner>,
    request: StreamRequest,
    request_id: uuid::Uuid,
    mode: TransportMode,
    tx: mpsc::Sender<StreamEvent>,
    final_tx: oneshot::Sender<Result<(), SseError>>,
    mut internal_signal: AbortSignal,
) {
    let transport = match inner.transport_for(mode) {
        Ok(transport) => transport,
        Err(e) => {
            let _ = final_tx.send(Err(e));
            return;
        }
    };

    let opened = transport.open(&request.url, &request.options).await;
    let TransportHandle {
        mut stream,
        mut aborter,
    } = match opened {
        Ok(handle) => handle,
        Err(e) => {
            let _ = final_tx.send(Err(e));
            return;
        }
    };

    let mut external_signal = request.signal;
    let mut seq = 0_u64;
    loop {
        tokio::select! {
            _ = abort_requested(&mut internal_signal, external_signal.as_mut()) => {
                debug!(%request_id, %mode, seq, "stream cancelled");
                if let Some(aborter) = aborter.as_mut() {
                    aborter.notify();
                }
                let _ = final_tx.send(Ok(()));
                return;
            }
            next = stream.next() => {
                match next {
                    Some(Ok(TransportEvent::Message(data))) => {
                        debug!(%request_id, seq, "data frame delivered");
                        let sent = tx.send(StreamEvent::Message { seq, data }).await.is_ok();
                        seq = seq.saturating_add(1);
                        if !sent {
                            let _ = final_tx.send(Err(SseError::protocol_msg(
                                "event receiver dropped mid-stream",
                            )));
                            return;
                        }
                    }
                    Some(Ok(TransportEvent::HttpFailure(payload))) => {
                        debug!(%request_id, %mode, "non-200 response surfaced to error sink");
                        if tx.send(StreamEvent::HttpError { payload }).await.is_err() {
                            let _ = final_tx.send(Err(SseError::protocol_msg(
                                "event receiver dropped before error delivery",
                            )));
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        let _ = final_tx.send(Err(e));
                        return;
                    }
                    None => {
                        debug!(%request_id, seq, "stream ended");
                        let _ = final_tx.send(Ok(()));
                        return;
                    }
                }
            }
        }
    }
}

/// Resolves when either the caller-supplied signal or the stream handle's own
/// handle fires.
async fn abort_requested(internal: &mut AbortSignal, external: Option<&mut AbortSignal>) {
    match external {
        Some(external) => tokio::select! {
            _ = internal.fired() => {}
            _ = external.fired() => {}
        },
        None => internal.fired().await,
    }
}

/// Builder for [`SseClient`].
pub struct SseClientBuilder {
    context: Option<ExecutionContext>,
    timeout: Duration,
    relay_channel: String,
    event_buffer: usize,
    relay_connector: Option<Arc<dyn RelayConnector>>,
}

impl Default for SseClientBuilder {
    fn default() -> Self {
        Self {
            context: None,
            timeout: Duration::from_secs(120),
            relay_channel: RELAY_CHANNEL_NAME.to_string(),
            event_buffer: 128,
            relay_connector: None,
        }
    }
}

impl SseClientBuilder {
    /// Sets the execution context. Required; there is no ambient probing.
    pub fn context(mut self, context: ExecutionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Overrides the HTTP timeout used by the direct transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the relay channel name.
    pub fn relay_channel(mut self, name: impl Into<String>) -> Self {
        self.relay_channel = name.into();
        self
    }

    /// Sets the bounded event buffer between the stream task and consumer.
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    /// Registers the connector used to reach the background relay. Required
    /// for clients running in a [`ExecutionContext::WebPage`] context.
    pub fn relay_connector(mut self, connector: Arc<dyn RelayConnector>) -> Self {
        self.relay_connector = Some(connector);
        self
    }

    /// Validates the configuration and builds the client.
    pub fn build(self) -> Result<SseClient, SseError> {
        let context = self
            .context
            .ok_or_else(|| SseError::Config("execution context is required".into()))?;
        if self.event_buffer == 0 {
            return Err(SseError::Config(
                "event_buffer must be greater than 0".into(),
            ));
        }
        let mode = context.transport_mode();
        if mode == TransportMode::Relayed && self.relay_connector.is_none() {
            return Err(SseError::Config(
                "relayed context requires a relay connector".into(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| SseError::Config(format!("failed to build HTTP client: {e}")))?;
        let http_mode = match mode {
            TransportMode::Relayed => TransportMode::Direct,
            other => other,
        };
        let relay = self
            .relay_connector
            .map(|connector| {
                Box::new(RelayTransport::new(connector, self.relay_channel)) as Box<dyn Transport>
            });

        Ok(SseClient {
            inner: Arc::new(ClientInner {
                context,
                event_buffer: self.event_buffer,
                direct: Box::new(HttpTransport::new(http_client, http_mode)),
                relay,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{
        RelayErrorInfo, RelayInbound, RelayOutbound, RelayPort, RelayReceiver, RelaySender,
    };
    use crate::transport::AbortNotifier;
    use futures::stream;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedTransport {
        events: Mutex<Option<Vec<Result<TransportEvent, SseError>>>>,
        aborts: Arc<AtomicUsize>,
        pending: bool,
    }

    impl ScriptedTransport {
        fn events(events: Vec<Result<TransportEvent, SseError>>) -> Self {
            Self {
                events: Mutex::new(Some(events)),
                aborts: Arc::new(AtomicUsize::new(0)),
                pending: false,
            }
        }

        fn pending() -> Self {
            Self {
                events: Mutex::new(Some(Vec::new())),
                aborts: Arc::new(AtomicUsize::new(0)),
                pending: true,
            }
        }
    }

    struct CountingAborter(Arc<AtomicUsize>);

    impl AbortNotifier for CountingAborter {
        fn notify(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl Transport for ScriptedTransport {
        async fn open(
            &self,
            _url: &str,
            _options: &crate::HttpOptions,
        ) -> Result<TransportHandle, SseError> {
            let aborter: Box<dyn AbortNotifier> = Box::new(CountingAborter(self.aborts.clone()));
            if self.pending {
                return Ok(TransportHandle {
                    stream: Box::pin(stream::pending()),
                    aborter: Some(aborter),
                });
            }
            let events = self
                .events
                .lock()
                .unwrap()
                .take()
                .expect("transport opened once");
            Ok(TransportHandle {
                stream: Box::pin(stream::iter(events)),
                aborter: Some(aborter),
            })
        }
    }

    fn direct_client(transport: ScriptedTransport) -> SseClient {
        SseClient {
            inner: Arc::new(ClientInner {
                context: ExecutionContext::ExtensionPage,
                event_buffer: 16,
                direct: Box::new(transport),
                relay: None,
            }),
        }
    }

    fn message(data: &str) -> Result<TransportEvent, SseError> {
        Ok(TransportEvent::Message(data.to_string()))
    }

    #[tokio::test]
    async fn messages_are_sequenced_in_arrival_order() {
        let client = direct_client(ScriptedTransport::events(vec![
            message("Hello"),
            message("World"),
        ]));
        let mut stream = client
            .start_stream(StreamRequest::new("https://api.example/gen"))
            .await
            .expect("start");
        assert_eq!(stream.mode(), TransportMode::Direct);

        let mut seen = Vec::new();
        while let Some(event) = stream.next_event().await {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                StreamEvent::Message {
                    seq: 0,
                    data: "Hello".into()
                },
                StreamEvent::Message {
                    seq: 1,
                    data: "World".into()
                },
            ]
        );
        assert!(stream.finish().await.is_ok());
    }

    #[tokio::test]
    async fn non_200_reaches_error_sink_exactly_once() {
        let payload = ErrorPayload::Json(serde_json::json!({"error": "rate_limited"}));
        let client = direct_client(ScriptedTransport::events(vec![Ok(
            TransportEvent::HttpFailure(payload.clone()),
        )]));

        let mut messages = Vec::new();
        let mut errors = Vec::new();
        let result = client
            .stream_fetch(
                StreamRequest::new("https://api.example/gen"),
                |data| messages.push(data),
                |payload| errors.push(payload),
            )
            .await;

        assert!(result.is_ok());
        assert!(messages.is_empty());
        assert_eq!(errors, vec![payload]);
    }

    #[tokio::test]
    async fn hard_error_rejects_after_delivered_messages() {
        let client = direct_client(ScriptedTransport::events(vec![
            message("partial"),
            Err(SseError::transport("connection reset")),
        ]));

        let mut messages = Vec::new();
        let mut errors = Vec::new();
        let result = client
            .stream_fetch(
                StreamRequest::new("https://api.example/gen"),
                |data| messages.push(data),
                |payload| errors.push(payload),
            )
            .await;

        assert!(matches!(result, Err(SseError::Transport { .. })));
        assert_eq!(messages, vec!["partial".to_string()]);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn abort_handle_cancels_and_notifies_transport_once() {
        let transport = ScriptedTransport::pending();
        let aborts = transport.aborts.clone();
        let client = direct_client(transport);
        let mut stream = client
            .start_stream(StreamRequest::new("https://api.example/gen"))
            .await
            .expect("start");

        let handle = stream.abort_handle();
        handle.abort();
        handle.abort();
        assert!(stream.next_event().await.is_none());
        assert!(stream.finish().await.is_ok(), "cancellation is not an error");
        assert_eq!(aborts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn caller_supplied_signal_cancels() {
        let client = direct_client(ScriptedTransport::pending());
        let (handle, signal) = crate::abort_pair();
        let mut stream = client
            .start_stream(StreamRequest::new("https://api.example/gen").signal(signal))
            .await
            .expect("start");
        handle.abort();
        assert!(stream.next_event().await.is_none());
        assert!(stream.finish().await.is_ok());
    }

    // Relayed-mode fakes.

    struct FakeConnector {
        inbound: Mutex<Option<tokio::sync::mpsc::UnboundedReceiver<RelayInbound>>>,
        posts: Arc<Mutex<Vec<RelayOutbound>>>,
    }

    impl FakeConnector {
        fn new(
            inbound: tokio::sync::mpsc::UnboundedReceiver<RelayInbound>,
        ) -> (Arc<Self>, Arc<Mutex<Vec<RelayOutbound>>>) {
            let posts = Arc::new(Mutex::new(Vec::new()));
            (
                Arc::new(Self {
                    inbound: Mutex::new(Some(inbound)),
                    posts: posts.clone(),
                }),
                posts,
            )
        }
    }

    struct FakeSender(Arc<Mutex<Vec<RelayOutbound>>>);

    impl RelaySender for FakeSender {
        fn post(&self, message: &RelayOutbound) -> Result<(), SseError> {
            self.0.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct FakeReceiver(tokio::sync::mpsc::UnboundedReceiver<RelayInbound>);

    #[async_trait::async_trait]
    impl RelayReceiver for FakeReceiver {
        async fn recv(&mut self) -> Option<RelayInbound> {
            self.0.recv().await
        }
    }

    #[async_trait::async_trait]
    impl RelayConnector for FakeConnector {
        async fn connect(&self, _channel: &str) -> Result<RelayPort, SseError> {
            let receiver = self
                .inbound
                .lock()
                .unwrap()
                .take()
                .expect("port connected once");
            Ok(RelayPort {
                sender: Box::new(FakeSender(self.posts.clone())),
                receiver: Box::new(FakeReceiver(receiver)),
            })
        }
    }

    fn relayed_client(connector: Arc<FakeConnector>) -> SseClient {
        SseClient::builder()
            .context(ExecutionContext::WebPage)
            .relay_connector(connector)
            .build()
            .expect("build client")
    }

    #[tokio::test]
    async fn relay_error_envelope_rejects_without_sink_calls() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let (connector, _posts) = FakeConnector::new(rx);
        let client = relayed_client(connector);

        tx.send(RelayInbound {
            error: Some(RelayErrorInfo {
                message: "dns failure".into(),
                name: "NetworkError".into(),
            }),
            status: 0,
            response: String::new(),
        })
        .unwrap();

        let mut messages = Vec::new();
        let mut errors = Vec::new();
        let result = client
            .stream_fetch(
                StreamRequest::new("https://api.example/gen"),
                |data| messages.push(data),
                |payload| errors.push(payload),
            )
            .await;

        assert!(matches!(
            result,
            Err(SseError::Relay { ref name, ref message })
                if name == "NetworkError" && message == "dns failure"
        ));
        assert!(messages.is_empty());
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn relay_200_message_passes_through_unparsed() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let (connector, posts) = FakeConnector::new(rx);
        let client = relayed_client(connector);

        tx.send(RelayInbound {
            error: None,
            status: 200,
            response: "whole chunk, not SSE".into(),
        })
        .unwrap();
        drop(tx);

        let mut messages = Vec::new();
        let result = client
            .stream_fetch(
                StreamRequest::new("https://api.example/gen").method("POST"),
                |data| messages.push(data),
                |_| panic!("no error expected"),
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(messages, vec!["whole chunk, not SSE".to_string()]);
        let posts = posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert!(matches!(&posts[0], RelayOutbound::Open { details } if details.options.method == "POST"));
    }

    #[tokio::test]
    async fn relay_non_200_reaches_error_sink() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let (connector, _posts) = FakeConnector::new(rx);
        let client = relayed_client(connector);

        tx.send(RelayInbound {
            error: None,
            status: 429,
            response: r#"{"error":"rate_limited"}"#.into(),
        })
        .unwrap();
        drop(tx);

        let mut errors = Vec::new();
        let result = client
            .stream_fetch(
                StreamRequest::new("https://api.example/gen"),
                |_| panic!("no message expected"),
                |payload| errors.push(payload),
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(
            errors,
            vec![ErrorPayload::Relay {
                status: 429,
                response: r#"{"error":"rate_limited"}"#.into(),
            }]
        );
    }

    #[tokio::test]
    async fn abort_after_disconnect_sends_no_duplicate_instruction() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let (connector, posts) = FakeConnector::new(rx);
        let client = relayed_client(connector);

        let mut stream = client
            .start_stream(StreamRequest::new("https://api.example/gen"))
            .await
            .expect("start");
        let handle = stream.abort_handle();

        // Port disconnects before any data arrives.
        drop(tx);
        assert!(stream.next_event().await.is_none());
        assert!(stream.finish().await.is_ok());

        // Firing the signal afterwards must neither panic nor post an abort.
        handle.abort();
        let posts = posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert!(matches!(posts[0], RelayOutbound::Open { .. }));
    }

    #[tokio::test]
    async fn cancelling_relayed_call_posts_single_abort() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let (connector, posts) = FakeConnector::new(rx);
        let client = relayed_client(connector);

        let mut stream = client
            .start_stream(StreamRequest::new("https://api.example/gen"))
            .await
            .expect("start");
        stream.abort_handle().abort();
        assert!(stream.next_event().await.is_none());
        assert!(stream.finish().await.is_ok());
        drop(tx);

        let posts = posts.lock().unwrap();
        assert_eq!(posts.len(), 2);
        assert!(matches!(posts[0], RelayOutbound::Open { .. }));
        assert!(matches!(posts[1], RelayOutbound::Abort));
    }

    #[test]
    fn builder_requires_context() {
        let result = SseClient::builder().build();
        assert!(matches!(result, Err(SseError::Config(msg)) if msg.contains("context")));
    }

    #[test]
    fn builder_rejects_relayed_context_without_connector() {
        let result = SseClient::builder()
            .context(ExecutionContext::WebPage)
            .build();
        assert!(matches!(result, Err(SseError::Config(msg)) if msg.contains("relay connector")));
    }

    #[test]
    fn builder_rejects_zero_event_buffer() {
        let result = SseClient::builder()
            .context(ExecutionContext::ExtensionPage)
            .event_buffer(0)
            .build();
        assert!(matches!(result, Err(SseError::Config(msg)) if msg.contains("event_buffer")));
    }
}
