use tokio::sync::watch;

/// Creates a connected abort handle/signal pair.
///
/// The handle side belongs to whoever may cancel the request; the signal side
/// is attached to a [`StreamRequest`](crate::StreamRequest) or watched
/// internally by the stream task.
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx }, AbortSignal { rx })
}

/// Requests cancellation of an in-flight streaming call.
///
/// Cancellation is cooperative and best-effort: events already in flight may
/// still be delivered, and a relayed request sends a single `abort` notice to
/// the background process without waiting for it to stop producing.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Fires the abort signal. Safe to call more than once and after the
    /// stream has already ended.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }

    /// Returns another signal observing this handle.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observer side of an abort pair.
#[derive(Clone, Debug)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// Returns whether abort has been requested.
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once abort is requested.
    ///
    /// If every handle is dropped without firing, this pends forever; a
    /// request whose owner went away is simply never cancelled from that side.
    pub(crate) async fn fired(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
