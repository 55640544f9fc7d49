use crate::errors::ErrorPayload;

/// Events yielded by [`SseStream`](crate::SseStream).
///
/// Hard failures (relay error envelopes, transport I/O, decode errors) are
/// not events; they surface from `finish()` as an `Err`. This keeps the two
/// failure classes distinguishable on purpose.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// One decoded text payload, sequenced in arrival order per call.
    Message { seq: u64, data: String },
    /// Application-level non-200 response delivered to the error sink.
    HttpError { payload: ErrorPayload },
}
