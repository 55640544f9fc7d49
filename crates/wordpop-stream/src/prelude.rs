//! Common imports for typical client usage.
//!
//! This module intentionally exports the types almost every caller touches so
//! examples and application code need fewer import lines.
pub use crate::{
    AbortHandle, AbortSignal, ErrorPayload, ExecutionContext, HttpOptions, SseClient, SseError,
    SseStream, StreamEvent, StreamRequest, TransportMode, abort_pair,
};
