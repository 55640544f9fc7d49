/// Hard failures that reject a streaming call.
///
/// These are the errors returned from `start_stream`, `finish`, and
/// `stream_fetch` itself. Application-level non-200 responses are *not* part
/// of this enum; they are delivered as [`ErrorPayload`] values through the
/// error sink instead. Cancellation is not an error at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SseError {
    /// Network or stream I/O failed.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The relay channel reported a terminal error envelope.
    ///
    /// `name` and `message` are carried over from the relay verbatim.
    #[error("relay error ({name}): {message}")]
    Relay { name: String, message: String },
    /// A response body that should have been JSON could not be decoded.
    #[error("decode error: {message}")]
    Decode { message: String },
    /// Invalid client configuration or request shape.
    #[error("config error: {0}")]
    Config(String),
    /// Internal invariant violation (for example a dropped event receiver).
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SseError {
    /// Creates a transport-level error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

/// Application-level failure payload delivered to the error sink.
///
/// Which variant a caller sees depends on the transport mode: the direct HTTP
/// path parses the non-200 body as JSON, while the relay path forwards the
/// relay's status/response envelope without touching the body.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub enum ErrorPayload {
    /// Parsed JSON body of a non-200 response (Direct / DesktopNative).
    Json(serde_json::Value),
    /// Status/response envelope reported by the relay (Relayed).
    Relay { status: u16, response: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_error_preserves_name_and_message() {
        let err = SseError::Relay {
            name: "AbortError".into(),
            message: "The user aborted a request.".into(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("AbortError"));
        assert!(rendered.contains("aborted"));
    }
}
