use crate::abort::AbortSignal;

/// HTTP request fields that ride the wire.
///
/// This struct is serde-serializable because in relayed mode it is forwarded
/// verbatim inside the `open` instruction; field names therefore match the
/// relay contract and must not change casually.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HttpOptions {
    /// HTTP method name (`GET`, `POST`, ...).
    pub method: String,
    /// Header name/value pairs in insertion order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    /// Optional request body, already encoded (typically a JSON string).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
        }
    }
}

/// A single streaming request. Immutable once issued.
///
/// The request lives exactly as long as the underlying connection; nothing is
/// persisted and an interrupted stream is simply lost.
#[derive(Clone, Debug)]
pub struct StreamRequest {
    /// Absolute or relative HTTP URL.
    pub url: String,
    /// Method, headers, and body.
    pub options: HttpOptions,
    /// Optional cancellation signal supplied by the caller.
    pub signal: Option<AbortSignal>,
}

impl StreamRequest {
    /// Creates a GET request for `url` with no body and no signal.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            options: HttpOptions::default(),
            signal: None,
        }
    }

    /// Sets the HTTP method.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.options.method = method.into();
        self
    }

    /// Appends a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a pre-encoded request body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.options.body = Some(body.into());
        self
    }

    /// Encodes `value` as the JSON request body.
    ///
    /// Callers still set their own `Content-Type` header; this only encodes.
    pub fn json_body(mut self, value: &serde_json::Value) -> Self {
        self.options.body = Some(value.to_string());
        self
    }

    /// Attaches a cancellation signal.
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}
