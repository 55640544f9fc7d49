//! Incremental Server-Sent-Events frame assembly.
//!
//! The decoder accepts byte chunks split at arbitrary boundaries and emits
//! complete frames only; the emitted frame sequence is identical for every
//! chunking of the same byte stream.

/// One parsed SSE frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if present.
    pub event: Option<String>,
    /// Joined `data:` lines, or `None` when the frame carried no data field.
    pub data: Option<String>,
}

impl SseFrame {
    /// Whether this frame is dispatchable as an event (it carried data).
    /// Only such frames reach the message sink.
    pub fn is_event(&self) -> bool {
        self.data.is_some()
    }
}

/// Stateful frame assembler fed from a byte stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers `chunk` and returns every frame completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((end, delim_len)) = find_frame_boundary(&self.buf) {
            let frame: Vec<u8> = self.buf.drain(..end + delim_len).collect();
            if let Some(parsed) = parse_frame(&frame[..end]) {
                frames.push(parsed);
            }
        }
        frames
    }

    /// Whether all buffered bytes have been consumed by complete frames.
    pub fn is_drained(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Finds the first blank-line delimiter (`\n\n` or `\r\n\r\n`), returning the
/// frame length and delimiter length.
fn find_frame_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    for i in 0..buf.len().saturating_sub(1) {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if buf[i] == b'\r' && buf.len() >= i + 4 && &buf[i..i + 4] == b"\r\n\r\n" {
            return Some((i, 4));
        }
    }
    None
}

fn parse_frame(bytes: &[u8]) -> Option<SseFrame> {
    if bytes.is_empty() {
        return None;
    }
    // SSE is a text format; lossy decoding matches browser EventSource
    // behavior for stray invalid bytes.
    let text = String::from_utf8_lossy(bytes);
    let mut event = None;
    let mut data_lines: Option<Vec<String>> = None;
    for raw in text.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        match split_field(line) {
            ("event", value) => event = Some(value.to_string()),
            ("data", value) => data_lines.get_or_insert_with(Vec::new).push(value.to_string()),
            _ => {}
        }
    }
    let data = data_lines.map(|lines| lines.join("\n"));
    if event.is_none() && data.is_none() {
        return None;
    }
    Some(SseFrame { event, data })
}

/// Splits `name: value`, removing at most one space after the colon. A line
/// without a colon is a field with an empty value.
fn split_field(line: &str) -> (&str, &str) {
    match line.split_once(':') {
        Some((name, value)) => (name, value.strip_prefix(' ').unwrap_or(value)),
        None => (line, ""),
    }
}
