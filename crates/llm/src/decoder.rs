use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

pub const EVENT_STREAM: &str = "text/event-stream";
pub const DONE_SENTINEL: &str = "[DONE]";

/// What a response decoder extracted from the bytes seen so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// Incremental text to append.
    Delta(String),
    /// A complete reply delivered at once; the session reveals it progressively.
    Body(String),
    /// The remote side signalled the end of the reply.
    Done,
    Failed(String),
}

/// Turns response bytes into [`DecodeEvent`]s. One decoder per session.
pub trait ResponseDecoder: Send {
    fn feed(&mut self, chunk: &[u8]) -> Vec<DecodeEvent>;

    /// Called once the body is exhausted.
    fn finish(&mut self) -> Vec<DecodeEvent>;
}

pub fn decoder_for(content_type: Option<&str>) -> Box<dyn ResponseDecoder> {
    match content_type {
        Some(value) if value.to_ascii_lowercase().contains(EVENT_STREAM) => {
            Box::new(EventStreamDecoder::default())
        }
        _ => Box::new(WholeBodyDecoder::default()),
    }
}

/// Splits a byte stream on `\n`, keeping an incomplete trailing line
/// buffered until the next chunk arrives.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(trim_line_ending(&raw));
        }
        lines
    }

    /// Returns the unterminated remainder, if any.
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Some(trim_line_ending(&raw))
    }
}

fn trim_line_ending(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    text.trim_end_matches(['\n', '\r']).to_string()
}

/// Extracts the payload of a `data:` line, or `None` for blank lines,
/// comments and other event-stream fields.
pub fn data_payload(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest).trim_end())
}

#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    lines: LineSplitter,
    done: bool,
}

impl EventStreamDecoder {
    fn decode_line(&mut self, line: &str) -> Option<DecodeEvent> {
        if self.done || line.trim().is_empty() || line.starts_with(':') {
            return None;
        }
        let payload = data_payload(line)?;
        if payload == DONE_SENTINEL {
            self.done = true;
            return Some(DecodeEvent::Done);
        }
        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "skipping malformed event-stream record");
                return None;
            }
        };
        if let Some(message) = value.get("error").and_then(error_message) {
            return Some(DecodeEvent::Failed(message));
        }
        match value
            .pointer("/choices/0/delta/content")
            .and_then(Value::as_str)
        {
            Some(delta) if !delta.is_empty() => Some(DecodeEvent::Delta(delta.to_string())),
            _ => {
                debug!("event-stream record without content delta");
                None
            }
        }
    }
}

impl ResponseDecoder for EventStreamDecoder {
    fn feed(&mut self, chunk: &[u8]) -> Vec<DecodeEvent> {
        let lines = self.lines.push(chunk);
        lines
            .iter()
            .filter_map(|line| self.decode_line(line))
            .collect()
    }

    fn finish(&mut self) -> Vec<DecodeEvent> {
        let mut events = Vec::new();
        if let Some(line) = self.lines.flush() {
            events.extend(self.decode_line(&line));
        }
        if !self.done {
            self.done = true;
            events.push(DecodeEvent::Done);
        }
        events
    }
}

#[derive(Debug, Default)]
pub struct WholeBodyDecoder {
    body: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    content: Option<String>,
    error: Option<Value>,
}

impl ResponseDecoder for WholeBodyDecoder {
    fn feed(&mut self, chunk: &[u8]) -> Vec<DecodeEvent> {
        self.body.extend_from_slice(chunk);
        Vec::new()
    }

    fn finish(&mut self) -> Vec<DecodeEvent> {
        let envelope: Envelope = match serde_json::from_slice(&self.body) {
            Ok(envelope) => envelope,
            Err(err) => {
                return vec![DecodeEvent::Failed(format!(
                    "malformed response envelope: {err}"
                ))]
            }
        };
        if let Some(message) = envelope.error.as_ref().and_then(error_message) {
            return vec![DecodeEvent::Failed(message)];
        }
        match envelope.content {
            Some(content) => vec![DecodeEvent::Body(content)],
            None => vec![DecodeEvent::Failed(
                "malformed response envelope: neither content nor error".to_string(),
            )],
        }
    }
}

/// Accepts `"error": "text"` as well as `"error": {"message": "text"}`.
pub fn error_message(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
