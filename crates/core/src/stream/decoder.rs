//! Incremental decoder for the relay's SSE framing.
//!
//! Responsibilities:
//! - Accumulate raw byte fragments and cut them on `\n` boundaries only
//! - Parse `data: ` lines into typed stream events
//! - Produce identical events no matter how the transport fragments bytes

use serde::Deserialize;
use tracing::debug;

use super::StreamEvent;

const DATA_PREFIX: &str = "data: ";

/// One `data:` payload. Every field is optional so unknown or partial
/// payloads degrade to a skip instead of an error.
#[derive(Debug, Deserialize)]
struct StreamPayload {
    error: Option<String>,
    chunk: Option<String>,
    done: Option<bool>,
}

/// Byte-level SSE decoder.
///
/// Fragments may split a line, the `data: ` prefix, or a multi-byte UTF-8
/// sequence at any position; a line is only interpreted once its
/// terminating newline has arrived. After a terminal event the decoder
/// ignores all further input.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    chunks_seen: bool,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal `Done` or `Error` has been emitted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one raw fragment, returning the events it completed.
    pub fn feed(&mut self, fragment: &[u8]) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        self.buf.extend_from_slice(fragment);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(event) = self.decode_line(&line[..line.len() - 1]) {
                events.push(event);
                if self.finished {
                    break;
                }
            }
        }
        events
    }

    /// Signal end of input. A buffered final line is still interpreted;
    /// afterwards the decoder reports how the stream ended: implicit
    /// completion when data arrived, otherwise an error.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        let mut events = Vec::new();
        if !self.buf.is_empty() {
            let line = std::mem::take(&mut self.buf);
            if let Some(event) = self.decode_line(&line) {
                events.push(event);
            }
        }
        if !self.finished {
            self.finished = true;
            if self.chunks_seen {
                events.push(StreamEvent::Done);
            } else {
                events.push(StreamEvent::Error("stream ended without data".to_string()));
            }
        }
        events
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<StreamEvent> {
        let line = match line.last() {
            Some(b'\r') => &line[..line.len() - 1],
            _ => line,
        };
        let text = match std::str::from_utf8(line) {
            Ok(text) => text,
            Err(_) => {
                debug!(bytes = line.len(), "skipping non-UTF-8 stream line");
                return None;
            }
        };
        let payload = text.strip_prefix(DATA_PREFIX)?;
        let payload: StreamPayload = match serde_json::from_str(payload) {
            Ok(payload) => payload,
            Err(error) => {
                debug!(%error, "skipping malformed stream payload");
                return None;
            }
        };
        if let Some(message) = payload.error {
            self.finished = true;
            return Some(StreamEvent::Error(message));
        }
        if payload.done == Some(true) {
            self.finished = true;
            return Some(StreamEvent::Done);
        }
        if let Some(chunk) = payload.chunk {
            self.chunks_seen = true;
            return Some(StreamEvent::Chunk(chunk));
        }
        debug!("skipping stream payload without chunk, done, or error");
        None
    }
}
