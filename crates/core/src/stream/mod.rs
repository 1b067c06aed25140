//! Streamed response handling: SSE decoding and think-tag splitting.

mod decoder;
mod splitter;

pub use decoder::SseDecoder;
pub use splitter::{RenderOp, THINK_CLOSE, THINK_OPEN, ThinkSplitter};

/// Decoded event from the relay's SSE stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of response text.
    Chunk(String),
    /// The response completed, explicitly or at end of input.
    Done,
    /// The backend reported an error; the stream is over.
    Error(String),
}
