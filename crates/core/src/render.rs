//! Presentation seam for one send cycle.
//!
//! The controller drives a [`StreamSink`]; views decide how the updates
//! appear. `response_begin` and `response_end` bracket every op sequence,
//! so a sink only ever targets one in-progress response.

use crate::stream::RenderOp;

/// Receives incremental updates for one send cycle.
pub trait StreamSink: Send {
    /// The prompt was accepted and should now appear as the user's turn.
    /// Deferred until the response actually starts, so a request that
    /// fails early leaves no orphaned user bubble.
    fn user_shown(&mut self, text: &str);

    /// An assistant response is starting.
    fn response_begin(&mut self);

    /// Apply one render operation to the in-progress response.
    fn render(&mut self, op: RenderOp);

    /// The response completed normally.
    fn response_end(&mut self);

    /// The partially rendered exchange must be removed.
    fn exchange_discarded(&mut self);

    /// The streamed attempt failed; a non-streamed retry is starting.
    fn fallback_started(&mut self, reason: &str);
}

/// Sink that ignores everything. Useful for headless sends.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl StreamSink for NullSink {
    fn user_shown(&mut self, _text: &str) {}
    fn response_begin(&mut self) {}
    fn render(&mut self, _op: RenderOp) {}
    fn response_end(&mut self) {}
    fn exchange_discarded(&mut self) {}
    fn fallback_started(&mut self, _reason: &str) {}
}
