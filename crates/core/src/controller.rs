//! Streaming session controller.
//!
//! Owns the transcript and drives the send lifecycle:
//! `Idle -> Requesting -> Streaming -> {Completed | Failed} -> Idle`.
//! At most one request is in flight; a failed streamed attempt falls back
//! to exactly one non-streamed send of the identical prompt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::api::ChatBackend;
use crate::config::ConfabConfig;
use crate::error::ClientError;
use crate::message::{Message, Role};
use crate::render::StreamSink;
use crate::stream::{SseDecoder, StreamEvent, ThinkSplitter};
use crate::transcript::{DeletePlan, RegeneratePlan, Transcript};

/// Lifecycle of the current send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Failed,
}

impl StreamPhase {
    pub fn label(self) -> &'static str {
        match self {
            StreamPhase::Idle => "idle",
            StreamPhase::Requesting => "requesting",
            StreamPhase::Streaming => "streaming",
            StreamPhase::Completed => "completed",
            StreamPhase::Failed => "failed",
        }
    }
}

/// How a send cycle concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Streamed to completion.
    Streamed,
    /// The streamed attempt failed; the non-streamed fallback succeeded.
    FellBack,
    /// Streaming was disabled; the non-streamed path was primary.
    NonStreamed,
}

/// Controller tunables, usually resolved from [`ConfabConfig`].
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub streaming_enabled: bool,
    pub stream_timeout: Duration,
    pub regenerate_from_user: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            streaming_enabled: true,
            stream_timeout: Duration::from_secs(60),
            regenerate_from_user: true,
        }
    }
}

impl ControllerOptions {
    pub fn from_config(config: &ConfabConfig) -> Self {
        Self {
            streaming_enabled: config.streaming.enabled,
            stream_timeout: Duration::from_secs(config.streaming.stream_timeout_secs),
            regenerate_from_user: config.transcript.regenerate_from_user,
        }
    }
}

/// Clears the in-flight flag when the operation ends, including when the
/// driving task is cancelled mid-stream.
struct FlightGuard<'a> {
    controller: &'a ChatController,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.controller.in_flight.store(false, Ordering::SeqCst);
        self.controller.set_phase(StreamPhase::Idle);
    }
}

pub struct ChatController {
    backend: Arc<dyn ChatBackend>,
    transcript: Mutex<Transcript>,
    phase: Mutex<StreamPhase>,
    in_flight: AtomicBool,
    streaming_enabled: bool,
    stream_timeout: Duration,
    regenerate_from_user: bool,
}

impl ChatController {
    pub fn new(backend: Arc<dyn ChatBackend>, options: ControllerOptions) -> Self {
        Self {
            backend,
            transcript: Mutex::new(Transcript::new()),
            phase: Mutex::new(StreamPhase::Idle),
            in_flight: AtomicBool::new(false),
            streaming_enabled: options.streaming_enabled,
            stream_timeout: options.stream_timeout,
            regenerate_from_user: options.regenerate_from_user,
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
            .lock()
            .map(|guard| *guard)
            .unwrap_or(StreamPhase::Idle)
    }

    fn set_phase(&self, phase: StreamPhase) {
        if let Ok(mut guard) = self.phase.lock() {
            *guard = phase;
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn with_transcript<T>(&self, f: impl FnOnce(&mut Transcript) -> T) -> T {
        let mut guard = self.transcript.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub fn transcript(&self) -> Vec<Message> {
        self.with_transcript(|t| t.snapshot())
    }

    pub fn transcript_len(&self) -> usize {
        self.with_transcript(|t| t.len())
    }

    /// Compute a delete plan without mutating, for confirmation prompts.
    pub fn plan_delete(&self, index: usize) -> Result<DeletePlan, ClientError> {
        self.with_transcript(|t| t.delete_plan(index))
    }

    /// Fetch the backend transcript and adopt it.
    pub async fn load_history(&self) -> Result<Vec<Message>, ClientError> {
        let messages = self.backend.history().await?;
        self.with_transcript(|t| t.replace(messages.clone()));
        Ok(messages)
    }

    /// Adopt an externally fetched transcript unless a request is in
    /// flight. Returns true when the local copy changed.
    pub fn sync_history(&self, messages: Vec<Message>) -> bool {
        if self.is_busy() {
            return false;
        }
        self.with_transcript(|t| {
            if t.messages() == messages.as_slice() {
                false
            } else {
                t.replace(messages);
                true
            }
        })
    }

    fn begin_flight(&self) -> Result<FlightGuard<'_>, ClientError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ClientError::Busy);
        }
        self.set_phase(StreamPhase::Requesting);
        Ok(FlightGuard { controller: self })
    }

    /// Send a prompt through the full cycle, driving `sink` as output
    /// arrives. Empty prompts are rejected before any network activity.
    pub async fn send(
        &self,
        text: &str,
        sink: &mut dyn StreamSink,
    ) -> Result<SendOutcome, ClientError> {
        let prompt = text.trim().to_string();
        if prompt.is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        let _flight = self.begin_flight()?;
        let result = self.send_inner(&prompt, sink).await;
        self.set_phase(match &result {
            Ok(_) => StreamPhase::Completed,
            Err(_) => StreamPhase::Failed,
        });
        result
    }

    async fn send_inner(
        &self,
        prompt: &str,
        sink: &mut dyn StreamSink,
    ) -> Result<SendOutcome, ClientError> {
        if !self.streaming_enabled {
            self.send_plain(prompt, sink).await?;
            return Ok(SendOutcome::NonStreamed);
        }

        let mut rendered = false;
        let attempt = tokio::time::timeout(
            self.stream_timeout,
            self.run_stream(prompt, sink, &mut rendered),
        )
        .await;
        let error = match attempt {
            Ok(Ok(full_text)) => {
                self.with_transcript(|t| t.push_exchange(prompt, &full_text));
                info!(chars = full_text.len(), "stream completed");
                return Ok(SendOutcome::Streamed);
            }
            Ok(Err(error)) => error,
            Err(_) => ClientError::Timeout,
        };

        warn!(%error, "streamed send failed; retrying without streaming");
        if rendered {
            sink.exchange_discarded();
        }
        sink.fallback_started(&error.to_string());
        self.send_plain(prompt, sink).await?;
        Ok(SendOutcome::FellBack)
    }

    /// Drive one SSE stream to completion, returning the raw cumulative
    /// response text (think markers included).
    async fn run_stream(
        &self,
        prompt: &str,
        sink: &mut dyn StreamSink,
        rendered: &mut bool,
    ) -> Result<String, ClientError> {
        let mut stream = self.backend.open_stream(prompt).await?;
        let mut decoder = SseDecoder::new();
        let mut splitter = ThinkSplitter::new();
        let mut full_text = String::new();

        while let Some(fragment) = stream.next().await {
            let bytes = fragment?;
            for event in decoder.feed(&bytes) {
                match event {
                    StreamEvent::Chunk(chunk) => {
                        self.on_chunk(&chunk, prompt, sink, rendered, &mut splitter, &mut full_text);
                    }
                    StreamEvent::Done => {
                        return Ok(self.on_done(prompt, sink, rendered, &mut splitter, full_text));
                    }
                    StreamEvent::Error(message) => {
                        return Err(ClientError::Stream { message });
                    }
                }
            }
        }

        for event in decoder.finish() {
            match event {
                StreamEvent::Chunk(chunk) => {
                    self.on_chunk(&chunk, prompt, sink, rendered, &mut splitter, &mut full_text);
                }
                StreamEvent::Done => {
                    return Ok(self.on_done(prompt, sink, rendered, &mut splitter, full_text));
                }
                StreamEvent::Error(message) => {
                    return Err(ClientError::Stream { message });
                }
            }
        }
        // finish() always ends in Done or Error; this is unreachable.
        Err(ClientError::stream("stream ended without data"))
    }

    fn on_chunk(
        &self,
        chunk: &str,
        prompt: &str,
        sink: &mut dyn StreamSink,
        rendered: &mut bool,
        splitter: &mut ThinkSplitter,
        full_text: &mut String,
    ) {
        if !*rendered {
            *rendered = true;
            self.set_phase(StreamPhase::Streaming);
            sink.user_shown(prompt);
            sink.response_begin();
        }
        full_text.push_str(chunk);
        for op in splitter.append(chunk) {
            sink.render(op);
        }
    }

    fn on_done(
        &self,
        prompt: &str,
        sink: &mut dyn StreamSink,
        rendered: &mut bool,
        splitter: &mut ThinkSplitter,
        full_text: String,
    ) -> String {
        // A zero-chunk stream that ends in an explicit done still counts
        // as an (empty) exchange; show the user's turn now.
        if !*rendered {
            *rendered = true;
            sink.user_shown(prompt);
            sink.response_begin();
        }
        for op in splitter.finish() {
            sink.render(op);
        }
        sink.response_end();
        full_text
    }

    /// One non-streamed send: POST the prompt, adopt the refreshed
    /// history, render the newest assistant reply in one pass.
    async fn send_plain(
        &self,
        prompt: &str,
        sink: &mut dyn StreamSink,
    ) -> Result<(), ClientError> {
        self.set_phase(StreamPhase::Requesting);
        self.backend.send_chat(prompt).await?;
        let messages = self.backend.history().await?;
        let reply = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.with_transcript(|t| t.replace(messages));

        sink.user_shown(prompt);
        sink.response_begin();
        for op in ThinkSplitter::split_complete(&reply) {
            sink.render(op);
        }
        sink.response_end();
        Ok(())
    }

    /// Remove messages `index..len` on the backend and locally.
    pub async fn delete_from(&self, index: usize) -> Result<DeletePlan, ClientError> {
        let _flight = self.begin_flight()?;
        let plan = self.with_transcript(|t| t.delete_plan(index))?;
        let deleted = self.backend.delete_last(plan.count).await?;
        if deleted != plan.count {
            debug!(requested = plan.count, deleted, "backend deleted a different count");
        }
        self.with_transcript(|t| t.truncate_from(plan.start));
        Ok(plan)
    }

    /// Replace the content of the message at `index`, backend first.
    pub async fn edit(&self, index: usize, content: &str) -> Result<(), ClientError> {
        let _flight = self.begin_flight()?;
        let content = content.trim();
        if content.is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        self.with_transcript(|t| t.message(index).map(|_| ()))?;
        self.backend.update_message(index, content).await?;
        self.with_transcript(|t| t.set_content(index, content.to_string()))
    }

    /// Truncate for a regeneration anchored at `index`. The returned
    /// plan's prompt is then resubmitted through [`ChatController::send`].
    pub async fn prepare_regenerate(&self, index: usize) -> Result<RegeneratePlan, ClientError> {
        let plan =
            self.with_transcript(|t| t.regenerate_plan(index, self.regenerate_from_user))?;
        self.apply_truncation(&plan).await?;
        Ok(plan)
    }

    /// Truncate for continuing a conversation that ends on an unanswered
    /// user message.
    pub async fn prepare_continue(&self) -> Result<RegeneratePlan, ClientError> {
        let plan = self.with_transcript(|t| t.continue_plan())?;
        self.apply_truncation(&plan).await?;
        Ok(plan)
    }

    async fn apply_truncation(&self, plan: &RegeneratePlan) -> Result<(), ClientError> {
        let _flight = self.begin_flight()?;
        self.backend.delete_last(plan.remove_count).await?;
        self.with_transcript(|t| {
            let keep = t.len().saturating_sub(plan.remove_count);
            t.truncate_from(keep);
        });
        Ok(())
    }

    /// Clear the conversation on the backend and locally.
    pub async fn reset(&self) -> Result<(), ClientError> {
        let _flight = self.begin_flight()?;
        self.backend.reset().await?;
        self.with_transcript(|t| t.clear());
        Ok(())
    }

    /// Activate another session and adopt its transcript.
    pub async fn switch_session(&self, id: &str) -> Result<Vec<Message>, ClientError> {
        {
            let _flight = self.begin_flight()?;
            self.backend.activate_session(id).await?;
        }
        self.load_history().await
    }
}
