//! Confab core - domain logic for the terminal chat client.
//!
//! Responsibilities:
//! - Decoding the relay's SSE chunk stream and splitting think-tag spans
//! - Owning the transcript and planning index-addressed mutations
//! - Driving the send lifecycle: single flight, timeout, one-shot fallback
//! - Speaking the relay's HTTP contract and polling it in the background

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod message;
pub mod poller;
pub mod render;
pub mod stream;
pub mod transcript;

pub use api::{ByteStream, ChatBackend, HealthStatus, HttpBackend, SessionInfo};
pub use config::{ConfabConfig, ConfigError, env_bool, env_u64, env_usize};
pub use controller::{ChatController, ControllerOptions, SendOutcome, StreamPhase};
pub use error::ClientError;
pub use message::{Message, Role};
pub use poller::{HistoryPoller, PollUpdate};
pub use render::{NullSink, StreamSink};
pub use stream::{RenderOp, SseDecoder, StreamEvent, ThinkSplitter};
pub use transcript::{DeletePlan, RegeneratePlan, Transcript};
