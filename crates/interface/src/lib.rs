//! Confab interface - CLI and TUI front ends.
//!
//! Responsibilities:
//! - cli: clap surface and command dispatch
//! - interactive: plain stdout rendering for one-shot sends
//! - tui: the ratatui chat session

pub mod cli;
pub mod interactive;
pub mod tui;


pub use cli::{CliError, run_cli};
