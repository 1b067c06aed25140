//! Terminal chat interface built on ratatui.
//!
//! Responsibilities:
//! - Event loop wiring terminal input, stream events, and poller updates
//! - Transcript view with index labels, reasoning blocks, and scrollback
//! - Slash command parsing and confirmation prompts

mod app;
mod chat_view;
mod commands;
mod input_handler;
mod layout_manager;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use app::run_chat_tui;

pub(crate) use chat_view::*;
pub(crate) use commands::*;
pub(crate) use input_handler::*;
pub(crate) use layout_manager::*;

use confab_core::{ConfabConfig, env_bool, env_usize};

/// View options resolved from config plus environment overrides.
#[derive(Debug, Clone)]
pub(crate) struct ChatViewOptions {
    pub show_thinking: bool,
    pub max_entries: usize,
}

impl ChatViewOptions {
    pub fn new(config: &ConfabConfig) -> Self {
        let show_thinking =
            env_bool("CONFAB_SHOW_THINKING").unwrap_or(config.ui.show_thinking);
        let max_entries = env_usize("CONFAB_MAX_ENTRIES")
            .unwrap_or(config.ui.max_entries)
            .max(16);
        Self {
            show_thinking,
            max_entries,
        }
    }
}
