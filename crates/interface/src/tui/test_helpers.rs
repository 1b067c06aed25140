//! Shared helpers for TUI tests.

use std::sync::{Mutex, OnceLock};

use ratatui::text::Line;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Run `f` with the given environment overrides applied, restoring the
/// previous values afterwards. `None` removes the variable. Serialized so
/// env-sensitive tests cannot race each other.
pub(crate) fn with_env_overrides<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner());

    let saved: Vec<(String, Option<String>)> = vars
        .iter()
        .map(|(key, _)| ((*key).to_string(), std::env::var(key).ok()))
        .collect();
    for (key, value) in vars {
        unsafe {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
    }

    f();

    for (key, value) in saved {
        unsafe {
            match value {
                Some(value) => std::env::set_var(&key, value),
                None => std::env::remove_var(&key),
            }
        }
    }
}

/// Collapse a styled line to its raw text.
pub(crate) fn line_plain(line: &Line) -> String {
    line.spans.iter().map(|span| span.content.as_ref()).collect()
}

/// Collapse a list of styled lines to raw text rows.
pub(crate) fn entry_lines_plain(lines: &[Line]) -> Vec<String> {
    lines.iter().map(line_plain).collect()
}
