//! Input mechanics: prompt history, slash completion, scrollback.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use super::{SLASH_COMMAND_SPECS, SlashCommandSpec, TUI_SCROLL_STEP, slash_argument_options};

/// Recall of previously submitted inputs, newest last. Navigating away
/// from the live input stashes it as a draft.
#[derive(Debug, Clone)]
pub(crate) struct InputHistory {
    entries: Vec<String>,
    cursor: Option<usize>,
    draft: String,
    max_entries: usize,
}

impl InputHistory {
    pub(crate) fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: None,
            draft: String::new(),
            max_entries,
        }
    }

    pub(crate) fn push(&mut self, entry: String) {
        if entry.trim().is_empty() {
            return;
        }
        self.entries.retain(|e| e != &entry);
        self.entries.push(entry);
        if self.entries.len() > self.max_entries {
            self.entries.remove(0);
        }
        self.cursor = None;
    }

    pub(crate) fn up(&mut self, current_input: &str) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        match self.cursor {
            None => {
                self.draft = current_input.to_string();
                self.cursor = Some(self.entries.len() - 1);
            }
            Some(0) => return Some(&self.entries[0]),
            Some(i) => {
                self.cursor = Some(i - 1);
            }
        }
        self.cursor.map(|i| self.entries[i].as_str())
    }

    pub(crate) fn down(&mut self) -> Option<&str> {
        match self.cursor {
            None => None,
            Some(i) if i + 1 >= self.entries.len() => {
                self.cursor = None;
                Some(self.draft.as_str())
            }
            Some(i) => {
                self.cursor = Some(i + 1);
                Some(self.entries[i + 1].as_str())
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        self.cursor = None;
        self.draft.clear();
    }
}

/// Active Tab-cycling session over completion suggestions.
#[derive(Debug, Clone)]
pub(crate) struct CompletionState {
    pub(crate) suggestions: Vec<String>,
    pub(crate) selected_index: usize,
}

/// Split a slash input into `(raw command, lowercased command, args,
/// trailing-space flag)`. Returns None for non-slash input.
pub(crate) fn parse_slash_tokens(input: &str) -> Option<(String, String, Vec<String>, bool)> {
    let raw = input.trim_start();
    if !raw.starts_with('/') {
        return None;
    }
    let trailing_space = raw.ends_with(' ');
    let mut iter = raw.split_whitespace();
    let command_raw = iter.next().unwrap_or("/").to_string();
    let command_norm = command_raw.to_ascii_lowercase();
    let args = iter.map(|value| value.to_string()).collect::<Vec<_>>();
    Some((command_raw, command_norm, args, trailing_space))
}

pub(crate) fn matching_slash_commands(prefix: &str) -> Vec<SlashCommandSpec> {
    let normalized = prefix.trim();
    if normalized.is_empty() || normalized == "/" {
        return SLASH_COMMAND_SPECS.to_vec();
    }
    SLASH_COMMAND_SPECS
        .iter()
        .copied()
        .filter(|spec| spec.command.starts_with(normalized))
        .collect()
}

pub(crate) fn completion_suggestions_for_input(input: &str) -> Vec<String> {
    let Some((command_raw, command_norm, args, trailing_space)) = parse_slash_tokens(input) else {
        return Vec::new();
    };
    if args.is_empty() && !trailing_space {
        return matching_slash_commands(command_norm.as_str())
            .into_iter()
            .map(|spec| spec.command.to_string())
            .collect();
    }
    if args.len() > 1 {
        return Vec::new();
    }
    let arg_prefix = args
        .first()
        .map(String::as_str)
        .unwrap_or("")
        .to_ascii_lowercase();
    slash_argument_options(command_norm.as_str())
        .unwrap_or(&[])
        .iter()
        .copied()
        .filter(|option| option.starts_with(arg_prefix.as_str()))
        .map(|option| format!("{} {}", command_raw, option))
        .collect()
}

/// Apply Tab/Shift+Tab completion to the input. Returns true when the
/// input changed.
pub(crate) fn apply_slash_completion(
    input: &mut String,
    completion: &mut Option<CompletionState>,
    reverse: bool,
) -> bool {
    if let Some(state) = completion.as_mut()
        && !state.suggestions.is_empty()
        && state.selected_index < state.suggestions.len()
        && input.trim() == state.suggestions[state.selected_index]
    {
        let len = state.suggestions.len();
        state.selected_index = if reverse {
            if state.selected_index == 0 {
                len - 1
            } else {
                state.selected_index - 1
            }
        } else {
            (state.selected_index + 1) % len
        };
        *input = state.suggestions[state.selected_index].clone();
        return true;
    }

    let suggestions = completion_suggestions_for_input(input);
    if suggestions.is_empty() {
        *completion = None;
        return false;
    }
    let selected_index = if reverse { suggestions.len() - 1 } else { 0 };
    *input = suggestions[selected_index].clone();
    *completion = Some(CompletionState {
        suggestions,
        selected_index,
    });
    true
}

/// Scrollback over the conversation body, in display lines.
#[derive(Debug, Clone)]
pub(crate) struct ScrollState {
    pub(crate) offset: usize,
    pub(crate) auto_follow: bool,
    pub(crate) body_height: usize,
}

impl Default for ScrollState {
    fn default() -> Self {
        Self {
            offset: 0,
            auto_follow: true,
            body_height: 1,
        }
    }
}

pub(crate) fn max_scroll(line_count: usize, body_height: usize) -> usize {
    line_count.saturating_sub(body_height)
}

pub(crate) fn effective_scroll(line_count: usize, scroll: &ScrollState) -> usize {
    let max = max_scroll(line_count, scroll.body_height);
    if scroll.auto_follow {
        max
    } else {
        scroll.offset.min(max)
    }
}

pub(crate) fn move_scroll(scroll: &mut ScrollState, line_count: usize, delta: isize) {
    let max = max_scroll(line_count, scroll.body_height);
    let current = effective_scroll(line_count, scroll) as isize;
    let next = (current + delta).clamp(0, max as isize) as usize;
    scroll.offset = next;
    scroll.auto_follow = next >= max;
}

pub(crate) fn handle_scroll_key(
    key: &KeyEvent,
    scroll: &mut ScrollState,
    line_count: usize,
) -> bool {
    let page = (scroll.body_height / 2).max(1) as isize;
    match key.code {
        KeyCode::Up if key.modifiers.contains(KeyModifiers::CONTROL) => {
            move_scroll(scroll, line_count, -1);
            true
        }
        KeyCode::Down if key.modifiers.contains(KeyModifiers::CONTROL) => {
            move_scroll(scroll, line_count, 1);
            true
        }
        KeyCode::PageUp => {
            move_scroll(scroll, line_count, -page);
            true
        }
        KeyCode::PageDown => {
            move_scroll(scroll, line_count, page);
            true
        }
        KeyCode::Home => {
            scroll.offset = 0;
            scroll.auto_follow = false;
            true
        }
        KeyCode::End => {
            scroll.offset = max_scroll(line_count, scroll.body_height);
            scroll.auto_follow = true;
            true
        }
        _ => false,
    }
}

pub(crate) fn handle_scroll_mouse(
    mouse: &MouseEvent,
    scroll: &mut ScrollState,
    line_count: usize,
) -> bool {
    match mouse.kind {
        MouseEventKind::ScrollUp => {
            move_scroll(scroll, line_count, -(TUI_SCROLL_STEP as isize));
            true
        }
        MouseEventKind::ScrollDown => {
            move_scroll(scroll, line_count, TUI_SCROLL_STEP as isize);
            true
        }
        _ => false,
    }
}
