//! Structured chat entry model and rendering.
//!
//! The view holds a flat list of [`ChatEntry`] values. Committed transcript
//! state is rebuilt from messages; a live stream appends entries through a
//! cursor so partial output can be rolled back if the exchange is discarded.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use confab_core::{Message, RenderOp, Role, ThinkSplitter};

#[derive(Debug, Clone, Copy)]
pub(crate) struct TuiTheme {
    pub(crate) text_strong: Color,
    pub(crate) text_base: Color,
    pub(crate) text_muted: Color,
    pub(crate) text_dim: Color,
    pub(crate) primary: Color,
    pub(crate) success: Color,
    pub(crate) warning: Color,
    pub(crate) danger: Color,
    pub(crate) info: Color,
    pub(crate) user_accent: Color,
    pub(crate) assistant_accent: Color,
    pub(crate) thinking_accent: Color,
    pub(crate) border_normal: Color,
    pub(crate) border_active: Color,
}

impl TuiTheme {
    pub(crate) fn default_dark() -> Self {
        Self {
            text_strong: Color::White,
            text_base: Color::Gray,
            text_muted: Color::DarkGray,
            text_dim: Color::Rgb(100, 100, 100),
            primary: Color::Cyan,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
            info: Color::Blue,
            user_accent: Color::Blue,
            assistant_accent: Color::Cyan,
            thinking_accent: Color::Magenta,
            border_normal: Color::DarkGray,
            border_active: Color::Cyan,
        }
    }
}

/// A single structured entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChatEntry {
    /// Visual separator (blank line)
    Separator,
    /// User message with its transcript index
    UserMessage { index: usize, content: String },
    /// One visible paragraph of an assistant reply. The first paragraph
    /// carries the header; `continuation` paragraphs follow a reasoning
    /// block and render without one.
    AssistantMessage {
        index: usize,
        continuation: bool,
        content: String,
    },
    /// Reasoning block (collapsible)
    ReasoningBlock {
        ordinal: u32,
        content: String,
        collapsed: bool,
    },
    /// Informational note
    SystemNote(String),
    /// Error message
    ErrorNote(String),
    /// Warning message
    WarningNote(String),
}

/// Where the next stream fragment lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamCursor {
    Inactive,
    NewParagraph,
    Visible(usize),
    Reasoning(usize),
}

/// Conversation log plus live-stream bookkeeping.
pub(crate) struct ChatView {
    entries: Vec<ChatEntry>,
    max_entries: usize,
    show_thinking: bool,
    exchange_start: Option<usize>,
    response_start: Option<usize>,
    response_labeled: bool,
    next_assistant_index: usize,
    stream: StreamCursor,
}

impl ChatView {
    pub(crate) fn new(show_thinking: bool, max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
            show_thinking,
            exchange_start: None,
            response_start: None,
            response_labeled: false,
            next_assistant_index: 0,
            stream: StreamCursor::Inactive,
        }
    }

    pub(crate) fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub(crate) fn show_thinking(&self) -> bool {
        self.show_thinking
    }

    /// Replace the log with entries built from the committed transcript.
    pub(crate) fn rebuild(&mut self, messages: &[Message]) {
        self.entries.clear();
        self.exchange_start = None;
        self.response_start = None;
        self.stream = StreamCursor::Inactive;
        for (index, message) in messages.iter().enumerate() {
            let new_exchange = message.role == Role::User
                || messages
                    .get(index.wrapping_sub(1))
                    .is_some_and(|prev| prev.role == Role::Assistant);
            if index > 0 && new_exchange {
                self.entries.push(ChatEntry::Separator);
            }
            match message.role {
                Role::User => self.entries.push(ChatEntry::UserMessage {
                    index,
                    content: message.content.clone(),
                }),
                Role::Assistant => self.append_assistant(index, &message.content),
            }
        }
        self.apply_cap();
    }

    /// Expand one stored assistant reply into paragraph and reasoning
    /// entries. A reply with no visible text still gets a labeled entry.
    fn append_assistant(&mut self, index: usize, content: &str) {
        let start = self.entries.len();
        let mut labeled = false;
        for op in ThinkSplitter::split_complete(content) {
            match op {
                RenderOp::AppendVisible(text) => {
                    self.entries.push(ChatEntry::AssistantMessage {
                        index,
                        continuation: labeled,
                        content: text,
                    });
                    labeled = true;
                }
                RenderOp::OpenReasoning { ordinal } => {
                    self.entries.push(ChatEntry::ReasoningBlock {
                        ordinal,
                        content: String::new(),
                        collapsed: !self.show_thinking,
                    });
                }
                RenderOp::AppendReasoning(text) => {
                    if let Some(ChatEntry::ReasoningBlock { content, .. }) =
                        self.entries.last_mut()
                    {
                        content.push_str(&text);
                    }
                }
            }
        }
        if !labeled {
            self.entries.insert(
                start,
                ChatEntry::AssistantMessage {
                    index,
                    continuation: false,
                    content: String::new(),
                },
            );
        }
    }

    /// Show the user turn of an in-flight exchange. Everything pushed from
    /// here until [`end_exchange`](Self::end_exchange) can be rolled back.
    pub(crate) fn begin_exchange(&mut self, prompt: &str, user_index: usize) {
        self.exchange_start = Some(self.entries.len());
        self.next_assistant_index = user_index + 1;
        if !self.entries.is_empty() {
            self.entries.push(ChatEntry::Separator);
        }
        self.entries.push(ChatEntry::UserMessage {
            index: user_index,
            content: prompt.to_string(),
        });
        self.stream = StreamCursor::Inactive;
    }

    pub(crate) fn begin_response(&mut self) {
        self.response_start = Some(self.entries.len());
        self.response_labeled = false;
        self.stream = StreamCursor::NewParagraph;
    }

    /// Route one stream fragment into the log.
    pub(crate) fn apply(&mut self, op: RenderOp) {
        match op {
            RenderOp::AppendVisible(text) => match self.stream {
                StreamCursor::Visible(at) => {
                    if let Some(ChatEntry::AssistantMessage { content, .. }) =
                        self.entries.get_mut(at)
                    {
                        content.push_str(&text);
                    }
                }
                _ => {
                    self.entries.push(ChatEntry::AssistantMessage {
                        index: self.next_assistant_index,
                        continuation: self.response_labeled,
                        content: text,
                    });
                    self.response_labeled = true;
                    self.stream = StreamCursor::Visible(self.entries.len() - 1);
                }
            },
            RenderOp::OpenReasoning { ordinal } => {
                self.entries.push(ChatEntry::ReasoningBlock {
                    ordinal,
                    content: String::new(),
                    collapsed: !self.show_thinking,
                });
                self.stream = StreamCursor::Reasoning(self.entries.len() - 1);
            }
            RenderOp::AppendReasoning(text) => {
                if let StreamCursor::Reasoning(at) = self.stream
                    && let Some(ChatEntry::ReasoningBlock { content, .. }) =
                        self.entries.get_mut(at)
                {
                    content.push_str(&text);
                }
            }
        }
    }

    /// Close the in-flight exchange and keep its entries.
    pub(crate) fn end_exchange(&mut self) {
        if let Some(start) = self.response_start.take()
            && !self.response_labeled
        {
            self.entries.insert(
                start,
                ChatEntry::AssistantMessage {
                    index: self.next_assistant_index,
                    continuation: false,
                    content: String::new(),
                },
            );
        }
        self.exchange_start = None;
        self.stream = StreamCursor::Inactive;
        self.apply_cap();
    }

    /// Roll the log back to the state before the in-flight exchange.
    pub(crate) fn discard_exchange(&mut self) {
        if let Some(start) = self.exchange_start.take() {
            self.entries.truncate(start);
        }
        self.response_start = None;
        self.stream = StreamCursor::Inactive;
    }

    pub(crate) fn push(&mut self, entry: ChatEntry) {
        self.entries.push(entry);
        self.apply_cap();
    }

    /// Flip reasoning visibility for the whole log. Returns the new state.
    pub(crate) fn toggle_thinking(&mut self) -> bool {
        self.show_thinking = !self.show_thinking;
        for entry in self.entries.iter_mut() {
            if let ChatEntry::ReasoningBlock { collapsed, .. } = entry {
                *collapsed = !self.show_thinking;
            }
        }
        self.show_thinking
    }

    /// Drop oldest entries past the cap. Deferred while an exchange is open
    /// so the stream cursor's entry positions stay valid.
    fn apply_cap(&mut self) {
        if self.exchange_start.is_some() {
            return;
        }
        if self.entries.len() > self.max_entries {
            let overflow = self.entries.len() - self.max_entries;
            self.entries.drain(0..overflow);
            if matches!(self.entries.first(), Some(ChatEntry::Separator)) {
                self.entries.remove(0);
            }
        }
    }

    /// Convert the log to plain text for export.
    pub(crate) fn to_plain_text(&self) -> String {
        let mut lines = Vec::new();
        for entry in &self.entries {
            match entry {
                ChatEntry::Separator => lines.push(String::new()),
                ChatEntry::UserMessage { index, content } => {
                    lines.push(format!("You [#{}]: {}", index, content));
                }
                ChatEntry::AssistantMessage {
                    index,
                    continuation,
                    content,
                } => {
                    if !continuation {
                        lines.push(format!("Assistant [#{}]:", index));
                    }
                    for l in content.lines() {
                        lines.push(format!("  {}", l));
                    }
                }
                ChatEntry::ReasoningBlock {
                    ordinal,
                    content,
                    collapsed,
                } => {
                    if *collapsed {
                        lines.push(format!("Thinking #{} (collapsed)", ordinal));
                    } else {
                        lines.push(format!("Thinking #{}:", ordinal));
                        for l in content.lines() {
                            lines.push(format!("  {}", l));
                        }
                    }
                }
                ChatEntry::SystemNote(text)
                | ChatEntry::ErrorNote(text)
                | ChatEntry::WarningNote(text) => {
                    lines.push(text.clone());
                }
            }
        }
        lines.join("\n")
    }
}

/// Count the number of rendered display lines a single ChatEntry will
/// produce. Must stay in sync with [`style_chat_entry`].
pub(crate) fn chat_entry_display_lines(entry: &ChatEntry) -> usize {
    match entry {
        ChatEntry::Separator => 1,
        ChatEntry::UserMessage { content, .. } => 1 + content.lines().count().max(1),
        ChatEntry::AssistantMessage {
            continuation,
            content,
            ..
        } => {
            let header = if *continuation { 0 } else { 1 };
            header + content.lines().count().max(1)
        }
        ChatEntry::ReasoningBlock {
            collapsed, content, ..
        } => {
            if *collapsed {
                1
            } else {
                1 + content.lines().count().max(1)
            }
        }
        ChatEntry::SystemNote(_) | ChatEntry::ErrorNote(_) | ChatEntry::WarningNote(_) => 1,
    }
}

/// Total rendered display lines for a slice of entries.
pub(crate) fn total_display_lines(entries: &[ChatEntry]) -> usize {
    entries.iter().map(chat_entry_display_lines).sum()
}

/// Render structured chat entries to styled ratatui Lines.
pub(crate) fn style_chat_entries(entries: &[ChatEntry]) -> Vec<Line<'static>> {
    let theme = TuiTheme::default_dark();
    let mut lines = Vec::new();
    for entry in entries {
        style_chat_entry(entry, &theme, &mut lines);
    }
    lines
}

fn bordered_content(
    content: &str,
    accent: Color,
    text: Color,
    lines: &mut Vec<Line<'static>>,
) {
    for l in content.lines() {
        lines.push(Line::from(vec![
            Span::styled("│ ", Style::default().fg(accent)),
            Span::styled(l.to_string(), Style::default().fg(text)),
        ]));
    }
    if content.is_empty() {
        lines.push(Line::from(Span::styled("│ ", Style::default().fg(accent))));
    }
}

/// Render a single ChatEntry into styled Lines.
pub(crate) fn style_chat_entry(
    entry: &ChatEntry,
    theme: &TuiTheme,
    lines: &mut Vec<Line<'static>>,
) {
    match entry {
        ChatEntry::Separator => {
            lines.push(Line::default());
        }
        ChatEntry::UserMessage { index, content } => {
            lines.push(Line::from(vec![
                Span::styled("▌ ", Style::default().fg(theme.user_accent)),
                Span::styled(
                    format!("You [#{}]", index),
                    Style::default()
                        .fg(theme.user_accent)
                        .add_modifier(Modifier::BOLD),
                ),
            ]));
            bordered_content(content, theme.user_accent, theme.text_strong, lines);
        }
        ChatEntry::AssistantMessage {
            index,
            continuation,
            content,
        } => {
            if !continuation {
                lines.push(Line::from(vec![
                    Span::styled("▌ ", Style::default().fg(theme.assistant_accent)),
                    Span::styled(
                        format!("Assistant [#{}]", index),
                        Style::default()
                            .fg(theme.assistant_accent)
                            .add_modifier(Modifier::BOLD),
                    ),
                ]));
            }
            bordered_content(content, theme.assistant_accent, theme.text_base, lines);
        }
        ChatEntry::ReasoningBlock {
            ordinal,
            content,
            collapsed,
        } => {
            if *collapsed {
                lines.push(Line::from(vec![
                    Span::styled("  ▸ ", Style::default().fg(theme.thinking_accent)),
                    Span::styled(
                        format!("Thinking #{} (collapsed)", ordinal),
                        Style::default().fg(theme.thinking_accent),
                    ),
                ]));
            } else {
                lines.push(Line::from(vec![
                    Span::styled("  ▾ ", Style::default().fg(theme.thinking_accent)),
                    Span::styled(
                        format!("Thinking #{}", ordinal),
                        Style::default()
                            .fg(theme.thinking_accent)
                            .add_modifier(Modifier::BOLD),
                    ),
                ]));
                for l in content.lines() {
                    lines.push(Line::from(vec![
                        Span::raw("    "),
                        Span::styled(l.to_string(), Style::default().fg(theme.text_muted)),
                    ]));
                }
                if content.is_empty() {
                    lines.push(Line::from(Span::raw("    ")));
                }
            }
        }
        ChatEntry::SystemNote(text) => {
            lines.push(Line::from(vec![
                Span::styled("  ◆ ", Style::default().fg(theme.primary)),
                Span::styled(text.clone(), Style::default().fg(theme.text_base)),
            ]));
        }
        ChatEntry::ErrorNote(text) => {
            lines.push(Line::from(vec![
                Span::styled(
                    "  ✗ ",
                    Style::default()
                        .fg(theme.danger)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(text.clone(), Style::default().fg(theme.danger)),
            ]));
        }
        ChatEntry::WarningNote(text) => {
            lines.push(Line::from(vec![
                Span::styled(
                    "  ⚠ ",
                    Style::default()
                        .fg(theme.warning)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(text.clone(), Style::default().fg(theme.warning)),
            ]));
        }
    }
}
