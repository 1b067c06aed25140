//! Layout math and the framing bars around the conversation body.

use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use confab_core::StreamPhase;

use super::{
    CompletionState, TuiTheme, canonical_slash_command, matching_slash_commands,
    parse_slash_tokens, slash_argument_options,
};

pub(crate) const TUI_SCROLL_STEP: usize = 3;

pub(crate) fn input_line_count(input: &str) -> u16 {
    let lines = input.chars().filter(|c| *c == '\n').count() as u16 + 1;
    lines.clamp(1, 4)
}

/// Vertical layout: title, body, optional confirm bar, hint bar, input.
pub(crate) fn tui_layout_constraints(has_confirm: bool, input_lines: u16) -> Vec<Constraint> {
    let input_height = input_lines + 2;
    let mut constraints = vec![Constraint::Length(1), Constraint::Min(5)];
    if has_confirm {
        constraints.push(Constraint::Length(2));
    }
    constraints.push(Constraint::Length(1));
    constraints.push(Constraint::Length(input_height));
    constraints
}

pub(crate) fn short_session_name(value: Option<&str>) -> String {
    let session = value.unwrap_or("-");
    let max = 12usize;
    if session.chars().count() <= max {
        return session.to_string();
    }
    let prefix = session.chars().take(max).collect::<String>();
    format!("{}…", prefix)
}

pub(crate) fn build_title_bar<'a>(
    base_url: &str,
    session: Option<&str>,
    phase: StreamPhase,
    poll_secs: u64,
    theme: &TuiTheme,
) -> Line<'a> {
    let phase_color = match phase {
        StreamPhase::Idle => theme.text_muted,
        StreamPhase::Requesting | StreamPhase::Streaming => theme.warning,
        StreamPhase::Completed => theme.success,
        StreamPhase::Failed => theme.danger,
    };
    let poll_tag = if poll_secs == 0 {
        "poll:off".to_string()
    } else {
        format!("poll:{}s", poll_secs)
    };
    Line::from(vec![
        Span::styled(
            " confab ",
            Style::default()
                .fg(theme.primary)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {}  ", base_url),
            Style::default().fg(theme.text_dim),
        ),
        Span::styled(
            format!("{}  ", short_session_name(session)),
            Style::default().fg(theme.success),
        ),
        Span::styled(phase.label().to_string(), Style::default().fg(phase_color)),
        Span::styled(format!("  {}", poll_tag), Style::default().fg(theme.text_dim)),
    ])
}

pub(crate) fn build_confirm_bar<'a>(prompt: &str, theme: &TuiTheme) -> Vec<Line<'a>> {
    vec![
        Line::from(vec![
            Span::styled(
                " ⚠ Confirm ",
                Style::default()
                    .fg(Color::Black)
                    .bg(theme.warning)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  {}", prompt), Style::default().fg(theme.warning)),
        ]),
        Line::from(Span::styled(
            "   [y] Yes  [n] No",
            Style::default().fg(theme.text_muted),
        )),
    ]
}

pub(crate) fn build_status_hint_bar(
    input: &str,
    completion: Option<&CompletionState>,
    editing: Option<usize>,
    is_busy: bool,
    show_thinking: bool,
    theme: &TuiTheme,
) -> Line<'static> {
    if let Some(index) = editing {
        return Line::from(vec![
            Span::styled(
                format!(" editing #{} ", index),
                Style::default()
                    .fg(theme.warning)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                " Enter save  Esc cancel",
                Style::default().fg(theme.text_dim),
            ),
        ]);
    }

    if let Some((_, norm, args, trailing_space)) = parse_slash_tokens(input)
        && completion.is_none()
    {
        if args.is_empty() && !trailing_space {
            let matches = matching_slash_commands(&norm);
            let cmds: String = matches
                .iter()
                .map(|spec| spec.command)
                .collect::<Vec<_>>()
                .join("  ");
            return Line::from(vec![
                Span::raw(" "),
                Span::styled(cmds, Style::default().fg(theme.text_muted)),
                Span::styled("  Tab: complete", Style::default().fg(theme.info)),
            ]);
        }
        if let Some(options) = slash_argument_options(&norm) {
            return Line::from(vec![
                Span::styled(
                    format!(" {}: ", canonical_slash_command(&norm)),
                    Style::default().fg(theme.primary),
                ),
                Span::styled(options.join("  "), Style::default().fg(theme.text_muted)),
            ]);
        }
    }

    if let Some(comp) = completion {
        let label = format!(
            " [{}/{}] {} ",
            comp.selected_index + 1,
            comp.suggestions.len(),
            comp.suggestions
                .get(comp.selected_index)
                .map(String::as_str)
                .unwrap_or(""),
        );
        return Line::from(vec![
            Span::styled(label, Style::default().fg(theme.primary)),
            Span::styled("  Tab/Shift+Tab: cycle", Style::default().fg(theme.info)),
        ]);
    }

    let sep = Span::styled(" │ ", Style::default().fg(theme.text_dim));
    let mut spans = vec![
        Span::styled(" /help", Style::default().fg(theme.text_muted)),
        sep.clone(),
        Span::styled(
            format!("thinking:{}", if show_thinking { "on" } else { "off" }),
            Style::default().fg(theme.text_dim),
        ),
        sep,
    ];
    if is_busy {
        spans.push(Span::styled(
            "Ctrl+C cancel  PgUp/Dn scroll",
            Style::default().fg(theme.text_dim),
        ));
    } else {
        spans.push(Span::styled(
            "Shift+Enter newline  ↑↓ history  PgUp/Dn scroll  Ctrl+R thinking  Ctrl+C quit",
            Style::default().fg(theme.text_dim),
        ));
    }
    Line::from(spans)
}

/// Terminal cursor position inside the input box: end of the last input
/// line, clamped to the box's visible rows.
pub(crate) fn input_cursor_position(input: &str, area: Rect) -> (u16, u16) {
    let last_line = input.rsplit('\n').next().unwrap_or(input);
    let line_offset =
        (input.chars().filter(|c| *c == '\n').count() as u16).min(input_line_count(input) - 1);
    let x = area.x + 1 + last_line.chars().count() as u16;
    let y = area.y + 1 + line_offset;
    (x, y)
}
