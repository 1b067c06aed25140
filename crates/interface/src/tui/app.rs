//! TUI application loop: terminal setup, the ratatui draw cycle, and
//! event dispatch for keys, stream progress, and poller updates.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use confab_core::{
    ChatBackend, ChatController, ClientError, ConfabConfig, HistoryPoller, PollUpdate, RenderOp,
    SendOutcome, StreamSink,
};

use super::*;

/// Stream progress forwarded from the send task to the draw loop.
#[derive(Debug, PartialEq, Eq)]
enum UiEvent {
    UserShown(String),
    ResponseBegin,
    Render(RenderOp),
    ResponseEnd,
    ExchangeDiscarded,
    FallbackStarted(String),
}

/// Sink handed to the spawned send task. Each callback becomes a channel
/// message so the draw loop can apply it between frames.
struct ChannelSink {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelSink {
    fn new(tx: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self { tx }
    }
}

impl StreamSink for ChannelSink {
    fn user_shown(&mut self, text: &str) {
        let _ = self.tx.send(UiEvent::UserShown(text.to_string()));
    }

    fn response_begin(&mut self) {
        let _ = self.tx.send(UiEvent::ResponseBegin);
    }

    fn render(&mut self, op: RenderOp) {
        let _ = self.tx.send(UiEvent::Render(op));
    }

    fn response_end(&mut self) {
        let _ = self.tx.send(UiEvent::ResponseEnd);
    }

    fn exchange_discarded(&mut self) {
        let _ = self.tx.send(UiEvent::ExchangeDiscarded);
    }

    fn fallback_started(&mut self, reason: &str) {
        let _ = self.tx.send(UiEvent::FallbackStarted(reason.to_string()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Compose,
    Edit { index: usize },
}

fn apply_ui_event(view: &mut ChatView, event: UiEvent, user_index: usize) {
    match event {
        UiEvent::UserShown(text) => view.begin_exchange(&text, user_index),
        UiEvent::ResponseBegin => view.begin_response(),
        UiEvent::Render(op) => view.apply(op),
        UiEvent::ResponseEnd => view.end_exchange(),
        UiEvent::ExchangeDiscarded => view.discard_exchange(),
        UiEvent::FallbackStarted(reason) => view.push(ChatEntry::WarningNote(format!(
            "stream failed ({}); retrying without streaming",
            reason
        ))),
    }
}

fn spawn_send(
    controller: &Arc<ChatController>,
    ui_tx: &mpsc::UnboundedSender<UiEvent>,
    prompt: String,
) -> JoinHandle<Result<SendOutcome, ClientError>> {
    let controller = controller.clone();
    let mut sink = ChannelSink::new(ui_tx.clone());
    tokio::spawn(async move { controller.send(&prompt, &mut sink).await })
}

fn default_copy_path() -> PathBuf {
    PathBuf::from(format!(
        "confab-{}.txt",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ))
}

async fn run_pending_action(
    action: PendingAction,
    controller: &Arc<ChatController>,
    backend: &Arc<dyn ChatBackend>,
    view: &mut ChatView,
) {
    match action {
        PendingAction::DeleteFrom { index, .. } => match controller.delete_from(index).await {
            Ok(plan) => {
                view.rebuild(&controller.transcript());
                view.push(ChatEntry::SystemNote(format!(
                    "deleted {} message(s) from #{}",
                    plan.count, plan.start
                )));
            }
            Err(error) => view.push(ChatEntry::ErrorNote(error.to_string())),
        },
        PendingAction::Reset => match controller.reset().await {
            Ok(()) => {
                view.rebuild(&[]);
                view.push(ChatEntry::SystemNote("transcript cleared".to_string()));
            }
            Err(error) => view.push(ChatEntry::ErrorNote(error.to_string())),
        },
        PendingAction::SessionDelete { id } => match backend.delete_session(&id).await {
            Ok(()) => view.push(ChatEntry::SystemNote(format!("session '{}' deleted", id))),
            Err(error) => view.push(ChatEntry::ErrorNote(error.to_string())),
        },
    }
}

/// Run the interactive chat screen until the user quits.
pub async fn run_chat_tui(
    config: ConfabConfig,
    backend: Arc<dyn ChatBackend>,
    controller: Arc<ChatController>,
) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let term_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(term_backend)?;
    terminal.clear()?;

    let result = run_loop(&mut terminal, &config, backend, controller).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: &ConfabConfig,
    backend: Arc<dyn ChatBackend>,
    controller: Arc<ChatController>,
) -> io::Result<()> {
    let options = ChatViewOptions::new(config);
    let mut view = ChatView::new(options.show_thinking, options.max_entries);
    let mut input = String::new();
    let mut input_history = InputHistory::new(100);
    let mut completion_state: Option<CompletionState> = None;
    let mut mode = InputMode::Compose;
    let editing = Arc::new(AtomicBool::new(false));
    let mut pending: Option<PendingAction> = None;
    let mut scroll = ScrollState::default();
    let mut send_handle: Option<JoinHandle<Result<SendOutcome, ClientError>>> = None;
    let mut pending_user_index = 0usize;
    let mut pending_rebuild = false;
    let mut session_name: Option<String> = None;
    let mut should_quit = false;
    let base_url = config.backend.base_url.clone();
    let poll_secs = config.polling.interval_secs;

    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (poll_tx, mut poll_rx) = mpsc::unbounded_channel::<PollUpdate>();
    let poller_handle = if poll_secs > 0 {
        Some(
            HistoryPoller::new(
                backend.clone(),
                controller.clone(),
                editing.clone(),
                Duration::from_secs(poll_secs),
            )
            .spawn(poll_tx),
        )
    } else {
        None
    };

    match controller.load_history().await {
        Ok(messages) => {
            view.rebuild(&messages);
            if messages.is_empty() {
                view.push(ChatEntry::SystemNote(
                    "Connected. Type a message and press Enter.  /help for commands".to_string(),
                ));
            }
        }
        Err(error) => {
            view.push(ChatEntry::ErrorNote(format!(
                "could not load history: {}",
                error
            )));
        }
    }

    while !should_quit {
        while let Ok(ui_event) = ui_rx.try_recv() {
            apply_ui_event(&mut view, ui_event, pending_user_index);
        }

        while let Ok(update) = poll_rx.try_recv() {
            match update {
                PollUpdate::HistoryChanged(messages) => {
                    if send_handle.is_some() {
                        pending_rebuild = true;
                    } else {
                        view.rebuild(&messages);
                    }
                }
            }
        }

        if let Some(handle) = send_handle.take_if(|handle| handle.is_finished()) {
            // Apply trailing stream events before reporting the outcome.
            while let Ok(ui_event) = ui_rx.try_recv() {
                apply_ui_event(&mut view, ui_event, pending_user_index);
            }
            match handle.await {
                Ok(Ok(_)) => {}
                Ok(Err(error)) => view.push(ChatEntry::ErrorNote(error.to_string())),
                Err(join_error) => {
                    if !join_error.is_cancelled() {
                        view.push(ChatEntry::ErrorNote(format!(
                            "send task failed: {}",
                            join_error
                        )));
                    }
                }
            }
            if pending_rebuild {
                pending_rebuild = false;
                view.rebuild(&controller.transcript());
            }
        }

        let phase = controller.phase();
        let is_busy = send_handle.is_some();

        terminal.draw(|f| {
            let theme = TuiTheme::default_dark();
            let constraints = tui_layout_constraints(pending.is_some(), input_line_count(&input));
            let areas = Layout::default()
                .direction(Direction::Vertical)
                .constraints(constraints)
                .split(f.area());
            let n = areas.len();
            let body_idx = 1;
            let hint_idx = n - 2;
            let input_idx = n - 1;

            // [0] Title bar
            let title = build_title_bar(&base_url, session_name.as_deref(), phase, poll_secs, &theme);
            f.render_widget(
                Paragraph::new(title).style(Style::default().bg(Color::Rgb(30, 30, 30))),
                areas[0],
            );

            // [1] Conversation body
            let body_block = Block::default()
                .title(Span::styled(
                    " Conversation ",
                    Style::default().fg(theme.primary),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border_normal));
            let inner = body_block.inner(areas[body_idx]);
            scroll.body_height = (inner.height as usize).max(1);
            let styled_lines = style_chat_entries(view.entries());
            let display_line_count = styled_lines.len();
            let offset = effective_scroll(display_line_count, &scroll);
            let body = Paragraph::new(Text::from(styled_lines))
                .block(body_block)
                .wrap(Wrap { trim: false })
                .scroll((offset as u16, 0));
            f.render_widget(body, areas[body_idx]);
            if display_line_count > scroll.body_height {
                let mut scrollbar_state =
                    ScrollbarState::new(display_line_count).position(offset);
                let scrollbar = Scrollbar::default()
                    .orientation(ScrollbarOrientation::VerticalRight)
                    .thumb_style(Style::default().fg(theme.text_muted));
                f.render_stateful_widget(scrollbar, areas[body_idx], &mut scrollbar_state);
            }

            // [2] Confirmation bar (conditional)
            if let Some(action) = pending.as_ref() {
                let confirm = build_confirm_bar(&action.prompt(), &theme);
                f.render_widget(Paragraph::new(Text::from(confirm)), areas[2]);
            }

            // [n-2] Status / hint bar
            let editing_index = match mode {
                InputMode::Edit { index } => Some(index),
                InputMode::Compose => None,
            };
            let hint = build_status_hint_bar(
                input.as_str(),
                completion_state.as_ref(),
                editing_index,
                is_busy,
                view.show_thinking(),
                &theme,
            );
            f.render_widget(
                Paragraph::new(hint).style(Style::default().bg(Color::Rgb(25, 25, 25))),
                areas[hint_idx],
            );

            // [n-1] Input area (multiline)
            let input_title = match mode {
                InputMode::Edit { index } => format!(" edit #{} ", index),
                InputMode::Compose if input.contains('\n') => " > (multiline) ".to_string(),
                InputMode::Compose => " > ".to_string(),
            };
            let input_border = match mode {
                InputMode::Edit { .. } => theme.warning,
                InputMode::Compose => theme.border_active,
            };
            let input_block = Block::default()
                .title(Span::styled(
                    input_title,
                    Style::default()
                        .fg(theme.primary)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(input_border));
            let input_lines: Vec<Line<'_>> = input
                .split('\n')
                .map(|l| Line::from(l.to_string()))
                .collect();
            f.render_widget(
                Paragraph::new(Text::from(input_lines)).block(input_block),
                areas[input_idx],
            );
            let (x, y) = input_cursor_position(&input, areas[input_idx]);
            f.set_cursor_position((x, y));
        })?;

        if event::poll(Duration::from_millis(20))? {
            match event::read()? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }

                    if key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        if let Some(handle) = send_handle.take() {
                            handle.abort();
                            let _ = handle.await;
                            // Drop events from the aborted attempt; the
                            // transcript is the source of truth now.
                            while ui_rx.try_recv().is_ok() {}
                            pending_rebuild = false;
                            view.rebuild(&controller.transcript());
                            view.push(ChatEntry::WarningNote("send cancelled".to_string()));
                        } else {
                            should_quit = true;
                        }
                        continue;
                    }

                    if let Some(action) = pending.take() {
                        match key.code {
                            KeyCode::Char('y') | KeyCode::Char('Y') => {
                                run_pending_action(action, &controller, &backend, &mut view)
                                    .await;
                            }
                            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                                view.push(ChatEntry::SystemNote("cancelled".to_string()));
                            }
                            _ => {
                                // Not consumed; keep asking.
                                pending = Some(action);
                            }
                        }
                        continue;
                    }

                    if key.code == KeyCode::Esc {
                        if let InputMode::Edit { index } = mode {
                            mode = InputMode::Compose;
                            editing.store(false, Ordering::SeqCst);
                            input.clear();
                            completion_state = None;
                            view.push(ChatEntry::SystemNote(format!(
                                "edit of #{} cancelled",
                                index
                            )));
                        } else {
                            should_quit = true;
                        }
                        continue;
                    }

                    if key.code == KeyCode::Char('r')
                        && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        let shown = view.toggle_thinking();
                        view.push(ChatEntry::SystemNote(format!(
                            "thinking blocks {}",
                            if shown { "shown" } else { "hidden" }
                        )));
                        continue;
                    }

                    if handle_scroll_key(&key, &mut scroll, total_display_lines(view.entries())) {
                        continue;
                    }

                    if send_handle.is_some() {
                        // While a send is in flight only Ctrl+C and
                        // scrolling are active.
                        continue;
                    }

                    match key.code {
                        KeyCode::Tab if mode == InputMode::Compose => {
                            apply_slash_completion(&mut input, &mut completion_state, false);
                        }
                        KeyCode::BackTab if mode == InputMode::Compose => {
                            apply_slash_completion(&mut input, &mut completion_state, true);
                        }
                        KeyCode::Up if mode == InputMode::Compose => {
                            if let Some(prev) = input_history.up(&input) {
                                input = prev.to_string();
                            }
                        }
                        KeyCode::Down if mode == InputMode::Compose => {
                            if let Some(next) = input_history.down() {
                                input = next.to_string();
                            }
                        }
                        KeyCode::Enter
                            if key.modifiers.contains(KeyModifiers::SHIFT)
                                || key.modifiers.contains(KeyModifiers::ALT) =>
                        {
                            input.push('\n');
                        }
                        KeyCode::Enter => {
                            let line = input.trim().to_string();

                            if let InputMode::Edit { index } = mode {
                                if line.is_empty() {
                                    continue;
                                }
                                match controller.edit(index, &line).await {
                                    Ok(()) => {
                                        mode = InputMode::Compose;
                                        editing.store(false, Ordering::SeqCst);
                                        input.clear();
                                        completion_state = None;
                                        view.rebuild(&controller.transcript());
                                        view.push(ChatEntry::SystemNote(format!(
                                            "message #{} updated",
                                            index
                                        )));
                                    }
                                    Err(error) => {
                                        view.push(ChatEntry::ErrorNote(error.to_string()));
                                    }
                                }
                                continue;
                            }

                            input.clear();
                            completion_state = None;
                            if line.is_empty() {
                                continue;
                            }
                            input_history.push(line.clone());
                            input_history.reset();

                            if line.starts_with('/') {
                                match parse_slash_command(&line) {
                                    Err(message) => view.push(ChatEntry::ErrorNote(message)),
                                    Ok(SlashCommand::Help) => {
                                        for help_line in help_lines() {
                                            view.push(ChatEntry::SystemNote(help_line));
                                        }
                                    }
                                    Ok(SlashCommand::Status) => {
                                        view.push(ChatEntry::SystemNote(format!(
                                            "backend: {}",
                                            base_url
                                        )));
                                        view.push(ChatEntry::SystemNote(
                                            if config.streaming.enabled {
                                                format!(
                                                    "streaming: enabled (timeout {}s)",
                                                    config.streaming.stream_timeout_secs
                                                )
                                            } else {
                                                "streaming: disabled".to_string()
                                            },
                                        ));
                                        view.push(ChatEntry::SystemNote(if poll_secs == 0 {
                                            "polling: disabled".to_string()
                                        } else {
                                            format!("polling: every {}s", poll_secs)
                                        }));
                                        if let Some(name) = session_name.as_deref() {
                                            view.push(ChatEntry::SystemNote(format!(
                                                "session: {}",
                                                name
                                            )));
                                        }
                                        match backend.health().await {
                                            Ok(health) => {
                                                view.push(ChatEntry::SystemNote(format!(
                                                    "health: {} (upstream: {})",
                                                    health.status,
                                                    health.backend.as_deref().unwrap_or("unknown")
                                                )));
                                            }
                                            Err(error) => {
                                                view.push(ChatEntry::WarningNote(format!(
                                                    "health: unreachable ({})",
                                                    error
                                                )));
                                            }
                                        }
                                        view.push(ChatEntry::SystemNote(format!(
                                            "transcript: {} message(s)",
                                            controller.transcript_len()
                                        )));
                                    }
                                    Ok(SlashCommand::Thinking) => {
                                        let shown = view.toggle_thinking();
                                        view.push(ChatEntry::SystemNote(format!(
                                            "thinking blocks {}",
                                            if shown { "shown" } else { "hidden" }
                                        )));
                                    }
                                    Ok(SlashCommand::Edit { index }) => {
                                        let messages = controller.transcript();
                                        match messages.get(index) {
                                            Some(message) => {
                                                input = message.content.clone();
                                                mode = InputMode::Edit { index };
                                                editing.store(true, Ordering::SeqCst);
                                                view.push(ChatEntry::SystemNote(format!(
                                                    "editing #{}: Enter saves, Esc cancels",
                                                    index
                                                )));
                                            }
                                            None => {
                                                view.push(ChatEntry::ErrorNote(
                                                    ClientError::InvalidIndex {
                                                        index,
                                                        len: messages.len(),
                                                    }
                                                    .to_string(),
                                                ));
                                            }
                                        }
                                    }
                                    Ok(SlashCommand::Delete { index }) => {
                                        match controller.plan_delete(index) {
                                            Ok(plan) => {
                                                pending = Some(PendingAction::DeleteFrom {
                                                    index: plan.start,
                                                    count: plan.count,
                                                    breaks_exchange: plan.breaks_exchange,
                                                });
                                            }
                                            Err(error) => view
                                                .push(ChatEntry::ErrorNote(error.to_string())),
                                        }
                                    }
                                    Ok(SlashCommand::Regenerate { index }) => {
                                        match controller.prepare_regenerate(index).await {
                                            Ok(plan) => {
                                                view.rebuild(&controller.transcript());
                                                scroll.auto_follow = true;
                                                pending_user_index =
                                                    controller.transcript_len();
                                                send_handle = Some(spawn_send(
                                                    &controller,
                                                    &ui_tx,
                                                    plan.prompt,
                                                ));
                                            }
                                            Err(error) => view
                                                .push(ChatEntry::ErrorNote(error.to_string())),
                                        }
                                    }
                                    Ok(SlashCommand::Continue) => {
                                        match controller.prepare_continue().await {
                                            Ok(plan) => {
                                                view.rebuild(&controller.transcript());
                                                scroll.auto_follow = true;
                                                pending_user_index =
                                                    controller.transcript_len();
                                                send_handle = Some(spawn_send(
                                                    &controller,
                                                    &ui_tx,
                                                    plan.prompt,
                                                ));
                                            }
                                            Err(error) => view
                                                .push(ChatEntry::ErrorNote(error.to_string())),
                                        }
                                    }
                                    Ok(SlashCommand::Reset) => {
                                        pending = Some(PendingAction::Reset);
                                    }
                                    Ok(SlashCommand::Sessions) => match backend.sessions().await {
                                        Ok(sessions) if sessions.is_empty() => {
                                            view.push(ChatEntry::SystemNote(
                                                "(no sessions)".to_string(),
                                            ));
                                        }
                                        Ok(sessions) => {
                                            for session in sessions {
                                                view.push(ChatEntry::SystemNote(format!(
                                                    "{}  {}  {} message(s)",
                                                    session.id,
                                                    session.name,
                                                    session.message_count
                                                )));
                                            }
                                        }
                                        Err(error) => {
                                            view.push(ChatEntry::ErrorNote(error.to_string()));
                                        }
                                    },
                                    Ok(SlashCommand::SessionNew) => {
                                        match backend.create_session().await {
                                            Ok(info) => {
                                                match controller.switch_session(&info.id).await {
                                                    Ok(messages) => {
                                                        view.rebuild(&messages);
                                                        session_name =
                                                            Some(if info.name.is_empty() {
                                                                info.id.clone()
                                                            } else {
                                                                info.name.clone()
                                                            });
                                                        view.push(ChatEntry::SystemNote(
                                                            format!(
                                                                "switched to new session {}",
                                                                info.id
                                                            ),
                                                        ));
                                                    }
                                                    Err(error) => view.push(
                                                        ChatEntry::ErrorNote(error.to_string()),
                                                    ),
                                                }
                                            }
                                            Err(error) => view
                                                .push(ChatEntry::ErrorNote(error.to_string())),
                                        }
                                    }
                                    Ok(SlashCommand::SessionUse { id }) => {
                                        match controller.switch_session(&id).await {
                                            Ok(messages) => {
                                                view.rebuild(&messages);
                                                view.push(ChatEntry::SystemNote(format!(
                                                    "switched to session {}",
                                                    id
                                                )));
                                                session_name = Some(id);
                                            }
                                            Err(error) => view
                                                .push(ChatEntry::ErrorNote(error.to_string())),
                                        }
                                    }
                                    Ok(SlashCommand::SessionDelete { id }) => {
                                        pending = Some(PendingAction::SessionDelete { id });
                                    }
                                    Ok(SlashCommand::Copy { path }) => {
                                        let path = path.unwrap_or_else(default_copy_path);
                                        match std::fs::write(&path, view.to_plain_text()) {
                                            Ok(()) => view.push(ChatEntry::SystemNote(format!(
                                                "transcript saved to {}",
                                                path.display()
                                            ))),
                                            Err(error) => {
                                                view.push(ChatEntry::ErrorNote(format!(
                                                    "could not write {}: {}",
                                                    path.display(),
                                                    error
                                                )));
                                            }
                                        }
                                    }
                                    Ok(SlashCommand::Exit) => should_quit = true,
                                }
                                continue;
                            }

                            pending_user_index = controller.transcript_len();
                            scroll.auto_follow = true;
                            send_handle = Some(spawn_send(&controller, &ui_tx, line));
                        }
                        KeyCode::Backspace => {
                            input.pop();
                            completion_state = None;
                        }
                        KeyCode::Char(ch) => {
                            if !key.modifiers.contains(KeyModifiers::CONTROL) {
                                input.push(ch);
                                completion_state = None;
                            }
                        }
                        _ => {}
                    }
                }
                Event::Mouse(mouse) => {
                    let _ =
                        handle_scroll_mouse(&mouse, &mut scroll, total_display_lines(view.entries()));
                }
                _ => {}
            }
        }
    }

    if let Some(handle) = send_handle.take() {
        handle.abort();
    }
    if let Some(handle) = poller_handle {
        handle.abort();
    }
    Ok(())
}
