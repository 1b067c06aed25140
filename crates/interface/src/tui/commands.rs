//! Slash command set: parsing, confirmation prompts, and help text.

use std::path::PathBuf;

use super::parse_slash_tokens;

/// A parsed slash command, ready to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SlashCommand {
    Help,
    Status,
    Thinking,
    Edit { index: usize },
    Delete { index: usize },
    Regenerate { index: usize },
    Continue,
    Reset,
    Sessions,
    SessionNew,
    SessionUse { id: String },
    SessionDelete { id: String },
    Copy { path: Option<PathBuf> },
    Exit,
}

/// A destructive action awaiting a y/n answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingAction {
    DeleteFrom {
        index: usize,
        count: usize,
        breaks_exchange: bool,
    },
    Reset,
    SessionDelete {
        id: String,
    },
}

impl PendingAction {
    pub(crate) fn prompt(&self) -> String {
        match self {
            PendingAction::DeleteFrom {
                index,
                count,
                breaks_exchange,
            } => {
                let mut prompt = if *count == 1 {
                    format!("Delete message #{}?", index)
                } else {
                    format!("Delete {} messages from #{} to the end?", count, index)
                };
                if *breaks_exchange {
                    prompt.push_str(&format!(
                        " The question at #{} will be left unanswered.",
                        index.saturating_sub(1)
                    ));
                }
                prompt
            }
            PendingAction::Reset => "Clear the entire transcript?".to_string(),
            PendingAction::SessionDelete { id } => format!("Delete session '{}'?", id),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SlashCommandSpec {
    pub(crate) command: &'static str,
    pub(crate) summary: &'static str,
}

pub(crate) const SLASH_COMMAND_SPECS: &[SlashCommandSpec] = &[
    SlashCommandSpec {
        command: "/help",
        summary: "show this list",
    },
    SlashCommandSpec {
        command: "/status",
        summary: "backend, streaming, and polling state",
    },
    SlashCommandSpec {
        command: "/thinking",
        summary: "toggle reasoning blocks",
    },
    SlashCommandSpec {
        command: "/edit",
        summary: "edit a message by index",
    },
    SlashCommandSpec {
        command: "/delete",
        summary: "delete from an index to the end",
    },
    SlashCommandSpec {
        command: "/regen",
        summary: "regenerate a reply",
    },
    SlashCommandSpec {
        command: "/continue",
        summary: "answer the last unanswered message",
    },
    SlashCommandSpec {
        command: "/reset",
        summary: "clear the transcript",
    },
    SlashCommandSpec {
        command: "/sessions",
        summary: "list sessions",
    },
    SlashCommandSpec {
        command: "/session",
        summary: "new | use <id> | delete <id>",
    },
    SlashCommandSpec {
        command: "/copy",
        summary: "save the transcript to a file",
    },
    SlashCommandSpec {
        command: "/exit",
        summary: "quit",
    },
];

pub(crate) fn canonical_slash_command(command: &str) -> &str {
    match command {
        "/help" | "/h" => "/help",
        "/status" | "/st" => "/status",
        "/thinking" | "/t" => "/thinking",
        "/edit" | "/e" => "/edit",
        "/delete" | "/del" | "/d" => "/delete",
        "/regen" | "/regenerate" | "/r" => "/regen",
        "/continue" | "/cont" => "/continue",
        "/exit" | "/quit" | "/q" => "/exit",
        _ => command,
    }
}

pub(crate) fn slash_argument_options(command: &str) -> Option<&'static [&'static str]> {
    match canonical_slash_command(command) {
        "/session" => Some(&["new", "use", "delete"]),
        _ => None,
    }
}

/// Parse one input line as a slash command. The error is a usage string
/// suitable for display.
pub(crate) fn parse_slash_command(input: &str) -> Result<SlashCommand, String> {
    let Some((_, command_norm, args, _)) = parse_slash_tokens(input) else {
        return Err(format!("not a command: '{}'", input.trim()));
    };
    match canonical_slash_command(command_norm.as_str()) {
        "/help" => Ok(SlashCommand::Help),
        "/status" => Ok(SlashCommand::Status),
        "/thinking" => Ok(SlashCommand::Thinking),
        "/edit" => parse_index(args.first(), "/edit").map(|index| SlashCommand::Edit { index }),
        "/delete" => {
            parse_index(args.first(), "/delete").map(|index| SlashCommand::Delete { index })
        }
        "/regen" => {
            parse_index(args.first(), "/regen").map(|index| SlashCommand::Regenerate { index })
        }
        "/continue" => Ok(SlashCommand::Continue),
        "/reset" => Ok(SlashCommand::Reset),
        "/sessions" => Ok(SlashCommand::Sessions),
        "/session" => match args.first().map(String::as_str) {
            Some("new") => Ok(SlashCommand::SessionNew),
            Some("use") => match args.get(1) {
                Some(id) => Ok(SlashCommand::SessionUse { id: id.clone() }),
                None => Err("Usage: /session use <id>".to_string()),
            },
            Some("delete") => match args.get(1) {
                Some(id) => Ok(SlashCommand::SessionDelete { id: id.clone() }),
                None => Err("Usage: /session delete <id>".to_string()),
            },
            _ => Err("Usage: /session new | use <id> | delete <id>".to_string()),
        },
        "/copy" => Ok(SlashCommand::Copy {
            path: args.first().map(PathBuf::from),
        }),
        "/exit" => Ok(SlashCommand::Exit),
        other => Err(format!("Unknown command '{}'. Try /help.", other)),
    }
}

/// Parse a message index argument; a leading `#` is tolerated.
fn parse_index(arg: Option<&String>, command: &str) -> Result<usize, String> {
    let raw = arg.ok_or_else(|| format!("Usage: {} <index>", command))?;
    raw.trim_start_matches('#')
        .parse::<usize>()
        .map_err(|_| format!("'{}' is not a message index. Usage: {} <index>", raw, command))
}

pub(crate) fn help_lines() -> Vec<String> {
    SLASH_COMMAND_SPECS
        .iter()
        .map(|spec| format!("{:<10} {}", spec.command, spec.summary))
        .collect()
}
