//! CLI - command line surface and dispatch.
//!
//! Available Commands:
//! - confab                - Interactive TUI chat (default)
//! - confab send -m "..."  - One-shot send with streamed stdout output
//! - confab history        - Print the transcript
//! - confab reset          - Clear the backend transcript
//! - confab status         - Show configuration and backend health
//! - confab sessions       - List backend sessions

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::info;

use confab_core::{
    ChatBackend, ChatController, ClientError, ConfabConfig, ConfigError, ControllerOptions,
    HttpBackend,
};

use crate::interactive::{StreamPrinter, render_plain};

/// CLI Errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Client(#[from] ClientError),

    #[error("Terminal error: {0}")]
    Terminal(#[from] std::io::Error),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Confab CLI
#[derive(Parser, Debug)]
#[command(name = "confab")]
#[command(author, version, long_about = None)]
#[command(about = "Terminal chat client for an SSE-streaming chat relay")]
pub(crate) struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    pub(crate) config: Option<PathBuf>,

    /// Backend base URL (overrides config)
    #[arg(short, long, global = true)]
    pub(crate) backend_url: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Interactive TUI chat (the default when no command is given)
    Chat(ChatArgs),

    /// Send one message and print the reply
    Send(SendArgs),

    /// Print the transcript
    History(HistoryArgs),

    /// Clear the backend transcript
    Reset(ResetArgs),

    /// Show configuration and backend health
    Status,

    /// List backend sessions
    Sessions,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ChatArgs {
    /// Start with reasoning blocks expanded
    #[arg(long)]
    pub thinking: bool,
}

#[derive(Args, Debug)]
pub(crate) struct SendArgs {
    /// Message to send
    #[arg(short = 'm', long)]
    pub message: String,

    /// Disable streaming for this send
    #[arg(long)]
    pub no_stream: bool,

    /// Print reasoning blocks instead of hiding them
    #[arg(long)]
    pub thinking: bool,
}

#[derive(Args, Debug)]
pub(crate) struct HistoryArgs {
    /// Output machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ResetArgs {
    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Parse CLI arguments and execute commands
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt::init();
    }

    let mut config = ConfabConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.backend_url {
        config.backend.base_url = url;
    }

    match cli.command.unwrap_or(Commands::Chat(ChatArgs::default())) {
        Commands::Chat(args) => cmd_chat(args, config).await,
        Commands::Send(args) => cmd_send(args, config).await,
        Commands::History(args) => cmd_history(args, config).await,
        Commands::Reset(args) => cmd_reset(args, config).await,
        Commands::Status => cmd_status(config).await,
        Commands::Sessions => cmd_sessions(config).await,
    }
}

fn build_backend(config: &ConfabConfig) -> Result<Arc<HttpBackend>, ClientError> {
    Ok(Arc::new(HttpBackend::new(
        config.backend.base_url.clone(),
        Duration::from_secs(config.backend.request_timeout_secs),
        Duration::from_secs(config.streaming.stream_timeout_secs),
    )?))
}

fn build_controller(backend: Arc<HttpBackend>, config: &ConfabConfig) -> Arc<ChatController> {
    Arc::new(ChatController::new(
        backend,
        ControllerOptions::from_config(config),
    ))
}

async fn cmd_chat(args: ChatArgs, mut config: ConfabConfig) -> Result<(), CliError> {
    if args.thinking {
        config.ui.show_thinking = true;
    }
    let backend = build_backend(&config)?;
    let controller = build_controller(backend.clone(), &config);
    info!(backend = %config.backend.base_url, "starting chat TUI");
    crate::tui::run_chat_tui(config, backend, controller).await?;
    Ok(())
}

async fn cmd_send(args: SendArgs, mut config: ConfabConfig) -> Result<(), CliError> {
    if args.no_stream {
        config.streaming.enabled = false;
    }
    let backend = build_backend(&config)?;
    let controller = build_controller(backend, &config);

    let mut sink = StreamPrinter::new(args.thinking, !config.streaming.enabled);
    controller.send(&args.message, &mut sink).await?;
    sink.finish();
    Ok(())
}

async fn cmd_history(args: HistoryArgs, config: ConfabConfig) -> Result<(), CliError> {
    let backend = build_backend(&config)?;
    let messages = backend.history().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }
    if messages.is_empty() {
        println!("(transcript is empty)");
        return Ok(());
    }
    for (index, message) in messages.iter().enumerate() {
        let when = message
            .timestamp
            .map(|t| format!(" ({})", t.format("%Y-%m-%d %H:%M")))
            .unwrap_or_default();
        println!("[#{index}] {}{when}", message.role.label());
        let body = render_plain(&message.content, config.ui.show_thinking);
        for line in body.lines() {
            println!("    {line}");
        }
        println!();
    }
    Ok(())
}

async fn cmd_reset(args: ResetArgs, config: ConfabConfig) -> Result<(), CliError> {
    if !args.yes && !confirm("Clear the entire backend transcript?")? {
        println!("Cancelled.");
        return Ok(());
    }
    let backend = build_backend(&config)?;
    backend.reset().await?;
    println!("Transcript cleared.");
    Ok(())
}

async fn cmd_status(config: ConfabConfig) -> Result<(), CliError> {
    println!("Confab status:");
    println!("  Backend URL:    {}", config.backend.base_url);
    println!(
        "  Streaming:      {} (timeout {}s)",
        if config.streaming.enabled { "enabled" } else { "disabled" },
        config.streaming.stream_timeout_secs
    );
    match config.polling.interval_secs {
        0 => println!("  Polling:        disabled"),
        secs => println!("  Polling:        every {secs}s"),
    }

    // Health is informational; an unreachable backend is not a CLI error.
    let backend = build_backend(&config)?;
    match backend.health().await {
        Ok(health) => {
            let upstream = health.backend.as_deref().unwrap_or("unknown");
            println!("  Health:         {} (upstream: {upstream})", health.status);
        }
        Err(error) => {
            println!("  Health:         unreachable ({error})");
        }
    }
    Ok(())
}

async fn cmd_sessions(config: ConfabConfig) -> Result<(), CliError> {
    let backend = build_backend(&config)?;
    let sessions = backend.sessions().await?;
    if sessions.is_empty() {
        println!("(no sessions)");
        return Ok(());
    }
    for session in &sessions {
        let last = session
            .last_active
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {}  {} message(s)  last active {}",
            session.id, session.name, session.message_count, last
        );
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool, CliError> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
