//! Chat CLI - Headless Streaming Chat Driver
//!
//! Sends one message to a chat backend and prints the streamed reply as it
//! arrives. Logs go to stderr, so stdout carries only the reply text.
//!
//! # Usage
//!
//! ```bash
//! # Ask the default (love) assistant
//! chat-cli "How do I apologise properly?"
//!
//! # Use the general-purpose agent against a specific backend
//! chat-cli --variant super --base-url http://10.0.0.2:8123/api "Plan my week"
//!
//! # With config file and verbose logging
//! RUST_LOG=debug chat-cli --config ./chat.toml "hello"
//! ```
//!
//! # Exit Status
//!
//! - `0`: the reply completed
//! - `1`: the stream failed
//! - `130`: interrupted with Ctrl-C

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use chat_core::{
    load_config, load_config_from_path, ChatDispatcher, ConfigOverrides, ConnectionManager,
    ConnectionStatus, ConversationVariant, MessageKind, SessionStore, SseTransport, StoreEvent,
};

/// Chat CLI - send one message and stream the reply
#[derive(Parser, Debug)]
#[command(name = "chat-cli")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "CHAT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Endpoint base address (overrides config and environment)
    #[arg(short = 'b', long, value_name = "URL")]
    base_url: Option<String>,

    /// Conversation variant (love or super)
    #[arg(short = 'v', long, value_parser = parse_variant)]
    variant: Option<ConversationVariant>,

    /// Session title
    #[arg(short = 't', long)]
    title: Option<String>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "CHAT_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Message to send
    message: String,
}

fn parse_variant(s: &str) -> Result<ConversationVariant, String> {
    s.parse::<ConversationVariant>().map_err(|e| e.to_string())
}

/// Initialize logging to stderr
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("chat_cli={level},chat_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let mut config = match args.config {
        Some(path) => load_config_from_path(Some(path)),
        None => load_config(),
    }
    .context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(url) = args.base_url {
        overrides = overrides.with_base_url(url);
    }
    if let Some(variant) = args.variant {
        overrides = overrides.with_default_variant(variant);
    }
    overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let variant = config.default_variant;
    let base_url = config.resolved_base_url();
    info!(
        variant = %variant,
        base_url = %base_url,
        source = %config.source(),
        "Starting chat"
    );

    let transport = SseTransport::from_config(&config).context("Failed to build HTTP client")?;
    let store = SessionStore::new();
    let dispatcher =
        ChatDispatcher::new(ConnectionManager::new(transport), store.clone(), base_url);

    let session = store.create_session(variant, args.title.as_deref());

    // Forward store events into the main loop
    let (event_tx, mut events) = mpsc::unbounded_channel();
    store.subscribe(move |event| {
        let _ = event_tx.send(event.clone());
    });

    let reply = dispatcher.send_message(&session, variant, &args.message)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut stdout = std::io::stdout();
    let mut printed = 0usize;

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                dispatcher.connections().close_all();
                writeln!(stdout)?;
                return Ok(ExitCode::from(130));
            }
            event = events.recv() => {
                let Some(event) = event else {
                    return Ok(ExitCode::FAILURE);
                };

                match event {
                    StoreEvent::MessageUpdated { message_id, .. }
                        if message_id == reply.message_id =>
                    {
                        let Some(message) = store.message(&session, &message_id) else {
                            continue;
                        };

                        if message.kind == MessageKind::Error {
                            if printed > 0 {
                                writeln!(stdout)?;
                            }
                            let detail = message
                                .content
                                .get(printed..)
                                .filter(|rest| !rest.is_empty())
                                .unwrap_or(ConnectionStatus::Error.description());
                            eprintln!("error: {detail}");
                            return Ok(ExitCode::FAILURE);
                        }

                        if message.kind != MessageKind::Normal {
                            continue;
                        }

                        // Content only ever grows by appending
                        if let Some(delta) = message.content.get(printed..) {
                            write!(stdout, "{delta}")?;
                            stdout.flush()?;
                            printed = message.content.len();
                        }
                    }
                    StoreEvent::ConnectionStatusChanged(ConnectionStatus::Disconnected) => {
                        writeln!(stdout)?;
                        return Ok(ExitCode::SUCCESS);
                    }
                    _ => {}
                }
            }
        }
    }
}
