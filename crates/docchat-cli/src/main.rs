//! docchat - ask a documentation assistant from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # One question, answer streamed to stdout
//! docchat ask "What is Ethereum?"
//!
//! # Interactive chat (the default)
//! docchat chat
//!
//! # Print the saved conversation
//! docchat --transcript ~/.docchat.json history
//!
//! # Verbose logging
//! RUST_LOG=debug docchat ask "What's the Shapella upgrade?"
//! ```

mod app;
mod render;
mod repl;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docchat_core::config::ConfigError;
use docchat_core::persistence::load_transcript_if_exists;
use docchat_core::{ClientConfig, ConversationStore, SessionError};

use app::App;

#[derive(Parser, Debug)]
#[command(name = "docchat")]
#[command(author, version, about = "Ask a documentation assistant", long_about = None)]
struct Args {
    /// Configuration file (default: ~/.config/docchat/config.json)
    #[arg(short = 'c', long, env = "DOCCHAT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Streaming answer endpoint
    #[arg(short = 'e', long, env = "DOCCHAT_ENDPOINT", value_name = "URL")]
    endpoint: Option<String>,

    /// API key forwarded to the backend
    #[arg(short = 'k', long, env = "DOCCHAT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Save the conversation here after every answer and restore it on start
    #[arg(short = 't', long, env = "DOCCHAT_TRANSCRIPT", value_name = "FILE")]
    transcript: Option<PathBuf>,

    /// Write a raw wire log per exchange into this directory
    #[arg(long, env = "DOCCHAT_LOG_DIR", value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Seconds of stream silence before giving up (0 waits forever)
    #[arg(long, value_name = "SECS")]
    idle_timeout: Option<u64>,

    /// Start without the assistant greeting
    #[arg(long)]
    no_greeting: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Ask one question and print the answer
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Interactive chat
    Chat,
    /// Print the saved conversation
    History,
}

fn load_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => match ClientConfig::load_default() {
            Err(ConfigError::NoHomeDir) => {
                log::warn!("Home directory not set, using default config");
                ClientConfig::default()
            }
            other => other?,
        },
    };
    apply_overrides(&mut config, args);
    Ok(config)
}

/// Command-line flags (and their environment variables) win over the file.
fn apply_overrides(config: &mut ClientConfig, args: &Args) {
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(path) = &args.transcript {
        config.transcript_path = Some(path.clone());
    }
    if let Some(dir) = &args.log_dir {
        config.log_dir = Some(dir.clone());
    }
    if let Some(secs) = args.idle_timeout {
        config.idle_timeout_secs = secs;
    }
    if args.no_greeting {
        config.greeting = None;
    }
}

fn print_history(config: &ClientConfig) -> anyhow::Result<()> {
    let path = config
        .transcript_path
        .as_ref()
        .context("No transcript configured; pass --transcript or set transcriptPath")?;
    let transcript = load_transcript_if_exists(path)
        .with_context(|| format!("Failed to read transcript {}", path.display()))?;

    match transcript {
        Some(transcript) => {
            let store = ConversationStore::new();
            store.restore(transcript)?;
            println!("{}", render::format_transcript(&store.snapshot()));
        }
        None => println!("No conversation saved at {}", path.display()),
    }
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<i32> {
    let config = load_config(&args)?;

    match args.command.unwrap_or(Command::Chat) {
        Command::Ask { question } => {
            let app = App::new(&config, args.api_key)?;
            match app.ask(&question.join(" ")).await {
                Ok(_) => Ok(0),
                Err(SessionError::Aborted) => Ok(130),
                Err(e) => {
                    eprintln!("error: {}", e);
                    Ok(1)
                }
            }
        }
        Command::Chat => {
            let app = App::new(&config, args.api_key)?;
            repl::run(&app).await?;
            Ok(0)
        }
        Command::History => {
            print_history(&config)?;
            Ok(0)
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let code = match run(Args::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            1
        }
    };

    // Exit without waiting on the blocking stdin reader.
    std::process::exit(code)
}
