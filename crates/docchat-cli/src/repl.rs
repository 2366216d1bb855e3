//! Interactive chat loop.

use std::io::Write;

use docchat_core::SessionError;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::app::App;
use crate::render;

const HELP: &str = "\
Type a question and press enter. Ctrl-C aborts a streaming answer.
  /history     list previous questions
  /select N    mark question N and its answer (again to deselect)
  /key KEY     set the API key sent with every question
  /help        show this help
  /quit        exit";

#[derive(Debug, PartialEq)]
pub enum Command {
    Ask(String),
    History,
    /// Zero-based history index.
    Select(usize),
    Key(String),
    Help,
    Quit,
}

/// Parse one input line. Lines not starting with `/` are questions.
pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Ask(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match name {
        "history" | "h" => Ok(Command::History),
        "select" | "s" => match arg.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(Command::Select(n - 1)),
            _ => Err(format!("Usage: /select N (N from 1), got {:?}", arg)),
        },
        "key" if !arg.is_empty() => Ok(Command::Key(arg.to_string())),
        "key" => Err("Usage: /key KEY".to_string()),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(format!("Unknown command /{}; try /help", other)),
    }
}

fn prompt() {
    print!("you> ");
    let _ = std::io::stdout().flush();
}

pub async fn run(app: &App) -> anyhow::Result<()> {
    let transcript = render::format_transcript(&app.store().snapshot());
    if !transcript.is_empty() {
        println!("{}", transcript);
    }
    println!("(/help for commands)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt();
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            return Ok(());
        };

        match parse(&line) {
            Ok(Command::Quit) => return Ok(()),
            Ok(Command::Help) => println!("{}", HELP),
            Ok(Command::History) => println!("{}", render::format_history(&app.store().snapshot())),
            Ok(Command::Select(index)) => match app.store().toggle_history(index) {
                Ok(Some(_)) => println!("{}", render::format_transcript(&app.store().snapshot())),
                Ok(None) => println!("Selection cleared."),
                Err(e) => eprintln!("{}", e),
            },
            Ok(Command::Key(key)) => {
                app.store().set_credential(key);
                println!("API key set.");
            }
            Ok(Command::Ask(question)) => match app.ask(&question).await {
                Ok(_) => {}
                Err(SessionError::Aborted) => println!("(aborted)"),
                Err(e) => eprintln!("error: {}", e),
            },
            Err(message) => eprintln!("{}", message),
        }
    }
}
