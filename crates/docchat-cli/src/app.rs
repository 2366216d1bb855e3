//! Wiring between the terminal and a streaming session.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use docchat_core::conversation::ExchangeId;
use docchat_core::persistence::{load_transcript_if_exists, save_transcript};
use docchat_core::{
    ClientConfig, ConversationEvent, ConversationStore, Exchange, HttpTransport, SessionError,
    StreamingAnswerSession,
};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::render;

pub struct App {
    session: StreamingAnswerSession,
    transcript_path: Option<PathBuf>,
}

impl App {
    /// Build the store (restoring the saved transcript, if any) and session.
    pub fn new(config: &ClientConfig, credential: Option<String>) -> anyhow::Result<Self> {
        let store = Arc::new(match &config.greeting {
            Some(greeting) => ConversationStore::with_greeting(greeting.as_str()),
            None => ConversationStore::new(),
        });

        if let Some(path) = &config.transcript_path {
            if let Some(transcript) = load_transcript_if_exists(path)? {
                log::info!(
                    "Restored {} exchanges from {}",
                    transcript.exchanges.len(),
                    path.display()
                );
                store.restore(transcript)?;
            }
        }
        if let Some(credential) = credential {
            store.set_credential(credential);
        }

        let transport = Arc::new(HttpTransport::from_config(config));
        log::debug!("Answer endpoint: {}", transport.endpoint());

        Ok(Self {
            session: StreamingAnswerSession::from_config(store, transport, config),
            transcript_path: config.transcript_path.clone(),
        })
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        self.session.store()
    }

    /// Ask a question, printing the answer as it streams.
    ///
    /// Ctrl-C aborts the exchange. The transcript is saved after a commit.
    pub async fn ask(&self, question: &str) -> Result<Exchange, SessionError> {
        let events = self.store().subscribe();
        let handle = self.session.submit(question)?;
        let aborter = handle.abort_handle();

        let printer = tokio::spawn(print_answer(events, handle.exchange_id().clone()));
        let mut waiter = tokio::task::spawn_blocking(move || handle.wait());

        let joined = tokio::select! {
            joined = &mut waiter => joined,
            _ = tokio::signal::ctrl_c() => {
                aborter.abort();
                waiter.await
            }
        };
        if let Err(e) = printer.await {
            log::warn!("Answer printer failed: {}", e);
        }

        let result = joined.unwrap_or_else(|_| Err(SessionError::WorkerPanicked));
        if result.is_ok() {
            self.save();
        }
        result
    }

    /// Save the transcript if a path is configured. Failures are logged.
    pub fn save(&self) {
        let Some(path) = &self.transcript_path else {
            return;
        };
        if let Err(e) = save_transcript(path, &self.store().transcript()) {
            log::warn!("Failed to save transcript to {}: {}", path.display(), e);
        }
    }
}

/// Print tokens of one exchange until it commits or aborts.
async fn print_answer(mut events: broadcast::Receiver<ConversationEvent>, exchange_id: ExchangeId) {
    let mut stdout = std::io::stdout();
    let mut started = false;

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(n)) => {
                log::warn!("Display fell behind by {} events", n);
                continue;
            }
            Err(RecvError::Closed) => return,
        };
        if event.exchange_id() != Some(&exchange_id) {
            continue;
        }

        match &event {
            ConversationEvent::Token { text, .. } => {
                if !started {
                    print!("assistant> ");
                    started = true;
                }
                print!("{}", text);
                let _ = stdout.flush();
            }
            ConversationEvent::Committed { answer, .. } => {
                if started {
                    println!();
                } else {
                    println!("{}", render::format_message(answer));
                }
                if let Some(sources) = render::format_sources(answer.source_documents.as_deref()) {
                    println!("{}", sources);
                }
            }
            ConversationEvent::Aborted { .. } if started => println!(),
            _ => {}
        }

        if event.is_terminal() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docchat_core::persistence::{save_transcript, Transcript};
    use docchat_core::HistoryPair;
    use tempfile::tempdir;

    fn config_in(dir: &std::path::Path) -> ClientConfig {
        ClientConfig {
            endpoint: "http://127.0.0.1:9/api/chat".to_string(),
            transcript_path: Some(dir.join("transcript.json")),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn new_store_opens_with_greeting() {
        let dir = tempdir().unwrap();
        let app = App::new(&config_in(dir.path()), None).unwrap();

        let state = app.store().snapshot();
        assert!(state.has_greeting());
        assert_eq!(state.committed().len(), 1);
    }

    #[test]
    fn restores_saved_transcript_and_credential() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        save_transcript(
            config.transcript_path.as_ref().unwrap(),
            &Transcript::new(
                vec![Exchange::user("Q"), Exchange::assistant("A", None)],
                vec![HistoryPair::new("Q", "A")],
            ),
        )
        .unwrap();

        let app = App::new(&config, Some("sk-test".to_string())).unwrap();

        let state = app.store().snapshot();
        assert_eq!(state.history_pairs().len(), 1);
        assert_eq!(state.committed().len(), 2);
        assert_eq!(state.credential(), "sk-test");
    }

    #[test]
    fn save_writes_transcript() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let app = App::new(&config, None).unwrap();

        app.save();

        let saved = load_transcript_if_exists(config.transcript_path.as_ref().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(saved.exchanges.len(), 1);
    }

    #[tokio::test]
    async fn failed_ask_keeps_question_and_saves_nothing() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let app = App::new(&config, None).unwrap();

        let result = app.ask("What is Ethereum?").await;

        assert!(matches!(result, Err(SessionError::Transport(_))));
        assert_eq!(app.store().snapshot().committed().len(), 2);
        assert!(!config.transcript_path.unwrap().exists());
    }
}
