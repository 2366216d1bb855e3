//! Streaming answer sessions.
//!
//! [`StreamingAnswerSession::submit`] commits the user's question to the
//! store, then hands the request to a worker thread that reads the answer
//! stream and applies each event. The returned [`ExchangeHandle`] can abort
//! the exchange or wait for its outcome.
//!
//! At most one exchange is in flight per store. Every store mutation made on
//! behalf of an exchange carries its id, so once an exchange is aborted its
//! worker can no longer change the conversation, even if it is still blocked
//! on a read. Waiting on an aborted exchange returns at once; the detached
//! worker closes the stream the next time its read returns.

mod worker;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use thiserror::Error;

use crate::config::ClientConfig;
use crate::conversation::{
    AbortReason, ConversationEvent, ConversationStore, Exchange, ExchangeId, HistoryPair,
};
use crate::logging;
use crate::transport::{AnswerRequest, AnswerTransport, TransportError};

use worker::{abort_exchange, CompleteOnDrop, Outcome, StreamWorker};

pub const DEFAULT_MAX_QUESTION_CHARS: usize = 512;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Please input a question")]
    EmptyQuestion,

    #[error("Question is {len} characters long; the limit is {max}")]
    QuestionTooLong { len: usize, max: usize },

    #[error("An answer is already streaming")]
    Busy,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("The exchange was aborted")]
    Aborted,

    #[error("Failed to start stream worker: {0}")]
    Spawn(std::io::Error),

    #[error("Stream worker panicked")]
    WorkerPanicked,
}

impl SessionError {
    /// True when the submission was refused without touching the store.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SessionError::EmptyQuestion | SessionError::QuestionTooLong { .. } | SessionError::Busy
        )
    }
}

/// Submits questions and streams answers into a [`ConversationStore`].
pub struct StreamingAnswerSession {
    store: Arc<ConversationStore>,
    transport: Arc<dyn AnswerTransport>,
    max_question_chars: usize,
    log_dir: Option<PathBuf>,
}

impl StreamingAnswerSession {
    pub fn new(store: Arc<ConversationStore>, transport: Arc<dyn AnswerTransport>) -> Self {
        Self {
            store,
            transport,
            max_question_chars: DEFAULT_MAX_QUESTION_CHARS,
            log_dir: None,
        }
    }

    pub fn from_config(
        store: Arc<ConversationStore>,
        transport: Arc<dyn AnswerTransport>,
        config: &ClientConfig,
    ) -> Self {
        Self::new(store, transport)
            .with_max_question_chars(config.max_question_chars)
            .with_log_dir(config.log_dir.clone())
    }

    pub fn with_max_question_chars(mut self, max: usize) -> Self {
        self.max_question_chars = max;
        self
    }

    /// Write a wire log per exchange into `log_dir`.
    pub fn with_log_dir(mut self, log_dir: Option<PathBuf>) -> Self {
        self.log_dir = log_dir;
        self
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Ask a question using the store's own history and credential.
    ///
    /// `Ok` means the question was committed and a worker started; the
    /// request has not been sent yet. Connection and HTTP status failures
    /// come back from [`ExchangeHandle::wait`] as [`SessionError::Transport`].
    pub fn submit(&self, question: &str) -> Result<ExchangeHandle, SessionError> {
        self.start(question, None)
    }

    /// Ask a question with an explicit history and credential.
    ///
    /// The history is sent as given; the store's history still grows by one
    /// pair when the answer commits. Errors are reported as for
    /// [`submit`](Self::submit).
    pub fn submit_with_history(
        &self,
        question: &str,
        history: Vec<HistoryPair>,
        credential: &str,
    ) -> Result<ExchangeHandle, SessionError> {
        self.start(question, Some((history, credential.to_string())))
    }

    fn start(
        &self,
        question: &str,
        context: Option<(Vec<HistoryPair>, String)>,
    ) -> Result<ExchangeHandle, SessionError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SessionError::EmptyQuestion);
        }
        let len = question.chars().count();
        if len > self.max_question_chars {
            return Err(SessionError::QuestionTooLong {
                len,
                max: self.max_question_chars,
            });
        }

        // History must be read under the lock that commits the question.
        let (exchange_id, request) = self
            .store
            .apply(|state| {
                let Some(exchange_id) = state.begin_exchange(question.to_string()) else {
                    return (None, vec![]);
                };
                let (history, credential) = context.unwrap_or_else(|| {
                    (state.history_pairs().to_vec(), state.credential().to_string())
                });
                let request = AnswerRequest {
                    question: question.to_string(),
                    history,
                    credential,
                };
                let submitted = ConversationEvent::Submitted {
                    exchange_id: exchange_id.clone(),
                    question: state
                        .committed()
                        .last()
                        .cloned()
                        .unwrap_or_else(|| Exchange::user(question)),
                };
                (Some((exchange_id, request)), vec![submitted])
            })
            .ok_or(SessionError::Busy)?;

        log::info!(
            "[{}] submitted question with {} history pairs",
            exchange_id,
            request.history.len()
        );

        let cancel = Arc::new(AtomicBool::new(false));
        let worker = StreamWorker {
            store: Arc::clone(&self.store),
            transport: Arc::clone(&self.transport),
            exchange_id: exchange_id.clone(),
            request,
            cancel: Arc::clone(&cancel),
            wire_log: logging::open_log_file(self.log_dir.as_deref(), &exchange_id.0),
        };

        let outcome = Arc::new(Outcome::new());
        let worker_outcome = Arc::clone(&outcome);
        let spawned = thread::Builder::new()
            .name(format!("docchat-stream-{}", exchange_id))
            .spawn(move || {
                let guard = CompleteOnDrop(worker_outcome);
                guard.0.complete(worker.run());
            });

        match spawned {
            Ok(_) => Ok(ExchangeHandle {
                aborter: AbortHandle {
                    exchange_id,
                    store: Arc::clone(&self.store),
                    cancel,
                    outcome,
                },
            }),
            Err(e) => {
                log::error!("[{}] failed to spawn stream worker: {}", exchange_id, e);
                abort_exchange(
                    &self.store,
                    &exchange_id,
                    AbortReason::Transport {
                        message: e.to_string(),
                    },
                );
                Err(SessionError::Spawn(e))
            }
        }
    }
}

/// Handle to one in-flight exchange.
pub struct ExchangeHandle {
    aborter: AbortHandle,
}

impl ExchangeHandle {
    pub fn exchange_id(&self) -> &ExchangeId {
        &self.aborter.exchange_id
    }

    /// Abort the exchange. See [`AbortHandle::abort`].
    pub fn abort(&self) -> bool {
        self.aborter.abort()
    }

    /// A cloneable handle that can abort the exchange while another task
    /// waits on it.
    pub fn abort_handle(&self) -> AbortHandle {
        self.aborter.clone()
    }

    /// True once the exchange committed, failed, or was aborted.
    pub fn is_finished(&self) -> bool {
        self.aborter.outcome.is_complete()
    }

    /// Block until the exchange finishes and return the committed answer.
    ///
    /// After an abort this returns [`SessionError::Aborted`] without waiting
    /// for the worker's read to return.
    pub fn wait(self) -> Result<Exchange, SessionError> {
        self.aborter.outcome.wait()
    }
}

/// Aborts one exchange.
#[derive(Clone)]
pub struct AbortHandle {
    exchange_id: ExchangeId,
    store: Arc<ConversationStore>,
    cancel: Arc<AtomicBool>,
    outcome: Arc<Outcome>,
}

impl AbortHandle {
    /// Abort the exchange.
    ///
    /// The pending answer is discarded and the store is idle when this
    /// returns; nothing the worker reads afterwards is applied. The user's
    /// question stays committed. Returns false if the exchange had already
    /// finished.
    pub fn abort(&self) -> bool {
        self.cancel.store(true, Ordering::SeqCst);
        let aborted = abort_exchange(&self.store, &self.exchange_id, AbortReason::Cancelled);
        if aborted {
            self.outcome.complete(Err(SessionError::Aborted));
            log::info!("[{}] exchange aborted", self.exchange_id);
        }
        aborted
    }
}

impl std::fmt::Debug for ExchangeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeHandle")
            .field("exchange_id", self.exchange_id())
            .field("finished", &self.is_finished())
            .finish()
    }
}
