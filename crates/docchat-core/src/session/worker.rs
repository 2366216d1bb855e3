//! The background half of an exchange: reads the answer stream and applies
//! each event to the store.

use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use super::SessionError;
use crate::conversation::{
    AbortReason, ConversationEvent, ConversationStore, Exchange, ExchangeId,
};
use crate::logging::{self, LogHandle};
use crate::stream::{decode_payload, SseParser, StreamEvent};
use crate::transport::{AnswerRequest, AnswerTransport, TransportError};

/// What the read loop does after a payload has been applied.
enum Flow {
    Continue,
    Committed(Exchange),
    /// The exchange is no longer the active one.
    Stale,
}

pub(super) struct StreamWorker {
    pub(super) store: Arc<ConversationStore>,
    pub(super) transport: Arc<dyn AnswerTransport>,
    pub(super) exchange_id: ExchangeId,
    pub(super) request: AnswerRequest,
    pub(super) cancel: Arc<AtomicBool>,
    pub(super) wire_log: LogHandle,
}

impl StreamWorker {
    pub(super) fn run(self) -> Result<Exchange, SessionError> {
        let guard = AbortOnDrop {
            store: Arc::clone(&self.store),
            exchange_id: self.exchange_id.clone(),
        };

        if self.cancelled() {
            return Err(SessionError::Aborted);
        }

        logging::log_line(&self.wire_log, "REQUEST", &self.request.question);
        let body = match self.transport.open(&self.request) {
            Ok(body) => body,
            Err(e) => return Err(self.fail(&guard, e)),
        };
        log::debug!("[{}] answer stream opened", self.exchange_id);

        let mut reader = BufReader::new(body);
        let mut parser = SseParser::new();
        let mut line = String::new();

        loop {
            if self.cancelled() {
                log::debug!("[{}] cancelled, closing stream", self.exchange_id);
                return Err(SessionError::Aborted);
            }

            line.clear();
            let payloads = match reader.read_line(&mut line) {
                Ok(0) => {
                    logging::log_line(&self.wire_log, "EOF", "");
                    let payloads = parser.flush();
                    if payloads.is_empty() {
                        return Err(self.fail(&guard, TransportError::UnexpectedEof));
                    }
                    payloads
                }
                Ok(_) => {
                    logging::log_line(&self.wire_log, "SSE", line.trim_end_matches(['\r', '\n']));
                    parser.feed(&line)
                }
                Err(e) => {
                    if self.cancelled() {
                        return Err(SessionError::Aborted);
                    }
                    return Err(self.fail(&guard, TransportError::Read(e)));
                }
            };
            let at_eof = line.is_empty();

            for payload in payloads {
                match self.dispatch(&payload) {
                    Flow::Continue => {}
                    Flow::Committed(answer) => {
                        log::info!(
                            "[{}] answer committed ({} chars)",
                            self.exchange_id,
                            answer.text.chars().count()
                        );
                        return Ok(answer);
                    }
                    Flow::Stale => return Err(SessionError::Aborted),
                }
            }

            if at_eof {
                return Err(self.fail(&guard, TransportError::UnexpectedEof));
            }
        }
    }

    /// Apply one payload to the store, fenced by the exchange id.
    fn dispatch(&self, payload: &str) -> Flow {
        let event = decode_payload(payload);
        let exchange_id = &self.exchange_id;

        self.store.apply(|state| {
            if state.active_exchange() != Some(exchange_id) {
                return (Flow::Stale, vec![]);
            }

            let mut events = Vec::new();
            if state.mark_streaming(exchange_id) {
                events.push(ConversationEvent::Streaming {
                    exchange_id: exchange_id.clone(),
                });
            }

            let flow = match event {
                StreamEvent::Done => match state.commit(exchange_id) {
                    Some(answer) => {
                        events.push(ConversationEvent::Committed {
                            exchange_id: exchange_id.clone(),
                            answer: answer.clone(),
                        });
                        Flow::Committed(answer)
                    }
                    None => Flow::Stale,
                },
                StreamEvent::SourceDocuments(documents) => {
                    if state.set_documents(exchange_id, documents.clone()) {
                        events.push(ConversationEvent::SourceDocuments {
                            exchange_id: exchange_id.clone(),
                            documents,
                        });
                    } else {
                        log::debug!("[{}] ignoring repeated sourceDocs", exchange_id);
                    }
                    Flow::Continue
                }
                StreamEvent::Token(text) => {
                    state.append_token(exchange_id, &text);
                    events.push(ConversationEvent::Token {
                        exchange_id: exchange_id.clone(),
                        text,
                    });
                    Flow::Continue
                }
                StreamEvent::Unrecognized(reason) => {
                    log::debug!("[{}] skipping payload: {}", exchange_id, reason);
                    Flow::Continue
                }
            };
            (flow, events)
        })
    }

    fn fail(&self, guard: &AbortOnDrop, error: TransportError) -> SessionError {
        if self.cancelled() {
            return SessionError::Aborted;
        }
        log::error!("[{}] answer stream failed: {}", self.exchange_id, error);
        logging::log_line(&self.wire_log, "ERROR", &error.to_string());
        guard.abort(AbortReason::Transport {
            message: error.to_string(),
        });
        SessionError::Transport(error)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Leaves the store idle if the worker exits without committing.
pub(super) struct AbortOnDrop {
    pub(super) store: Arc<ConversationStore>,
    pub(super) exchange_id: ExchangeId,
}

impl AbortOnDrop {
    /// Abort the exchange if it is still the active one.
    pub(super) fn abort(&self, reason: AbortReason) -> bool {
        abort_exchange(&self.store, &self.exchange_id, reason)
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if self.abort(AbortReason::Transport {
            message: "stream worker stopped".to_string(),
        }) {
            log::warn!("[{}] stream worker exited early", self.exchange_id);
        }
    }
}

/// The result of one exchange, set once by whichever side finishes first:
/// the worker, or an abort.
pub(super) struct Outcome {
    slot: Mutex<Option<Result<Exchange, SessionError>>>,
    ready: Condvar,
}

impl Outcome {
    pub(super) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Store `result` unless an earlier one is already set.
    pub(super) fn complete(&self, result: Result<Exchange, SessionError>) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return false;
        }
        *slot = Some(result);
        self.ready.notify_all();
        true
    }

    pub(super) fn is_complete(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Block until a result is set, then take it.
    pub(super) fn wait(&self) -> Result<Exchange, SessionError> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(result) = slot.take() {
                return result;
            }
            slot = self.ready.wait(slot).unwrap_or_else(|e| e.into_inner());
        }
    }
}

/// Reports a panic in the worker thread to whoever waits on the outcome.
pub(super) struct CompleteOnDrop(pub(super) Arc<Outcome>);

impl Drop for CompleteOnDrop {
    fn drop(&mut self) {
        if self.0.complete(Err(SessionError::WorkerPanicked)) {
            log::error!("stream worker exited without a result");
        }
    }
}

pub(super) fn abort_exchange(
    store: &ConversationStore,
    exchange_id: &ExchangeId,
    reason: AbortReason,
) -> bool {
    store.apply(|state| {
        if state.abort(exchange_id) {
            (
                true,
                vec![ConversationEvent::Aborted {
                    exchange_id: exchange_id.clone(),
                    reason,
                }],
            )
        } else {
            (false, vec![])
        }
    })
}
