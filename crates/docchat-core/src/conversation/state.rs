//! Conversation state and its transitions.
//!
//! The state is a plain value; [`ConversationStore`](super::ConversationStore)
//! wraps it in a lock and broadcasts every change. Transitions that belong to
//! an in-flight exchange take the exchange id and do nothing when it no longer
//! matches, so a stream worker that outlived its exchange cannot touch the
//! conversation.

use super::exchange::{Document, Exchange, ExchangeId, HistoryPair, Role};

/// The answer being assembled for the in-flight exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAnswer {
    pub exchange_id: ExchangeId,
    /// Trimmed question text, recorded into the history pair on commit.
    pub question: String,
    /// Concatenated tokens received so far. Only ever appended to.
    pub text: String,
    pub documents: Option<Vec<Document>>,
}

impl PendingAnswer {
    fn new(exchange_id: ExchangeId, question: String) -> Self {
        Self {
            exchange_id,
            question,
            text: String::new(),
            documents: None,
        }
    }
}

/// Lifecycle of the (single) exchange a conversation may have in flight.
///
/// Pending fields live inside the active variants, so "something is pending"
/// and "a stream is active" are the same fact.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExchangePhase {
    /// No exchange in flight; submissions are accepted.
    #[default]
    Idle,

    /// Question sent, no event received yet.
    Awaiting(PendingAnswer),

    /// At least one event received.
    Streaming(PendingAnswer),
}

impl ExchangePhase {
    pub fn name(&self) -> &'static str {
        match self {
            ExchangePhase::Idle => "idle",
            ExchangePhase::Awaiting(_) => "awaiting",
            ExchangePhase::Streaming(_) => "streaming",
        }
    }

    pub fn pending(&self) -> Option<&PendingAnswer> {
        match self {
            ExchangePhase::Idle => None,
            ExchangePhase::Awaiting(p) | ExchangePhase::Streaming(p) => Some(p),
        }
    }

    fn pending_mut(&mut self) -> Option<&mut PendingAnswer> {
        match self {
            ExchangePhase::Idle => None,
            ExchangePhase::Awaiting(p) | ExchangePhase::Streaming(p) => Some(p),
        }
    }
}

/// Snapshot of a conversation.
#[derive(Clone, Default)]
pub struct ConversationState {
    pub(crate) committed: Vec<Exchange>,
    pub(crate) history: Vec<HistoryPair>,
    pub(crate) selected_index: Option<usize>,
    pub(crate) phase: ExchangePhase,
    pub(crate) credential: String,
    pub(crate) has_greeting: bool,
}

impl std::fmt::Debug for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationState")
            .field("committed", &self.committed)
            .field("history", &self.history)
            .field("selected_index", &self.selected_index)
            .field("phase", &self.phase)
            .field("credential", &"<redacted>")
            .field("has_greeting", &self.has_greeting)
            .finish()
    }
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A conversation that opens with an assistant greeting.
    ///
    /// The greeting is committed but never becomes a history pair.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self {
            committed: vec![Exchange::assistant(greeting, None)],
            has_greeting: true,
            ..Self::default()
        }
    }

    pub fn committed(&self) -> &[Exchange] {
        &self.committed
    }

    pub fn history_pairs(&self) -> &[HistoryPair] {
        &self.history
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected_index
    }

    pub fn phase(&self) -> &ExchangePhase {
        &self.phase
    }

    pub fn pending_text(&self) -> Option<&str> {
        self.phase.pending().map(|p| p.text.as_str())
    }

    pub fn pending_documents(&self) -> Option<&[Document]> {
        self.phase.pending().and_then(|p| p.documents.as_deref())
    }

    pub fn active_exchange(&self) -> Option<&ExchangeId> {
        self.phase.pending().map(|p| &p.exchange_id)
    }

    /// True while an exchange is in flight.
    pub fn is_loading(&self) -> bool {
        !matches!(self.phase, ExchangePhase::Idle)
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn has_greeting(&self) -> bool {
        self.has_greeting
    }

    /// Messages as a display should render them: everything committed plus
    /// the pending answer as a provisional assistant entry once it has text.
    pub fn display_messages(&self) -> Vec<Exchange> {
        let mut messages = self.committed.clone();
        if let Some(pending) = self.phase.pending() {
            if !pending.text.is_empty() {
                messages.push(Exchange {
                    id: pending.exchange_id.clone(),
                    role: Role::Assistant,
                    text: pending.text.clone(),
                    source_documents: pending.documents.clone(),
                    created_at: chrono::Utc::now(),
                    history_index: None,
                });
            }
        }
        messages
    }

    /// History pair a display message belongs to, if any.
    ///
    /// An answer knows its pair; a question belongs to the answer that
    /// directly follows it. Questions whose exchange was aborted, the
    /// greeting, and the pending answer belong to no pair.
    pub fn pair_index_for_message(&self, message_index: usize) -> Option<usize> {
        let message = self.committed.get(message_index)?;
        if !message.is_user() {
            return message.history_index;
        }
        self.committed
            .get(message_index + 1)
            .filter(|next| !next.is_user())
            .and_then(|answer| answer.history_index)
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Commit the user's question and enter `Awaiting`.
    ///
    /// Returns `None` without changing anything when an exchange is already
    /// in flight.
    pub(crate) fn begin_exchange(&mut self, question: String) -> Option<ExchangeId> {
        if self.is_loading() {
            return None;
        }
        let exchange_id = ExchangeId::new();
        self.committed.push(Exchange::user(question.clone()));
        self.phase = ExchangePhase::Awaiting(PendingAnswer::new(exchange_id.clone(), question));
        Some(exchange_id)
    }

    /// Move `Awaiting` to `Streaming`. Returns true if the phase changed.
    pub(crate) fn mark_streaming(&mut self, exchange_id: &ExchangeId) -> bool {
        if self.active_exchange() != Some(exchange_id) {
            return false;
        }
        match std::mem::take(&mut self.phase) {
            ExchangePhase::Awaiting(pending) => {
                self.phase = ExchangePhase::Streaming(pending);
                true
            }
            other => {
                self.phase = other;
                false
            }
        }
    }

    /// Append a token to the pending answer. Returns false for stale ids.
    pub(crate) fn append_token(&mut self, exchange_id: &ExchangeId, token: &str) -> bool {
        match self.pending_for(exchange_id) {
            Some(pending) => {
                pending.text.push_str(token);
                true
            }
            None => false,
        }
    }

    /// Record source documents. The first value received wins.
    pub(crate) fn set_documents(
        &mut self,
        exchange_id: &ExchangeId,
        documents: Vec<Document>,
    ) -> bool {
        match self.pending_for(exchange_id) {
            Some(pending) if pending.documents.is_none() => {
                pending.documents = Some(documents);
                true
            }
            _ => false,
        }
    }

    /// Finalize the pending answer into an assistant exchange and a history
    /// pair, returning to `Idle`.
    pub(crate) fn commit(&mut self, exchange_id: &ExchangeId) -> Option<Exchange> {
        if self.active_exchange() != Some(exchange_id) {
            return None;
        }
        let pending = match std::mem::take(&mut self.phase) {
            ExchangePhase::Awaiting(p) | ExchangePhase::Streaming(p) => p,
            ExchangePhase::Idle => return None,
        };

        let mut answer = Exchange::assistant(pending.text.clone(), pending.documents);
        answer.history_index = Some(self.history.len());
        self.history
            .push(HistoryPair::new(pending.question, pending.text));
        self.committed.push(answer.clone());
        Some(answer)
    }

    /// Fill in missing `history_index` values on committed answers, counting
    /// answers after the greeting in order.
    pub(crate) fn number_answers(&mut self) {
        let skip = usize::from(self.has_greeting);
        let answers = self
            .committed
            .iter_mut()
            .skip(skip)
            .filter(|e| !e.is_user());
        for (index, answer) in answers.enumerate() {
            answer.history_index.get_or_insert(index);
        }
    }

    /// Drop the pending answer without committing anything.
    pub(crate) fn abort(&mut self, exchange_id: &ExchangeId) -> bool {
        if self.active_exchange() != Some(exchange_id) {
            return false;
        }
        self.phase = ExchangePhase::Idle;
        true
    }

    pub(crate) fn select(&mut self, index: Option<usize>) -> Result<(), usize> {
        match index {
            Some(i) if i >= self.history.len() => Err(i),
            _ => {
                self.selected_index = index;
                Ok(())
            }
        }
    }

    fn pending_for(&mut self, exchange_id: &ExchangeId) -> Option<&mut PendingAnswer> {
        self.phase
            .pending_mut()
            .filter(|p| &p.exchange_id == exchange_id)
    }
}
