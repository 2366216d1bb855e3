//! ConversationStore - the single source of truth for a conversation.
//!
//! Only the streaming session mutates conversation fields (through the
//! crate-private [`ConversationStore::apply`]); displays read snapshots, change
//! the selected history entry, and set the credential.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::broadcast;

use super::event::ConversationEvent;
use super::exchange::Exchange;
use super::state::ConversationState;
use crate::event_bus::EventBus;
use crate::persistence::Transcript;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("History index {index} out of range (have {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Cannot restore a conversation while an answer is streaming")]
    ExchangeInFlight,
}

/// Shared, lock-protected conversation state plus its change feed.
pub struct ConversationStore {
    state: Mutex<ConversationState>,
    events: Arc<EventBus>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::from_state(ConversationState::new())
    }

    /// A store whose conversation opens with an assistant greeting.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self::from_state(ConversationState::with_greeting(greeting))
    }

    pub fn from_state(state: ConversationState) -> Self {
        Self {
            state: Mutex::new(state),
            events: Arc::new(EventBus::new()),
        }
    }

    /// Current state (getState).
    pub fn snapshot(&self) -> ConversationState {
        self.lock().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().is_loading()
    }

    /// Messages to render, pending answer included.
    pub fn display_messages(&self) -> Vec<Exchange> {
        self.lock().display_messages()
    }

    pub fn pair_index_for_message(&self, message_index: usize) -> Option<usize> {
        self.lock().pair_index_for_message(message_index)
    }

    /// Subscribe to every state change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    /// Atomically read-modify-write the state (applyPartial).
    ///
    /// The mutator runs under the store lock, so it always sees the result of
    /// every earlier call. Events it returns are published after the lock is
    /// released, in order.
    pub(crate) fn apply<F, R>(&self, mutator: F) -> R
    where
        F: FnOnce(&mut ConversationState) -> (R, Vec<ConversationEvent>),
    {
        let (result, events) = {
            let mut state = self.lock();
            mutator(&mut state)
        };
        for event in events {
            self.events.emit(event);
        }
        result
    }

    /// Select a history entry, or clear the selection with `None`.
    pub fn select_history(&self, index: Option<usize>) -> Result<(), StoreError> {
        self.apply(|state| {
            let len = state.history.len();
            match state.select(index) {
                Ok(()) => (
                    Ok(()),
                    vec![ConversationEvent::SelectionChanged { index }],
                ),
                Err(index) => (Err(StoreError::IndexOutOfRange { index, len }), vec![]),
            }
        })
    }

    /// Select `index`, or clear the selection if it is already selected.
    ///
    /// Returns the new selection.
    pub fn toggle_history(&self, index: usize) -> Result<Option<usize>, StoreError> {
        self.apply(|state| {
            let target = if state.selected_index == Some(index) {
                None
            } else {
                Some(index)
            };
            let len = state.history.len();
            match state.select(target) {
                Ok(()) => (
                    Ok(target),
                    vec![ConversationEvent::SelectionChanged { index: target }],
                ),
                Err(index) => (Err(StoreError::IndexOutOfRange { index, len }), vec![]),
            }
        })
    }

    pub fn set_credential(&self, credential: impl Into<String>) {
        self.lock().credential = credential.into();
    }

    pub fn credential(&self) -> String {
        self.lock().credential.clone()
    }

    /// Replace committed exchanges and history with a saved transcript.
    pub fn restore(&self, transcript: Transcript) -> Result<(), StoreError> {
        self.apply(|state| {
            if state.is_loading() {
                return (Err(StoreError::ExchangeInFlight), vec![]);
            }
            state.committed = transcript.exchanges;
            state.history = transcript.history;
            state.has_greeting = state.committed.first().is_some_and(|e| !e.is_user());
            state.number_answers();
            state.selected_index = None;
            (Ok(()), vec![ConversationEvent::Restored])
        })
    }

    /// Capture the committed part of the conversation for saving.
    pub fn transcript(&self) -> Transcript {
        let state = self.lock();
        Transcript::new(state.committed.clone(), state.history.clone())
    }

    fn lock(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
