//! Change notifications published by the conversation store.

use serde::{Deserialize, Serialize};

use super::exchange::{Document, Exchange, ExchangeId};

/// Why an exchange ended without an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum AbortReason {
    /// The caller cancelled the exchange.
    Cancelled,
    /// The transport failed before the sentinel arrived.
    Transport { message: String },
}

/// A state change in a conversation.
///
/// Displays subscribe to these instead of polling the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConversationEvent {
    /// The user's question was committed and the exchange is awaiting data.
    Submitted {
        exchange_id: ExchangeId,
        question: Exchange,
    },

    /// The first event of the stream arrived.
    Streaming { exchange_id: ExchangeId },

    /// A token was appended to the pending answer.
    Token { exchange_id: ExchangeId, text: String },

    /// Source documents were attached to the pending answer.
    SourceDocuments {
        exchange_id: ExchangeId,
        documents: Vec<Document>,
    },

    /// The answer was committed.
    Committed {
        exchange_id: ExchangeId,
        answer: Exchange,
    },

    /// The exchange ended without an answer.
    Aborted {
        exchange_id: ExchangeId,
        reason: AbortReason,
    },

    /// The selected history entry changed.
    SelectionChanged { index: Option<usize> },

    /// The conversation was replaced from a saved transcript.
    Restored,
}

impl ConversationEvent {
    /// The exchange this event belongs to, if any.
    pub fn exchange_id(&self) -> Option<&ExchangeId> {
        match self {
            ConversationEvent::Submitted { exchange_id, .. }
            | ConversationEvent::Streaming { exchange_id }
            | ConversationEvent::Token { exchange_id, .. }
            | ConversationEvent::SourceDocuments { exchange_id, .. }
            | ConversationEvent::Committed { exchange_id, .. }
            | ConversationEvent::Aborted { exchange_id, .. } => Some(exchange_id),
            ConversationEvent::SelectionChanged { .. } | ConversationEvent::Restored => None,
        }
    }

    /// True for the last event an exchange produces.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConversationEvent::Committed { .. } | ConversationEvent::Aborted { .. }
        )
    }
}
