//! Conversation model: exchanges, state transitions, and the shared store.

mod event;
mod exchange;
mod state;
mod store;

pub use event::{AbortReason, ConversationEvent};
pub use exchange::{Document, Exchange, ExchangeId, HistoryPair, Role};
pub use state::{ConversationState, ExchangePhase, PendingAnswer};
pub use store::{ConversationStore, StoreError};
