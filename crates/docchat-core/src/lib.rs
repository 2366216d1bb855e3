//! # docchat-core
//!
//! Client core for a documentation chat assistant: ask a question, stream
//! the answer token by token from a backend, and keep the conversation.
//!
//! This crate has no UI. Front ends (the `docchat` CLI, or anything else)
//! hold a [`ConversationStore`], submit questions through a
//! [`StreamingAnswerSession`], and render from store snapshots and events.
//!
//! ## Key Concepts
//!
//! - **Exchange**: one committed message, from the user or the assistant
//! - **History pair**: a (question, answer) pair sent back as context
//! - **Pending answer**: the answer being streamed, committed only when the
//!   backend sends its end-of-stream sentinel

pub mod config;
pub mod conversation;
pub mod event_bus;
pub mod logging;
pub mod paths;
pub mod persistence;
pub mod session;
pub mod stream;
pub mod transport;

// Re-export commonly used types
pub use config::ClientConfig;
pub use conversation::{
    ConversationEvent, ConversationState, ConversationStore, Document, Exchange, HistoryPair,
};
pub use session::{AbortHandle, ExchangeHandle, SessionError, StreamingAnswerSession};
pub use transport::{AnswerTransport, HttpTransport};
