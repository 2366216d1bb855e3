//! Committed conversation records.
//!
//! An exchange is one side of a question/answer round: the user's question or
//! the assistant's finished answer. Exchanges are created by the streaming
//! session and never modified after they land in the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExchangeId(pub String);

impl ExchangeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    User,
    Assistant,
}

/// A source document returned by the backend alongside an answer.
///
/// The core never interprets documents. The backend sends LangChain-shaped
/// objects (`pageContent` plus a `metadata` map); both that shape and the
/// flat `content`/`sourceId` shape are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(alias = "pageContent")]
    pub content: String,

    #[serde(default)]
    pub source_id: String,

    /// Raw backend metadata, kept as-is.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl Document {
    pub fn new(content: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_id: source_id.into(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Fill `source_id` from `metadata.source` when the flat field is absent.
    pub(crate) fn normalize(mut self) -> Self {
        if self.source_id.is_empty() {
            if let Some(source) = self.metadata.get("source").and_then(|s| s.as_str()) {
                self.source_id = source.to_string();
            }
        }
        self
    }
}

/// A `(question, answer)` pair sent back to the backend as context.
///
/// Serializes as a two-element JSON array, the shape the backend expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPair(pub String, pub String);

impl HistoryPair {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self(question.into(), answer.into())
    }

    pub fn question(&self) -> &str {
        &self.0
    }

    pub fn answer(&self) -> &str {
        &self.1
    }
}

/// A committed message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    pub id: ExchangeId,
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_documents: Option<Vec<Document>>,
    pub created_at: DateTime<Utc>,
    /// Index of the history pair a committed answer produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_index: Option<usize>,
}

impl Exchange {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: ExchangeId::new(),
            role: Role::User,
            text: text.into(),
            source_documents: None,
            created_at: Utc::now(),
            history_index: None,
        }
    }

    pub fn assistant(text: impl Into<String>, source_documents: Option<Vec<Document>>) -> Self {
        Self {
            id: ExchangeId::new(),
            role: Role::Assistant,
            text: text.into(),
            source_documents,
            created_at: Utc::now(),
            history_index: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}
