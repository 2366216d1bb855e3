//! Decoding of answer-stream payloads.
//!
//! The backend does not tag its events; they are told apart by shape:
//!
//! | payload                      | meaning                      |
//! |------------------------------|------------------------------|
//! | `[DONE]`                     | stream finished              |
//! | `{"sourceDocs": [...]}`      | source documents             |
//! | `{"data": "<token>"}`        | one incremental token        |
//! | anything else                | ignored                      |
//!
//! All shape dispatch lives in [`decode_payload`].

use serde_json::Value;

use crate::conversation::Document;

/// Terminal sentinel sent as the last event of every answer.
pub const DONE_SENTINEL: &str = "[DONE]";

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// No more tokens will arrive.
    Done,

    /// Documents the answer was based on.
    SourceDocuments(Vec<Document>),

    /// One incremental piece of the answer.
    Token(String),

    /// A payload of no recognized shape. Carries a short description for
    /// logging; it never affects the conversation.
    Unrecognized(String),
}

/// Classify one SSE `data` payload.
pub fn decode_payload(data: &str) -> StreamEvent {
    if data == DONE_SENTINEL {
        return StreamEvent::Done;
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return StreamEvent::Unrecognized(format!("invalid JSON: {e}")),
    };
    let Some(object) = value.as_object() else {
        return StreamEvent::Unrecognized("payload is not an object".to_string());
    };

    if let Some(docs) = object.get("sourceDocs").filter(|v| !v.is_null()) {
        return match serde_json::from_value::<Vec<Document>>(docs.clone()) {
            Ok(documents) => {
                StreamEvent::SourceDocuments(documents.into_iter().map(Document::normalize).collect())
            }
            Err(e) => StreamEvent::Unrecognized(format!("malformed sourceDocs: {e}")),
        };
    }

    match object.get("data") {
        Some(Value::String(token)) if !token.is_empty() => StreamEvent::Token(token.clone()),
        Some(Value::String(_)) => StreamEvent::Unrecognized("empty token".to_string()),
        Some(_) => StreamEvent::Unrecognized("token is not a string".to_string()),
        None => StreamEvent::Unrecognized("no known field".to_string()),
    }
}
