//! Answer stream decoding: SSE framing and payload classification.

mod payload;
mod sse;

pub use payload::{decode_payload, StreamEvent, DONE_SENTINEL};
pub use sse::SseParser;
