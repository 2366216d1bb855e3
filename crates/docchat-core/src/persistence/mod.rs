//! Persistence of finished conversations.
//!
//! A conversation can be saved as a transcript after every committed answer
//! and restored into a fresh store on the next start, so the history sidebar
//! and the context sent to the backend survive restarts.
//!
//! # Usage
//!
//! ```ignore
//! use docchat_core::persistence::{load_transcript_if_exists, save_transcript};
//!
//! save_transcript(&path, &store.transcript())?;
//! if let Some(transcript) = load_transcript_if_exists(&path)? {
//!     store.restore(transcript)?;
//! }
//! ```

pub mod transcript;

pub use transcript::{
    load_transcript, load_transcript_if_exists, save_transcript, Transcript, TranscriptError,
    TRANSCRIPT_VERSION,
};
