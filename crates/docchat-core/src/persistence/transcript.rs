//! Transcript file persistence.
//!
//! # File Structure
//!
//! A transcript is one pretty-printed JSON document:
//! ```text
//! {
//!   "version": 1,
//!   "savedAt": "2026-02-04T10:15:30.123Z",
//!   "exchanges": [ { "id": ..., "role": "user", "text": ... }, ... ],
//!   "history": [ ["question", "answer"], ... ]
//! }
//! ```
//!
//! Only committed state is saved; a pending answer never reaches disk.
//!
//! # Design Notes
//!
//! - **Atomic writes**: write to `{file}.tmp`, then rename

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::{Exchange, HistoryPair};

/// Current transcript format version.
pub const TRANSCRIPT_VERSION: u32 = 1;

/// Error type for transcript persistence.
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Written by a newer client
    #[error("Unsupported transcript version: {0}")]
    UnsupportedVersion(u32),
}

/// The committed part of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub exchanges: Vec<Exchange>,
    #[serde(default)]
    pub history: Vec<HistoryPair>,
}

impl Transcript {
    pub fn new(exchanges: Vec<Exchange>, history: Vec<HistoryPair>) -> Self {
        Self {
            version: TRANSCRIPT_VERSION,
            saved_at: Utc::now(),
            exchanges,
            history,
        }
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Save a transcript, replacing any previous file atomically.
pub fn save_transcript(path: &Path, transcript: &Transcript) -> Result<(), TranscriptError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp = temp_path(path);
    let json = serde_json::to_string_pretty(transcript)?;
    fs::write(&temp, json)?;
    fs::rename(&temp, path)?;

    Ok(())
}

/// Load a transcript.
pub fn load_transcript(path: &Path) -> Result<Transcript, TranscriptError> {
    let contents = fs::read_to_string(path)?;
    let transcript: Transcript = serde_json::from_str(&contents)?;

    if transcript.version > TRANSCRIPT_VERSION {
        return Err(TranscriptError::UnsupportedVersion(transcript.version));
    }

    Ok(transcript)
}

/// Load a transcript if the file exists.
pub fn load_transcript_if_exists(path: &Path) -> Result<Option<Transcript>, TranscriptError> {
    if !path.exists() {
        return Ok(None);
    }
    load_transcript(path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Document;
    use tempfile::tempdir;

    fn sample() -> Transcript {
        Transcript::new(
            vec![
                Exchange::user("What is Ethereum?"),
                Exchange::assistant(
                    "Ethereum is a blockchain.",
                    Some(vec![Document::new("intro", "docs/intro.md")]),
                ),
            ],
            vec![HistoryPair::new("What is Ethereum?", "Ethereum is a blockchain.")],
        )
    }

    #[test]
    fn save_then_load_preserves_conversation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transcript.json");
        let transcript = sample();

        save_transcript(&path, &transcript).unwrap();
        let loaded = load_transcript(&path).unwrap();

        assert_eq!(loaded, transcript);
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transcript.json");
        save_transcript(&path, &sample()).unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("transcript.json.tmp").exists());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("transcript.json");
        save_transcript(&path, &sample()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn save_overwrites_previous() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transcript.json");
        save_transcript(&path, &sample()).unwrap();
        save_transcript(&path, &Transcript::default()).unwrap();

        assert!(load_transcript(&path).unwrap().exchanges.is_empty());
    }

    #[test]
    fn history_serializes_as_pairs() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            json["history"],
            serde_json::json!([["What is Ethereum?", "Ethereum is a blockchain."]])
        );
        assert!(json.get("savedAt").is_some());
    }

    #[test]
    fn newer_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transcript.json");
        let mut transcript = sample();
        transcript.version = TRANSCRIPT_VERSION + 1;
        save_transcript(&path, &transcript).unwrap();

        match load_transcript(&path) {
            Err(TranscriptError::UnsupportedVersion(v)) => assert_eq!(v, TRANSCRIPT_VERSION + 1),
            other => panic!("Expected UnsupportedVersion, got {:?}", other),
        }
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            TranscriptError::UnsupportedVersion(7).to_string(),
            "Unsupported transcript version: 7"
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(TranscriptError::from(io).to_string(), "IO error: gone");
    }

    #[test]
    fn missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.json");

        assert!(matches!(load_transcript(&path), Err(TranscriptError::Io(_))));
        assert!(load_transcript_if_exists(&path).unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_json_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transcript.json");
        fs::write(&path, "{").unwrap();
        assert!(matches!(load_transcript(&path), Err(TranscriptError::Json(_))));
    }
}
