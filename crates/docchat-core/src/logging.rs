//! Per-exchange wire logs.
//!
//! When a log directory is configured, every raw line of an answer stream is
//! appended to `{log_dir}/{exchange_id}.log` with a UTC timestamp. Logging
//! never fails an exchange: I/O errors are swallowed.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{SecondsFormat, Utc};

/// Thread-safe handle to an append-only log file.
pub type LogHandle = Arc<Mutex<Option<File>>>;

/// ISO 8601 UTC with milliseconds, e.g. `2026-02-04T10:15:30.123Z`.
fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Write a timestamped line to the log file (if present).
pub fn log_line(handle: &LogHandle, direction: &str, data: &str) {
    if let Ok(mut guard) = handle.lock() {
        if let Some(ref mut file) = *guard {
            let _ = writeln!(file, "[{}] {}: {}", utc_timestamp(), direction, data);
            let _ = file.flush();
        }
    }
}

/// Open (or create) `{log_dir}/{log_id}.log` and return a shared handle.
///
/// Without a directory, or if the file cannot be opened, the handle is empty
/// and [`log_line`] does nothing.
pub fn open_log_file(log_dir: Option<&Path>, log_id: &str) -> LogHandle {
    let file = log_dir.and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(format!("{}.log", log_id)))
            .ok()
    });
    Arc::new(Mutex::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn utc_timestamp_format() {
        let ts = utc_timestamp();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), 24);
        assert_eq!(&ts[10..11], "T");
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn open_log_file_creates_file() {
        let dir = tempdir().unwrap();
        let handle = open_log_file(Some(dir.path()), "exchange-1");
        assert!(handle.lock().unwrap().is_some());
        assert!(dir.path().join("exchange-1.log").exists());
    }

    #[test]
    fn open_log_file_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("logs").join("wire");
        let handle = open_log_file(Some(&nested), "x");
        assert!(handle.lock().unwrap().is_some());
    }

    #[test]
    fn open_log_file_none_dir() {
        let handle = open_log_file(None, "exchange-1");
        assert!(handle.lock().unwrap().is_none());
    }

    #[test]
    fn log_line_writes_to_file() {
        let dir = tempdir().unwrap();
        let handle = open_log_file(Some(dir.path()), "exchange-1");
        log_line(&handle, "SSE", "data: [DONE]");

        let mut contents = String::new();
        File::open(dir.path().join("exchange-1.log"))
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();

        assert!(contents.contains("SSE: data: [DONE]"));
        assert!(contents.starts_with('['));
    }

    #[test]
    fn log_line_handles_none_file() {
        let handle: LogHandle = Arc::new(Mutex::new(None));
        log_line(&handle, "SSE", "ignored");
    }
}
