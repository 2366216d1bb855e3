//! Server-sent event framing.
//!
//! Turns raw response text into the `data` payloads of complete events.
//!
//! # How This Parser Works
//!
//! 1. Buffers incoming data, which may arrive in arbitrary chunks
//! 2. Splits on newlines to get complete lines (`\r\n` is accepted)
//! 3. Collects `data:` lines for the current event, joined with `\n`
//! 4. Emits the collected payload when a blank line ends the event
//!
//! Comments (`:` lines) and the `event`, `id` and `retry` fields are ignored;
//! the backend distinguishes events by payload shape only.

/// Incremental SSE parser for one response body.
#[derive(Debug, Default)]
pub struct SseParser {
    /// Incomplete trailing line from the last chunk.
    buffer: String,

    /// `data` collected for the event currently being read.
    data: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the response body and collect completed payloads.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        let mut payloads = Vec::new();
        self.buffer.push_str(chunk);

        let buffer = std::mem::take(&mut self.buffer);
        let mut lines: Vec<&str> = buffer.split('\n').collect();

        if let Some(incomplete) = lines.pop() {
            self.buffer = incomplete.to_string();
        }

        for line in lines {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if let Some(payload) = self.process_line(line) {
                payloads.push(payload);
            }
        }

        payloads
    }

    /// Flush whatever is left once the body has ended.
    ///
    /// A final event without its terminating blank line is still delivered.
    pub fn flush(&mut self) -> Vec<String> {
        let mut payloads = Vec::new();
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.strip_suffix('\r').unwrap_or(&rest);

        if !rest.is_empty() {
            if let Some(payload) = self.process_line(rest) {
                payloads.push(payload);
            }
        }
        if let Some(payload) = self.data.take() {
            payloads.push(payload);
        }

        payloads
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.data.take();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        if field == "data" {
            match self.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            }
        }

        None
    }
}
