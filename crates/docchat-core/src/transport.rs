//! Transport to the answer backend.
//!
//! The backend exposes one streaming endpoint: a JSON `POST` answered with a
//! server-sent event stream. [`AnswerTransport`] is the seam between the
//! session and the network so the session can be driven by scripted bodies in
//! tests.

use std::io::Read;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::config::ClientConfig;
use crate::conversation::HistoryPair;

/// Longest error body kept from a failed response.
const MAX_ERROR_BODY: usize = 512;

/// Body of a question sent to the backend.
#[derive(Clone, Serialize)]
pub struct AnswerRequest {
    pub question: String,
    pub history: Vec<HistoryPair>,
    /// Opaque API key, forwarded untouched.
    #[serde(rename = "openAiApiKey")]
    pub credential: String,
}

impl std::fmt::Debug for AnswerRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerRequest")
            .field("question", &self.question)
            .field("history", &self.history)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Streaming response body.
pub type AnswerBody = Box<dyn Read + Send>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to reach backend: {0}")]
    Connect(String),

    #[error("Failed to read answer stream: {0}")]
    Read(#[from] std::io::Error),

    #[error("Answer stream closed before it was complete")]
    UnexpectedEof,
}

/// Opens answer streams.
pub trait AnswerTransport: Send + Sync {
    /// Send the request and return the event-stream body.
    ///
    /// Non-success statuses are errors; the body is only returned once the
    /// backend has accepted the request.
    fn open(&self, request: &AnswerRequest) -> Result<AnswerBody, TransportError>;
}

/// HTTP transport backed by a `ureq` agent.
pub struct HttpTransport {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpTransport {
    /// Create a transport for `endpoint`.
    ///
    /// `idle_timeout` bounds the wait for each read of the stream; `None`
    /// waits indefinitely.
    pub fn new(
        endpoint: impl Into<String>,
        connect_timeout: Duration,
        idle_timeout: Option<Duration>,
    ) -> Self {
        let mut builder = ureq::AgentBuilder::new().timeout_connect(connect_timeout);
        if let Some(idle) = idle_timeout {
            builder = builder.timeout_read(idle);
        }
        Self {
            agent: builder.build(),
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.endpoint.clone(),
            config.connect_timeout(),
            config.idle_timeout(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl AnswerTransport for HttpTransport {
    fn open(&self, request: &AnswerRequest) -> Result<AnswerBody, TransportError> {
        log::debug!(
            "POST {} (history: {} pairs)",
            self.endpoint,
            request.history.len()
        );

        let response = self
            .agent
            .post(&self.endpoint)
            .set("Accept", "text/event-stream")
            .send_json(request)
            .map_err(|e| match e {
                ureq::Error::Status(status, response) => {
                    let mut body = response.into_string().unwrap_or_default();
                    if body.len() > MAX_ERROR_BODY {
                        let mut end = MAX_ERROR_BODY;
                        while !body.is_char_boundary(end) {
                            end -= 1;
                        }
                        body.truncate(end);
                    }
                    TransportError::Status { status, body }
                }
                ureq::Error::Transport(t) => TransportError::Connect(t.to_string()),
            })?;

        Ok(Box::new(response.into_reader()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    fn request() -> AnswerRequest {
        AnswerRequest {
            question: "What is Ethereum?".to_string(),
            history: vec![HistoryPair::new("hi", "hello")],
            credential: "sk-test".to_string(),
        }
    }

    /// Serve one HTTP request with a canned response; yields the request body.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/api/chat", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let mut stream = stream;
            write!(
                stream,
                "{status_line}\r\nContent-Type: text/event-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            stream.flush().unwrap();

            String::from_utf8(request_body).unwrap()
        });

        (endpoint, handle)
    }

    mod request_body {
        use super::*;

        #[test]
        fn uses_backend_field_names() {
            let json = serde_json::to_value(request()).unwrap();
            assert_eq!(json["question"], "What is Ethereum?");
            assert_eq!(json["history"], serde_json::json!([["hi", "hello"]]));
            assert_eq!(json["openAiApiKey"], "sk-test");
        }

        #[test]
        fn debug_redacts_credential() {
            let debug = format!("{:?}", request());
            assert!(!debug.contains("sk-test"));
        }
    }

    mod http {
        use super::*;

        #[test]
        fn streams_body_on_success() {
            let (endpoint, server) = serve_once("HTTP/1.1 200 OK", "data: [DONE]\n\n");
            let transport = HttpTransport::new(endpoint, Duration::from_secs(5), Some(Duration::from_secs(5)));

            let mut body = String::new();
            transport
                .open(&request())
                .unwrap()
                .read_to_string(&mut body)
                .unwrap();

            assert_eq!(body, "data: [DONE]\n\n");
            let sent: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
            assert_eq!(sent["question"], "What is Ethereum?");
            assert_eq!(sent["openAiApiKey"], "sk-test");
        }

        #[test]
        fn non_success_status_is_an_error() {
            let (endpoint, server) = serve_once("HTTP/1.1 401 Unauthorized", "bad key");
            let transport = HttpTransport::new(endpoint, Duration::from_secs(5), None);

            match transport.open(&request()) {
                Err(TransportError::Status { status, body }) => {
                    assert_eq!(status, 401);
                    assert_eq!(body, "bad key");
                }
                Err(other) => panic!("Expected Status error, got {:?}", other),
                Ok(_) => panic!("Expected Status error, got a body"),
            }
            server.join().unwrap();
        }

        #[test]
        fn refused_connection_is_an_error() {
            let port = {
                let listener = TcpListener::bind("127.0.0.1:0").unwrap();
                listener.local_addr().unwrap().port()
            };
            let transport = HttpTransport::new(
                format!("http://127.0.0.1:{port}/api/chat"),
                Duration::from_secs(2),
                None,
            );

            assert!(matches!(
                transport.open(&request()),
                Err(TransportError::Connect(_))
            ));
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn display_messages() {
            let status = TransportError::Status {
                status: 500,
                body: "boom".to_string(),
            };
            assert!(status.to_string().contains("500"));
            assert!(status.to_string().contains("boom"));
            assert!(TransportError::UnexpectedEof
                .to_string()
                .contains("before it was complete"));
        }
    }
}
