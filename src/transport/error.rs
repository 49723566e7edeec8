//! Error types for the HTTP transport.

use thiserror::Error;

/// Errors produced while performing a request.
///
/// The transport logs these once at the boundary (see
/// [`log_failure`](super::interceptor::log_failure)) and then hands them back
/// unchanged; nothing above the transport translates them.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    /// The request could not be built (bad URL, invalid header, ...).
    #[error("Request setup error: {0}")]
    Request(String),

    /// The request was sent but no response arrived.
    #[error("No response from server: {0}")]
    Network(String),

    /// The configured timeout elapsed.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("Response decode error: {0}")]
    Decode(String),
}

impl TransportError {
    /// HTTP status code, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_builder() {
            TransportError::Request(e.to_string())
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Decode(e.to_string())
    }
}
