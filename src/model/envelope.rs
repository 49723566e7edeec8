use serde::{Deserialize, Serialize};

/// Uniform wrapper around every endpoint's payload.
///
/// Every route function resolves to an `Envelope<T>` or fails with a
/// [`TransportError`](crate::transport::TransportError). `data` is the decoded
/// response body and `message` is the HTTP reason phrase reported by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    pub message: String,
}

impl<T> Envelope<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
        }
    }

    /// Maps the payload while keeping the message.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            data: f(self.data),
            message: self.message,
        }
    }

    pub fn into_data(self) -> T {
        self.data
    }
}
