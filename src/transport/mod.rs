//! HTTP transport: request/response types, the [`Transport`] seam, and the
//! reqwest-backed [`HttpTransport`].
//!
//! Everything above this module (registry, dispatcher, cache, hooks) talks to
//! a `dyn Transport`, so tests swap in [`MockTransport`](crate::framework::mock::MockTransport)
//! without touching the network.

pub mod error;
pub mod http;
pub mod interceptor;
pub mod token;

pub use error::TransportError;
pub use http::HttpTransport;
pub use interceptor::{log_failure, FailureKind, RequestInterceptor};
pub use token::{FileTokenStore, MemoryTokenStore, StorageError, TokenStore};

use crate::model::Envelope;
use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::fmt;

/// A request relative to the transport's base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, without a leading slash (`posts/5`).
    pub path: String,
    /// Query pairs, unencoded. The transport encodes them.
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// `GET {collection}/{id}` with `id` percent-encoded as a single path
    /// segment, so it can never climb out of the collection. Dot segments
    /// are rejected since URL resolution collapses them even when encoded.
    pub fn get_item(collection: &str, id: &str) -> Result<Self, TransportError> {
        if matches!(id, "" | "." | "..") {
            return Err(TransportError::Request(format!(
                "{id:?} is not a valid id for {collection}"
            )));
        }
        Ok(Self::get(format!("{collection}/{}", urlencoding::encode(id))))
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for ApiRequest {
    /// Renders the relative target, e.g. `photos?title=cat`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        for (i, (key, value)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

/// A successful (2xx) response with its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Reason phrase for the status (`OK`, `Created`, ...).
    pub message: String,
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn ok(body: serde_json::Value) -> Self {
        Self {
            status: 200,
            message: "OK".to_string(),
            body,
        }
    }

    /// Decodes the body into the endpoint's payload type and wraps it.
    pub fn into_envelope<T: DeserializeOwned>(self) -> Result<Envelope<T>, TransportError> {
        let data = serde_json::from_value(self.body)?;
        Ok(Envelope::new(data, self.message))
    }
}

/// Performs one request. No retries, no caching.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}
