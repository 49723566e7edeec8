//! Request and response interceptors.
//!
//! The request side attaches default headers to every outgoing request. The
//! response side only observes: it logs failures by kind and never changes
//! what the caller receives.

use super::error::TransportError;
use super::token::TokenStore;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::sync::Arc;
use tracing::{error, warn};

/// Attaches the bearer token and default content type.
#[derive(Clone)]
pub struct RequestInterceptor {
    tokens: Arc<dyn TokenStore>,
}

impl RequestInterceptor {
    pub fn new(tokens: Arc<dyn TokenStore>) -> Self {
        Self { tokens }
    }

    pub fn intercept(&self, request: &mut reqwest::Request) {
        let token = self.tokens.token();
        apply_default_headers(request.headers_mut(), token.as_deref());
    }
}

/// Sets `Authorization: Bearer <token>` when a token is present and
/// `Content-Type: application/json` unless a content type is already set.
pub fn apply_default_headers(headers: &mut HeaderMap, token: Option<&str>) {
    if let Some(token) = token {
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => warn!("Stored token is not a valid header value, sending request without it"),
        }
    }
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
}

/// Classification used when logging a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Unauthorized,
    Forbidden,
    NotFound,
    ServerError,
    UnhandledStatus(u16),
    NoResponse,
    Setup,
    Decode,
}

impl FailureKind {
    pub fn of(error: &TransportError) -> Self {
        match error {
            TransportError::Status { status, .. } => match status {
                401 => FailureKind::Unauthorized,
                403 => FailureKind::Forbidden,
                404 => FailureKind::NotFound,
                500 => FailureKind::ServerError,
                other => FailureKind::UnhandledStatus(*other),
            },
            TransportError::Network(_) | TransportError::Timeout(_) => FailureKind::NoResponse,
            TransportError::Request(_) => FailureKind::Setup,
            TransportError::Decode(_) => FailureKind::Decode,
        }
    }
}

/// Logs a failed request and returns how it was classified.
pub fn log_failure(e: &TransportError) -> FailureKind {
    let kind = FailureKind::of(e);
    match (kind, e) {
        (FailureKind::Unauthorized, _) => warn!(status = 401, "Unauthorized, login required"),
        (FailureKind::Forbidden, _) => warn!(status = 403, "Forbidden, no access to resource"),
        (FailureKind::NotFound, TransportError::Status { url, .. }) => {
            error!(status = 404, %url, "Resource not found")
        }
        (FailureKind::ServerError, _) => error!(status = 500, "Server error, try again later"),
        (FailureKind::UnhandledStatus(status), _) => error!(status, "Unhandled error status"),
        (FailureKind::NoResponse, _) => error!(error = %e, "No response from server"),
        (FailureKind::Setup, _) => error!(error = %e, "Request setup error"),
        _ => error!(error = %e, "Response decode error"),
    }
    kind
}
