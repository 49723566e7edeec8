//! # Mock Framework
//!
//! A scripted [`Transport`] for testing the registry, dispatcher, cache and
//! hooks without a network.
//!
//! Register expectations with [`MockTransport::expect_get`], hand
//! [`MockTransport::transport`] to the code under test, then check what was
//! requested with [`MockTransport::requests_seen`] and [`MockTransport::verify`].
//!
//! ```ignore
//! let mock = MockTransport::new();
//! mock.expect_get("posts/5").return_ok(json!({"userId": 1, "id": 5, "title": "t", "body": "b"}));
//! mock.expect_get("posts/6").return_status(404);
//!
//! let routes = ApiRoutes::new(mock.transport());
//! // Use routes in tests...
//! mock.verify(); // Ensures all expectations were met
//! ```

use crate::transport::{ApiRequest, ApiResponse, Transport, TransportError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// What a matched expectation answers with.
#[derive(Debug, Clone)]
enum MockResponse {
    Ok(serde_json::Value),
    Status(u16),
    Err(TransportError),
}

/// One scripted request. Consumed by the first request whose target matches.
#[derive(Debug)]
struct Expectation {
    target: String,
    response: MockResponse,
    delay: Option<Duration>,
}

#[derive(Default)]
struct MockState {
    expectations: Mutex<Vec<Expectation>>,
    seen: Mutex<Vec<ApiRequest>>,
}

/// A transport answering from a list of expectations.
///
/// Expectations are matched by target (`posts/5`, `photos?title=cat`), first
/// registered first, and each answers exactly once. A request with no
/// matching expectation fails with [`TransportError::Network`], so an
/// unexpected extra request shows up as an error rather than a hang.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockTransport {
    /// Creates a new mock transport with no expectations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the transport for use in tests.
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    /// Expects a `GET` to `target` (path plus query, as rendered by [`ApiRequest`]'s `Display`).
    pub fn expect_get(&self, target: impl Into<String>) -> ExpectationBuilder {
        ExpectationBuilder {
            target: target.into(),
            delay: None,
            state: self.state.clone(),
        }
    }

    /// Targets of every request received so far, in arrival order.
    pub fn requests_seen(&self) -> Vec<String> {
        lock(&self.state.seen).iter().map(ApiRequest::to_string).collect()
    }

    /// Number of expectations not yet consumed.
    pub fn pending(&self) -> usize {
        lock(&self.state.expectations).len()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let exps = lock(&self.state.expectations);
        if !exps.is_empty() {
            let targets: Vec<&str> = exps.iter().map(|e| e.target.as_str()).collect();
            panic!("Not all expectations were met. {} remaining: {:?}", exps.len(), targets);
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let target = request.to_string();
        lock(&self.state.seen).push(request);

        let expectation = {
            let mut exps = lock(&self.state.expectations);
            exps.iter()
                .position(|e| e.target == target)
                .map(|index| exps.remove(index))
        };
        let Some(expectation) = expectation else {
            return Err(TransportError::Network(format!("unexpected request: {target}")));
        };

        if let Some(delay) = expectation.delay {
            tokio::time::sleep(delay).await;
        }
        match expectation.response {
            MockResponse::Ok(body) => Ok(ApiResponse::ok(body)),
            MockResponse::Status(status) => Err(TransportError::Status {
                status,
                url: target,
                body: String::new(),
            }),
            MockResponse::Err(e) => Err(e),
        }
    }
}

/// Builder for `get` expectations.
pub struct ExpectationBuilder {
    target: String,
    delay: Option<Duration>,
    state: Arc<MockState>,
}

impl ExpectationBuilder {
    /// Delays the answer, to keep a request in flight for a while.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the expectation to return a successful result.
    pub fn return_ok(self, body: serde_json::Value) {
        self.push(MockResponse::Ok(body));
    }

    /// Sets the expectation to answer with a non-2xx status.
    pub fn return_status(self, status: u16) {
        self.push(MockResponse::Status(status));
    }

    /// Sets the expectation to return an error.
    pub fn return_err(self, error: TransportError) {
        self.push(MockResponse::Err(error));
    }

    fn push(self, response: MockResponse) {
        lock(&self.state.expectations).push(Expectation {
            target: self.target,
            response,
            delay: self.delay,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_transport_matches_by_target() {
        let mock = MockTransport::new();
        mock.expect_get("photos").return_ok(json!([]));
        mock.expect_get("posts/1").return_ok(json!({"id": 1}));
        let transport = mock.transport();

        let post = transport.execute(ApiRequest::get("posts/1")).await.unwrap();
        assert_eq!(post.body, json!({"id": 1}));
        assert_eq!(mock.pending(), 1);

        transport.execute(ApiRequest::get("photos")).await.unwrap();
        mock.verify();
    }

    #[tokio::test]
    async fn test_unexpected_request_is_an_error() {
        let mock = MockTransport::new();
        let result = mock.transport().execute(ApiRequest::get("posts")).await;
        assert_eq!(
            result,
            Err(TransportError::Network("unexpected request: posts".to_string()))
        );
        assert_eq!(mock.requests_seen(), vec!["posts".to_string()]);
    }

    #[tokio::test]
    async fn test_scripted_status_and_error() {
        let mock = MockTransport::new();
        mock.expect_get("posts/1").return_status(500);
        mock.expect_get("posts/2")
            .return_err(TransportError::Timeout("10s".to_string()));
        let transport = mock.transport();

        let first = transport.execute(ApiRequest::get("posts/1")).await;
        assert_eq!(first.unwrap_err().status(), Some(500));
        let second = transport.execute(ApiRequest::get("posts/2")).await;
        assert!(matches!(second, Err(TransportError::Timeout(_))));
    }

    #[test]
    #[should_panic(expected = "Not all expectations were met")]
    fn test_verify_panics_on_leftovers() {
        let mock = MockTransport::new();
        mock.expect_get("posts").return_ok(json!([]));
        mock.verify();
    }
}
