use super::state::{MutationState, Status};
use crate::dispatch::Dispatcher;
use crate::framework::{retry_with_backoff, QueryClient, QueryError};
use crate::model::Envelope;
use crate::routes::{Endpoint, RouteKey};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Options for a [`UseMutation`]. Writes are not retried unless asked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationOptions {
    pub retry: u32,
    /// Route-key prefixes invalidated after each successful call.
    pub invalidates: Vec<String>,
}

impl MutationOptions {
    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn invalidates(mut self, prefix: impl Into<String>) -> Self {
        self.invalidates.push(prefix.into());
        self
    }
}

type EndpointMutationState<E> =
    MutationState<Envelope<<E as Endpoint>::Output>, <E as Endpoint>::Payload>;

/// A write through endpoint `E`. The payload is given per call.
pub struct UseMutation<E: Endpoint> {
    route: RouteKey,
    client: QueryClient,
    dispatcher: Dispatcher,
    options: Arc<MutationOptions>,
    state: Arc<watch::Sender<EndpointMutationState<E>>>,
    /// Only the call holding the latest generation may write the state.
    generation: Arc<AtomicU64>,
}

impl<E: Endpoint> Clone for UseMutation<E> {
    fn clone(&self) -> Self {
        Self {
            route: self.route,
            client: self.client.clone(),
            dispatcher: self.dispatcher.clone(),
            options: self.options.clone(),
            state: self.state.clone(),
            generation: self.generation.clone(),
        }
    }
}

impl<E: Endpoint> UseMutation<E> {
    pub(super) fn new(client: QueryClient, dispatcher: Dispatcher, options: MutationOptions) -> Self {
        let (state, _) = watch::channel(MutationState::default());
        Self {
            route: E::route_key(),
            client,
            dispatcher,
            options: Arc::new(options),
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn route_key(&self) -> RouteKey {
        self.route
    }

    /// Dispatches `payload` and waits for the result.
    ///
    /// The observable state only follows the most recent call; an earlier call
    /// that finishes late still returns its own result to its caller.
    #[instrument(skip_all, fields(route = %self.route))]
    pub async fn mutate(&self, payload: E::Payload) -> Result<Envelope<E::Output>, QueryError> {
        let call = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| {
            state.submitted += 1;
            state.status = Status::Pending;
            state.variables = Some(payload.clone());
            state.error = None;
        });

        let label = self.route.to_string();
        let delay = self.client.defaults().retry_delay;
        let result = retry_with_backoff(&label, self.options.retry, delay, || {
            self.dispatcher.send::<E>(payload.clone())
        })
        .await
        .map_err(QueryError::from);

        if result.is_ok() {
            for prefix in &self.options.invalidates {
                if let Err(e) = self.client.invalidate_queries(prefix).await {
                    warn!(prefix = %prefix, error = %e, "Invalidation after mutation failed");
                }
            }
        }

        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != call {
                return false;
            }
            match &result {
                Ok(envelope) => {
                    state.status = Status::Success;
                    state.data = Some(envelope.clone());
                    state.error = None;
                }
                Err(e) => {
                    state.status = Status::Error;
                    state.error = Some(e.clone());
                }
            }
            true
        });

        match &result {
            Ok(_) => info!(call, "Mutation succeeded"),
            Err(e) => warn!(call, error = %e, "Mutation failed"),
        }
        result
    }

    /// Like [`mutate`](Self::mutate) but runs on its own task.
    pub fn mutate_detached(
        &self,
        payload: E::Payload,
    ) -> JoinHandle<Result<Envelope<E::Output>, QueryError>> {
        let this = self.clone();
        tokio::spawn(async move { this.mutate(payload).await })
    }

    pub fn state(&self) -> EndpointMutationState<E> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EndpointMutationState<E>> {
        self.state.subscribe()
    }

    /// Back to idle. Calls still running no longer update the state.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_modify(|state| {
            let submitted = state.submitted;
            *state = MutationState {
                submitted,
                ..MutationState::default()
            };
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryDefaults;
    use crate::framework::mock::MockTransport;
    use crate::framework::QueryActor;
    use crate::model::PostId;
    use crate::routes::{ApiRoutes, GetPostById};
    use serde_json::json;
    use std::time::Duration;

    fn setup(mock: &MockTransport) -> (QueryClient, Dispatcher) {
        let defaults = QueryDefaults {
            retry_delay: Duration::from_millis(1),
            ..QueryDefaults::default()
        };
        let (actor, client) = QueryActor::new(16, defaults);
        tokio::spawn(actor.run());
        let dispatcher = Dispatcher::new(Arc::new(ApiRoutes::new(mock.transport())));
        (client, dispatcher)
    }

    fn post(id: u64) -> serde_json::Value {
        json!({"userId": 1, "id": id, "title": "t", "body": "b"})
    }

    #[tokio::test]
    async fn test_each_call_uses_its_own_payload() {
        let mock = MockTransport::new();
        mock.expect_get("posts/1")
            .after(Duration::from_millis(40))
            .return_ok(post(1));
        mock.expect_get("posts/2").return_ok(post(2));
        let (client, dispatcher) = setup(&mock);
        let mutation = UseMutation::<GetPostById>::new(client, dispatcher, MutationOptions::default());

        let first = mutation.mutate_detached(PostId::from(1u64));
        let second = mutation.mutate_detached(PostId::from(2u64));
        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert_eq!(first.data.id, 1);
        assert_eq!(second.data.id, 2);
        let mut seen = mock.requests_seen();
        seen.sort();
        assert_eq!(seen, vec!["posts/1".to_string(), "posts/2".to_string()]);

        let state = mutation.state();
        assert_eq!(state.submitted, 2);
        assert!(state.is_success());
        mock.verify();
    }

    #[tokio::test]
    async fn test_failure_sets_error_and_retry_is_honoured() {
        let mock = MockTransport::new();
        mock.expect_get("posts/3").return_status(500);
        let (client, dispatcher) = setup(&mock);

        let once = UseMutation::<GetPostById>::new(
            client.clone(),
            dispatcher.clone(),
            MutationOptions::default(),
        );
        let err = once.mutate(PostId::from(3u64)).await.unwrap_err();
        assert_eq!(err.transport().and_then(|e| e.status()), Some(500));
        assert!(once.state().is_error());
        assert_eq!(once.state().variables, Some(PostId::from(3u64)));

        mock.expect_get("posts/3").return_status(502);
        mock.expect_get("posts/3").return_ok(post(3));
        let retried =
            UseMutation::<GetPostById>::new(client, dispatcher, MutationOptions::default().with_retry(1));
        let ok = retried.mutate(PostId::from(3u64)).await;
        assert_eq!(ok.unwrap().data.id, 3);
        assert!(retried.state().is_success());
        mock.verify();
    }

    #[tokio::test]
    async fn test_success_invalidates_prefixes() {
        let mock = MockTransport::new();
        mock.expect_get("posts/4").return_ok(post(4));
        let (client, dispatcher) = setup(&mock);
        let mutation = UseMutation::<GetPostById>::new(
            client.clone(),
            dispatcher,
            MutationOptions::default().invalidates("posts-"),
        );

        let key = crate::framework::QueryKey::new("posts-getPosts", &()).unwrap();
        let policy = crate::framework::FetchPolicy::from(client.defaults());
        let _: u32 = client
            .fetch_query(key.clone(), policy, || async { Ok(1u32) })
            .await
            .unwrap();

        mutation.mutate(PostId::from(4u64)).await.unwrap();

        let refetched: u32 = client
            .fetch_query(key, policy, || async { Ok(2u32) })
            .await
            .unwrap();
        assert_eq!(refetched, 2);
    }

    #[tokio::test]
    async fn test_reset_returns_to_idle() {
        let mock = MockTransport::new();
        mock.expect_get("posts/5").return_ok(post(5));
        let (client, dispatcher) = setup(&mock);
        let mutation = UseMutation::<GetPostById>::new(client, dispatcher, MutationOptions::default());

        mutation.mutate(PostId::from(5u64)).await.unwrap();
        mutation.reset();

        let state = mutation.state();
        assert_eq!(state.status, Status::Idle);
        assert!(state.data.is_none());
        assert_eq!(state.submitted, 1);
    }
}
