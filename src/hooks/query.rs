use super::query_key;
use super::state::{QueryState, Status};
use crate::config::QueryDefaults;
use crate::dispatch::Dispatcher;
use crate::framework::{FetchPolicy, QueryClient, QueryError, QueryKey};
use crate::model::Envelope;
use crate::routes::{Endpoint, RouteKey};
use futures::future::BoxFuture;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, debug_span, Instrument};

/// Where a query reads its payload from.
#[derive(Debug)]
pub enum PayloadSource<P> {
    /// Constant for the life of the hook.
    Fixed(P),
    /// Re-read on every change; each change triggers a fetch for the new key.
    Reactive(watch::Receiver<P>),
}

impl<P: Clone> PayloadSource<P> {
    pub fn fixed(payload: P) -> Self {
        PayloadSource::Fixed(payload)
    }

    pub fn current(&self) -> P {
        match self {
            PayloadSource::Fixed(payload) => payload.clone(),
            PayloadSource::Reactive(rx) => rx.borrow().clone(),
        }
    }

    /// Resolves on the next payload change. Never resolves once no further
    /// change can arrive (fixed payload, or the sender was dropped).
    async fn changed(&mut self) {
        loop {
            let last = match self {
                PayloadSource::Fixed(_) => return std::future::pending().await,
                PayloadSource::Reactive(rx) => {
                    if rx.changed().await.is_ok() {
                        return;
                    }
                    let last = rx.borrow().clone();
                    last
                }
            };
            *self = PayloadSource::Fixed(last);
        }
    }
}

impl<P> From<watch::Receiver<P>> for PayloadSource<P> {
    fn from(rx: watch::Receiver<P>) -> Self {
        PayloadSource::Reactive(rx)
    }
}

impl From<()> for PayloadSource<()> {
    fn from(_: ()) -> Self {
        PayloadSource::Fixed(())
    }
}

/// Per-query overrides of the cache defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    pub stale_time: Option<Duration>,
    pub retry: Option<u32>,
    /// When false, nothing is fetched until [`UseQuery::refetch`].
    pub enabled: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: None,
            retry: None,
            enabled: true,
        }
    }
}

impl QueryOptions {
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn policy(&self, defaults: QueryDefaults) -> FetchPolicy {
        let mut policy = FetchPolicy::from(defaults);
        if let Some(stale_time) = self.stale_time {
            policy.stale_time = stale_time;
        }
        if let Some(retry) = self.retry {
            policy.retry = retry;
        }
        policy
    }
}

type EndpointState<E> = QueryState<Envelope<<E as Endpoint>::Output>>;
type Refetch<E> = oneshot::Sender<EndpointState<E>>;

/// A running cached read of endpoint `E`.
///
/// The background task stops when the handle is dropped.
pub struct UseQuery<E: Endpoint> {
    route: RouteKey,
    state: watch::Receiver<EndpointState<E>>,
    refetch_tx: mpsc::Sender<Refetch<E>>,
    task: JoinHandle<()>,
}

impl<E: Endpoint> UseQuery<E> {
    pub(super) fn spawn(
        client: QueryClient,
        dispatcher: Dispatcher,
        payload: PayloadSource<E::Payload>,
        options: QueryOptions,
    ) -> Self {
        let initial = if options.enabled {
            QueryState::pending()
        } else {
            QueryState::idle()
        };
        let (state_tx, state) = watch::channel(initial);
        let (refetch_tx, refetch_rx) = mpsc::channel(8);
        let driver = QueryDriver::<E> {
            policy: options.policy(client.defaults()),
            enabled: options.enabled,
            client,
            dispatcher,
            state: state_tx,
            last_key: None,
        };
        let task = tokio::spawn(driver.run(payload, refetch_rx));
        Self {
            route: E::route_key(),
            state,
            refetch_tx,
            task,
        }
    }

    pub fn route_key(&self) -> RouteKey {
        self.route
    }

    pub fn state(&self) -> EndpointState<E> {
        self.state.borrow().clone()
    }

    pub fn data(&self) -> Option<Envelope<E::Output>> {
        self.state.borrow().data.clone()
    }

    pub fn error(&self) -> Option<QueryError> {
        self.state.borrow().error.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EndpointState<E>> {
        self.state.clone()
    }

    /// Waits until `predicate` holds for the state and returns that state.
    pub async fn wait_until(
        &self,
        mut predicate: impl FnMut(&EndpointState<E>) -> bool,
    ) -> EndpointState<E> {
        let mut rx = self.state.clone();
        let reached = rx.wait_for(|state| predicate(state)).await.map(|state| (*state).clone());
        reached.unwrap_or_else(|_| self.state())
    }

    /// Waits for the current fetch (if any) to finish.
    pub async fn wait_settled(&self) -> EndpointState<E> {
        self.wait_until(QueryState::is_settled).await
    }

    /// Fetches again, ignoring freshness, and returns the resulting state.
    pub async fn refetch(&self) -> Result<EndpointState<E>, QueryError> {
        let (reply, response) = oneshot::channel();
        self.refetch_tx
            .send(reply)
            .await
            .map_err(|_| QueryError::CacheClosed)?;
        response.await.map_err(|_| QueryError::CacheDropped)
    }
}

impl<E: Endpoint> Drop for UseQuery<E> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

type PendingFetch<E> = BoxFuture<'static, Result<Envelope<<E as Endpoint>::Output>, QueryError>>;

struct QueryDriver<E: Endpoint> {
    client: QueryClient,
    dispatcher: Dispatcher,
    policy: FetchPolicy,
    enabled: bool,
    state: watch::Sender<EndpointState<E>>,
    last_key: Option<QueryKey>,
}

impl<E: Endpoint> QueryDriver<E> {
    /// A payload change or refetch replaces the fetch being awaited. The cache
    /// still completes the replaced fetch for anyone else reading that key.
    async fn run(
        mut self,
        mut payload: PayloadSource<E::Payload>,
        mut refetch_rx: mpsc::Receiver<Refetch<E>>,
    ) {
        let mut current: Option<PendingFetch<E>> = None;
        let mut replies: Vec<Refetch<E>> = Vec::new();
        if self.enabled {
            current = self.start(payload.current(), self.policy);
        }
        loop {
            tokio::select! {
                _ = payload.changed() => {
                    if self.enabled {
                        current = self.start(payload.current(), self.policy);
                    }
                }
                request = refetch_rx.recv() => match request {
                    Some(reply) => {
                        replies.push(reply);
                        current = self.start(payload.current(), self.policy.forced());
                    }
                    None => break,
                },
                result = next_result(&mut current) => {
                    current = None;
                    self.finish(result);
                }
            }
            if current.is_none() {
                for reply in replies.drain(..) {
                    let _ = reply.send(self.state.borrow().clone());
                }
            }
        }
    }

    /// Moves the state to the key for `payload` and returns the fetch for it.
    fn start(&mut self, payload: E::Payload, policy: FetchPolicy) -> Option<PendingFetch<E>> {
        let key = match query_key::<E>(&payload) {
            Ok(key) => key,
            Err(e) => {
                self.state.send_modify(|state| {
                    state.status = Status::Error;
                    state.error = Some(e);
                    state.is_fetching = false;
                });
                return None;
            }
        };

        let key_changed = self.last_key.as_ref() != Some(&key);
        self.state.send_modify(|state| {
            if key_changed {
                state.status = Status::Pending;
                state.data = None;
                state.error = None;
            }
            state.is_fetching = true;
        });
        self.last_key = Some(key.clone());
        debug!(%key, key_changed, force = policy.force, "Query fetch");

        let span = debug_span!("use_query", route = %E::route_key());
        let client = self.client.clone();
        let dispatcher = self.dispatcher.clone();
        let fetch = async move {
            client
                .fetch_query(key, policy, move || {
                    let dispatcher = dispatcher.clone();
                    let payload = payload.clone();
                    async move { dispatcher.send::<E>(payload).await }
                })
                .await
        };
        Some(Box::pin(fetch.instrument(span)))
    }

    fn finish(&mut self, result: Result<Envelope<E::Output>, QueryError>) {
        self.state.send_modify(|state| {
            state.is_fetching = false;
            match result {
                Ok(envelope) => {
                    state.status = Status::Success;
                    state.data = Some(envelope);
                    state.error = None;
                }
                Err(e) => {
                    state.status = Status::Error;
                    state.error = Some(e);
                }
            }
        });
    }
}

/// Resolves with the running fetch's result; pends while there is none.
async fn next_result<T>(fetch: &mut Option<BoxFuture<'static, T>>) -> T {
    match fetch {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}
