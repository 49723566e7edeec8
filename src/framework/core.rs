//! # Query Cache
//!
//! The cache layer that sits between the hooks and the dispatcher.
//!
//! ## Key Types
//!
//! - [`QueryActor`]: owns the entry table and decides, per request, whether to
//!   answer from cache, join a fetch already in flight, or start a new one.
//! - [`QueryClient`]: cheap, cloneable handle used by hooks to talk to the actor.
//! - [`QueryKey`]: route key plus the serialized payload.
//! - [`QueryError`]: the cache's own error channel. Transport failures travel
//!   through it unchanged inside [`QueryError::Transport`].

use crate::config::{backoff_delay, QueryDefaults};
use crate::transport::TransportError;
use futures::future::BoxFuture;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

/// Bounds on how often the actor looks for entries to evict.
const MIN_SWEEP: Duration = Duration::from_millis(10);
const MAX_SWEEP: Duration = Duration::from_secs(60);

// =============================================================================
// 1. KEYS, POLICIES & ERRORS
// =============================================================================

/// Identifies one cache entry: `"{resource}-{method}"` plus the JSON payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    route: String,
    payload: String,
}

impl QueryKey {
    pub fn new(route: impl Display, payload: &impl Serialize) -> Result<Self, QueryError> {
        let route = route.to_string();
        let payload = serde_json::to_string(payload).map_err(|e| QueryError::InvalidKey {
            route: route.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { route, payload })
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Prefix match on the route key. The empty prefix matches everything.
    pub fn matches(&self, prefix: &str) -> bool {
        self.route.starts_with(prefix)
    }
}

impl Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.route, self.payload)
    }
}

/// How a single fetch should treat the cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchPolicy {
    /// Age after which a cached value is refetched.
    pub stale_time: Duration,
    /// Extra attempts after the first failure.
    pub retry: u32,
    pub retry_delay: Duration,
    /// Ignore freshness (explicit refetch).
    pub force: bool,
}

impl FetchPolicy {
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

impl From<QueryDefaults> for FetchPolicy {
    fn from(defaults: QueryDefaults) -> Self {
        Self {
            stale_time: defaults.stale_time,
            retry: defaults.retry,
            retry_delay: defaults.retry_delay,
            force: false,
        }
    }
}

/// Errors surfaced by the cache layer.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum QueryError {
    /// The fetch itself failed; the transport error is passed through as-is.
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Query cache closed")]
    CacheClosed,
    #[error("Query cache dropped response channel")]
    CacheDropped,
    #[error("Cached value for {0} has a different type")]
    TypeMismatch(String),
    #[error("Payload for {route} cannot be used as a cache key: {reason}")]
    InvalidKey { route: String, reason: String },
}

impl QueryError {
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            QueryError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

// =============================================================================
// 2. MESSAGES
// =============================================================================

/// Type-erased cached value. Each key always stores the same concrete type.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

pub type FetchFuture = BoxFuture<'static, Result<CachedValue, TransportError>>;

/// Produces a fresh fetch each time it is called (first attempt and retries).
pub type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

/// Type alias for the one-shot response channel used by the actor.
pub type Response<T> = oneshot::Sender<Result<T, QueryError>>;

/// Requests handled by the [`QueryActor`].
pub enum QueryRequest {
    Fetch {
        key: QueryKey,
        fetcher: Fetcher,
        policy: FetchPolicy,
        respond_to: Response<CachedValue>,
    },
    Peek {
        key: QueryKey,
        respond_to: Response<Option<CachedValue>>,
    },
    Invalidate {
        prefix: String,
        respond_to: Response<usize>,
    },
    Remove {
        prefix: String,
        respond_to: Response<usize>,
    },
}

/// Completion of a fetch task, reported back to the actor.
struct Settled {
    key: QueryKey,
    generation: u64,
    result: Result<CachedValue, TransportError>,
}

// =============================================================================
// 3. THE ACTOR
// =============================================================================

struct InFlight {
    generation: u64,
    waiters: Vec<Response<CachedValue>>,
}

#[derive(Default)]
struct CacheEntry {
    value: Option<CachedValue>,
    updated_at: Option<Instant>,
    invalidated: bool,
    /// Last generation handed out before the most recent invalidation.
    invalidated_at: u64,
    in_flight: Option<InFlight>,
}

impl CacheEntry {
    /// The running fetch started before the entry was last invalidated.
    fn in_flight_superseded(&self) -> bool {
        match &self.in_flight {
            Some(in_flight) => self.invalidated && in_flight.generation <= self.invalidated_at,
            None => false,
        }
    }

    fn fresh_value(&self, stale_time: Duration) -> Option<&CachedValue> {
        if self.invalidated {
            return None;
        }
        match (&self.value, self.updated_at) {
            (Some(value), Some(at)) if at.elapsed() < stale_time => Some(value),
            _ => None,
        }
    }
}

/// Owner of the cache entry table.
///
/// Messages are processed one at a time, so the table needs no lock. Fetches
/// run in their own tasks and report back over an internal channel, which keeps
/// a slow request for one key from holding up any other key.
///
/// Entries not updated within `gc_time` are evicted by a periodic sweep unless
/// a fetch for them is running.
pub struct QueryActor {
    receiver: mpsc::Receiver<QueryRequest>,
    settled_tx: mpsc::UnboundedSender<Settled>,
    settled_rx: mpsc::UnboundedReceiver<Settled>,
    entries: HashMap<QueryKey, CacheEntry>,
    next_generation: u64,
    gc_time: Duration,
}

impl QueryActor {
    pub fn new(buffer_size: usize, defaults: QueryDefaults) -> (Self, QueryClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        let actor = Self {
            receiver,
            settled_tx,
            settled_rx,
            entries: HashMap::new(),
            next_generation: 0,
            gc_time: defaults.gc_time,
        };
        (actor, QueryClient::new(sender, defaults))
    }

    /// Runs until every [`QueryClient`] has been dropped.
    pub async fn run(mut self) {
        info!(gc_time = ?self.gc_time, "Query cache started");
        let mut sweep = tokio::time::interval(self.gc_time.clamp(MIN_SWEEP, MAX_SWEEP));
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                msg = self.receiver.recv() => match msg {
                    Some(msg) => self.handle(msg),
                    None => break,
                },
                Some(settled) = self.settled_rx.recv() => self.settle(settled),
                _ = sweep.tick() => self.collect_garbage(),
            }
        }
        info!(entries = self.entries.len(), "Query cache stopped");
    }

    fn handle(&mut self, msg: QueryRequest) {
        match msg {
            QueryRequest::Fetch {
                key,
                fetcher,
                policy,
                respond_to,
            } => self.fetch(key, fetcher, policy, respond_to),
            QueryRequest::Peek { key, respond_to } => {
                let value = self.entries.get(&key).and_then(|e| e.value.clone());
                debug!(%key, found = value.is_some(), "Peek");
                let _ = respond_to.send(Ok(value));
            }
            QueryRequest::Invalidate { prefix, respond_to } => {
                let marked_at = self.next_generation;
                let mut count = 0;
                for entry in self
                    .entries
                    .iter_mut()
                    .filter(|(key, _)| key.matches(&prefix))
                    .map(|(_, entry)| entry)
                {
                    entry.invalidated = true;
                    entry.invalidated_at = marked_at;
                    count += 1;
                }
                info!(prefix = %prefix, count, "Invalidated");
                let _ = respond_to.send(Ok(count));
            }
            QueryRequest::Remove { prefix, respond_to } => {
                let before = self.entries.len();
                // Entries with a fetch in flight keep their waiters; only the value goes.
                self.entries.retain(|key, entry| {
                    if !key.matches(&prefix) {
                        return true;
                    }
                    if entry.in_flight.is_some() {
                        entry.value = None;
                        entry.updated_at = None;
                        return true;
                    }
                    false
                });
                let count = before - self.entries.len();
                info!(prefix = %prefix, count, "Removed");
                let _ = respond_to.send(Ok(count));
            }
        }
    }

    fn fetch(
        &mut self,
        key: QueryKey,
        fetcher: Fetcher,
        policy: FetchPolicy,
        respond_to: Response<CachedValue>,
    ) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let entry = self.entries.entry(key.clone()).or_default();

        if !policy.force {
            if let Some(value) = entry.fresh_value(policy.stale_time) {
                debug!(%key, "Cache hit");
                let _ = respond_to.send(Ok(value.clone()));
                return;
            }
        }

        let superseded = entry.in_flight_superseded();
        if let Some(in_flight) = entry.in_flight.as_mut().filter(|_| !superseded) {
            in_flight.waiters.push(respond_to);
            debug!(%key, waiters = in_flight.waiters.len(), "Joined in-flight fetch");
            return;
        }

        // A fetch that predates an invalidation hands its waiters to the new one;
        // its own result is dropped on arrival (generation mismatch).
        let mut waiters = entry
            .in_flight
            .take()
            .map(|in_flight| in_flight.waiters)
            .unwrap_or_default();
        if superseded {
            debug!(%key, waiters = waiters.len(), "Superseding fetch started before invalidation");
        }
        waiters.push(respond_to);

        debug!(%key, generation, force = policy.force, "Fetching");
        entry.in_flight = Some(InFlight {
            generation,
            waiters,
        });

        let settled_tx = self.settled_tx.clone();
        tokio::spawn(async move {
            let label = key.to_string();
            let result = retry_with_backoff(&label, policy.retry, policy.retry_delay, || {
                fetcher()
            })
            .await;
            // The actor may already be gone; nobody is left to tell.
            let _ = settled_tx.send(Settled {
                key,
                generation,
                result,
            });
        });
    }

    fn settle(&mut self, settled: Settled) {
        let Settled {
            key,
            generation,
            result,
        } = settled;
        let Some(entry) = self.entries.get_mut(&key) else {
            return;
        };
        let in_flight = match entry.in_flight.take() {
            Some(in_flight) if in_flight.generation == generation => in_flight,
            other => {
                entry.in_flight = other;
                return;
            }
        };

        match result {
            Ok(value) => {
                entry.value = Some(value.clone());
                entry.updated_at = Some(Instant::now());
                // Stays stale if invalidated after this fetch started.
                entry.invalidated = entry.invalidated && generation <= entry.invalidated_at;
                info!(%key, waiters = in_flight.waiters.len(), "Query succeeded");
                for waiter in in_flight.waiters {
                    let _ = waiter.send(Ok(value.clone()));
                }
            }
            Err(e) => {
                // Previous data (if any) stays in place.
                warn!(%key, error = %e, "Query failed");
                for waiter in in_flight.waiters {
                    let _ = waiter.send(Err(QueryError::Transport(e.clone())));
                }
            }
        }
    }

    fn collect_garbage(&mut self) {
        let gc_time = self.gc_time;
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            entry.in_flight.is_some()
                || entry.updated_at.is_some_and(|at| at.elapsed() < gc_time)
        });
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "Evicted unused entries");
        }
    }
}

/// Runs `op`, retrying up to `retry` more times with exponential backoff.
pub async fn retry_with_backoff<T, F, Fut>(
    label: &str,
    retry: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retry => {
                let delay = backoff_delay(base_delay, attempt);
                attempt += 1;
                warn!(key = label, attempt, ?delay, error = %e, "Attempt failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

// =============================================================================
// 4. THE CLIENT
// =============================================================================

/// Handle to a running [`QueryActor`].
///
/// Holds only a sender and the default policy, so cloning is inexpensive. The
/// actor stops once every clone is dropped.
#[derive(Clone)]
pub struct QueryClient {
    sender: mpsc::Sender<QueryRequest>,
    defaults: QueryDefaults,
}

impl QueryClient {
    pub fn new(sender: mpsc::Sender<QueryRequest>, defaults: QueryDefaults) -> Self {
        Self { sender, defaults }
    }

    pub fn defaults(&self) -> QueryDefaults {
        self.defaults
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Response<T>) -> QueryRequest,
    ) -> Result<T, QueryError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| QueryError::CacheClosed)?;
        response.await.map_err(|_| QueryError::CacheDropped)?
    }

    /// Returns the cached value for `key` if fresh, otherwise runs `fetch`
    /// (once, however many callers ask for the key concurrently).
    #[instrument(skip_all, fields(key = %key))]
    pub async fn fetch_query<T, F, Fut>(
        &self,
        key: QueryKey,
        policy: FetchPolicy,
        fetch: F,
    ) -> Result<T, QueryError>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, TransportError>> + Send + 'static,
    {
        let fetcher: Fetcher = Arc::new(move || -> FetchFuture {
            let fut = fetch();
            Box::pin(async move { fut.await.map(|value| Arc::new(value) as CachedValue) })
        });
        let value = self
            .request(|respond_to| QueryRequest::Fetch {
                key: key.clone(),
                fetcher,
                policy,
                respond_to,
            })
            .await?;
        downcast(&key, &value)
    }

    /// Cached value for `key`, fresh or not, without fetching.
    pub async fn get_query_data<T>(&self, key: &QueryKey) -> Result<Option<T>, QueryError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let value = self
            .request(|respond_to| QueryRequest::Peek {
                key: key.clone(),
                respond_to,
            })
            .await?;
        value.map(|v| downcast(key, &v)).transpose()
    }

    /// Marks every entry whose route key starts with `prefix` as stale.
    pub async fn invalidate_queries(&self, prefix: &str) -> Result<usize, QueryError> {
        self.request(|respond_to| QueryRequest::Invalidate {
            prefix: prefix.to_string(),
            respond_to,
        })
        .await
    }

    /// Drops every entry whose route key starts with `prefix`.
    pub async fn remove_queries(&self, prefix: &str) -> Result<usize, QueryError> {
        self.request(|respond_to| QueryRequest::Remove {
            prefix: prefix.to_string(),
            respond_to,
        })
        .await
    }
}

fn downcast<T: Clone + 'static>(key: &QueryKey, value: &CachedValue) -> Result<T, QueryError> {
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| QueryError::TypeMismatch(key.to_string()))
}

// =============================================================================
// 5. TESTS
// =============================================================================
