//! # Fetch & Mutate Hooks
//!
//! Thin adapters that run the [`Dispatcher`] through the query cache.
//!
//! - [`Hooks::use_query`] reads: the cache key is the endpoint's route key plus
//!   the current payload, and the hook refetches whenever a reactive payload
//!   changes.
//! - [`Hooks::use_mutation`] writes: the payload is supplied per call, never
//!   captured at setup.
//!
//! Both must be created inside a tokio runtime.

pub mod mutation;
pub mod query;
pub mod state;

pub use mutation::{MutationOptions, UseMutation};
pub use query::{PayloadSource, QueryOptions, UseQuery};
pub use state::{MutationState, QueryState, Status};

use crate::dispatch::Dispatcher;
use crate::framework::{QueryClient, QueryError, QueryKey};
use crate::routes::Endpoint;

/// Cache key for a read of `E` with `payload`.
pub fn query_key<E: Endpoint>(payload: &E::Payload) -> Result<QueryKey, QueryError> {
    QueryKey::new(E::route_key(), payload)
}

/// Factory for hooks sharing one cache and one registry.
#[derive(Clone)]
pub struct Hooks {
    client: QueryClient,
    dispatcher: Dispatcher,
}

impl Hooks {
    pub fn new(client: QueryClient, dispatcher: Dispatcher) -> Self {
        Self { client, dispatcher }
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Starts a cached read of `E`.
    ///
    /// `payload` is `()` for endpoints without one, a `watch::Receiver` for a
    /// reactive payload, or [`PayloadSource::fixed`] for a constant.
    pub fn use_query<E: Endpoint>(
        &self,
        payload: impl Into<PayloadSource<E::Payload>>,
        options: QueryOptions,
    ) -> UseQuery<E> {
        UseQuery::spawn(
            self.client.clone(),
            self.dispatcher.clone(),
            payload.into(),
            options,
        )
    }

    pub fn use_mutation<E: Endpoint>(&self, options: MutationOptions) -> UseMutation<E> {
        UseMutation::new(self.client.clone(), self.dispatcher.clone(), options)
    }
}
