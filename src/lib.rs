#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Route Query
//!
//! > **A typed REST client with a query cache on top.**
//!
//! This crate wraps a JSON REST API (posts and photos) in a route registry, a
//! type-checked dispatcher, and fetch/mutate hooks backed by an in-process
//! query cache that runs as a Tokio actor.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### One registry, typed at compile time
//!
//! Every endpoint has a location `(resource, method)`, such as `posts-getPostById`.
//! A zero-sized marker type implements [`Endpoint`](routes::Endpoint) for each
//! location and fixes its payload and result types, so
//! `dispatcher.send::<GetPostById>(post_id)` cannot be called with a photo title.
//!
//! ### Cache as an actor
//!
//! The cache owns its table and processes one message at a time, so no locks
//! are involved. Fetches run in their own tasks and report back, concurrent
//! reads of one key share a single request, and a failed refetch keeps the
//! last good value.
//!
//! ## 🚀 Core Concepts
//!
//! ### Envelopes
//! Every successful call yields an [`Envelope<T>`](model::Envelope): the decoded
//! body in `data` plus the HTTP reason phrase in `message`. Failures are a
//! [`TransportError`](transport::TransportError) that no layer rewraps.
//!
//! ### Mocking
//! [`MockTransport`](framework::mock::MockTransport) stands in for the network in
//! unit tests. Expectations are keyed by request target (`posts/5`,
//! `photos?title=cat`).
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Wire ([`transport`], [`config`])
//! - **Role**: turns an [`ApiRequest`](transport::ApiRequest) into an HTTP call with
//!   the bearer token attached, and classifies failures.
//! - **Key items**: [`HttpTransport`](transport::HttpTransport),
//!   [`TokenStore`](transport::TokenStore), [`ApiConfig`](config::ApiConfig).
//!
//! ### 2. The Registry ([`routes`], [`dispatch`], [`model`])
//! - **Role**: one async function per endpoint, grouped by resource, and the
//!   typed dispatcher that resolves a marker to its function.
//! - **Key items**: [`ApiRoutes`](routes::ApiRoutes),
//!   [`send_request`](dispatch::send_request), [`Dispatcher`](dispatch::Dispatcher).
//!
//! ### 3. The Engine ([`framework`])
//! - **Role**: the query cache actor and its client.
//! - **Key items**: [`QueryActor`](framework::QueryActor),
//!   [`QueryClient`](framework::QueryClient).
//!
//! ### 4. The Interface ([`hooks`])
//! - **Role**: cached reads that follow a reactive payload, and writes with a
//!   per-call payload.
//! - **Key items**: [`Hooks::use_query`](hooks::Hooks::use_query),
//!   [`Hooks::use_mutation`](hooks::Hooks::use_mutation).
//!
//! ### 5. The Orchestrator ([`lifecycle`])
//! - **Key items**: [`ApiSystem`](lifecycle::ApiSystem),
//!   [`setup_tracing`](lifecycle::tracing::setup_tracing).
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Run the demo against the default base URL
//! RUST_LOG=info cargo run
//!
//! # Point it elsewhere
//! ROUTE_QUERY_BASE_URL=http://localhost:3000/ cargo run
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod config;
pub mod dispatch;
pub mod framework;
pub mod hooks;
pub mod lifecycle;
pub mod model;
pub mod routes;
pub mod transport;
