//! # Observability & Tracing
//!
//! [`setup_tracing`] installs a compact `tracing-subscriber` formatter filtered by
//! `RUST_LOG`. Module paths are hidden (`with_target(false)`); spans carry the
//! context instead.
//!
//! ## What Gets Traced
//!
//! - **Cache lifecycle**: actor start and stop, with the entry count at exit.
//! - **Queries**: cache hits, joined in-flight fetches, successes and failures,
//!   each tagged with the query key.
//! - **Transport**: one span per request; failures are classified and logged
//!   (`Unauthorized`, `Forbidden`, `Not found`, `Server error`, `No response`).
//! - **Mutations**: each call's outcome and its position in the call sequence.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run
//!
//! # payloads and cache decisions
//! RUST_LOG=debug cargo run
//!
//! RUST_LOG=route_query::transport=debug cargo run
//! ```
//!
//! With `RUST_LOG=debug` a cached read looks like:
//!
//! ```text
//! DEBUG Fetching key=posts-getPostById:"1" generation=3 force=false
//! DEBUG send_request: Dispatching payload=PostId("1") route=posts-getPostById
//! INFO Query succeeded key=posts-getPostById:"1" waiters=1
//! ```

/// Installs the global subscriber. Call once, at startup.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
