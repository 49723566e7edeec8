//! Cache layer for route queries.
//!
//! # Main Components
//!
//! - [`QueryActor`] - Actor owning the cache entry table
//! - [`QueryClient`] - Cloneable handle hooks use to fetch, peek and invalidate
//! - [`QueryKey`] / [`FetchPolicy`] - What is cached and for how long
//! - [`QueryError`] - Errors surfaced by the cache layer
//!
//! # Testing
//!
//! See [`mock`] module for a scripted [`Transport`](crate::transport::Transport)
//! that lets the whole stack run without a network.

pub mod core;
pub mod mock;

// Re-export core types for convenience
pub use self::core::*;
