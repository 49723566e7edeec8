//! # System Lifecycle
//!
//! Wires the layers together and tears them down again.
//!
//! [`ApiSystem`] is the composition root: it builds the transport, the route
//! registry and the dispatcher, spawns the query cache actor, and hands out a
//! [`Hooks`](crate::hooks::Hooks) factory bound to all of them.
//!
//! ```rust,ignore
//! let system = ApiSystem::new(ApiConfig::from_env()?, QueryDefaults::default())?;
//! let posts = system.hooks.use_query::<GetPosts>((), QueryOptions::default());
//! posts.wait_settled().await;
//! drop(posts);
//! system.shutdown().await?;
//! ```
//!
//! Shutdown follows the usual actor pattern: dropping every
//! [`QueryClient`](crate::framework::QueryClient) closes the cache's channel, the
//! actor's `run()` loop sees `None` and returns, and `shutdown()` awaits it.
//! Hooks hold a client clone, so drop them first.
//!
//! [`tracing::setup_tracing`] installs the compact `RUST_LOG`-driven subscriber
//! used by the demo binary.

pub mod api_system;
pub mod tracing;

pub use api_system::ApiSystem;
