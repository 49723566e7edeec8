use crate::config::{ApiConfig, ConfigError, QueryDefaults};
use crate::dispatch::Dispatcher;
use crate::framework::{QueryActor, QueryClient};
use crate::hooks::Hooks;
use crate::routes::ApiRoutes;
use crate::transport::{FileTokenStore, HttpTransport, MemoryTokenStore, TokenStore, Transport};
use std::sync::Arc;
use tracing::{error, info};

/// Capacity of the query cache's request channel.
const CACHE_BUFFER: usize = 64;

/// The running client stack: transport, registry, dispatcher and query cache.
///
/// # Example
///
/// ```ignore
/// let system = ApiSystem::from_env()?;
/// system.tokens.set_token("abc")?;
///
/// let post = system.dispatcher.send::<GetPostById>(PostId::from(1u64)).await?;
///
/// system.shutdown().await?;
/// ```
pub struct ApiSystem {
    /// The route registry every request goes through.
    pub routes: Arc<ApiRoutes>,

    pub dispatcher: Dispatcher,

    /// Client for the query cache actor.
    pub query_client: QueryClient,

    /// Factory for fetch and mutate hooks.
    pub hooks: Hooks,

    /// Where the bearer token is read from on every request.
    pub tokens: Arc<dyn TokenStore>,

    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl ApiSystem {
    /// Builds the HTTP stack from `config` and starts the cache.
    ///
    /// The token lives in `config.token_file` when set, in memory otherwise.
    /// Must be called inside a tokio runtime.
    pub fn new(config: ApiConfig, defaults: QueryDefaults) -> Result<Self, ConfigError> {
        let tokens: Arc<dyn TokenStore> = match &config.token_file {
            Some(path) => Arc::new(FileTokenStore::new(path.clone())),
            None => Arc::new(MemoryTokenStore::new()),
        };
        let transport = HttpTransport::new(&config, tokens.clone())?;
        info!(base_url = %transport.base_url(), "HTTP transport ready");
        Ok(Self::assemble(Arc::new(transport), tokens, defaults))
    }

    /// [`ApiSystem::new`] with settings from the environment and default query policy.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(ApiConfig::from_env()?, QueryDefaults::default())
    }

    /// Starts the stack over an existing transport (a mock, usually).
    pub fn with_transport(transport: Arc<dyn Transport>, defaults: QueryDefaults) -> Self {
        Self::assemble(transport, Arc::new(MemoryTokenStore::new()), defaults)
    }

    fn assemble(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenStore>,
        defaults: QueryDefaults,
    ) -> Self {
        // 1. Stateless layers
        let routes = Arc::new(ApiRoutes::new(transport));
        let dispatcher = Dispatcher::new(routes.clone());

        // 2. Cache actor
        let (cache_actor, query_client) = QueryActor::new(CACHE_BUFFER, defaults);
        let cache_handle = tokio::spawn(cache_actor.run());

        let hooks = Hooks::new(query_client.clone(), dispatcher.clone());

        Self {
            routes,
            dispatcher,
            query_client,
            hooks,
            tokens,
            handles: vec![cache_handle],
        }
    }

    /// Stops the cache actor and waits for it.
    ///
    /// Drops this system's cache clients. Any hook still alive elsewhere keeps
    /// the actor running, so drop hooks before calling this.
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down API system...");

        // =====================================================================
        // Step 1: Close the cache channel by dropping clients
        // =====================================================================

        drop(self.hooks);
        drop(self.query_client);

        // =====================================================================
        // Step 2: Wait for the actor task
        // =====================================================================

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Cache task failed: {:?}", e);
                return Err(format!("Cache task failed: {:?}", e));
            }
        }

        info!("API system shutdown complete.");
        Ok(())
    }
}
