mod auth;
mod health;

use std::net::SocketAddr;

use axon_config::Config;
use axon_llm::LlmState;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream client or the auth layer cannot be
    /// constructed
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let llm_state = LlmState::from_config(&config.llm)?;

        let mut app = Router::new();

        // Health check
        if config.server.health.enabled {
            app = app.route(&config.server.health.path, axum::routing::get(health::health_handler));
        }

        app = app.merge(axon_llm::llm_router(llm_state));

        // Tracing
        app = app.layer(TraceLayer::new_for_http());

        // API key authentication (outermost so rejected requests are cheap)
        if let Some(ref auth_config) = config.server.auth
            && auth_config.enabled
        {
            let auth = auth::ApiKeyAuth::new(auth_config, &config.server.health.path)?;
            app = app.layer(axum::middleware::from_fn(move |req, next| {
                let auth = auth.clone();
                async move { auth::auth_middleware(auth, req, next).await }
            }));
        }

        Ok(Self {
            router: app,
            listen_address,
        })
    }

    /// Override the configured listen address
    #[must_use]
    pub fn with_listen_address(mut self, listen_address: SocketAddr) -> Self {
        self.listen_address = listen_address;
        self
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}
