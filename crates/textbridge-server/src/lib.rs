use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use textbridge_config::Config;
use textbridge_gateway::{BackendClient, GatewayState};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// How long open streams get to wind down once shutdown starts
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    backend: BackendClient,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the backend HTTP client cannot be constructed
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let listen_address = config.server.listen_address();

        let backend = BackendClient::new(&config.backend, config.sampling)?;
        let state = GatewayState::new(backend.clone(), config.backend.default_model);

        tracing::debug!(backend = %config.backend.url, "gateway configured");

        let router = textbridge_gateway::gateway_router(state).layer(TraceLayer::new_for_http());

        Ok(Self {
            router,
            backend,
            listen_address,
        })
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
    /// Blocks until the cancellation token is triggered. Stream forwarders are
    /// stopped first so open event streams close and connections can drain.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        let backend = self.backend;

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!(active_streams = backend.active_streams(), "graceful shutdown initiated");
                backend.shutdown(SHUTDOWN_GRACE).await;
            })
            .await?;

        Ok(())
    }
}
