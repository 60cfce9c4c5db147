//! HTTP surface of the gateway: the device socket and a health probe

pub mod health;
pub mod websocket;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::gateway::Gateway;
use crate::session::SessionRegistry;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub gateway: Arc<Gateway>,
    pub registry: SessionRegistry,
}

/// Build the router with all routes
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .merge(websocket::router(Arc::clone(&state)))
        .merge(health::router(state))
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
    grace: Duration,
}

impl ApiServer {
    #[must_use]
    pub fn new(gateway: Arc<Gateway>) -> Self {
        let server = &gateway.config().server;
        let (host, port, grace) = (server.host.clone(), server.port, server.shutdown_grace);
        Self {
            state: Arc::new(ApiState {
                gateway,
                registry: SessionRegistry::new(),
            }),
            host,
            port,
            grace,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.state.registry
    }

    /// Run until interrupted by Ctrl+C or SIGTERM
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Bind the configured address and run until `shutdown` resolves
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves, then
    /// close every session
    ///
    /// New upgrades are refused as soon as shutdown begins. Sessions get a
    /// close frame and the configured grace period to finish before the
    /// listener goes away.
    ///
    /// # Errors
    ///
    /// Returns error if the server fails while running
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "API server listening");

        let registry = self.state.registry.clone();
        let grace = self.grace;
        let drain = async move {
            shutdown.await;
            tracing::info!("shutting down");
            registry.close_all(grace).await;
        };

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(drain)
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        tracing::info!("API server stopped");
        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
