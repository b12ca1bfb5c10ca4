//! Relay HTTP server
//!
//! Binds the listener and serves the router. Connection tasks are spawned by
//! axum; each live stream owns its subscription.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

use crate::broker::BrokerHandle;
use crate::error::Result;
use crate::server::config::ServerConfig;
use crate::server::{router, AppState};

/// HTTP server in front of the fan-out broker
pub struct RelayServer {
    state: AppState,
}

impl RelayServer {
    /// Create a new server with the given configuration and broker
    pub fn new(config: ServerConfig, broker: BrokerHandle) -> Self {
        Self {
            state: AppState::new(broker, config),
        }
    }

    /// Router with all relay routes, for embedding or in-process testing
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.bind_addr()).await?;
        self.serve(listener).await
    }

    /// Run the server until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.bind_addr()).await?;

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.serve(listener) => result,
        }
    }

    /// Serve on an already-bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "Relay server listening");

        axum::serve(listener, self.router()).into_future().await?;
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.state.config.bind_addr
    }
}
