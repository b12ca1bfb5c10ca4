//! HTTP surface
//!
//! | Route          | Method    | Purpose                                  |
//! |----------------|-----------|------------------------------------------|
//! | `/`            | GET       | Minimal viewer page                      |
//! | `/event`       | GET       | Live SSE stream of broker notifications  |
//! | `/msg`         | GET, POST | Inject a payload into the broker         |
//! | `/health`      | GET       | Liveness probe                           |
//! | `/stats`       | GET       | Broker counters as JSON                  |

pub mod config;
pub mod control;
pub mod listener;
pub mod stream;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::sync::Semaphore;

use crate::broker::BrokerHandle;

pub use config::ServerConfig;
pub use listener::RelayServer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub broker: BrokerHandle,
    pub config: Arc<ServerConfig>,
    /// Live-stream slots; `None` when unlimited
    pub slots: Option<Arc<Semaphore>>,
}

impl AppState {
    pub fn new(broker: BrokerHandle, config: ServerConfig) -> Self {
        let slots = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            broker,
            config: Arc::new(config),
            slots,
        }
    }
}

/// Build the relay router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(control::index))
        .route("/event", get(stream::event_stream))
        .route("/msg", get(control::inject_query).post(control::inject_body))
        .route("/health", get(control::health))
        .route("/stats", get(control::stats))
        .with_state(state)
}
