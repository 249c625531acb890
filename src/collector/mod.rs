//! Silence event collector
//!
//! A small HTTP service that accepts pings from one or more monitors,
//! keeps them in memory, and renders them as text or JSON. A frozen
//! snapshot can be taken at any time so readers see a stable view while
//! new pings keep arriving.

mod health;
mod routes;
mod store;

pub use health::HealthResponse;
pub use routes::{EventsResponse, IngestError, render_text};
pub use store::EventLog;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::CollectorConfig;
use crate::{Error, Result};

/// Collector HTTP server
pub struct CollectorServer {
    config: CollectorConfig,
    log: Arc<EventLog>,
}

impl CollectorServer {
    #[must_use]
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            config,
            log: Arc::new(EventLog::new()),
        }
    }

    /// Shared event log
    #[must_use]
    pub fn log(&self) -> Arc<EventLog> {
        Arc::clone(&self.log)
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        routes::router(self.log())
            .merge(health::router())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until the process exits
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind collector on {addr}: {e}")))?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener
    ///
    /// # Errors
    ///
    /// Returns error if the server fails
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "collector listening");
        }

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown requested");
            })
            .await?;

        Ok(())
    }
}
