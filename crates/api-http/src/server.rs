//! HTTP Server
//!
//! Binds the router and serves until the shutdown token fires.

use std::sync::Arc;

use tracing::info;

use codesift_core::application::worker::StopToken;
use codesift_core::error::{AppError, Result};

use crate::{build_router, ApiContext};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;

/// HTTP Server Configuration
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

pub struct HttpServer {
    config: HttpServerConfig,
    context: Arc<ApiContext>,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, context: Arc<ApiContext>) -> Self {
        Self { config, context }
    }

    /// Bind and serve until shutdown. Returns once the listener drains.
    pub async fn run(self, mut stop: StopToken) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Config(format!("bind {}: {}", addr, e)))?;

        info!(addr = %addr, "HTTP server listening");
        axum::serve(listener, build_router(self.context))
            .with_graceful_shutdown(async move { stop.stopped().await })
            .await
            .map_err(|e| AppError::Internal(format!("http server: {}", e)))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
