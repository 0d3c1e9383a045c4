//! Client construction by transport kind.

use std::sync::Arc;

use mcplink_core::{CancellationToken, ClientResult, McpClient, TransportKind};
use mcplink_http::HttpMcpClient;
use mcplink_stdio::{SessionScopedStdioClient, StdioSessionManager};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::McpConfig;

/// Builds [`McpClient`]s for the configured transport
///
/// HTTP clients share one connection pool; stdio clients share one
/// [`StdioSessionManager`], which the factory owns and disposes on
/// [`shutdown`](Self::shutdown).
#[derive(Debug)]
pub struct ClientFactory {
    config: McpConfig,
    http_client: reqwest::Client,
    stdio_manager: Arc<StdioSessionManager>,
}

impl ClientFactory {
    /// Factory for `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP connection pool cannot be built.
    pub fn new(config: McpConfig) -> ClientResult<Self> {
        let http_client = config
            .http_client_config(TransportKind::HttpStreaming)
            .build_http_client()?;
        let stdio_manager = Arc::new(StdioSessionManager::new(config.stdio_config()));

        Ok(Self {
            config,
            http_client,
            stdio_manager,
        })
    }

    /// Configuration the factory was built from.
    pub fn config(&self) -> &McpConfig {
        &self.config
    }

    /// Shared stdio session registry.
    pub fn stdio_manager(&self) -> &Arc<StdioSessionManager> {
        &self.stdio_manager
    }

    /// Client for the configured transport.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the transport cannot be constructed.
    pub fn create(&self) -> ClientResult<Box<dyn McpClient>> {
        self.create_for(self.config.transport)
    }

    /// Client for an explicit transport.
    ///
    /// # Errors
    ///
    /// See [`create`](Self::create).
    pub fn create_for(&self, kind: TransportKind) -> ClientResult<Box<dyn McpClient>> {
        debug!("Creating {} client", kind);
        match kind {
            TransportKind::HttpStreaming | TransportKind::Sse => {
                Ok(Box::new(HttpMcpClient::with_http_client(
                    self.config.http_client_config(kind),
                    self.http_client.clone(),
                )))
            }
            TransportKind::Stdio => Ok(Box::new(SessionScopedStdioClient::new(Arc::clone(
                &self.stdio_manager,
            )))),
        }
    }

    /// Start the idle reaper when `stdio.idle_timeout_secs` is set.
    ///
    /// Sweeps run at a quarter of the idle timeout, at least once a second.
    pub fn spawn_idle_reaper(&self, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        let max_idle = self.config.stdio_idle_timeout()?;
        let interval = (max_idle / 4).max(std::time::Duration::from_secs(1));
        info!(
            "Idle reaper evicting stdio sessions after {:?} (sweep every {:?})",
            max_idle, interval
        );
        Some(
            self.stdio_manager
                .spawn_idle_reaper(interval, max_idle, shutdown),
        )
    }

    /// Dispose every stdio session.
    pub async fn shutdown(&self) {
        self.stdio_manager.dispose_all().await;
    }
}
