//! [`McpClient`] over a shared [`StdioSessionManager`].
//!
//! The adapter resolves a session id per call (the explicit one in
//! [`CallOptions`], else the one its own `initialize` established) and
//! delegates to the manager's client for that id. It never owns a process.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};

use mcplink_core::{
    CallOptions, ClientError, ClientResult, McpClient, TransportKind, new_session_id,
};

use crate::manager::StdioSessionManager;
use crate::transport::StdioMcpClient;

/// Session-scoped stdio client
#[derive(Debug, Clone)]
pub struct SessionScopedStdioClient {
    manager: Arc<StdioSessionManager>,
    session_id: Arc<RwLock<Option<String>>>,
}

impl SessionScopedStdioClient {
    /// Adapter with no session yet.
    pub fn new(manager: Arc<StdioSessionManager>) -> Self {
        Self {
            manager,
            session_id: Arc::new(RwLock::new(None)),
        }
    }

    /// The registry this adapter delegates to.
    pub fn manager(&self) -> &Arc<StdioSessionManager> {
        &self.manager
    }

    fn resolve(&self, opts: &CallOptions) -> ClientResult<Arc<StdioMcpClient>> {
        let session_id = match opts.session() {
            Some(id) => id.to_string(),
            None => self.session_id.read().clone().ok_or_else(|| {
                ClientError::NotInitialized(
                    "no stdio session; call initialize or pass a session id".to_string(),
                )
            })?,
        };
        debug!("Resolved stdio session {}", session_id);
        Ok(self.manager.get_or_create(&session_id))
    }
}

#[async_trait]
impl McpClient for SessionScopedStdioClient {
    fn transport_kind(&self) -> TransportKind {
        TransportKind::Stdio
    }

    fn current_session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Uses the session id in `opts` when given, otherwise mints a new one.
    async fn initialize(&self, opts: &CallOptions) -> ClientResult<Value> {
        let session_id = opts
            .session()
            .map(str::to_string)
            .unwrap_or_else(new_session_id);

        let (client, created) = self.manager.get_or_create_tracked(&session_id);
        match client.initialize(opts).await {
            Ok(result) => {
                info!("Stdio session {} initialized", session_id);
                *self.session_id.write() = Some(session_id);
                Ok(result)
            }
            Err(e) => {
                // Only a session this call registered is dropped; existing
                // sessions belong to their other users.
                if created {
                    self.manager.remove_client(&session_id, &client).await;
                }
                Err(e)
            }
        }
    }

    async fn tools_list(&self, opts: &CallOptions, cursor: Option<&str>) -> ClientResult<Value> {
        self.resolve(opts)?.tools_list(opts, cursor).await
    }

    async fn tools_call(
        &self,
        opts: &CallOptions,
        name: &str,
        arguments: Option<Value>,
    ) -> ClientResult<Value> {
        self.resolve(opts)?.tools_call(opts, name, arguments).await
    }

    async fn resources_list(
        &self,
        opts: &CallOptions,
        cursor: Option<&str>,
    ) -> ClientResult<Value> {
        self.resolve(opts)?.resources_list(opts, cursor).await
    }

    async fn resources_read(&self, opts: &CallOptions, uri: &str) -> ClientResult<Value> {
        self.resolve(opts)?.resources_read(opts, uri).await
    }

    /// The manager owns the process; nothing to release here.
    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StdioConfig;

    fn adapter() -> SessionScopedStdioClient {
        SessionScopedStdioClient::new(Arc::new(StdioSessionManager::new(StdioConfig::new(
            "unused",
        ))))
    }

    #[tokio::test]
    async fn test_requires_session() {
        let client = adapter();
        let err = client.tools_list(&CallOptions::new(), None).await.unwrap_err();
        assert!(matches!(err, ClientError::NotInitialized(_)));
        assert!(client.manager().is_empty());
    }

    #[tokio::test]
    async fn test_failed_initialize_leaves_no_session() {
        let client = SessionScopedStdioClient::new(Arc::new(StdioSessionManager::new(
            StdioConfig::default(),
        )));
        let err = client.initialize(&CallOptions::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
        assert!(client.current_session_id().is_none());
        assert!(client.manager().is_empty());
    }

    #[tokio::test]
    async fn test_failed_initialize_keeps_existing_session() {
        let client = SessionScopedStdioClient::new(Arc::new(StdioSessionManager::new(
            StdioConfig::default(),
        )));
        let existing = client.manager().get_or_create("live");

        let opts = CallOptions::new().with_session("live");
        let err = client.initialize(&opts).await.unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));

        let still_there = client.manager().try_get("live").unwrap();
        assert!(Arc::ptr_eq(&existing, &still_there));
        assert!(client.current_session_id().is_none());
    }

    #[tokio::test]
    async fn test_close_keeps_managed_session() {
        let client = adapter();
        client.manager().get_or_create("keep");
        *client.session_id.write() = Some("keep".to_string());

        client.close().await;
        assert!(client.manager().try_get("keep").is_some());
    }
}
