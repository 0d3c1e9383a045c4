//! Session registry for stdio clients
//!
//! Maps a session id to the [`StdioMcpClient`] that owns its server process.
//! The manager exclusively owns every client it creates: callers get shared
//! handles and never shut entries down themselves.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use mcplink_core::CancellationToken;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::StdioConfig;
use crate::transport::StdioMcpClient;

/// Keyed registry of live stdio sessions
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use mcplink_core::{CallOptions, McpClient};
/// use mcplink_stdio::{StdioConfig, StdioSessionManager};
///
/// # tokio_test::block_on(async {
/// let manager = Arc::new(StdioSessionManager::new(StdioConfig::new("my-mcp-server")));
/// let client = manager.get_or_create("session-1");
/// let tools = client.tools_list(&CallOptions::new(), None).await?;
/// println!("{tools}");
/// manager.dispose_all().await;
/// # Ok::<(), mcplink_core::ClientError>(())
/// # }).unwrap();
/// ```
#[derive(Debug)]
pub struct StdioSessionManager {
    config: StdioConfig,
    sessions: DashMap<String, Arc<StdioMcpClient>>,
    created: AtomicUsize,
}

impl StdioSessionManager {
    /// Empty registry; every client it creates spawns `config`.
    pub fn new(config: StdioConfig) -> Self {
        Self {
            config,
            sessions: DashMap::new(),
            created: AtomicUsize::new(0),
        }
    }

    /// Process configuration for new sessions.
    pub fn config(&self) -> &StdioConfig {
        &self.config
    }

    /// Client for `session_id`, creating and registering it on first use.
    ///
    /// Concurrent first use of one id creates exactly one client; every
    /// caller gets the same handle. The process itself starts on the client's
    /// first operation.
    pub fn get_or_create(&self, session_id: &str) -> Arc<StdioMcpClient> {
        self.get_or_create_tracked(session_id).0
    }

    /// Like [`get_or_create`](Self::get_or_create); the flag is `true` when
    /// this call registered the client.
    pub fn get_or_create_tracked(&self, session_id: &str) -> (Arc<StdioMcpClient>, bool) {
        let mut created = false;
        let client = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                created = true;
                self.created.fetch_add(1, Ordering::Relaxed);
                info!("Creating stdio session {}", session_id);
                Arc::new(StdioMcpClient::with_session_id(
                    self.config.clone(),
                    session_id,
                ))
            })
            .clone();
        (client, created)
    }

    /// Client for `session_id`, if registered.
    pub fn try_get(&self, session_id: &str) -> Option<Arc<StdioMcpClient>> {
        self.sessions.get(session_id).map(|entry| entry.clone())
    }

    /// Unregister `session_id` and shut its process down.
    ///
    /// Returns whether the session existed.
    pub async fn remove(&self, session_id: &str) -> bool {
        match self.sessions.remove(session_id) {
            Some((_, client)) => {
                let outcome = client.shutdown().await;
                info!("Removed stdio session {} ({:?})", session_id, outcome);
                true
            }
            None => false,
        }
    }

    /// Unregister `session_id` only while it still maps to `client`, then
    /// shut `client` down.
    ///
    /// Returns whether the entry was removed.
    pub async fn remove_client(&self, session_id: &str, client: &Arc<StdioMcpClient>) -> bool {
        match self
            .sessions
            .remove_if(session_id, |_, current| Arc::ptr_eq(current, client))
        {
            Some((_, removed)) => {
                let outcome = removed.shutdown().await;
                info!("Removed stdio session {} ({:?})", session_id, outcome);
                true
            }
            None => false,
        }
    }

    /// Shut down every session. Used at host shutdown.
    pub async fn dispose_all(&self) {
        let ids = self.session_ids();
        if ids.is_empty() {
            return;
        }
        info!("Disposing {} stdio sessions", ids.len());

        let clients: Vec<_> = ids
            .iter()
            .filter_map(|id| self.sessions.remove(id).map(|(_, client)| client))
            .collect();
        join_all(clients.iter().map(|client| client.shutdown())).await;
    }

    /// Shut down sessions idle for longer than `max_idle`.
    ///
    /// Busy sessions are skipped. Returns the number evicted.
    ///
    /// A handle obtained from [`get_or_create`](Self::get_or_create) before
    /// eviction stays usable: its next operation restarts a process that is
    /// no longer registered, and that process is killed when the last handle
    /// drops. Later lookups of the id create a fresh session.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let candidates: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.idle_for() > max_idle && !entry.is_busy())
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = Vec::new();
        for id in candidates {
            // Re-check under the shard lock: the session may have been used meanwhile.
            if let Some((_, client)) = self
                .sessions
                .remove_if(&id, |_, c| c.idle_for() > max_idle && !c.is_busy())
            {
                info!("Evicting idle stdio session {}", id);
                evicted.push(client);
            }
        }

        join_all(evicted.iter().map(|client| client.shutdown())).await;
        evicted.len()
    }

    /// Run [`evict_idle`](Self::evict_idle) every `interval` until `shutdown` fires.
    pub fn spawn_idle_reaper(
        self: &Arc<Self>,
        interval: Duration,
        max_idle: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = manager.evict_idle(max_idle).await;
                        if evicted > 0 {
                            debug!("Idle reaper evicted {} sessions", evicted);
                        }
                    }
                }
            }
            debug!("Idle reaper stopped");
        })
    }

    /// Registered session ids.
    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Clients created over the manager's lifetime.
    pub fn clients_created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplink_core::McpClient;
    use pretty_assertions::assert_eq;

    fn manager() -> StdioSessionManager {
        StdioSessionManager::new(StdioConfig::new("unused"))
    }

    #[test]
    fn test_get_or_create_returns_same_client() {
        let manager = manager();
        let a = manager.get_or_create("s1");
        let b = manager.get_or_create("s1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.clients_created(), 1);
        assert_eq!(a.current_session_id().as_deref(), Some("s1"));
    }

    #[test]
    fn test_try_get_does_not_create() {
        let manager = manager();
        assert!(manager.try_get("missing").is_none());
        assert!(manager.is_empty());
        manager.get_or_create("present");
        assert!(manager.try_get("present").is_some());
    }

    #[tokio::test]
    async fn test_remove_unregisters() {
        let manager = manager();
        manager.get_or_create("s1");
        assert!(manager.remove("s1").await);
        assert!(!manager.remove("s1").await);
        assert!(manager.try_get("s1").is_none());
    }

    #[test]
    fn test_get_or_create_tracked_reports_creation() {
        let manager = manager();
        let (first, created) = manager.get_or_create_tracked("s1");
        assert!(created);
        let (second, created) = manager.get_or_create_tracked("s1");
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_remove_client_ignores_replaced_entry() {
        let manager = manager();
        let old = manager.get_or_create("s1");
        manager.remove("s1").await;
        let replacement = manager.get_or_create("s1");

        assert!(!manager.remove_client("s1", &old).await);
        assert!(manager.try_get("s1").is_some());
        assert!(manager.remove_client("s1", &replacement).await);
        assert!(manager.try_get("s1").is_none());
    }

    #[tokio::test]
    async fn test_dispose_all_empties_registry() {
        let manager = manager();
        for id in ["a", "b", "c"] {
            manager.get_or_create(id);
        }
        manager.dispose_all().await;
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_evict_idle() {
        let manager = manager();
        manager.get_or_create("old");
        tokio::time::sleep(Duration::from_millis(30)).await;
        manager.get_or_create("new");

        assert_eq!(manager.evict_idle(Duration::from_millis(20)).await, 1);
        assert!(manager.try_get("old").is_none());
        assert!(manager.try_get("new").is_some());
    }

    #[tokio::test]
    async fn test_idle_reaper_stops_on_shutdown() {
        let manager = Arc::new(manager());
        manager.get_or_create("idle");
        let shutdown = CancellationToken::new();
        let reaper = manager.spawn_idle_reaper(
            Duration::from_millis(10),
            Duration::from_millis(5),
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(manager.is_empty());

        shutdown.cancel();
        reaper.await.unwrap();
    }
}
