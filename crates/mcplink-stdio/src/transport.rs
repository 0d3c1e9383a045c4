//! Stdio MCP client
//!
//! Requests and responses are matched by position, not by id: one line out,
//! the next JSON line back. Every exchange therefore holds the connection lock
//! from the write until its response has been read, so calls on one client
//! are strictly serialized.

use std::future::Future;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex as TokioMutex, MutexGuard};
use tracing::{debug, info, warn};

use mcplink_core::protocol::{self, methods};
use mcplink_core::{
    CallOptions, ClientError, ClientResult, JsonRpcRequest, McpClient, TransportKind,
};

use crate::config::StdioConfig;
use crate::process::{ShutdownOutcome, StdioProcess};

/// A live process plus responses owed by abandoned calls
#[derive(Debug)]
struct Connection {
    process: StdioProcess,
    stale_responses: usize,
}

impl Connection {
    fn new(process: StdioProcess) -> Self {
        Self {
            process,
            stale_responses: 0,
        }
    }
}

/// JSON-RPC client over a child process's stdin/stdout
///
/// The process is started lazily: on `initialize`, or on the first other
/// operation, which then performs the handshake itself before its own request.
#[derive(Debug)]
pub struct StdioMcpClient {
    config: StdioConfig,

    /// Held across write + read (tokio::sync::Mutex - crosses await boundaries)
    connection: TokioMutex<Option<Connection>>,

    /// Local session id; never renamed by the server
    session_id: RwLock<Option<String>>,

    /// Session id was chosen by the owner and is kept across `initialize`
    keyed: bool,

    /// Request id counter, starting at 1
    next_id: AtomicI64,

    /// Processes spawned over this client's lifetime
    spawns: AtomicUsize,

    last_used: Mutex<Instant>,
}

impl StdioMcpClient {
    /// Client that spawns `config.command` on first use.
    pub fn new(config: StdioConfig) -> Self {
        Self {
            config,
            connection: TokioMutex::new(None),
            session_id: RwLock::new(None),
            keyed: false,
            next_id: AtomicI64::new(1),
            spawns: AtomicUsize::new(0),
            last_used: Mutex::new(Instant::now()),
        }
    }

    /// Client bound to a session id chosen by its owner.
    pub fn with_session_id(config: StdioConfig, session_id: impl Into<String>) -> Self {
        let mut client = Self::new(config);
        *client.session_id.get_mut() = Some(session_id.into());
        client.keyed = true;
        client
    }

    /// Client over already-connected streams: `reader` carries the server's
    /// output, `writer` its input.
    pub fn from_raw<R, W>(config: StdioConfig, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + 'static,
        W: AsyncWrite + Send + 'static,
    {
        let mut client = Self::new(config);
        *client.connection.get_mut() = Some(Connection::new(StdioProcess::from_raw(reader, writer)));
        client
    }

    /// Configuration this client spawns with.
    pub fn config(&self) -> &StdioConfig {
        &self.config
    }

    /// Number of processes this client has spawned.
    pub fn spawn_count(&self) -> usize {
        self.spawns.load(Ordering::Relaxed)
    }

    /// OS process id of the running server, if any.
    pub async fn process_id(&self) -> Option<u32> {
        self.connection
            .lock()
            .await
            .as_ref()
            .and_then(|c| c.process.id())
    }

    /// Time since the last operation started.
    pub fn idle_for(&self) -> Duration {
        self.last_used.lock().elapsed()
    }

    /// Whether an operation currently holds the connection.
    pub fn is_busy(&self) -> bool {
        self.connection.try_lock().is_err()
    }

    /// Stop the server process: close stdin, wait, then kill.
    ///
    /// Waits for any in-flight call to finish first. Never fails.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        let connection = self.connection.lock().await.take();
        let outcome = match connection {
            Some(conn) => conn.process.shutdown(self.config.shutdown_timeout).await,
            None => ShutdownOutcome::NotRunning,
        };
        debug!("Stdio client shut down: {:?}", outcome);
        outcome
    }

    fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }

    async fn lock_connection(
        &self,
        method: &str,
        opts: &CallOptions,
    ) -> ClientResult<MutexGuard<'_, Option<Connection>>> {
        tokio::select! {
            biased;
            _ = opts.cancel.cancelled() => Err(ClientError::Cancelled { operation: method.to_string() }),
            guard = self.connection.lock() => Ok(guard),
        }
    }

    /// Run `fut` under the caller's cancellation and the configured request
    /// timeout. The outer `Err` means the call was abandoned.
    async fn bounded<T>(
        &self,
        method: &str,
        opts: &CallOptions,
        fut: impl Future<Output = ClientResult<T>>,
    ) -> Result<ClientResult<T>, ClientError> {
        let timed = async {
            match self.config.request_timeout {
                Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                    ClientError::Timeout {
                        operation: method.to_string(),
                        timeout: limit,
                    }
                }),
                None => Ok(fut.await),
            }
        };

        tokio::select! {
            biased;
            _ = opts.cancel.cancelled() => Err(ClientError::Cancelled { operation: method.to_string() }),
            result = timed => result,
        }
    }

    /// One request line out, one response envelope back.
    async fn round_trip(
        &self,
        conn: &mut Connection,
        method: &str,
        params: Value,
        opts: &CallOptions,
    ) -> ClientResult<Value> {
        let attempts = self.config.read_attempts();

        // Responses to abandoned calls arrive first; drop them.
        while conn.stale_responses > 0 {
            let discarded = self
                .bounded(method, opts, conn.process.read_response(attempts))
                .await??;
            conn.stale_responses -= 1;
            debug!("Discarded stale response with id {:?}", discarded.id);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(method, Some(params), id);
        let line = serde_json::to_string(&request)
            .map_err(|e| ClientError::Serialization(e.to_string()))?;

        debug!("Sending {} request {}: {}", method, id, line);
        conn.process.send_line(&line).await?;

        // Once the request is written, any failure to read its response
        // leaves that response owed on stdout.
        let response = match self
            .bounded(method, opts, conn.process.read_response(attempts))
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) | Err(e) => {
                conn.stale_responses += 1;
                warn!("{}; its response will be discarded", e);
                return Err(e);
            }
        };

        debug!("Received response for {} request {}", method, id);
        response.into_result().inspect_err(|e| {
            if let ClientError::Protocol { code, message, .. } = e {
                warn!("MCP JSON-RPC error {}: {}", code, message);
            }
        })
    }

    /// Serialized exchange with lazy start.
    async fn call(&self, method: &str, params: Value, opts: &CallOptions) -> ClientResult<Value> {
        let mut guard = self.lock_connection(method, opts).await?;
        self.touch();

        let needs_start = guard.as_mut().is_none_or(|c| !c.process.is_running());
        if needs_start {
            if let Some(dead) = guard.take() {
                warn!("MCP server process is no longer running, restarting");
                dead.process.shutdown(self.config.shutdown_timeout).await;
            }

            let mut conn = Connection::new(StdioProcess::spawn(&self.config)?);
            self.spawns.fetch_add(1, Ordering::Relaxed);

            if !protocol::is_initialize(method) {
                info!("Performing handshake before first {} request", method);
                let params = self.config.handshake.initialize_params();
                self.round_trip(&mut conn, methods::INITIALIZE, params, opts)
                    .await?;
                self.ensure_session_id();
            }
            *guard = Some(conn);
        }

        let conn = guard
            .as_mut()
            .ok_or_else(|| ClientError::transport("MCP server process is not running"))?;
        self.round_trip(conn, method, params, opts).await
    }

    /// Fresh id for a standalone client; a manager-keyed id is kept.
    fn renew_session_id(&self) -> String {
        if self.keyed {
            return self.ensure_session_id();
        }
        let id = protocol::new_session_id();
        info!("Generating new session ID: {}", id);
        *self.session_id.write() = Some(id.clone());
        id
    }

    fn ensure_session_id(&self) -> String {
        let mut session = self.session_id.write();
        match session.as_ref() {
            Some(id) => id.clone(),
            None => {
                let id = protocol::new_session_id();
                info!("Generating new session ID: {}", id);
                *session = Some(id.clone());
                id
            }
        }
    }
}

#[async_trait]
impl McpClient for StdioMcpClient {
    fn transport_kind(&self) -> TransportKind {
        TransportKind::Stdio
    }

    fn current_session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    async fn initialize(&self, opts: &CallOptions) -> ClientResult<Value> {
        self.config.validate()?;
        let result = self
            .call(
                methods::INITIALIZE,
                self.config.handshake.initialize_params(),
                opts,
            )
            .await?;
        let session_id = self.renew_session_id();
        info!("Stdio session initialized with ID: {}", session_id);
        Ok(result)
    }

    async fn tools_list(&self, opts: &CallOptions, cursor: Option<&str>) -> ClientResult<Value> {
        self.call(methods::TOOLS_LIST, protocol::list_params(cursor), opts)
            .await
    }

    async fn tools_call(
        &self,
        opts: &CallOptions,
        name: &str,
        arguments: Option<Value>,
    ) -> ClientResult<Value> {
        self.call(
            methods::TOOLS_CALL,
            protocol::tools_call_params(name, arguments),
            opts,
        )
        .await
    }

    async fn resources_list(
        &self,
        opts: &CallOptions,
        cursor: Option<&str>,
    ) -> ClientResult<Value> {
        self.call(methods::RESOURCES_LIST, protocol::list_params(cursor), opts)
            .await
    }

    async fn resources_read(&self, opts: &CallOptions, uri: &str) -> ClientResult<Value> {
        self.call(
            methods::RESOURCES_READ,
            protocol::resources_read_params(uri),
            opts,
        )
        .await
    }

    async fn close(&self) {
        self.shutdown().await;
    }
}
