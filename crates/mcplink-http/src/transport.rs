//! Streamable HTTP client
//!
//! Every operation is one POST of a JSON-RPC envelope to the resolved endpoint:
//! - Accept header negotiation (application/json, text/event-stream)
//! - SSE-framed responses unwrapped to their first named event
//! - Session tracking with `Mcp-Session-Id`, never sent on `initialize`
//!
//! Session state lives on the instance. One client is meant to serve one logical
//! caller; sharing an instance across callers that address different sessions
//! lets one call's session id overwrite another's mid-flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client as HttpClient, StatusCode, header};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use mcplink_core::protocol::{self, methods};
use mcplink_core::{
    CallOptions, ClientError, ClientResult, HandshakeConfig, McpClient, RequestId, SESSION_HEADER,
    TransportKind, jsonrpc,
};

use crate::sse;

const ACCEPT_BOTH: &str = "application/json, text/event-stream";

/// HTTP client configuration
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    /// Statically configured endpoint (full URL); per-call overrides take precedence
    pub endpoint: Option<String>,

    /// Request timeout for the pooled client
    pub timeout: Duration,

    /// User agent string (set to None to disable User-Agent header)
    pub user_agent: Option<String>,

    /// Extra headers added to every request
    pub headers: HashMap<String, String>,

    /// `initialize` parameters
    pub handshake: HandshakeConfig,

    /// Reported transport kind (`HttpStreaming` or `Sse`)
    pub kind: TransportKind,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: Duration::from_secs(60),
            user_agent: Some(format!("mcplink/{}", env!("CARGO_PKG_VERSION"))),
            headers: HashMap::new(),
            handshake: HandshakeConfig::default(),
            kind: TransportKind::HttpStreaming,
        }
    }
}

impl HttpClientConfig {
    /// Config targeting `endpoint`
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Default::default()
        }
    }

    /// Build the pooled `reqwest` client this config describes.
    pub fn build_http_client(&self) -> ClientResult<HttpClient> {
        let mut builder = HttpClient::builder().timeout(self.timeout);
        if let Some(ref user_agent) = self.user_agent {
            builder = builder.user_agent(user_agent);
        }
        builder
            .build()
            .map_err(|e| ClientError::Configuration(format!("Failed to build HTTP client: {e}")))
    }
}

/// JSON-RPC client over streamable HTTP
pub struct HttpMcpClient {
    config: HttpClientConfig,
    http_client: HttpClient,

    /// Session id: minted on initialize, replaced by server-assigned or caller-supplied ids
    session_id: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for HttpMcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMcpClient")
            .field("endpoint", &self.config.endpoint)
            .field("kind", &self.config.kind)
            .field("session_id", &*self.session_id.read())
            .finish()
    }
}

impl HttpMcpClient {
    /// Create a client with its own connection pool.
    pub fn new(config: HttpClientConfig) -> ClientResult<Self> {
        let http_client = config.build_http_client()?;
        Ok(Self::with_http_client(config, http_client))
    }

    /// Create a client on a shared connection pool.
    ///
    /// `reqwest::Client` is a handle to a pool; cloning it is cheap and every
    /// clone reuses the same connections.
    pub fn with_http_client(config: HttpClientConfig, http_client: HttpClient) -> Self {
        Self {
            config,
            http_client,
            session_id: Arc::new(RwLock::new(None)),
        }
    }

    /// Current session id, if one is known.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Bind the client to a caller-supplied session. Empty ids are ignored.
    pub fn set_session_id(&self, session_id: &str) {
        if session_id.is_empty() {
            return;
        }
        debug!("Session ID set to: {}", session_id);
        *self.session_id.write() = Some(session_id.to_string());
    }

    /// Per-call override, then the configured endpoint.
    fn resolve_endpoint(&self, opts: &CallOptions) -> ClientResult<String> {
        let endpoint = opts
            .endpoint_override()
            .or(self.config.endpoint.as_deref().filter(|e| !e.trim().is_empty()))
            .ok_or_else(|| {
                ClientError::Configuration("MCP HTTP endpoint is not configured".to_string())
            })?;

        url::Url::parse(endpoint).map_err(|e| {
            ClientError::Configuration(format!("Invalid MCP HTTP endpoint '{endpoint}': {e}"))
        })?;

        Ok(endpoint.to_string())
    }

    fn build_headers(&self, method: &str) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static(ACCEPT_BOTH));
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        // The handshake never carries a session id; everything after it does.
        if !protocol::is_initialize(method)
            && let Some(session_id) = self.session_id.read().as_ref()
            && let Ok(value) = header::HeaderValue::from_str(session_id)
        {
            headers.insert(SESSION_HEADER, value);
        }

        for (key, value) in &self.config.headers {
            if let (Ok(k), Ok(v)) = (
                header::HeaderName::from_bytes(key.as_bytes()),
                header::HeaderValue::from_str(value),
            ) {
                headers.insert(k, v);
            }
        }

        headers
    }

    fn adopt_session_header(&self, headers: &header::HeaderMap) {
        if let Some(server_session) = headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
        {
            let mut current = self.session_id.write();
            if current.as_deref() != Some(server_session) {
                info!("Server provided session ID: {}", server_session);
                *current = Some(server_session.to_string());
            }
        }
    }

    /// POST one envelope and unwrap its result.
    async fn send(&self, method: &str, params: Value, opts: &CallOptions) -> ClientResult<Value> {
        let endpoint = self.resolve_endpoint(opts)?;
        let id = RequestId::String(Uuid::new_v4().simple().to_string());
        let body = jsonrpc::encode(method, Some(params), id)?;

        debug!(
            "Sending {} to {}: {}",
            method,
            endpoint,
            String::from_utf8_lossy(&body)
        );

        let request = self
            .http_client
            .post(&endpoint)
            .headers(self.build_headers(method))
            .body(body)
            .send();

        let response = tokio::select! {
            biased;
            _ = opts.cancel.cancelled() => {
                return Err(ClientError::Cancelled { operation: method.to_string() });
            }
            result = request => result.map_err(|e| {
                ClientError::transport(format!("HTTP request to {endpoint} failed: {e}"))
            })?,
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Any response may carry the session header, error statuses included.
        self.adopt_session_header(response.headers());

        let text = tokio::select! {
            biased;
            _ = opts.cancel.cancelled() => {
                return Err(ClientError::Cancelled { operation: method.to_string() });
            }
            result = response.text() => result.map_err(|e| {
                ClientError::transport(format!("Failed to read HTTP response body: {e}"))
            })?,
        };

        if !status.is_success() {
            warn!("MCP HTTP non-success status {}: {}", status.as_u16(), text);
            return Err(ClientError::http_status(status.as_u16(), text));
        }

        if status == StatusCode::ACCEPTED && text.trim().is_empty() {
            debug!("Received HTTP 202 Accepted (no response body)");
            return Ok(Value::Null);
        }

        let payload = if sse::is_event_stream(content_type.as_deref(), &text) {
            sse::extract_first_event_data(&text).unwrap_or(text)
        } else {
            text
        };

        let envelope = jsonrpc::decode_str(&payload)
            .inspect_err(|_| error!("Failed to deserialize JSON-RPC response: {}", payload))?;

        envelope.into_result().inspect_err(|e| {
            if let ClientError::Protocol { code, message, .. } = e {
                warn!("MCP JSON-RPC error {}: {}", code, message);
            }
        })
    }

    fn bind_session(&self, opts: &CallOptions) {
        if let Some(session_id) = opts.session() {
            self.set_session_id(session_id);
        }
    }
}

#[async_trait]
impl McpClient for HttpMcpClient {
    fn transport_kind(&self) -> TransportKind {
        self.config.kind
    }

    fn current_session_id(&self) -> Option<String> {
        self.session_id()
    }

    async fn initialize(&self, opts: &CallOptions) -> ClientResult<Value> {
        // The id is ours until the server says otherwise.
        let session_id = protocol::new_session_id();
        info!("Generating new session ID: {}", session_id);
        *self.session_id.write() = Some(session_id);

        let result = self
            .send(
                methods::INITIALIZE,
                self.config.handshake.initialize_params(),
                opts,
            )
            .await?;

        info!(
            "Session initialized with ID: {}",
            self.session_id().unwrap_or_default()
        );
        Ok(result)
    }

    async fn tools_list(&self, opts: &CallOptions, cursor: Option<&str>) -> ClientResult<Value> {
        self.bind_session(opts);
        self.send(methods::TOOLS_LIST, protocol::list_params(cursor), opts)
            .await
    }

    async fn tools_call(
        &self,
        opts: &CallOptions,
        name: &str,
        arguments: Option<Value>,
    ) -> ClientResult<Value> {
        self.bind_session(opts);
        self.send(
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
        self.bind_session(opts);
        self.send(methods::RESOURCES_LIST, protocol::list_params(cursor), opts)
            .await
    }

    async fn resources_read(&self, opts: &CallOptions, uri: &str) -> ClientResult<Value> {
        self.bind_session(opts);
        self.send(
            methods::RESOURCES_READ,
            protocol::resources_read_params(uri),
            opts,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client(endpoint: Option<&str>) -> HttpMcpClient {
        HttpMcpClient::new(HttpClientConfig {
            endpoint: endpoint.map(str::to_string),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = HttpClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.kind, TransportKind::HttpStreaming);
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn test_override_wins_over_configured_endpoint() {
        let client = client(Some("http://configured.local/mcp"));
        let opts = CallOptions::new().with_endpoint("http://override.local/mcp");
        assert_eq!(
            client.resolve_endpoint(&opts).unwrap(),
            "http://override.local/mcp"
        );
        assert_eq!(
            client.resolve_endpoint(&CallOptions::new()).unwrap(),
            "http://configured.local/mcp"
        );
    }

    #[test]
    fn test_missing_endpoint_is_configuration_error() {
        let client = client(None);
        assert!(matches!(
            client.resolve_endpoint(&CallOptions::new()),
            Err(ClientError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_endpoint_is_configuration_error() {
        let client = client(Some("not a url"));
        assert!(matches!(
            client.resolve_endpoint(&CallOptions::new()),
            Err(ClientError::Configuration(_))
        ));
    }

    #[test]
    fn test_session_header_skipped_for_initialize() {
        let client = client(Some("http://localhost/mcp"));
        client.set_session_id("abc123");

        let init = client.build_headers("initialize");
        assert!(init.get(SESSION_HEADER).is_none());
        assert_eq!(init.get(header::ACCEPT).unwrap(), ACCEPT_BOTH);

        let list = client.build_headers("tools/list");
        assert_eq!(list.get(SESSION_HEADER).unwrap(), "abc123");
    }

    #[test]
    fn test_empty_session_is_ignored() {
        let client = client(Some("http://localhost/mcp"));
        client.set_session_id("");
        assert_eq!(client.session_id(), None);
        assert!(client.build_headers("tools/list").get(SESSION_HEADER).is_none());
    }

    #[test]
    fn test_adopts_server_session_header() {
        let client = client(Some("http://localhost/mcp"));
        client.set_session_id("local");
        let mut headers = header::HeaderMap::new();
        headers.insert(SESSION_HEADER, header::HeaderValue::from_static("server-1"));
        client.adopt_session_header(&headers);
        assert_eq!(client.current_session_id().as_deref(), Some("server-1"));
    }
}
