//! The uniform client contract shared by every transport.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, ClientResult};

/// Transport carrying the envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Streamable HTTP (JSON or SSE-framed responses)
    #[default]
    HttpStreaming,
    /// HTTP against a dedicated SSE endpoint
    Sse,
    /// Newline-delimited JSON over a child process's stdio
    Stdio,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpStreaming => write!(f, "http_streaming"),
            Self::Sse => write!(f, "sse"),
            Self::Stdio => write!(f, "stdio"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "httpstreaming" | "http" => Ok(Self::HttpStreaming),
            "sse" => Ok(Self::Sse),
            "stdio" => Ok(Self::Stdio),
            _ => Err(ClientError::Configuration(format!(
                "Transport type '{s}' is not supported"
            ))),
        }
    }
}

/// Per-call options: session identifier, endpoint override, cancellation.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Session to address; overrides the client's remembered session
    pub session_id: Option<String>,
    /// Endpoint to use instead of the configured one (HTTP only)
    pub endpoint: Option<String>,
    /// Cancellation signal for the call
    pub cancel: CancellationToken,
}

impl CallOptions {
    /// Options with no session, no override and a fresh cancellation token
    pub fn new() -> Self {
        Self::default()
    }

    /// Address a session
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Override the endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Attach a cancellation token
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The session id, ignoring empty strings
    pub fn session(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|s| !s.is_empty())
    }

    /// The endpoint override, ignoring blank strings
    pub fn endpoint_override(&self) -> Option<&str> {
        self.endpoint.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// The uniform request/response contract.
///
/// Every operation returns the raw `result` payload of the response envelope,
/// or fails with a [`ClientError`]. Implementations expose the session they are
/// currently bound to through [`McpClient::current_session_id`], so hosts never
/// need to inspect the concrete client type.
#[async_trait]
pub trait McpClient: Send + Sync + fmt::Debug {
    /// Transport this client speaks.
    fn transport_kind(&self) -> TransportKind;

    /// Session the client is currently bound to, if any.
    fn current_session_id(&self) -> Option<String>;

    /// Establish a session. The session id is available from
    /// [`McpClient::current_session_id`] afterwards.
    async fn initialize(&self, opts: &CallOptions) -> ClientResult<Value>;

    /// `tools/list`
    async fn tools_list(&self, opts: &CallOptions, cursor: Option<&str>) -> ClientResult<Value>;

    /// `tools/call`
    async fn tools_call(
        &self,
        opts: &CallOptions,
        name: &str,
        arguments: Option<Value>,
    ) -> ClientResult<Value>;

    /// `resources/list`
    async fn resources_list(&self, opts: &CallOptions, cursor: Option<&str>)
    -> ClientResult<Value>;

    /// `resources/read`
    async fn resources_read(&self, opts: &CallOptions, uri: &str) -> ClientResult<Value>;

    /// Release resources owned by this client. Never fails.
    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_parsing() {
        assert_eq!("HttpStreaming".parse::<TransportKind>().unwrap(), TransportKind::HttpStreaming);
        assert_eq!("http_streaming".parse::<TransportKind>().unwrap(), TransportKind::HttpStreaming);
        assert_eq!("SSE".parse::<TransportKind>().unwrap(), TransportKind::Sse);
        assert_eq!("Stdio".parse::<TransportKind>().unwrap(), TransportKind::Stdio);
        assert!(matches!(
            "websocket".parse::<TransportKind>(),
            Err(ClientError::Configuration(_))
        ));
    }

    #[test]
    fn test_call_options_ignore_empty_values() {
        let opts = CallOptions::new().with_session("").with_endpoint("  ");
        assert_eq!(opts.session(), None);
        assert_eq!(opts.endpoint_override(), None);

        let opts = CallOptions::new()
            .with_session("abc")
            .with_endpoint("http://localhost/mcp");
        assert_eq!(opts.session(), Some("abc"));
        assert_eq!(opts.endpoint_override(), Some("http://localhost/mcp"));
    }

    fn _assert_object_safe(_client: &dyn McpClient) {}
}
