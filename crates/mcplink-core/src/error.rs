//! Client error types.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// A specialized `Result` type for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by every [`McpClient`](crate::McpClient) operation.
///
/// Each call is attempted once; none of these are retried by the client.
/// Variants carry enough context (status, RPC code, raw text) for a caller to
/// build a user-facing message.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ClientError {
    /// Missing or invalid endpoint, executable path, or transport kind.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The transport failed: non-2xx HTTP status, I/O failure, or no usable response line.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the failure
        message: String,
        /// HTTP status, when the failure came from an HTTP exchange
        status: Option<u16>,
        /// Raw response body, when one was received
        body: Option<String>,
    },

    /// A well-formed envelope carried a non-null `error`.
    #[error("MCP error {code}: {message}")]
    Protocol {
        /// JSON-RPC error code
        code: i64,
        /// JSON-RPC error message
        message: String,
        /// Optional structured error data
        data: Option<Value>,
    },

    /// The response was not valid JSON-RPC.
    #[error("Failed to decode JSON-RPC response: {message}")]
    Decode {
        /// Parser diagnostic
        message: String,
        /// Offending raw text
        raw: String,
    },

    /// An operation was attempted on a stdio session adapter before any session exists.
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// A request could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// The caller cancelled the operation.
    #[error("Operation '{operation}' was cancelled")]
    Cancelled {
        /// The JSON-RPC method being executed
        operation: String,
    },

    /// No response arrived within the configured request timeout.
    #[error("Request timed out after {timeout:?} for operation: {operation}")]
    Timeout {
        /// The JSON-RPC method being executed
        operation: String,
        /// The timeout that was exceeded
        timeout: Duration,
    },
}

impl ClientError {
    /// Transport failure without HTTP context.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    /// Transport failure caused by a non-success HTTP status.
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::Transport {
            message: format!("MCP HTTP {status}: {body}"),
            status: Some(status),
            body: Some(body),
        }
    }

    /// JSON-RPC error code, for [`ClientError::Protocol`].
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// HTTP status, for transport failures that came from an HTTP exchange.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns `true` for [`ClientError::Protocol`].
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    /// Returns `true` for [`ClientError::Transport`].
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::transport(format!("IO error: {err}"))
    }
}
