//! Child process configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use mcplink_core::{ClientError, ClientResult, HandshakeConfig};

/// Default bound on lines read while looking for a response.
pub const DEFAULT_MAX_READ_ATTEMPTS: usize = 10;

/// Default wait for a graceful exit before the child is killed.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default maximum line length accepted from the child (10MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Configuration for a stdio MCP server process
#[derive(Debug, Clone)]
pub struct StdioConfig {
    /// Executable to spawn
    pub command: String,

    /// Arguments to pass to the command
    pub args: Vec<String>,

    /// Extra environment variables for the child
    pub env: HashMap<String, String>,

    /// Working directory for the child
    pub working_dir: Option<PathBuf>,

    /// Wait for a graceful exit after stdin is closed
    pub shutdown_timeout: Duration,

    /// Lines read per call before giving up on a response
    pub max_read_attempts: usize,

    /// Per-request read timeout (none by default)
    pub request_timeout: Option<Duration>,

    /// Maximum line length accepted from the child
    pub max_message_size: usize,

    /// `initialize` parameters
    pub handshake: HandshakeConfig,
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            max_read_attempts: DEFAULT_MAX_READ_ATTEMPTS,
            request_timeout: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            handshake: HandshakeConfig::default(),
        }
    }
}

impl StdioConfig {
    /// Config for `command` with default limits.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Set the argument list.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the graceful shutdown wait.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the per-request read timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the read attempt bound.
    #[must_use]
    pub fn with_max_read_attempts(mut self, attempts: usize) -> Self {
        self.max_read_attempts = attempts;
        self
    }

    /// Fails with a configuration error when no executable is set.
    pub fn validate(&self) -> ClientResult<()> {
        if self.command.trim().is_empty() {
            return Err(ClientError::Configuration(
                "Stdio executable path is not configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Read attempt bound, at least one.
    pub(crate) fn read_attempts(&self) -> usize {
        self.max_read_attempts.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StdioConfig::default();
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.max_read_attempts, 10);
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            StdioConfig::default().validate(),
            Err(ClientError::Configuration(_))
        ));
        assert!(matches!(
            StdioConfig::new("   ").validate(),
            Err(ClientError::Configuration(_))
        ));
        assert!(StdioConfig::new("mcp-server").validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_reads_once() {
        let config = StdioConfig::new("x").with_max_read_attempts(0);
        assert_eq!(config.read_attempts(), 1);
    }
}
