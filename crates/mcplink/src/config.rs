//! Host configuration
//!
//! Loaded from a TOML / YAML / JSON file and overlaid with `MCPLINK_`
//! environment variables (`__` separates nested keys, e.g.
//! `MCPLINK_STDIO__COMMAND=/usr/local/bin/my-server`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mcplink_core::protocol::DEFAULT_PROTOCOL_VERSION;
use mcplink_core::{ClientInfo, HandshakeConfig, TransportKind};
use mcplink_http::HttpClientConfig;
use mcplink_stdio::StdioConfig;
use serde::{Deserialize, Deserializer, Serialize};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "MCPLINK";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// Transport used by [`ClientFactory::create`](crate::ClientFactory::create)
    #[serde(deserialize_with = "deserialize_transport")]
    pub transport: TransportKind,

    /// Streamable HTTP settings
    pub http: HttpSettings,

    /// SSE endpoint settings
    pub sse: SseSettings,

    /// Child process settings
    pub stdio: StdioSettings,

    /// Identity sent on `initialize`
    pub client_info: ClientInfo,

    /// Protocol version sent on `initialize`
    pub protocol_version: String,

    /// Logging output
    pub logging: LoggingConfig,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            http: HttpSettings::default(),
            sse: SseSettings::default(),
            stdio: StdioSettings::default(),
            client_info: ClientInfo::default(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

/// `[http]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Endpoint URL
    pub endpoint: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User-Agent header; the crate default when unset
    pub user_agent: Option<String>,
    /// Extra headers sent on every request
    pub headers: HashMap<String, String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 60,
            user_agent: None,
            headers: HashMap::new(),
        }
    }
}

/// `[sse]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SseSettings {
    /// Endpoint URL; falls back to `http.endpoint`
    pub endpoint: Option<String>,
}

/// `[stdio]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StdioSettings {
    /// Executable path
    pub command: Option<String>,
    /// Arguments
    pub args: Vec<String>,
    /// Extra environment variables
    pub env: HashMap<String, String>,
    /// Working directory
    pub working_dir: Option<PathBuf>,
    /// Graceful shutdown wait in milliseconds
    pub shutdown_timeout_ms: u64,
    /// Lines read per call before giving up
    pub max_read_attempts: usize,
    /// Per-request read timeout in seconds
    pub request_timeout_secs: Option<u64>,
    /// Sessions idle longer than this are shut down
    pub idle_timeout_secs: Option<u64>,
}

impl Default for StdioSettings {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
            shutdown_timeout_ms: mcplink_stdio::DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64,
            max_read_attempts: mcplink_stdio::DEFAULT_MAX_READ_ATTEMPTS,
            request_timeout_secs: None,
            idle_timeout_secs: None,
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// JSON output
    pub structured: bool,
    /// Directory for daily rolling log files; stderr only when unset
    pub directory: Option<PathBuf>,
    /// Log file name prefix
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            structured: false,
            directory: None,
            file_prefix: "mcplink".to_string(),
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),
}

fn deserialize_transport<'de, D>(deserializer: D) -> Result<TransportKind, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl McpConfig {
    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// The format is picked from the extension. `MCPLINK_` environment
    /// variables override file settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist
    /// - The file format is unsupported
    /// - The file contains invalid configuration
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(env_source())
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Defaults overlaid with `MCPLINK_` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment value does not fit its field.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = config::Config::builder().add_source(env_source()).build()?;
        Ok(config.try_deserialize()?)
    }

    /// `initialize` parameters.
    pub fn handshake(&self) -> HandshakeConfig {
        HandshakeConfig {
            protocol_version: self.protocol_version.clone(),
            client_info: self.client_info.clone(),
        }
    }

    /// HTTP client settings for `kind`; SSE uses its own endpoint when set.
    pub fn http_client_config(&self, kind: TransportKind) -> HttpClientConfig {
        let endpoint = match kind {
            TransportKind::Sse => self.sse.endpoint.clone().or_else(|| self.http.endpoint.clone()),
            _ => self.http.endpoint.clone(),
        };

        let mut config = HttpClientConfig {
            endpoint,
            timeout: Duration::from_secs(self.http.timeout_secs),
            headers: self.http.headers.clone(),
            handshake: self.handshake(),
            kind,
            ..Default::default()
        };
        if let Some(ref user_agent) = self.http.user_agent {
            config.user_agent = Some(user_agent.clone());
        }
        config
    }

    /// Child process settings.
    pub fn stdio_config(&self) -> StdioConfig {
        StdioConfig {
            command: self.stdio.command.clone().unwrap_or_default(),
            args: self.stdio.args.clone(),
            env: self.stdio.env.clone(),
            working_dir: self.stdio.working_dir.clone(),
            shutdown_timeout: Duration::from_millis(self.stdio.shutdown_timeout_ms),
            max_read_attempts: self.stdio.max_read_attempts,
            request_timeout: self.stdio.request_timeout_secs.map(Duration::from_secs),
            handshake: self.handshake(),
            ..Default::default()
        }
    }

    /// Idle eviction threshold for stdio sessions.
    pub fn stdio_idle_timeout(&self) -> Option<Duration> {
        self.stdio.idle_timeout_secs.map(Duration::from_secs)
    }
}
