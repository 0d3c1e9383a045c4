//! MCP method names, the session header, and request parameter builders.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Header carrying the session identifier on HTTP exchanges.
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Default protocol version announced on `initialize`.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-06-18";

/// Method names used by the client.
pub mod methods {
    /// Session handshake
    pub const INITIALIZE: &str = "initialize";
    /// Tool listing
    pub const TOOLS_LIST: &str = "tools/list";
    /// Tool invocation
    pub const TOOLS_CALL: &str = "tools/call";
    /// Resource listing
    pub const RESOURCES_LIST: &str = "resources/list";
    /// Resource read
    pub const RESOURCES_READ: &str = "resources/read";
}

/// Client identity sent on `initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientInfo {
    /// Client name
    pub name: String,
    /// Client version
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "mcplink".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Fixed handshake parameters for the `initialize` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Protocol version to announce
    pub protocol_version: String,
    /// Client identity
    pub client_info: ClientInfo,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            client_info: ClientInfo::default(),
        }
    }
}

impl HandshakeConfig {
    /// `initialize` params: protocol version, client info, empty capabilities.
    pub fn initialize_params(&self) -> Value {
        json!({
            "protocolVersion": self.protocol_version,
            "clientInfo": {
                "name": self.client_info.name,
                "version": self.client_info.version,
            },
            "capabilities": {},
        })
    }
}

/// `tools/list` and `resources/list` params; the cursor is omitted when absent.
pub fn list_params(cursor: Option<&str>) -> Value {
    let mut params = Map::new();
    if let Some(cursor) = cursor {
        params.insert("cursor".into(), Value::String(cursor.to_string()));
    }
    Value::Object(params)
}

/// `tools/call` params.
pub fn tools_call_params(name: &str, arguments: Option<Value>) -> Value {
    let mut params = Map::new();
    params.insert("name".into(), Value::String(name.to_string()));
    if let Some(arguments) = arguments {
        params.insert("arguments".into(), arguments);
    }
    Value::Object(params)
}

/// `resources/read` params.
pub fn resources_read_params(uri: &str) -> Value {
    json!({ "uri": uri })
}

/// Mint a fresh session identifier (32 lowercase hex digits).
pub fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Whether `method` is the session handshake.
pub fn is_initialize(method: &str) -> bool {
    method.eq_ignore_ascii_case(methods::INITIALIZE)
}
