//! JSON-RPC 2.0 envelope codec.
//!
//! Requests are encoded to a single line of JSON; responses are decoded leniently:
//! a response carrying neither `result` nor `error` decodes to a `null` result,
//! and the identifier keeps whichever JSON kind (string, integer, null) it arrived as.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

/// JSON-RPC version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC version tag (always "2.0")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let version = String::deserialize(deserializer)?;
        if version == JSONRPC_VERSION {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "Invalid JSON-RPC version: expected '{JSONRPC_VERSION}', got '{version}'"
            )))
        }
    }
}

/// Request identifier - can be string or number
///
/// The codec never normalizes one kind into the other: an identifier built from
/// an integer serializes as a JSON number, one built from a string as a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String identifier
    String(String),
    /// Numeric identifier
    Number(i64),
}

impl RequestId {
    /// Returns `true` for string identifiers
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// Returns `true` for numeric identifiers
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Number(_))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for RequestId {
    fn from(n: i32) -> Self {
        Self::Number(i64::from(n))
    }
}

/// JSON-RPC request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version
    pub jsonrpc: JsonRpcVersion,
    /// Request identifier
    pub id: RequestId,
    /// Request method name
    pub method: String,
    /// Request parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>, id: impl Into<RequestId>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i64,
    /// Error message
    #[serde(default)]
    pub message: String,
    /// Additional error data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create a new JSON-RPC error
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Method not found (-32601)
    pub fn method_not_found(method: &str) -> Self {
        Self::new(-32601, format!("Method '{method}' not found"))
    }
}

/// JSON-RPC response envelope
///
/// Well-formed responses populate exactly one of `result` / `error`, but nothing
/// here enforces that; [`JsonRpcResponse::into_result`] decides how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version
    #[serde(default)]
    pub jsonrpc: JsonRpcVersion,
    /// Identifier mirroring the request (`null` for parse errors)
    #[serde(default)]
    pub id: Option<RequestId>,
    /// Result payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Successful response
    pub fn success(id: impl Into<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: Some(id.into()),
            result: Some(result),
            error: None,
        }
    }

    /// Error response
    pub fn failure(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Unwraps the envelope: a non-null `error` becomes [`ClientError::Protocol`],
    /// an absent `result` becomes `Value::Null`.
    pub fn into_result(self) -> ClientResult<Value> {
        if let Some(error) = self.error {
            return Err(ClientError::Protocol {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// Encode a request envelope to bytes (no trailing newline).
pub fn encode(method: &str, params: Option<Value>, id: impl Into<RequestId>) -> ClientResult<Bytes> {
    encode_request(&JsonRpcRequest::new(method, params, id))
}

/// Encode an already-built request envelope.
pub fn encode_request(request: &JsonRpcRequest) -> ClientResult<Bytes> {
    serde_json::to_vec(request)
        .map(Bytes::from)
        .map_err(|e| ClientError::Serialization(e.to_string()))
}

/// Decode a response envelope from raw bytes.
///
/// Malformed JSON yields [`ClientError::Decode`] carrying the offending text.
pub fn decode(bytes: &[u8]) -> ClientResult<JsonRpcResponse> {
    serde_json::from_slice(bytes).map_err(|e| ClientError::Decode {
        message: e.to_string(),
        raw: String::from_utf8_lossy(bytes).into_owned(),
    })
}

/// Decode a response envelope from text.
pub fn decode_str(text: &str) -> ClientResult<JsonRpcResponse> {
    decode(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_encode_request_shape() {
        let bytes = encode("tools/list", Some(json!({})), 7).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list", "params": {}})
        );
    }

    #[test]
    fn test_encode_omits_absent_params() {
        let bytes = encode("ping", None, "abc").unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(!text.contains("params"));
        assert!(text.contains(r#""id":"abc""#));
    }

    #[test]
    fn test_identifier_kind_survives_round_trip() {
        let numeric = decode_str(r#"{"jsonrpc":"2.0","id":42,"result":{}}"#).unwrap();
        assert_eq!(numeric.id, Some(RequestId::Number(42)));
        let reencoded = serde_json::to_value(&numeric).unwrap();
        assert!(reencoded["id"].is_i64());

        let textual = decode_str(r#"{"jsonrpc":"2.0","id":"42","result":{}}"#).unwrap();
        assert_eq!(textual.id, Some(RequestId::String("42".into())));
        let reencoded = serde_json::to_value(&textual).unwrap();
        assert!(reencoded["id"].is_string());

        let null_id = decode_str(r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"Parse error"}}"#)
            .unwrap();
        assert_eq!(null_id.id, None);
        assert!(serde_json::to_value(&null_id).unwrap()["id"].is_null());
    }

    #[test]
    fn test_missing_result_and_error_is_null_result() {
        let response = decode_str(r#"{"jsonrpc":"2.0","id":1}"#).unwrap();
        assert_eq!(response.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn test_error_envelope_becomes_protocol_error() {
        let response =
            decode_str(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"not found"}}"#)
                .unwrap();
        let err = response.into_result().unwrap_err();
        assert_eq!(err.code(), Some(-32601));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_null_error_is_ignored() {
        let response =
            decode_str(r#"{"jsonrpc":"2.0","id":1,"result":{"ok":true},"error":null}"#).unwrap();
        assert_eq!(response.into_result().unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_malformed_json_keeps_raw_text() {
        let err = decode_str("{not json").unwrap_err();
        match err {
            ClientError::Decode { raw, .. } => assert_eq!(raw, "{not json"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_version_is_rejected() {
        assert!(decode_str(r#"{"jsonrpc":"1.0","id":1,"result":null}"#).is_err());
    }

    #[test]
    fn test_request_id_display() {
        assert_eq!(RequestId::from(5).to_string(), "5");
        assert_eq!(RequestId::from("x-1").to_string(), "x-1");
        assert!(RequestId::from(5i64).is_number());
        assert!(RequestId::from(String::from("s")).is_string());
    }
}
