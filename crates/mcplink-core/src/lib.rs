//! # mcplink core
//!
//! Foundation types shared by the mcplink transports:
//!
//! - **Codec**: [`JsonRpcRequest`], [`JsonRpcResponse`], [`JsonRpcError`], [`RequestId`],
//!   with [`encode`] / [`decode`] helpers
//! - **Contract**: the [`McpClient`] trait and its [`CallOptions`]
//! - **Errors**: [`ClientError`], [`ClientResult`]
//! - **Protocol**: method names, the session header, parameter builders
//!
//! ```rust
//! use mcplink_core::{decode, encode, RequestId};
//!
//! let request = encode("tools/list", None, 1).unwrap();
//! assert!(request.starts_with(br#"{"jsonrpc":"2.0""#));
//!
//! let response = decode(br#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#).unwrap();
//! assert_eq!(response.id, Some(RequestId::Number(1)));
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

mod client;
mod error;
pub mod jsonrpc;
pub mod protocol;

pub use client::{CallOptions, McpClient, TransportKind};
pub use error::{ClientError, ClientResult};
pub use jsonrpc::{
    JSONRPC_VERSION, JsonRpcError, JsonRpcRequest, JsonRpcResponse, JsonRpcVersion, RequestId,
    decode, decode_str, encode, encode_request,
};
pub use protocol::{ClientInfo, HandshakeConfig, SESSION_HEADER, new_session_id};

// Re-exported so transports and hosts share one cancellation type
pub use tokio_util::sync::CancellationToken;
