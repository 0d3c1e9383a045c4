//! # mcplink HTTP
//!
//! Streamable HTTP client for MCP servers. Each operation is a single POST;
//! responses may be plain JSON or an SSE stream, and the session is tracked
//! through the `Mcp-Session-Id` header.
//!
//! ```rust,no_run
//! use mcplink_core::{CallOptions, McpClient};
//! use mcplink_http::{HttpClientConfig, HttpMcpClient};
//!
//! # async fn run() -> mcplink_core::ClientResult<()> {
//! let client = HttpMcpClient::new(HttpClientConfig::with_endpoint("http://localhost:8080/mcp"))?;
//! client.initialize(&CallOptions::new()).await?;
//! let tools = client.tools_list(&CallOptions::new(), None).await?;
//! println!("{tools}");
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

mod sse;
mod transport;

pub use transport::{HttpClientConfig, HttpMcpClient};
