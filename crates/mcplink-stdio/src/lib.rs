//! # mcplink stdio
//!
//! MCP over a child process's stdin/stdout: one JSON-RPC envelope per line.
//!
//! - [`StdioProcess`]: spawn, line I/O, noise-tolerant response reads, graceful shutdown
//! - [`StdioMcpClient`]: the [`McpClient`](mcplink_core::McpClient) contract over one process,
//!   strictly one request in flight at a time
//! - [`StdioSessionManager`]: session id → client registry with atomic get-or-create
//!   and idle eviction
//! - [`SessionScopedStdioClient`]: the contract over the registry
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mcplink_core::{CallOptions, McpClient};
//! use mcplink_stdio::{SessionScopedStdioClient, StdioConfig, StdioSessionManager};
//!
//! # async fn run() -> mcplink_core::ClientResult<()> {
//! let manager = Arc::new(StdioSessionManager::new(StdioConfig::new("my-mcp-server")));
//! let client = SessionScopedStdioClient::new(Arc::clone(&manager));
//!
//! client.initialize(&CallOptions::new()).await?;
//! let tools = client.tools_list(&CallOptions::new(), None).await?;
//! println!("{tools}");
//!
//! manager.dispose_all().await;
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

mod config;
mod manager;
mod process;
mod scoped;
mod transport;

pub use config::{
    DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_MAX_READ_ATTEMPTS, DEFAULT_SHUTDOWN_TIMEOUT, StdioConfig,
};
pub use manager::StdioSessionManager;
pub use process::{ShutdownOutcome, StdioProcess};
pub use scoped::SessionScopedStdioClient;
pub use transport::StdioMcpClient;
