//! # mcplink
//!
//! One request/response contract for MCP servers, whichever way they are reached:
//!
//! - **Streamable HTTP / SSE** via [`mcplink_http::HttpMcpClient`]
//! - **stdio child processes** via [`mcplink_stdio::SessionScopedStdioClient`] over a
//!   shared [`mcplink_stdio::StdioSessionManager`]
//!
//! This crate adds host glue: [`McpConfig`] loading, a [`ClientFactory`] that picks the
//! transport, and [`LoggingConfig::init`].
//!
//! ```rust,no_run
//! use mcplink::{ClientFactory, McpConfig};
//! use mcplink_core::{CallOptions, McpClient};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = McpConfig::from_file("mcplink.toml")?;
//! let _guard = config.logging.init()?;
//!
//! let factory = ClientFactory::new(config)?;
//! let client = factory.create()?;
//! client.initialize(&CallOptions::new()).await?;
//!
//! let opts = CallOptions::new();
//! let tools = client.tools_list(&opts, None).await?;
//! println!("{tools}");
//!
//! factory.shutdown().await;
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

pub mod cli;
pub mod config;
mod factory;
mod logging;

pub use config::{ConfigError, LoggingConfig, McpConfig};
pub use factory::ClientFactory;
pub use logging::LoggingGuard;

pub use mcplink_core::{
    CallOptions, CancellationToken, ClientError, ClientResult, McpClient, TransportKind,
};
