//! `mcplink` command-line interface
//!
//! Results are printed to stdout as pretty JSON; logs go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mcplink_core::{CallOptions, CancellationToken, McpClient, TransportKind};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::McpConfig;
use crate::factory::ClientFactory;

/// Main CLI application structure
#[derive(Parser, Debug)]
#[command(
    name = "mcplink",
    version,
    about = "Talk to MCP servers over streamable HTTP, SSE or stdio",
    long_about = "mcplink sends MCP requests to a server and prints the raw result.\n\
                  Transports: streamable HTTP (with SSE framing), SSE endpoints, and\n\
                  child processes over stdio.\n\n\
                  SECURITY WARNING: the stdio transport executes the configured command."
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Connection settings
    #[command(flatten)]
    pub conn: Connection,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Connection settings shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct Connection {
    /// Configuration file (.toml, .yaml, .yml or .json)
    #[arg(long, short = 'c', global = true, env = "MCPLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Transport: http-streaming, sse or stdio
    #[arg(long, short = 't', global = true)]
    pub transport: Option<TransportKind>,

    /// Endpoint URL for the HTTP transports
    #[arg(long, short = 'e', global = true)]
    pub endpoint: Option<String>,

    /// Executable for the stdio transport
    #[arg(long, global = true)]
    pub server_command: Option<String>,

    /// Arguments for the stdio executable
    #[arg(long = "server-arg", global = true, allow_hyphen_values = true)]
    pub server_args: Vec<String>,

    /// Existing session id; skips `initialize`
    #[arg(long, short = 's', global = true)]
    pub session: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a session and print its id and the server's reply
    Connect,

    /// Tool operations
    #[command(subcommand)]
    Tools(ToolCommands),

    /// Resource operations
    #[command(subcommand)]
    Resources(ResourceCommands),
}

/// Tool-related commands
#[derive(Subcommand, Debug)]
pub enum ToolCommands {
    /// List available tools
    List {
        /// Pagination cursor
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Call a tool
    Call {
        /// Tool name
        name: String,

        /// Arguments as JSON object
        #[arg(long, short = 'a')]
        arguments: Option<String>,
    },
}

/// Resource-related commands
#[derive(Subcommand, Debug)]
pub enum ResourceCommands {
    /// List available resources
    List {
        /// Pagination cursor
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Read a resource
    Read {
        /// Resource URI
        uri: String,
    },
}

impl Connection {
    /// Load the configuration and apply command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded.
    pub fn load_config(&self) -> Result<McpConfig> {
        let mut config = match self.config {
            Some(ref path) => McpConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => McpConfig::from_env().context("loading configuration from environment")?,
        };

        if let Some(transport) = self.transport {
            config.transport = transport;
        }
        if let Some(ref endpoint) = self.endpoint {
            match config.transport {
                TransportKind::Sse => config.sse.endpoint = Some(endpoint.clone()),
                _ => config.http.endpoint = Some(endpoint.clone()),
            }
        }
        if let Some(ref command) = self.server_command {
            config.stdio.command = Some(command.clone());
            config.stdio.args = self.server_args.clone();
        }
        Ok(config)
    }
}

/// Parse a `--arguments` value; it must be a JSON object.
fn parse_arguments(raw: Option<&str>) -> Result<Option<Value>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(raw).context("--arguments must be valid JSON")?;
    anyhow::ensure!(value.is_object(), "--arguments must be a JSON object");
    Ok(Some(value))
}

/// Run one command against the configured server.
///
/// # Errors
///
/// Returns an error if configuration, logging setup, or the MCP call fails.
pub async fn run(cli: Cli) -> Result<()> {
    let config = cli.conn.load_config()?;

    let logging = match cli.verbose {
        0 => config.logging.clone(),
        1 => config.logging.clone().with_level("debug"),
        _ => config.logging.clone().with_level("trace"),
    };
    let _guard = logging.init().context("initializing logging")?;

    let factory = ClientFactory::new(config)?;
    let client = factory.create()?;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, cancelling");
                cancel.cancel();
            }
        })
    };

    let result = execute(client.as_ref(), &cli.command, &cli.conn, cancel).await;

    client.close().await;
    factory.shutdown().await;
    ctrl_c.abort();

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn execute(
    client: &dyn McpClient,
    command: &Commands,
    conn: &Connection,
    cancel: CancellationToken,
) -> Result<Value> {
    let opts = CallOptions::new().with_cancel(cancel);

    let result = match command {
        Commands::Connect => {
            let result = client.initialize(&opts).await?;
            json!({
                "sessionId": client.current_session_id(),
                "result": result,
            })
        }
        Commands::Tools(tools) => {
            let opts = open_session(client, conn, opts).await?;
            match tools {
                ToolCommands::List { cursor } => client.tools_list(&opts, cursor.as_deref()).await?,
                ToolCommands::Call { name, arguments } => {
                    let arguments = parse_arguments(arguments.as_deref())?;
                    client.tools_call(&opts, name, arguments).await?
                }
            }
        }
        Commands::Resources(resources) => {
            let opts = open_session(client, conn, opts).await?;
            match resources {
                ResourceCommands::List { cursor } => {
                    client.resources_list(&opts, cursor.as_deref()).await?
                }
                ResourceCommands::Read { uri } => client.resources_read(&opts, uri).await?,
            }
        }
    };
    Ok(result)
}

/// Address `--session` when given, otherwise initialize a fresh one.
async fn open_session(
    client: &dyn McpClient,
    conn: &Connection,
    opts: CallOptions,
) -> Result<CallOptions> {
    if let Some(ref session) = conn.session {
        return Ok(opts.with_session(session.clone()));
    }
    client.initialize(&opts).await?;
    debug!(
        "Initialized session {}",
        client.current_session_id().unwrap_or_default()
    );
    Ok(opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_tools_call() {
        let cli = Cli::try_parse_from([
            "mcplink",
            "--transport",
            "stdio",
            "--server-command",
            "my-server",
            "tools",
            "call",
            "echo",
            "--arguments",
            r#"{"text":"hi"}"#,
        ])
        .unwrap();

        assert_eq!(cli.conn.transport, Some(TransportKind::Stdio));
        match cli.command {
            Commands::Tools(ToolCommands::Call { name, arguments }) => {
                assert_eq!(name, "echo");
                assert_eq!(arguments.as_deref(), Some(r#"{"text":"hi"}"#));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_transport() {
        assert!(Cli::try_parse_from(["mcplink", "--transport", "carrier-pigeon", "connect"]).is_err());
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments(None).unwrap(), None);
        assert_eq!(
            parse_arguments(Some(r#"{"a":1}"#)).unwrap(),
            Some(json!({"a": 1}))
        );
        assert!(parse_arguments(Some("[1,2]")).is_err());
        assert!(parse_arguments(Some("not json")).is_err());
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let conn = Connection {
            transport: Some(TransportKind::Sse),
            endpoint: Some("http://localhost:9000/sse".to_string()),
            ..Default::default()
        };
        let config = conn.load_config().unwrap();
        assert_eq!(config.transport, TransportKind::Sse);
        assert_eq!(config.sse.endpoint.as_deref(), Some("http://localhost:9000/sse"));
    }
}
