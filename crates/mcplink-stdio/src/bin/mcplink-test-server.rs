//! Minimal MCP server speaking newline-delimited JSON-RPC on stdio.
//!
//! Used by the integration tests and for manual smoke testing. Flags inject
//! the misbehaviour the client has to tolerate: slow replies, noise lines on
//! stdout, and refusing to exit when stdin closes.

use std::time::Duration;

use clap::Parser;
use mcplink_core::{JsonRpcError, JsonRpcResponse, RequestId};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "mcplink-test-server", version, about = "Test MCP server over stdio")]
struct Args {
    /// Delay before every response, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Keep running after stdin reaches EOF
    #[arg(long)]
    ignore_stdin_eof: bool,

    /// Non-JSON lines written before every response
    #[arg(long, default_value_t = 0)]
    garbage_lines: usize,

    /// Skip the startup banner
    #[arg(long)]
    no_banner: bool,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut stdout = tokio::io::stdout();
    if !args.no_banner {
        stdout.write_all(b"mcplink-test-server ready\n").await?;
        stdout.flush().await?;
    }
    info!("Test server started (pid {})", std::process::id());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let Some(response) = handle_line(&line) else {
            continue;
        };

        if args.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
        }
        for n in 0..args.garbage_lines {
            stdout
                .write_all(format!("debug: noise line {n}\n").as_bytes())
                .await?;
        }

        let mut text = serde_json::to_string(&response).map_err(std::io::Error::other)?;
        text.push('\n');
        stdout.write_all(text.as_bytes()).await?;
        stdout.flush().await?;
    }

    info!("stdin closed");
    if args.ignore_stdin_eof {
        warn!("Ignoring stdin EOF; waiting to be killed");
        std::future::pending::<()>().await;
    }
    Ok(())
}

/// Response for one request line; `None` for notifications.
fn handle_line(line: &str) -> Option<JsonRpcResponse> {
    let request: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            warn!("Error processing request: {}", e);
            return Some(JsonRpcResponse::failure(
                None,
                JsonRpcError::new(-32700, format!("Parse error: {e}")),
            ));
        }
    };

    let id: Option<RequestId> = serde_json::from_value(request["id"].clone()).ok();
    let method = request["method"].as_str().unwrap_or_default();
    let params = &request["params"];
    info!("Handling {} (id {:?})", method, id);

    let id = id?;

    let outcome = match method {
        "initialize" => Ok(json!({
            "protocolVersion": params["protocolVersion"].as_str().unwrap_or("2025-06-18"),
            "capabilities": {
                "tools": { "listChanged": true },
                "resources": {}
            },
            "serverInfo": {
                "name": "mcplink-test-server",
                "version": env!("CARGO_PKG_VERSION")
            }
        })),
        "tools/list" => Ok(json!({
            "tools": [
                {
                    "name": "echo",
                    "description": "Echo the text argument",
                    "inputSchema": {
                        "type": "object",
                        "properties": { "text": { "type": "string" } }
                    }
                },
                {
                    "name": "pid",
                    "description": "Report the server process id",
                    "inputSchema": { "type": "object" }
                }
            ]
        })),
        "tools/call" => call_tool(params),
        "resources/list" => Ok(json!({
            "resources": [
                {
                    "uri": "test://greeting",
                    "name": "greeting",
                    "mimeType": "text/plain"
                }
            ]
        })),
        "resources/read" => read_resource(params),
        other => Err(JsonRpcError::method_not_found(other)),
    };

    Some(match outcome {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(error) => JsonRpcResponse::failure(Some(id), error),
    })
}

fn call_tool(params: &Value) -> Result<Value, JsonRpcError> {
    let text = match params["name"].as_str() {
        Some("echo") => params["arguments"]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        Some("pid") => std::process::id().to_string(),
        Some(name) => {
            return Err(JsonRpcError::new(-32602, format!("Unknown tool: {name}")));
        }
        None => return Err(JsonRpcError::new(-32602, "Missing tool name")),
    };
    Ok(json!({ "content": [{ "type": "text", "text": text }] }))
}

fn read_resource(params: &Value) -> Result<Value, JsonRpcError> {
    match params["uri"].as_str() {
        Some(uri @ "test://greeting") => Ok(json!({
            "contents": [{
                "uri": uri,
                "mimeType": "text/plain",
                "text": "Hello from mcplink-test-server"
            }]
        })),
        Some(uri) => Err(JsonRpcError::new(-32602, format!("Unknown resource: {uri}"))),
        None => Err(JsonRpcError::new(-32602, "Missing resource uri")),
    }
}
