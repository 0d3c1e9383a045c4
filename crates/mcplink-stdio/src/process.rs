//! Child process pipes and lifecycle
//!
//! A [`StdioProcess`] owns one MCP server process (or a pair of raw streams in
//! tests): a line-framed writer on its stdin, a line-framed reader on its
//! stdout, and a background task draining stderr into the log.

use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, error, info, trace, warn};

use mcplink_core::{ClientError, ClientResult, JsonRpcResponse, jsonrpc};

use crate::config::StdioConfig;

type BoxedAsyncRead = Pin<Box<dyn AsyncRead + Send + 'static>>;
type BoxedAsyncWrite = Pin<Box<dyn AsyncWrite + Send + 'static>>;
type StdoutReader = FramedRead<BoxedAsyncRead, LinesCodec>;
type StdinWriter = FramedWrite<BoxedAsyncWrite, LinesCodec>;

/// How a process ended when it was shut down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Nothing was running
    NotRunning,
    /// Exited on its own after stdin was closed
    Graceful,
    /// Killed after the graceful wait elapsed
    Forced,
    /// Shutdown hit an error; it was logged
    Failed,
}

/// Pipes to one MCP server
pub struct StdioProcess {
    child: Option<Child>,
    pid: Option<u32>,
    reader: StdoutReader,
    writer: Option<StdinWriter>,
    stderr_task: Option<JoinHandle<()>>,
    eof: bool,
}

impl std::fmt::Debug for StdioProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioProcess")
            .field("pid", &self.pid)
            .field("has_child", &self.child.is_some())
            .field("writer_open", &self.writer.is_some())
            .field("eof", &self.eof)
            .finish()
    }
}

impl StdioProcess {
    /// Spawn the configured executable with piped stdio.
    ///
    /// Stderr is drained on a background task and logged under the
    /// `mcplink_stdio::stderr` target; it is never parsed.
    pub fn spawn(config: &StdioConfig) -> ClientResult<Self> {
        config.validate()?;

        info!(
            "Starting MCP server process: {} {:?}",
            config.command, config.args
        );

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref wd) = config.working_dir {
            cmd.current_dir(wd);
        }
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            error!("Failed to spawn MCP server process: {}", e);
            ClientError::transport(format!(
                "Failed to spawn process '{}': {e}",
                config.command
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClientError::transport("Failed to get stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClientError::transport("Failed to get stdout handle"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ClientError::transport("Failed to get stderr handle"))?;

        let pid = child.id();
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(target: "mcplink_stdio::stderr", pid = pid.unwrap_or_default(), "{}", line);
            }
            debug!("STDERR reader task completed");
        });

        info!("MCP server process started with pid {:?}", pid);

        let mut process = Self::framed(
            Box::pin(stdout),
            Box::pin(stdin),
            config.max_message_size,
        );
        process.child = Some(child);
        process.pid = pid;
        process.stderr_task = Some(stderr_task);
        Ok(process)
    }

    /// Wrap raw streams: `reader` is what the server writes, `writer` is what it reads.
    pub fn from_raw<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + 'static,
        W: AsyncWrite + Send + 'static,
    {
        Self::framed(
            Box::pin(reader),
            Box::pin(writer),
            crate::config::DEFAULT_MAX_MESSAGE_SIZE,
        )
    }

    fn framed(reader: BoxedAsyncRead, writer: BoxedAsyncWrite, max_message_size: usize) -> Self {
        Self {
            child: None,
            pid: None,
            reader: FramedRead::new(reader, LinesCodec::new_with_max_length(max_message_size)),
            writer: Some(FramedWrite::new(writer, LinesCodec::new())),
            stderr_task: None,
            eof: false,
        }
    }

    /// OS process id, when backed by a child process.
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the server can still be talked to.
    pub fn is_running(&mut self) -> bool {
        if self.eof || self.writer.is_none() {
            return false;
        }
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => true,
        }
    }

    /// Write one newline-terminated line to the server's stdin.
    pub async fn send_line(&mut self, line: &str) -> ClientResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ClientError::transport("Process stdin is closed"))?;

        trace!("Sending line to MCP server: {}", line);
        writer.send(line).await.map_err(|e| {
            error!("Failed to write to process stdin: {}", e);
            ClientError::transport(format!("Failed to write to process stdin: {e}"))
        })
    }

    /// Read lines until one decodes as a response envelope.
    ///
    /// Lines that do not start with `{` are logged and skipped. An empty first
    /// line is fatal; later empty lines are retried. Every line read counts
    /// against `max_attempts`.
    pub async fn read_response(&mut self, max_attempts: usize) -> ClientResult<JsonRpcResponse> {
        let max_attempts = max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let line = match self.reader.next().await {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    return Err(ClientError::transport(format!(
                        "Failed to read from process stdout: {e}"
                    )));
                }
                None => {
                    self.eof = true;
                    return Err(ClientError::transport(
                        "MCP server closed stdout before responding",
                    ));
                }
            };

            let line = line.trim();
            trace!("Received line from MCP server (attempt {}): {}", attempt, line);

            if line.is_empty() {
                if attempt == 1 {
                    return Err(ClientError::transport("Empty response from MCP server"));
                }
                debug!("Empty line on attempt {}, retrying", attempt);
                continue;
            }

            if !line.starts_with('{') {
                warn!(
                    "Skipping non-JSON line from MCP server (attempt {}/{}): {}",
                    attempt, max_attempts, line
                );
                continue;
            }

            match jsonrpc::decode_str(line) {
                Ok(response) => return Ok(response),
                Err(e) if attempt == max_attempts => return Err(e),
                Err(e) => {
                    warn!("Failed to parse line as JSON-RPC (attempt {}): {}", attempt, e);
                }
            }
        }

        Err(ClientError::transport(format!(
            "Failed to receive valid JSON response after {max_attempts} attempts"
        )))
    }

    /// Close stdin, wait up to `grace` for the child to exit, then kill it.
    ///
    /// Never fails: problems are logged and reported through the outcome.
    pub async fn shutdown(mut self, grace: Duration) -> ShutdownOutcome {
        if let Some(mut writer) = self.writer.take()
            && let Err(e) = SinkExt::<&str>::close(&mut writer).await
        {
            debug!("Closing process stdin failed: {}", e);
        }

        let outcome = match self.child.take() {
            None => ShutdownOutcome::NotRunning,
            Some(mut child) => match timeout(grace, child.wait()).await {
                Ok(Ok(status)) => {
                    info!("MCP server process exited with status: {}", status);
                    ShutdownOutcome::Graceful
                }
                Ok(Err(e)) => {
                    error!("Failed to wait for MCP server process exit: {}", e);
                    Self::force_kill(&mut child).await
                }
                Err(_) => {
                    warn!(
                        "MCP server process did not exit within {:?}, forcing kill",
                        grace
                    );
                    Self::force_kill(&mut child).await
                }
            },
        };

        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        outcome
    }

    async fn force_kill(child: &mut Child) -> ShutdownOutcome {
        match child.kill().await {
            Ok(()) => ShutdownOutcome::Forced,
            Err(e) => {
                error!("Failed to force kill MCP server process: {}", e);
                ShutdownOutcome::Failed
            }
        }
    }
}

impl Drop for StdioProcess {
    fn drop(&mut self) {
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}
