//! Logging initialization
//!
//! Logs go to stderr, and optionally to a daily rolling file as well. Nothing
//! is ever written to stdout: for stdio servers that is the protocol channel,
//! and the `mcplink` binary prints results there.
//!
//! ```rust,no_run
//! use mcplink::LoggingConfig;
//!
//! // Stderr only - no guard returned
//! LoggingConfig::default().init()?;
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Guard that flushes file logs on drop
///
/// Hold it for the lifetime of the program when file logging is enabled.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

impl LoggingConfig {
    /// Install the global subscriber.
    ///
    /// `RUST_LOG` wins over the configured level. Returns a guard when a log
    /// directory is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the log directory cannot be created or a global
    /// subscriber is already installed.
    pub fn init(&self) -> io::Result<Option<LoggingGuard>> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.directory {
            None => {
                init_stderr(self, filter)?;
                Ok(None)
            }
            Some(ref dir) => init_stderr_and_file(self, dir, filter).map(Some),
        }
    }

    /// Same config at a different level.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

fn init_stderr(config: &LoggingConfig, filter: EnvFilter) -> io::Result<()> {
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.structured {
        subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    } else {
        subscriber
            .with(fmt::layer().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

fn init_stderr_and_file(
    config: &LoggingConfig,
    dir: &Path,
    filter: EnvFilter,
) -> io::Result<LoggingGuard> {
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.structured {
        subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .with(fmt::layer().json().with_ansi(false).with_writer(file_writer))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))?;
    } else {
        subscriber
            .with(fmt::layer().with_writer(io::stderr))
            .with(fmt::layer().with_ansi(false).with_writer(file_writer))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))?;
    }

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // The only test in this binary that installs a global subscriber.
    #[test]
    fn test_file_logging_returns_guard() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let config = LoggingConfig {
            directory: Some(log_dir.clone()),
            ..Default::default()
        };

        let guard = config.init().unwrap();
        assert!(guard.is_some());
        assert!(log_dir.is_dir());

        // A second subscriber cannot be installed
        assert!(LoggingConfig::default().init().is_err());
    }
}
