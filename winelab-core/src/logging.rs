//! Explicit logging context.
//!
//! The context is built once at process start and owns everything the log
//! output needs: a stdout layer, a plain-text file layer behind a
//! non-blocking writer, and the writer's flush guard. Work runs inside
//! [`LogContext::in_scope`], which installs the subscriber as the scoped
//! default instead of a process-wide global, and [`LogContext::shutdown`]
//! flushes and closes the file.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub log_dir: PathBuf,
    pub file_name: String,
    /// Filter directive used when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Write to stdout in addition to the file.
    pub stdout: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            file_name: "logging.log".to_string(),
            default_filter: "info".to_string(),
            stdout: true,
        }
    }
}

/// Logging context with an explicit lifecycle.
pub struct LogContext {
    dispatch: Dispatch,
    guard: Option<WorkerGuard>,
    log_file: PathBuf,
}

impl LogContext {
    pub fn init(settings: &LogSettings) -> Result<Self, LoggingError> {
        fs::create_dir_all(&settings.log_dir).map_err(|source| LoggingError::CreateDir {
            path: settings.log_dir.clone(),
            source,
        })?;

        let filter = || {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.default_filter))
        };

        let appender = tracing_appender::rolling::never(&settings.log_dir, &settings.file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(filter());

        let stdout_layer = settings.stdout.then(|| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(false)
                .with_filter(filter())
        });

        let subscriber = tracing_subscriber::registry()
            .with(file_layer)
            .with(stdout_layer);

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            guard: Some(guard),
            log_file: settings.log_dir.join(&settings.file_name),
        })
    }

    /// Run `f` with this context as the active subscriber.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Flush buffered records and close the log file.
    pub fn shutdown(mut self) {
        self.guard.take();
    }
}
