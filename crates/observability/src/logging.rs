//! Run-scoped logging: human-readable console output plus a JSON log file.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Log file written inside the configured log directory.
pub const LOG_FILE_NAME: &str = "warehouse_generator.log";

#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Logging for one report-generation run.
///
/// Holds the subscriber guard; events emitted on this thread go to the console
/// and the log file until the context is dropped.
#[derive(Debug)]
pub struct LoggingContext {
    log_file: PathBuf,
    _guard: DefaultGuard,
}

impl LoggingContext {
    /// Install logging for the current thread.
    ///
    /// The filter comes from `RUST_LOG` and defaults to `info`.
    pub fn init(log_dir: &Path) -> Result<Self, LogError> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        Self::with_filter(log_dir, filter)
    }

    pub fn with_filter(log_dir: &Path, filter: EnvFilter) -> Result<Self, LogError> {
        fs::create_dir_all(log_dir).map_err(|source| LogError::CreateDir {
            path: log_dir.to_path_buf(),
            source,
        })?;

        let log_file = log_dir.join(LOG_FILE_NAME);
        let file: File = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .map_err(|source| LogError::OpenFile {
                path: log_file.clone(),
                source,
            })?;

        // Console: timestamp, level, message. File: JSON lines with the same fields.
        let console = fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(fmt::time::SystemTime)
            .with_target(false);
        let json_file = fmt::layer()
            .json()
            .with_writer(Arc::new(file))
            .with_timer(fmt::time::SystemTime)
            .with_ansi(false)
            .with_target(false);

        let subscriber = Registry::default().with(filter).with(console).with(json_file);
        let guard = tracing::subscriber::set_default(subscriber);

        Ok(Self {
            log_file,
            _guard: guard,
        })
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }
}
