//! Report files on disk.
//!
//! Every file is written to a temporary sibling, synced and renamed into
//! place, so readers only ever observe either the previous complete file or
//! the new complete file. A temporary that is never persisted is removed
//! when it is dropped.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use warehouse_core::RunId;
use warehouse_inventory::{Report, ReportMeta};

pub const INDEX_FILE_NAME: &str = "reports_index.json";

/// Permission bits of finished files when no mode is configured.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot move finished file into {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of one window being run, as recorded in the index.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    Succeeded,
    Failed,
    NotRequested,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowOutcome {
    pub status: WindowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WindowOutcome {
    pub fn succeeded() -> Self {
        Self {
            status: WindowStatus::Succeeded,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: WindowStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn not_requested() -> Self {
        Self {
            status: WindowStatus::NotRequested,
            error: None,
        }
    }
}

/// Catalog of the reports currently on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportIndex {
    pub generated_at: DateTime<Utc>,
    pub run_id: RunId,
    /// Metadata of every report on disk, keyed by window name.
    pub available_reports: BTreeMap<String, ReportMeta>,
    /// What happened to each configured window in the run that wrote this index.
    pub outcomes: BTreeMap<String, WindowOutcome>,
}

/// Paths written for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReport {
    pub report_path: PathBuf,
    pub metadata_path: PathBuf,
    pub products: usize,
}

#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
    prefix: String,
    file_mode: Option<u32>,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            file_mode: None,
        }
    }

    /// Permission bits for finished files (unix only), overriding [`DEFAULT_FILE_MODE`].
    pub fn with_file_mode(mut self, mode: Option<u32>) -> Self {
        self.file_mode = mode;
        self
    }

    pub fn report_filename(&self, window: &str) -> String {
        format!("{}_{window}.json", self.prefix)
    }

    pub fn metadata_filename(window: &str) -> String {
        format!("{window}_metadata.json")
    }

    /// Write the full report and its metadata digest.
    ///
    /// Both files are staged before either is renamed, so a failure while
    /// producing the metadata leaves the previous report in place.
    pub fn write_report(&self, report: &Report) -> Result<WrittenReport, WriteError> {
        let window = report.window_name();
        let report_path = self.dir.join(self.report_filename(window));
        let metadata_path = self.dir.join(Self::metadata_filename(window));

        self.write_pair((&report_path, report), (&metadata_path, &report.meta))?;

        info!(
            window,
            products = report.products.len(),
            path = %report_path.display(),
            "report written"
        );

        Ok(WrittenReport {
            report_path,
            metadata_path,
            products: report.products.len(),
        })
    }

    pub fn write_index(&self, index: &ReportIndex) -> Result<PathBuf, WriteError> {
        let path = self.dir.join(INDEX_FILE_NAME);
        self.write_json_atomic(&path, index)?;
        info!(
            reports = index.available_reports.len(),
            path = %path.display(),
            "report index written"
        );
        Ok(path)
    }

    /// Metadata previously written for `window`, if it exists and parses.
    pub fn read_metadata(&self, window: &str) -> Option<ReportMeta> {
        let path = self.dir.join(Self::metadata_filename(window));
        match read_json(&path) {
            Ok(meta) => Some(meta),
            Err(ReadError::Missing) => None,
            Err(ReadError::Invalid(reason)) => {
                warn!(window, path = %path.display(), %reason, "ignoring unreadable report metadata");
                None
            }
        }
    }

    fn write_json_atomic<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<(), WriteError> {
        let staged = self.stage(path, value)?;
        commit(staged, path)
    }

    fn write_pair<A: Serialize + ?Sized, B: Serialize + ?Sized>(
        &self,
        (first_path, first): (&Path, &A),
        (second_path, second): (&Path, &B),
    ) -> Result<(), WriteError> {
        let staged_first = self.stage(first_path, first)?;
        let staged_second = self.stage(second_path, second)?;
        commit(staged_first, first_path)?;
        commit(staged_second, second_path)
    }

    /// Serialize `value` into a synced temporary next to `path`.
    fn stage<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<NamedTempFile, WriteError> {
        let io_err = |source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;

        {
            let mut out = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut out, value).map_err(|source| WriteError::Serialize {
                path: path.to_path_buf(),
                source,
            })?;
            out.write_all(b"\n").map_err(io_err)?;
            out.flush().map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;

        // Temporaries are created owner-only; finished files must be readable by consumers.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = self.file_mode.unwrap_or(DEFAULT_FILE_MODE);
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(mode))
                .map_err(io_err)?;
        }

        Ok(tmp)
    }
}

fn commit(staged: NamedTempFile, path: &Path) -> Result<(), WriteError> {
    staged.persist(path).map_err(|e| WriteError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    debug!(path = %path.display(), "file replaced");
    Ok(())
}

enum ReadError {
    Missing,
    Invalid(String),
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ReadError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ReadError::Missing),
        Err(e) => return Err(ReadError::Invalid(e.to_string())),
    };
    serde_json::from_slice(&bytes).map_err(|e| ReadError::Invalid(e.to_string()))
}
