//! Wiring of configuration, store, writer and runner for one invocation.

use std::fs;
use std::io;
use std::path::Path;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use tracing::info;

use warehouse_infra::{GeneratorConfig, ReportWriter, SqliteInventoryStore};
use warehouse_inventory::WindowCatalog;

use crate::runner::{ReportRunner, RunSummary};

/// Create `path` (and parents) and apply `mode` to it when given.
pub fn ensure_dir(path: &Path, mode: Option<u32>) -> io::Result<()> {
    fs::create_dir_all(path)?;
    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    Ok(())
}

/// Generate the selected windows against the configured store.
pub async fn generate(
    config: &GeneratorConfig,
    catalog: &WindowCatalog,
    selection: &[String],
    today: NaiveDate,
) -> anyhow::Result<RunSummary> {
    info!(
        mode = ?config.mode,
        database = %config.db_path.display(),
        reports = %config.reports_dir.display(),
        "starting report generation"
    );

    ensure_dir(&config.reports_dir, config.dir_mode()).with_context(|| {
        format!("cannot create reports directory {}", config.reports_dir.display())
    })?;

    let store = SqliteInventoryStore::open(config)
        .await
        .context("opening inventory database")?;
    let writer = ReportWriter::new(&config.reports_dir, config.report_prefix.as_str())
        .with_file_mode(config.file_mode());
    let runner = ReportRunner::new(store, writer, catalog.clone());

    let result = runner.run(selection, today, Utc::now()).await;
    runner.source().close().await;
    Ok(result?)
}
