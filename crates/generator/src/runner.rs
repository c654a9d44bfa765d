//! One batch run: probe the store, generate each selected window, then
//! rewrite the report index.
//!
//! Windows are independent. A window that fails is logged and recorded in
//! the index while the remaining windows still run; only a failed
//! connectivity probe (or an invalid selection) aborts the run as a whole.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};

use warehouse_core::{DomainError, ProductKey, RunId};
use warehouse_infra::{
    FailurePolicy, InventorySource, ReportIndex, ReportWriter, StoreError, WindowOutcome,
    WriteError,
};
use warehouse_inventory::{aggregate, DateWindow, Report, WindowCatalog};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// What a run did, window by window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: RunId,
    pub succeeded: Vec<String>,
    /// Window name and the error that failed it.
    pub failed: Vec<(String, String)>,
    pub index_written: bool,
}

impl RunSummary {
    pub fn is_failure(&self, policy: FailurePolicy) -> bool {
        policy.is_failure(self.succeeded.len(), self.failed.len())
    }
}

pub struct ReportRunner<S> {
    source: S,
    writer: ReportWriter,
    catalog: WindowCatalog,
}

impl<S: InventorySource> ReportRunner<S> {
    pub fn new(source: S, writer: ReportWriter, catalog: WindowCatalog) -> Self {
        Self {
            source,
            writer,
            catalog,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Generate `selection` (every configured window when empty).
    ///
    /// `today` fixes the window bounds; `now` stamps every file of the run.
    pub async fn run(
        &self,
        selection: &[String],
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<RunSummary, RunError> {
        let windows = self.catalog.select(selection, today)?;
        let run_id = RunId::new();
        let span = info_span!("run", %run_id, %today);

        self.run_windows(run_id, windows, today, now)
            .instrument(span)
            .await
    }

    async fn run_windows(
        &self,
        run_id: RunId,
        windows: Vec<DateWindow>,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<RunSummary, RunError> {
        let rows = self.source.probe().await?;
        info!(rows, windows = windows.len(), "inventory store reachable; generating reports");

        let mut summary = RunSummary {
            run_id,
            succeeded: Vec::new(),
            failed: Vec::new(),
            index_written: false,
        };
        let mut available = BTreeMap::new();
        let mut outcomes = BTreeMap::new();

        for window in &windows {
            let span = info_span!("window", window = %window.name, start = %window.start, end = %window.end);
            match self.run_window(window, now).instrument(span).await {
                Ok(report) => {
                    summary.succeeded.push(window.name.clone());
                    outcomes.insert(window.name.clone(), WindowOutcome::succeeded());
                    available.insert(window.name.clone(), report.meta);
                }
                Err(err) => {
                    error!(window = %window.name, error = %err, "window failed; continuing with remaining windows");
                    summary.failed.push((window.name.clone(), err.to_string()));
                    outcomes.insert(window.name.clone(), WindowOutcome::failed(err.to_string()));
                }
            }
        }

        // Anything not regenerated this run is listed from what is already on disk.
        for name in self.catalog.windows(today).into_keys() {
            outcomes
                .entry(name.clone())
                .or_insert_with(WindowOutcome::not_requested);
            if !available.contains_key(&name) {
                if let Some(meta) = self.writer.read_metadata(&name) {
                    available.insert(name, meta);
                }
            }
        }

        let index = ReportIndex {
            generated_at: now,
            run_id,
            available_reports: available,
            outcomes,
        };
        match self.writer.write_index(&index) {
            Ok(_) => summary.index_written = true,
            Err(err) => error!(error = %err, "failed to write report index"),
        }

        if summary.failed.is_empty() {
            info!(succeeded = summary.succeeded.len(), "run complete");
        } else {
            warn!(
                succeeded = summary.succeeded.len(),
                failed = summary.failed.len(),
                "run complete with failed windows"
            );
        }
        Ok(summary)
    }

    async fn run_window(&self, window: &DateWindow, now: DateTime<Utc>) -> Result<Report, RunError> {
        let started = Instant::now();

        let rows = self.source.window_rows(window).await?;
        if rows.is_empty() {
            warn!("no inventory readings in window; writing an empty report");
            let report = Report::empty(window, self.writer.report_filename(&window.name), now);
            self.writer.write_report(&report)?;
            return Ok(report);
        }

        let mut keys: Vec<ProductKey> = rows.iter().map(|r| r.reading.product_key.clone()).collect();
        keys.sort();
        keys.dedup();

        let levels = self.source.current_levels(&keys).await?;

        let readings = rows.len();
        let products = aggregate(rows, &levels);
        let report = Report::new(window, products, self.writer.report_filename(&window.name), now);
        self.writer.write_report(&report)?;

        info!(
            readings,
            products = report.products.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "window generated"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::fs;
    use std::path::Path;

    use warehouse_infra::WindowStatus;
    use warehouse_inventory::{
        CurrentLevel, InventoryReading, ProductImage, ProductMetadata, ReportMeta, ReportRow,
    };

    #[derive(Default)]
    struct FakeSource {
        rows: Vec<ReportRow>,
        levels: HashMap<ProductKey, CurrentLevel>,
        failing_windows: HashSet<String>,
        probe_fails: bool,
    }

    #[async_trait::async_trait]
    impl InventorySource for FakeSource {
        async fn probe(&self) -> Result<u64, StoreError> {
            if self.probe_fails {
                return Err(StoreError::Connect("unreachable".into()));
            }
            Ok(self.rows.len() as u64)
        }

        async fn window_rows(&self, window: &DateWindow) -> Result<Vec<ReportRow>, StoreError> {
            if self.failing_windows.contains(&window.name) {
                return Err(StoreError::Locked("database is locked".into()));
            }
            Ok(self
                .rows
                .iter()
                .filter(|r| window.contains(r.reading.check_date))
                .cloned()
                .collect())
        }

        async fn current_levels(
            &self,
            keys: &[ProductKey],
        ) -> Result<HashMap<ProductKey, CurrentLevel>, StoreError> {
            assert!(!keys.is_empty(), "current levels requested for no keys");
            Ok(keys
                .iter()
                .filter_map(|k| self.levels.get(k).map(|l| (k.clone(), *l)))
                .collect())
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
    }

    fn row(key: &str, day: u32, quantity: i64) -> ReportRow {
        ReportRow {
            reading: InventoryReading {
                product_key: key.parse().unwrap(),
                check_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
                quantity_available: quantity,
            },
            metadata: ProductMetadata {
                brand_name: Some("Weller".into()),
                size_ml: Some(750.0),
                ..ProductMetadata::default()
            },
            image: ProductImage::default(),
        }
    }

    fn source() -> FakeSource {
        FakeSource {
            rows: vec![row("1", 1, 10), row("1", 10, 50), row("1", 15, 5), row("1", 20, 5)],
            levels: HashMap::from([(
                "1".parse().unwrap(),
                CurrentLevel {
                    check_date: NaiveDate::from_ymd_opt(2024, 2, 3).unwrap(),
                    quantity: 42,
                },
            )]),
            ..FakeSource::default()
        }
    }

    fn runner(source: FakeSource, dir: &Path) -> ReportRunner<FakeSource> {
        ReportRunner::new(
            source,
            ReportWriter::new(dir, "warehouse_inventory"),
            WindowCatalog::default(),
        )
    }

    fn read_index(dir: &Path) -> ReportIndex {
        serde_json::from_slice(&fs::read(dir.join("reports_index.json")).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn every_window_is_written_and_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let summary = runner(source(), dir.path())
            .run(&[], today(), Utc::now())
            .await
            .unwrap();

        assert_eq!(
            summary.succeeded,
            vec!["current_month", "last_30_days", "last_90_days", "last_180_days"]
        );
        assert!(summary.failed.is_empty());
        assert!(summary.index_written);
        assert!(!summary.is_failure(FailurePolicy::AnyFailed));

        for window in &summary.succeeded {
            assert!(dir.path().join(format!("warehouse_inventory_{window}.json")).is_file());
            assert!(dir.path().join(format!("{window}_metadata.json")).is_file());
        }

        let index = read_index(dir.path());
        assert_eq!(index.run_id, summary.run_id);
        assert_eq!(index.available_reports.len(), 4);
        assert!(index.outcomes.values().all(|o| o.status == WindowStatus::Succeeded));

        let report: Report = serde_json::from_slice(
            &fs::read(dir.path().join("warehouse_inventory_current_month.json")).unwrap(),
        )
        .unwrap();
        let product = &report.products[0];
        assert_eq!(product.current_inventory, 42);
        assert_eq!(product.peak_inventory, 50);
        assert_eq!(product.low_inventory_date, NaiveDate::from_ymd_opt(2024, 1, 20));
        assert_eq!(product.product_name.as_deref(), Some("Weller (750ml)"));
    }

    #[tokio::test]
    async fn failed_window_is_isolated_and_recorded() {
        let dir = tempfile::tempdir().unwrap();
        runner(source(), dir.path())
            .run(&[], today(), Utc::now())
            .await
            .unwrap();
        let previous: ReportMeta = serde_json::from_slice(
            &fs::read(dir.path().join("last_30_days_metadata.json")).unwrap(),
        )
        .unwrap();

        let failing = FakeSource {
            failing_windows: HashSet::from(["last_30_days".to_string()]),
            ..source()
        };
        let summary = runner(failing, dir.path())
            .run(&[], today(), Utc::now())
            .await
            .unwrap();

        assert_eq!(summary.succeeded.len(), 3);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "last_30_days");
        assert!(!summary.is_failure(FailurePolicy::AllFailed));
        assert!(summary.is_failure(FailurePolicy::AnyFailed));

        let index = read_index(dir.path());
        let outcome = &index.outcomes["last_30_days"];
        assert_eq!(outcome.status, WindowStatus::Failed);
        assert!(outcome.error.as_deref().unwrap().contains("locked"));
        assert_eq!(index.available_reports["last_30_days"], previous);
    }

    #[tokio::test]
    async fn all_windows_failing_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let failing = FakeSource {
            failing_windows: WindowCatalog::default().names().into_iter().collect(),
            ..source()
        };
        let summary = runner(failing, dir.path())
            .run(&[], today(), Utc::now())
            .await
            .unwrap();

        assert!(summary.succeeded.is_empty());
        assert!(summary.is_failure(FailurePolicy::AllFailed));
        assert!(read_index(dir.path()).available_reports.is_empty());
    }

    #[tokio::test]
    async fn selection_marks_other_windows_not_requested() {
        let dir = tempfile::tempdir().unwrap();
        let summary = runner(source(), dir.path())
            .run(&["last_90_days".to_string()], today(), Utc::now())
            .await
            .unwrap();

        assert_eq!(summary.succeeded, vec!["last_90_days"]);
        let index = read_index(dir.path());
        assert_eq!(index.outcomes["last_90_days"].status, WindowStatus::Succeeded);
        assert_eq!(index.outcomes["current_month"].status, WindowStatus::NotRequested);
        assert_eq!(index.outcomes.len(), 4);
        assert_eq!(
            index.available_reports.keys().collect::<Vec<_>>(),
            vec!["last_90_days"]
        );
    }

    #[tokio::test]
    async fn failed_probe_aborts_before_any_window() {
        let dir = tempfile::tempdir().unwrap();
        let unreachable = FakeSource {
            probe_fails: true,
            ..source()
        };
        let err = runner(unreachable, dir.path())
            .run(&[], today(), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Store(StoreError::Connect(_))));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unknown_selection_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = runner(source(), dir.path())
            .run(&["yesterday".to_string()], today(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Domain(DomainError::UnknownWindow { .. })));
    }

    #[tokio::test]
    async fn window_without_readings_yields_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        runner(FakeSource::default(), dir.path())
            .run(&["current_month".to_string()], today(), Utc::now())
            .await
            .unwrap();

        let report: Report = serde_json::from_slice(
            &fs::read(dir.path().join("warehouse_inventory_current_month.json")).unwrap(),
        )
        .unwrap();
        assert!(report.products.is_empty());
        assert_eq!(report.meta.summary.total_products, 0);
    }
}
