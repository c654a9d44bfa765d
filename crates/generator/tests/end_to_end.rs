//! Full runs against a SQLite file in a temporary directory.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use warehouse_generator::app;
use warehouse_infra::GeneratorConfig;
use warehouse_inventory::WindowCatalog;
use warehouse_observability::LoggingContext;

async fn seed(path: &Path) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    for sql in [
        "CREATE TABLE warehouse_inventory_history_v2 (nc_code TEXT, check_date TEXT, total_available INTEGER)",
        "CREATE TABLE alcohol (nc_code TEXT PRIMARY KEY, brand_name TEXT, product_name TEXT,
             listing_type TEXT, retail_price REAL, supplier TEXT, broker TEXT, size_ml REAL, image_path TEXT)",
        "INSERT INTO alcohol VALUES
             ('P1', 'Weller', NULL, 'Allocation', 29.99, 'Sazerac', 'Southern', 750, 'alcohol_images/weller.jpg'),
             ('P2', 'Eagle Rare', NULL, NULL, 39.99, NULL, NULL, 1750, NULL)",
        "INSERT INTO warehouse_inventory_history_v2 VALUES
             ('P1', '2024-01-01', 10), ('P1', '2024-01-10', 50), ('P1', '2024-01-15', 5),
             ('P1', '2024-01-20', 5), ('P1', '2024-02-03', 42),
             ('P2', '2023-11-20', 3), ('P2', '2024-01-05', 0)",
    ] {
        sqlx::query(sql).execute(&pool).await.unwrap();
    }
    pool.close().await;
}

struct Fixture {
    _root: tempfile::TempDir,
    config: GeneratorConfig,
}

impl Fixture {
    async fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let db = root.path().join("inventory.db");
        seed(&db).await;

        let vars = [
            ("WAREHOUSE_DB_PATH", db),
            ("WAREHOUSE_REPORTS_DIR", root.path().join("reports")),
            ("WAREHOUSE_LOG_DIR", root.path().join("logs")),
        ];
        let config = GeneratorConfig::from_lookup(|var| {
            vars.iter()
                .find(|(name, _)| *name == var)
                .map(|(_, path)| path.to_string_lossy().into_owned())
        })
        .unwrap();

        Self {
            _root: root,
            config,
        }
    }

    fn reports(&self) -> &PathBuf {
        &self.config.reports_dir
    }

    fn read(&self, name: &str) -> Value {
        serde_json::from_slice(&fs::read(self.reports().join(name)).unwrap()).unwrap()
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
}

#[tokio::test]
async fn full_run_writes_every_report_and_the_index() {
    let fx = Fixture::new().await;
    let summary = app::generate(&fx.config, &WindowCatalog::default(), &[], today())
        .await
        .unwrap();
    assert_eq!(summary.succeeded.len(), 4);
    assert!(summary.index_written);

    let files: BTreeSet<String> = fs::read_dir(fx.reports())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    let expected: BTreeSet<String> = [
        "reports_index.json",
        "warehouse_inventory_current_month.json",
        "warehouse_inventory_last_30_days.json",
        "warehouse_inventory_last_90_days.json",
        "warehouse_inventory_last_180_days.json",
        "current_month_metadata.json",
        "last_30_days_metadata.json",
        "last_90_days_metadata.json",
        "last_180_days_metadata.json",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(files, expected);

    let report = fx.read("warehouse_inventory_current_month.json");
    let products = report["products"].as_array().unwrap();
    assert_eq!(products.len(), 2);

    let eagle = &products[0];
    assert_eq!(eagle["plu"], "P2");
    assert_eq!(eagle["product_name"], "Eagle Rare (1.8L)");
    assert_eq!(eagle["current_inventory"], 0);
    assert_eq!(eagle["has_image"], false);

    let weller = &products[1];
    assert_eq!(weller["plu"], "P1");
    assert_eq!(weller["peak_inventory"], 50);
    assert_eq!(weller["peak_inventory_date"], "2024-01-10");
    assert_eq!(weller["low_inventory"], 5);
    assert_eq!(weller["low_inventory_date"], "2024-01-20");
    assert_eq!(weller["current_inventory"], 42);
    assert_eq!(weller["broker"], "Southern");
    assert_eq!(weller["image_url"], "/api/images/weller.jpg");

    let summary = &report["meta"]["summary"];
    assert_eq!(summary["total_products"], 2);
    assert_eq!(summary["products_with_inventory"], 1);
    assert_eq!(summary["total_inventory_units"], 42);
    assert_eq!(summary["listing_type_breakdown"]["Unknown"]["count"], 1);
    assert_eq!(report["meta"]["time_period"]["start"], "2024-01-01");
    assert_eq!(report["meta"]["time_period"]["description"], "January 2024");

    let index = fx.read("reports_index.json");
    assert_eq!(index["available_reports"].as_object().unwrap().len(), 4);
    assert_eq!(
        index["available_reports"]["last_30_days"]["filename"],
        "warehouse_inventory_last_30_days.json"
    );
}

#[tokio::test]
async fn repeated_runs_produce_identical_products() {
    let fx = Fixture::new().await;
    let catalog = WindowCatalog::default();

    app::generate(&fx.config, &catalog, &[], today()).await.unwrap();
    let first: Vec<Value> = catalog
        .names()
        .iter()
        .map(|w| fx.read(&format!("warehouse_inventory_{w}.json"))["products"].clone())
        .collect();

    app::generate(&fx.config, &catalog, &[], today()).await.unwrap();
    let second: Vec<Value> = catalog
        .names()
        .iter()
        .map(|w| fx.read(&format!("warehouse_inventory_{w}.json"))["products"].clone())
        .collect();

    assert_eq!(first, second);
}

#[tokio::test]
async fn trailing_window_reaches_back_before_the_month() {
    let fx = Fixture::new().await;
    app::generate(&fx.config, &WindowCatalog::default(), &["last_90_days".to_string()], today())
        .await
        .unwrap();

    let report = fx.read("warehouse_inventory_last_90_days.json");
    let eagle = report["products"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["plu"] == "P2")
        .unwrap();
    assert_eq!(eagle["peak_inventory"], 3);
    assert_eq!(eagle["peak_inventory_date"], "2023-11-20");
    assert_eq!(eagle["low_inventory"], 0);

    let index = fx.read("reports_index.json");
    assert_eq!(index["outcomes"]["current_month"]["status"], "not_requested");
    assert!(!fx.reports().join("warehouse_inventory_current_month.json").exists());
}

#[tokio::test]
async fn missing_database_aborts_without_reports() {
    let mut fx = Fixture::new().await;
    fx.config.db_path = fx.config.db_path.with_file_name("elsewhere.db");

    let err = app::generate(&fx.config, &WindowCatalog::default(), &[], today())
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("elsewhere.db"));
    assert_eq!(fs::read_dir(fx.reports()).unwrap().count(), 0);
}

#[tokio::test]
async fn run_is_logged_to_the_log_file() {
    let fx = Fixture::new().await;
    app::ensure_dir(&fx.config.log_dir, None).unwrap();
    let logging = LoggingContext::init(&fx.config.log_dir).unwrap();

    app::generate(&fx.config, &WindowCatalog::default(), &["current_month".to_string()], today())
        .await
        .unwrap();

    let log = fs::read_to_string(logging.log_file()).unwrap();
    assert!(log.contains("window generated"));
    assert!(log.contains("report index written"));
}

#[tokio::test]
async fn window_without_readings_is_logged_as_a_warning() {
    let fx = Fixture::new().await;
    app::ensure_dir(&fx.config.log_dir, None).unwrap();
    let logging = LoggingContext::init(&fx.config.log_dir).unwrap();

    let later = NaiveDate::from_ymd_opt(2030, 6, 30).unwrap();
    app::generate(&fx.config, &WindowCatalog::default(), &["current_month".to_string()], later)
        .await
        .unwrap();

    let report = fx.read("warehouse_inventory_current_month.json");
    assert!(report["products"].as_array().unwrap().is_empty());

    let log = fs::read_to_string(logging.log_file()).unwrap();
    let warning = log
        .lines()
        .find(|line| line.contains("no inventory readings in window"))
        .unwrap();
    assert!(warning.contains("WARN"));
}
