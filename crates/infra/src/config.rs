//! Configuration loading and representation.
//!
//! Everything is read from the environment once at startup. `DEV_MODE`
//! chooses between relative development paths and the fixed production
//! layout under `/opt`; it only affects paths and file permissions.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::source::schema::FieldCandidates;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: `{value}` ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeploymentMode {
    Development,
    Production,
}

impl DeploymentMode {
    pub fn is_production(self) -> bool {
        matches!(self, DeploymentMode::Production)
    }
}

/// When a run with failed windows exits non-zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Fail only when no window succeeded; partial failures are warnings.
    AllFailed,
    /// Fail when any requested window failed.
    AnyFailed,
}

impl FailurePolicy {
    pub fn is_failure(self, succeeded: usize, failed: usize) -> bool {
        match self {
            FailurePolicy::AllFailed => succeeded == 0,
            FailurePolicy::AnyFailed => failed > 0 || succeeded == 0,
        }
    }
}

/// Source tables and the fixed columns of the fact table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub fact_table: String,
    pub fact_key: String,
    pub check_date: String,
    pub quantity: String,
    pub metadata_table: String,
    pub metadata_key: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            fact_table: "warehouse_inventory_history_v2".to_string(),
            fact_key: "nc_code".to_string(),
            check_date: "check_date".to_string(),
            quantity: "total_available".to_string(),
            metadata_table: "alcohol".to_string(),
            metadata_key: "nc_code".to_string(),
        }
    }
}

/// How raw image references become API URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    /// Stored value meaning "there is no image".
    pub missing_sentinel: String,
    /// Storage directory prefix stripped from references (forward-slash form).
    pub storage_prefix: String,
    /// Public path images are served under.
    pub api_base: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            missing_sentinel: "no image available".to_string(),
            storage_prefix: "alcohol_images/".to_string(),
            api_base: "/api/images/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub mode: DeploymentMode,
    pub db_path: PathBuf,
    pub reports_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Full reports are written as `<report_prefix>_<window>.json`.
    pub report_prefix: String,
    pub trailing_days: Vec<u32>,
    pub failure_policy: FailurePolicy,
    /// Bounded wait for a locked database before the query fails.
    pub busy_timeout: Duration,
    pub tables: TableConfig,
    pub images: ImageConfig,
    pub candidates: FieldCandidates,
}

impl GeneratorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let dev_mode = match lookup("DEV_MODE") {
            Some(v) => parse_bool("DEV_MODE", &v)?,
            None => true,
        };
        let mode = if dev_mode {
            DeploymentMode::Development
        } else {
            DeploymentMode::Production
        };

        let (db_default, reports_default, log_default) = match mode {
            DeploymentMode::Development => (
                "./BourbonDatabase/inventory.db",
                "./warehouse-reports",
                "./logs",
            ),
            DeploymentMode::Production => (
                "/opt/BourbonDatabase/inventory.db",
                "/opt/warehouse-reports",
                "/opt/logs",
            ),
        };

        let path = |var: &str, default: &str| -> PathBuf {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(default))
        };

        let trailing_days = match lookup("REPORT_TRAILING_DAYS") {
            Some(v) => parse_days("REPORT_TRAILING_DAYS", &v)?,
            None => vec![30, 90, 180],
        };

        let failure_policy = match lookup("REPORT_FAIL_ON_ANY") {
            Some(v) if parse_bool("REPORT_FAIL_ON_ANY", &v)? => FailurePolicy::AnyFailed,
            _ => FailurePolicy::AllFailed,
        };

        Ok(Self {
            mode,
            db_path: path("WAREHOUSE_DB_PATH", db_default),
            reports_dir: path("WAREHOUSE_REPORTS_DIR", reports_default),
            log_dir: path("WAREHOUSE_LOG_DIR", log_default),
            report_prefix: "warehouse_inventory".to_string(),
            trailing_days,
            failure_policy,
            busy_timeout: Duration::from_secs(30),
            tables: TableConfig::default(),
            images: ImageConfig::default(),
            candidates: FieldCandidates::default(),
        })
    }

    /// Permission bits for finished report files (production only).
    pub fn file_mode(&self) -> Option<u32> {
        self.mode.is_production().then_some(0o644)
    }

    /// Permission bits for the output and log directories (production only).
    pub fn dir_mode(&self) -> Option<u32> {
        self.mode.is_production().then_some(0o755)
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_days(var: &'static str, value: &str) -> Result<Vec<u32>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>().map_err(|e| ConfigError::Invalid {
                var,
                value: value.to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}
