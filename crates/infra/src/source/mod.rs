//! Read side of the inventory store.
//!
//! [`InventorySource`] is the seam the report runner works against. The
//! production implementation is [`SqliteInventoryStore`]; tests substitute
//! in-memory fakes.
//!
//! ## Error Mapping
//!
//! | SQLx error                               | StoreError |
//! |------------------------------------------|------------|
//! | Database, primary code 5 or 6, "locked"  | `Locked`   |
//! | Database (other)                         | `Query`    |
//! | ColumnDecode / Decode / ColumnNotFound   | `Decode`   |
//! | PoolTimedOut / PoolClosed / Io           | `Connect`  |
//! | Other                                    | `Query`    |

pub mod query;
pub mod schema;
mod sqlite;

use std::collections::HashMap;

use thiserror::Error;

use warehouse_core::ProductKey;
use warehouse_inventory::{CurrentLevel, DateWindow, ReportRow};

pub use sqlite::SqliteInventoryStore;

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("cannot open inventory database: {0}")]
    Connect(String),

    #[error("inventory database is locked: {0}")]
    Locked(String),

    #[error("inventory query failed: {0}")]
    Query(String),

    #[error("unexpected value in inventory row: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                // SQLite reports extended codes; the primary code is the low byte.
                let primary = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                if matches!(primary, Some(SQLITE_BUSY | SQLITE_LOCKED))
                    || message.to_ascii_lowercase().contains("locked")
                {
                    StoreError::Locked(message)
                } else {
                    StoreError::Query(message)
                }
            }
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_) => StoreError::Decode(err.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Connect(err.to_string())
            }
            other => StoreError::Query(other.to_string()),
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, StoreError::Locked(_))
    }
}

/// Read-only access to inventory readings and product metadata.
#[async_trait::async_trait]
pub trait InventorySource: Send + Sync {
    /// Cheap query proving the store is reachable; returns the fact-table row count.
    async fn probe(&self) -> Result<u64, StoreError>;

    /// Readings within `window` joined to their metadata, ordered by brand,
    /// product name, product key and check date.
    async fn window_rows(&self, window: &DateWindow) -> Result<Vec<ReportRow>, StoreError>;

    /// Latest reading over the whole history for each key. Keys without any
    /// reading are missing from the result.
    async fn current_levels(
        &self,
        keys: &[ProductKey],
    ) -> Result<HashMap<ProductKey, CurrentLevel>, StoreError>;
}
