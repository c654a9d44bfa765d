//! SQLite-backed inventory source.
//!
//! The database is opened read-only with a single pooled connection. Another
//! process may be writing to it; a lock that outlasts the busy timeout fails
//! the current query and is not retried within the run.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, instrument, warn};

use warehouse_core::ProductKey;
use warehouse_inventory::{
    CurrentLevel, DateWindow, InventoryReading, ProductImage, ProductMetadata, ReportRow,
};

use super::query::{quote_identifier, BuiltQuery, QueryBuilder, MAX_KEYS_PER_QUERY};
use super::schema::{FieldCandidates, LogicalField, SchemaResolver};
use super::{InventorySource, StoreError};
use crate::config::{GeneratorConfig, ImageConfig, TableConfig};

#[derive(Debug, Clone)]
pub struct SqliteInventoryStore {
    pool: SqlitePool,
    queries: QueryBuilder,
    fact_table: String,
}

impl SqliteInventoryStore {
    /// Open the configured database and resolve the metadata schema.
    pub async fn open(config: &GeneratorConfig) -> Result<Self, StoreError> {
        if !config.db_path.is_file() {
            return Err(StoreError::Connect(format!(
                "{} does not exist",
                config.db_path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.db_path)
            .read_only(true)
            .create_if_missing(false)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(config.busy_timeout)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connect(format!("{}: {e}", config.db_path.display())))?;

        info!(path = %config.db_path.display(), "opened inventory database (read-only)");

        Self::from_pool(
            pool,
            config.tables.clone(),
            config.images.clone(),
            &config.candidates,
        )
        .await
    }

    /// Build a store over an existing pool.
    pub async fn from_pool(
        pool: SqlitePool,
        tables: TableConfig,
        images: ImageConfig,
        candidates: &FieldCandidates,
    ) -> Result<Self, StoreError> {
        let mut resolver = SchemaResolver::new(pool.clone());
        let schema = resolver
            .resolve_all(&tables.metadata_table, candidates)
            .await?;

        let absent: Vec<&str> = schema.absent().into_iter().map(LogicalField::alias).collect();
        if !absent.is_empty() {
            info!(
                table = %tables.metadata_table,
                ?absent,
                "metadata fields without a matching column will be null"
            );
        }

        let fact_table = tables.fact_table.clone();
        Ok(Self {
            pool,
            queries: QueryBuilder::new(tables, images, schema),
            fact_table,
        })
    }

    pub fn queries(&self) -> &QueryBuilder {
        &self.queries
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn fetch(&self, operation: &'static str, built: &BuiltQuery) -> Result<Vec<SqliteRow>, StoreError> {
        let mut query = sqlx::query(&built.sql);
        for param in &built.params {
            query = query.bind(param.as_str());
        }
        query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.failed(operation, e))
    }

    fn failed(&self, operation: &'static str, err: sqlx::Error) -> StoreError {
        let err = StoreError::from_sqlx(err);
        if err.is_locked() {
            warn!(
                operation,
                error = %err,
                "database stayed locked past the busy timeout; another process is writing, the next scheduled run will pick up"
            );
        }
        err
    }
}

#[async_trait]
impl InventorySource for SqliteInventoryStore {
    async fn probe(&self) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(&self.fact_table));
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.failed("probe", e))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    #[instrument(skip(self, window), fields(window = %window.name, start = %window.start, end = %window.end))]
    async fn window_rows(&self, window: &DateWindow) -> Result<Vec<ReportRow>, StoreError> {
        let built = self.queries.build(window);
        let rows = self.fetch("window_rows", &built).await?;
        debug!(rows = rows.len(), "fetched windowed readings");
        rows.iter().map(decode_report_row).collect()
    }

    async fn current_levels(
        &self,
        keys: &[ProductKey],
    ) -> Result<HashMap<ProductKey, CurrentLevel>, StoreError> {
        let mut levels = HashMap::with_capacity(keys.len());
        for chunk in keys.chunks(MAX_KEYS_PER_QUERY) {
            let built = self.queries.current_levels_query(chunk);
            for row in self.fetch("current_levels", &built).await? {
                let reading = decode_reading(&row)?;
                levels.insert(
                    reading.product_key,
                    CurrentLevel {
                        check_date: reading.check_date,
                        quantity: reading.quantity_available,
                    },
                );
            }
        }
        debug!(requested = keys.len(), found = levels.len(), "fetched current levels");
        Ok(levels)
    }
}

fn get<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(StoreError::from_sqlx)
}

/// Dates may be stored with a time suffix; only the calendar date is used.
fn parse_check_date(raw: &str) -> Result<NaiveDate, StoreError> {
    let day = raw.trim().get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| StoreError::Decode(format!("check_date `{raw}`: {e}")))
}

fn decode_reading(row: &SqliteRow) -> Result<InventoryReading, StoreError> {
    let key: String = get(row, "product_key")?;
    let raw_date: String = get(row, "check_date")?;
    Ok(InventoryReading {
        product_key: ProductKey::from_stored(key).map_err(|e| StoreError::Decode(e.to_string()))?,
        check_date: parse_check_date(&raw_date)?,
        quantity_available: get(row, "quantity_available")?,
    })
}

fn decode_report_row(row: &SqliteRow) -> Result<ReportRow, StoreError> {
    let has_image: i64 = get(row, "has_image")?;
    Ok(ReportRow {
        reading: decode_reading(row)?,
        metadata: ProductMetadata {
            brand_name: get(row, "brand_name")?,
            product_name: get(row, "product_name")?,
            listing_type: get(row, "listing_type")?,
            retail_price: get(row, "retail_price")?,
            supplier: get(row, "supplier")?,
            broker: get(row, "broker")?,
            external_sku: get(row, "external_sku")?,
            size_ml: get(row, "size_ml")?,
        },
        image: ProductImage {
            has_image: has_image != 0,
            image_path: get(row, "image_path")?,
            image_url: get(row, "image_url")?,
        },
    })
}
