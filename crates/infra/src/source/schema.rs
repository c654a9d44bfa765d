//! Mapping of logical metadata fields onto whatever columns a deployment has.
//!
//! Column names are compared after normalisation (lowercase, no whitespace,
//! underscores or hyphens), so `"Brand Name"`, `brand_name` and `BrandName`
//! all match. A field with no matching column is absent, which is a valid
//! outcome: the query projects `NULL` for it.

use std::collections::{BTreeMap, HashMap};

use sqlx::SqlitePool;
use tracing::{debug, warn};

use super::StoreError;

/// Metadata fields the report knows about.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalField {
    BrandName,
    ProductName,
    ListingType,
    RetailPrice,
    Supplier,
    Broker,
    ImageReference,
    ExternalSku,
    SizeMl,
}

/// SQL storage class a field is cast to when projected.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Real,
}

impl LogicalField {
    pub const ALL: [LogicalField; 9] = [
        LogicalField::BrandName,
        LogicalField::ProductName,
        LogicalField::ListingType,
        LogicalField::RetailPrice,
        LogicalField::Supplier,
        LogicalField::Broker,
        LogicalField::ImageReference,
        LogicalField::ExternalSku,
        LogicalField::SizeMl,
    ];

    /// Column alias used in the projection.
    pub fn alias(self) -> &'static str {
        match self {
            LogicalField::BrandName => "brand_name",
            LogicalField::ProductName => "product_name",
            LogicalField::ListingType => "listing_type",
            LogicalField::RetailPrice => "retail_price",
            LogicalField::Supplier => "supplier",
            LogicalField::Broker => "broker",
            LogicalField::ImageReference => "image_reference",
            LogicalField::ExternalSku => "external_sku",
            LogicalField::SizeMl => "size_ml",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            LogicalField::RetailPrice | LogicalField::SizeMl => FieldKind::Real,
            _ => FieldKind::Text,
        }
    }
}

/// Candidate column spellings per field, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCandidates(BTreeMap<LogicalField, Vec<String>>);

impl FieldCandidates {
    pub fn get(&self, field: LogicalField) -> &[String] {
        self.0.get(&field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn set(&mut self, field: LogicalField, candidates: impl IntoIterator<Item = impl Into<String>>) {
        self.0
            .insert(field, candidates.into_iter().map(Into::into).collect());
    }
}

impl Default for FieldCandidates {
    fn default() -> Self {
        let table: [(LogicalField, &[&str]); 9] = [
            (LogicalField::BrandName, &["brand_name", "brand", "Brand Name"]),
            (LogicalField::ProductName, &["product_name", "item_name", "Product Name"]),
            (LogicalField::ListingType, &["listing_type", "Listing Type"]),
            (LogicalField::RetailPrice, &["retail_price", "price", "Retail Price"]),
            (LogicalField::Supplier, &["supplier", "supplier_name"]),
            (LogicalField::Broker, &["broker", "broker_name"]),
            (LogicalField::ImageReference, &["image_path", "image_reference", "image"]),
            (LogicalField::ExternalSku, &["external_sku", "sku", "upc"]),
            (LogicalField::SizeMl, &["size_ml", "bottle_size_ml", "size"]),
        ];
        Self(
            table
                .into_iter()
                .map(|(field, names)| (field, names.iter().map(|n| n.to_string()).collect()))
                .collect(),
        )
    }
}

/// Canonical form used to compare column names.
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// First candidate (in priority order) that names one of `columns`.
pub fn match_column<'a>(columns: &'a [String], candidates: &[String]) -> Option<&'a str> {
    candidates.iter().find_map(|candidate| {
        let wanted = normalize(candidate);
        columns
            .iter()
            .find(|column| normalize(column) == wanted)
            .map(String::as_str)
    })
}

/// Actual column (or absence) for every logical field of the metadata table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSchema {
    columns: BTreeMap<LogicalField, String>,
}

impl ResolvedSchema {
    pub fn new(columns: impl IntoIterator<Item = (LogicalField, String)>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
        }
    }

    pub fn column(&self, field: LogicalField) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    pub fn absent(&self) -> Vec<LogicalField> {
        LogicalField::ALL
            .into_iter()
            .filter(|f| !self.columns.contains_key(f))
            .collect()
    }
}

/// Resolves logical fields against live table definitions.
///
/// Column lists are cached per table for the lifetime of the resolver; create
/// one resolver per run so schema changes are picked up by the next run.
#[derive(Debug)]
pub struct SchemaResolver {
    pool: SqlitePool,
    cache: HashMap<String, Vec<String>>,
}

impl SchemaResolver {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            cache: HashMap::new(),
        }
    }

    /// Column names of `table`, in declaration order. Unknown tables yield none.
    pub async fn columns(&mut self, table: &str) -> Result<&[String], StoreError> {
        if !self.cache.contains_key(table) {
            let names: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?1)")
                .bind(table)
                .fetch_all(&self.pool)
                .await
                .map_err(StoreError::from_sqlx)?;
            if names.is_empty() {
                warn!(table, "table has no columns or does not exist");
            }
            self.cache.insert(table.to_string(), names);
        }
        Ok(self.cache.get(table).map(Vec::as_slice).unwrap_or_default())
    }

    pub async fn resolve(
        &mut self,
        table: &str,
        field: LogicalField,
        candidates: &[String],
    ) -> Result<Option<String>, StoreError> {
        let columns = self.columns(table).await?;
        let found = match_column(columns, candidates).map(str::to_string);
        match &found {
            Some(column) => debug!(table, field = field.alias(), column = %column, "resolved metadata column"),
            None => debug!(table, field = field.alias(), ?candidates, "metadata column absent; projecting NULL"),
        }
        Ok(found)
    }

    pub async fn resolve_all(
        &mut self,
        table: &str,
        candidates: &FieldCandidates,
    ) -> Result<ResolvedSchema, StoreError> {
        let mut resolved = Vec::new();
        for field in LogicalField::ALL {
            if let Some(column) = self.resolve(table, field, candidates.get(field)).await? {
                resolved.push((field, column));
            }
        }
        Ok(ResolvedSchema::new(resolved))
    }
}
