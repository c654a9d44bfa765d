//! Row shapes read from the inventory store.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use warehouse_core::ProductKey;

/// One quantity-available observation for a product.
///
/// Readings are append-only in the source store; a null quantity is
/// coalesced to zero when the row is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryReading {
    pub product_key: ProductKey,
    pub check_date: NaiveDate,
    pub quantity_available: i64,
}

/// Product metadata as projected by the windowed query.
///
/// Every field is optional: a deployment may lack any of the columns and the
/// projection then yields `NULL`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadata {
    pub brand_name: Option<String>,
    pub product_name: Option<String>,
    pub listing_type: Option<String>,
    pub retail_price: Option<f64>,
    pub supplier: Option<String>,
    pub broker: Option<String>,
    pub external_sku: Option<String>,
    pub size_ml: Option<f64>,
}

impl ProductMetadata {
    /// Name shown for the product.
    ///
    /// An explicit, non-blank product name wins. Otherwise the name is built
    /// from the brand and bottle size (`"Brand (750ml)"`, `"Brand (1.8L)"`).
    /// Without a brand there is nothing to show and the name stays empty.
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = non_blank(self.product_name.as_deref()) {
            return Some(name.to_string());
        }

        let brand = non_blank(self.brand_name.as_deref())?;
        match self.size_ml {
            Some(ml) if ml > 0.0 && ml < 1000.0 => Some(format!("{brand} ({}ml)", ml.trunc() as i64)),
            Some(ml) if ml >= 1000.0 => Some(format!("{brand} ({:.1}L)", ml / 1000.0)),
            _ => Some(brand.to_string()),
        }
    }
}

/// Image availability as derived by the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub has_image: bool,
    pub image_path: Option<String>,
    pub image_url: Option<String>,
}

/// One row of the windowed projection: a reading joined to its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub reading: InventoryReading,
    pub metadata: ProductMetadata,
    pub image: ProductImage,
}

/// Latest known reading for a product across its whole history.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentLevel {
    pub check_date: NaiveDate,
    pub quantity: i64,
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
