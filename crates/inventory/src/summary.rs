//! Report-level totals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregation::ProductStatistic;
use crate::reading::non_blank;

/// Bucket used for products without a listing type.
pub const UNKNOWN_LISTING_TYPE: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingTypeTotals {
    pub count: u64,
    pub inventory: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_products: u64,
    pub products_with_inventory: u64,
    pub products_with_images: u64,
    pub total_inventory_units: i64,
    pub listing_type_breakdown: BTreeMap<String, ListingTypeTotals>,
}

/// Totals over the aggregated products; all inventory figures use current inventory.
pub fn summarize(products: &[ProductStatistic]) -> ReportSummary {
    let mut summary = ReportSummary::default();

    for product in products {
        summary.total_products += 1;
        if product.current_inventory > 0 {
            summary.products_with_inventory += 1;
        }
        if product.has_image {
            summary.products_with_images += 1;
        }
        summary.total_inventory_units += product.current_inventory;

        let bucket = non_blank(product.listing_type.as_deref()).unwrap_or(UNKNOWN_LISTING_TYPE);
        let totals = summary
            .listing_type_breakdown
            .entry(bucket.to_string())
            .or_default();
        totals.count += 1;
        totals.inventory += product.current_inventory;
    }

    summary
}
