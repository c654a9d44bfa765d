//! Per-product point statistics over a window.
//!
//! Model:
//! - Rows are grouped by product key in first-seen order; the first row's
//!   metadata is kept for the product.
//! - Peak is the highest quantity in the window, the latest date winning ties.
//! - Low is searched only from the peak forward (depletion after a restock),
//!   the latest date winning ties.
//! - Current inventory is the latest reading of the whole history, supplied
//!   by the caller, so it is independent of the window.

use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use warehouse_core::ProductKey;

use crate::reading::{CurrentLevel, ProductImage, ProductMetadata, ReportRow};

/// Aggregated statistics for one product in one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductStatistic {
    #[serde(rename = "plu")]
    pub product_key: ProductKey,
    pub product_name: Option<String>,
    pub brand_name: Option<String>,
    pub listing_type: Option<String>,
    pub retail_price: Option<f64>,
    pub supplier: Option<String>,
    pub broker: Option<String>,
    pub external_sku: Option<String>,
    pub size_ml: Option<f64>,
    pub current_inventory: i64,
    pub peak_inventory: i64,
    pub peak_inventory_date: Option<NaiveDate>,
    pub low_inventory: i64,
    pub low_inventory_date: Option<NaiveDate>,
    pub last_updated: Option<NaiveDate>,
    pub has_image: bool,
    pub image_path: Option<String>,
    pub image_url: Option<String>,
}

/// A quantity observed on a date.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Point {
    pub date: NaiveDate,
    pub quantity: i64,
}

/// Highest quantity; among equal quantities the most recent date.
pub fn peak(points: &[Point]) -> Option<Point> {
    points.iter().copied().max_by_key(|p| (p.quantity, p.date))
}

/// Lowest quantity on or after `from`; among equal quantities the most recent date.
///
/// Falls back to the lowest quantity of the whole series when nothing lies at
/// or after `from`.
pub fn low_from(points: &[Point], from: NaiveDate) -> Option<Point> {
    latest_minimum(points.iter().copied().filter(|p| p.date >= from))
        .or_else(|| latest_minimum(points.iter().copied()))
}

fn latest_minimum(points: impl Iterator<Item = Point>) -> Option<Point> {
    points.min_by_key(|p| (p.quantity, Reverse(p.date)))
}

#[derive(Debug)]
struct ProductSeries {
    key: ProductKey,
    metadata: ProductMetadata,
    image: ProductImage,
    points: Vec<Point>,
}

impl ProductSeries {
    fn into_statistic(mut self, current: Option<&CurrentLevel>) -> ProductStatistic {
        self.points.sort_by_key(|p| p.date);

        let latest = self.points.last().copied();
        let peak = peak(&self.points);
        let low = peak.and_then(|pk| low_from(&self.points, pk.date));

        // Fall back to the window's own latest reading when the history lookup
        // has nothing for this key.
        let current_inventory = current
            .map(|c| c.quantity)
            .or(latest.map(|p| p.quantity))
            .unwrap_or(0);

        ProductStatistic {
            product_name: self.metadata.display_name(),
            product_key: self.key,
            brand_name: self.metadata.brand_name,
            listing_type: self.metadata.listing_type,
            retail_price: self.metadata.retail_price,
            supplier: self.metadata.supplier,
            broker: self.metadata.broker,
            external_sku: self.metadata.external_sku,
            size_ml: self.metadata.size_ml,
            current_inventory,
            peak_inventory: peak.map_or(0, |p| p.quantity),
            peak_inventory_date: peak.map(|p| p.date),
            low_inventory: low.map_or(0, |p| p.quantity),
            low_inventory_date: low.map(|p| p.date),
            last_updated: latest.map(|p| p.date),
            has_image: self.image.has_image,
            image_path: self.image.image_path,
            image_url: self.image.image_url,
        }
    }
}

/// Reduce windowed rows to one statistic per product, in report order.
pub fn aggregate(
    rows: impl IntoIterator<Item = ReportRow>,
    current_levels: &HashMap<ProductKey, CurrentLevel>,
) -> Vec<ProductStatistic> {
    let mut series: Vec<ProductSeries> = Vec::new();
    let mut index: HashMap<ProductKey, usize> = HashMap::new();

    for row in rows {
        let point = Point {
            date: row.reading.check_date,
            quantity: row.reading.quantity_available,
        };
        match index.get(&row.reading.product_key) {
            Some(&i) => series[i].points.push(point),
            None => {
                index.insert(row.reading.product_key.clone(), series.len());
                series.push(ProductSeries {
                    key: row.reading.product_key,
                    metadata: row.metadata,
                    image: row.image,
                    points: vec![point],
                });
            }
        }
    }

    let mut products: Vec<ProductStatistic> = series
        .into_iter()
        .map(|s| {
            let current = current_levels.get(&s.key);
            s.into_statistic(current)
        })
        .collect();

    sort_for_report(&mut products);
    products
}

/// Case-insensitive by display name (or brand), then brand, then key.
pub fn sort_for_report(products: &mut [ProductStatistic]) {
    products.sort_by_cached_key(|p| {
        let name = p
            .product_name
            .as_deref()
            .or(p.brand_name.as_deref())
            .unwrap_or_default()
            .to_lowercase();
        let brand = p.brand_name.as_deref().unwrap_or_default().to_lowercase();
        (name, brand, p.product_key.clone())
    });
}
