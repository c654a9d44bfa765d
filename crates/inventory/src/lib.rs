//! Warehouse inventory analytics.
//!
//! This crate contains the report rules for warehouse inventory, implemented
//! purely as deterministic domain logic (no IO, no SQL, no filesystem):
//! date windows, per-product peak/low aggregation, summaries and the report
//! document consumed downstream.

pub mod aggregation;
pub mod reading;
pub mod report;
pub mod summary;
pub mod window;

pub use aggregation::{aggregate, ProductStatistic};
pub use reading::{CurrentLevel, InventoryReading, ProductImage, ProductMetadata, ReportRow};
pub use report::{Report, ReportMeta, TimePeriod};
pub use summary::{summarize, ListingTypeTotals, ReportSummary, UNKNOWN_LISTING_TYPE};
pub use window::{DateWindow, WindowCatalog, WindowSpec, CURRENT_MONTH};
