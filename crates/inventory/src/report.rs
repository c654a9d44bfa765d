//! Report document written for one window.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregation::ProductStatistic;
use crate::summary::{summarize, ReportSummary};
use crate::window::DateWindow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub description: String,
}

impl From<&DateWindow> for TimePeriod {
    fn from(window: &DateWindow) -> Self {
        Self {
            start: window.start,
            end: window.end,
            description: window.description.clone(),
        }
    }
}

/// Report header; also written on its own as the window's metadata digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub generated_at: DateTime<Utc>,
    /// Window name the report was generated for.
    pub report_type: String,
    /// File name of the full report within the reports directory.
    pub filename: String,
    pub time_period: TimePeriod,
    pub summary: ReportSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub meta: ReportMeta,
    pub products: Vec<ProductStatistic>,
}

impl Report {
    /// Assemble a report; the summary is computed from `products`.
    pub fn new(
        window: &DateWindow,
        products: Vec<ProductStatistic>,
        filename: impl Into<String>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            meta: ReportMeta {
                generated_at,
                report_type: window.name.clone(),
                filename: filename.into(),
                time_period: TimePeriod::from(window),
                summary: summarize(&products),
            },
            products,
        }
    }

    /// Report for a window without any readings.
    pub fn empty(window: &DateWindow, filename: impl Into<String>, generated_at: DateTime<Utc>) -> Self {
        Self::new(window, Vec::new(), filename, generated_at)
    }

    pub fn window_name(&self) -> &str {
        &self.meta.report_type
    }
}
