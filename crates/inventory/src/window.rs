//! Named report windows.
//!
//! Windows are recomputed on every run from "today"; nothing here reads the
//! clock, so every calculation is a pure function of the date passed in.

use std::collections::BTreeMap;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use warehouse_core::{DomainError, DomainResult};

/// Name of the calendar-month window.
pub const CURRENT_MONTH: &str = "current_month";

/// Concrete date range a report is aggregated over (both ends inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub description: String,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// How a window is derived from "today".
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WindowSpec {
    /// First day of the current month through the earlier of month end and today.
    CurrentMonth,
    /// `today - days` through today.
    Trailing { days: u32 },
}

impl WindowSpec {
    pub fn name(&self) -> String {
        match self {
            WindowSpec::CurrentMonth => CURRENT_MONTH.to_string(),
            WindowSpec::Trailing { days } => format!("last_{days}_days"),
        }
    }

    pub fn resolve(&self, today: NaiveDate) -> DateWindow {
        match *self {
            WindowSpec::CurrentMonth => {
                let start = today.with_day(1).unwrap_or(today);
                let month_end = start
                    .checked_add_months(Months::new(1))
                    .and_then(|next| next.pred_opt())
                    .unwrap_or(today);
                DateWindow {
                    name: self.name(),
                    start,
                    end: month_end.min(today),
                    description: start.format("%B %Y").to_string(),
                }
            }
            WindowSpec::Trailing { days } => DateWindow {
                name: self.name(),
                start: today
                    .checked_sub_days(Days::new(u64::from(days)))
                    .unwrap_or(NaiveDate::MIN),
                end: today,
                description: format!("Last {days} days"),
            },
        }
    }
}

/// The set of configured windows, in report order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowCatalog {
    specs: Vec<WindowSpec>,
}

impl WindowCatalog {
    /// Current month plus one trailing window per entry of `trailing_days`.
    pub fn new(trailing_days: &[u32]) -> DomainResult<Self> {
        let mut specs = vec![WindowSpec::CurrentMonth];
        for &days in trailing_days {
            if days == 0 {
                return Err(DomainError::validation("trailing window length must be positive"));
            }
            let spec = WindowSpec::Trailing { days };
            if specs.contains(&spec) {
                return Err(DomainError::validation(format!(
                    "trailing window of {days} days configured twice"
                )));
            }
            specs.push(spec);
        }
        Ok(Self { specs })
    }

    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(WindowSpec::name).collect()
    }

    pub fn spec(&self, name: &str) -> Option<WindowSpec> {
        self.specs.iter().copied().find(|s| s.name() == name)
    }

    /// All windows keyed by name.
    pub fn windows(&self, today: NaiveDate) -> BTreeMap<String, DateWindow> {
        self.specs
            .iter()
            .map(|spec| (spec.name(), spec.resolve(today)))
            .collect()
    }

    /// Resolve a caller-selected subset, preserving the caller's order.
    ///
    /// An empty selection means every configured window. Any unknown name fails
    /// the whole selection so no work starts on a bad invocation.
    pub fn select(&self, names: &[String], today: NaiveDate) -> DomainResult<Vec<DateWindow>> {
        if names.is_empty() {
            return Ok(self.specs.iter().map(|s| s.resolve(today)).collect());
        }

        let valid = self.names();
        let mut selected: Vec<DateWindow> = Vec::with_capacity(names.len());
        for name in names {
            let spec = self
                .spec(name)
                .ok_or_else(|| DomainError::unknown_window(name, valid.iter().map(String::as_str)))?;
            if selected.iter().all(|w| &w.name != name) {
                selected.push(spec.resolve(today));
            }
        }
        Ok(selected)
    }
}

impl Default for WindowCatalog {
    fn default() -> Self {
        Self {
            specs: vec![
                WindowSpec::CurrentMonth,
                WindowSpec::Trailing { days: 30 },
                WindowSpec::Trailing { days: 90 },
                WindowSpec::Trailing { days: 180 },
            ],
        }
    }
}
