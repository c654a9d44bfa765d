use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use warehouse_core::DomainError;
use warehouse_inventory::WindowCatalog;

/// Generate warehouse inventory reports for the configured time windows.
///
/// Reports, per-window metadata and the report index are written to the
/// reports directory. Configuration is read from the environment.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "warehouse-reports", version)]
pub struct Cli {
    /// Windows to generate, e.g. `current_month last_30_days`. All configured
    /// windows are generated when none are given.
    #[arg(value_name = "WINDOW")]
    pub windows: Vec<String>,
}

impl Cli {
    /// Reject window names the catalog does not know as a usage error.
    pub fn validate(&self, catalog: &WindowCatalog) -> Result<(), clap::Error> {
        let names = catalog.names();
        match self.windows.iter().find(|w| !names.contains(w)) {
            Some(unknown) => {
                let err = DomainError::unknown_window(unknown, names.iter().map(String::as_str));
                Err(Cli::command().error(ErrorKind::InvalidValue, err.to_string()))
            }
            None => Ok(()),
        }
    }
}
