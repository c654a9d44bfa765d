//! Batch report generation: command line, run orchestration and wiring of
//! the SQLite store and report writer.

pub mod app;
pub mod cli;
pub mod runner;

pub use cli::Cli;
pub use runner::{ReportRunner, RunError, RunSummary};
