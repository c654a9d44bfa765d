//! Infrastructure layer: configuration, the SQLite inventory source and the
//! report writer.

pub mod config;
pub mod source;
pub mod writer;

pub use config::{ConfigError, DeploymentMode, FailurePolicy, GeneratorConfig, ImageConfig, TableConfig};
pub use source::{InventorySource, SqliteInventoryStore, StoreError};
pub use writer::{ReportIndex, ReportWriter, WindowOutcome, WindowStatus, WriteError, WrittenReport};
