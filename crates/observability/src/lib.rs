//! Tracing/logging setup shared by the report binaries.
//!
//! Logging is scoped to a run: [`LoggingContext::init`] installs a subscriber
//! for the current thread and removes it again when the context is dropped.

pub mod logging;

pub use logging::{LogError, LoggingContext, LOG_FILE_NAME};
