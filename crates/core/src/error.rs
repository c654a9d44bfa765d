//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// identifiers, unknown names). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. empty product key).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A named report window is not configured.
    #[error("unknown report window `{name}` (valid: {valid})")]
    UnknownWindow { name: String, valid: String },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn unknown_window<'a>(
        name: impl Into<String>,
        valid: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self::UnknownWindow {
            name: name.into(),
            valid: valid.into_iter().collect::<Vec<_>>().join(", "),
        }
    }
}
