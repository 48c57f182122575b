//! Errors - エラー型と分類
//!
//! - `StoreError`: what the record store adapter can fail with. `Conflict` is
//!   the one kind the core recovers from locally; everything else is handed
//!   back to the caller unchanged.
//! - `ConfigError`: invalid configuration, detected at construction time.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A row with the same identity already exists.
    #[error("record already exists: {0}")]
    Conflict(String),

    /// The row to update does not exist (it may have been swept meanwhile).
    #[error("record not found: {0}")]
    NotFound(String),

    /// Connectivity, timeout or cancellation reported by the backend.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// True for the unique-identity collision on creation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config field `{field}` out of range: {value}")]
    OutOfRange { field: &'static str, value: u64 },

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
