//! Error types for store operations.
//!
//! The engine never interprets these beyond [`StoreError::is_not_found`]; every
//! other failure surfaces to the caller unchanged so the host's unit of work
//! can roll back.

use thiserror::Error;

use crate::item::ItemId;

/// Errors that can occur inside a [`Store`](super::Store).
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Field additions/changes require a major version bump
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row with this identity.
    #[error("Row not found: {id}")]
    RowNotFound {
        /// The identity that was looked up
        id: ItemId,
    },

    /// A collection key does not match the configured collection columns.
    #[error("Collection key has {actual} values, expected {expected}")]
    ArityMismatch {
        /// Number of configured collection columns
        expected: usize,
        /// Number of values in the key
        actual: usize,
    },

    /// A value does not fit the column it is bound to, or a stored row could
    /// not be decoded.
    #[error("Invalid row: {reason}")]
    InvalidRow {
        /// Description of the problem
        reason: String,
    },

    /// Serialization failed.
    #[error("Serialization failed")]
    SerializationFailed {
        /// The underlying serialization error
        #[source]
        source: serde_json::Error,
    },

    /// Deserialization failed.
    #[error("Deserialization failed")]
    DeserializationFailed {
        /// The underlying deserialization error
        #[source]
        source: serde_json::Error,
    },

    /// `begin` was called on a handle that is already a transaction.
    #[error("Transactions cannot be nested")]
    NestedTransaction,

    /// File I/O error.
    #[error("File I/O error")]
    FileIo {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// SQL error from sqlx.
    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    #[error("SQL error: {reason}")]
    SqlxError {
        /// Description with context
        reason: String,
        /// The underlying sqlx error, if any
        #[source]
        source: Option<sqlx::Error>,
    },
}

impl StoreError {
    /// Check if this error indicates a row was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::RowNotFound { .. })
    }

    /// Check if this error is related to I/O or (de)serialization.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            StoreError::FileIo { .. }
                | StoreError::SerializationFailed { .. }
                | StoreError::DeserializationFailed { .. }
        )
    }

    /// Check if this error reports malformed input or stored data.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            StoreError::ArityMismatch { .. } | StoreError::InvalidRow { .. }
        )
    }
}

impl From<StoreError> for crate::Error {
    fn from(err: StoreError) -> Self {
        crate::Error::Store(err)
    }
}
