//! Configuration error types.
//!
//! Every variant here is raised at setup time, before a [`PositionField`]
//! or [`Session`] exists. A configuration that fails validation is never
//! registered.
//!
//! [`PositionField`]: crate::field::PositionField
//! [`Session`]: crate::session::Session

use thiserror::Error;

/// Errors raised while validating an [`OrderingConfig`](super::OrderingConfig).
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The position field was declared unique on its own.
    #[error("Position field '{field}' can't have a unique constraint")]
    UniquePosition {
        /// Name of the position field
        field: String,
    },

    /// The position field takes part in a multi-column uniqueness constraint.
    #[error("Position field '{field}' can't be part of a unique constraint: {constraint:?}")]
    UniqueTogether {
        /// Name of the position field
        field: String,
        /// The offending constraint
        constraint: Vec<String>,
    },

    /// A table, column or field name was empty.
    #[error("Empty name for {what}")]
    EmptyName {
        /// What the name was for (table, field, column)
        what: &'static str,
    },

    /// A name is not a plain SQL identifier.
    #[error("Invalid identifier '{name}': only ASCII letters, digits and '_' are allowed")]
    InvalidIdentifier {
        /// The rejected name
        name: String,
    },

    /// The same column appears twice in the layout.
    #[error("Column '{name}' is declared more than once")]
    DuplicateField {
        /// The duplicated column name
        name: String,
    },

    /// The position field was also listed as a collection or auto-refresh field.
    #[error("Position field '{field}' can't also be a collection or auto-refresh field")]
    PositionInCollection {
        /// Name of the position field
        field: String,
    },

    /// A JSON configuration document could not be parsed.
    #[error("Invalid configuration JSON")]
    InvalidJson {
        /// The underlying parse error
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Check if this error is about a uniqueness constraint on the position field.
    pub fn is_uniqueness_error(&self) -> bool {
        matches!(
            self,
            ConfigError::UniquePosition { .. } | ConfigError::UniqueTogether { .. }
        )
    }

    /// Check if this error is about naming (empty, invalid or duplicated names).
    pub fn is_naming_error(&self) -> bool {
        matches!(
            self,
            ConfigError::EmptyName { .. }
                | ConfigError::InvalidIdentifier { .. }
                | ConfigError::DuplicateField { .. }
                | ConfigError::PositionInCollection { .. }
        )
    }
}

impl From<ConfigError> for crate::Error {
    fn from(err: ConfigError) -> Self {
        crate::Error::Config(err)
    }
}
