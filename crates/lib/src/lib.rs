//!
//! Positions: dense, zero-based ordering for records stored in a table.
//!
//! Every record of a positioned model carries an integer position. Records are
//! grouped into collections by a tuple of collection columns, and within each
//! collection the positions always form the sequence `0..N`.
//!
//! ## Core Concepts
//!
//! * **Items (`item::Item`)**: A record as the host sees it, with an identity, a
//!   collection key and a position accessor backed by a per-item cache.
//! * **Stores (`store::Store`)**: A pluggable persistence layer offering counts,
//!   ordered reads and bulk position shifts. `store::InMemory` and the
//!   SQL-backed `store::sql::SqlStore` are provided.
//! * **Position field (`field::PositionField`)**: Resolves requested positions
//!   before a write, reconciles neighbours after it and closes gaps left by
//!   deletes.
//! * **Hooks (`hooks::LifecycleHook`)**: The after-save, before-delete and
//!   after-delete notifications through which the field is driven.
//! * **Session (`session::Session`)**: A host that serialises writers per
//!   collection and runs the whole save and delete protocol.
//!
//! ## Requesting positions
//!
//! A requested position is clamped into the collection: values past the end
//! append, negative values count from the end (`-1` is last) and values
//! further left than the start land at `0`.

pub mod clock;
pub mod config;
pub mod field;
pub mod hooks;
pub mod item;
pub mod session;
pub mod store;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;
pub use config::{ConfigError, OrderingConfig, ValueKind};
pub use field::PositionField;
pub use hooks::{HookRegistry, LifecycleHook};
pub use item::{APPEND, CollectionKey, FieldValue, Item, ItemId, Row};
pub use session::{Saved, Session};
pub use store::{InMemory, PositionRange, Store, StoreError, StoreTransaction};

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structured configuration errors from the config module
    #[error(transparent)]
    Config(config::ConfigError),

    /// Structured store errors from the store module
    #[error(transparent)]
    Store(store::StoreError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Store(_) => "store",
        }
    }

    /// Check if this error indicates a row was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error was raised while validating configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Check if this error is store-related.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::Store(_))
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_io_error(),
            _ => false,
        }
    }

    /// Check if this error indicates bad or undecodable data.
    pub fn is_data_error(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_data_error(),
            _ => false,
        }
    }
}
