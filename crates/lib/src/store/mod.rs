//! Storage abstraction for positioned rows.
//!
//! The [`Store`] trait is everything the engine needs from persistence:
//! counting a collection, reading a position range in order, fetching a row
//! by identity, and shifting a position range by a constant in one bulk
//! update. `put` and `remove` are the host's own writes.
//!
//! [`Store::begin`] opens a [`StoreTransaction`]: a handle implementing the
//! same operations whose effects commit or roll back together. A host runs
//! each save and delete inside one so a failed shift never leaves the item's
//! own write behind.
//!
//! Implementations:
//! - [`InMemory`]: `HashMap` behind a lock, with JSON snapshots
//! - `sql::SqlStore`: SQLite / PostgreSQL through sqlx (features `sqlite`,
//!   `postgres`)

mod errors;
mod in_memory;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod sql;

pub use errors::StoreError;
pub use in_memory::{InMemory, InMemoryTransaction};

use std::ops::Bound;

use async_trait::async_trait;

use crate::Result;
use crate::item::{CollectionKey, ItemId, Row};

/// A contiguous range of positions.
///
/// ```
/// use positions::store::PositionRange;
///
/// let range = PositionRange::above(2);
/// assert!(!range.contains(2));
/// assert!(range.contains(3));
/// assert!(PositionRange::between(4, 4).is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRange {
    /// Lower bound
    pub lower: Bound<i64>,
    /// Upper bound
    pub upper: Bound<i64>,
}

impl PositionRange {
    /// Every position.
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// Positions strictly greater than `position`.
    pub fn above(position: i64) -> Self {
        Self {
            lower: Bound::Excluded(position),
            upper: Bound::Unbounded,
        }
    }

    /// Positions greater than or equal to `position`.
    pub fn at_or_above(position: i64) -> Self {
        Self {
            lower: Bound::Included(position),
            upper: Bound::Unbounded,
        }
    }

    /// Positions in the half-open interval `[lower, upper)`.
    pub fn between(lower: i64, upper: i64) -> Self {
        Self {
            lower: Bound::Included(lower),
            upper: Bound::Excluded(upper),
        }
    }

    /// Positions in the half-open interval `(lower, upper]`.
    pub fn after_through(lower: i64, upper: i64) -> Self {
        Self {
            lower: Bound::Excluded(lower),
            upper: Bound::Included(upper),
        }
    }

    /// Whether `position` lies in the range.
    pub fn contains(&self, position: i64) -> bool {
        let above_lower = match self.lower {
            Bound::Included(l) => position >= l,
            Bound::Excluded(l) => position > l,
            Bound::Unbounded => true,
        };
        let below_upper = match self.upper {
            Bound::Included(u) => position <= u,
            Bound::Excluded(u) => position < u,
            Bound::Unbounded => true,
        };
        above_lower && below_upper
    }

    /// Whether no position can lie in the range.
    pub fn is_empty(&self) -> bool {
        let lowest = match self.lower {
            Bound::Included(l) => Some(l),
            Bound::Excluded(l) => l.checked_add(1),
            Bound::Unbounded => Some(i64::MIN),
        };
        let highest = match self.upper {
            Bound::Included(u) => Some(u),
            Bound::Excluded(u) => u.checked_sub(1),
            Bound::Unbounded => Some(i64::MAX),
        };
        match (lowest, highest) {
            (Some(lo), Some(hi)) => lo > hi,
            _ => true,
        }
    }
}

/// Auto-refresh columns to stamp during a shift, and the instant to stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    /// Column names
    pub fields: Vec<String>,
    /// Epoch milliseconds
    pub millis: u64,
}

/// A bulk arithmetic update over one collection.
///
/// Adds `delta` to the position of every row of `collection` whose position
/// lies in `range`, except `exclude`, and stamps `stamp` on the same rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shift {
    /// Collection to update
    pub collection: CollectionKey,
    /// Positions to update
    pub range: PositionRange,
    /// Amount added to each matched position
    pub delta: i64,
    /// Row left untouched even if it matches
    pub exclude: Option<ItemId>,
    /// Auto-refresh stamping, if any columns are declared
    pub stamp: Option<Stamp>,
}

impl Shift {
    /// Whether a row matches this shift's predicate.
    pub fn matches(&self, row: &Row) -> bool {
        row.collection == self.collection
            && self.range.contains(row.position)
            && self.exclude.as_ref() != Some(&row.id)
    }
}

/// Persistence backing a position field.
///
/// All implementations must be `Send` and `Sync`. Calls are awaited one at a
/// time by the engine; the store must make a completed `shift` visible to
/// subsequent `count`, `read` and `get` calls made through the same handle.
#[async_trait]
pub trait Store: Send + Sync {
    /// Number of rows in `collection`.
    async fn count(&self, collection: &CollectionKey) -> Result<u64>;

    /// Rows of `collection` within `range`, ascending by position.
    async fn read(&self, collection: &CollectionKey, range: PositionRange) -> Result<Vec<Row>>;

    /// The lowest-positioned row of `collection` within `range`.
    async fn first(&self, collection: &CollectionKey, range: PositionRange) -> Result<Option<Row>> {
        Ok(self.read(collection, range).await?.into_iter().next())
    }

    /// Row by identity. Fails with [`StoreError::RowNotFound`] when absent.
    async fn get(&self, id: &ItemId) -> Result<Row>;

    /// Apply a bulk shift, returning the number of rows touched.
    async fn shift(&self, shift: &Shift) -> Result<u64>;

    /// Insert or replace a row.
    async fn put(&self, row: Row) -> Result<()>;

    /// Delete a row. Deleting an absent row is not an error.
    async fn remove(&self, id: &ItemId) -> Result<()>;

    /// Open a unit of work.
    ///
    /// Writes made through the returned handle are seen by other callers only
    /// once it commits. Dropping it without committing rolls back. Calling
    /// `begin` on a transaction fails with [`StoreError::NestedTransaction`].
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;
}

/// A [`Store`] handle whose writes commit or roll back together.
#[async_trait]
pub trait StoreTransaction: Store {
    /// This transaction as a plain store handle.
    fn as_store(&self) -> &dyn Store;

    /// Make every write visible.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Undo every write.
    async fn rollback(self: Box<Self>) -> Result<()>;
}
