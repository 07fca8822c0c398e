//! Items, their identities and collection keys.
//!
//! An [`Item`] is the in-flight instance a host saves or deletes; a [`Row`] is
//! what the store persists. The item owns the [`PositionCache`] that backs its
//! position accessor.

mod cache;

pub use cache::{APPEND, PositionCache};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Primary key of an item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One value of a collection key.
///
/// `Null` equals `Null`: rows whose collection column is unset share one
/// collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldValue {
    /// Unset column
    Null,
    /// Integer column value
    Integer(i64),
    /// Text column value
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("NULL"),
            FieldValue::Integer(v) => write!(f, "{v}"),
            FieldValue::Text(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

/// Ordered tuple of field values identifying a collection.
///
/// The empty key is the single collection of a model with no collection
/// columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionKey(Vec<FieldValue>);

impl CollectionKey {
    /// Build a key from its values, in collection-column order.
    pub fn new<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    /// Key of the single collection of an unpartitioned model.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// The key's values.
    pub fn values(&self) -> &[FieldValue] {
        &self.0
    }

    /// Number of values in the key.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root key.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

/// Persisted form of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Primary key
    pub id: ItemId,
    /// Collection the row belongs to
    pub collection: CollectionKey,
    /// Zero-based position inside the collection
    pub position: i64,
    /// Auto-refresh columns, epoch milliseconds. Absent means never stamped.
    #[serde(default)]
    pub stamps: BTreeMap<String, u64>,
}

/// An item being created, moved or deleted.
///
/// Position reads and writes go through [`position`](Self::position) and
/// [`set_position`](Self::set_position); the requested value is resolved only
/// when the item is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    id: ItemId,
    collection: CollectionKey,
    stamps: BTreeMap<String, u64>,
    pub(crate) cache: PositionCache,
}

impl Item {
    /// A new, never persisted item. Its position defaults to append.
    pub fn new(id: impl Into<ItemId>, collection: CollectionKey) -> Self {
        Self {
            id: id.into(),
            collection,
            stamps: BTreeMap::new(),
            cache: PositionCache::default(),
        }
    }

    /// An item loaded from its persisted row.
    pub fn from_row(row: Row) -> Self {
        Self {
            id: row.id,
            collection: row.collection,
            stamps: row.stamps,
            cache: PositionCache::persisted(row.position),
        }
    }

    /// The item's identity.
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    /// The collection the item belongs to, or will belong to once saved.
    pub fn collection(&self) -> &CollectionKey {
        &self.collection
    }

    /// Move the item to another collection on its next save.
    pub fn set_collection(&mut self, collection: CollectionKey) {
        self.collection = collection;
    }

    /// Requested position if one is pending, otherwise the persisted one.
    pub fn position(&self) -> i64 {
        self.cache.get()
    }

    /// Request a position. `None` (or [`APPEND`]) appends; negative values
    /// count from the end of the collection.
    pub fn set_position(&mut self, position: impl Into<Option<i64>>) {
        self.cache.set(position.into());
    }

    /// Auto-refresh stamps as last persisted or saved.
    pub fn stamps(&self) -> &BTreeMap<String, u64> {
        &self.stamps
    }

    /// Auto-refresh stamp of one column.
    pub fn stamp(&self, field: &str) -> Option<u64> {
        self.stamps.get(field).copied()
    }

    /// The position accessor's backing cache.
    pub fn cache(&self) -> &PositionCache {
        &self.cache
    }

    pub(crate) fn set_stamps(&mut self, fields: &[String], millis: u64) {
        for field in fields {
            self.stamps.insert(field.clone(), millis);
        }
    }

    /// Persisted form of the item at `position`.
    pub fn to_row(&self, position: i64) -> Row {
        Row {
            id: self.id.clone(),
            collection: self.collection.clone(),
            position,
            stamps: self.stamps.clone(),
        }
    }
}
