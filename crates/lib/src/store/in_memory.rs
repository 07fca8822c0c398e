//! In-memory store implementation
//!
//! Suitable for tests, development, or hosts that persist the whole state
//! themselves through [`InMemory::save_to_file`] / [`InMemory::load_from_file`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::{Mutex, OwnedRwLockWriteGuard, RwLock};

use super::{PositionRange, Shift, Store, StoreError, StoreTransaction};
use crate::item::{CollectionKey, ItemId, Row};
use crate::{Error, Result};

/// The current snapshot file format version.
const PERSISTENCE_VERSION: u8 = 0;

fn is_v0(v: &u8) -> bool {
    *v == 0
}

fn validate_persistence_version<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let version = u8::deserialize(deserializer)?;
    if version != PERSISTENCE_VERSION {
        return Err(serde::de::Error::custom(format!(
            "unsupported persistence version {version}, expected {PERSISTENCE_VERSION}"
        )));
    }
    Ok(version)
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    #[serde(
        rename = "_v",
        default,
        skip_serializing_if = "is_v0",
        deserialize_with = "validate_persistence_version"
    )]
    version: u8,
    rows: HashMap<ItemId, Row>,
}

/// A `HashMap`-backed [`Store`].
///
/// Every trait call takes the lock once, so a `shift` is applied to all
/// matching rows before any other call observes the map. A transaction holds
/// the write lock until it finishes.
#[derive(Debug, Default)]
pub struct InMemory {
    rows: Arc<RwLock<HashMap<ItemId, Row>>>,
}

impl InMemory {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows across all collections.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Whether the store holds no rows.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Saves every row to `path` as JSON.
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let snapshot = Snapshot {
            version: PERSISTENCE_VERSION,
            rows: self.rows.read().await.clone(),
        };
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| -> Error { StoreError::SerializationFailed { source: e }.into() })?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| -> Error { StoreError::FileIo { source: e }.into() })
    }

    /// Loads a store from a JSON snapshot.
    ///
    /// If the file does not exist, a new, empty store is returned.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(json) => {
                let snapshot: Snapshot = serde_json::from_str(&json).map_err(|e| -> Error {
                    StoreError::DeserializationFailed { source: e }.into()
                })?;
                Ok(Self {
                    rows: Arc::new(RwLock::new(snapshot.rows)),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(StoreError::FileIo { source: e }.into()),
        }
    }
}

fn count_rows(rows: &HashMap<ItemId, Row>, collection: &CollectionKey) -> u64 {
    rows.values().filter(|r| r.collection == *collection).count() as u64
}

fn read_rows(
    rows: &HashMap<ItemId, Row>,
    collection: &CollectionKey,
    range: PositionRange,
) -> Vec<Row> {
    let mut matched: Vec<Row> = rows
        .values()
        .filter(|r| r.collection == *collection && range.contains(r.position))
        .cloned()
        .collect();
    matched.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
    matched
}

fn get_row(rows: &HashMap<ItemId, Row>, id: &ItemId) -> Result<Row> {
    rows.get(id)
        .cloned()
        .ok_or_else(|| StoreError::RowNotFound { id: id.clone() }.into())
}

fn shift_rows(rows: &mut HashMap<ItemId, Row>, shift: &Shift) -> u64 {
    let mut touched = 0;
    for row in rows.values_mut().filter(|r| shift.matches(r)) {
        row.position += shift.delta;
        if let Some(stamp) = &shift.stamp {
            for field in &stamp.fields {
                row.stamps.insert(field.clone(), stamp.millis);
            }
        }
        touched += 1;
    }
    touched
}

#[async_trait]
impl Store for InMemory {
    async fn count(&self, collection: &CollectionKey) -> Result<u64> {
        Ok(count_rows(&*self.rows.read().await, collection))
    }

    async fn read(&self, collection: &CollectionKey, range: PositionRange) -> Result<Vec<Row>> {
        Ok(read_rows(&*self.rows.read().await, collection, range))
    }

    async fn get(&self, id: &ItemId) -> Result<Row> {
        get_row(&*self.rows.read().await, id)
    }

    async fn shift(&self, shift: &Shift) -> Result<u64> {
        Ok(shift_rows(&mut *self.rows.write().await, shift))
    }

    async fn put(&self, row: Row) -> Result<()> {
        self.rows.write().await.insert(row.id.clone(), row);
        Ok(())
    }

    async fn remove(&self, id: &ItemId) -> Result<()> {
        self.rows.write().await.remove(id);
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let rows = self.rows.clone().write_owned().await;
        Ok(Box::new(InMemoryTransaction {
            state: Mutex::new(Pending {
                rows,
                undo: HashMap::new(),
            }),
        }))
    }
}

/// Rows under the store's write lock, plus the prior state of every row the
/// transaction touched (`None`: the row did not exist).
struct Pending {
    rows: OwnedRwLockWriteGuard<HashMap<ItemId, Row>>,
    undo: HashMap<ItemId, Option<Row>>,
}

impl Pending {
    fn remember(&mut self, id: &ItemId) {
        if !self.undo.contains_key(id) {
            let prior = self.rows.get(id).cloned();
            self.undo.insert(id.clone(), prior);
        }
    }

    fn restore(&mut self) {
        for (id, prior) in self.undo.drain() {
            match prior {
                Some(row) => self.rows.insert(id, row),
                None => self.rows.remove(&id),
            };
        }
    }
}

/// Transaction over an [`InMemory`] store.
///
/// Holds the store's write lock for its whole lifetime. Dropping it without
/// [`commit`](StoreTransaction::commit) restores every touched row.
pub struct InMemoryTransaction {
    state: Mutex<Pending>,
}

impl std::fmt::Debug for InMemoryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTransaction").finish_non_exhaustive()
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        self.state.get_mut().restore();
    }
}

#[async_trait]
impl Store for InMemoryTransaction {
    async fn count(&self, collection: &CollectionKey) -> Result<u64> {
        Ok(count_rows(&self.state.lock().await.rows, collection))
    }

    async fn read(&self, collection: &CollectionKey, range: PositionRange) -> Result<Vec<Row>> {
        Ok(read_rows(&self.state.lock().await.rows, collection, range))
    }

    async fn get(&self, id: &ItemId) -> Result<Row> {
        get_row(&self.state.lock().await.rows, id)
    }

    async fn shift(&self, shift: &Shift) -> Result<u64> {
        let mut state = self.state.lock().await;
        let matched: Vec<ItemId> = state
            .rows
            .values()
            .filter(|r| shift.matches(r))
            .map(|r| r.id.clone())
            .collect();
        for id in &matched {
            state.remember(id);
        }
        Ok(shift_rows(&mut state.rows, shift))
    }

    async fn put(&self, row: Row) -> Result<()> {
        let mut state = self.state.lock().await;
        state.remember(&row.id);
        state.rows.insert(row.id.clone(), row);
        Ok(())
    }

    async fn remove(&self, id: &ItemId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.remember(id);
        state.rows.remove(id);
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Err(StoreError::NestedTransaction.into())
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    fn as_store(&self) -> &dyn Store {
        self
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.state.lock().await.undo.clear();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        // Dropping restores.
        Ok(())
    }
}
