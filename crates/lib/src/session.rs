//! A host wiring a store, a position field and lifecycle hooks together.
//!
//! [`Session`] runs the full save and delete protocol: it serialises writers
//! per collection, resolves before writing, writes the row, and dispatches the
//! post-write hooks that reconcile neighbours. All of it runs inside one
//! [`StoreTransaction`]; on any error the transaction rolls back and the item
//! handle is restored to its state before the call.
//!
//! Serialisation is in-process only. Writers in other processes sharing the
//! same database are not coordinated and can break the position invariant.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::Result;
use crate::clock::{Clock, SystemClock};
use crate::config::OrderingConfig;
use crate::field::PositionField;
use crate::hooks::{HookRegistry, LifecycleHook};
use crate::item::{CollectionKey, Item, ItemId, Row};
use crate::store::{PositionRange, Store, StoreTransaction};

/// One async mutex per collection key.
///
/// Keys are always locked in sorted order, so two writers that both need the
/// same pair of collections cannot deadlock.
#[derive(Debug, Default)]
pub struct CollectionLocks {
    locks: Mutex<HashMap<CollectionKey, Arc<Mutex<()>>>>,
}

/// Guards returned by [`CollectionLocks::lock_all`].
pub type CollectionGuards = Vec<OwnedMutexGuard<()>>;

impl CollectionLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every key in `keys`, waiting as needed.
    pub async fn lock_all(&self, mut keys: Vec<CollectionKey>) -> CollectionGuards {
        keys.sort();
        keys.dedup();
        let mutexes: Vec<Arc<Mutex<()>>> = {
            let mut table = self.locks.lock().await;
            // Unreferenced entries belong to nobody; drop them.
            table.retain(|_, m| Arc::strong_count(m) > 1);
            keys.into_iter()
                .map(|key| table.entry(key).or_default().clone())
                .collect()
        };
        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        guards
    }

    /// Number of collections currently tracked.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

/// Outcome of [`Session::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Saved {
    /// Whether the row was inserted rather than updated
    pub created: bool,
    /// Final position of the item
    pub position: i64,
}

/// Host for one positioned model.
pub struct Session {
    store: Arc<dyn Store>,
    field: Arc<PositionField>,
    hooks: HookRegistry,
    locks: CollectionLocks,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("field", &self.field)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session using the system clock. Fails if `config` does not
    /// validate.
    pub fn new(store: Arc<dyn Store>, config: OrderingConfig) -> Result<Self> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Create a session with an explicit clock for auto-refresh stamps.
    pub fn with_clock(
        store: Arc<dyn Store>,
        config: OrderingConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let field = Arc::new(PositionField::new(config)?.with_clock(clock));
        let mut hooks = HookRegistry::new();
        hooks.subscribe(field.clone());
        Ok(Self {
            store,
            field,
            hooks,
            locks: CollectionLocks::new(),
        })
    }

    /// Register another lifecycle subscriber. It is notified after the
    /// position field.
    pub fn subscribe(&mut self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.subscribe(hook);
    }

    /// The position field.
    pub fn field(&self) -> &Arc<PositionField> {
        &self.field
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Load an item by identity.
    ///
    /// Waits for any writer of the item's collection to finish first.
    pub async fn load(&self, id: &ItemId) -> Result<Item> {
        loop {
            let row = self.store.get(id).await?;
            let _guards = self.locks.lock_all(vec![row.collection.clone()]).await;
            let confirmed = self.store.get(id).await?;
            if confirmed.collection == row.collection {
                return Ok(Item::from_row(confirmed));
            }
        }
    }

    /// All items of a collection, in position order.
    pub async fn list(&self, collection: &CollectionKey) -> Result<Vec<Item>> {
        let _guards = self.locks.lock_all(vec![collection.clone()]).await;
        Ok(self
            .store
            .read(collection, PositionRange::all())
            .await?
            .into_iter()
            .map(Item::from_row)
            .collect())
    }

    /// Insert or update `item`, resolving its requested position and shifting
    /// its neighbours.
    pub async fn save(&self, item: &mut Item) -> Result<Saved> {
        let (previous, _guards) = self.lock_for_save(item).await?;
        let created = previous.is_none();
        let original = item.clone();

        let tx = self.store.begin().await?;
        let outcome = self
            .save_in(tx.as_store(), item, created, previous.as_ref())
            .await;
        let position = match finish(tx, outcome).await {
            Ok(position) => position,
            Err(e) => {
                *item = original;
                return Err(e);
            }
        };

        debug!(item = %item.id(), created, position, "Saved item");
        Ok(Saved { created, position })
    }

    /// Delete `item` and close the gap it leaves.
    ///
    /// The item is first refreshed from its persisted row, so unsaved edits
    /// are discarded. Returns `false` if there was no such row.
    pub async fn delete(&self, item: &mut Item) -> Result<bool> {
        let Some((row, _guards)) = self.lock_for_delete(item.id()).await? else {
            return Ok(false);
        };
        let original = std::mem::replace(item, Item::from_row(row));

        let tx = self.store.begin().await?;
        let outcome = self.delete_in(tx.as_store(), item).await;
        if let Err(e) = finish(tx, outcome).await {
            *item = original;
            return Err(e);
        }

        debug!(item = %item.id(), "Deleted item");
        Ok(true)
    }

    async fn save_in(
        &self,
        store: &dyn Store,
        item: &mut Item,
        created: bool,
        previous: Option<&Row>,
    ) -> Result<i64> {
        let position = self
            .field
            .resolve_with_previous(store, item, created, previous)
            .await?;

        let auto_refresh = &self.field.config().auto_refresh;
        if !auto_refresh.is_empty() {
            item.set_stamps(auto_refresh, self.field.clock().now_millis());
        }
        store.put(item.to_row(position)).await?;
        self.hooks.after_record_saved(store, item, created).await?;
        Ok(position)
    }

    async fn delete_in(&self, store: &dyn Store, item: &mut Item) -> Result<()> {
        self.hooks.before_record_deleted(store, item).await?;
        store.remove(item.id()).await?;
        self.hooks.after_record_deleted(store, item).await
    }

    async fn previous(&self, id: &ItemId) -> Result<Option<Row>> {
        match self.store.get(id).await {
            Ok(row) => Ok(Some(row)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Lock the item's target collection and, if it is moving, its old one.
    /// Retries if the row changed collection while the locks were awaited.
    async fn lock_for_save(&self, item: &Item) -> Result<(Option<Row>, CollectionGuards)> {
        loop {
            let previous = self.previous(item.id()).await?;
            let mut keys = vec![item.collection().clone()];
            if let Some(row) = &previous {
                keys.push(row.collection.clone());
            }
            let guards = self.locks.lock_all(keys).await;

            let confirmed = self.previous(item.id()).await?;
            let collection = |row: &Option<Row>| row.as_ref().map(|r| r.collection.clone());
            if collection(&confirmed) == collection(&previous) {
                return Ok((confirmed, guards));
            }
        }
    }

    async fn lock_for_delete(&self, id: &ItemId) -> Result<Option<(Row, CollectionGuards)>> {
        loop {
            let Some(row) = self.previous(id).await? else {
                return Ok(None);
            };
            let guards = self.locks.lock_all(vec![row.collection.clone()]).await;
            match self.previous(id).await? {
                Some(confirmed) if confirmed.collection == row.collection => {
                    return Ok(Some((confirmed, guards)));
                }
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }
}

/// Commit `tx` if `outcome` succeeded, otherwise roll it back and return the
/// original error.
async fn finish<T>(tx: Box<dyn StoreTransaction>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!("Rollback failed after {e}: {rollback}");
            }
            Err(e)
        }
    }
}
