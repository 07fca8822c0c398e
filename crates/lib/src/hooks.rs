//! Lifecycle notifications around saves and deletes.
//!
//! The host calls the [`HookRegistry`] at three points of a record's
//! lifecycle; every subscribed [`LifecycleHook`] is notified in registration
//! order. [`PositionField`](crate::field::PositionField) is one such
//! subscriber.
//!
//! Hooks receive the store handle of the write in progress. Inside a
//! [`Session`](crate::session::Session) that is the open transaction: reads
//! through it see the uncommitted state, and an error rolls everything back.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::item::Item;
use crate::store::Store;

/// Callbacks a host invokes around record writes.
///
/// Every method defaults to a no-op so subscribers implement only the events
/// they care about.
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    /// Called before the record is removed from the store.
    async fn before_record_deleted(&self, _store: &dyn Store, _item: &mut Item) -> Result<()> {
        Ok(())
    }

    /// Called after the record has been removed from the store.
    async fn after_record_deleted(&self, _store: &dyn Store, _item: &mut Item) -> Result<()> {
        Ok(())
    }

    /// Called after the record has been written. `created` is true for a
    /// fresh insert.
    async fn after_record_saved(
        &self,
        _store: &dyn Store,
        _item: &mut Item,
        _created: bool,
    ) -> Result<()> {
        Ok(())
    }
}

/// Ordered set of lifecycle subscribers.
///
/// Dispatch stops at the first failing hook and returns its error. Later
/// hooks are not called.
#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl HookRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Add a subscriber.
    pub fn subscribe(&mut self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.push(hook);
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether there are no subscribers.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Notify every subscriber that `item` is about to be deleted.
    pub async fn before_record_deleted(&self, store: &dyn Store, item: &mut Item) -> Result<()> {
        for hook in &self.hooks {
            if let Err(e) = hook.before_record_deleted(store, item).await {
                tracing::error!(item = %item.id(), "before_record_deleted hook failed: {e}");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Notify every subscriber that `item` has been deleted.
    pub async fn after_record_deleted(&self, store: &dyn Store, item: &mut Item) -> Result<()> {
        for hook in &self.hooks {
            if let Err(e) = hook.after_record_deleted(store, item).await {
                tracing::error!(item = %item.id(), "after_record_deleted hook failed: {e}");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Notify every subscriber that `item` has been saved.
    pub async fn after_record_saved(
        &self,
        store: &dyn Store,
        item: &mut Item,
        created: bool,
    ) -> Result<()> {
        for hook in &self.hooks {
            if let Err(e) = hook.after_record_saved(store, item, created).await {
                tracing::error!(
                    item = %item.id(),
                    created,
                    "after_record_saved hook failed: {e}"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
