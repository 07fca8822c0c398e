//! The position field: resolution, reconciliation and gap closure.
//!
//! A save runs in two phases around the host's own write:
//!
//! 1. [`PositionField::resolve`] (before the row is written) turns the
//!    requested position into a concrete one, closing the gap in the old
//!    collection first if the item changed collection.
//! 2. [`PositionField::reconcile`] (after the row is written) shifts the other
//!    members of the collection so positions stay `0..N`.
//!
//! A delete brackets the host's removal with
//! [`before_delete`](PositionField::before_delete) and
//! [`after_delete`](PositionField::after_delete).
//!
//! Every operation runs against the [`Store`] handle it is given, normally
//! the host's open [`StoreTransaction`](crate::store::StoreTransaction) so a
//! failure rolls back the item's own write too.
//!
//! The field performs no locking. Callers must serialise writers per
//! collection around both phases; [`Session`](crate::session::Session) does
//! this in-process.

mod delete;
mod reconcile;
mod resolve;


pub use reconcile::neighbour_shift;
pub use resolve::clamp_position;

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::clock::{Clock, SystemClock};
use crate::config::OrderingConfig;
use crate::hooks::LifecycleHook;
use crate::item::{Item, Row};
use crate::store::{Stamp, Store};

use resolve::Previous;

/// Engine for one configured position field.
#[derive(Clone)]
pub struct PositionField {
    config: Arc<OrderingConfig>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for PositionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionField")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl PositionField {
    /// Create a field. Fails if `config` does not validate.
    pub fn new(config: OrderingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock used for auto-refresh stamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The validated configuration.
    pub fn config(&self) -> &OrderingConfig {
        &self.config
    }

    /// The clock used for auto-refresh stamps.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Stamp for every declared auto-refresh column at the current instant,
    /// or `None` when there are none.
    pub fn stamp(&self) -> Option<Stamp> {
        if self.config.auto_refresh.is_empty() {
            return None;
        }
        Some(Stamp {
            fields: self.config.auto_refresh.clone(),
            millis: self.clock.now_millis(),
        })
    }

    /// Resolve the position to persist for `item`, fetching its previous row
    /// from the store when it is not `created`.
    ///
    /// The item's collection must already hold its new value. A missing
    /// previous row is treated as an insert.
    pub async fn resolve(&self, store: &dyn Store, item: &mut Item, created: bool) -> Result<i64> {
        resolve::resolve(self, store, item, created, Previous::Fetch).await
    }

    /// Like [`resolve`](Self::resolve), with the previously persisted row
    /// supplied by the caller (`None` if there is none).
    pub async fn resolve_with_previous(
        &self,
        store: &dyn Store,
        item: &mut Item,
        created: bool,
        previous: Option<&Row>,
    ) -> Result<i64> {
        resolve::resolve(self, store, item, created, Previous::Known(previous)).await
    }

    /// Shift the item's neighbours after its row has been written, then
    /// reset its cache to the persisted position.
    pub async fn reconcile(&self, store: &dyn Store, item: &mut Item, created: bool) -> Result<()> {
        reconcile::reconcile(self, store, item, created).await
    }

    /// Remember the item's next sibling ahead of its removal.
    pub async fn before_delete(&self, store: &dyn Store, item: &mut Item) -> Result<()> {
        delete::before_delete(store, item).await
    }

    /// Close the gap the removed item left behind.
    pub async fn after_delete(&self, store: &dyn Store, item: &mut Item) -> Result<()> {
        delete::after_delete(self, store, item).await
    }
}

#[async_trait]
impl LifecycleHook for PositionField {
    async fn before_record_deleted(&self, store: &dyn Store, item: &mut Item) -> Result<()> {
        self.before_delete(store, item).await
    }

    async fn after_record_deleted(&self, store: &dyn Store, item: &mut Item) -> Result<()> {
        self.after_delete(store, item).await
    }

    async fn after_record_saved(
        &self,
        store: &dyn Store,
        item: &mut Item,
        created: bool,
    ) -> Result<()> {
        self.reconcile(store, item, created).await
    }
}
