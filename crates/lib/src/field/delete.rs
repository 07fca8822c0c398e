//! Gap closure around deletes.
//!
//! The next sibling is captured before the row goes away; afterwards its
//! *current* collection is repaired. The deleted row's own fields are not
//! consulted once it is gone.

use tracing::{debug, trace, warn};

use super::PositionField;
use crate::Result;
use crate::item::Item;
use crate::store::{PositionRange, Shift, Store};

pub(super) async fn before_delete(store: &dyn Store, item: &mut Item) -> Result<()> {
    item.cache.next_sibling = None;
    let Some(position) = item.cache.current else {
        trace!(item = %item.id(), "Never persisted, no sibling to capture");
        return Ok(());
    };
    let sibling = store
        .first(item.collection(), PositionRange::above(position))
        .await?;
    trace!(
        item = %item.id(),
        sibling = ?sibling.as_ref().map(|row| &row.id),
        "Captured next sibling"
    );
    item.cache.next_sibling = sibling.map(|row| row.id);
    Ok(())
}

pub(super) async fn after_delete(
    field: &PositionField,
    store: &dyn Store,
    item: &mut Item,
) -> Result<()> {
    let Some(sibling_id) = item.cache.next_sibling.take() else {
        return Ok(());
    };
    let Some(position) = item.cache.current else {
        return Ok(());
    };

    let sibling = match store.get(&sibling_id).await {
        Ok(row) => row,
        Err(e) if e.is_not_found() => {
            warn!(
                item = %item.id(),
                sibling = %sibling_id,
                "Next sibling vanished, skipping gap closure"
            );
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let touched = store
        .shift(&Shift {
            collection: sibling.collection.clone(),
            range: PositionRange::above(position),
            delta: -1,
            exclude: None,
            stamp: field.stamp(),
        })
        .await?;
    debug!(
        item = %item.id(),
        collection = %sibling.collection,
        position,
        touched,
        "Closed gap after delete"
    );
    Ok(())
}
