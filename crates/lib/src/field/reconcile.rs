//! Post-commit phase: shift the neighbours of a saved item.
//!
//! Runs only after the item's own row carries its final position. Each branch
//! is one bulk shift over the tightest range the move implies, always
//! excluding the item.

use tracing::{debug, trace};

use super::PositionField;
use crate::Result;
use crate::item::Item;
use crate::store::{PositionRange, Shift, Store};

/// The shift that restores contiguity after an item landed on `updated`.
///
/// `current` is where the item was before (unknown for inserts and moves
/// in from another collection).
pub fn neighbour_shift(
    current: Option<i64>,
    updated: i64,
    opening: bool,
) -> (PositionRange, i64) {
    match current {
        Some(current) if !opening && updated > current => {
            (PositionRange::after_through(current, updated), -1)
        }
        Some(current) if !opening => (PositionRange::between(updated, current), 1),
        _ => (PositionRange::at_or_above(updated), 1),
    }
}

pub(super) async fn reconcile(
    field: &PositionField,
    store: &dyn Store,
    item: &mut Item,
    created: bool,
) -> Result<()> {
    let moved = item.cache.collection_changed;
    let pending = item.cache.pending;

    if pending.is_none() && !moved {
        trace!(item = %item.id(), "Nothing to reconcile");
        return Ok(());
    }

    // Without a pending value the item sits where it was appended.
    let Some(updated) = pending.or(item.cache.current) else {
        item.cache.collection_changed = false;
        return Ok(());
    };

    let opening = created || moved || pending.is_none();
    let (range, delta) = neighbour_shift(item.cache.current, updated, opening);

    if range.is_empty() {
        trace!(item = %item.id(), position = updated, "Position unchanged, no shift");
    } else {
        let touched = store
            .shift(&Shift {
                collection: item.collection().clone(),
                range,
                delta,
                exclude: Some(item.id().clone()),
                stamp: field.stamp(),
            })
            .await?;
        debug!(
            item = %item.id(),
            collection = %item.collection(),
            position = updated,
            delta,
            touched,
            "Shifted neighbours"
        );
    }

    item.cache.settle(updated);
    Ok(())
}
