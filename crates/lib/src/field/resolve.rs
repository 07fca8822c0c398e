//! Pre-commit phase: turn a requested position into the one to persist.

use tracing::{debug, trace};

use super::PositionField;
use crate::Result;
use crate::item::{APPEND, Item, Row};
use crate::store::{PositionRange, Shift, Store};

/// Where the resolver gets the previously persisted row from.
pub(super) enum Previous<'a> {
    /// Look it up in the store by identity.
    Fetch,
    /// The caller already has it (`None`: no such row).
    Known(Option<&'a Row>),
}

/// Map a requested position onto `0..=max`.
///
/// In-range values are kept, values past the end clamp to `max`, negative
/// values count from the end (`-1` is `max`) and clamp to `0` once they reach
/// past the start.
pub fn clamp_position(requested: i64, max: i64) -> i64 {
    if (0..=max).contains(&requested) {
        requested
    } else if requested > max {
        max
    } else if requested.unsigned_abs() <= (max + 1).max(0) as u64 {
        max + 1 + requested
    } else {
        0
    }
}

pub(super) async fn resolve(
    field: &PositionField,
    store: &dyn Store,
    item: &mut Item,
    created: bool,
    previous: Previous<'_>,
) -> Result<i64> {
    let mut add = created;
    let mut moved_from: Option<Row> = None;

    if !add {
        let previous = match previous {
            Previous::Known(row) => row.cloned(),
            Previous::Fetch => match store.get(item.id()).await {
                Ok(row) => Some(row),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            },
        };
        match previous {
            Some(row) => {
                // The persisted row wins over a stale or freshly built handle.
                item.cache.current = Some(row.position);
                if field.config().has_collection() && row.collection != *item.collection() {
                    moved_from = Some(row);
                }
            }
            None => add = true,
        }
    }

    let moved = moved_from.is_some();
    item.cache.collection_changed = moved;
    if let Some(old) = moved_from {
        let touched = store
            .shift(&Shift {
                collection: old.collection.clone(),
                range: PositionRange::above(old.position),
                delta: -1,
                exclude: Some(item.id().clone()),
                stamp: field.stamp(),
            })
            .await?;
        debug!(
            item = %item.id(),
            from = %old.collection,
            to = %item.collection(),
            old_position = old.position,
            touched,
            "Closed gap in previous collection"
        );
    }

    let mut current = item.cache.current;
    let mut updated = item.cache.pending;
    if moved {
        current = None;
    }
    if add {
        if updated.is_none() {
            updated = current;
        }
        current = None;
    }

    if let (Some(current), None) = (current, updated) {
        trace!(item = %item.id(), position = current, "Position untouched");
        return Ok(current);
    }

    let updated = updated.unwrap_or(APPEND);
    let count = store.count(item.collection()).await? as i64;
    let max = match current {
        None => count,
        Some(_) => (count - 1).max(0),
    };

    if add && (updated == APPEND || updated >= max) {
        item.cache.current = Some(max);
        item.cache.pending = None;
        trace!(item = %item.id(), position = max, "Appended new item");
        return Ok(max);
    }

    let position = clamp_position(updated, max);
    item.cache.current = current;
    item.cache.pending = Some(position);
    debug!(
        item = %item.id(),
        collection = %item.collection(),
        requested = updated,
        position,
        max,
        "Resolved position"
    );
    Ok(position)
}
