//! Per-item position cache.

use super::ItemId;

/// Requested position meaning "append to the end of the collection".
///
/// Negative positions count from the end, so `-1` is the last slot.
pub const APPEND: i64 = -1;

/// The `(current, pending)` pair behind an item's position accessor, plus the
/// ephemeral state one save or delete carries between its two phases.
///
/// `current` is the last known persisted position, `pending` the raw value
/// most recently requested through [`set`](Self::set). Neither phase flag is
/// ever persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionCache {
    pub(crate) current: Option<i64>,
    pub(crate) pending: Option<i64>,
    pub(crate) collection_changed: bool,
    pub(crate) next_sibling: Option<ItemId>,
}

impl PositionCache {
    /// Cache for a row loaded from the store.
    pub fn persisted(position: i64) -> Self {
        Self {
            current: Some(position),
            ..Self::default()
        }
    }

    /// Pending value if one was requested, else the persisted one, else
    /// [`APPEND`]. Never triggers resolution.
    pub fn get(&self) -> i64 {
        self.pending.or(self.current).unwrap_or(APPEND)
    }

    /// Store a raw requested position. `None` means append.
    pub fn set(&mut self, value: Option<i64>) {
        self.pending = Some(value.unwrap_or(APPEND));
    }

    /// Last known persisted position.
    pub fn current(&self) -> Option<i64> {
        self.current
    }

    /// Requested or resolved position that has not been reconciled yet.
    pub fn pending(&self) -> Option<i64> {
        self.pending
    }

    /// Record `position` as persisted truth and drop all per-operation state.
    pub(crate) fn settle(&mut self, position: i64) {
        *self = Self::persisted(position);
    }
}
