//! [`ListState`]: the plain-set alternative to the sketch encoding.

use std::collections::BTreeSet;

/// An ordered set of timestamps, kept in lock-step with a channel's history.
///
/// Carries no checksum of its own; a diff against a peer's list is a plain set difference
/// rather than a decode. Grounded in the original's `m_isList` branch of `State`, which skips
/// the IBF entirely and works directly off `m_NotificationHistory`'s key set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListState {
    timestamps: BTreeSet<u64>,
}

impl ListState {
    /// An empty list state.
    pub fn new() -> Self {
        ListState::default()
    }

    /// Insert `ts`.
    pub fn insert(&mut self, ts: u64) {
        self.timestamps.insert(ts);
    }

    /// Remove `ts`.
    pub fn erase(&mut self, ts: u64) {
        self.timestamps.remove(&ts);
    }

    /// True iff `ts` is present.
    pub fn contains(&self, ts: u64) -> bool {
        self.timestamps.contains(&ts)
    }

    /// The full set of timestamps currently held.
    pub fn timestamps(&self) -> &BTreeSet<u64> {
        &self.timestamps
    }
}
