//! [`ChannelState`]: a channel's history paired with its chosen reconciliation encoding.

use std::collections::{BTreeMap, BTreeSet};

use notisync_history::HistoryStore;
use notisync_sketch::Sketch;
use notisync_wire::EventName;

use crate::err::StateError;
use crate::list_state::ListState;

/// An entry is expired once `now - timestamp` exceeds `freshness` (both in nanoseconds).
fn is_expired(now: u64, timestamp: u64, freshness: u64) -> bool {
    now.saturating_sub(timestamp) > freshness
}

/// The encoding a [`ChannelState`] reconciles through; fixed at construction and never
/// changed afterward.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Encoding {
    /// Summarize the timestamp key set with an invertible Bloom filter.
    Sketch(Sketch),
    /// Carry the timestamp key set as a plain ordered list.
    List(ListState),
}

/// A channel's reconciliation state: its event history, kept in lock-step with a sketch or
/// plain-list summary of the same timestamp keys.
///
/// Grounded in the original `State` class, which pairs `m_NotificationHistory` with either
/// `m_ibft` or (when `m_isList`) a plain iteration of the history map itself; here the two
/// encodings share one `Encoding` enum instead of an `if (m_isList)` branch threaded through
/// every method.
#[derive(Debug, Clone)]
pub struct ChannelState {
    history: HistoryStore,
    encoding: Encoding,
}

impl ChannelState {
    /// A new, empty state using the sketch encoding, sized for `max_memory` keys.
    pub fn new_sketch(max_memory: usize) -> Self {
        ChannelState {
            history: HistoryStore::new(),
            encoding: Encoding::Sketch(Sketch::new(max_memory)),
        }
    }

    /// A new, empty state using the plain-list encoding.
    pub fn new_list() -> Self {
        ChannelState {
            history: HistoryStore::new(),
            encoding: Encoding::List(ListState::new()),
        }
    }

    /// This state's event history.
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// This state's encoding.
    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    fn encoding_insert(&mut self, ts: u64) {
        match &mut self.encoding {
            Encoding::Sketch(s) => {
                let value = s.value_for_key(ts);
                s.insert(ts, &value);
            }
            Encoding::List(l) => l.insert(ts),
        }
    }

    fn encoding_erase(&mut self, ts: u64) {
        match &mut self.encoding {
            Encoding::Sketch(s) => {
                let value = s.value_for_key(ts);
                s.erase(ts, &value);
            }
            Encoding::List(l) => l.erase(ts),
        }
    }

    /// Record a local publication at `now` (a monotonic-nanosecond reading supplied by the
    /// caller), returning the timestamp assigned.
    pub fn publish(&mut self, now: u64, events: Vec<EventName>) -> u64 {
        self.history.append(now, events);
        self.encoding_insert(now);
        now
    }

    /// Record a peer's entry at `ts`. A no-op if `ts` is already present, so redelivering the
    /// same reconciled entry never double-counts it in the encoding.
    pub fn add_remote(&mut self, ts: u64, events: Vec<EventName>) {
        if self.history.contains(ts) {
            return;
        }
        self.history.append(ts, events);
        self.encoding_insert(ts);
    }

    /// Remove the entry at `ts` from both the history and the encoding.
    pub fn erase(&mut self, ts: u64) {
        self.history.erase(ts);
        self.encoding_erase(ts);
    }

    /// Remove every entry older than `freshness` (nanoseconds) as of `now`, from both the
    /// history and the encoding.
    pub fn cleanup(&mut self, now: u64, freshness: u64) {
        let expired = self.history.cleanup(now, freshness);
        for ts in expired {
            self.encoding_erase(ts);
        }
    }

    /// Encode and bzip2-compress the current state for transmission.
    pub fn export_state(&self) -> Result<Vec<u8>, StateError> {
        let raw = match &self.encoding {
            Encoding::Sketch(s) => s.encode()?,
            Encoding::List(l) => notisync_wire::encode_list_table(l.timestamps().iter().copied())?,
        };
        Ok(notisync_wire::compress(&raw))
    }

    /// Decode a peer's exported state and compute the symmetric difference against this
    /// state's timestamp key set: `(only_local, only_remote)`.
    pub fn diff(&self, remote_state_bytes: &[u8]) -> Result<(BTreeSet<u64>, BTreeSet<u64>), StateError> {
        let remote_raw = notisync_wire::decompress(remote_state_bytes)?;
        match &self.encoding {
            Encoding::Sketch(local) => {
                let remote = Sketch::decode(&remote_raw, local.params())?;
                let diff = local.subtract(&remote)?;
                let (positive, negative) = diff.list_entries()?;
                let only_local = positive.into_iter().map(|(k, _)| k).collect();
                let only_remote = negative.into_iter().map(|(k, _)| k).collect();
                Ok((only_local, only_remote))
            }
            Encoding::List(local) => {
                let remote_set: BTreeSet<u64> =
                    notisync_wire::decode_list_table(&remote_raw)?.into_iter().collect();
                let only_local = local.timestamps().difference(&remote_set).copied().collect();
                let only_remote = remote_set.difference(local.timestamps()).copied().collect();
                Ok((only_local, only_remote))
            }
        }
    }

    /// Diff against a peer's exported state, then fold in every non-expired `only_remote`
    /// entry using `remote_data` to supply its events. Returns the entries actually added, in
    /// timestamp order, so a caller (the protocol engine) can dispatch each to its application
    /// callback without recomputing the diff.
    pub fn reconcile(
        &mut self,
        remote_state_bytes: &[u8],
        remote_data: &BTreeMap<u64, Vec<EventName>>,
        now: u64,
        freshness: u64,
    ) -> Result<Vec<(u64, Vec<EventName>)>, StateError> {
        let (_, only_remote) = self.diff(remote_state_bytes)?;
        let mut added = Vec::new();
        for ts in only_remote {
            if is_expired(now, ts, freshness) {
                continue;
            }
            let events = remote_data.get(&ts).cloned().unwrap_or_default();
            self.add_remote(ts, events.clone());
            added.push((ts, events));
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> EventName {
        EventName::parse(s)
    }

    #[test]
    fn publish_then_history_and_encoding_agree() {
        let mut s = ChannelState::new_sketch(16);
        let ts = s.publish(1_000, vec![name("/a")]);
        assert_eq!(s.history().get(ts), &[name("/a")]);
        if let Encoding::Sketch(sketch) = s.encoding() {
            assert_ne!(sketch.get(ts), notisync_sketch::GetOutcome::Absent);
        } else {
            unreachable!();
        }
    }

    #[test]
    fn cleanup_keeps_history_and_encoding_in_lockstep() {
        let mut s = ChannelState::new_sketch(16);
        s.publish(0, vec![name("/old")]);
        s.publish(900, vec![name("/fresh")]);
        s.cleanup(1_000, 500);
        assert!(!s.history().contains(0));
        assert!(s.history().contains(900));
        if let Encoding::Sketch(sketch) = s.encoding() {
            assert_eq!(sketch.get(0), notisync_sketch::GetOutcome::Absent);
            assert_ne!(sketch.get(900), notisync_sketch::GetOutcome::Absent);
        }
    }

    #[test]
    fn sketch_diff_and_reconcile_roundtrip() {
        let mut local = ChannelState::new_sketch(32);
        local.publish(1, vec![name("/local-only")]);

        let mut remote = ChannelState::new_sketch(32);
        remote.publish(2, vec![name("/remote-only")]);
        let remote_data: BTreeMap<u64, Vec<EventName>> =
            [(2_u64, vec![name("/remote-only")])].into_iter().collect();

        let remote_bytes = remote.export_state().unwrap();
        let (only_local, only_remote) = local.diff(&remote_bytes).unwrap();
        assert_eq!(only_local, [1_u64].into_iter().collect());
        assert_eq!(only_remote, [2_u64].into_iter().collect());

        let added = local
            .reconcile(&remote_bytes, &remote_data, 1_000_000, 1_000_000_000)
            .unwrap();
        assert_eq!(added, vec![(2_u64, vec![name("/remote-only")])]);
        assert!(local.history().contains(2));
        let (_, only_remote_after) = local.diff(&remote_bytes).unwrap();
        assert!(only_remote_after.is_empty());
    }

    #[test]
    fn three_way_merge_reconciles_both_directions() {
        let mut a = ChannelState::new_sketch(32);
        a.publish(1, vec![name("/a/1")]);
        let mut b = ChannelState::new_sketch(32);
        b.publish(2, vec![name("/b/2")]);

        let a_bytes = a.export_state().unwrap();
        let b_bytes = b.export_state().unwrap();
        let a_data: BTreeMap<u64, Vec<EventName>> =
            [(1_u64, vec![name("/a/1")])].into_iter().collect();
        let b_data: BTreeMap<u64, Vec<EventName>> =
            [(2_u64, vec![name("/b/2")])].into_iter().collect();

        let b_added = b.reconcile(&a_bytes, &a_data, 1_000_000, 1_000_000_000).unwrap();
        assert_eq!(b_added, vec![(1_u64, vec![name("/a/1")])]);
        let a_added = a.reconcile(&b_bytes, &b_data, 1_000_000, 1_000_000_000).unwrap();
        assert_eq!(a_added, vec![(2_u64, vec![name("/b/2")])]);

        assert!(a.history().contains(1) && a.history().contains(2));
        assert!(b.history().contains(1) && b.history().contains(2));
        assert_eq!(a.export_state().unwrap(), b.export_state().unwrap());
    }

    #[test]
    fn list_diff() {
        let mut local = ChannelState::new_list();
        local.publish(1, vec![name("/a")]);
        let mut remote = ChannelState::new_list();
        remote.publish(2, vec![name("/b")]);

        let remote_bytes = remote.export_state().unwrap();
        let (only_local, only_remote) = local.diff(&remote_bytes).unwrap();
        assert_eq!(only_local, [1_u64].into_iter().collect());
        assert_eq!(only_remote, [2_u64].into_iter().collect());
    }

    #[test]
    fn add_remote_is_idempotent() {
        let mut s = ChannelState::new_list();
        s.add_remote(5, vec![name("/a")]);
        s.add_remote(5, vec![name("/b")]);
        assert_eq!(s.history().get(5), &[name("/a")]);
    }

    #[test]
    fn reconcile_skips_expired_entries() {
        let mut local = ChannelState::new_list();
        let mut remote = ChannelState::new_list();
        remote.publish(0, vec![name("/stale")]);
        let remote_data: BTreeMap<u64, Vec<EventName>> =
            [(0_u64, vec![name("/stale")])].into_iter().collect();

        let remote_bytes = remote.export_state().unwrap();
        let added = local.reconcile(&remote_bytes, &remote_data, 10_000, 500).unwrap();
        assert!(added.is_empty());
        assert!(!local.history().contains(0));
    }
}
