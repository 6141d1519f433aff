//! [`PendingTable`]: an associative container of unsatisfied inbound requests, keyed by
//! request name with total ordering on insertion.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use notisync_transport::{ScheduleToken, Scheduler};
use notisync_wire::EventName;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One inbound request we have not yet been able to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// The request's full name, as received.
    pub request_name: EventName,
    /// The trailing state component the peer advertised in `request_name`.
    pub peer_state_bytes: Vec<u8>,
    /// When this request arrived, in nanoseconds.
    pub arrived_at: u64,
    /// When this entry expires if nothing satisfies it first, in nanoseconds.
    pub expires_at: u64,
}

struct Entry {
    request: PendingRequest,
    expiry_token: ScheduleToken,
}

/// A table of unsatisfied inbound requests. At most one entry per request name; every entry
/// carries a live expiry timer arming its own removal; on drop, every remaining timer is
/// cancelled.
pub struct PendingTable {
    scheduler: Arc<dyn Scheduler>,
    entries: Arc<Mutex<BTreeMap<EventName, Entry>>>,
}

impl PendingTable {
    /// A table whose expiries are armed through `scheduler`.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        PendingTable {
            scheduler,
            entries: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Insert (or replace) the entry for `request_name`, arming expiry at `now + lifetime`.
    ///
    /// Replacing an existing entry for the same name cancels its prior expiry timer first, so
    /// at most one timer per name is ever live.
    pub fn insert(
        &self,
        request_name: EventName,
        peer_state_bytes: Vec<u8>,
        now: u64,
        lifetime: Duration,
    ) {
        self.erase(&request_name);

        let entries_ref = self.entries.clone();
        let expiry_key = request_name.clone();
        let expiry_token = self.scheduler.schedule(
            lifetime,
            Box::new(move || {
                if lock(&entries_ref).remove(&expiry_key).is_some() {
                    tracing::debug!(name = %expiry_key, "pending request expired");
                }
            }),
        );

        let expires_at = now.saturating_add(lifetime.as_nanos() as u64);
        tracing::debug!(name = %request_name, expires_at, "pending request inserted");
        let request = PendingRequest {
            request_name: request_name.clone(),
            peer_state_bytes,
            arrived_at: now,
            expires_at,
        };
        lock(&self.entries).insert(request_name, Entry { request, expiry_token });
    }

    /// Cancel the expiry timer for `request_name` and remove its entry, if present.
    pub fn erase(&self, request_name: &EventName) {
        let removed = lock(&self.entries).remove(request_name);
        if let Some(entry) = removed {
            self.scheduler.cancel(entry.expiry_token);
        }
    }

    /// True iff an entry for `request_name` is present.
    pub fn has(&self, request_name: &EventName) -> bool {
        lock(&self.entries).contains_key(request_name)
    }

    /// A snapshot of every pending entry, in request-name order.
    pub fn iter(&self) -> Vec<PendingRequest> {
        lock(&self.entries).values().map(|e| e.request.clone()).collect()
    }

    /// Cancel every expiry timer and remove every entry.
    pub fn clear(&self) {
        let tokens: Vec<ScheduleToken> = {
            let mut entries = lock(&self.entries);
            let tokens = entries.values().map(|e| e.expiry_token).collect();
            entries.clear();
            tokens
        };
        for token in tokens {
            self.scheduler.cancel(token);
        }
    }

    /// Number of entries currently pending.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// True iff no entries are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for PendingTable {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notisync_transport::{MockClock, MockScheduler};

    fn new_table() -> (Arc<MockClock>, Arc<MockScheduler>, PendingTable) {
        let clock = Arc::new(MockClock::new(0));
        let scheduler = Arc::new(MockScheduler::new(clock.clone()));
        let table = PendingTable::new(scheduler.clone());
        (clock, scheduler, table)
    }

    #[test]
    fn insert_then_has() {
        let (_, _, table) = new_table();
        let name = EventName::parse("/chan/state1");
        table.insert(name.clone(), vec![1, 2, 3], 0, Duration::from_secs(1));
        assert!(table.has(&name));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn reinsert_replaces_and_recancels_old_timer() {
        let (_, scheduler, table) = new_table();
        let name = EventName::parse("/chan/state1");
        table.insert(name.clone(), vec![1], 0, Duration::from_secs(1));
        table.insert(name.clone(), vec![2], 0, Duration::from_secs(10));

        // The first timer (1s) must not fire the entry out from under the second insert.
        scheduler.advance_by(Duration::from_secs(2).as_nanos() as u64);
        assert!(table.has(&name));
        assert_eq!(table.iter()[0].peer_state_bytes, vec![2]);
    }

    #[test]
    fn erase_cancels_expiry() {
        let (_, _, table) = new_table();
        let name = EventName::parse("/chan/state1");
        table.insert(name.clone(), vec![1], 0, Duration::from_secs(1));
        table.erase(&name);
        assert!(!table.has(&name));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn entry_expires_on_its_own() {
        let (_, scheduler, table) = new_table();
        let name = EventName::parse("/chan/state1");
        table.insert(name.clone(), vec![1], 0, Duration::from_secs(1));
        scheduler.advance_by(Duration::from_millis(500).as_nanos() as u64);
        assert!(table.has(&name));
        scheduler.advance_by(Duration::from_secs(1).as_nanos() as u64);
        assert!(!table.has(&name));
    }

    #[test]
    fn clear_cancels_every_timer() {
        let (_, scheduler, table) = new_table();
        table.insert(
            EventName::parse("/chan/a"),
            vec![],
            0,
            Duration::from_secs(1),
        );
        table.insert(
            EventName::parse("/chan/b"),
            vec![],
            0,
            Duration::from_secs(1),
        );
        assert_eq!(table.len(), 2);
        table.clear();
        assert_eq!(table.len(), 0);
        // Advancing past the original expiry must not panic or resurrect anything.
        scheduler.advance_by(Duration::from_secs(2).as_nanos() as u64);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn drop_cancels_every_timer() {
        let clock = Arc::new(MockClock::new(0));
        let scheduler = Arc::new(MockScheduler::new(clock.clone()));
        {
            let table = PendingTable::new(scheduler.clone());
            table.insert(
                EventName::parse("/chan/a"),
                vec![],
                0,
                Duration::from_secs(1),
            );
        }
        // If the entry's closure still ran after drop, this would not panic either way since
        // the closure only touches its own `Arc` clone of the map, but we assert no leftover
        // bookkeeping requires it to run at all.
        scheduler.advance_by(Duration::from_secs(2).as_nanos() as u64);
    }
}
