//! Deterministic in-memory test doubles for [`crate::Clock`], [`crate::Scheduler`], and
//! [`crate::Transport`].
//!
//! Grounded in the teacher crate's `FakeChannelFactory`/`FakeChannel` test doubles and its
//! `test_with_one_runtime!`-driven deterministic tests: a virtual clock that only advances
//! when told to, and a transport that dispatches requests to in-process responders
//! synchronously instead of over a real network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use notisync_wire::EventName;

use crate::clock::Clock;
use crate::err::TransportError;
use crate::message::{Reply, ReplyMessage, RequestMessage};
use crate::scheduler::{ScheduleToken, Scheduler};
use crate::transport::{RequestHandle, ResponderHandle, Transport};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A settable virtual clock; time only passes when [`MockClock::set`] or
/// [`MockClock::advance`] is called.
#[derive(Debug, Default)]
pub struct MockClock {
    now_ns: AtomicU64,
}

impl MockClock {
    /// A clock starting at `start_ns`.
    pub fn new(start_ns: u64) -> Self {
        MockClock {
            now_ns: AtomicU64::new(start_ns),
        }
    }

    /// Set the current time to exactly `now_ns`.
    pub fn set(&self, now_ns: u64) {
        self.now_ns.store(now_ns, Ordering::SeqCst);
    }

    /// Advance the current time by `delta_ns`.
    pub fn advance(&self, delta_ns: u64) {
        self.now_ns.fetch_add(delta_ns, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ns(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
}

/// A scheduler whose tasks only run when the driving test advances [`MockClock`] past their
/// fire time.
pub struct MockScheduler {
    clock: Arc<MockClock>,
    next_token: AtomicU64,
    pending: Mutex<std::collections::BTreeMap<u64, Vec<(ScheduleToken, Box<dyn FnOnce() + Send>)>>>,
    cancelled: Mutex<std::collections::HashSet<ScheduleToken>>,
}

impl MockScheduler {
    /// A scheduler driven by `clock`.
    pub fn new(clock: Arc<MockClock>) -> Self {
        MockScheduler {
            clock,
            next_token: AtomicU64::new(0),
            pending: Mutex::new(std::collections::BTreeMap::new()),
            cancelled: Mutex::new(std::collections::HashSet::new()),
        }
    }

    /// Set the clock to `now_ns` and run every task now due.
    pub fn advance_to(&self, now_ns: u64) {
        self.clock.set(now_ns);
        self.run_due();
    }

    /// Advance the clock by `delta_ns` and run every task now due.
    pub fn advance_by(&self, delta_ns: u64) {
        self.advance_to(self.clock.now_ns().saturating_add(delta_ns));
    }

    fn run_due(&self) {
        loop {
            let now = self.clock.now_ns();
            let due_key = lock(&self.pending).keys().next().copied().filter(|k| *k <= now);
            let Some(key) = due_key else { break };
            let tasks = lock(&self.pending).remove(&key).unwrap_or_default();
            for (token, task) in tasks {
                if lock(&self.cancelled).remove(&token) {
                    continue;
                }
                task();
            }
        }
    }
}

impl Scheduler for MockScheduler {
    fn schedule(&self, after: Duration, task: Box<dyn FnOnce() + Send>) -> ScheduleToken {
        let fire_ns = self.clock.now_ns().saturating_add(after.as_nanos() as u64);
        let token = ScheduleToken(self.next_token.fetch_add(1, Ordering::SeqCst));
        lock(&self.pending).entry(fire_ns).or_default().push((token, task));
        token
    }

    fn cancel(&self, token: ScheduleToken) {
        lock(&self.cancelled).insert(token);
    }
}

struct Outstanding {
    name: EventName,
    on_reply: Box<dyn FnOnce(ReplyMessage) + Send>,
    #[allow(dead_code)]
    on_nack: Box<dyn FnOnce() + Send>,
    timeout_token: ScheduleToken,
}

type ResponderEntry = (EventName, bool, Arc<dyn Fn(RequestMessage) + Send + Sync>);

/// An in-memory transport: requests dispatch synchronously to any registered responder whose
/// prefix matches, and replies are matched back to the outstanding request whose name is a
/// prefix of the reply's name (§6.2's request/reply name relationship).
pub struct MockTransport {
    scheduler: Arc<MockScheduler>,
    next_handle: AtomicU64,
    next_responder: AtomicU64,
    outstanding: Arc<Mutex<HashMap<u64, Outstanding>>>,
    responders: Mutex<HashMap<u64, ResponderEntry>>,
}

impl MockTransport {
    /// A transport driven by `scheduler`.
    pub fn new(scheduler: Arc<MockScheduler>) -> Self {
        MockTransport {
            scheduler,
            next_handle: AtomicU64::new(0),
            next_responder: AtomicU64::new(0),
            outstanding: Arc::new(Mutex::new(HashMap::new())),
            responders: Mutex::new(HashMap::new()),
        }
    }

    /// Number of requests still awaiting a reply, timeout, or cancellation.
    pub fn outstanding_count(&self) -> usize {
        lock(&self.outstanding).len()
    }

    /// Force the `on_nack` callback of an outstanding request, as if the network refused it.
    /// Test-only: a real transport surfaces nacks on its own schedule.
    pub fn force_nack(&self, handle: RequestHandle) {
        let entry = lock(&self.outstanding).remove(&handle.0);
        if let Some(entry) = entry {
            self.scheduler.cancel(entry.timeout_token);
            (entry.on_nack)();
        }
    }

    fn dispatch_to_responder(&self, name: EventName, lifetime: Duration) {
        let responder = lock(&self.responders)
            .values()
            .find(|(prefix, _, _)| name.has_prefix(prefix))
            .map(|(_, _, cb)| cb.clone());
        if let Some(cb) = responder {
            cb(RequestMessage { name, lifetime });
        }
    }
}

impl Transport for MockTransport {
    fn express_request(
        &self,
        name: EventName,
        lifetime: Duration,
        _must_be_fresh: bool,
        on_reply: Box<dyn FnOnce(ReplyMessage) + Send>,
        on_timeout: Box<dyn FnOnce() + Send>,
        on_nack: Box<dyn FnOnce() + Send>,
    ) -> RequestHandle {
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);

        let outstanding_ref = self.outstanding.clone();
        let token = self.scheduler.schedule(
            lifetime,
            Box::new(move || {
                let fired = lock(&outstanding_ref).remove(&id).is_some();
                if fired {
                    on_timeout();
                }
            }),
        );

        lock(&self.outstanding).insert(
            id,
            Outstanding {
                name: name.clone(),
                on_reply,
                on_nack,
                timeout_token: token,
            },
        );

        self.dispatch_to_responder(name, lifetime);

        RequestHandle(id)
    }

    fn cancel_request(&self, handle: RequestHandle) {
        let removed = lock(&self.outstanding).remove(&handle.0);
        if let Some(entry) = removed {
            self.scheduler.cancel(entry.timeout_token);
        }
    }

    fn register_responder(
        &self,
        prefix: EventName,
        loopback_allowed: bool,
        on_request: Box<dyn Fn(RequestMessage) + Send + Sync>,
    ) -> Result<ResponderHandle, TransportError> {
        let mut responders = lock(&self.responders);
        if responders.values().any(|(existing, ..)| *existing == prefix) {
            return Err(TransportError::RegistrationFailed {
                prefix: prefix.to_string(),
            });
        }
        let id = self.next_responder.fetch_add(1, Ordering::SeqCst);
        responders.insert(id, (prefix, loopback_allowed, Arc::from(on_request)));
        Ok(ResponderHandle(id))
    }

    fn unregister_responder(&self, handle: ResponderHandle) {
        lock(&self.responders).remove(&handle.0);
    }

    fn respond(&self, reply: Reply) {
        let matched_id = lock(&self.outstanding)
            .iter()
            .find(|(_, o)| reply.name.has_prefix(&o.name))
            .map(|(id, _)| *id);
        let Some(id) = matched_id else {
            tracing::debug!(name = %reply.name, "reply matched no outstanding request");
            return;
        };
        let entry = lock(&self.outstanding).remove(&id);
        if let Some(entry) = entry {
            self.scheduler.cancel(entry.timeout_token);
            (entry.on_reply)(ReplyMessage {
                name: reply.name,
                payload: reply.payload,
            });
        }
    }
}
