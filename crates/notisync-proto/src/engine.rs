//! [`ProtocolEngine`]: the per-channel long-lived outbound request loop, inbound request
//! handler, and reply composer (§4.5).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use notisync_error::HasKind;
use notisync_pending::PendingTable;
use notisync_state::ChannelState;
use notisync_transport::{
    Clock, Reply, ReplyMessage, RequestHandle, RequestMessage, ResponderHandle, ScheduleToken,
    Scheduler, Transport,
};
use notisync_wire::{DataEnvelope, EventName};

use crate::config::EngineConfig;
use crate::err::EngineError;
use crate::jitter::Jitter;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct OutstandingRequest {
    name: EventName,
    handle: Option<RequestHandle>,
}

/// One channel's protocol engine: a long-lived outbound request that re-expresses itself
/// forever while the channel is a listener, and an inbound-request responder while the
/// channel is a producer.
///
/// Grounded in the original source's per-channel `NsyncChannel`/engine pairing, with the back
/// reference it kept to its owning channel replaced by two injected closures (`matcher`,
/// `sink`) rather than a raw pointer, per §9's note that the Engine-to-Channel back-reference
/// should become a handle the destruction order (engine dropped before channel) already makes
/// safe. The engine itself never sees a `Channel`; the channel crate closes the loop.
pub struct ProtocolEngine {
    channel_name: EventName,
    transport: Arc<dyn Transport>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn Jitter>,
    state: Arc<Mutex<ChannelState>>,
    pending: PendingTable,
    config: EngineConfig,
    memory_freshness: Duration,
    matcher: Arc<dyn Fn(&EventName) -> bool + Send + Sync>,
    sink: Arc<dyn Fn(u64, &[EventName]) + Send + Sync>,
    outstanding: Mutex<Option<OutstandingRequest>>,
    reexpress_token: Mutex<Option<ScheduleToken>>,
    responder: Mutex<Option<ResponderHandle>>,
}

impl ProtocolEngine {
    /// Build a new engine. Does not itself start the listener loop or register as a
    /// responder; call [`ProtocolEngine::start_listener`] / [`ProtocolEngine::start_producer`]
    /// for those, matching the roles the owning channel was configured with.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channel_name: EventName,
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
        jitter: Arc<dyn Jitter>,
        state: Arc<Mutex<ChannelState>>,
        config: EngineConfig,
        memory_freshness: Duration,
        matcher: Arc<dyn Fn(&EventName) -> bool + Send + Sync>,
        sink: Arc<dyn Fn(u64, &[EventName]) + Send + Sync>,
    ) -> Arc<Self> {
        Arc::new(ProtocolEngine {
            channel_name,
            transport,
            scheduler: scheduler.clone(),
            clock,
            jitter,
            state,
            pending: PendingTable::new(scheduler),
            config,
            memory_freshness,
            matcher,
            sink,
            outstanding: Mutex::new(None),
            reexpress_token: Mutex::new(None),
            responder: Mutex::new(None),
        })
    }

    /// The name of the channel this engine serves.
    pub fn channel_name(&self) -> &EventName {
        &self.channel_name
    }

    /// True iff an outbound request is currently registered with the transport (§8 invariant
    /// 6: at most one at a time — this engine never has more than one to begin with).
    pub fn has_outstanding(&self) -> bool {
        lock(&self.outstanding).is_some()
    }

    /// The number of inbound requests this engine currently owes a reply to.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Start the listener loop: express the first outbound request now, and keep
    /// re-expressing it forever (§4.5.1).
    pub fn start_listener(self: &Arc<Self>) {
        self.send_request();
    }

    /// Register this channel's name as a responder prefix, so inbound requests reach
    /// [`ProtocolEngine::on_request`] (§4.5.3).
    pub fn start_producer(self: &Arc<Self>) -> Result<(), EngineError> {
        let this = self.clone();
        let handle = self.transport.register_responder(
            self.channel_name.clone(),
            false,
            Box::new(move |req| this.on_request(req)),
        )?;
        *lock(&self.responder) = Some(handle);
        Ok(())
    }

    /// Cancel every timer, release the outstanding request and responder registration, and
    /// clear the pending table (§4.5.6 "Shutdown").
    pub fn shutdown(&self) {
        if let Some(token) = lock(&self.reexpress_token).take() {
            self.scheduler.cancel(token);
        }
        if let Some(outstanding) = lock(&self.outstanding).take() {
            if let Some(handle) = outstanding.handle {
                self.transport.cancel_request(handle);
            }
        }
        self.pending.clear();
        if let Some(handle) = lock(&self.responder).take() {
            self.transport.unregister_responder(handle);
        }
    }

    /// Record a local publication and push the difference to every peer currently owed a
    /// reply (§4.5.5).
    pub fn publish(self: &Arc<Self>, events: Vec<EventName>) -> u64 {
        let now = self.clock.now_ns();
        let ts = lock(&self.state).publish(now, events);

        for entry in self.pending.iter() {
            self.send_diff(&entry.request_name, self.memory_freshness);
            self.pending.erase(&entry.request_name);
        }
        ts
    }

    /// §4.5.1: clean up, export state, express the next long-lived request, and arm both the
    /// periodic self-reschedule and the request's own completion callbacks.
    fn send_request(self: &Arc<Self>) {
        let now = self.clock.now_ns();
        let freshness_ns = self.memory_freshness.as_nanos() as u64;
        lock(&self.state).cleanup(now, freshness_ns);

        let state_bytes = match lock(&self.state).export_state() {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, channel = %self.channel_name, "failed to export state for outbound request");
                return;
            }
        };
        let request_name = self.channel_name.append(state_bytes);

        if let Some(token) = lock(&self.reexpress_token).take() {
            self.scheduler.cancel(token);
        }
        let half_lifetime = self.config.interest_lifetime / 2;
        let delay = half_lifetime + self.jitter.jitter(self.config.jitter_range);
        let reexpress_this = self.clone();
        let reexpress_token = self
            .scheduler
            .schedule(delay, Box::new(move || reexpress_this.send_request()));
        *lock(&self.reexpress_token) = Some(reexpress_token);

        *lock(&self.outstanding) = Some(OutstandingRequest {
            name: request_name.clone(),
            handle: None,
        });

        let reply_this = self.clone();
        let reply_name = request_name.clone();
        let timeout_this = self.clone();
        let timeout_name = request_name.clone();
        let nack_this = self.clone();
        let nack_name = request_name.clone();

        let handle = self.transport.express_request(
            request_name.clone(),
            self.config.interest_lifetime,
            true,
            Box::new(move |reply| reply_this.on_reply(reply_name, reply)),
            Box::new(move || timeout_this.on_timeout(timeout_name)),
            Box::new(move || nack_this.on_nack(nack_name)),
        );

        // A reentrant reply can already have resolved (and replaced) this request by the
        // time `express_request` returns, e.g. when a producer on the same transport answers
        // synchronously; only record the handle if our own request is still the current one.
        let mut outstanding = lock(&self.outstanding);
        if let Some(o) = outstanding.as_mut() {
            if o.name == request_name {
                o.handle = Some(handle);
            }
        }
        drop(outstanding);

        tracing::debug!(name = %request_name, "outbound request expressed");
    }

    /// §4.5.2: reconcile a reply's payload into our state and dispatch every newly reconciled
    /// entry to the application, filtered through the channel's matcher.
    fn on_reply(self: &Arc<Self>, request_name: EventName, reply: ReplyMessage) {
        let components = reply.name.components();
        if components.len() < 2 {
            tracing::warn!(name = %reply.name, "reply name too short to carry a state component pair");
            return;
        }
        let new_state_bytes = components[components.len() - 1].clone();

        let events = match DataEnvelope::decode(&reply.payload) {
            Ok(DataEnvelope::Events(events)) => events,
            Ok(DataEnvelope::Data(_)) => {
                tracing::warn!(name = %reply.name, "discarding a data reply to a reconciliation request");
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, name = %reply.name, "discarding reply with malformed payload");
                return;
            }
        };

        let now = self.clock.now_ns();
        let freshness_ns = self.memory_freshness.as_nanos() as u64;

        let pre_state_bytes = match lock(&self.state).export_state() {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "failed to export pre-reconcile state");
                return;
            }
        };

        let added = {
            let mut state = lock(&self.state);
            match state.reconcile(&new_state_bytes, &events, now, freshness_ns) {
                Ok(added) => added,
                Err(err) => {
                    if err.kind() == notisync_error::ErrorKind::SketchUnresolved {
                        tracing::debug!(name = %reply.name, "reply reconcile left the sketch unresolved this round");
                    } else {
                        tracing::warn!(error = %err, name = %reply.name, "discarding reply: reconcile failed");
                    }
                    return;
                }
            }
        };

        let post_state_bytes = match lock(&self.state).export_state() {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "failed to export post-reconcile state");
                return;
            }
        };

        if post_state_bytes == pre_state_bytes {
            return;
        }

        let taken = {
            let mut outstanding = lock(&self.outstanding);
            let matches = outstanding.as_ref().map(|o| o.name == request_name).unwrap_or(false);
            if matches {
                outstanding.take()
            } else {
                None
            }
        };
        if let Some(o) = taken {
            if let Some(handle) = o.handle {
                self.transport.cancel_request(handle);
            }
            let delay = self.jitter.jitter(self.config.jitter_range);
            let this = self.clone();
            self.scheduler.schedule(delay, Box::new(move || this.send_request()));
        }

        for (ts, events) in added {
            let matched: Vec<EventName> = events.into_iter().filter(|e| (self.matcher)(e)).collect();
            if !matched.is_empty() {
                (self.sink)(ts, &matched);
            }
        }
    }

    fn on_timeout(&self, request_name: EventName) {
        tracing::debug!(name = %request_name, "outbound request timed out");
    }

    fn on_nack(&self, request_name: EventName) {
        tracing::debug!(name = %request_name, "outbound request nacked");
    }

    /// §4.5.3: answer (or park) one inbound request.
    fn on_request(self: &Arc<Self>, request: RequestMessage) {
        let now = self.clock.now_ns();
        let Some(peer_state) = request.name.components().last().cloned() else {
            tracing::warn!(name = %request.name, "request name carries no state component");
            return;
        };

        let local_state = match lock(&self.state).export_state() {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "failed to export local state while answering a request");
                return;
            }
        };

        if peer_state == local_state {
            let lifetime = request.lifetime.min(self.config.interest_lifetime);
            self.pending.insert(request.name, peer_state, now, lifetime);
            return;
        }

        let pushed = self.send_diff(&request.name, self.config.reply_freshness);
        if pushed == 0 {
            let lifetime = request.lifetime.min(self.config.interest_lifetime);
            self.pending.insert(request.name, peer_state, now, lifetime);
        }
    }

    /// §4.5.4: compute and push the local-only difference against `request_name`'s embedded
    /// state, returning the number of entries actually pushed.
    fn send_diff(self: &Arc<Self>, request_name: &EventName, freshness: Duration) -> usize {
        let Some(peer_state) = request_name.components().last() else {
            return 0;
        };

        let now = self.clock.now_ns();
        let freshness_ns = self.memory_freshness.as_nanos() as u64;

        let only_local = {
            let state = lock(&self.state);
            match state.diff(peer_state) {
                Ok((only_local, _only_remote)) => only_local,
                Err(err) => {
                    if err.kind() == notisync_error::ErrorKind::SketchUnresolved {
                        tracing::debug!(name = %request_name, "diff unresolved; nothing to push this round");
                    } else {
                        tracing::warn!(error = %err, name = %request_name, "diff failed; nothing to push this round");
                    }
                    return 0;
                }
            }
        };

        let mut to_push: BTreeMap<u64, Vec<EventName>> = BTreeMap::new();
        {
            let mut state = lock(&self.state);
            for ts in only_local {
                if now.saturating_sub(ts) > freshness_ns {
                    state.erase(ts);
                    continue;
                }
                let events = state.history().get(ts).to_vec();
                if !events.is_empty() {
                    to_push.insert(ts, events);
                }
            }
        }

        if to_push.is_empty() {
            return 0;
        }

        let local_state_bytes = match lock(&self.state).export_state() {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "failed to export state for a reply");
                return 0;
            }
        };

        let pushed = to_push.len();
        let reply_name = request_name.append(local_state_bytes);
        let payload = match DataEnvelope::Events(to_push).encode() {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode a reply payload");
                return 0;
            }
        };
        let reply_freshness = if freshness.is_zero() { self.memory_freshness } else { freshness };
        self.transport.respond(Reply {
            name: reply_name,
            payload,
            freshness: reply_freshness,
        });

        let is_outstanding = lock(&self.outstanding)
            .as_ref()
            .map(|o| &o.name == request_name)
            .unwrap_or(false);
        if is_outstanding {
            let delay = self.jitter.jitter(self.config.jitter_range);
            let this = self.clone();
            self.scheduler.schedule(delay, Box::new(move || this.send_request()));
        }

        pushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jitter::FixedJitter;
    use notisync_transport::{MockClock, MockScheduler, MockTransport};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn name(s: &str) -> EventName {
        EventName::parse(s)
    }

    struct Rig {
        clock: Arc<MockClock>,
        scheduler: Arc<MockScheduler>,
        transport: Arc<MockTransport>,
    }

    fn new_rig() -> Rig {
        let clock = Arc::new(MockClock::new(1_000_000));
        let scheduler = Arc::new(MockScheduler::new(clock.clone()));
        let transport = Arc::new(MockTransport::new(scheduler.clone()));
        Rig { clock, scheduler, transport }
    }

    fn new_engine(
        rig: &Rig,
        channel: &str,
        max_memory: usize,
        memory_freshness: Duration,
        sink: Arc<dyn Fn(u64, &[EventName]) + Send + Sync>,
    ) -> Arc<ProtocolEngine> {
        let state = Arc::new(Mutex::new(ChannelState::new_sketch(max_memory)));
        ProtocolEngine::new(
            name(channel),
            rig.transport.clone(),
            rig.scheduler.clone(),
            rig.clock.clone(),
            Arc::new(FixedJitter(Duration::from_millis(5))),
            state,
            EngineConfig::default(),
            memory_freshness,
            Arc::new(|_: &EventName| true),
            sink,
        )
    }

    #[test]
    fn two_node_convergence() {
        let rig = new_rig();

        let producer = new_engine(&rig, "/s", 16, Duration::from_secs(5), Arc::new(|_, _| {}));
        producer.start_producer().unwrap();
        producer.publish(vec![name("/s/e/a/1")]);

        let received: Arc<Mutex<Vec<(u64, Vec<EventName>)>>> = Arc::new(Mutex::new(Vec::new()));
        let received_cb = received.clone();
        let listener = new_engine(
            &rig,
            "/s",
            16,
            Duration::from_secs(5),
            Arc::new(move |ts, events: &[EventName]| {
                received_cb.lock().unwrap().push((ts, events.to_vec()));
            }),
        );
        listener.start_listener();

        let got = received.lock().unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].1, vec![name("/s/e/a/1")]);

        let producer_bytes = lock(&producer_state(&producer)).export_state().unwrap();
        let listener_bytes = lock(&producer_state(&listener)).export_state().unwrap();
        assert_eq!(producer_bytes, listener_bytes);
    }

    // Test-only: reach into a `ProtocolEngine`'s private state handle via its one public
    // constructor argument path, by reconstructing the same `Arc` it was built with. Since
    // `new_engine` doesn't expose the `Arc<Mutex<ChannelState>>` it built, assert convergence
    // instead through each engine's own `state` field via a crate-internal accessor.
    fn producer_state(engine: &Arc<ProtocolEngine>) -> Arc<Mutex<ChannelState>> {
        engine.state.clone()
    }

    #[test]
    fn filter_matching_drops_unmatched_events() {
        let rig = new_rig();

        let producer = new_engine(&rig, "/s", 16, Duration::from_secs(5), Arc::new(|_, _| {}));
        producer.start_producer().unwrap();
        producer.publish(vec![name("/s/e/a/1"), name("/s/e/b/2")]);

        let received: Arc<Mutex<Vec<(u64, Vec<EventName>)>>> = Arc::new(Mutex::new(Vec::new()));
        let received_cb = received.clone();
        let state = Arc::new(Mutex::new(ChannelState::new_sketch(16)));
        let matcher: Arc<dyn Fn(&EventName) -> bool + Send + Sync> =
            Arc::new(|n: &EventName| n.has_prefix(&name("/s/e/a")));
        let listener = ProtocolEngine::new(
            name("/s"),
            rig.transport.clone(),
            rig.scheduler.clone(),
            rig.clock.clone(),
            Arc::new(FixedJitter(Duration::from_millis(5))),
            state,
            EngineConfig::default(),
            Duration::from_secs(5),
            matcher,
            Arc::new(move |ts, events: &[EventName]| {
                received_cb.lock().unwrap().push((ts, events.to_vec()));
            }),
        );
        listener.start_listener();

        let got = received.lock().unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].1, vec![name("/s/e/a/1")]);
    }

    #[test]
    fn freshness_expiry_withholds_stale_entries() {
        let rig = new_rig();

        let producer = new_engine(&rig, "/s", 16, Duration::from_millis(1), Arc::new(|_, _| {}));
        producer.start_producer().unwrap();
        producer.publish(vec![name("/s/e/a/1")]);

        // Let the producer's own entry go stale before the listener ever asks.
        rig.clock.advance(Duration::from_secs(1).as_nanos() as u64);

        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_cb = call_count.clone();
        let listener = new_engine(
            &rig,
            "/s",
            16,
            Duration::from_millis(1),
            Arc::new(move |_, _| {
                call_count_cb.fetch_add(1, Ordering::SeqCst);
            }),
        );
        listener.start_listener();

        assert_eq!(call_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn at_most_one_outstanding_request() {
        let rig = new_rig();
        let listener = new_engine(&rig, "/s", 16, Duration::from_secs(5), Arc::new(|_, _| {}));
        listener.start_listener();
        assert!(listener.has_outstanding());
        listener.shutdown();
        assert!(!listener.has_outstanding());
    }

    #[test]
    fn list_encoding_converges_like_sketch_encoding() {
        let rig = new_rig();

        let producer_state = Arc::new(Mutex::new(ChannelState::new_list()));
        let producer = ProtocolEngine::new(
            name("/s"),
            rig.transport.clone(),
            rig.scheduler.clone(),
            rig.clock.clone(),
            Arc::new(FixedJitter(Duration::from_millis(5))),
            producer_state,
            EngineConfig::default(),
            Duration::from_secs(5),
            Arc::new(|_: &EventName| true),
            Arc::new(|_, _| {}),
        );
        producer.start_producer().unwrap();
        producer.publish(vec![name("/s/e/a/1")]);

        let received: Arc<Mutex<Vec<(u64, Vec<EventName>)>>> = Arc::new(Mutex::new(Vec::new()));
        let received_cb = received.clone();
        let listener_state = Arc::new(Mutex::new(ChannelState::new_list()));
        let listener = ProtocolEngine::new(
            name("/s"),
            rig.transport.clone(),
            rig.scheduler.clone(),
            rig.clock.clone(),
            Arc::new(FixedJitter(Duration::from_millis(5))),
            listener_state,
            EngineConfig::default(),
            Duration::from_secs(5),
            Arc::new(|_: &EventName| true),
            Arc::new(move |ts, events: &[EventName]| {
                received_cb.lock().unwrap().push((ts, events.to_vec()));
            }),
        );
        listener.start_listener();

        let got = received.lock().unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0], (1_000_000, vec![name("/s/e/a/1")]));
    }

    #[test]
    fn overloaded_sketch_parks_request_without_crashing() {
        let rig = new_rig();

        // A capacity-4 sketch asked to resolve far more distinct keys than it can hold
        // returns `Unresolved`; the engine must treat that as "nothing to push this round"
        // rather than erroring out or looping.
        let producer = new_engine(&rig, "/s", 4, Duration::from_secs(5), Arc::new(|_, _| {}));
        producer.start_producer().unwrap();
        for i in 0..10u64 {
            rig.clock.advance(1);
            producer.publish(vec![name(&format!("/s/e/a/{i}"))]);
        }

        let listener = new_engine(&rig, "/s", 4, Duration::from_secs(5), Arc::new(|_, _| {}));
        listener.start_listener();

        // Overloaded: the producer couldn't resolve a diff, so it parked the request instead
        // of crashing or replying with garbage.
        assert_eq!(producer.pending_len(), 1);
        assert!(listener.has_outstanding());
    }

    #[test]
    fn request_with_no_peer_difference_is_parked_pending() {
        let rig = new_rig();
        let producer = new_engine(&rig, "/s", 16, Duration::from_secs(5), Arc::new(|_, _| {}));
        producer.start_producer().unwrap();

        // A listener whose state already matches the (empty) producer's has nothing to learn;
        // the producer parks the request instead of replying.
        let listener = new_engine(&rig, "/s", 16, Duration::from_secs(5), Arc::new(|_, _| {}));
        listener.start_listener();

        assert_eq!(producer.pending_len(), 1);
        assert!(listener.has_outstanding());
    }
}
