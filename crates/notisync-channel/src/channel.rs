//! [`Channel`]: one Protocol Engine, one reconciliation state, and one filter set, bound to a
//! channel name (§4.6).

use std::sync::{Arc, Mutex};

use notisync_proto::{Jitter, ProtocolEngine};
use notisync_state::ChannelState;
use notisync_transport::{Clock, Scheduler, Transport};
use notisync_wire::EventName;

use crate::config::{ChannelConfig, StateEncoding};
use crate::err::ChannelError;
use crate::filter::FilterSet;

/// A notification channel: the application-facing unit this crate exposes. Exclusively owns
/// its [`notisync_state::ChannelState`], its [`ProtocolEngine`], and its [`FilterSet`]; the
/// engine only holds a shared (not exclusive) handle to the state and a filter-matching
/// closure, never a pointer back to this struct, so there is no lifetime cycle for the
/// destruction order note in §9 to resolve.
///
/// Grounded in the original source's `NsyncChannel`, which aggregates one `State`, one engine,
/// and one filter list per configured channel name.
pub struct Channel {
    config: ChannelConfig,
    state: Arc<Mutex<ChannelState>>,
    engine: Arc<ProtocolEngine>,
    filters: Arc<FilterSet>,
}

impl Channel {
    /// Build a channel from a validated config. Does not start the engine; call
    /// [`Channel::init`] once the transport is ready to carry traffic.
    ///
    /// `sink` is the application callback invoked with `(timestamp, matched_events)` for every
    /// entry this channel reconciles in from a peer, already filtered through this channel's
    /// rules (§4.5.2 step 6).
    pub fn new(
        config: ChannelConfig,
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
        jitter: Arc<dyn Jitter>,
        sink: Arc<dyn Fn(u64, &[EventName]) + Send + Sync>,
    ) -> Self {
        let state = match config.state_encoding {
            StateEncoding::Ibf => ChannelState::new_sketch(config.max_memory.get()),
            StateEncoding::List => ChannelState::new_list(),
        };
        let state = Arc::new(Mutex::new(state));
        let filters = Arc::new(FilterSet::new(config.filters.clone()));

        let matcher_filters = filters.clone();
        let matcher: Arc<dyn Fn(&EventName) -> bool + Send + Sync> =
            Arc::new(move |name: &EventName| matcher_filters.matches(name));

        let engine = ProtocolEngine::new(
            config.name.clone(),
            transport,
            scheduler,
            clock,
            jitter,
            state.clone(),
            config.engine_config(),
            config.memory_freshness,
            matcher,
            sink,
        );

        tracing::debug!(
            name = %config.name,
            is_listener = config.is_listener,
            is_producer = config.is_producer,
            "channel created"
        );

        Channel {
            config,
            state,
            engine,
            filters,
        }
    }

    /// Start the engine in whichever roles this channel was configured with: register as a
    /// producer responder, start the listener loop, or both.
    pub fn init(&self) -> Result<(), ChannelError> {
        tracing::debug!(name = %self.config.name, "initializing channel");
        if self.config.is_producer {
            self.engine.start_producer()?;
            tracing::debug!(name = %self.config.name, "registered as producer responder");
        }
        if self.config.is_listener {
            self.engine.start_listener();
            tracing::debug!(name = %self.config.name, "started listener loop");
        }
        Ok(())
    }

    /// Stop the engine: cancel every timer, release the outstanding request and responder
    /// registration, and clear the pending table.
    pub fn shutdown(&self) {
        tracing::debug!(name = %self.config.name, "channel shutting down");
        self.engine.shutdown();
    }

    /// Publish a new event at this channel, returning the timestamp it was assigned.
    pub fn publish(&self, events: Vec<EventName>) -> u64 {
        self.engine.publish(events)
    }

    /// True iff `name` satisfies this channel's filter set (empty set matches everything).
    pub fn matches(&self, name: &EventName) -> bool {
        self.filters.matches(name)
    }

    /// This channel's name.
    pub fn name(&self) -> &EventName {
        &self.config.name
    }

    /// This channel's configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// This channel's reconciliation state, for callers that need read access outside the
    /// engine's own publish/reconcile path (e.g. inspecting the exported state bytes in
    /// tests).
    pub fn state(&self) -> &Arc<Mutex<ChannelState>> {
        &self.state
    }

    /// True iff this channel currently has an outbound request registered with the transport.
    pub fn has_outstanding(&self) -> bool {
        self.engine.has_outstanding()
    }

    /// The number of inbound requests this channel currently owes a reply to.
    pub fn pending_len(&self) -> usize {
        self.engine.pending_len()
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        tracing::debug!(name = %self.config.name, "channel dropped");
        self.engine.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use notisync_proto::FixedJitter;
    use notisync_transport::{MockClock, MockScheduler, MockTransport};
    use std::num::NonZeroUsize;
    use std::time::Duration;

    fn name(s: &str) -> EventName {
        EventName::parse(s)
    }

    struct Rig {
        transport: Arc<MockTransport>,
        scheduler: Arc<MockScheduler>,
        clock: Arc<MockClock>,
    }

    fn new_rig() -> Rig {
        let clock = Arc::new(MockClock::new(1_000_000));
        let scheduler = Arc::new(MockScheduler::new(clock.clone()));
        let transport = Arc::new(MockTransport::new(scheduler.clone()));
        Rig { transport, scheduler, clock }
    }

    fn new_channel(rig: &Rig, config: ChannelConfig, sink: Arc<dyn Fn(u64, &[EventName]) + Send + Sync>) -> Channel {
        Channel::new(
            config,
            rig.transport.clone(),
            rig.scheduler.clone(),
            rig.clock.clone(),
            Arc::new(FixedJitter(Duration::from_millis(5))),
            sink,
        )
    }

    #[test]
    fn producer_listener_pair_converges() {
        let rig = new_rig();

        let producer_cfg = ChannelConfig::new(
            name("/s"),
            NonZeroUsize::new(16).unwrap(),
            Duration::from_secs(5),
            false,
            true,
            StateEncoding::Ibf,
            vec![],
        )
        .unwrap();
        let producer = new_channel(&rig, producer_cfg, Arc::new(|_, _| {}));
        producer.init().unwrap();
        producer.publish(vec![name("/s/e/a/1")]);

        let received: Arc<Mutex<Vec<(u64, Vec<EventName>)>>> = Arc::new(Mutex::new(Vec::new()));
        let received_cb = received.clone();
        let listener_cfg = ChannelConfig::new(
            name("/s"),
            NonZeroUsize::new(16).unwrap(),
            Duration::from_secs(5),
            true,
            false,
            StateEncoding::Ibf,
            vec![Filter::NamePrefix(name("/s"))],
        )
        .unwrap();
        let listener = new_channel(
            &rig,
            listener_cfg,
            Arc::new(move |ts, events: &[EventName]| {
                received_cb.lock().unwrap().push((ts, events.to_vec()));
            }),
        );
        listener.init().unwrap();

        let got = received.lock().unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].1, vec![name("/s/e/a/1")]);
    }

    #[test]
    fn shutdown_releases_outstanding_request() {
        let rig = new_rig();
        let cfg = ChannelConfig::new(
            name("/s"),
            NonZeroUsize::new(16).unwrap(),
            Duration::from_secs(5),
            true,
            false,
            StateEncoding::List,
            vec![Filter::NamePrefix(name("/s"))],
        )
        .unwrap();
        let channel = new_channel(&rig, cfg, Arc::new(|_, _| {}));
        channel.init().unwrap();
        assert!(channel.has_outstanding());
        channel.shutdown();
        assert!(!channel.has_outstanding());
    }

    #[test]
    fn matches_delegates_to_filter_set() {
        let rig = new_rig();
        let cfg = ChannelConfig::new(
            name("/s"),
            NonZeroUsize::new(16).unwrap(),
            Duration::from_secs(5),
            true,
            false,
            StateEncoding::List,
            vec![Filter::NamePrefix(name("/s/e/a"))],
        )
        .unwrap();
        let channel = new_channel(&rig, cfg, Arc::new(|_, _| {}));
        assert!(channel.matches(&name("/s/e/a/1")));
        assert!(!channel.matches(&name("/s/e/b/2")));
    }
}
