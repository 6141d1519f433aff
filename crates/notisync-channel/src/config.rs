//! [`ChannelConfig`]: the §6.5 key/value configuration schema, represented as a validated,
//! strongly typed struct (§2A "Typed configuration").

use std::num::NonZeroUsize;
use std::time::Duration;

use notisync_proto::EngineConfig;
use notisync_wire::EventName;

use crate::err::ConfigError;
use crate::filter::Filter;

/// Which reconciliation encoding a channel's state uses (§4.6 `stateEncoding`).
///
/// The on-disk schema (§6.5 `stateType`) also names a third value, `TUPLE`; this crate has no
/// encoding of that name (neither the teacher's nor the pack's sketch/list pair defines one),
/// so a config layer that parses the on-disk schema has no variant of this enum to parse it
/// into and should reject it before a [`ChannelConfig`] is ever constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEncoding {
    /// Summarize the timestamp key set with an invertible Bloom filter.
    Ibf,
    /// Carry the timestamp key set as a plain ordered list.
    List,
}

/// A channel's validated configuration: one-to-one with the §6.5 schema, plus the engine
/// timing constants a complete channel needs (§2A).
///
/// Parsing an on-disk config file into this struct is the excluded "configuration file
/// parsing" collaborator (§1); this struct is the validated, in-memory result such a parser
/// would produce.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// This channel's hierarchical name.
    pub name: EventName,
    /// The sketch's configured key capacity (`maxMemorySize`).
    pub max_memory: NonZeroUsize,
    /// How long an entry stays eligible for delivery and reconciliation (`memoryFreshness`).
    pub memory_freshness: Duration,
    /// How long an outbound request stays registered before timing out (`lifetime`).
    pub interest_lifetime: Duration,
    /// The freshness asked of downstream caches on a reply, absent an explicit override.
    pub reply_freshness: Duration,
    /// The `(min, max)` range a re-expression delay is drawn uniformly from.
    pub jitter_range: (Duration, Duration),
    /// Whether this channel holds a long-lived outbound request (`isListener`).
    pub is_listener: bool,
    /// Whether this channel answers inbound requests (`isProvider`).
    pub is_producer: bool,
    /// Which reconciliation encoding the channel's state uses (`stateType`).
    pub state_encoding: StateEncoding,
    /// The listener's event filter rules, in order. Ignored when `is_listener` is false.
    pub filters: Vec<Filter>,
}

impl ChannelConfig {
    /// Validate and build a config, running the §4.6 create-time checks: at least one of
    /// `is_listener`/`is_producer`; a listener carries at least one filter.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: EventName,
        max_memory: NonZeroUsize,
        memory_freshness: Duration,
        is_listener: bool,
        is_producer: bool,
        state_encoding: StateEncoding,
        filters: Vec<Filter>,
    ) -> Result<Self, ConfigError> {
        if !is_listener && !is_producer {
            return Err(ConfigError::NeitherListenerNorProducer);
        }
        if is_listener && filters.is_empty() {
            return Err(ConfigError::ListenerWithoutFilters);
        }

        let defaults = EngineConfig::default();
        Ok(ChannelConfig {
            name,
            max_memory,
            memory_freshness,
            interest_lifetime: defaults.interest_lifetime,
            reply_freshness: defaults.reply_freshness,
            jitter_range: defaults.jitter_range,
            is_listener,
            is_producer,
            state_encoding,
            filters,
        })
    }

    /// This config's engine timing constants, split out for [`notisync_proto::ProtocolEngine::new`].
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            interest_lifetime: self.interest_lifetime,
            reply_freshness: self.reply_freshness,
            jitter_range: self.jitter_range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> EventName {
        EventName::parse(s)
    }

    #[test]
    fn neither_role_is_rejected() {
        let err = ChannelConfig::new(
            name("/s"),
            NonZeroUsize::new(16).unwrap(),
            Duration::from_secs(5),
            false,
            false,
            StateEncoding::Ibf,
            vec![],
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::NeitherListenerNorProducer);
    }

    #[test]
    fn listener_without_filters_is_rejected() {
        let err = ChannelConfig::new(
            name("/s"),
            NonZeroUsize::new(16).unwrap(),
            Duration::from_secs(5),
            true,
            false,
            StateEncoding::Ibf,
            vec![],
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::ListenerWithoutFilters);
    }

    #[test]
    fn producer_only_needs_no_filters() {
        let cfg = ChannelConfig::new(
            name("/s"),
            NonZeroUsize::new(16).unwrap(),
            Duration::from_secs(5),
            false,
            true,
            StateEncoding::List,
            vec![],
        )
        .unwrap();
        assert!(cfg.is_producer);
        assert!(!cfg.is_listener);
    }
}
