//! [`EngineConfig`]: the protocol engine's timing constants.

use std::time::Duration;

/// Timing constants governing one channel's protocol engine (§4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long an outbound request stays registered with the transport before it times out.
    pub interest_lifetime: Duration,
    /// The freshness we ask downstream caches to honor on a reply, absent an explicit
    /// per-call override.
    pub reply_freshness: Duration,
    /// The `(min, max)` range a re-expression delay is drawn uniformly from.
    pub jitter_range: (Duration, Duration),
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            interest_lifetime: Duration::from_secs(3),
            reply_freshness: Duration::from_millis(4),
            jitter_range: (Duration::from_millis(5), Duration::from_millis(20)),
        }
    }
}
