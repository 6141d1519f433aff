//! Message types carried across the [`crate::Transport`] boundary.

use std::time::Duration;

use notisync_wire::EventName;

/// An inbound request delivered to a registered responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMessage {
    /// The request's full name.
    pub name: EventName,
    /// The lifetime the requester declared (bounds how long we may take to reply).
    pub lifetime: Duration,
}

/// A reply delivered to a previously expressed request's `on_reply` callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyMessage {
    /// The reply's full name (the request name plus our own trailing state component, per
    /// §6.2).
    pub name: EventName,
    /// The opaque reply payload.
    pub payload: Vec<u8>,
}

/// A reply we send back through [`crate::Transport::respond`] to satisfy an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The reply's full name.
    pub name: EventName,
    /// The opaque reply payload.
    pub payload: Vec<u8>,
    /// How long downstream caches may consider this reply fresh.
    pub freshness: Duration,
}
