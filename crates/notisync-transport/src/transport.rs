//! [`Transport`]: the fetch/respond contract the protocol engine is built against.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::channel::oneshot;
use notisync_wire::EventName;

use crate::err::TransportError;
use crate::message::{Reply, ReplyMessage, RequestMessage};

/// Opaque handle to an outstanding outbound request, used only to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestHandle(pub(crate) u64);

/// Opaque handle to a registered responder, used only to unregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponderHandle(pub(crate) u64);

/// The environment a protocol engine is built against: a message-oriented fetch/respond
/// transport over hierarchical names (§6.1).
///
/// This crate expresses the contract as a trait rather than a concrete transport, the same
/// way the teacher crate expresses its own consumed environment (an async runtime) as a
/// trait that a real implementation and a test double both satisfy. Outbound completion is
/// callback-based, not `async fn`-based, matching the underlying face API this engine is
/// ported from (`expressInterest` with `onData`/`onTimeout`/`onNack` callbacks); callers that
/// want to `.await` an outcome instead can use [`express_request_async`].
pub trait Transport: Send + Sync {
    /// Express an outbound request. Exactly one of `on_reply`, `on_timeout`, `on_nack` fires,
    /// exactly once, unless the request is cancelled first.
    fn express_request(
        &self,
        name: EventName,
        lifetime: Duration,
        must_be_fresh: bool,
        on_reply: Box<dyn FnOnce(ReplyMessage) + Send>,
        on_timeout: Box<dyn FnOnce() + Send>,
        on_nack: Box<dyn FnOnce() + Send>,
    ) -> RequestHandle;

    /// Cancel a previously expressed request; none of its callbacks fire afterward.
    fn cancel_request(&self, handle: RequestHandle);

    /// Register as the responder for every request whose name falls under `prefix`.
    ///
    /// Fails with [`TransportError::RegistrationFailed`] if the prefix is already owned.
    fn register_responder(
        &self,
        prefix: EventName,
        loopback_allowed: bool,
        on_request: Box<dyn Fn(RequestMessage) + Send + Sync>,
    ) -> Result<ResponderHandle, TransportError>;

    /// Unregister a previously registered responder.
    fn unregister_responder(&self, handle: ResponderHandle);

    /// Satisfy an inbound request with `reply`.
    fn respond(&self, reply: Reply);
}

/// The terminal outcome of a request expressed via [`express_request_async`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RequestOutcome {
    /// A reply arrived.
    Reply(ReplyMessage),
    /// The request's lifetime elapsed with no reply.
    Timeout,
    /// The request was refused.
    Nack,
}

fn send_once(slot: &Mutex<Option<oneshot::Sender<RequestOutcome>>>, outcome: RequestOutcome) {
    let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(tx) = guard.take() {
        let _ = tx.send(outcome);
    }
}

/// Express a request and await its outcome as a future, built over the callback-based
/// [`Transport::express_request`] with a `futures::channel::oneshot`, the same pattern the
/// teacher crate uses to turn a callback-shaped primitive into something `.await`-able.
pub async fn express_request_async(
    transport: &(impl Transport + ?Sized),
    name: EventName,
    lifetime: Duration,
    must_be_fresh: bool,
) -> RequestOutcome {
    let (tx, rx) = oneshot::channel();
    let slot = std::sync::Arc::new(Mutex::new(Some(tx)));

    let slot_reply = slot.clone();
    let on_reply = Box::new(move |reply: ReplyMessage| {
        send_once(&slot_reply, RequestOutcome::Reply(reply));
    });
    let slot_timeout = slot.clone();
    let on_timeout = Box::new(move || {
        send_once(&slot_timeout, RequestOutcome::Timeout);
    });
    let slot_nack = slot;
    let on_nack = Box::new(move || {
        send_once(&slot_nack, RequestOutcome::Nack);
    });

    transport.express_request(name, lifetime, must_be_fresh, on_reply, on_timeout, on_nack);

    match rx.await {
        Ok(outcome) => outcome,
        Err(_canceled) => {
            tracing::warn!("request future dropped without a callback firing; treating as timeout");
            RequestOutcome::Timeout
        }
    }
}
