//! [`Scheduler`]: the task-scheduling primitive the engine reschedules itself through.

use std::time::Duration;

/// Opaque handle to a scheduled task, used only to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleToken(pub(crate) u64);

/// A single-threaded cooperative task scheduler: schedule a closure to run once, after a
/// delay, and cancel it before it fires.
///
/// Grounded in the transport contract's scheduler primitive (§6.1): `schedule(duration, task)`
/// and `cancel(token)`, the same two operations the listener loop uses to rearm its own
/// re-expression and the pending-request table uses to arm and disarm per-entry expiry.
pub trait Scheduler: Send + Sync {
    /// Run `task` once, after `after` has elapsed.
    fn schedule(&self, after: Duration, task: Box<dyn FnOnce() + Send>) -> ScheduleToken;

    /// Cancel a previously scheduled task; a no-op if it already fired or was already
    /// cancelled.
    fn cancel(&self, token: ScheduleToken);
}
