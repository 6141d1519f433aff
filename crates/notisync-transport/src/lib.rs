#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
//! The fetch/respond transport contract the protocol engine is built against, plus a
//! deterministic in-memory implementation for tests.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod clock;
mod err;
mod message;
mod mock;
mod scheduler;
mod transport;

pub use clock::{Clock, SystemClock};
pub use err::TransportError;
pub use message::{Reply, ReplyMessage, RequestMessage};
pub use mock::{MockClock, MockScheduler, MockTransport};
pub use scheduler::{ScheduleToken, Scheduler};
pub use transport::{
    express_request_async, RequestHandle, RequestOutcome, ResponderHandle, Transport,
};
