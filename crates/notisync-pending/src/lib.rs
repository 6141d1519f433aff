//! The pending-request table: the set of inbound requests a channel owes a reply to, each
//! bounded by its own expiry timer armed through the transport's [`notisync_transport::Scheduler`].
#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod table;

pub use table::{PendingRequest, PendingTable};
