#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
//! The per-channel history store: an ordered `Timestamp -> EventName list` mapping with
//! freshness-based eviction.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod store;

pub use store::HistoryStore;
