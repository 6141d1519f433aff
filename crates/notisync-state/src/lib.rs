#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
//! Per-channel reconciliation state: a [`HistoryStore`](notisync_history::HistoryStore) kept
//! in lock-step with either an invertible-filter sketch or a plain timestamp list, plus the
//! publish/reconcile operations built on top of that pair.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod err;
mod list_state;
mod state;

pub use err::StateError;
pub use list_state::ListState;
pub use state::{ChannelState, Encoding};
