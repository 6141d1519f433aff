#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
//! A notification channel: a validated configuration, a reconciliation state, an event
//! filter set, and the protocol engine binding them to a channel name (§4.6).
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod channel;
mod config;
mod err;
mod filter;

pub use channel::Channel;
pub use config::{ChannelConfig, StateEncoding};
pub use err::{ChannelError, ConfigError};
pub use filter::{Filter, FilterSet};
