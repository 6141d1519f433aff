#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
//! The per-channel protocol engine: the long-lived outbound request loop, the inbound request
//! handler, the reply composer, and the jittered re-expression timing that ties the wire
//! codec, sketch, state, and pending-request table into one running channel (§4.5).
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod config;
mod engine;
mod err;
mod jitter;

pub use config::EngineConfig;
pub use engine::ProtocolEngine;
pub use err::EngineError;
pub use jitter::{FixedJitter, Jitter, RandJitter};
