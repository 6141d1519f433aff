//! Error type for protocol-engine operations.

use notisync_error::{ErrorKind, HasKind};
use notisync_transport::TransportError;
use thiserror::Error;

/// Error arising from starting or running a channel's protocol engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineError {
    /// The transport refused to register this channel's request-prefix responder, most
    /// commonly because another channel already owns it.
    #[error("failed to start producer role: {0}")]
    Registration(#[from] TransportError),
}

impl HasKind for EngineError {
    fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Registration(e) => e.kind(),
        }
    }
}
