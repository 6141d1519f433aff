//! Error type for transport-level failures.

use notisync_error::{ErrorKind, HasKind};
use thiserror::Error;

/// Error arising from the transport layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// A prefix registration was refused (most commonly: something already owns it).
    #[error("prefix registration refused for {prefix}")]
    RegistrationFailed {
        /// The prefix that could not be registered.
        prefix: String,
    },
}

impl HasKind for TransportError {
    fn kind(&self) -> ErrorKind {
        match self {
            TransportError::RegistrationFailed { .. } => ErrorKind::TransportRegistrationFailed,
        }
    }
}
