//! Error types for channel configuration and lifecycle.

use notisync_error::{ErrorKind, HasKind};
use notisync_proto::EngineError;
use thiserror::Error;

/// A §4.6 create-time validation check failed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A channel must be a listener, a producer, or both.
    #[error("channel must be a listener, a producer, or both")]
    NeitherListenerNorProducer,
    /// A listener channel must carry at least one event filter.
    #[error("a listener channel must have at least one event filter")]
    ListenerWithoutFilters,
}

impl HasKind for ConfigError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::ConfigInvalid
    }
}

/// Error arising from building or starting a [`crate::Channel`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChannelError {
    /// The channel's configuration failed a create-time check.
    #[error("invalid channel configuration: {0}")]
    Config(#[from] ConfigError),
    /// The channel's protocol engine failed to start.
    #[error("channel engine failed to start: {0}")]
    Engine(#[from] EngineError),
}

impl HasKind for ChannelError {
    fn kind(&self) -> ErrorKind {
        match self {
            ChannelError::Config(e) => e.kind(),
            ChannelError::Engine(e) => e.kind(),
        }
    }
}
