//! Error type for state operations: encoding, decoding, and sketch reconciliation failures.

use notisync_error::{ErrorKind, HasKind};
use notisync_sketch::SketchError;
use notisync_wire::CompressError;
use thiserror::Error;

/// Error arising from exporting, diffing, or reconciling a channel's state.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StateError {
    /// Failed to bzip2-(de)compress a state component.
    #[error("state compression error: {0}")]
    Compress(#[from] CompressError),
    /// Failed to encode or decode a state component's TLV framing.
    #[error("state wire error: {0}")]
    Wire(#[from] notisync_bytes::Error),
    /// Failed to encode a state component's TLV framing.
    #[error("state encode error: {0}")]
    Encode(#[from] notisync_bytes::EncodeError),
    /// The sketch subtraction or peel failed.
    #[error("sketch error: {0}")]
    Sketch(#[from] SketchError),
}

impl HasKind for StateError {
    fn kind(&self) -> ErrorKind {
        match self {
            StateError::Compress(_) | StateError::Wire(_) => ErrorKind::DecodeFailed,
            StateError::Encode(_) => ErrorKind::Internal,
            StateError::Sketch(e) => e.kind(),
        }
    }
}
