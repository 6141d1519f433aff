//! Internal: error types for notisync-bytes.

use std::num::NonZeroUsize;

use notisync_error::{Bug, ErrorKind, HasKind};
use thiserror::Error;

/// Error type for decoding objects out of a byte slice.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Tried to read something, but there were not enough bytes left.
    #[error("object truncated, at least {deficit} more bytes needed")]
    Truncated {
        /// Lower bound on additional bytes needed.
        deficit: NonZeroUsize,
    },
    /// `should_be_exhausted` was called, but bytes remained.
    #[error("extra bytes at end of object")]
    ExtraneousBytes,
    /// A length prefix did not fit into the target integer type.
    #[error("object length too large to represent")]
    BadLengthValue,
    /// The bytes did not form a valid instance of the object being parsed.
    #[error("bad object: {0}")]
    InvalidMessage(String),
    /// A parsing error that should never happen.
    #[error("internal error")]
    Bug(#[from] Bug),
}

impl Error {
    /// Build a `Truncated` error for a nonzero deficit; panics if `deficit` is zero.
    ///
    /// Exists mainly so test code can construct the expected error without repeating the
    /// `NonZeroUsize` dance at every call site.
    #[cfg(test)]
    pub(crate) fn truncated_for_test(deficit: usize) -> Self {
        Error::Truncated {
            deficit: NonZeroUsize::new(deficit).expect("zero deficit"),
        }
    }
}

impl HasKind for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Bug(_) => ErrorKind::Internal,
            _ => ErrorKind::DecodeFailed,
        }
    }
}

/// Error type for encoding objects into bytes.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum EncodeError {
    /// The length of the encoded object did not fit in its length field.
    #[error("object length too large to encode")]
    BadLengthValue,
    /// An encoding error that should never happen.
    #[error("internal error")]
    Bug(#[from] Bug),
}

impl HasKind for EncodeError {
    fn kind(&self) -> ErrorKind {
        match self {
            EncodeError::Bug(_) => ErrorKind::Internal,
            EncodeError::BadLengthValue => ErrorKind::Internal,
        }
    }
}
