#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
//! Shared [`ErrorKind`] taxonomy and [`Bug`] type used across the reconciliation engine crates.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::exhaustive_structs)]

use std::fmt::{self, Debug, Display};
use std::panic;

/// Coarse classification of an error arising from the reconciliation engine.
///
/// Get the kind via [`HasKind::kind`] and compare it to the expected value, rather than
/// matching on every crate's concrete `Error` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A wire payload failed to decode: malformed TLV, bad length, truncated buffer, or a
    /// compressed state component that would not decompress.
    DecodeFailed,
    /// A sketch (or a subtraction of two sketches) could not be fully peeled to a fixed point.
    SketchUnresolved,
    /// A channel configuration value failed a create-time validation check.
    ConfigInvalid,
    /// The transport refused to register a responder for a channel prefix.
    TransportRegistrationFailed,
    /// A reply failed signature or policy validation performed by an injected verifier.
    ReplyValidationFailed,
    /// A scheduled task or pending-request timer was cancelled as part of an orderly shutdown.
    Shutdown,
    /// A condition that should be provably impossible was observed; this indicates a bug in
    /// this crate rather than in its caller or its environment.
    Internal,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::DecodeFailed => "failed to decode a wire payload",
            ErrorKind::SketchUnresolved => "sketch could not be resolved to a fixed point",
            ErrorKind::ConfigInvalid => "invalid channel configuration",
            ErrorKind::TransportRegistrationFailed => "transport responder registration failed",
            ErrorKind::ReplyValidationFailed => "reply failed validation",
            ErrorKind::Shutdown => "channel is shutting down",
            ErrorKind::Internal => "internal error (bug)",
        };
        f.write_str(s)
    }
}

/// Errors that can be categorized as belonging to an [`ErrorKind`].
pub trait HasKind {
    /// Return the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// An internal error: a condition that should be provably impossible.
///
/// Use [`internal!`] to construct one; it records the call site so a report names exactly
/// where the impossible thing happened.
#[derive(Clone)]
pub struct Bug {
    message: String,
    location: &'static panic::Location<'static>,
}

impl Bug {
    /// Create a `Bug`, capturing the caller's location.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Bug {
            message: message.into(),
            location: panic::Location::caller(),
        }
    }
}

impl Debug for Bug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bug({:?}: {})", self.location, self.message)
    }
}

impl Display for Bug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "internal error (bug) at {}: {}", self.location, self.message)
    }
}

impl std::error::Error for Bug {}

impl HasKind for Bug {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

/// Construct a [`Bug`], with a `format!`-style message, capturing the call site.
#[macro_export]
macro_rules! internal {
    { $( $arg:tt )* } => {
        $crate::Bug::new(format!($($arg)*))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bug_display_includes_message() {
        let b: Bug = internal!("entry {} missing", 7);
        let s = b.to_string();
        assert!(s.contains("entry 7 missing"));
    }

    #[test]
    fn error_kind_equality() {
        assert_eq!(ErrorKind::Internal, ErrorKind::Internal);
        assert_ne!(ErrorKind::Internal, ErrorKind::DecodeFailed);
    }
}
