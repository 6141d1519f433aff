//! Error type for sketch operations.

use notisync_error::{ErrorKind, HasKind};
use thiserror::Error;

/// Error arising from a sketch operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SketchError {
    /// `subtract` was called on two sketches with different cell counts or value sizes.
    #[error("cannot subtract sketches with mismatched parameters")]
    ParamsMismatch,
    /// `list_entries` (directly, or via a prior `subtract`) could not peel every cell to a
    /// fixed point: the sketch is overloaded relative to its capacity.
    #[error("sketch could not be resolved to a fixed point")]
    Unresolved,
}

impl HasKind for SketchError {
    fn kind(&self) -> ErrorKind {
        match self {
            SketchError::ParamsMismatch => ErrorKind::Internal,
            SketchError::Unresolved => ErrorKind::SketchUnresolved,
        }
    }
}
