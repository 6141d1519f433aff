#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
//! The invertible-Bloom-filter sketch that summarizes a channel's recent timestamp keys, plus
//! a `hash::murmur32` wrapper shared by every layer that needs the check/bucket hash.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod cell;
mod err;
mod hash;
mod sketch;

pub use err::SketchError;
pub use hash::{murmur32, pseudo_random_value};
pub use sketch::{GetOutcome, ListOutcome, Sketch, SketchParams};
