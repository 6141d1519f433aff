#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
//! The TLV tag space, payload envelopes, name encoding, and state-component compression
//! shared by every layer of the reconciliation engine.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod compress;
mod envelope;
mod ibf;
mod list;
mod name;
mod tag;
mod tlv;

pub use compress::{compress, decompress, CompressError};
pub use envelope::DataEnvelope;
pub use ibf::{decode_ibf_table, encode_ibf_table, WireCell};
pub use list::{decode_list_table, encode_list_table};
pub use name::EventName;
pub use tag::{EnvelopeType, Tag};
