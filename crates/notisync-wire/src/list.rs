//! `ListTable`/`ListEntry`: the plain-set alternative to the invertible-sketch state encoding.

use notisync_bytes::{EncodeResult, Reader, Result};

use crate::tag::Tag;
use crate::tlv::{parse_elements, read_u64_body, write_tlv_u64};

/// Encode a set of timestamps as a `ListTable`.
pub fn encode_list_table(timestamps: impl IntoIterator<Item = u64>) -> EncodeResult<Vec<u8>> {
    let mut body = Vec::new();
    for ts in timestamps {
        write_tlv_u64(&mut body, Tag::LIST_ENTRY, ts)?;
    }
    let mut out = Vec::new();
    crate::tlv::write_tlv(&mut out, Tag::LIST_TABLE, &body)?;
    Ok(out)
}

/// Decode a `ListTable` into its timestamps.
pub fn decode_list_table(bytes: &[u8]) -> Result<Vec<u64>> {
    let mut r = Reader::from_slice(bytes);
    let outer = parse_elements(&mut r)?;
    let table = outer
        .iter()
        .find(|e| e.tag == Tag::LIST_TABLE)
        .ok_or_else(|| notisync_bytes::Error::InvalidMessage("missing ListTable".into()))?;

    let mut inner_r = Reader::from_slice(table.body);
    let entries = parse_elements(&mut inner_r)?;
    entries
        .iter()
        .filter(|e| e.tag == Tag::LIST_ENTRY)
        .map(|e| read_u64_body(e.body))
        .collect()
}
