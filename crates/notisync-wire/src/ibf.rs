//! `IBFTable`/`IBFEntry`: the wire encoding of a non-empty invertible-filter cell set.
//!
//! This module only knows about bytes; the peeling/subtraction algorithm that produces and
//! consumes these cells lives in the sketch crate.

use notisync_bytes::{EncodeResult, Reader, Result};

use crate::tag::Tag;
use crate::tlv::{parse_elements, read_u64_body, write_tlv, write_tlv_u64};

/// One non-empty invertible-filter cell, as encoded on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireCell {
    /// This cell's index within the table.
    pub index: u32,
    /// Signed insert/erase count, transmitted as its two's-complement `i64` magnitude encoded
    /// through the same non-negative-integer TLV used everywhere else (negative counts are
    /// encoded as their bit pattern reinterpreted as `u64`).
    pub count: i64,
    /// XOR-accumulated key sum.
    pub key_sum: u64,
    /// XOR-accumulated key check hash.
    pub key_check: u32,
    /// XOR-accumulated value sum.
    pub value_sum: Vec<u8>,
}

/// Encode the non-empty cells of an invertible filter as an `IBFTable`.
pub fn encode_ibf_table(cells: &[WireCell]) -> EncodeResult<Vec<u8>> {
    let mut body = Vec::new();
    for cell in cells {
        let mut entry_body = Vec::new();
        write_tlv_u64(&mut entry_body, Tag::IBF_INDEX, cell.index as u64)?;
        write_tlv_u64(&mut entry_body, Tag::IBF_COUNT, cell.count as u64)?;
        write_tlv_u64(&mut entry_body, Tag::IBF_KEY_SUM, cell.key_sum)?;
        write_tlv_u64(&mut entry_body, Tag::IBF_KEY_CHECK, cell.key_check as u64)?;
        write_tlv(&mut entry_body, Tag::IBF_VALUE_SUM, &cell.value_sum)?;
        write_tlv(&mut body, Tag::IBF_ENTRY_OR_TABLE, &entry_body)?;
    }
    let mut out = Vec::new();
    write_tlv(&mut out, Tag::IBF_ENTRY_OR_TABLE, &body)?;
    Ok(out)
}

/// Decode an `IBFTable` back into its non-empty cells.
pub fn decode_ibf_table(bytes: &[u8]) -> Result<Vec<WireCell>> {
    let mut r = Reader::from_slice(bytes);
    let outer = parse_elements(&mut r)?;
    let table = outer
        .iter()
        .find(|e| e.tag == Tag::IBF_ENTRY_OR_TABLE)
        .ok_or_else(|| notisync_bytes::Error::InvalidMessage("missing IBFTable".into()))?;

    let mut table_r = Reader::from_slice(table.body);
    let entries = parse_elements(&mut table_r)?;

    let mut cells = Vec::with_capacity(entries.len());
    for entry in entries.iter().filter(|e| e.tag == Tag::IBF_ENTRY_OR_TABLE) {
        let mut entry_r = Reader::from_slice(entry.body);
        let fields = parse_elements(&mut entry_r)?;

        let missing = || notisync_bytes::Error::InvalidMessage("IBFEntry missing a field".into());
        let index = fields
            .iter()
            .find(|f| f.tag == Tag::IBF_INDEX)
            .ok_or_else(missing)?;
        let count = fields
            .iter()
            .find(|f| f.tag == Tag::IBF_COUNT)
            .ok_or_else(missing)?;
        let key_sum = fields
            .iter()
            .find(|f| f.tag == Tag::IBF_KEY_SUM)
            .ok_or_else(missing)?;
        let key_check = fields
            .iter()
            .find(|f| f.tag == Tag::IBF_KEY_CHECK)
            .ok_or_else(missing)?;
        let value_sum = fields
            .iter()
            .find(|f| f.tag == Tag::IBF_VALUE_SUM)
            .ok_or_else(missing)?;

        cells.push(WireCell {
            index: read_u64_body(index.body)? as u32,
            count: read_u64_body(count.body)? as i64,
            key_sum: read_u64_body(key_sum.body)?,
            key_check: read_u64_body(key_check.body)? as u32,
            value_sum: value_sum.body.to_vec(),
        });
    }
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let cells = vec![
            WireCell {
                index: 0,
                count: 1,
                key_sum: 0x1234,
                key_check: 0xabcd,
                value_sum: vec![1, 2, 3, 4],
            },
            WireCell {
                index: 5,
                count: -2,
                key_sum: 0,
                key_check: 7,
                value_sum: vec![0, 0, 0, 0],
            },
        ];
        let encoded = encode_ibf_table(&cells).unwrap();
        let decoded = decode_ibf_table(&encoded).unwrap();
        assert_eq!(decoded, cells);
    }

    #[test]
    fn empty_table_roundtrips() {
        let encoded = encode_ibf_table(&[]).unwrap();
        let decoded = decode_ibf_table(&encoded).unwrap();
        assert!(decoded.is_empty());
    }
}
