//! Internal: raw type-length-value framing shared by every structure in this crate.
//!
//! A frame is `tag: u8, length: u32 (big-endian), value: [u8; length]`. Tags above 255 are not
//! representable; none of this crate's tags (§ `tag.rs`) approach that bound.

use notisync_bytes::{EncodeResult, Reader, Result, Writer};

use crate::tag::Tag;

/// Append a TLV frame with the given tag and pre-encoded body.
pub(crate) fn write_tlv<W: Writer + ?Sized>(w: &mut W, tag: Tag, body: &[u8]) -> EncodeResult<()> {
    let tag_u8: u8 = u64::from(tag) as u8;
    w.write_u8(tag_u8);
    w.write_u32(body.len() as u32);
    w.write_all(body);
    Ok(())
}

/// Append a TLV frame carrying a single non-negative integer, encoded as its minimal
/// big-endian byte string (never empty: zero encodes as one zero byte).
pub(crate) fn write_tlv_u64<W: Writer + ?Sized>(w: &mut W, tag: Tag, value: u64) -> EncodeResult<()> {
    let bytes = value.to_be_bytes();
    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    write_tlv(w, tag, &bytes[first_nonzero..])
}

/// One parsed TLV frame: its tag and the raw (unparsed) body bytes.
#[derive(Debug, Clone)]
pub(crate) struct Element<'a> {
    pub(crate) tag: Tag,
    pub(crate) body: &'a [u8],
}

/// Parse every top-level TLV frame out of `r` until it is exhausted.
pub(crate) fn parse_elements<'a>(r: &mut Reader<'a>) -> Result<Vec<Element<'a>>> {
    let mut out = Vec::new();
    while r.remaining() > 0 {
        let tag = Tag::from(r.take_u8()? as u64);
        let len = r.take_u32()? as usize;
        let body = r.take(len)?;
        out.push(Element { tag, body });
    }
    Ok(out)
}

/// Interpret a TLV body as a big-endian non-negative integer (empty body = 0).
pub(crate) fn read_u64_body(body: &[u8]) -> Result<u64> {
    let mut buf = [0_u8; 8];
    if body.len() > 8 {
        return Err(notisync_bytes::Error::InvalidMessage(
            "integer TLV body longer than 8 bytes".into(),
        ));
    }
    buf[8 - body.len()..].copy_from_slice(body);
    Ok(u64::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_roundtrip() {
        let mut v = Vec::new();
        write_tlv_u64(&mut v, Tag::TIMESTAMP, 0).unwrap();
        write_tlv_u64(&mut v, Tag::TIMESTAMP, 0x1234).unwrap();

        let mut r = Reader::from_slice(&v);
        let elems = parse_elements(&mut r).unwrap();
        assert_eq!(elems.len(), 2);
        assert_eq!(read_u64_body(elems[0].body).unwrap(), 0);
        assert_eq!(read_u64_body(elems[1].body).unwrap(), 0x1234);
    }
}
