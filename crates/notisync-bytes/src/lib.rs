#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
//! Byte-oriented reader and writer primitives used to build the reconciliation engine's
//! TLV wire format.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod err;
mod reader;
mod writer;

pub use err::{EncodeError, Error};
pub use reader::Reader;
pub use writer::{NestedWriter, Writer};

/// Result type returned by this crate for [`Reader`]-related methods.
pub type Result<T> = std::result::Result<T, Error>;
/// Result type returned by this crate for [`Writer`]-related methods.
pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

/// An object that can be encoded onto a [`Writer`] by reference.
///
/// Most code won't call this directly, but will use it implicitly via [`Writer::write`].
pub trait Writeable {
    /// Encode this object into the writer `b`.
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()>;
}

/// An object that can be encoded into, and consumed by, a [`Writer`].
pub trait WriteableOnce: Sized {
    /// Encode this object into the writer `b`, consuming it.
    fn write_into<B: Writer + ?Sized>(self, b: &mut B) -> EncodeResult<()>;
}

impl<W: Writeable + Sized> WriteableOnce for W {
    fn write_into<B: Writer + ?Sized>(self, b: &mut B) -> EncodeResult<()> {
        self.write_onto(b)
    }
}

impl<W: Writeable + ?Sized> Writeable for &W {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()> {
        (*self).write_onto(b)
    }
}

impl Writeable for u8 {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()> {
        b.write_u8(*self);
        Ok(())
    }
}

impl Writeable for u16 {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()> {
        b.write_u16(*self);
        Ok(())
    }
}

impl Writeable for u32 {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()> {
        b.write_u32(*self);
        Ok(())
    }
}

impl Writeable for u64 {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()> {
        b.write_u64(*self);
        Ok(())
    }
}

impl Writeable for [u8] {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) -> EncodeResult<()> {
        b.write_all(self);
        Ok(())
    }
}

/// An object that can be extracted from a [`Reader`].
///
/// Most code won't call this directly, but will use it implicitly via [`Reader::extract`].
pub trait Readable: Sized {
    /// Try to extract an object of this type from a reader.
    fn take_from(b: &mut Reader<'_>) -> Result<Self>;
}

impl Readable for u8 {
    fn take_from(b: &mut Reader<'_>) -> Result<Self> {
        b.take_u8()
    }
}

impl Readable for u16 {
    fn take_from(b: &mut Reader<'_>) -> Result<Self> {
        b.take_u16()
    }
}

impl Readable for u32 {
    fn take_from(b: &mut Reader<'_>) -> Result<Self> {
        b.take_u32()
    }
}

impl Readable for u64 {
    fn take_from(b: &mut Reader<'_>) -> Result<Self> {
        b.take_u64()
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn writer_roundtrip() {
        let mut v: Vec<u8> = Vec::new();
        v.write_u8(0x57);
        v.write_u16(0x6520);
        v.write_all(b"!");
        assert_eq!(&v[..], &[0x57, 0x65, 0x20, b'!']);

        let mut r = Reader::from_slice(&v);
        assert_eq!(r.take_u8().unwrap(), 0x57);
        assert_eq!(r.take_u16().unwrap(), 0x6520);
        assert_eq!(r.take_rest(), b"!");
    }
}
