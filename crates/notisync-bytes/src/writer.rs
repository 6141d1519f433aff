//! Internal: the Writer trait for notisync-bytes.

use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use crate::EncodeError;
use crate::EncodeResult;
use crate::Writeable;
use crate::WriteableOnce;

/// A byte-oriented trait for writing to small buffers.
///
/// Most code will want to use the fact that `Vec<u8>` implements this trait. To define a new
/// implementation, just define `write_all`.
pub trait Writer {
    /// Append a slice to the end of this writer.
    fn write_all(&mut self, b: &[u8]);

    /// Append a single `u8`.
    fn write_u8(&mut self, x: u8) {
        self.write_all(&[x]);
    }
    /// Append a single `u16`, big-endian.
    fn write_u16(&mut self, x: u16) {
        self.write_all(&x.to_be_bytes());
    }
    /// Append a single `u32`, big-endian.
    fn write_u32(&mut self, x: u32) {
        self.write_all(&x.to_be_bytes());
    }
    /// Append a single `u64`, big-endian.
    fn write_u64(&mut self, x: u64) {
        self.write_all(&x.to_be_bytes());
    }
    /// Write `n` zero bytes.
    fn write_zeros(&mut self, n: usize) {
        let v = vec![0_u8; n];
        self.write_all(&v[..]);
    }

    /// Encode a [`Writeable`] onto this writer.
    fn write<E: Writeable + ?Sized>(&mut self, e: &E) -> EncodeResult<()> {
        e.write_onto(self)
    }
    /// Encode and consume a [`WriteableOnce`].
    fn write_and_consume<E: WriteableOnce>(&mut self, e: E) -> EncodeResult<()> {
        e.write_into(self)
    }

    /// Arrange to write a `u8` length, followed by some data whose encoded length is that
    /// value. Call [`NestedWriter::finish`] to finalize.
    fn write_nested_u8len(&mut self) -> NestedWriter<'_, Self, u8> {
        write_nested_generic(self)
    }
    /// As [`Writer::write_nested_u8len`], but with a `u16` length field.
    fn write_nested_u16len(&mut self) -> NestedWriter<'_, Self, u16> {
        write_nested_generic(self)
    }
    /// As [`Writer::write_nested_u8len`], but with a `u32` length field.
    fn write_nested_u32len(&mut self) -> NestedWriter<'_, Self, u32> {
        write_nested_generic(self)
    }
}

/// In-progress state for writing a nested (length-counted) item. You must call `finish`.
pub struct NestedWriter<'w, W: ?Sized, L> {
    /// Marker for the length type; invariant for maximal conservatism.
    length_type: PhantomData<*mut L>,
    /// The outer writer.
    outer: &'w mut W,
    /// Our inner buffer; the caller writes into this via `Deref`/`DerefMut`.
    inner: Vec<u8>,
}

impl<'w, W: ?Sized, L> Deref for NestedWriter<'w, W, L> {
    type Target = Vec<u8>;
    fn deref(&self) -> &Vec<u8> {
        &self.inner
    }
}

impl<'w, W: ?Sized, L> DerefMut for NestedWriter<'w, W, L> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.inner
    }
}

/// Implementation of `write_nested_*`, generic over the length type.
fn write_nested_generic<W, L>(w: &mut W) -> NestedWriter<W, L>
where
    W: Writer + ?Sized,
{
    NestedWriter {
        length_type: PhantomData,
        outer: w,
        inner: vec![],
    }
}

impl<'w, W, L> NestedWriter<'w, W, L>
where
    W: Writer + ?Sized,
    L: TryFrom<usize> + Writeable,
{
    /// Finalize the nested write: emits the length, then the buffered content.
    ///
    /// Only fails if the buffered content's length does not fit in `L`.
    pub fn finish(self) -> Result<(), EncodeError> {
        let length = self.inner.len();
        let length: L = length.try_into().map_err(|_| EncodeError::BadLengthValue)?;
        self.outer.write(&length)?;
        self.outer.write_all(&self.inner);
        Ok(())
    }
}

impl Writer for Vec<u8> {
    fn write_all(&mut self, b: &[u8]) {
        self.extend_from_slice(b);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn write_ints() {
        let mut b: Vec<u8> = Vec::new();
        b.write_u8(1);
        b.write_u16(2);
        b.write_u32(3);
        b.write_u64(4);
        assert_eq!(
            &b[..],
            &[1, 0, 2, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 4]
        );
    }

    #[test]
    fn nested() {
        let mut v: Vec<u8> = b"abc".to_vec();

        let mut w = v.write_nested_u8len();
        w.write_u8(b'x');
        w.finish().unwrap();

        let mut w = v.write_nested_u16len();
        w.write_u8(b'y');
        w.finish().unwrap();

        assert_eq!(&v, b"abc\x01x\0\x01y");

        let mut w = v.write_nested_u8len();
        w.write_zeros(256);
        assert!(matches!(
            w.finish().err().unwrap(),
            EncodeError::BadLengthValue
        ));
    }
}
