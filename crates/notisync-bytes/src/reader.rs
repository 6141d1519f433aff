//! Internal: the Reader type for notisync-bytes.

use crate::{Error, Readable, Result};
use std::num::NonZeroUsize;

/// A type for reading TLV-encoded messages from a slice of bytes.
///
/// Unlike `io::Read`, this object has a simpler error type and is designed for in-memory
/// parsing only. None of its methods panic, except that `extract`/`extract_n` propagate a
/// panic from the underlying [`Readable::take_from`] implementation.
pub struct Reader<'a> {
    /// The underlying slice that we're reading from.
    b: &'a [u8],
    /// The next position in the slice that we intend to read from.
    off: usize,
}

impl<'a> Reader<'a> {
    /// Construct a new `Reader` from a slice of bytes.
    pub fn from_slice(slice: &'a [u8]) -> Self {
        Reader { b: slice, off: 0 }
    }

    /// Return the total length of the slice, including consumed and remaining bytes.
    pub fn total_len(&self) -> usize {
        self.b.len()
    }

    /// Return the number of bytes that have not yet been read.
    pub fn remaining(&self) -> usize {
        self.b.len() - self.off
    }

    /// Consume this reader and return the bytes it did not consume.
    pub fn into_rest(self) -> &'a [u8] {
        &self.b[self.off..]
    }

    /// Return the number of bytes that have already been read.
    pub fn consumed(&self) -> usize {
        self.off
    }

    /// Skip `n` bytes. Fails with [`Error::Truncated`] if there are not enough left.
    pub fn advance(&mut self, n: usize) -> Result<()> {
        self.peek(n)?;
        self.off += n;
        Ok(())
    }

    /// Fail with [`Error::ExtraneousBytes`] unless every byte has been consumed.
    pub fn should_be_exhausted(&self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(Error::ExtraneousBytes);
        }
        Ok(())
    }

    /// Truncate this reader so that no more than `n` bytes remain.
    pub fn truncate(&mut self, n: usize) {
        if n < self.remaining() {
            self.b = &self.b[..self.off + n];
        }
    }

    /// Return a slice of `n` bytes without consuming them.
    pub fn peek(&self, n: usize) -> Result<&'a [u8]> {
        if let Some(deficit) = n
            .checked_sub(self.remaining())
            .and_then(|d| d.try_into().ok())
        {
            return Err(self.incomplete_error(deficit));
        }
        Ok(&self.b[self.off..(n + self.off)])
    }

    /// Consume and return a slice of `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let b = self.peek(n)?;
        self.advance(n)?;
        Ok(b)
    }

    /// Fill `buf` with bytes consumed from this reader.
    pub fn take_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let n = buf.len();
        let b = self.take(n)?;
        buf.copy_from_slice(b);
        Ok(())
    }

    /// Consume and return a `u8`.
    pub fn take_u8(&mut self) -> Result<u8> {
        let b = self.take(1)?;
        Ok(b[0])
    }

    /// Consume and return a big-endian `u16`.
    pub fn take_u16(&mut self) -> Result<u16> {
        let b: [u8; 2] = self.extract()?;
        Ok(u16::from_be_bytes(b))
    }

    /// Consume and return a big-endian `u32`.
    pub fn take_u32(&mut self) -> Result<u32> {
        let b: [u8; 4] = self.extract()?;
        Ok(u32::from_be_bytes(b))
    }

    /// Consume and return a big-endian `u64`.
    pub fn take_u64(&mut self) -> Result<u64> {
        let b: [u8; 8] = self.extract()?;
        Ok(u64::from_be_bytes(b))
    }

    /// Consume and return all remaining bytes.
    pub fn take_rest(&mut self) -> &'a [u8] {
        self.take(self.remaining())
            .expect("taking remaining bytes cannot fail")
    }

    /// Decode and remove a [`Readable`] using its `take_from` method. On failure, consumes
    /// nothing.
    pub fn extract<E: Readable>(&mut self) -> Result<E> {
        let off_orig = self.off;
        let result = E::take_from(self);
        if result.is_err() {
            self.off = off_orig;
        }
        result
    }

    /// Decode and remove `n` [`Readable`]s. On failure, consumes nothing.
    pub fn extract_n<E: Readable>(&mut self, n: usize) -> Result<Vec<E>> {
        let n_alloc = std::cmp::min(n, self.remaining());
        let mut result = Vec::with_capacity(n_alloc);
        let off_orig = self.off;
        for _ in 0..n {
            match E::take_from(self) {
                Ok(item) => result.push(item),
                Err(e) => {
                    self.off = off_orig;
                    return Err(e);
                }
            }
        }
        Ok(result)
    }

    /// Decode something with a `u8` length field: consumes the length, hands the closure an
    /// inner reader containing exactly that many bytes, and requires the inner reader to be
    /// exhausted when the closure returns.
    pub fn read_nested_u8len<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Reader) -> Result<T>,
    {
        let length = self.take_u8()? as usize;
        self.read_nested_generic(length, f)
    }

    /// Decode something with a `u16` length field.
    pub fn read_nested_u16len<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Reader) -> Result<T>,
    {
        let length = self.take_u16()? as usize;
        self.read_nested_generic(length, f)
    }

    /// Decode something with a `u32` length field.
    pub fn read_nested_u32len<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Reader) -> Result<T>,
    {
        let length = self.take_u32()? as usize;
        self.read_nested_generic(length, f)
    }

    /// Shared implementation of `read_nested_*`.
    fn read_nested_generic<F, T>(&mut self, length: usize, f: F) -> Result<T>
    where
        F: FnOnce(&mut Reader) -> Result<T>,
    {
        let slice = self.take(length)?;
        let mut inner = Reader::from_slice(slice);
        let out = f(&mut inner)?;
        inner.should_be_exhausted()?;
        Ok(out)
    }

    /// Return the error to raise when a read ran out of data.
    fn incomplete_error(&self, deficit: NonZeroUsize) -> Error {
        Error::Truncated { deficit }
    }
}

impl<const N: usize> Readable for [u8; N] {
    fn take_from(b: &mut Reader<'_>) -> Result<Self> {
        let mut out = [0_u8; N];
        b.take_into(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn basic_reads() {
        let bytes = b"On a mountain halfway between Reno and Rome";
        let mut bc = Reader::from_slice(&bytes[..]);

        assert_eq!(bc.consumed(), 0);
        assert_eq!(bc.remaining(), 44);

        assert_eq!(bc.take(3).unwrap(), &b"On "[..]);
        assert_eq!(bc.take_u16().unwrap(), 0x6120);
        assert_eq!(bc.take_u8().unwrap(), 0x6d);
        assert_eq!(bc.take_u64().unwrap(), 0x6f756e7461696e20);
        assert_eq!(bc.take_u32().unwrap(), 0x68616c66);

        bc.advance(12).unwrap();
        assert_eq!(bc.into_rest(), &b"Reno and Rome"[..]);
    }

    #[test]
    fn truncated_reads_report_deficit() {
        let bytes = b"1234567";
        let mut bc = Reader::from_slice(&bytes[..]);
        assert_eq!(bc.take_u64(), Err(Error::truncated_for_test(1)));
        assert_eq!(bc.take_u32().unwrap(), 0x31323334);
        assert_eq!(bc.take_u32(), Err(Error::truncated_for_test(1)));
    }

    #[test]
    fn exhaust() {
        let b = Reader::from_slice(&b""[..]);
        assert_eq!(b.should_be_exhausted(), Ok(()));

        let mut b = Reader::from_slice(&b"outis"[..]);
        assert_eq!(b.should_be_exhausted(), Err(Error::ExtraneousBytes));
        b.take(5).unwrap();
        assert_eq!(b.should_be_exhausted(), Ok(()));
    }

    #[test]
    fn nested_good() {
        let mut b = Reader::from_slice(b"abc\0\0\x04defghijkl");
        assert_eq!(b.take(3).unwrap(), b"abc");

        b.read_nested_u16len(|s| {
            assert!(s.should_be_exhausted().is_ok());
            Ok(())
        })
        .unwrap();

        b.read_nested_u8len(|s| {
            assert_eq!(s.take(4).unwrap(), b"defg");
            assert!(s.should_be_exhausted().is_ok());
            Ok(())
        })
        .unwrap();

        assert_eq!(b.take(2).unwrap(), b"hi");
    }

    #[test]
    fn nested_inner_short() {
        let mut b = Reader::from_slice(&[4, 66]);
        assert_eq!(
            b.read_nested_u8len(|b| b.take_u32()),
            Err(Error::truncated_for_test(3)),
        );
    }

    #[test]
    fn extract() {
        #[derive(Debug)]
        struct LenEnc(Vec<u8>);
        impl Readable for LenEnc {
            fn take_from(b: &mut Reader<'_>) -> Result<Self> {
                let length = b.take_u8()?;
                let content = b.take(length as usize)?.into();
                Ok(LenEnc(content))
            }
        }

        let bytes = b"\x04this\x02is\x09sometimes\x01a\x06string!";
        let mut b = Reader::from_slice(&bytes[..]);

        let le: LenEnc = b.extract().unwrap();
        assert_eq!(&le.0[..], &b"this"[..]);

        let les: Vec<LenEnc> = b.extract_n(4).unwrap();
        assert_eq!(&les[3].0[..], &b"string"[..]);
        assert_eq!(b.remaining(), 1);
    }
}
