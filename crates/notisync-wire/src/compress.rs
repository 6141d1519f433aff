//! bzip2 compression of state components, as carried in request/reply names.

use std::io::Read;

use bzip2::read::{BzDecoder, BzEncoder};
use bzip2::Compression;
use notisync_error::{ErrorKind, HasKind};
use thiserror::Error;

/// Error compressing or decompressing a state component.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CompressError {
    /// The underlying bzip2 stream failed, most often because the input was not a valid
    /// bzip2-compressed buffer.
    #[error("bzip2 stream error: {0}")]
    Io(#[from] std::io::Error),
}

impl HasKind for CompressError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::DecodeFailed
    }
}

/// Compress `buf` with bzip2 at the default compression level.
pub fn compress(buf: &[u8]) -> Vec<u8> {
    let mut encoder = BzEncoder::new(buf, Compression::default());
    let mut out = Vec::new();
    encoder
        .read_to_end(&mut out)
        .expect("in-memory bzip2 encode cannot fail");
    out
}

/// Decompress a bzip2-compressed buffer.
pub fn decompress(buf: &[u8]) -> Result<Vec<u8>, CompressError> {
    let mut decoder = BzDecoder::new(buf);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let compressed = compress(&data);
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn bad_input_errors() {
        assert!(decompress(b"not bzip2 data at all").is_err());
    }
}
