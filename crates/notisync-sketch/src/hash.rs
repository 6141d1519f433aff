//! `MurmurHash3` glue and the pseudo-random value derivation used to seed a sketch entry.

use std::io::Cursor;

/// Hash `data` with the 32-bit variant of `MurmurHash3`, using `seed` as the hash seed.
///
/// This is the "MurmurHash3 primitive" the specification assumes is available; it is not
/// reimplemented here, only adapted to this crate's byte-slice-in, `u32`-out calling
/// convention.
pub fn murmur32(seed: u32, data: &[u8]) -> u32 {
    murmur3::murmur3_32(&mut Cursor::new(data), seed)
        .expect("murmur3_32 over an in-memory Cursor cannot fail")
}

/// Derive the deterministic value bytes stored alongside `key` in every cell it hashes into.
///
/// Grounded in the original `State::_pseudoRandomValue`: each output byte is the low byte of
/// `MurmurHash3(key + i, bytes_produced_so_far)`, so the value is a hash chain rather than a
/// single hash truncated to `value_bytes`.
pub fn pseudo_random_value(key: u64, value_bytes: usize) -> Vec<u8> {
    let mut result = Vec::with_capacity(value_bytes);
    for i in 0..value_bytes {
        let seed = key.wrapping_add(i as u64) as u32;
        let h = murmur32(seed, &result);
        result.push((h & 0xff) as u8);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(pseudo_random_value(42, 4), pseudo_random_value(42, 4));
        assert_ne!(pseudo_random_value(42, 4), pseudo_random_value(43, 4));
    }

    #[test]
    fn length_matches_request() {
        assert_eq!(pseudo_random_value(7, 4).len(), 4);
        assert_eq!(pseudo_random_value(7, 8).len(), 8);
    }
}
