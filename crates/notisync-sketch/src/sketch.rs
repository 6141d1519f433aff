//! The invertible-Bloom-filter [`Sketch`] itself: parameters, mutation, decoding, and peeling.

use std::collections::BTreeSet;

use notisync_wire::WireCell;

use crate::cell::Cell;
use crate::err::SketchError;
use crate::hash::{murmur32, pseudo_random_value};

/// Default number of independent hash functions used to place each key.
pub const DEFAULT_HASH_COUNT: usize = 4;
/// Seed used to compute a cell's check hash (distinct from the per-hash-function seeds, which
/// run `0..hash_count`).
pub const DEFAULT_CHECK_SEED: u32 = 11;
/// Default number of value bytes stored per key.
pub const DEFAULT_VALUE_BYTES: usize = 4;

/// The fixed parameters of a sketch: its cell count and hashing constants.
///
/// `subtract` (and therefore `diff`) requires both operands to share identical parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SketchParams {
    /// Total number of cells in the hash table; always a multiple of `hash_count`.
    pub cells: usize,
    /// Number of independent hash functions used to place each key.
    pub hash_count: usize,
    /// Seed used for each cell's check hash.
    pub check_seed: u32,
    /// Number of bytes stored in a cell's value sum.
    pub value_bytes: usize,
}

impl SketchParams {
    /// Derive a sketch's parameters from its configured key capacity.
    ///
    /// `cells = round_up_to_multiple_of(hash_count, ceil(max_memory * 1.5))`, matching the
    /// `1.5x` headroom `IBFT`'s constructor reserves for a low decode-failure probability.
    pub fn for_capacity(max_memory: usize) -> Self {
        let hash_count = DEFAULT_HASH_COUNT;
        let mut cells = max_memory + max_memory / 2;
        while cells % hash_count != 0 {
            cells += 1;
        }
        SketchParams {
            cells,
            hash_count,
            check_seed: DEFAULT_CHECK_SEED,
            value_bytes: DEFAULT_VALUE_BYTES,
        }
    }

    /// Number of cells dedicated to each of the `hash_count` hash functions.
    fn cells_per_hash(&self) -> usize {
        self.cells / self.hash_count
    }
}

/// The result of probing a sketch for a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GetOutcome {
    /// The key is definitely present, with this value.
    Found(Vec<u8>),
    /// The key is definitely absent.
    Absent,
    /// The sketch could not establish membership either way.
    Unknown,
}

/// The result of a successful [`Sketch::list_entries`] or [`Sketch::subtract`]-then-peel.
pub type ListOutcome = (BTreeSet<(u64, Vec<u8>)>, BTreeSet<(u64, Vec<u8>)>);

/// A fixed-capacity invertible Bloom filter over 64-bit keys.
///
/// Grounded in `IBFT`: a vector of cells, `hash_count` hash functions locating each key's
/// cells, and a peeling decoder that recovers the set of inserted/erased keys once enough
/// cells have become "pure".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sketch {
    params: SketchParams,
    cells: Vec<Cell>,
}

impl Sketch {
    /// Create an empty sketch sized for `max_memory` keys.
    pub fn new(max_memory: usize) -> Self {
        Self::with_params(SketchParams::for_capacity(max_memory))
    }

    /// Create an empty sketch with explicit parameters (mainly for decoding a peer's sketch
    /// at a known capacity).
    pub fn with_params(params: SketchParams) -> Self {
        Sketch {
            cells: vec![Cell::default(); params.cells],
            params,
        }
    }

    /// This sketch's parameters.
    pub fn params(&self) -> SketchParams {
        self.params
    }

    /// The value this crate derives for a timestamp key; exposed so callers (the state layer)
    /// use the same derivation for insert, erase, and verifying a `get` result.
    pub fn value_for_key(&self, key: u64) -> Vec<u8> {
        pseudo_random_value(key, self.params.value_bytes)
    }

    /// Insert `key` with `value` (see [`Sketch::value_for_key`]).
    pub fn insert(&mut self, key: u64, value: &[u8]) {
        self.apply(1, key, value);
    }

    /// Erase `key` with `value`; the inverse of [`Sketch::insert`].
    pub fn erase(&mut self, key: u64, value: &[u8]) {
        self.apply(-1, key, value);
    }

    /// Shared mutation: route `key` to the cell owned by each of the `hash_count` hash
    /// functions and apply `delta` there.
    fn apply(&mut self, delta: i64, key: u64, value: &[u8]) {
        let kvec = key.to_le_bytes();
        let per_hash = self.params.cells_per_hash();
        for i in 0..self.params.hash_count {
            let h = murmur32(i as u32, &kvec) as usize;
            let idx = i * per_hash + (h % per_hash);
            self.cells[idx].mutate(delta, key, value, self.params.check_seed);
        }
    }

    /// Test membership of `key`, attempting a destructive peel of a clone if the direct probe
    /// is inconclusive.
    pub fn get(&self, key: u64) -> GetOutcome {
        let kvec = key.to_le_bytes();
        let per_hash = self.params.cells_per_hash();
        for i in 0..self.params.hash_count {
            let h = murmur32(i as u32, &kvec) as usize;
            let idx = i * per_hash + (h % per_hash);
            let cell = &self.cells[idx];
            if cell.is_empty() {
                return GetOutcome::Absent;
            }
            if cell.is_pure(self.params.check_seed) {
                return if cell.key_sum == key {
                    GetOutcome::Found(cell.value_sum.clone())
                } else {
                    GetOutcome::Absent
                };
            }
        }
        self.get_via_peel(key)
    }

    /// Peel a clone of this sketch looking for `key`, recursing while progress is made.
    fn get_via_peel(&self, key: u64) -> GetOutcome {
        let mut peeled = self.clone();
        let mut erased = 0;
        for idx in 0..peeled.cells.len() {
            let cell = peeled.cells[idx].clone();
            if !cell.is_pure(peeled.params.check_seed) {
                continue;
            }
            if cell.key_sum == key {
                return GetOutcome::Found(cell.value_sum);
            }
            peeled.apply(-cell.count, cell.key_sum, &cell.value_sum);
            erased += 1;
        }
        if erased > 0 {
            peeled.get_via_peel(key)
        } else {
            GetOutcome::Unknown
        }
    }

    /// Peel this sketch to a fixed point, returning the inserted ("positive") and erased
    /// ("negative") entries, or [`SketchError::Unresolved`] if some cells could not be peeled.
    pub fn list_entries(&self) -> Result<ListOutcome, SketchError> {
        let mut peeled = self.clone();
        let mut positive = BTreeSet::new();
        let mut negative = BTreeSet::new();

        loop {
            let mut erased_this_pass = 0;
            for idx in 0..peeled.cells.len() {
                let cell = peeled.cells[idx].clone();
                if cell.is_empty() || !cell.is_pure(peeled.params.check_seed) {
                    continue;
                }
                if cell.count == 1 {
                    positive.insert((cell.key_sum, cell.value_sum.clone()));
                } else {
                    negative.insert((cell.key_sum, cell.value_sum.clone()));
                }
                peeled.apply(-cell.count, cell.key_sum, &cell.value_sum);
                erased_this_pass += 1;
            }
            if erased_this_pass == 0 {
                break;
            }
        }

        if peeled.cells.iter().all(Cell::is_empty) {
            Ok((positive, negative))
        } else {
            let remaining = peeled.cells.iter().filter(|c| !c.is_empty()).count();
            tracing::debug!(
                cells = peeled.params.cells,
                remaining,
                "sketch could not be fully peeled; list_entries unresolved"
            );
            Err(SketchError::Unresolved)
        }
    }

    /// Cell-wise subtraction; both sketches must share identical [`SketchParams`].
    pub fn subtract(&self, other: &Sketch) -> Result<Sketch, SketchError> {
        if self.params != other.params {
            return Err(SketchError::ParamsMismatch);
        }
        let cells = self
            .cells
            .iter()
            .zip(other.cells.iter())
            .map(|(a, b)| a.subtract(b))
            .collect();
        Ok(Sketch {
            params: self.params,
            cells,
        })
    }

    /// Encode this sketch's non-empty cells as an `IBFTable`.
    pub fn encode(&self) -> notisync_bytes::EncodeResult<Vec<u8>> {
        let wire_cells: Vec<WireCell> = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_empty())
            .map(|(index, c)| WireCell {
                index: index as u32,
                count: c.count,
                key_sum: c.key_sum,
                key_check: c.key_check,
                value_sum: c.value_sum.clone(),
            })
            .collect();
        notisync_wire::encode_ibf_table(&wire_cells)
    }

    /// Decode an `IBFTable` into a sketch with the given parameters.
    pub fn decode(bytes: &[u8], params: SketchParams) -> notisync_bytes::Result<Sketch> {
        let wire_cells = notisync_wire::decode_ibf_table(bytes)?;
        let mut sketch = Sketch::with_params(params);
        for wc in wire_cells {
            if let Some(cell) = sketch.cells.get_mut(wc.index as usize) {
                *cell = Cell {
                    count: wc.count,
                    key_sum: wc.key_sum,
                    key_check: wc.key_check,
                    value_sum: wc.value_sum,
                };
            }
        }
        Ok(sketch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get() {
        let mut s = Sketch::new(16);
        let v = s.value_for_key(100);
        s.insert(100, &v);
        assert_eq!(s.get(100), GetOutcome::Found(v));
        assert_eq!(s.get(101), GetOutcome::Absent);
    }

    #[test]
    fn insert_erase_roundtrip() {
        let mut s = Sketch::new(16);
        let v = s.value_for_key(100);
        s.insert(100, &v);
        s.erase(100, &v);
        assert!(s.cells.iter().all(Cell::is_empty));
    }

    #[test]
    fn list_entries_resolves_within_capacity() {
        let mut s = Sketch::new(16);
        let mut inserted = Vec::new();
        for k in 0..10u64 {
            let v = s.value_for_key(k);
            s.insert(k, &v);
            inserted.push((k, v));
        }
        let (positive, negative) = s.list_entries().unwrap();
        assert!(negative.is_empty());
        assert_eq!(positive.len(), 10);
        for (k, v) in inserted {
            assert!(positive.contains(&(k, v)));
        }
    }

    #[test]
    fn subtract_yields_symmetric_difference() {
        let mut a = Sketch::new(16);
        let mut b = Sketch::new(16);
        for k in 0..5u64 {
            let v = a.value_for_key(k);
            a.insert(k, &v);
        }
        for k in 3..8u64 {
            let v = b.value_for_key(k);
            b.insert(k, &v);
        }
        let diff = a.subtract(&b).unwrap();
        let (only_a, only_b) = diff.list_entries().unwrap();
        let only_a_keys: BTreeSet<u64> = only_a.iter().map(|(k, _)| *k).collect();
        let only_b_keys: BTreeSet<u64> = only_b.iter().map(|(k, _)| *k).collect();
        assert_eq!(only_a_keys, (0..3u64).collect());
        assert_eq!(only_b_keys, (5..8u64).collect());
    }

    #[test]
    fn subtract_requires_matching_params() {
        let a = Sketch::new(16);
        let b = Sketch::new(32);
        assert_eq!(a.subtract(&b), Err(SketchError::ParamsMismatch));
    }

    #[test]
    fn overload_can_be_unresolved() {
        let mut s = Sketch::new(4);
        for k in 0..40u64 {
            let v = s.value_for_key(k);
            s.insert(k, &v);
        }
        assert_eq!(s.list_entries(), Err(SketchError::Unresolved));
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut s = Sketch::new(16);
        for k in 0..10u64 {
            let v = s.value_for_key(k);
            s.insert(k, &v);
        }
        let bytes = s.encode().unwrap();
        let decoded = Sketch::decode(&bytes, s.params()).unwrap();
        assert_eq!(decoded, s);
    }

    #[test]
    fn empty_cell_clears_value_sum_after_subtract() {
        let mut a = Sketch::new(16);
        let v = a.value_for_key(9);
        a.insert(9, &v);
        let diff = a.subtract(&a.clone()).unwrap();
        assert!(diff.cells.iter().all(|c| c.is_empty() && c.value_sum.is_empty()));
    }
}
