//! Index key codec
//!
//! A key is the quad's four surrogate ids written big-endian in permutation
//! order, so lexicographic byte order equals the permutation's component
//! order. Keys are fixed width, which makes the encoding total and injective
//! and lets every partially bound pattern map to one contiguous range:
//!
//! ```text
//! spoc key: [s u64 BE][p u64 BE][o u64 BE][c u64 BE]   (32 bytes)
//! ```

use crate::error::{Error, Result};
use crate::ids::ValueId;
use crate::permutation::Permutation;
use crate::statement::{Quad, QuadPattern};
use std::fmt;

/// Encoded key width in bytes
pub const KEY_LEN: usize = 4 * ValueId::WIDTH;

/// Sortable byte key for one permutation
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey([u8; KEY_LEN]);

impl IndexKey {
    pub const MIN: IndexKey = IndexKey([0u8; KEY_LEN]);

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Parse stored key bytes; rejects anything that is not exactly `KEY_LEN` long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            Error::corrupt(format!(
                "index key has {} bytes, expected {}",
                bytes.len(),
                KEY_LEN
            ))
        })?;
        Ok(IndexKey(arr))
    }

    fn slot(&self, idx: usize) -> ValueId {
        let start = idx * ValueId::WIDTH;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[start..start + ValueId::WIDTH]);
        ValueId::from_be_bytes(buf)
    }
}

impl fmt::Debug for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IndexKey({}, {}, {}, {})",
            self.slot(0).as_u64(),
            self.slot(1).as_u64(),
            self.slot(2).as_u64(),
            self.slot(3).as_u64()
        )
    }
}

/// Encode a quad for the given permutation
pub fn encode_key(quad: &Quad, perm: Permutation) -> IndexKey {
    let mut out = [0u8; KEY_LEN];
    for (idx, component) in perm.order().iter().enumerate() {
        let start = idx * ValueId::WIDTH;
        out[start..start + ValueId::WIDTH].copy_from_slice(&quad.get(*component).to_be_bytes());
    }
    IndexKey(out)
}

/// Decode a key written by [`encode_key`] with the same permutation
pub fn decode_key(key: &IndexKey, perm: Permutation) -> Quad {
    let mut quad = Quad::new(
        ValueId::DEFAULT_GRAPH,
        ValueId::DEFAULT_GRAPH,
        ValueId::DEFAULT_GRAPH,
        ValueId::DEFAULT_GRAPH,
    );
    for (idx, component) in perm.order().iter().enumerate() {
        quad.set(*component, key.slot(idx));
    }
    quad
}

/// Half-open key range: `lower <= key < upper`, unbounded above when `upper` is `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyRange {
    pub lower: IndexKey,
    pub upper: Option<IndexKey>,
}

impl KeyRange {
    /// The whole index
    pub fn full() -> Self {
        Self {
            lower: IndexKey::MIN,
            upper: None,
        }
    }

    pub fn contains(&self, key: &IndexKey) -> bool {
        *key >= self.lower && self.below_upper(key)
    }

    /// True if `key` lies below the upper bound
    pub fn below_upper(&self, key: &IndexKey) -> bool {
        self.upper.map_or(true, |upper| *key < upper)
    }
}

/// Build the contiguous range covering every quad matching the bound prefix
/// of `pattern` under `perm`.
///
/// Only the leading bound components narrow the range; bound components
/// after the first unbound one must be checked per key by the caller.
pub fn range_for(pattern: &QuadPattern, perm: Permutation) -> KeyRange {
    let prefix_len = perm.bound_prefix_len(pattern);
    if prefix_len == 0 {
        return KeyRange::full();
    }

    let mut lower = [0u8; KEY_LEN];
    for (idx, component) in perm.order().iter().take(prefix_len).enumerate() {
        // bound by construction of prefix_len
        let id = pattern.get(*component).unwrap_or(ValueId::DEFAULT_GRAPH);
        let start = idx * ValueId::WIDTH;
        lower[start..start + ValueId::WIDTH].copy_from_slice(&id.to_be_bytes());
    }

    let prefix_bytes = prefix_len * ValueId::WIDTH;
    let upper = prefix_successor(&lower[..prefix_bytes]).map(|succ| {
        let mut upper = [0u8; KEY_LEN];
        upper[..prefix_bytes].copy_from_slice(&succ);
        IndexKey(upper)
    });

    KeyRange {
        lower: IndexKey(lower),
        upper,
    }
}

/// Smallest byte string of the same length greater than every string with
/// `prefix` as prefix; `None` when the prefix is all `0xFF`.
fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut out = prefix.to_vec();
    for idx in (0..out.len()).rev() {
        if out[idx] == 0xFF {
            out[idx] = 0;
        } else {
            out[idx] += 1;
            return Some(out);
        }
    }
    None
}
