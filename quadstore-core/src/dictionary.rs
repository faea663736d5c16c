//! Value dictionary
//!
//! Interns values into surrogate ids. The persisted mapping lives in the
//! `dictionary` column family and is read through the caller's snapshot, so
//! dictionary reads obey the same isolation as index reads. Two LRU caches
//! hold committed entries only; entries allocated by a write transaction stay
//! private to it until the commit batch is durable, then get published here.
//!
//! # Key layout
//!
//! - `v` + [`Value::encode`] -> id (8 bytes BE)
//! - `i` + id (8 bytes BE) -> [`Value::encode`]
//! - `m:next_id` -> next unallocated id (8 bytes BE)
//!
//! # Key invariants
//!
//! - The allocation counter only moves forward. Ids handed to a transaction
//!   that later rolls back are skipped, never reused.
//! - The persisted `m:next_id` is written by every commit, so a reopened store
//!   never allocates an id that a committed value already holds.

use crate::error::{Error, Result};
use crate::ids::ValueId;
use crate::value::Value;
use lru::LruCache;
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, Snapshot, WriteBatch, DB};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

const VALUE_PREFIX: u8 = b'v';
const ID_PREFIX: u8 = b'i';
const NEXT_ID_KEY: &[u8] = b"m:next_id";

fn value_key(value: &Value) -> Vec<u8> {
    let encoded = value.encode();
    let mut key = Vec::with_capacity(1 + encoded.len());
    key.push(VALUE_PREFIX);
    key.extend_from_slice(&encoded);
    key
}

fn id_key(id: ValueId) -> [u8; 1 + ValueId::WIDTH] {
    let mut key = [0u8; 1 + ValueId::WIDTH];
    key[0] = ID_PREFIX;
    key[1..].copy_from_slice(&id.to_be_bytes());
    key
}

fn decode_id(bytes: &[u8]) -> Result<ValueId> {
    let arr: [u8; ValueId::WIDTH] = bytes
        .try_into()
        .map_err(|_| Error::corrupt(format!("dictionary id has {} bytes", bytes.len())))?;
    Ok(ValueId::from_be_bytes(arr))
}

/// Store-scoped interning dictionary.
///
/// Created at store open and owned by the [`Store`](crate::Store); never a
/// process-wide singleton.
pub struct Dictionary {
    next_id: AtomicU64,
    by_value: Mutex<LruCache<Value, ValueId>>,
    by_id: Mutex<LruCache<ValueId, Value>>,
}

impl Dictionary {
    /// Load the allocation counter from the dictionary column family.
    pub(crate) fn load(db: &DB, cf: &ColumnFamily, cache_size: usize) -> Result<Self> {
        let next = match db.get_cf(cf, NEXT_ID_KEY)? {
            Some(bytes) => decode_id(&bytes)?,
            None => ValueId::FIRST,
        };
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        tracing::debug!(next_id = next.as_u64(), "dictionary loaded");
        Ok(Self {
            next_id: AtomicU64::new(next.as_u64()),
            by_value: Mutex::new(LruCache::new(capacity)),
            by_id: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Next id that [`allocate`](Self::allocate) would hand out
    pub fn next_id(&self) -> ValueId {
        ValueId::new(self.next_id.load(Ordering::SeqCst))
    }

    /// Number of ids allocated so far, including ids of rolled-back transactions
    pub fn allocated(&self) -> u64 {
        self.next_id().as_u64() - ValueId::FIRST.as_u64()
    }

    /// Reserve a fresh id.
    pub(crate) fn allocate(&self) -> ValueId {
        ValueId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Find the id of a committed value as seen by `snapshot`.
    pub(crate) fn lookup(
        &self,
        snapshot: &Snapshot<'_>,
        cf: &ColumnFamily,
        value: &Value,
    ) -> Result<Option<ValueId>> {
        if let Some(id) = self.by_value.lock().get(value) {
            return Ok(Some(*id));
        }
        match snapshot.get_cf(cf, value_key(value))? {
            Some(bytes) => {
                let id = decode_id(&bytes)?;
                self.cache(value.clone(), id);
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Resolve a committed id as seen by `snapshot`.
    pub(crate) fn resolve(
        &self,
        snapshot: &Snapshot<'_>,
        cf: &ColumnFamily,
        id: ValueId,
    ) -> Result<Value> {
        if let Some(value) = self.by_id.lock().get(&id) {
            return Ok(value.clone());
        }
        let bytes = snapshot
            .get_cf(cf, id_key(id))?
            .ok_or_else(|| Error::not_found(format!("value id {}", id)))?;
        let value = Value::decode(&bytes)?;
        self.cache(value.clone(), id);
        Ok(value)
    }

    /// Stage a new mapping into a commit batch.
    pub(crate) fn write_entry(batch: &mut WriteBatch, cf: &ColumnFamily, value: &Value, id: ValueId) {
        batch.put_cf(cf, value_key(value), id.to_be_bytes());
        batch.put_cf(cf, id_key(id), value.encode());
    }

    /// Stage the current allocation counter into a commit batch.
    pub(crate) fn write_next_id(&self, batch: &mut WriteBatch, cf: &ColumnFamily) {
        batch.put_cf(cf, NEXT_ID_KEY, self.next_id().to_be_bytes());
    }

    /// Make entries of a durable commit visible to the caches.
    pub(crate) fn publish<'a>(&self, entries: impl IntoIterator<Item = (&'a Value, ValueId)>) {
        for (value, id) in entries {
            self.cache(value.clone(), id);
        }
    }

    fn cache(&self, value: Value, id: ValueId) {
        self.by_id.lock().put(id, value.clone());
        self.by_value.lock().put(value, id);
    }
}

impl std::fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dictionary")
            .field("next_id", &self.next_id())
            .field("cached", &self.by_value.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_key_layout() {
        let key = id_key(ValueId::new(258));
        assert_eq!(key[0], ID_PREFIX);
        assert_eq!(&key[1..], &[0, 0, 0, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn test_value_keys_distinguish_kinds() {
        assert_ne!(value_key(&Value::iri("x")), value_key(&Value::blank("x")));
        assert_ne!(value_key(&Value::iri("x")), value_key(&Value::string("x")));
        assert_eq!(value_key(&Value::iri("x"))[0], VALUE_PREFIX);
    }

    #[test]
    fn test_decode_id_rejects_wrong_width() {
        assert!(decode_id(&[1, 2, 3]).is_err());
        assert_eq!(decode_id(&7u64.to_be_bytes()).unwrap(), ValueId::new(7));
    }
}
