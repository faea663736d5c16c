//! Read access shared by snapshots and write transactions
//!
//! Query evaluation only needs range scans over index keys plus dictionary
//! lookups, so both a committed snapshot ([`ReadTxn`](crate::ReadTxn)) and an
//! open write transaction ([`WriteTxn`](crate::WriteTxn)) expose exactly that
//! through [`StatementSource`]. The trait is object safe; evaluators hold it
//! as `Arc<dyn StatementSource + 'a>`.

use crate::codec::{IndexKey, KeyRange};
use crate::error::Result;
use crate::ids::ValueId;
use crate::permutation::Permutation;
use crate::value::Value;
use std::sync::Arc;

/// One bounded batch of keys from a range scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanChunk {
    /// Matching keys in ascending order
    pub keys: Vec<IndexKey>,
    /// Position to resume from; `None` once the range is exhausted.
    ///
    /// May be `Some` while `keys` is empty (every key of the chunk was
    /// hidden by pending removals).
    pub resume_after: Option<IndexKey>,
}

/// Consistent read view over index keys and the value dictionary.
pub trait StatementSource {
    /// Index permutations available for scanning, in configuration order
    fn permutations(&self) -> &[Permutation];

    /// Fetch up to roughly `limit` keys of `range` on `perm`, strictly after `after`.
    fn scan_chunk(
        &self,
        perm: Permutation,
        range: &KeyRange,
        after: Option<&IndexKey>,
        limit: usize,
    ) -> Result<ScanChunk>;

    /// Surrogate id of `value`; `None` if the value was never interned.
    fn lookup_id(&self, value: &Value) -> Result<Option<ValueId>>;

    /// Value behind `id`; `NotFound` if unknown.
    fn resolve_id(&self, id: ValueId) -> Result<Value>;

    /// Preferred number of keys per [`scan_chunk`](Self::scan_chunk) call
    fn scan_batch_size(&self) -> usize {
        256
    }
}

impl<T: StatementSource + ?Sized> StatementSource for &T {
    fn permutations(&self) -> &[Permutation] {
        (**self).permutations()
    }

    fn scan_chunk(
        &self,
        perm: Permutation,
        range: &KeyRange,
        after: Option<&IndexKey>,
        limit: usize,
    ) -> Result<ScanChunk> {
        (**self).scan_chunk(perm, range, after, limit)
    }

    fn lookup_id(&self, value: &Value) -> Result<Option<ValueId>> {
        (**self).lookup_id(value)
    }

    fn resolve_id(&self, id: ValueId) -> Result<Value> {
        (**self).resolve_id(id)
    }

    fn scan_batch_size(&self) -> usize {
        (**self).scan_batch_size()
    }
}

impl<T: StatementSource + ?Sized> StatementSource for Arc<T> {
    fn permutations(&self) -> &[Permutation] {
        (**self).permutations()
    }

    fn scan_chunk(
        &self,
        perm: Permutation,
        range: &KeyRange,
        after: Option<&IndexKey>,
        limit: usize,
    ) -> Result<ScanChunk> {
        (**self).scan_chunk(perm, range, after, limit)
    }

    fn lookup_id(&self, value: &Value) -> Result<Option<ValueId>> {
        (**self).lookup_id(value)
    }

    fn resolve_id(&self, id: ValueId) -> Result<Value> {
        (**self).resolve_id(id)
    }

    fn scan_batch_size(&self) -> usize {
        (**self).scan_batch_size()
    }
}
