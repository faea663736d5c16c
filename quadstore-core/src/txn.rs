//! Read snapshots and the write transaction
//!
//! A [`ReadTxn`] is a RocksDB snapshot plus access to the dictionary through
//! that snapshot. A [`WriteTxn`] owns the store's writer lock, a base
//! snapshot taken after acquiring it, and an [`Overlay`] of pending changes.
//! Reads through a `WriteTxn` see the base merged with its own pending
//! changes; nothing becomes visible to other transactions before `commit`.

use crate::codec::{decode_key, encode_key, IndexKey, KeyRange};
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::ids::ValueId;
use crate::inspect;
use crate::overlay::{merge, Change, Overlay};
use crate::permutation::Permutation;
use crate::scan::PatternScan;
use crate::source::{ScanChunk, StatementSource};
use crate::statement::{ContextFilter, Quad, QuadPattern, Statement, StatementFilter};
use crate::store::Store;
use crate::validation::ChangeSet;
use crate::value::Value;
use parking_lot::MutexGuard;
use rocksdb::{Direction, IteratorMode, Snapshot, WriteBatch};
use rustc_hash::FxHashMap;

// ============================================================================
// ReadTxn
// ============================================================================

/// Immutable view of the committed store as of the moment it was opened.
pub struct ReadTxn<'s> {
    store: &'s Store,
    snapshot: Snapshot<'s>,
}

impl<'s> ReadTxn<'s> {
    pub(crate) fn new(store: &'s Store, snapshot: Snapshot<'s>) -> Self {
        Self { store, snapshot }
    }

    pub fn store(&self) -> &'s Store {
        self.store
    }

    /// Id of a committed value; `None` if it was never interned.
    pub fn lookup(&self, value: &Value) -> Result<Option<ValueId>> {
        let cf = self.store.dictionary_cf()?;
        self.store.dictionary().lookup(&self.snapshot, cf, value)
    }

    /// Value of a committed id
    pub fn resolve(&self, id: ValueId) -> Result<Value> {
        let cf = self.store.dictionary_cf()?;
        self.store.dictionary().resolve(&self.snapshot, cf, id)
    }

    pub fn contains(&self, quad: &Quad) -> Result<bool> {
        let perm = self.primary()?;
        self.contains_key(perm, &encode_key(quad, perm))
    }

    /// Quads matching `pattern`, lazily
    pub fn scan(&self, pattern: QuadPattern) -> Result<PatternScan<&Self>> {
        PatternScan::new(self, pattern)
    }

    pub fn statements(&self, filter: &StatementFilter) -> Result<Vec<Statement>> {
        inspect::statements(self, filter)
    }

    pub fn size(&self, context: &ContextFilter) -> Result<u64> {
        inspect::count(self, &StatementFilter::all().in_context(context.clone()))
    }

    pub fn contexts(&self) -> Result<Vec<Value>> {
        inspect::contexts(self)
    }

    fn primary(&self) -> Result<Permutation> {
        self.store
            .permutations()
            .first()
            .copied()
            .ok_or_else(|| Error::invalid_index("store has no index permutations"))
    }

    fn contains_key(&self, perm: Permutation, key: &IndexKey) -> Result<bool> {
        let cf = self.store.index_cf(perm)?;
        Ok(self.snapshot.get_cf(cf, key.as_bytes())?.is_some())
    }

    /// Committed keys of `range` after `after`, at most `limit`; the flag is
    /// true when the limit was reached and more keys may follow.
    fn base_chunk(
        &self,
        perm: Permutation,
        range: &KeyRange,
        after: Option<&IndexKey>,
        limit: usize,
    ) -> Result<(Vec<IndexKey>, bool)> {
        let cf = self.store.index_cf(perm)?;
        let start = after.copied().unwrap_or(range.lower);
        let iter = self
            .snapshot
            .iterator_cf(cf, IteratorMode::From(start.as_bytes(), Direction::Forward));

        let mut keys = Vec::with_capacity(limit.min(1024));
        for item in iter {
            let (raw, _) = item?;
            let key = IndexKey::from_slice(&raw)?;
            if Some(&key) == after {
                continue;
            }
            if !range.below_upper(&key) {
                return Ok((keys, false));
            }
            keys.push(key);
            if keys.len() >= limit {
                return Ok((keys, true));
            }
        }
        Ok((keys, false))
    }
}

impl StatementSource for ReadTxn<'_> {
    fn permutations(&self) -> &[Permutation] {
        self.store.permutations()
    }

    fn scan_chunk(
        &self,
        perm: Permutation,
        range: &KeyRange,
        after: Option<&IndexKey>,
        limit: usize,
    ) -> Result<ScanChunk> {
        let (keys, more) = self.base_chunk(perm, range, after, limit.max(1))?;
        let resume_after = if more { keys.last().copied() } else { None };
        Ok(ScanChunk { keys, resume_after })
    }

    fn lookup_id(&self, value: &Value) -> Result<Option<ValueId>> {
        self.lookup(value)
    }

    fn resolve_id(&self, id: ValueId) -> Result<Value> {
        self.resolve(id)
    }

    fn scan_batch_size(&self) -> usize {
        self.store.config().scan_batch_size
    }
}

// ============================================================================
// WriteTxn
// ============================================================================

/// Counts reported by a successful commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Statements that became present
    pub added: usize,
    /// Statements that became absent
    pub removed: usize,
    /// Values interned by the transaction
    pub new_values: usize,
}

/// The store's single write transaction.
///
/// Dropping it without [`commit`](Self::commit) rolls it back.
pub struct WriteTxn<'s> {
    _guard: MutexGuard<'s, ()>,
    base: ReadTxn<'s>,
    overlay: Overlay,
    pending_values: FxHashMap<Value, ValueId>,
    pending_ids: FxHashMap<ValueId, Value>,
    finished: bool,
}

impl<'s> WriteTxn<'s> {
    pub(crate) fn new(guard: MutexGuard<'s, ()>, base: ReadTxn<'s>) -> Self {
        let overlay = Overlay::new(base.store.permutations());
        Self {
            _guard: guard,
            base,
            overlay,
            pending_values: FxHashMap::default(),
            pending_ids: FxHashMap::default(),
            finished: false,
        }
    }

    pub fn store(&self) -> &'s Store {
        self.base.store
    }

    /// True if no change is pending
    pub fn is_clean(&self) -> bool {
        self.overlay.is_empty()
    }

    /// Id of `value`, allocating one if it was never interned.
    ///
    /// New entries are private to this transaction until commit.
    pub fn intern(&mut self, value: &Value) -> Result<ValueId> {
        if let Some(id) = self.pending_values.get(value) {
            return Ok(*id);
        }
        if let Some(id) = self.base.lookup(value)? {
            return Ok(id);
        }
        let id = self.base.store.dictionary().allocate();
        tracing::trace!(id = id.as_u64(), value = %value, "interned new value");
        self.pending_values.insert(value.clone(), id);
        self.pending_ids.insert(id, value.clone());
        Ok(id)
    }

    /// Id of `value` without allocating
    pub fn lookup(&self, value: &Value) -> Result<Option<ValueId>> {
        if let Some(id) = self.pending_values.get(value) {
            return Ok(Some(*id));
        }
        self.base.lookup(value)
    }

    pub fn resolve(&self, id: ValueId) -> Result<Value> {
        if let Some(value) = self.pending_ids.get(&id) {
            return Ok(value.clone());
        }
        self.base.resolve(id)
    }

    /// Stage a statement. Returns true if it was not already present.
    pub fn add(&mut self, statement: &Statement) -> Result<bool> {
        statement.validate()?;
        if let Some(validator) = self.base.store.validator() {
            validator.check_statement(statement)?;
        }
        let quad = Quad::new(
            self.intern(&statement.subject)?,
            self.intern(&statement.predicate)?,
            self.intern(&statement.object)?,
            match &statement.context {
                Some(ctx) => self.intern(ctx)?,
                None => ValueId::DEFAULT_GRAPH,
            },
        );
        let present = self.contains(&quad)?;
        self.overlay.record(&quad, Change::Assert);
        Ok(!present)
    }

    /// Stage removal of one statement. Returns true if it was present.
    pub fn remove(&mut self, statement: &Statement) -> Result<bool> {
        let ids = [
            self.lookup(&statement.subject)?,
            self.lookup(&statement.predicate)?,
            self.lookup(&statement.object)?,
            match &statement.context {
                Some(ctx) => self.lookup(ctx)?,
                None => Some(ValueId::DEFAULT_GRAPH),
            },
        ];
        let [Some(s), Some(p), Some(o), Some(c)] = ids else {
            return Ok(false);
        };
        self.remove_quad(&Quad::new(s, p, o, c))
    }

    /// Stage removal of a quad. Returns true if it was present.
    pub fn remove_quad(&mut self, quad: &Quad) -> Result<bool> {
        if !self.contains(quad)? {
            return Ok(false);
        }
        self.overlay.record(quad, Change::Retract);
        Ok(true)
    }

    /// Stage removal of every statement matching `filter`; returns how many.
    pub fn remove_matching(&mut self, filter: &StatementFilter) -> Result<usize> {
        let Some(pattern) = inspect::resolve_filter(&*self, filter)? else {
            return Ok(0);
        };
        let quads = PatternScan::new(&*self, pattern)?.collect::<Result<Vec<Quad>>>()?;
        for quad in &quads {
            self.overlay.record(quad, Change::Retract);
        }
        tracing::debug!(removed = quads.len(), "staged pattern removal");
        Ok(quads.len())
    }

    /// Remove every statement in the given graph scope.
    pub fn clear(&mut self, context: &ContextFilter) -> Result<usize> {
        self.remove_matching(&StatementFilter::all().in_context(context.clone()))
    }

    /// Stage a raw key of `perm`; the decoded quad is staged in every permutation.
    pub fn put_key(&mut self, perm: Permutation, key: &IndexKey) -> Result<()> {
        self.base.store.index_cf(perm)?;
        self.overlay.record(&decode_key(key, perm), Change::Assert);
        Ok(())
    }

    /// Stage deletion of a raw key of `perm` in every permutation.
    pub fn delete_key(&mut self, perm: Permutation, key: &IndexKey) -> Result<()> {
        self.base.store.index_cf(perm)?;
        self.overlay.record(&decode_key(key, perm), Change::Retract);
        Ok(())
    }

    /// Presence of `quad` including pending changes
    pub fn contains(&self, quad: &Quad) -> Result<bool> {
        let perm = self.base.primary()?;
        let key = encode_key(quad, perm);
        match self.overlay.get(perm, &key) {
            Some(Change::Assert) => Ok(true),
            Some(Change::Retract) => Ok(false),
            None => self.base.contains_key(perm, &key),
        }
    }

    pub fn scan(&self, pattern: QuadPattern) -> Result<PatternScan<&Self>> {
        PatternScan::new(self, pattern)
    }

    pub fn statements(&self, filter: &StatementFilter) -> Result<Vec<Statement>> {
        inspect::statements(self, filter)
    }

    pub fn size(&self, context: &ContextFilter) -> Result<u64> {
        inspect::count(self, &StatementFilter::all().in_context(context.clone()))
    }

    pub fn contexts(&self) -> Result<Vec<Value>> {
        inspect::contexts(self)
    }

    /// Net changes against the base snapshot, as quads
    fn net_changes(&self) -> Result<(Vec<Quad>, Vec<Quad>)> {
        let mut added = Vec::new();
        let mut removed = Vec::new();
        for (perm, key, change) in self.overlay.changes() {
            let in_base = self.base.contains_key(perm, key)?;
            match change {
                Change::Assert if !in_base => added.push(decode_key(key, perm)),
                Change::Retract if in_base => removed.push(decode_key(key, perm)),
                _ => {}
            }
        }
        Ok((added, removed))
    }

    /// The net change set, resolved to statements
    pub fn change_set(&self) -> Result<ChangeSet> {
        let (added, removed) = self.net_changes()?;
        Ok(ChangeSet {
            added: added
                .iter()
                .map(|q| inspect::quad_to_statement(self, q))
                .collect::<Result<_>>()?,
            removed: removed
                .iter()
                .map(|q| inspect::quad_to_statement(self, q))
                .collect::<Result<_>>()?,
        })
    }

    /// Validate and durably publish every pending change atomically.
    ///
    /// On failure nothing is written and the transaction is rolled back.
    pub fn commit(mut self) -> Result<CommitReceipt> {
        let span = tracing::debug_span!("commit", pending = self.overlay.len());
        let _enter = span.enter();

        let result = self.write_commit();
        self.finished = true;
        match &result {
            Ok(receipt) => tracing::debug!(
                added = receipt.added,
                removed = receipt.removed,
                new_values = receipt.new_values,
                "transaction committed"
            ),
            Err(e) => tracing::warn!(error = %e, "commit failed; transaction rolled back"),
        }
        result
    }

    fn write_commit(&mut self) -> Result<CommitReceipt> {
        let store = self.base.store;
        // a store closed after this transaction began has already been flushed
        store.ensure_open()?;
        let (added, removed) = self.net_changes()?;

        if let Some(validator) = store.validator() {
            validator.validate(&self.change_set()?)?;
        }

        let receipt = CommitReceipt {
            added: added.len(),
            removed: removed.len(),
            new_values: self.pending_values.len(),
        };
        if self.overlay.is_empty() && self.pending_values.is_empty() {
            return Ok(receipt);
        }

        let mut batch = WriteBatch::default();
        for (perm, changes) in self.overlay.per_permutation() {
            let cf = store.index_cf(perm)?;
            for (key, change) in changes {
                match change {
                    Change::Assert => batch.put_cf(cf, key.as_bytes(), b""),
                    Change::Retract => batch.delete_cf(cf, key.as_bytes()),
                }
            }
        }
        let dict_cf = store.dictionary_cf()?;
        for (value, id) in &self.pending_values {
            Dictionary::write_entry(&mut batch, dict_cf, value, *id);
        }
        store.dictionary().write_next_id(&mut batch, dict_cf);

        store.write_batch(batch)?;

        store
            .dictionary()
            .publish(self.pending_values.iter().map(|(v, id)| (v, *id)));
        Ok(receipt)
    }

    /// Discard every pending change.
    pub fn rollback(mut self) {
        self.discard();
        tracing::debug!("transaction rolled back");
    }

    fn discard(&mut self) {
        self.finished = true;
        self.overlay.clear();
        self.pending_values.clear();
        self.pending_ids.clear();
    }
}

impl StatementSource for WriteTxn<'_> {
    fn permutations(&self) -> &[Permutation] {
        self.base.store.permutations()
    }

    fn scan_chunk(
        &self,
        perm: Permutation,
        range: &KeyRange,
        after: Option<&IndexKey>,
        limit: usize,
    ) -> Result<ScanChunk> {
        let (base_keys, more) = self.base.base_chunk(perm, range, after, limit.max(1))?;
        let until = if more { base_keys.last().copied() } else { None };
        let pending = self.overlay.window(perm, range, after, until.as_ref());
        Ok(ScanChunk {
            keys: merge(base_keys, pending),
            resume_after: until,
        })
    }

    fn lookup_id(&self, value: &Value) -> Result<Option<ValueId>> {
        self.lookup(value)
    }

    fn resolve_id(&self, id: ValueId) -> Result<Value> {
        self.resolve(id)
    }

    fn scan_batch_size(&self) -> usize {
        self.base.scan_batch_size()
    }
}

impl Drop for WriteTxn<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                pending = self.overlay.len(),
                "write transaction dropped without commit or rollback; rolling back"
            );
            self.discard();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> Store {
        Store::open(StoreConfig::new(dir.path()).with_sync_commits(false)).unwrap()
    }

    fn iri(s: &str) -> Value {
        Value::iri(format!("http://example.org/{}", s))
    }

    fn stmt(s: &str, p: &str, o: &str) -> Statement {
        Statement::new(iri(s), iri(p), iri(o))
    }

    #[test]
    fn test_failed_commit_write_leaves_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let mut txn = store.begin_write().unwrap();
        txn.add(&stmt("a", "p", "b")).unwrap();
        txn.commit().unwrap();
        let before = store
            .begin_read()
            .unwrap()
            .statements(&StatementFilter::all())
            .unwrap();
        let next_before = store.dictionary().next_id();

        let mut txn = store.begin_write().unwrap();
        txn.add(&stmt("a", "p", "c")).unwrap();
        assert!(txn.remove(&stmt("a", "p", "b")).unwrap());
        let lost_id = txn.lookup(&iri("c")).unwrap().unwrap();
        store.fail_next_write();
        let err = txn.commit().unwrap_err();
        assert!(matches!(err, Error::StorageIo(_)));

        let read = store.begin_read().unwrap();
        assert_eq!(read.statements(&StatementFilter::all()).unwrap(), before);
        assert_eq!(read.lookup(&iri("c")).unwrap(), None);
        assert!(matches!(read.resolve(lost_id), Err(Error::NotFound(_))));
        assert!(store.dictionary().next_id() > next_before);
        drop(read);

        // the id handed to the failed commit is never reused
        let mut txn = store.begin_write().unwrap();
        txn.add(&stmt("a", "p", "c")).unwrap();
        let id = txn.lookup(&iri("c")).unwrap().unwrap();
        assert!(id > lost_id);
        txn.commit().unwrap();
        let read = store.begin_read().unwrap();
        assert_eq!(read.lookup(&iri("c")).unwrap(), Some(id));
        assert_eq!(read.size(&ContextFilter::Any).unwrap(), 2);
    }

    #[test]
    fn test_commit_after_store_close_is_rejected() {
        let dir = TempDir::new().unwrap();
        {
            let store = open(&dir);
            let mut txn = store.begin_write().unwrap();
            txn.add(&stmt("a", "p", "b")).unwrap();
            store.close().unwrap();
            let err = txn.commit().unwrap_err();
            assert!(matches!(err, Error::StorageIo(_)));
        }
        let store = open(&dir);
        let read = store.begin_read().unwrap();
        assert_eq!(read.size(&ContextFilter::Any).unwrap(), 0);
        assert_eq!(read.lookup(&iri("a")).unwrap(), None);
    }
}
