//! Integration tests for the RocksDB-backed store
//!
//! Covers index consistency across permutations, snapshot isolation,
//! rollback, persistence across reopen, index set changes and the commit
//! validation hook.

use quadstore_core::{
    decode_key, ChangeSet, ChangeValidator, ContextFilter, Error, KeyRange, KeyScan, Permutation,
    Quad, QuadPattern, ReadTxn, Statement, StatementFilter, StatementSource, Store, StoreConfig,
    Value,
};
use std::collections::BTreeSet;
use std::sync::{mpsc, Arc};
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("quadstore_core=debug")
        .try_init();
}

fn open(dir: &TempDir) -> Store {
    Store::open(StoreConfig::new(dir.path()).with_sync_commits(false)).unwrap()
}

fn iri(s: &str) -> Value {
    Value::iri(format!("http://example.org/{}", s))
}

fn stmt(s: &str, p: &str, o: &str) -> Statement {
    Statement::new(iri(s), iri(p), iri(o))
}

/// Full scan of one permutation, as a set of quads
fn scan_index<S: StatementSource>(source: S, perm: Permutation) -> BTreeSet<Quad> {
    KeyScan::new(source, perm, KeyRange::full())
        .map(|k| decode_key(&k.unwrap(), perm))
        .collect()
}

fn all_index_contents(read: &ReadTxn<'_>) -> Vec<BTreeSet<Quad>> {
    read.store()
        .permutations()
        .iter()
        .map(|perm| scan_index(read, *perm))
        .collect()
}

#[test]
fn test_add_then_remove_in_one_transaction_leaves_store_unchanged() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let mut txn = store.begin_write().unwrap();
    txn.add(&stmt("a", "p", "b")).unwrap();
    txn.commit().unwrap();
    let before = all_index_contents(&store.begin_read().unwrap());

    let batch = vec![stmt("x", "p", "y"), stmt("x", "q", "z"), stmt("a", "p", "c")];
    let mut txn = store.begin_write().unwrap();
    for s in &batch {
        assert!(txn.add(s).unwrap());
    }
    for s in &batch {
        assert!(txn.remove(s).unwrap());
    }
    let receipt = txn.commit().unwrap();
    assert_eq!(receipt.added, 0);
    assert_eq!(receipt.removed, 0);

    let after = all_index_contents(&store.begin_read().unwrap());
    assert_eq!(before, after);
}

#[test]
fn test_every_permutation_holds_the_same_statements() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let mut txn = store.begin_write().unwrap();
    for i in 0..20 {
        let s = format!("s{}", i % 4);
        let p = format!("p{}", i % 3);
        let o = format!("o{}", i);
        txn.add(&stmt(&s, &p, &o)).unwrap();
        if i % 5 == 0 {
            txn.add(&Statement::in_context(iri(&s), iri(&p), Value::integer(i), iri("g1")))
                .unwrap();
        }
    }
    txn.commit().unwrap();

    let mut txn = store.begin_write().unwrap();
    txn.remove(&stmt("s1", "p1", "o1")).unwrap();
    txn.remove(&stmt("s2", "p2", "o2")).unwrap();
    txn.commit().unwrap();

    let read = store.begin_read().unwrap();
    let contents = all_index_contents(&read);
    assert_eq!(contents.len(), 6);
    assert_eq!(contents[0].len(), 22);
    for other in &contents[1..] {
        assert_eq!(&contents[0], other);
    }
}

#[test]
fn test_pattern_scan_over_default_graph() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let mut txn = store.begin_write().unwrap();
    txn.add(&stmt("a", "p", "b")).unwrap();
    txn.add(&stmt("a", "p", "c")).unwrap();
    txn.add(&Statement::in_context(iri("a"), iri("p"), iri("d"), iri("g"))).unwrap();
    txn.commit().unwrap();

    let read = store.begin_read().unwrap();
    let filter = StatementFilter::new(Some(iri("a")), Some(iri("p")), None)
        .in_context(ContextFilter::Default);
    let objects: BTreeSet<Value> = read
        .statements(&filter)
        .unwrap()
        .into_iter()
        .map(|s| s.object)
        .collect();
    assert_eq!(objects, BTreeSet::from([iri("b"), iri("c")]));

    // unknown value: empty, not an error
    let unknown = StatementFilter::new(Some(iri("never-interned")), None, None);
    assert!(read.statements(&unknown).unwrap().is_empty());
}

#[test]
fn test_reader_snapshot_ignores_later_commit() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let read = store.begin_read().unwrap();
    let (done_tx, done_rx) = mpsc::channel();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            let mut txn = store.begin_write().unwrap();
            txn.add(&stmt("x", "y", "z")).unwrap();
            txn.commit().unwrap();
            done_tx.send(()).unwrap();
        });
        done_rx.recv().unwrap();
    });

    let filter = StatementFilter::new(Some(iri("x")), Some(iri("y")), None);
    assert!(read.statements(&filter).unwrap().is_empty());
    assert_eq!(read.size(&ContextFilter::Any).unwrap(), 0);

    let fresh = store.begin_read().unwrap();
    assert_eq!(fresh.statements(&filter).unwrap().len(), 1);
}

#[test]
fn test_single_writer() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let txn = store.begin_write().unwrap();
    std::thread::scope(|scope| {
        let blocked = scope.spawn(|| store.try_begin_write().unwrap().is_none());
        assert!(blocked.join().unwrap());
    });
    // readers are not blocked by the writer
    assert!(store.begin_read().is_ok());
    txn.rollback();
    assert!(store.try_begin_write().unwrap().is_some());
}

#[test]
fn test_rollback_and_drop_discard_changes() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let mut txn = store.begin_write().unwrap();
    txn.add(&stmt("a", "p", "b")).unwrap();
    let rolled_back_id = txn.lookup(&iri("a")).unwrap().unwrap();
    txn.rollback();

    {
        let mut txn = store.begin_write().unwrap();
        txn.add(&stmt("a", "p", "c")).unwrap();
        // dropped without commit
    }

    let read = store.begin_read().unwrap();
    assert_eq!(read.size(&ContextFilter::Any).unwrap(), 0);
    assert_eq!(read.lookup(&iri("a")).unwrap(), None);

    // ids handed out to rolled back transactions are never reused
    let mut txn = store.begin_write().unwrap();
    let id = txn.intern(&iri("fresh")).unwrap();
    assert!(id > rolled_back_id);
    txn.rollback();
}

#[test]
fn test_write_transaction_reads_its_own_writes() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let mut txn = store.begin_write().unwrap();
    txn.add(&stmt("a", "p", "b")).unwrap();
    txn.add(&stmt("a", "p", "c")).unwrap();
    txn.commit().unwrap();

    let mut txn = store.begin_write().unwrap();
    txn.remove(&stmt("a", "p", "b")).unwrap();
    txn.add(&stmt("a", "p", "d")).unwrap();

    let objects: BTreeSet<Value> = txn
        .statements(&StatementFilter::new(Some(iri("a")), None, None))
        .unwrap()
        .into_iter()
        .map(|s| s.object)
        .collect();
    assert_eq!(objects, BTreeSet::from([iri("c"), iri("d")]));

    // other readers still see the committed state
    let read = store.begin_read().unwrap();
    assert_eq!(read.size(&ContextFilter::Any).unwrap(), 2);
    assert_eq!(read.lookup(&iri("d")).unwrap(), None);
    drop(read);

    txn.commit().unwrap();
    let read = store.begin_read().unwrap();
    assert_eq!(read.size(&ContextFilter::Any).unwrap(), 2);
    assert!(read.lookup(&iri("d")).unwrap().is_some());
}

#[test]
fn test_small_scan_batches_with_pending_changes() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store =
        Store::open(StoreConfig::new(dir.path()).with_scan_batch_size(2).with_sync_commits(false))
            .unwrap();

    let mut txn = store.begin_write().unwrap();
    for i in 0..9 {
        txn.add(&stmt("s", "p", &format!("o{}", i))).unwrap();
    }
    txn.commit().unwrap();

    let mut txn = store.begin_write().unwrap();
    for i in 0..6 {
        txn.remove(&stmt("s", "p", &format!("o{}", i))).unwrap();
    }
    txn.add(&stmt("s", "p", "zz")).unwrap();

    let s = txn.lookup(&iri("s")).unwrap();
    let quads: Vec<Quad> = txn
        .scan(QuadPattern {
            s,
            ..Default::default()
        })
        .unwrap()
        .map(|q| q.unwrap())
        .collect();
    assert_eq!(quads.len(), 4);
    txn.rollback();
}

#[test]
fn test_contexts_and_clear() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let mut txn = store.begin_write().unwrap();
    txn.add(&stmt("a", "p", "b")).unwrap();
    txn.add(&Statement::in_context(iri("a"), iri("p"), iri("b"), iri("g1"))).unwrap();
    txn.add(&Statement::in_context(iri("c"), iri("p"), iri("d"), iri("g2"))).unwrap();
    txn.add(&Statement::in_context(iri("e"), iri("p"), iri("f"), iri("g2"))).unwrap();
    txn.commit().unwrap();

    let read = store.begin_read().unwrap();
    assert_eq!(read.contexts().unwrap(), vec![iri("g1"), iri("g2")]);
    assert_eq!(read.size(&ContextFilter::Any).unwrap(), 4);
    assert_eq!(read.size(&ContextFilter::Default).unwrap(), 1);
    assert_eq!(read.size(&ContextFilter::Named(iri("g2"))).unwrap(), 2);
    drop(read);

    let mut txn = store.begin_write().unwrap();
    assert_eq!(txn.clear(&ContextFilter::Named(iri("g2"))).unwrap(), 2);
    txn.commit().unwrap();

    let read = store.begin_read().unwrap();
    assert_eq!(read.contexts().unwrap(), vec![iri("g1")]);
    assert_eq!(read.size(&ContextFilter::Any).unwrap(), 2);
}

#[test]
fn test_contexts_agree_with_and_without_context_leading_index() {
    init_tracing();
    for indexes in ["cspo,spoc", "spoc,posc"] {
        let dir = TempDir::new().unwrap();
        let store = Store::open(
            StoreConfig::new(dir.path())
                .with_sync_commits(false)
                .with_indexes(indexes),
        )
        .unwrap();

        let mut txn = store.begin_write().unwrap();
        txn.add(&stmt("a", "p", "b")).unwrap();
        for (s, g) in [("a", "g1"), ("b", "g2"), ("c", "g2"), ("d", "g3")] {
            txn.add(&Statement::in_context(iri(s), iri("p"), iri("o"), iri(g)))
                .unwrap();
        }
        txn.commit().unwrap();
        assert_eq!(
            store.begin_read().unwrap().contexts().unwrap(),
            vec![iri("g1"), iri("g2"), iri("g3")],
            "indexes {}",
            indexes
        );

        // pending changes: g2 emptied, g4 added
        let mut txn = store.begin_write().unwrap();
        txn.clear(&ContextFilter::Named(iri("g2"))).unwrap();
        txn.add(&Statement::in_context(iri("e"), iri("p"), iri("o"), iri("g4")))
            .unwrap();
        assert_eq!(
            txn.contexts().unwrap(),
            vec![iri("g1"), iri("g3"), iri("g4")],
            "indexes {}",
            indexes
        );
        txn.rollback();
    }
}

#[test]
fn test_reopen_persists_statements_and_dictionary() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let first_id = {
        let store = open(&dir);
        let mut txn = store.begin_write().unwrap();
        txn.add(&stmt("a", "p", "b")).unwrap();
        let id = txn.lookup(&iri("a")).unwrap().unwrap();
        txn.commit().unwrap();
        store.close().unwrap();
        assert!(store.begin_read().is_err());
        id
    };

    let store = open(&dir);
    let read = store.begin_read().unwrap();
    assert_eq!(read.lookup(&iri("a")).unwrap(), Some(first_id));
    assert_eq!(read.resolve(first_id).unwrap(), iri("a"));
    assert_eq!(read.size(&ContextFilter::Any).unwrap(), 1);
    drop(read);

    let mut txn = store.begin_write().unwrap();
    assert!(txn.intern(&iri("new")).unwrap() > first_id);
    txn.rollback();
}

#[test]
fn test_resolve_unknown_id_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let read = store.begin_read().unwrap();
    let err = read.resolve(quadstore_core::ValueId::new(9_999)).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn test_reopen_with_new_index_set_rebuilds_and_drops() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    {
        let store = Store::open(
            StoreConfig::new(dir.path())
                .with_indexes("spoc,posc")
                .with_sync_commits(false),
        )
        .unwrap();
        let mut txn = store.begin_write().unwrap();
        txn.add(&stmt("a", "p", "b")).unwrap();
        txn.add(&stmt("c", "q", "d")).unwrap();
        txn.commit().unwrap();
    }

    let store = Store::open(
        StoreConfig::new(dir.path())
            .with_indexes("posc,ospc")
            .with_sync_commits(false),
    )
    .unwrap();
    let ospc: Permutation = "ospc".parse().unwrap();
    assert_eq!(store.permutations(), &[Permutation::POSC, ospc]);

    let read = store.begin_read().unwrap();
    let posc = scan_index(&read, Permutation::POSC);
    assert_eq!(posc.len(), 2);
    assert_eq!(scan_index(&read, ospc), posc);

    // dropped index is no longer scannable
    let err = read
        .scan_chunk(Permutation::SPOC, &KeyRange::full(), None, 10)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidIndex(_)));
}

struct RejectPredicate {
    predicate: Value,
}

impl ChangeValidator for RejectPredicate {
    fn validate(&self, changes: &ChangeSet) -> quadstore_core::Result<()> {
        if changes.added.iter().any(|s| s.predicate == self.predicate) {
            return Err(Error::validation("forbidden predicate"));
        }
        Ok(())
    }
}

#[test]
fn test_validator_veto_rolls_back() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    store.set_validator(Some(Arc::new(RejectPredicate {
        predicate: iri("forbidden"),
    })));

    let mut txn = store.begin_write().unwrap();
    txn.add(&stmt("a", "p", "b")).unwrap();
    txn.add(&stmt("a", "forbidden", "c")).unwrap();
    let err = txn.commit().unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let read = store.begin_read().unwrap();
    assert_eq!(read.size(&ContextFilter::Any).unwrap(), 0);
    drop(read);

    let mut txn = store.begin_write().unwrap();
    txn.add(&stmt("a", "p", "b")).unwrap();
    assert_eq!(txn.commit().unwrap().added, 1);
}

#[test]
fn test_invalid_statement_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let mut txn = store.begin_write().unwrap();
    let err = txn
        .add(&Statement::new(Value::string("lit"), iri("p"), iri("o")))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidStatement(_)));
    assert!(txn.is_clean());
    txn.rollback();
}
