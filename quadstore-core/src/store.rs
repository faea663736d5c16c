//! Persistent multi-index store
//!
//! One RocksDB database holds a column family per configured permutation
//! plus the dictionary. Readers take RocksDB snapshots and never block;
//! writers are serialized by a single mutex held for the lifetime of the
//! [`WriteTxn`]. A commit is one `WriteBatch` across every column family, so
//! all permutations and the dictionary move forward together or not at all.
//!
//! # Index set changes
//!
//! On open, column families for newly configured permutations are created
//! and filled from an existing populated index in one batch, and index
//! column families that are no longer configured are dropped.

use crate::codec::{decode_key, encode_key, IndexKey};
use crate::column_families::{self, index_cf_name, parse_index_cf_name, CF_DICTIONARY};
use crate::config::StoreConfig;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::permutation::Permutation;
use crate::txn::{ReadTxn, WriteTxn};
use crate::validation::ChangeValidator;
use parking_lot::{Mutex, RwLock};
use rocksdb::{ColumnFamily, IteratorMode, WriteBatch, WriteOptions, DB};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// RocksDB-backed quad store with a configurable set of index permutations.
pub struct Store {
    db: DB,
    config: StoreConfig,
    permutations: Vec<Permutation>,
    dictionary: Dictionary,
    writer: Mutex<()>,
    validator: RwLock<Option<Arc<dyn ChangeValidator>>>,
    closed: AtomicBool,
    /// Fails the next commit write
    #[cfg(test)]
    fail_next_write: AtomicBool,
}

impl Store {
    /// Open (or create) the store described by `config`.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let permutations = config.permutations()?;
        let opts = column_families::db_options(&config);

        // list_cf fails when no database exists yet
        let existing: Vec<String> = if config.data_dir.exists() {
            DB::list_cf(&opts, &config.data_dir).unwrap_or_default()
        } else {
            Vec::new()
        };

        let mut names = existing.clone();
        let wanted = std::iter::once(CF_DICTIONARY.to_string())
            .chain(permutations.iter().map(|p| index_cf_name(*p)));
        for name in wanted {
            if !names.contains(&name) {
                names.push(name);
            }
        }

        let mut db = DB::open_cf_descriptors(
            &opts,
            &config.data_dir,
            column_families::descriptors(names.iter().map(String::as_str)),
        )
        .map_err(|e| {
            tracing::error!(path = ?config.data_dir, error = %e, "failed to open store");
            Error::from(e)
        })?;

        let existing_perms: Vec<Permutation> = existing
            .iter()
            .filter_map(|name| parse_index_cf_name(name))
            .collect();
        let added: Vec<Permutation> = permutations
            .iter()
            .filter(|p| !existing_perms.contains(p))
            .copied()
            .collect();
        let obsolete: Vec<Permutation> = existing_perms
            .iter()
            .filter(|p| !permutations.contains(p))
            .copied()
            .collect();

        if !added.is_empty() {
            let source = permutations
                .iter()
                .find(|p| existing_perms.contains(p))
                .or(existing_perms.first());
            if let Some(source) = source {
                let rebuilt = rebuild_indexes(&db, *source, &added, config.sync_commits)?;
                tracing::info!(
                    source = %source,
                    targets = ?added.iter().map(Permutation::name).collect::<Vec<_>>(),
                    statements = rebuilt,
                    "rebuilt new indexes"
                );
            }
        }

        for perm in &obsolete {
            db.drop_cf(&index_cf_name(*perm))?;
            tracing::info!(index = %perm, "dropped index no longer configured");
        }

        let dictionary = {
            let cf = cf_handle(&db, CF_DICTIONARY)?;
            Dictionary::load(&db, cf, config.value_cache_size)?
        };

        tracing::info!(
            path = ?config.data_dir,
            indexes = %config.indexes,
            "store opened"
        );

        Ok(Self {
            db,
            config,
            permutations,
            dictionary,
            writer: Mutex::new(()),
            validator: RwLock::new(None),
            closed: AtomicBool::new(false),
            #[cfg(test)]
            fail_next_write: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Maintained permutations in configuration order
    pub fn permutations(&self) -> &[Permutation] {
        &self.permutations
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Install (or clear) the commit validation hook.
    pub fn set_validator(&self, validator: Option<Arc<dyn ChangeValidator>>) {
        *self.validator.write() = validator;
    }

    pub(crate) fn validator(&self) -> Option<Arc<dyn ChangeValidator>> {
        self.validator.read().clone()
    }

    /// Open a read snapshot. Never blocks and is never blocked by a writer.
    pub fn begin_read(&self) -> Result<ReadTxn<'_>> {
        self.ensure_open()?;
        Ok(ReadTxn::new(self, self.db.snapshot()))
    }

    /// Open the write transaction, blocking until any previous writer finishes.
    pub fn begin_write(&self) -> Result<WriteTxn<'_>> {
        self.ensure_open()?;
        let guard = self.writer.lock();
        // snapshot after acquiring the lock so the writer sees every prior commit
        let base = ReadTxn::new(self, self.db.snapshot());
        tracing::debug!("write transaction started");
        Ok(WriteTxn::new(guard, base))
    }

    /// Open the write transaction if no other writer is active.
    pub fn try_begin_write(&self) -> Result<Option<WriteTxn<'_>>> {
        self.ensure_open()?;
        Ok(self.writer.try_lock().map(|guard| {
            let base = ReadTxn::new(self, self.db.snapshot());
            WriteTxn::new(guard, base)
        }))
    }

    /// Flush every column family and refuse further transactions.
    ///
    /// Idempotent. Outstanding snapshots stay readable until dropped.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.db.flush_cf(self.dictionary_cf()?)?;
        for perm in &self.permutations {
            self.db.flush_cf(self.index_cf(*perm)?)?;
        }
        tracing::info!(path = ?self.config.data_dir, "store closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::storage("store is closed"));
        }
        Ok(())
    }

    pub(crate) fn index_cf(&self, perm: Permutation) -> Result<&ColumnFamily> {
        if !self.permutations.contains(&perm) {
            return Err(Error::invalid_index(format!("index {} is not maintained", perm)));
        }
        cf_handle(&self.db, &index_cf_name(perm))
    }

    pub(crate) fn dictionary_cf(&self) -> Result<&ColumnFamily> {
        cf_handle(&self.db, CF_DICTIONARY)
    }

    /// Apply one commit batch atomically across every column family.
    pub(crate) fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        self.injected_write_failure()?;
        self.db
            .write_opt(batch, &write_options(self.config.sync_commits))?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn injected_write_failure(&self) -> Result<()> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(Error::storage("injected write failure"));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn injected_write_failure(&self) -> Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("data_dir", &self.config.data_dir)
            .field("indexes", &self.config.indexes)
            .field("dictionary", &self.dictionary)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn cf_handle<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| Error::storage(format!("column family '{}' not found", name)))
}

fn write_options(sync: bool) -> WriteOptions {
    let mut opts = WriteOptions::default();
    opts.set_sync(sync);
    opts
}

/// Copy every key of `source` into the `targets` indexes in one batch.
fn rebuild_indexes(
    db: &DB,
    source: Permutation,
    targets: &[Permutation],
    sync: bool,
) -> Result<u64> {
    let source_cf = cf_handle(db, &index_cf_name(source))?;
    let target_cfs = targets
        .iter()
        .map(|perm| Ok((*perm, cf_handle(db, &index_cf_name(*perm))?)))
        .collect::<Result<Vec<_>>>()?;

    let mut batch = WriteBatch::default();
    let mut count = 0u64;
    for item in db.iterator_cf(source_cf, IteratorMode::Start) {
        let (key, _) = item?;
        let quad = decode_key(&IndexKey::from_slice(&key)?, source);
        for (perm, cf) in &target_cfs {
            batch.put_cf(*cf, encode_key(&quad, *perm).as_bytes(), b"");
        }
        count += 1;
    }
    db.write_opt(batch, &write_options(sync))?;
    Ok(count)
}
