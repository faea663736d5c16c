//! # Quadstore Core
//!
//! Storage engine for subject-predicate-object-context statements.
//!
//! This crate provides:
//! - The value model (`Value`, `Literal`) and store-scoped interning `Dictionary`
//! - The index key codec: fixed-width sortable keys per `Permutation`
//! - A RocksDB-backed `Store` with one column family per permutation
//! - `ReadTxn` snapshots and the single `WriteTxn`, committed atomically
//! - Lazy range scans through the `StatementSource` seam used by query evaluation
//!
//! ## Design Principles
//!
//! 1. **Synchronous**: scans and commits block on storage; no async runtime
//! 2. **One commit boundary**: every index and the dictionary change in one batch
//! 3. **Readers never wait**: snapshots are independent of the writer lock
//!
//! ## Example
//!
//! ```ignore
//! use quadstore_core::{Statement, Store, StoreConfig, Value};
//!
//! let store = Store::open(StoreConfig::new("/tmp/qs"))?;
//! let mut txn = store.begin_write()?;
//! txn.add(&Statement::new(Value::iri("ex:a"), Value::iri("ex:p"), Value::iri("ex:b")))?;
//! txn.commit()?;
//! ```

pub mod codec;
pub mod column_families;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod ids;
pub mod inspect;
mod overlay;
pub mod permutation;
pub mod scan;
pub mod source;
pub mod statement;
pub mod store;
pub mod txn;
pub mod validation;
pub mod value;

pub use codec::{decode_key, encode_key, range_for, IndexKey, KeyRange, KEY_LEN};
pub use config::StoreConfig;
pub use dictionary::Dictionary;
pub use error::{Error, ParseError, Result};
pub use ids::ValueId;
pub use permutation::{Permutation, DEFAULT_INDEXES};
pub use scan::{KeyScan, PatternScan};
pub use source::{ScanChunk, StatementSource};
pub use statement::{Component, ContextFilter, Quad, QuadPattern, Statement, StatementFilter};
pub use store::Store;
pub use txn::{CommitReceipt, ReadTxn, WriteTxn};
pub use validation::{ChangeSet, ChangeValidator};
pub use value::{Literal, LiteralAnnotation, Value};
