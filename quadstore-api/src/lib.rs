//! # Quadstore API
//!
//! Repository and connection surface over the quadstore engine.
//!
//! ```ignore
//! use quadstore_api::{Repository, ParseMode};
//! use quadstore_core::{Statement, StoreConfig, Value};
//! use quadstore_query::{Algebra, Term};
//!
//! let repo = Repository::open(StoreConfig::new("/tmp/qs"))?;
//! let mut conn = repo.connection()?;
//! conn.begin_transaction()?;
//! conn.add(&Statement::new(Value::iri("ex:a"), Value::iri("ex:p"), Value::iri("ex:b")))?;
//! conn.commit()?;
//!
//! let algebra = Algebra::pattern(Value::iri("ex:a"), Value::iri("ex:p"), Term::var("o"));
//! for solution in conn.evaluate(&algebra)? {
//!     println!("{}", solution?);
//! }
//! ```

pub mod connection;
pub mod error;
pub mod local_service;
pub mod repository;

pub use connection::{Connection, IngestReport, ParseMode};
pub use error::{ApiError, Result};
pub use local_service::LocalStoreService;
pub use repository::Repository;
