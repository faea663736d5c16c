//! # Quadstore Query
//!
//! Pull-based evaluation of algebra trees over a quadstore read view.
//!
//! This crate provides:
//! - The closed [`Algebra`] operator set and [`Expression`] language
//! - Binding sets ([`Solution`]) flowing one at a time through operators
//! - A join planner choosing the driving side and hash or nested-loop joins
//! - The [`FederatedServiceResolver`] behind SERVICE delegation
//!
//! ## Example
//!
//! ```ignore
//! use quadstore_query::{execute, Algebra, ExecutionContext, Term};
//!
//! let txn = store.begin_read()?;
//! let algebra = Algebra::pattern(Value::iri("ex:a"), Value::iri("ex:p"), Term::var("o"));
//! for solution in execute(&algebra, ExecutionContext::new(Arc::new(txn)))? {
//!     println!("{}", solution?);
//! }
//! ```

pub mod algebra;
pub mod bind;
pub mod binding;
pub mod context;
pub mod distinct;
pub mod error;
pub mod execute;
pub mod expression;
pub mod federation;
pub mod filter;
mod hash_table;
pub mod join;
pub mod limit;
pub mod minus;
pub mod offset;
pub mod operator;
pub mod optional;
pub mod options;
pub mod planner;
pub mod project;
pub mod scan;
pub mod seed;
pub mod service;
pub mod union;
pub mod values;

pub use algebra::{Algebra, ContextScope, StatementPattern, Term};
pub use binding::{Binding, Solution, Var};
pub use context::{CancelHandle, ExecutionContext};
pub use error::{QueryError, Result};
pub use execute::{build_operator, execute, execute_seeded, QueryResults};
pub use expression::{CompareOp, ExprError, Expression};
pub use federation::{FederatedService, FederatedServiceResolver, ServiceFactory, ServiceResults};
pub use operator::{BoxedOperator, Operator, OperatorState};
pub use options::QueryOptions;
pub use planner::{JoinPlan, JoinStrategy};
