//! Query execution
//!
//! [`build_operator`] maps each algebra variant to its operator; [`execute`]
//! opens the root and hands back [`QueryResults`], a pull iterator of
//! solutions. Dropping or closing the results closes the whole operator
//! tree and every scan under it.

use crate::algebra::Algebra;
use crate::binding::Solution;
use crate::bind::BindOperator;
use crate::context::{CancelHandle, ExecutionContext};
use crate::distinct::DistinctOperator;
use crate::error::Result;
use crate::filter::FilterOperator;
use crate::join::JoinOperator;
use crate::limit::LimitOperator;
use crate::minus::MinusOperator;
use crate::offset::OffsetOperator;
use crate::operator::BoxedOperator;
use crate::optional::OptionalOperator;
use crate::project::ProjectOperator;
use crate::scan::ScanOperator;
use crate::seed::{EmptyOperator, SeedOperator};
use crate::service::ServiceOperator;
use crate::union::UnionOperator;
use crate::values::ValuesOperator;

/// Build the operator for `algebra`, seeded with `seed`.
///
/// Every solution the operator emits extends `seed`.
pub fn build_operator<'a>(algebra: &'a Algebra, seed: Solution) -> BoxedOperator<'a> {
    match algebra {
        Algebra::Pattern(pattern) => Box::new(ScanOperator::new(pattern, seed)),
        Algebra::Join(left, right) => Box::new(JoinOperator::new(left, right, seed)),
        Algebra::LeftJoin {
            left,
            right,
            condition,
        } => Box::new(OptionalOperator::new(left, right, condition.as_ref(), seed)),
        Algebra::Union(branches) => Box::new(UnionOperator::new(branches, seed)),
        Algebra::Filter { expr, child } => {
            Box::new(FilterOperator::new(build_operator(child, seed), expr))
        }
        Algebra::Distinct(child) => Box::new(DistinctOperator::new(build_operator(child, seed))),
        Algebra::Projection { vars, child } => {
            let inner = build_operator(child, seed.project(vars));
            Box::new(ProjectOperator::new(inner, vars, seed))
        }
        Algebra::Service {
            endpoint,
            child,
            silent,
        } => Box::new(ServiceOperator::new(endpoint, child, *silent, seed)),
        Algebra::Slice {
            offset,
            limit,
            child,
        } => {
            let mut op = build_operator(child, seed);
            if *offset > 0 {
                op = Box::new(OffsetOperator::new(op, *offset));
            }
            if let Some(limit) = limit {
                op = Box::new(LimitOperator::new(op, *limit));
            }
            op
        }
        Algebra::Extend { var, expr, child } => {
            Box::new(BindOperator::new(build_operator(child, seed), var, expr))
        }
        Algebra::Values { vars, rows } => Box::new(ValuesOperator::new(vars, rows, seed)),
        Algebra::Minus(left, right) => {
            Box::new(MinusOperator::new(build_operator(left, seed), right))
        }
        Algebra::Singleton => Box::new(SeedOperator::new(seed)),
        Algebra::Empty => Box::new(EmptyOperator::new()),
    }
}

/// Evaluate `algebra` with no inherited bindings.
pub fn execute<'a>(algebra: &'a Algebra, ctx: ExecutionContext<'a>) -> Result<QueryResults<'a>> {
    execute_seeded(algebra, Solution::new(), ctx)
}

/// Evaluate `algebra` with `seed` as the inherited solution.
pub fn execute_seeded<'a>(
    algebra: &'a Algebra,
    seed: Solution,
    ctx: ExecutionContext<'a>,
) -> Result<QueryResults<'a>> {
    let mut root = build_operator(algebra, seed);
    if let Err(e) = root.open(&ctx) {
        root.close();
        return Err(e);
    }
    Ok(QueryResults {
        root: Some(root),
        ctx,
    })
}

/// Lazy sequence of solutions from one evaluation
///
/// Each call to `next` pulls exactly one solution through the operator tree.
/// After an error or cancellation the tree is closed and iteration ends.
pub struct QueryResults<'a> {
    root: Option<BoxedOperator<'a>>,
    ctx: ExecutionContext<'a>,
}

impl<'a> QueryResults<'a> {
    /// Close the operator tree, releasing every open scan. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut root) = self.root.take() {
            root.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.root.is_none()
    }

    /// Handle that stops this evaluation from another thread
    pub fn cancel_handle(&self) -> CancelHandle {
        self.ctx.cancel_handle()
    }

    pub fn context(&self) -> &ExecutionContext<'a> {
        &self.ctx
    }
}

impl Iterator for QueryResults<'_> {
    type Item = Result<Solution>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ctx.is_cancelled() {
            self.close();
            return None;
        }
        let root = self.root.as_mut()?;
        match root.next(&self.ctx) {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.close();
                None
            }
            Err(e) if e.is_cancelled() => {
                tracing::debug!("evaluation cancelled");
                self.close();
                None
            }
            Err(e) => {
                self.close();
                Some(Err(e))
            }
        }
    }
}

impl Drop for QueryResults<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
