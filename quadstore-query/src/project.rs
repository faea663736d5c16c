//! Projection operator
//!
//! Only the projected variables of the seed flow into the child, so names
//! hidden inside a sub-select are not correlated with the outer query.
//! Output rows are the child's rows restricted to the projection and
//! extended with the full seed.

use crate::binding::{Solution, Var};
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::operator::{BoxedOperator, Operator, OperatorState};

pub struct ProjectOperator<'a> {
    child: BoxedOperator<'a>,
    vars: &'a [Var],
    seed: Solution,
    state: OperatorState,
}

impl<'a> ProjectOperator<'a> {
    /// `child` must have been built with `seed.project(vars)`.
    pub fn new(child: BoxedOperator<'a>, vars: &'a [Var], seed: Solution) -> Self {
        Self {
            child,
            vars,
            seed,
            state: OperatorState::Created,
        }
    }
}

impl<'a> Operator<'a> for ProjectOperator<'a> {
    fn open(&mut self, ctx: &ExecutionContext<'a>) -> Result<()> {
        self.state.check_open()?;
        self.child.open(ctx)?;
        self.state = OperatorState::Open;
        Ok(())
    }

    fn next(&mut self, ctx: &ExecutionContext<'a>) -> Result<Option<Solution>> {
        if !self.state.check_next()? {
            return Ok(None);
        }
        while let Some(row) = self.child.next(ctx)? {
            if let Some(out) = self.seed.merge(&row.project(self.vars)) {
                return Ok(Some(out));
            }
        }
        self.state = OperatorState::Exhausted;
        Ok(None)
    }

    fn close(&mut self) {
        self.child.close();
        self.state = OperatorState::Closed;
    }
}
