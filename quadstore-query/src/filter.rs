//! Filter operator
//!
//! Rows where the expression evaluates to `false` or raises an evaluation
//! error (type mismatch, unbound variable) are dropped. Expression errors
//! never fail the query.

use crate::binding::Solution;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::expression::Expression;
use crate::operator::{BoxedOperator, Operator, OperatorState};

/// Filter operator - applies a predicate to each solution from child
pub struct FilterOperator<'a> {
    child: BoxedOperator<'a>,
    expr: &'a Expression,
    state: OperatorState,
}

impl<'a> FilterOperator<'a> {
    pub fn new(child: BoxedOperator<'a>, expr: &'a Expression) -> Self {
        Self {
            child,
            expr,
            state: OperatorState::Created,
        }
    }
}

impl<'a> Operator<'a> for FilterOperator<'a> {
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
            match self.expr.effective_boolean(&row) {
                Ok(true) => return Ok(Some(row)),
                Ok(false) => {}
                Err(e) => tracing::trace!(error = %e, row = %row, "filter error; row excluded"),
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
