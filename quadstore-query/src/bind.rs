//! BIND operator - extends each solution with one computed variable
//!
//! An evaluation error leaves the variable unbound. If the child already
//! bound the variable, the row survives only when the computed value agrees.

use crate::binding::{Solution, Var};
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::expression::Expression;
use crate::operator::{BoxedOperator, Operator, OperatorState};

pub struct BindOperator<'a> {
    child: BoxedOperator<'a>,
    var: &'a Var,
    expr: &'a Expression,
    state: OperatorState,
}

impl<'a> BindOperator<'a> {
    pub fn new(child: BoxedOperator<'a>, var: &'a Var, expr: &'a Expression) -> Self {
        Self {
            child,
            var,
            expr,
            state: OperatorState::Created,
        }
    }
}

impl<'a> Operator<'a> for BindOperator<'a> {
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
        while let Some(mut row) = self.child.next(ctx)? {
            match self.expr.evaluate(&row) {
                Ok(value) => {
                    if row.bind(self.var, &value) {
                        return Ok(Some(row));
                    }
                }
                Err(e) => {
                    tracing::trace!(var = %self.var, error = %e, "bind error; variable left unbound");
                    row.insert_unbound(self.var.clone());
                    return Ok(Some(row));
                }
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
