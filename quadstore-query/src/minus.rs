//! MINUS operator
//!
//! The right side is evaluated once, uncorrelated, and kept in memory. A
//! left solution is removed when some right solution is compatible with it
//! and shares at least one bound variable; a right solution with no
//! variables in common never removes anything.

use crate::algebra::Algebra;
use crate::binding::Solution;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::execute::build_operator;
use crate::operator::{BoxedOperator, Operator, OperatorState};

pub struct MinusOperator<'a> {
    left: BoxedOperator<'a>,
    right: &'a Algebra,
    exclusions: Vec<Solution>,
    state: OperatorState,
}

impl<'a> MinusOperator<'a> {
    pub fn new(left: BoxedOperator<'a>, right: &'a Algebra) -> Self {
        Self {
            left,
            right,
            exclusions: Vec::new(),
            state: OperatorState::Created,
        }
    }

    fn excluded(&self, row: &Solution) -> bool {
        self.exclusions
            .iter()
            .any(|ex| row.shares_bound_var(ex) && row.is_compatible(ex))
    }
}

impl<'a> Operator<'a> for MinusOperator<'a> {
    fn open(&mut self, ctx: &ExecutionContext<'a>) -> Result<()> {
        self.state.check_open()?;
        let mut right = build_operator(self.right, Solution::new());
        right.open(ctx)?;
        let mut exclusions = Vec::new();
        let drained = loop {
            match right.next(ctx) {
                Ok(Some(row)) => exclusions.push(row),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        right.close();
        drained?;
        self.exclusions = exclusions;

        self.left.open(ctx)?;
        self.state = OperatorState::Open;
        Ok(())
    }

    fn next(&mut self, ctx: &ExecutionContext<'a>) -> Result<Option<Solution>> {
        if !self.state.check_next()? {
            return Ok(None);
        }
        while let Some(row) = self.left.next(ctx)? {
            if !self.excluded(&row) {
                return Ok(Some(row));
            }
        }
        self.state = OperatorState::Exhausted;
        Ok(None)
    }

    fn close(&mut self) {
        self.left.close();
        self.exclusions = Vec::new();
        self.state = OperatorState::Closed;
    }
}
