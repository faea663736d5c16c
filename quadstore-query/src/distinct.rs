//! DISTINCT operator
//!
//! Keeps a set of the solutions emitted so far; memory grows with the
//! number of distinct results, not the number of input rows.

use crate::binding::Solution;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::operator::{BoxedOperator, Operator, OperatorState};
use rustc_hash::FxHashSet;

pub struct DistinctOperator<'a> {
    child: BoxedOperator<'a>,
    seen: FxHashSet<Solution>,
    state: OperatorState,
}

impl<'a> DistinctOperator<'a> {
    pub fn new(child: BoxedOperator<'a>) -> Self {
        Self {
            child,
            seen: FxHashSet::default(),
            state: OperatorState::Created,
        }
    }
}

impl<'a> Operator<'a> for DistinctOperator<'a> {
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
            if !self.seen.contains(&row) {
                self.seen.insert(row.clone());
                return Ok(Some(row));
            }
        }
        self.state = OperatorState::Exhausted;
        Ok(None)
    }

    fn close(&mut self) {
        self.child.close();
        self.seen = FxHashSet::default();
        self.state = OperatorState::Closed;
    }
}
