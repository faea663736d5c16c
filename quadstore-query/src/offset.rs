//! Offset operator - skips the first N solutions of its child

use crate::binding::Solution;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::operator::{BoxedOperator, Operator, OperatorState};

pub struct OffsetOperator<'a> {
    child: BoxedOperator<'a>,
    offset: usize,
    skipped: usize,
    state: OperatorState,
}

impl<'a> OffsetOperator<'a> {
    pub fn new(child: BoxedOperator<'a>, offset: usize) -> Self {
        Self {
            child,
            offset,
            skipped: 0,
            state: OperatorState::Created,
        }
    }
}

impl<'a> Operator<'a> for OffsetOperator<'a> {
    fn open(&mut self, ctx: &ExecutionContext<'a>) -> Result<()> {
        self.state.check_open()?;
        self.child.open(ctx)?;
        self.skipped = 0;
        self.state = OperatorState::Open;
        Ok(())
    }

    fn next(&mut self, ctx: &ExecutionContext<'a>) -> Result<Option<Solution>> {
        if !self.state.check_next()? {
            return Ok(None);
        }
        while self.skipped < self.offset {
            if self.child.next(ctx)?.is_none() {
                self.state = OperatorState::Exhausted;
                return Ok(None);
            }
            self.skipped += 1;
        }
        let row = self.child.next(ctx)?;
        if row.is_none() {
            self.state = OperatorState::Exhausted;
        }
        Ok(row)
    }

    fn close(&mut self) {
        self.child.close();
        self.state = OperatorState::Closed;
    }
}
