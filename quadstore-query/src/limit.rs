//! Limit operator for query result pagination
//!
//! The `LimitOperator` stops producing solutions after a specified number
//! have been emitted, and closes its child right away so open scans are
//! released before the consumer finishes.

use crate::binding::Solution;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::operator::{BoxedOperator, Operator, OperatorState};

/// Limit operator - stops after emitting N solutions
pub struct LimitOperator<'a> {
    child: BoxedOperator<'a>,
    limit: usize,
    emitted: usize,
    state: OperatorState,
}

impl<'a> LimitOperator<'a> {
    /// Create a new limit operator
    ///
    /// # Arguments
    ///
    /// * `child` - The child operator to limit
    /// * `limit` - Maximum number of solutions to emit
    pub fn new(child: BoxedOperator<'a>, limit: usize) -> Self {
        Self {
            child,
            limit,
            emitted: 0,
            state: OperatorState::Created,
        }
    }
}

impl<'a> Operator<'a> for LimitOperator<'a> {
    fn open(&mut self, ctx: &ExecutionContext<'a>) -> Result<()> {
        self.state.check_open()?;
        self.emitted = 0;
        if self.limit == 0 {
            self.state = OperatorState::Exhausted;
            return Ok(());
        }
        self.child.open(ctx)?;
        self.state = OperatorState::Open;
        Ok(())
    }

    fn next(&mut self, ctx: &ExecutionContext<'a>) -> Result<Option<Solution>> {
        if !self.state.check_next()? {
            return Ok(None);
        }
        match self.child.next(ctx)? {
            Some(row) => {
                self.emitted += 1;
                if self.emitted >= self.limit {
                    // Nothing more will be pulled; release the subtree now
                    self.child.close();
                    self.state = OperatorState::Exhausted;
                }
                Ok(Some(row))
            }
            None => {
                self.state = OperatorState::Exhausted;
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.child.close();
        self.state = OperatorState::Closed;
    }
}
