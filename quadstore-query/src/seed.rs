//! Leaf operators without storage access
//!
//! `SeedOperator` emits its seed solution exactly once (the algebra's
//! singleton); `EmptyOperator` emits nothing.

use crate::binding::Solution;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::operator::{Operator, OperatorState};

pub struct SeedOperator {
    seed: Option<Solution>,
    state: OperatorState,
}

impl SeedOperator {
    pub fn new(seed: Solution) -> Self {
        Self {
            seed: Some(seed),
            state: OperatorState::Created,
        }
    }
}

impl<'a> Operator<'a> for SeedOperator {
    fn open(&mut self, _ctx: &ExecutionContext<'a>) -> Result<()> {
        self.state.check_open()?;
        self.state = OperatorState::Open;
        Ok(())
    }

    fn next(&mut self, _ctx: &ExecutionContext<'a>) -> Result<Option<Solution>> {
        if !self.state.check_next()? {
            return Ok(None);
        }
        let row = self.seed.take();
        if row.is_none() {
            self.state = OperatorState::Exhausted;
        }
        Ok(row)
    }

    fn close(&mut self) {
        self.seed = None;
        self.state = OperatorState::Closed;
    }
}

pub struct EmptyOperator {
    state: OperatorState,
}

impl EmptyOperator {
    pub fn new() -> Self {
        Self {
            state: OperatorState::Created,
        }
    }
}

impl Default for EmptyOperator {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Operator<'a> for EmptyOperator {
    fn open(&mut self, _ctx: &ExecutionContext<'a>) -> Result<()> {
        self.state.check_open()?;
        self.state = OperatorState::Exhausted;
        Ok(())
    }

    fn next(&mut self, _ctx: &ExecutionContext<'a>) -> Result<Option<Solution>> {
        self.state.check_next()?;
        Ok(None)
    }

    fn close(&mut self) {
        self.state = OperatorState::Closed;
    }
}
