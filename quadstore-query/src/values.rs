//! VALUES operator - inline solutions
//!
//! Each row becomes a solution of its bound cells; rows that conflict with
//! the seed are skipped.

use crate::binding::{Solution, Var};
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::operator::{Operator, OperatorState};
use quadstore_core::Value;

pub struct ValuesOperator<'a> {
    vars: &'a [Var],
    rows: std::slice::Iter<'a, Vec<Option<Value>>>,
    seed: Solution,
    state: OperatorState,
}

impl<'a> ValuesOperator<'a> {
    pub fn new(vars: &'a [Var], rows: &'a [Vec<Option<Value>>], seed: Solution) -> Self {
        Self {
            vars,
            rows: rows.iter(),
            seed,
            state: OperatorState::Created,
        }
    }
}

fn row_solution(vars: &[Var], cells: &[Option<Value>]) -> Solution {
    let mut row = Solution::new();
    for (var, cell) in vars.iter().zip(cells) {
        match cell {
            Some(value) => row.insert(var.clone(), value.clone()),
            None => row.insert_unbound(var.clone()),
        }
    }
    row
}

impl<'a> Operator<'a> for ValuesOperator<'a> {
    fn open(&mut self, _ctx: &ExecutionContext<'a>) -> Result<()> {
        self.state.check_open()?;
        self.state = OperatorState::Open;
        Ok(())
    }

    fn next(&mut self, _ctx: &ExecutionContext<'a>) -> Result<Option<Solution>> {
        if !self.state.check_next()? {
            return Ok(None);
        }
        for cells in self.rows.by_ref() {
            if let Some(out) = self.seed.merge(&row_solution(self.vars, cells)) {
                return Ok(Some(out));
            }
        }
        self.state = OperatorState::Exhausted;
        Ok(None)
    }

    fn close(&mut self) {
        self.state = OperatorState::Closed;
    }
}
