//! UNION operator
//!
//! Branches run one after another in declared order, each seeded with the
//! same solution. Only one branch is open at a time; duplicates are kept.

use crate::algebra::Algebra;
use crate::binding::Solution;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::execute::build_operator;
use crate::operator::{BoxedOperator, Operator, OperatorState};

pub struct UnionOperator<'a> {
    branches: &'a [Algebra],
    seed: Solution,
    /// Index of the next branch to open
    next_branch: usize,
    current: Option<BoxedOperator<'a>>,
    state: OperatorState,
}

impl<'a> UnionOperator<'a> {
    pub fn new(branches: &'a [Algebra], seed: Solution) -> Self {
        Self {
            branches,
            seed,
            next_branch: 0,
            current: None,
            state: OperatorState::Created,
        }
    }
}

impl<'a> Operator<'a> for UnionOperator<'a> {
    fn open(&mut self, _ctx: &ExecutionContext<'a>) -> Result<()> {
        self.state.check_open()?;
        self.state = OperatorState::Open;
        Ok(())
    }

    fn next(&mut self, ctx: &ExecutionContext<'a>) -> Result<Option<Solution>> {
        if !self.state.check_next()? {
            return Ok(None);
        }
        loop {
            if let Some(op) = self.current.as_mut() {
                if let Some(row) = op.next(ctx)? {
                    return Ok(Some(row));
                }
                op.close();
                self.current = None;
            }
            let Some(branch) = self.branches.get(self.next_branch) else {
                self.state = OperatorState::Exhausted;
                return Ok(None);
            };
            self.next_branch += 1;
            let mut op = build_operator(branch, self.seed.clone());
            op.open(ctx)?;
            self.current = Some(op);
        }
    }

    fn close(&mut self) {
        if let Some(mut op) = self.current.take() {
            op.close();
        }
        self.state = OperatorState::Closed;
    }
}
