//! Inner join operator
//!
//! Two strategies, chosen at `open` by [`plan_join`]:
//!
//! - **Nested loop**: for each outer solution, build and drain the inner
//!   operator seeded with that solution. Inner results already extend the
//!   outer solution, so they are emitted as-is. Only used when the inner
//!   side is [correlatable](Algebra::is_correlatable).
//! - **Hash**: the inner side is drained once, under the join's own seed,
//!   into a [`HashTable`] keyed by the variables both sides share; each
//!   outer solution looks it up.

use crate::algebra::Algebra;
use crate::binding::Solution;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::execute::build_operator;
use crate::hash_table::HashTable;
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::planner::{plan_join, JoinStrategy};
use std::collections::VecDeque;

enum Strategy<'a> {
    NestedLoop {
        inner: &'a Algebra,
        current: Option<BoxedOperator<'a>>,
    },
    Hash {
        table: HashTable,
        pending: VecDeque<Solution>,
    },
}

/// Join operator over two algebra subtrees
pub struct JoinOperator<'a> {
    left: &'a Algebra,
    right: &'a Algebra,
    seed: Solution,
    outer: Option<BoxedOperator<'a>>,
    strategy: Option<Strategy<'a>>,
    state: OperatorState,
}

impl<'a> JoinOperator<'a> {
    pub fn new(left: &'a Algebra, right: &'a Algebra, seed: Solution) -> Self {
        Self {
            left,
            right,
            seed,
            outer: None,
            strategy: None,
            state: OperatorState::Created,
        }
    }
}

impl<'a> Operator<'a> for JoinOperator<'a> {
    fn open(&mut self, ctx: &ExecutionContext<'a>) -> Result<()> {
        self.state.check_open()?;
        let plan = {
            let _span = tracing::debug_span!("join_plan").entered();
            plan_join(self.left, self.right, &self.seed, ctx)?
        };

        let strategy = match plan.strategy {
            JoinStrategy::Hash => Strategy::Hash {
                table: HashTable::build(plan.inner, plan.outer, &self.seed, ctx)?,
                pending: VecDeque::new(),
            },
            JoinStrategy::NestedLoop => Strategy::NestedLoop {
                inner: plan.inner,
                current: None,
            },
        };
        let mut outer = build_operator(plan.outer, self.seed.clone());
        outer.open(ctx)?;
        self.outer = Some(outer);
        self.strategy = Some(strategy);
        self.state = OperatorState::Open;
        Ok(())
    }

    fn next(&mut self, ctx: &ExecutionContext<'a>) -> Result<Option<Solution>> {
        if !self.state.check_next()? {
            return Ok(None);
        }
        let (Some(outer), Some(strategy)) = (self.outer.as_mut(), self.strategy.as_mut()) else {
            return Ok(None);
        };

        loop {
            match strategy {
                Strategy::NestedLoop { inner, current } => {
                    if let Some(op) = current.as_mut() {
                        if let Some(row) = op.next(ctx)? {
                            return Ok(Some(row));
                        }
                        op.close();
                        *current = None;
                    }
                    match outer.next(ctx)? {
                        Some(outer_row) => {
                            let mut op = build_operator(*inner, outer_row);
                            op.open(ctx)?;
                            *current = Some(op);
                        }
                        None => break,
                    }
                }
                Strategy::Hash { table, pending } => {
                    if let Some(row) = pending.pop_front() {
                        return Ok(Some(row));
                    }
                    match outer.next(ctx)? {
                        Some(outer_row) => *pending = table.matching(&outer_row),
                        None => break,
                    }
                }
            }
        }

        self.state = OperatorState::Exhausted;
        Ok(None)
    }

    fn close(&mut self) {
        if let Some(mut outer) = self.outer.take() {
            outer.close();
        }
        if let Some(Strategy::NestedLoop {
            current: Some(mut op),
            ..
        }) = self.strategy.take()
        {
            op.close();
        }
        self.state = OperatorState::Closed;
    }
}
