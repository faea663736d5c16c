//! OPTIONAL (left join) operator
//!
//! A [correlatable](Algebra::is_correlatable) right side is evaluated per
//! left solution, seeded with it. Any other right side is evaluated once
//! under the operator's own seed and looked up per left solution. Right results
//! that satisfy the condition are emitted; a left solution with no such
//! result is emitted once, with every right-side variable it does not bind
//! marked unbound.

use crate::algebra::Algebra;
use crate::binding::{Solution, Var};
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::execute::build_operator;
use crate::expression::Expression;
use crate::hash_table::HashTable;
use crate::operator::{BoxedOperator, Operator, OperatorState};
use std::collections::VecDeque;

/// Right-side matches for the current left solution
enum Matches<'a> {
    Seeded(BoxedOperator<'a>),
    Materialized(VecDeque<Solution>),
}

impl<'a> Matches<'a> {
    fn next(&mut self, ctx: &ExecutionContext<'a>) -> Result<Option<Solution>> {
        match self {
            Matches::Seeded(op) => op.next(ctx),
            Matches::Materialized(rows) => Ok(rows.pop_front()),
        }
    }

    fn close(&mut self) {
        if let Matches::Seeded(op) = self {
            op.close();
        }
    }
}

struct Current<'a> {
    left: Solution,
    matches: Matches<'a>,
    matched: bool,
}

pub struct OptionalOperator<'a> {
    left: &'a Algebra,
    right: &'a Algebra,
    condition: Option<&'a Expression>,
    seed: Solution,
    right_vars: Vec<Var>,
    outer: Option<BoxedOperator<'a>>,
    /// Materialized right side when it cannot be seeded per row
    table: Option<HashTable>,
    current: Option<Current<'a>>,
    state: OperatorState,
}

impl<'a> OptionalOperator<'a> {
    pub fn new(
        left: &'a Algebra,
        right: &'a Algebra,
        condition: Option<&'a Expression>,
        seed: Solution,
    ) -> Self {
        Self {
            left,
            right,
            condition,
            seed,
            right_vars: right.variables().into_iter().collect(),
            outer: None,
            table: None,
            current: None,
            state: OperatorState::Created,
        }
    }

    fn satisfies(&self, row: &Solution) -> bool {
        match self.condition {
            None => true,
            Some(expr) => match expr.effective_boolean(row) {
                Ok(keep) => keep,
                Err(e) => {
                    tracing::trace!(error = %e, "optional condition error; no match");
                    false
                }
            },
        }
    }

    fn unmatched(&self, mut left: Solution) -> Solution {
        for var in &self.right_vars {
            left.insert_unbound(var.clone());
        }
        left
    }

    fn matches_for(&self, left: &Solution, ctx: &ExecutionContext<'a>) -> Result<Matches<'a>> {
        match &self.table {
            Some(table) => Ok(Matches::Materialized(table.matching(left))),
            None => {
                let mut right = build_operator(self.right, left.clone());
                right.open(ctx)?;
                Ok(Matches::Seeded(right))
            }
        }
    }
}

impl<'a> Operator<'a> for OptionalOperator<'a> {
    fn open(&mut self, ctx: &ExecutionContext<'a>) -> Result<()> {
        self.state.check_open()?;
        if !self.right.is_correlatable() {
            self.table = Some(HashTable::build(self.right, self.left, &self.seed, ctx)?);
        }
        let mut outer = build_operator(self.left, self.seed.clone());
        outer.open(ctx)?;
        self.outer = Some(outer);
        self.state = OperatorState::Open;
        Ok(())
    }

    fn next(&mut self, ctx: &ExecutionContext<'a>) -> Result<Option<Solution>> {
        if !self.state.check_next()? {
            return Ok(None);
        }
        loop {
            if let Some(mut current) = self.current.take() {
                match current.matches.next(ctx)? {
                    Some(row) => {
                        let keep = self.satisfies(&row);
                        current.matched |= keep;
                        self.current = Some(current);
                        if keep {
                            return Ok(Some(row));
                        }
                        continue;
                    }
                    None => {
                        current.matches.close();
                        if !current.matched {
                            return Ok(Some(self.unmatched(current.left)));
                        }
                    }
                }
            }

            let next_left = match self.outer.as_mut() {
                Some(outer) => outer.next(ctx)?,
                None => None,
            };
            match next_left {
                Some(left) => {
                    let matches = self.matches_for(&left, ctx)?;
                    self.current = Some(Current {
                        left,
                        matches,
                        matched: false,
                    });
                }
                None => {
                    self.state = OperatorState::Exhausted;
                    return Ok(None);
                }
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut current) = self.current.take() {
            current.matches.close();
        }
        if let Some(mut outer) = self.outer.take() {
            outer.close();
        }
        self.table = None;
        self.state = OperatorState::Closed;
    }
}
