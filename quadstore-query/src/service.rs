//! SERVICE operator - delegates a subtree to a federation member
//!
//! The child tree is handed to the handle resolved for the endpoint together
//! with the seed solution. Results are merged with the seed; incompatible
//! ones are dropped.
//!
//! With `silent` set, a resolver or remote failure ends this operator's
//! output instead of failing the evaluation.

use crate::algebra::Algebra;
use crate::binding::Solution;
use crate::context::ExecutionContext;
use crate::error::{QueryError, Result};
use crate::federation::ServiceResults;
use crate::operator::{Operator, OperatorState};

pub struct ServiceOperator<'a> {
    endpoint: &'a str,
    child: &'a Algebra,
    silent: bool,
    seed: Solution,
    results: Option<ServiceResults>,
    state: OperatorState,
}

impl<'a> ServiceOperator<'a> {
    pub fn new(endpoint: &'a str, child: &'a Algebra, silent: bool, seed: Solution) -> Self {
        Self {
            endpoint,
            child,
            silent,
            seed,
            results: None,
            state: OperatorState::Created,
        }
    }

    fn start(&self, ctx: &ExecutionContext<'a>) -> Result<ServiceResults> {
        let resolver = ctx
            .resolver()
            .ok_or_else(|| QueryError::resolver(self.endpoint, "no federation resolver configured"))?;
        let service = resolver.resolve(self.endpoint)?;
        service.evaluate(self.child, &self.seed)
    }

    /// Swallow `err` when silent; otherwise hand it back
    fn suppress(&mut self, err: QueryError) -> Result<Option<Solution>> {
        self.results = None;
        self.state = OperatorState::Exhausted;
        if err.is_cancelled() {
            return Ok(None);
        }
        if self.silent {
            tracing::debug!(endpoint = self.endpoint, error = %err, "SERVICE SILENT failure suppressed");
            return Ok(None);
        }
        Err(err)
    }
}

impl<'a> Operator<'a> for ServiceOperator<'a> {
    fn open(&mut self, ctx: &ExecutionContext<'a>) -> Result<()> {
        self.state.check_open()?;
        self.state = OperatorState::Open;
        match self.start(ctx) {
            Ok(results) => self.results = Some(results),
            Err(e) => {
                self.suppress(e)?;
            }
        }
        Ok(())
    }

    fn next(&mut self, ctx: &ExecutionContext<'a>) -> Result<Option<Solution>> {
        if !self.state.check_next()? {
            return Ok(None);
        }
        loop {
            ctx.check_cancelled()?;
            let item = match self.results.as_mut().and_then(Iterator::next) {
                Some(item) => item,
                None => {
                    self.results = None;
                    self.state = OperatorState::Exhausted;
                    return Ok(None);
                }
            };
            match item {
                Ok(row) => {
                    if let Some(out) = self.seed.merge(&row) {
                        return Ok(Some(out));
                    }
                }
                Err(e) => return self.suppress(e),
            }
        }
    }

    fn close(&mut self) {
        self.results = None;
        self.state = OperatorState::Closed;
    }
}
