//! Statement pattern scan operator
//!
//! Resolves the pattern's constants (and any positions bound by the seed
//! solution) to surrogate ids, scans the best permutation once and turns
//! each matching quad into a solution.
//!
//! A bound value that was never interned cannot match anything; the scan
//! is then empty rather than failing.

use crate::algebra::{ContextScope, StatementPattern, Term};
use crate::binding::Solution;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::operator::{Operator, OperatorState};
use quadstore_core::{PatternScan, Quad, QuadPattern, StatementSource, Value, ValueId};
use std::sync::Arc;

/// Id-level form of a [`StatementPattern`] under one seed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPattern {
    pub quads: QuadPattern,
    /// Named-graph scope with an unbound graph: skip default-graph quads
    pub named_only: bool,
}

/// Resolve a pattern against `seed`.
///
/// Returns `None` when a bound value is unknown to the dictionary.
pub fn resolve_pattern<S: StatementSource + ?Sized>(
    source: &S,
    pattern: &StatementPattern,
    seed: &Solution,
) -> Result<Option<ResolvedPattern>> {
    let mut quads = QuadPattern::any();
    for (slot, term) in [
        (&mut quads.s, &pattern.subject),
        (&mut quads.p, &pattern.predicate),
        (&mut quads.o, &pattern.object),
    ] {
        if let Some(value) = term.resolve(seed) {
            match lookup(source, value)? {
                Some(id) => *slot = Some(id),
                None => return Ok(None),
            }
        }
    }

    let mut named_only = false;
    match &pattern.context {
        ContextScope::All => {}
        ContextScope::Default => quads.c = Some(ValueId::DEFAULT_GRAPH),
        ContextScope::Named(term) => match term.resolve(seed) {
            Some(value) => match lookup(source, value)? {
                Some(id) => quads.c = Some(id),
                None => return Ok(None),
            },
            None => named_only = true,
        },
    }
    Ok(Some(ResolvedPattern { quads, named_only }))
}

fn lookup<S: StatementSource + ?Sized>(source: &S, value: &Value) -> Result<Option<ValueId>> {
    let id = source.lookup_id(value)?;
    if id.is_none() {
        tracing::trace!(value = %value, "unresolved pattern value; scan is empty");
    }
    Ok(id)
}

/// Count matches of `pattern`, giving up once `cap` is exceeded.
///
/// Returns `Some(n)` with `n <= cap`, or `None` when there are more.
pub fn bounded_count<S: StatementSource + ?Sized>(
    source: &S,
    pattern: &StatementPattern,
    seed: &Solution,
    cap: usize,
) -> Result<Option<usize>> {
    let resolved = match resolve_pattern(source, pattern, seed)? {
        Some(r) => r,
        None => return Ok(Some(0)),
    };
    let scan = PatternScan::new(source, resolved.quads)?.with_batch_size(cap.saturating_add(1));
    let mut count = 0usize;
    for quad in scan {
        let quad = quad?;
        if resolved.named_only && quad.c.is_default_graph() {
            continue;
        }
        count += 1;
        if count > cap {
            return Ok(None);
        }
    }
    Ok(Some(count))
}

/// Scan operator for one statement pattern
pub struct ScanOperator<'a> {
    pattern: &'a StatementPattern,
    seed: Solution,
    scan: Option<PatternScan<Arc<dyn StatementSource + 'a>>>,
    named_only: bool,
    state: OperatorState,
}

impl<'a> ScanOperator<'a> {
    pub fn new(pattern: &'a StatementPattern, seed: Solution) -> Self {
        Self {
            pattern,
            seed,
            scan: None,
            named_only: false,
            state: OperatorState::Created,
        }
    }

    /// Extend the seed with the variables of `quad`; `None` if a repeated
    /// variable sees two different values.
    fn bind_quad(&self, source: &dyn StatementSource, quad: &Quad) -> Result<Option<Solution>> {
        let mut row = self.seed.clone();
        let positions = [
            (&self.pattern.subject, quad.s),
            (&self.pattern.predicate, quad.p),
            (&self.pattern.object, quad.o),
        ];
        for (term, id) in positions {
            if let Term::Var(var) = term {
                let value = source.resolve_id(id)?;
                if !row.bind(var, &value) {
                    return Ok(None);
                }
            }
        }
        if let ContextScope::Named(Term::Var(var)) = &self.pattern.context {
            let value = source.resolve_id(quad.c)?;
            if !row.bind(var, &value) {
                return Ok(None);
            }
        }
        Ok(Some(row))
    }
}

impl<'a> Operator<'a> for ScanOperator<'a> {
    fn open(&mut self, ctx: &ExecutionContext<'a>) -> Result<()> {
        self.state.check_open()?;
        let source = ctx.source().clone();
        if let Some(resolved) = resolve_pattern(source.as_ref(), self.pattern, &self.seed)? {
            self.named_only = resolved.named_only;
            self.scan = Some(
                PatternScan::new(source, resolved.quads)?.with_batch_size(ctx.scan_batch_size()),
            );
        }
        self.state = OperatorState::Open;
        Ok(())
    }

    fn next(&mut self, ctx: &ExecutionContext<'a>) -> Result<Option<Solution>> {
        if !self.state.check_next()? {
            return Ok(None);
        }
        loop {
            ctx.check_cancelled()?;
            let quad = match self.scan.as_mut().and_then(Iterator::next) {
                Some(quad) => quad?,
                None => {
                    self.state = OperatorState::Exhausted;
                    self.scan = None;
                    return Ok(None);
                }
            };
            if self.named_only && quad.c.is_default_graph() {
                continue;
            }
            if let Some(row) = self.bind_quad(ctx.source().as_ref(), &quad)? {
                return Ok(Some(row));
            }
        }
    }

    fn close(&mut self) {
        if let Some(scan) = self.scan.as_mut() {
            scan.close();
        }
        self.scan = None;
        self.state = OperatorState::Closed;
    }
}
