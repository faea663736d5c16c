//! Value-level inspection over any [`StatementSource`]

use crate::codec::{decode_key, range_for, KeyRange};
use crate::error::Result;
use crate::ids::ValueId;
use crate::permutation::Permutation;
use crate::scan::{KeyScan, PatternScan};
use crate::source::StatementSource;
use crate::statement::{Component, ContextFilter, Quad, QuadPattern, Statement, StatementFilter};
use crate::value::Value;
use std::collections::BTreeSet;

/// Translate a value-level filter into an id pattern.
///
/// Returns `None` when a bound value was never interned, meaning nothing can
/// match.
pub fn resolve_filter<S: StatementSource + ?Sized>(
    source: &S,
    filter: &StatementFilter,
) -> Result<Option<QuadPattern>> {
    let mut pattern = QuadPattern::any();
    for (slot, value) in [
        (&mut pattern.s, &filter.subject),
        (&mut pattern.p, &filter.predicate),
        (&mut pattern.o, &filter.object),
    ] {
        if let Some(value) = value {
            match source.lookup_id(value)? {
                Some(id) => *slot = Some(id),
                None => return Ok(None),
            }
        }
    }
    pattern.c = match &filter.context {
        ContextFilter::Any => None,
        ContextFilter::Default => Some(ValueId::DEFAULT_GRAPH),
        ContextFilter::Named(value) => match source.lookup_id(value)? {
            Some(id) => Some(id),
            None => return Ok(None),
        },
    };
    Ok(Some(pattern))
}

/// Resolve a quad's ids back to a statement.
pub fn quad_to_statement<S: StatementSource + ?Sized>(source: &S, quad: &Quad) -> Result<Statement> {
    let context = if quad.c.is_default_graph() {
        None
    } else {
        Some(source.resolve_id(quad.c)?)
    };
    Ok(Statement {
        subject: source.resolve_id(quad.s)?,
        predicate: source.resolve_id(quad.p)?,
        object: source.resolve_id(quad.o)?,
        context,
    })
}

/// Every statement matching `filter`
pub fn statements<S: StatementSource + ?Sized>(
    source: &S,
    filter: &StatementFilter,
) -> Result<Vec<Statement>> {
    let Some(pattern) = resolve_filter(source, filter)? else {
        return Ok(Vec::new());
    };
    PatternScan::new(source, pattern)?
        .map(|quad| quad.and_then(|q| quad_to_statement(source, &q)))
        .collect()
}

/// Number of statements matching `filter`
pub fn count<S: StatementSource + ?Sized>(source: &S, filter: &StatementFilter) -> Result<u64> {
    let Some(pattern) = resolve_filter(source, filter)? else {
        return Ok(0);
    };
    let mut n = 0u64;
    for quad in PatternScan::new(source, pattern)? {
        quad?;
        n += 1;
    }
    Ok(n)
}

/// Distinct named graphs in ascending id order
///
/// With a context-leading index configured this seeks once per graph;
/// otherwise every statement is scanned.
pub fn contexts<S: StatementSource + ?Sized>(source: &S) -> Result<Vec<Value>> {
    let leading = source
        .permutations()
        .iter()
        .copied()
        .find(|perm| perm.order()[0] == Component::Context);
    let ids = match leading {
        Some(perm) => seek_contexts(source, perm)?,
        None => {
            let mut ids = BTreeSet::new();
            for quad in PatternScan::new(source, QuadPattern::any())? {
                let quad = quad?;
                if !quad.c.is_default_graph() {
                    ids.insert(quad.c);
                }
            }
            ids
        }
    };
    tracing::trace!(contexts = ids.len(), seek = leading.is_some(), "contexts listed");
    ids.into_iter().map(|id| source.resolve_id(id)).collect()
}

/// Skip scan over `perm`, whose leading component is the context
fn seek_contexts<S: StatementSource + ?Sized>(
    source: &S,
    perm: Permutation,
) -> Result<BTreeSet<ValueId>> {
    let mut ids = BTreeSet::new();
    let mut from = ValueId::DEFAULT_GRAPH.next();
    loop {
        let pattern = QuadPattern {
            c: Some(from),
            ..QuadPattern::any()
        };
        let range = KeyRange {
            lower: range_for(&pattern, perm).lower,
            upper: None,
        };
        let first = KeyScan::new(source, perm, range).with_batch_size(1).next();
        let Some(key) = first.transpose()? else {
            break;
        };
        let context = decode_key(&key, perm).c;
        ids.insert(context);
        match context.as_u64().checked_add(1) {
            Some(raw) => from = ValueId::new(raw),
            None => break,
        }
    }
    Ok(ids)
}
