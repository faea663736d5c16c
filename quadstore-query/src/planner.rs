//! Join planning
//!
//! Picks the driving side of a join and whether to look up a hash table or
//! re-evaluate the inner side per outer solution.
//!
//! # Heuristic
//!
//! Each side gets a *bound score*: the number of statement components fixed
//! by constants or by the seed solution. A join scores as its better side, a
//! union as its worst branch, optional and minus as their left side; inline
//! data and singletons score 4 (they never scan), a service scores 0. The
//! higher score drives the join, and ties keep the declared left side.
//!
//! An inner side that is not [correlatable](Algebra::is_correlatable) is
//! always materialized once and looked up: re-evaluating a slice, filter or
//! BIND per outer row would let it see bindings from outside its scope.
//! A correlatable inner side is hashed when it is a statement pattern or
//! inline data whose cardinality, counted with a cap, is at most
//! [`QueryOptions::hash_join_threshold`](crate::options::QueryOptions);
//! otherwise it joins by nested loop with the outer solution substituted
//! into it.
//!
//! Orientation and strategy only affect cost and emission order; both sides
//! see the same seed, so the result set is the same either way.

use crate::algebra::Algebra;
use crate::binding::Solution;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::scan::bounded_count;

/// Score for operators that never scan storage
const NO_SCAN_SCORE: usize = 4;

/// How a join evaluates its inner side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    /// Re-evaluate the inner side seeded with each outer solution
    NestedLoop,
    /// Materialize the inner side once and look it up per outer solution
    Hash,
}

/// Outcome of planning one join
#[derive(Debug, Clone, Copy)]
pub struct JoinPlan<'a> {
    pub outer: &'a Algebra,
    pub inner: &'a Algebra,
    pub strategy: JoinStrategy,
    /// True when the declared right side drives
    pub swapped: bool,
}

/// Number of components `algebra` can bind before scanning.
pub fn bound_score(algebra: &Algebra, seed: &Solution) -> usize {
    match algebra {
        Algebra::Pattern(p) => p.bound_count(seed),
        Algebra::Join(a, b) => bound_score(a, seed).max(bound_score(b, seed)),
        Algebra::Union(branches) => branches
            .iter()
            .map(|b| bound_score(b, seed))
            .min()
            .unwrap_or(NO_SCAN_SCORE),
        Algebra::LeftJoin { left, .. } | Algebra::Minus(left, _) => bound_score(left, seed),
        Algebra::Filter { child, .. }
        | Algebra::Distinct(child)
        | Algebra::Projection { child, .. }
        | Algebra::Slice { child, .. }
        | Algebra::Extend { child, .. } => bound_score(child, seed),
        Algebra::Values { .. } | Algebra::Singleton | Algebra::Empty => NO_SCAN_SCORE,
        Algebra::Service { .. } => 0,
    }
}

/// Plan `Join(left, right)` under `seed`.
pub fn plan_join<'a>(
    left: &'a Algebra,
    right: &'a Algebra,
    seed: &Solution,
    ctx: &ExecutionContext<'_>,
) -> Result<JoinPlan<'a>> {
    let left_score = bound_score(left, seed);
    let right_score = bound_score(right, seed);
    let swapped = right_score > left_score;
    let (outer, inner) = if swapped { (right, left) } else { (left, right) };

    let threshold = ctx.options().hash_join_threshold;
    let correlatable = inner.is_correlatable();
    let strategy = if !correlatable {
        JoinStrategy::Hash
    } else {
        match inner_cardinality(inner, seed, threshold, ctx)? {
            Some(rows) if threshold > 0 && rows <= threshold => JoinStrategy::Hash,
            _ => JoinStrategy::NestedLoop,
        }
    };

    tracing::debug!(
        left_score,
        right_score,
        swapped,
        correlatable,
        strategy = ?strategy,
        "join planned"
    );
    Ok(JoinPlan {
        outer,
        inner,
        strategy,
        swapped,
    })
}

/// Cheap cardinality estimate for hash build candidates
fn inner_cardinality(
    inner: &Algebra,
    seed: &Solution,
    cap: usize,
    ctx: &ExecutionContext<'_>,
) -> Result<Option<usize>> {
    match inner {
        Algebra::Values { rows, .. } => Ok(Some(rows.len())),
        Algebra::Pattern(p) if cap > 0 => bounded_count(ctx.source().as_ref(), p, seed, cap),
        _ => Ok(None),
    }
}
