//! Materialized inner side shared by hash join and uncorrelated OPTIONAL
//!
//! Rows are bucketed by the values of the key variables. Rows that leave a
//! key variable unbound go to a separate list that every lookup scans.

use crate::algebra::Algebra;
use crate::binding::{Solution, Var};
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::execute::build_operator;
use crate::operator::Operator;
use quadstore_core::Value;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

type JoinKey = Vec<Value>;

#[derive(Default)]
pub(crate) struct HashTable {
    keys: Vec<Var>,
    buckets: FxHashMap<JoinKey, Vec<Solution>>,
    /// Rows with an unbound key variable
    loose: Vec<Solution>,
}

impl HashTable {
    pub(crate) fn new(keys: Vec<Var>) -> Self {
        Self {
            keys,
            ..Self::default()
        }
    }

    /// Evaluate `algebra` once under `seed` and bucket every row.
    ///
    /// Keys are the variables of `algebra` that `other` may also bind and
    /// that `seed` leaves open.
    pub(crate) fn build<'a>(
        algebra: &'a Algebra,
        other: &Algebra,
        seed: &Solution,
        ctx: &ExecutionContext<'a>,
    ) -> Result<Self> {
        let other_vars = other.variables();
        let keys = algebra
            .variables()
            .into_iter()
            .filter(|v| other_vars.contains(v) && !seed.is_bound(v))
            .collect();
        let mut table = HashTable::new(keys);
        let mut op = build_operator(algebra, seed.clone());
        op.open(ctx)?;
        let drained = table.fill(op.as_mut(), ctx);
        op.close();
        drained?;
        tracing::trace!(rows = table.len(), keys = table.keys.len(), "hash table built");
        Ok(table)
    }

    fn fill<'a>(
        &mut self,
        op: &mut (dyn Operator<'a> + 'a),
        ctx: &ExecutionContext<'a>,
    ) -> Result<()> {
        while let Some(row) = op.next(ctx)? {
            self.insert(row);
        }
        Ok(())
    }

    fn key_of(&self, row: &Solution) -> Option<JoinKey> {
        self.keys.iter().map(|v| row.get(v).cloned()).collect()
    }

    pub(crate) fn insert(&mut self, row: Solution) {
        match self.key_of(&row) {
            Some(key) => self.buckets.entry(key).or_default().push(row),
            None => self.loose.push(row),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum::<usize>() + self.loose.len()
    }

    /// Every stored row compatible with `row`, merged into it
    pub(crate) fn matching(&self, row: &Solution) -> VecDeque<Solution> {
        let merge_all = |rows: &[Solution], out: &mut VecDeque<Solution>| {
            out.extend(rows.iter().filter_map(|r| row.merge(r)));
        };
        let mut out = VecDeque::new();
        match self.key_of(row) {
            Some(key) => {
                if let Some(bucket) = self.buckets.get(&key) {
                    merge_all(bucket, &mut out);
                }
            }
            None => {
                for bucket in self.buckets.values() {
                    merge_all(bucket, &mut out);
                }
            }
        }
        merge_all(&self.loose, &mut out);
        out
    }
}
