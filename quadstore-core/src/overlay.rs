//! Pending changes of a write transaction
//!
//! Each permutation gets an ordered map from key to the latest pending
//! change for that quad. Every change is recorded in all permutations at
//! once, so the maps always describe the same logical change set. Scans merge
//! a map over the base snapshot's keys: `Assert` makes a key visible,
//! `Retract` hides it.

use crate::codec::{encode_key, IndexKey, KeyRange};
use crate::permutation::Permutation;
use crate::statement::Quad;
use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Change {
    Assert,
    Retract,
}

#[derive(Debug)]
pub(crate) struct Overlay {
    perms: Vec<Permutation>,
    maps: Vec<BTreeMap<IndexKey, Change>>,
}

impl Overlay {
    pub(crate) fn new(perms: &[Permutation]) -> Self {
        Self {
            perms: perms.to_vec(),
            maps: perms.iter().map(|_| BTreeMap::new()).collect(),
        }
    }

    /// Record `change` for `quad` in every permutation; the latest change wins.
    pub(crate) fn record(&mut self, quad: &Quad, change: Change) {
        for (perm, map) in self.perms.iter().zip(self.maps.iter_mut()) {
            map.insert(encode_key(quad, *perm), change);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.maps.first().map_or(true, BTreeMap::is_empty)
    }

    pub(crate) fn len(&self) -> usize {
        self.maps.first().map_or(0, BTreeMap::len)
    }

    pub(crate) fn clear(&mut self) {
        for map in &mut self.maps {
            map.clear();
        }
    }

    fn map(&self, perm: Permutation) -> Option<&BTreeMap<IndexKey, Change>> {
        self.perms
            .iter()
            .position(|p| *p == perm)
            .and_then(|idx| self.maps.get(idx))
    }

    /// Pending change for a key of `perm`
    pub(crate) fn get(&self, perm: Permutation, key: &IndexKey) -> Option<Change> {
        self.map(perm).and_then(|m| m.get(key).copied())
    }

    /// Pending changes of `perm` with `after < key < until` (or up to the
    /// range's upper bound when `until` is `None`), within `range`.
    pub(crate) fn window(
        &self,
        perm: Permutation,
        range: &KeyRange,
        after: Option<&IndexKey>,
        until: Option<&IndexKey>,
    ) -> Vec<(IndexKey, Change)> {
        let Some(map) = self.map(perm) else {
            return Vec::new();
        };
        let lower = match after {
            Some(a) => Bound::Excluded(*a),
            None => Bound::Included(range.lower),
        };
        map.range((lower, Bound::Unbounded))
            .take_while(|(k, _)| range.below_upper(k) && until.map_or(true, |u| *k <= u))
            .filter(|(k, _)| range.contains(k))
            .map(|(k, c)| (*k, *c))
            .collect()
    }

    /// Every pending change in the first permutation's order
    pub(crate) fn changes(&self) -> impl Iterator<Item = (Permutation, &IndexKey, Change)> + '_ {
        self.perms
            .first()
            .copied()
            .into_iter()
            .zip(self.maps.first())
            .flat_map(|(perm, map)| map.iter().map(move |(k, c)| (perm, k, *c)))
    }

    /// Per-permutation view used to stage the commit batch
    pub(crate) fn per_permutation(
        &self,
    ) -> impl Iterator<Item = (Permutation, &BTreeMap<IndexKey, Change>)> + '_ {
        self.perms.iter().copied().zip(self.maps.iter())
    }
}

/// Merge base keys (ascending) with pending changes (ascending).
pub(crate) fn merge(base: Vec<IndexKey>, pending: Vec<(IndexKey, Change)>) -> Vec<IndexKey> {
    let mut out = Vec::with_capacity(base.len() + pending.len());
    let mut base = base.into_iter().peekable();
    let mut pending = pending.into_iter().peekable();
    loop {
        match (base.peek(), pending.peek()) {
            (Some(b), Some((p, change))) => {
                if b < p {
                    out.push(*b);
                    base.next();
                } else {
                    if *change == Change::Assert {
                        out.push(*p);
                    }
                    if b == p {
                        base.next();
                    }
                    pending.next();
                }
            }
            (Some(b), None) => {
                out.push(*b);
                base.next();
            }
            (None, Some((p, change))) => {
                if *change == Change::Assert {
                    out.push(*p);
                }
                pending.next();
            }
            (None, None) => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ValueId;

    fn quad(s: u64) -> Quad {
        Quad::new(
            ValueId::new(s),
            ValueId::new(1),
            ValueId::new(1),
            ValueId::DEFAULT_GRAPH,
        )
    }

    fn key(s: u64) -> IndexKey {
        encode_key(&quad(s), Permutation::SPOC)
    }

    #[test]
    fn test_latest_change_wins() {
        let mut overlay = Overlay::new(&[Permutation::SPOC, Permutation::POSC]);
        overlay.record(&quad(1), Change::Assert);
        overlay.record(&quad(1), Change::Retract);
        assert_eq!(overlay.len(), 1);
        assert_eq!(overlay.get(Permutation::SPOC, &key(1)), Some(Change::Retract));
        assert_eq!(
            overlay.get(Permutation::POSC, &encode_key(&quad(1), Permutation::POSC)),
            Some(Change::Retract)
        );
    }

    #[test]
    fn test_merge_hides_retracted_and_adds_asserted() {
        let base = vec![key(1), key(3), key(5)];
        let pending = vec![(key(2), Change::Assert), (key(3), Change::Retract), (key(5), Change::Assert)];
        assert_eq!(merge(base, pending), vec![key(1), key(2), key(5)]);
    }

    #[test]
    fn test_window_respects_bounds() {
        let mut overlay = Overlay::new(&[Permutation::SPOC]);
        for s in 1..=5 {
            overlay.record(&quad(s), Change::Assert);
        }
        let w = overlay.window(Permutation::SPOC, &KeyRange::full(), Some(&key(1)), Some(&key(3)));
        let keys: Vec<IndexKey> = w.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![key(2), key(3)]);
    }
}
