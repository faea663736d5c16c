//! Lazy range scans
//!
//! [`KeyScan`] walks one key range of one permutation in ascending order,
//! pulling bounded chunks from a [`StatementSource`] as the consumer
//! advances. No cursor is held between chunks; each chunk re-seeks from the
//! last key returned, so a scan never pins storage resources while idle.
//!
//! [`PatternScan`] picks the best permutation for a [`QuadPattern`], scans its
//! bound-prefix range and checks the remaining bound components per key.

use crate::codec::{decode_key, range_for, IndexKey, KeyRange};
use crate::error::{Error, Result};
use crate::permutation::Permutation;
use crate::source::StatementSource;
use crate::statement::{Quad, QuadPattern};
use std::collections::VecDeque;

/// Ascending, finite, lazily fetched sequence of keys in one range
pub struct KeyScan<S> {
    source: S,
    perm: Permutation,
    range: KeyRange,
    batch_size: usize,
    buffer: VecDeque<IndexKey>,
    resume_after: Option<IndexKey>,
    started: bool,
    closed: bool,
}

impl<S: StatementSource> KeyScan<S> {
    pub fn new(source: S, perm: Permutation, range: KeyRange) -> Self {
        let batch_size = source.scan_batch_size().max(1);
        Self {
            source,
            perm,
            range,
            batch_size,
            buffer: VecDeque::new(),
            resume_after: None,
            started: false,
            closed: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn permutation(&self) -> Permutation {
        self.perm
    }

    /// Stop the scan and release buffered keys. Idempotent.
    pub fn close(&mut self) {
        self.closed = true;
        self.buffer.clear();
        self.resume_after = None;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<S: StatementSource> Iterator for KeyScan<S> {
    type Item = Result<IndexKey>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(key) = self.buffer.pop_front() {
                return Some(Ok(key));
            }
            if self.closed || (self.started && self.resume_after.is_none()) {
                self.closed = true;
                return None;
            }
            let after = self.resume_after;
            match self
                .source
                .scan_chunk(self.perm, &self.range, after.as_ref(), self.batch_size)
            {
                Ok(chunk) => {
                    self.started = true;
                    self.resume_after = chunk.resume_after;
                    self.buffer.extend(chunk.keys);
                }
                Err(e) => {
                    self.close();
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Quads matching a pattern, decoded from the best available permutation
pub struct PatternScan<S> {
    keys: KeyScan<S>,
    pattern: QuadPattern,
    residual: bool,
}

impl<S: StatementSource> PatternScan<S> {
    pub fn new(source: S, pattern: QuadPattern) -> Result<Self> {
        let perm = Permutation::select(source.permutations(), &pattern)
            .ok_or_else(|| Error::invalid_index("store has no index permutations"))?;
        let residual = perm.bound_prefix_len(&pattern) < pattern.bound_count();
        if residual {
            tracing::trace!(
                index = %perm,
                bound = pattern.bound_count(),
                "no full prefix match; filtering residual components per key"
            );
        }
        let range = range_for(&pattern, perm);
        Ok(Self {
            keys: KeyScan::new(source, perm, range),
            pattern,
            residual,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.keys = self.keys.with_batch_size(batch_size);
        self
    }

    pub fn permutation(&self) -> Permutation {
        self.keys.permutation()
    }

    pub fn close(&mut self) {
        self.keys.close();
    }
}

impl<S: StatementSource> Iterator for PatternScan<S> {
    type Item = Result<Quad>;

    fn next(&mut self) -> Option<Self::Item> {
        let perm = self.keys.permutation();
        loop {
            let key = match self.keys.next()? {
                Ok(key) => key,
                Err(e) => return Some(Err(e)),
            };
            let quad = decode_key(&key, perm);
            if !self.residual || self.pattern.matches(&quad) {
                return Some(Ok(quad));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_key;
    use crate::ids::ValueId;
    use crate::source::ScanChunk;
    use crate::value::Value;
    use std::cell::Cell;

    /// In-memory source over a sorted key list of a single permutation
    struct VecSource {
        perms: Vec<Permutation>,
        keys: Vec<IndexKey>,
        calls: Cell<usize>,
    }

    impl VecSource {
        fn new(perm: Permutation, quads: &[Quad]) -> Self {
            let mut keys: Vec<IndexKey> = quads.iter().map(|q| encode_key(q, perm)).collect();
            keys.sort();
            Self {
                perms: vec![perm],
                keys,
                calls: Cell::new(0),
            }
        }
    }

    impl StatementSource for VecSource {
        fn permutations(&self) -> &[Permutation] {
            &self.perms
        }

        fn scan_chunk(
            &self,
            _perm: Permutation,
            range: &KeyRange,
            after: Option<&IndexKey>,
            limit: usize,
        ) -> Result<ScanChunk> {
            self.calls.set(self.calls.get() + 1);
            let keys: Vec<IndexKey> = self
                .keys
                .iter()
                .filter(|k| range.contains(k) && after.map_or(true, |a| *k > a))
                .take(limit)
                .copied()
                .collect();
            let resume_after = if keys.len() == limit {
                keys.last().copied()
            } else {
                None
            };
            Ok(ScanChunk { keys, resume_after })
        }

        fn lookup_id(&self, _value: &Value) -> Result<Option<ValueId>> {
            Ok(None)
        }

        fn resolve_id(&self, id: ValueId) -> Result<Value> {
            Err(Error::not_found(id.to_string()))
        }
    }

    fn quad(s: u64, p: u64, o: u64) -> Quad {
        Quad::new(
            ValueId::new(s),
            ValueId::new(p),
            ValueId::new(o),
            ValueId::DEFAULT_GRAPH,
        )
    }

    #[test]
    fn test_key_scan_pulls_in_chunks() {
        let quads: Vec<Quad> = (1..=7).map(|i| quad(1, 2, i)).collect();
        let source = VecSource::new(Permutation::SPOC, &quads);
        let scan = KeyScan::new(&source, Permutation::SPOC, KeyRange::full()).with_batch_size(3);
        let keys: Vec<IndexKey> = scan.map(|k| k.unwrap()).collect();
        assert_eq!(keys.len(), 7);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        // 3 + 3 + 1
        assert_eq!(source.calls.get(), 3);
    }

    #[test]
    fn test_key_scan_is_lazy_and_closable() {
        let quads: Vec<Quad> = (1..=10).map(|i| quad(1, 2, i)).collect();
        let source = VecSource::new(Permutation::SPOC, &quads);
        let mut scan =
            KeyScan::new(&source, Permutation::SPOC, KeyRange::full()).with_batch_size(2);
        assert!(scan.next().is_some());
        assert_eq!(source.calls.get(), 1);
        scan.close();
        scan.close();
        assert!(scan.next().is_none());
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_pattern_scan_applies_residual_filter() {
        let quads = vec![quad(1, 2, 3), quad(1, 5, 3), quad(4, 2, 3), quad(4, 2, 9)];
        let source = VecSource::new(Permutation::SPOC, &quads);
        // predicate + object bound, only spoc available: no prefix match
        let pattern = QuadPattern {
            p: Some(ValueId::new(2)),
            o: Some(ValueId::new(3)),
            ..Default::default()
        };
        let found: Vec<Quad> = PatternScan::new(&source, pattern)
            .unwrap()
            .map(|q| q.unwrap())
            .collect();
        assert_eq!(found, vec![quad(1, 2, 3), quad(4, 2, 3)]);
    }
}
