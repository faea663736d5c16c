//! Index permutations
//!
//! Each index stores every quad under one ordering of its components. A scan
//! can serve a pattern with one contiguous key range when the pattern's bound
//! components form a prefix of the permutation.
//!
//! The default index set covers every combination of bound components:
//!
//! | Index | Serves leading bound sets |
//! |-------|---------------------------|
//! | SPOC | s, sp, spo, spoc |
//! | POCS | p, po, poc |
//! | OCSP | o, oc, ocs |
//! | CSPO | c, cs, csp |
//! | OSPC | os |
//! | PCSO | pc |

use crate::error::{Error, Result};
use crate::statement::{Component, QuadPattern};
use std::fmt;
use std::str::FromStr;

/// One ordering of `(s, p, o, c)`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Permutation {
    order: [Component; 4],
}

/// Index set covering every bound-component combination with a prefix scan
pub const DEFAULT_INDEXES: &str = "spoc,pocs,ocsp,cspo,ospc,pcso";

impl Permutation {
    pub const SPOC: Permutation = Permutation::from_order([
        Component::Subject,
        Component::Predicate,
        Component::Object,
        Component::Context,
    ]);

    pub const POSC: Permutation = Permutation::from_order([
        Component::Predicate,
        Component::Object,
        Component::Subject,
        Component::Context,
    ]);

    const fn from_order(order: [Component; 4]) -> Self {
        Self { order }
    }

    /// Build from an explicit order; every component must appear exactly once.
    pub fn new(order: [Component; 4]) -> Result<Self> {
        for c in Component::ALL {
            if !order.contains(&c) {
                return Err(Error::invalid_index(format!(
                    "permutation is missing component '{}'",
                    c.letter()
                )));
            }
        }
        Ok(Self { order })
    }

    pub fn order(&self) -> &[Component; 4] {
        &self.order
    }

    /// Lowercase four-letter name, e.g. `"spoc"`
    pub fn name(&self) -> String {
        self.order.iter().map(|c| c.letter()).collect()
    }

    /// Number of leading components bound in `pattern`
    pub fn bound_prefix_len(&self, pattern: &QuadPattern) -> usize {
        self.order
            .iter()
            .take_while(|c| pattern.is_bound(**c))
            .count()
    }

    /// Parse a comma-separated index spec such as `"spoc,posc"`.
    ///
    /// Duplicates are removed, preserving first occurrence.
    pub fn parse_list(spec: &str) -> Result<Vec<Permutation>> {
        let mut out: Vec<Permutation> = Vec::new();
        for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let perm: Permutation = part.parse()?;
            if !out.contains(&perm) {
                out.push(perm);
            }
        }
        if out.is_empty() {
            return Err(Error::invalid_index(format!(
                "index spec '{}' names no permutations",
                spec
            )));
        }
        Ok(out)
    }

    /// Select the index best suited to a pattern.
    ///
    /// Picks the permutation with the longest bound prefix; ties keep the
    /// earlier entry in `available`, so configuration order is the tie-break.
    pub fn select(available: &[Permutation], pattern: &QuadPattern) -> Option<Permutation> {
        let mut best: Option<(Permutation, usize)> = None;
        for perm in available {
            let len = perm.bound_prefix_len(pattern);
            match best {
                Some((_, best_len)) if best_len >= len => {}
                _ => best = Some((*perm, len)),
            }
        }
        best.map(|(perm, _)| perm)
    }
}

impl FromStr for Permutation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let chars: Vec<char> = s.trim().chars().collect();
        if chars.len() != 4 {
            return Err(Error::invalid_index(format!(
                "'{}' must name exactly four components",
                s
            )));
        }
        let mut order = [Component::Subject; 4];
        for (slot, ch) in order.iter_mut().zip(chars) {
            *slot = Component::from_letter(ch).ok_or_else(|| {
                Error::invalid_index(format!("unknown component '{}' in '{}'", ch, s))
            })?;
        }
        Permutation::new(order)
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ValueId;

    fn bound(s: bool, p: bool, o: bool, c: bool) -> QuadPattern {
        let id = Some(ValueId::new(7));
        QuadPattern {
            s: s.then_some(id).flatten(),
            p: p.then_some(id).flatten(),
            o: o.then_some(id).flatten(),
            c: c.then_some(id).flatten(),
        }
    }

    #[test]
    fn test_parse_and_name() {
        let perm: Permutation = "POSC".parse().unwrap();
        assert_eq!(perm, Permutation::POSC);
        assert_eq!(perm.name(), "posc");
        assert!("spo".parse::<Permutation>().is_err());
        assert!("spox".parse::<Permutation>().is_err());
        assert!("sspo".parse::<Permutation>().is_err());
    }

    #[test]
    fn test_parse_list_dedupes() {
        let perms = Permutation::parse_list("spoc, posc,spoc").unwrap();
        assert_eq!(perms, vec![Permutation::SPOC, Permutation::POSC]);
        assert!(Permutation::parse_list(" , ").is_err());
    }

    #[test]
    fn test_default_set_serves_every_combination_with_a_prefix() {
        let perms = Permutation::parse_list(DEFAULT_INDEXES).unwrap();
        for mask in 0u8..16 {
            let pattern = bound(mask & 1 != 0, mask & 2 != 0, mask & 4 != 0, mask & 8 != 0);
            let perm = Permutation::select(&perms, &pattern).unwrap();
            assert_eq!(
                perm.bound_prefix_len(&pattern),
                pattern.bound_count(),
                "mask {:04b} not served by a prefix of {}",
                mask,
                perm
            );
        }
    }

    #[test]
    fn test_select_prefers_longest_prefix_then_config_order() {
        let perms = Permutation::parse_list("spoc,posc").unwrap();
        assert_eq!(
            Permutation::select(&perms, &bound(false, true, true, false)),
            Some(Permutation::POSC)
        );
        // Nothing bound: first configured index wins
        assert_eq!(
            Permutation::select(&perms, &QuadPattern::any()),
            Some(Permutation::SPOC)
        );
        // Only object bound: no prefix anywhere, residual filtering on spoc
        let only_o = bound(false, false, true, false);
        let perm = Permutation::select(&perms, &only_o).unwrap();
        assert_eq!(perm, Permutation::SPOC);
        assert_eq!(perm.bound_prefix_len(&only_o), 0);
    }
}
