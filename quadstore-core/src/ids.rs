//! Surrogate identifiers for interned values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Surrogate id standing in for an interned [`Value`](crate::Value).
///
/// Ids are allocated once per distinct value, never reused, and stable for the
/// store's lifetime. Id `0` is reserved for the default graph, so allocation
/// starts at [`ValueId::FIRST`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(u64);

impl ValueId {
    /// Context id of the default graph (statements without a context)
    pub const DEFAULT_GRAPH: ValueId = ValueId(0);

    /// First id handed out by the dictionary
    pub const FIRST: ValueId = ValueId(1);

    /// Encoded width in bytes
    pub const WIDTH: usize = 8;

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub fn is_default_graph(self) -> bool {
        self == Self::DEFAULT_GRAPH
    }

    /// Big-endian bytes; byte order equals numeric order.
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }

    /// The id following this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_order_matches_numeric_order() {
        let a = ValueId::new(255);
        let b = ValueId::new(256);
        assert!(a < b);
        assert!(a.to_be_bytes() < b.to_be_bytes());
        assert_eq!(ValueId::from_be_bytes(b.to_be_bytes()), b);
    }

    #[test]
    fn test_reserved_ids() {
        assert!(ValueId::DEFAULT_GRAPH.is_default_graph());
        assert!(!ValueId::FIRST.is_default_graph());
        assert_eq!(ValueId::DEFAULT_GRAPH.next(), ValueId::FIRST);
    }
}
